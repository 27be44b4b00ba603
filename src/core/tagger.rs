use std::io::Read;
use std::path::{Path, PathBuf};

use id3::frame::ExtendedText;
use id3::{Frame, Tag, TagLike, Version};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::models::{ClearPolicy, Field, FieldOutcome, FrameKey, SyncReport, TagUpdate};

/// 항상 이 버전으로 기록한다.
pub const OUTPUT_VERSION: Version = Version::Id3v24;

/// 파일 하나의 ID3 태그를 불러와 필드를 교체하고 다시 기록한다.
pub struct TagSynchronizer {
    path: PathBuf,
    tag: Tag,
    source_version: Option<Version>,
    /// 헤더부터 읽을 수 없는 ID3 영역이 파일 앞에 있다.
    corrupt_header: bool,
}

impl TagSynchronizer {
    /// 파일의 태그를 불러온다.
    /// 태그가 없거나 파싱에 실패하면 빈 태그에서 시작한다. 파일이 없으면 에러.
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        if !path.is_file() {
            return Err(SyncError::NotFound(path.to_path_buf()));
        }

        let mut corrupt_header = false;
        let (tag, source_version) = match Tag::read_from_path(path) {
            Ok(tag) => {
                let version = tag.version();
                (tag, Some(version))
            }
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => {
                debug!(path = %path.display(), "no ID3 tag, starting empty");
                (Tag::new(), None)
            }
            Err(
                e @ id3::Error {
                    kind: id3::ErrorKind::Io(_),
                    ..
                },
            ) => {
                return Err(SyncError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable ID3 tag, starting empty");
                corrupt_header = starts_with_id3(path).map_err(|e| SyncError::Io {
                    path: path.to_path_buf(),
                    source: e.into(),
                })?;
                (Tag::new(), None)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            tag,
            source_version,
            corrupt_header,
        })
    }

    /// 식별자가 일치하는 프레임을 모두 지우고 지운 개수를 반환한다.
    pub fn remove(&mut self, key: FrameKey) -> usize {
        match key.description {
            Some(desc) => {
                let count = self
                    .tag
                    .extended_texts()
                    .filter(|ext| ext.description == desc)
                    .count();
                if count > 0 {
                    self.tag.remove_extended_text(Some(desc), None);
                }
                count
            }
            None => self.tag.remove(key.id).len(),
        }
    }

    /// 새 프레임 하나를 추가한다.
    pub fn insert(&mut self, key: FrameKey, value: &str) {
        match key.description {
            Some(desc) => {
                self.tag.add_frame(ExtendedText {
                    description: desc.to_string(),
                    value: value.to_string(),
                });
            }
            None => {
                self.tag.add_frame(Frame::text(key.id, value));
            }
        }
    }

    /// 필드의 현재 값들. 중복 프레임이 있으면 모두 반환한다.
    pub fn values(&self, field: Field) -> Vec<String> {
        let key = field.key();
        match key.description {
            Some(desc) => self
                .tag
                .extended_texts()
                .filter(|ext| ext.description == desc)
                .map(|ext| ext.value.clone())
                .collect(),
            None => self
                .tag
                .frames()
                .filter(|frame| frame.id() == key.id)
                .filter_map(|frame| frame.content().text())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// 업데이트 목록을 태그에 반영한다. 필드끼리는 서로 독립적이다.
    pub fn apply(&mut self, update: &TagUpdate, policy: ClearPolicy) -> SyncReport {
        let mut outcomes = Vec::new();

        for field in Field::ALL {
            let key = field.key();
            match update.get(field) {
                Some(value) => {
                    let removed = self.remove(key);
                    self.insert(key, value);
                    debug!(frame = %key, removed, value, "frame replaced");
                    outcomes.push(FieldOutcome {
                        field,
                        removed,
                        written: Some(value.to_string()),
                    });
                }
                None if policy == ClearPolicy::ClearUnset => {
                    let removed = self.remove(key);
                    if removed > 0 {
                        debug!(frame = %key, removed, "frame cleared");
                    }
                    outcomes.push(FieldOutcome {
                        field,
                        removed,
                        written: None,
                    });
                }
                None => {}
            }
        }

        SyncReport {
            source_version: self.source_version,
            outcomes,
        }
    }

    /// 태그를 ID3v2.4로 파일에 다시 기록한다.
    pub fn save(self) -> Result<(), SyncError> {
        if let Some(version) = self.source_version {
            if version != OUTPUT_VERSION {
                debug!(path = %self.path.display(), from = ?version, "upgrading tag to ID3v2.4");
            }
        }

        let written = if self.corrupt_header {
            self.replace_corrupt_region()
        } else {
            self.tag.write_to_path(&self.path, OUTPUT_VERSION)
        };

        written.map_err(|e| SyncError::Write {
            path: self.path.clone(),
            source: e,
        })
    }

    /// id3가 헤더를 해석하지 못하면 기존 영역을 찾지 못하므로 직접 잘라내고 새 태그를 붙인다.
    /// 선언된 크기만큼(파일 길이 이내) 버리고 나머지 오디오 앞에 새 태그를 쓴다.
    fn replace_corrupt_region(&self) -> id3::Result<()> {
        let data = std::fs::read(&self.path)?;
        if data.len() < HEADER_LEN {
            return self.tag.write_to_path(&self.path, OUTPUT_VERSION);
        }
        let mut end = HEADER_LEN + synchsafe(&data[6..HEADER_LEN]);
        if data[5] & FOOTER_FLAG != 0 {
            end += HEADER_LEN;
        }
        let end = end.min(data.len());
        debug!(path = %self.path.display(), dropped = end, "replacing corrupt ID3 region");

        let mut out = Vec::with_capacity(data.len());
        self.tag.write_to(&mut out, OUTPUT_VERSION)?;
        out.extend_from_slice(&data[end..]);
        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

const HEADER_LEN: usize = 10;
const FOOTER_FLAG: u8 = 0x10;

/// 파일이 ID3 헤더 길이 이상이고 "ID3"로 시작하는지 확인한다.
fn starts_with_id3(path: &Path) -> std::io::Result<bool> {
    let mut header = [0u8; HEADER_LEN];
    let mut file = std::fs::File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header.starts_with(b"ID3")),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn synchsafe(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F))
}

/// 파일을 열어 업데이트를 적용하고 저장한다.
pub fn sync_file(
    path: &Path,
    update: &TagUpdate,
    policy: ClearPolicy,
) -> Result<SyncReport, SyncError> {
    let mut synchronizer = TagSynchronizer::open(path)?;
    let report = synchronizer.apply(update, policy);
    synchronizer.save()?;
    Ok(report)
}

/// 파일에서 대상 필드의 현재 값을 모두 읽는다.
pub fn read_fields(path: &Path) -> Result<Vec<(Field, Vec<String>)>, SyncError> {
    let synchronizer = TagSynchronizer::open(path)?;
    Ok(Field::ALL
        .iter()
        .map(|field| (*field, synchronizer.values(*field)))
        .collect())
}
