use std::collections::BTreeMap;
use std::fmt;

/// 동기화 대상 필드. 이 목록 밖의 프레임은 읽지도 쓰지도 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    AlbumTitle,
    Artist,
    AlbumArtist,
    MusicBrainzAlbumId,
    MusicBrainzReleaseGroupId,
    MusicBrainzArtistId,
}

/// ID3v2 프레임 식별자. TXXX 프레임은 description까지 포함해야 고유하다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub id: &'static str,
    pub description: Option<&'static str>,
}

impl FrameKey {
    pub const fn text(id: &'static str) -> Self {
        Self {
            id,
            description: None,
        }
    }

    pub const fn extended(description: &'static str) -> Self {
        Self {
            id: "TXXX",
            description: Some(description),
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description {
            Some(desc) => write!(f, "{}:{}", self.id, desc),
            None => f.write_str(self.id),
        }
    }
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::AlbumTitle,
        Field::Artist,
        Field::AlbumArtist,
        Field::MusicBrainzAlbumId,
        Field::MusicBrainzReleaseGroupId,
        Field::MusicBrainzArtistId,
    ];

    /// 필드가 기록되는 프레임.
    pub fn key(self) -> FrameKey {
        match self {
            Field::AlbumTitle => FrameKey::text("TALB"),
            Field::Artist => FrameKey::text("TPE1"),
            Field::AlbumArtist => FrameKey::text("TPE2"),
            Field::MusicBrainzAlbumId => FrameKey::extended("MUSICBRAINZ_ALBUMID"),
            Field::MusicBrainzReleaseGroupId => {
                FrameKey::extended("MUSICBRAINZ_RELEASEGROUPID")
            }
            Field::MusicBrainzArtistId => FrameKey::extended("MUSICBRAINZ_ARTISTID"),
        }
    }

    /// 값을 찾을 환경 변수 이름. 첫 번째가 정식 이름이고 나머지는 구버전 별칭이다.
    pub fn env_keys(self) -> &'static [&'static str] {
        match self {
            Field::AlbumTitle => &["ALBUM_TITLE"],
            Field::Artist => &["ARTIST"],
            Field::AlbumArtist => &["ALBUMARTIST"],
            Field::MusicBrainzAlbumId => &["MUSICBRAINZ_ALBUMID", "MB_ALBUMID"],
            Field::MusicBrainzReleaseGroupId => {
                &["MUSICBRAINZ_RELEASEGROUPID", "MB_RELEASEGROUPID"]
            }
            Field::MusicBrainzArtistId => &["MUSICBRAINZ_ARTISTID"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::AlbumTitle => "앨범",
            Field::Artist => "아티스트",
            Field::AlbumArtist => "앨범 아티스트",
            Field::MusicBrainzAlbumId => "MusicBrainz 앨범 ID",
            Field::MusicBrainzReleaseGroupId => "MusicBrainz 릴리스 그룹 ID",
            Field::MusicBrainzArtistId => "MusicBrainz 아티스트 ID",
        }
    }
}

/// 파일에 적용할 필드 값 목록. 빈 문자열은 값이 없는 것으로 취급한다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    values: BTreeMap<Field, String>,
}

impl TagUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 지정한다. 빈 문자열이면 아무것도 하지 않고 false를 반환한다.
    pub fn set(&mut self, field: Field, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() {
            return false;
        }
        self.values.insert(field, value);
        true
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// 값이 없는 필드의 기존 프레임을 어떻게 다룰지 결정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// 값이 있는 필드만 건드린다.
    #[default]
    Conditional,
    /// 값이 없는 필드의 프레임도 모두 지운다.
    ClearUnset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub field: Field,
    pub removed: usize,
    pub written: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    /// 불러온 태그의 원래 버전. 태그가 없거나 읽을 수 없었으면 None.
    pub source_version: Option<id3::Version>,
    pub outcomes: Vec<FieldOutcome>,
}

impl SyncReport {
    pub fn written(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.written.is_some())
    }

    pub fn cleared(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.written.is_none() && o.removed > 0)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}개 필드 기록, {}개 필드 삭제",
            self.written().count(),
            self.cleared().count()
        )
    }
}
