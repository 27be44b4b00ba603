use std::path::PathBuf;

use thiserror::Error;

/// 태그 동기화 중 발생하는 오류.
/// 기존 태그를 읽지 못하는 경우는 빈 태그로 대체하므로 여기에 없다.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("기록할 값이 없습니다: {0}")]
    MissingInput(String),

    #[error("파일을 찾을 수 없습니다: {}", .0.display())]
    NotFound(PathBuf),

    #[error("파일을 읽을 수 없습니다: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },

    #[error("태그를 기록할 수 없습니다: {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },
}

/// ARL 토큰 확인 오류.
#[derive(Debug, Error)]
pub enum ArlError {
    #[error("ARL 파일을 찾을 수 없습니다. AUDIO_DEEMIX_ARL_FILE을 올바르게 설정하세요")]
    MissingFile,

    #[error("ARL 토큰이 비어 있습니다: {}", .0.display())]
    Empty(PathBuf),

    #[error("ARL 토큰이 유효하지 않거나 만료되었습니다: {0}")]
    Invalid(String),

    #[error("Deezer에 연결할 수 없습니다: {0}")]
    Unreachable(String),

    #[error("ARL 파일 입출력 실패: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArlError {
    /// 파이프라인 스크립트가 기대하는 종료 코드.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArlError::MissingFile | ArlError::Empty(_) | ArlError::Io { .. } => 1,
            ArlError::Invalid(_) | ArlError::Unreachable(_) => 2,
        }
    }
}
