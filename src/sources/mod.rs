pub mod deezer;

use crate::error::ArlError;

/// 세션 토큰 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid { user_id: u64 },
    Invalid(String),
    Unreachable(String),
}

impl Validity {
    pub fn into_result(self) -> Result<u64, ArlError> {
        match self {
            Validity::Valid { user_id } => Ok(user_id),
            Validity::Invalid(reason) => Err(ArlError::Invalid(reason)),
            Validity::Unreachable(reason) => Err(ArlError::Unreachable(reason)),
        }
    }
}

/// 스트리밍 서비스 세션 확인 트레이트.
/// 다운로드 파이프라인 실행 전에 저장된 토큰이 살아 있는지 확인한다.
pub trait SessionValidator {
    /// 서비스 이름.
    fn name(&self) -> &str;
    /// 토큰으로 한 번 요청을 보내 유효성을 판단한다.
    fn validate(&self, token: &str) -> Validity;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert_eq!(Validity::Valid { user_id: 7 }.into_result().unwrap(), 7);
        assert!(matches!(
            Validity::Invalid("expired".into()).into_result(),
            Err(ArlError::Invalid(_))
        ));
        assert!(matches!(
            Validity::Unreachable("dns".into()).into_result(),
            Err(ArlError::Unreachable(_))
        ));
    }
}
