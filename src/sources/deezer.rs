use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::DeezerConfig;
use crate::error::ArlError;
use crate::sources::{SessionValidator, Validity};

/// 로그인 상태 확인에 쓰는 Gateway API 엔드포인트.
pub const DEFAULT_GATEWAY_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:83.0) Gecko/20100101 Firefox/110.0";

const USER_DATA_FORM: [(&str, &str); 4] = [
    ("api_token", "null"),
    ("api_version", "1.0"),
    ("input", "3"),
    ("method", "deezer.getUserData"),
];

/// Deezer Gateway API 클라이언트.
/// ARL 쿠키로 getUserData를 호출해 로그인 여부를 판단한다.
pub struct DeezerClient {
    client: reqwest::blocking::Client,
    gateway_url: String,
}

impl DeezerClient {
    pub fn new(config: &DeezerConfig) -> Result<Self> {
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Deezer HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self {
            client,
            gateway_url: config
                .gateway_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
        })
    }

    fn fetch_user_data(&self, token: &str) -> std::result::Result<Value, reqwest::Error> {
        self.client
            .post(&self.gateway_url)
            .header(reqwest::header::COOKIE, format!("arl={}", clean_token(token)))
            .form(&USER_DATA_FORM)
            .send()?
            .error_for_status()?
            .json()
    }
}

impl SessionValidator for DeezerClient {
    fn name(&self) -> &str {
        "Deezer"
    }

    fn validate(&self, token: &str) -> Validity {
        debug!(url = %self.gateway_url, "checking ARL token");

        let data = match self.fetch_user_data(token) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "error connecting to Deezer");
                return Validity::Unreachable(e.to_string());
            }
        };

        if let Some(err) = data.get("error").filter(|e| is_truthy(e)) {
            error!(error = %err, "Deezer API returned error");
            return Validity::Invalid(format!("API 오류: {}", err));
        }

        let user_id = data
            .get("results")
            .and_then(|r| r.get("USER"))
            .and_then(|u| u.get("USER_ID"))
            .and_then(parse_user_id)
            .unwrap_or(0);

        if user_id == 0 {
            error!("ARL token invalid or expired");
            return Validity::Invalid("로그인되지 않은 세션입니다".to_string());
        }

        info!(user_id, "ARL token is valid");
        Validity::Valid { user_id }
    }
}

/// USER_ID는 숫자 또는 숫자 문자열로 온다.
fn parse_user_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 빈 배열이나 빈 객체는 오류가 없다는 뜻이다.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// 앞뒤 공백과 따옴표를 제거한다.
pub fn clean_token(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

/// ARL 파일에서 토큰을 읽는다.
pub fn read_arl_file(path: &Path) -> std::result::Result<String, ArlError> {
    if !path.is_file() {
        return Err(ArlError::MissingFile);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ArlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let token = clean_token(&content);
    if token.is_empty() {
        return Err(ArlError::Empty(path.to_path_buf()));
    }
    Ok(token.to_string())
}

/// 새 토큰을 ARL 파일에 기록한다.
pub fn write_arl_file(path: &Path, token: &str) -> std::result::Result<(), ArlError> {
    let token = clean_token(token);
    if token.is_empty() {
        return Err(ArlError::Empty(path.to_path_buf()));
    }
    let io_err = |source| ArlError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, format!("{}\n", token)).map_err(io_err)?;
    info!(path = %path.display(), "new ARL token written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/ajax/gw-light.php";

    fn client_for(server: &mockito::ServerGuard) -> DeezerClient {
        DeezerClient::new(&DeezerConfig {
            gateway_url: Some(format!("{}{}", server.url(), PATH)),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", PATH)
            .match_header("cookie", "arl=abc123")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("method".into(), "deezer.getUserData".into()),
                Matcher::UrlEncoded("api_token".into(), "null".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":[],"results":{"USER":{"USER_ID":4242}}}"#)
            .create();

        let validity = client_for(&server).validate("\"abc123\"\n");
        mock.assert();
        assert_eq!(validity, Validity::Valid { user_id: 4242 });
    }

    #[test]
    fn test_string_user_id() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"error":{},"results":{"USER":{"USER_ID":"17"}}}"#)
            .create();

        assert_eq!(
            client_for(&server).validate("abc"),
            Validity::Valid { user_id: 17 }
        );
    }

    #[test]
    fn test_logged_out_user_is_invalid() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"error":[],"results":{"USER":{"USER_ID":0}}}"#)
            .create();

        assert!(matches!(
            client_for(&server).validate("expired"),
            Validity::Invalid(_)
        ));
    }

    #[test]
    fn test_api_error_is_invalid() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"error":{"VALID_TOKEN_REQUIRED":"Invalid CSRF token"},"results":{}}"#)
            .create();

        match client_for(&server).validate("abc") {
            Validity::Invalid(reason) => assert!(reason.contains("VALID_TOKEN_REQUIRED")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_server_error_is_unreachable() {
        let mut server = mockito::Server::new();
        let _m = server.mock("POST", PATH).with_status(503).create();

        assert!(matches!(
            client_for(&server).validate("abc"),
            Validity::Unreachable(_)
        ));
    }

    #[test]
    fn test_garbage_body_is_unreachable() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();

        assert!(matches!(
            client_for(&server).validate("abc"),
            Validity::Unreachable(_)
        ));
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&serde_json::json!([])));
        assert!(!is_truthy(&serde_json::json!({})));
        assert!(!is_truthy(&serde_json::json!(null)));
        assert!(is_truthy(&serde_json::json!(["GATEWAY_ERROR"])));
        assert!(is_truthy(&serde_json::json!("oops")));
    }

    #[test]
    fn test_clean_token() {
        assert_eq!(clean_token("  \"abc\"\n"), "abc");
        assert_eq!(clean_token("abc"), "abc");
    }

    #[test]
    fn test_arl_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets").join("arl.txt");

        write_arl_file(&path, "\"token-value\"").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "token-value\n");
        assert_eq!(read_arl_file(&path).unwrap(), "token-value");
    }

    #[test]
    fn test_missing_and_empty_arl_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(read_arl_file(&missing), Err(ArlError::MissingFile)));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\"\"\n").unwrap();
        assert!(matches!(read_arl_file(&empty), Err(ArlError::Empty(_))));
        assert!(matches!(write_arl_file(&empty, "  "), Err(ArlError::Empty(_))));
    }
}
