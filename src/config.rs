use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{ClearPolicy, Field, TagUpdate};

/// ARL 파일 경로를 지정하는 환경 변수.
pub const ARL_FILE_ENV: &str = "AUDIO_DEEMIX_ARL_FILE";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub deezer: DeezerConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeezerConfig {
    pub arl_file: Option<PathBuf>,
    pub gateway_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaggingConfig {
    #[serde(default)]
    pub clear_unset: bool,
}

impl TaggingConfig {
    pub fn policy(&self, clear_unset_flag: bool) -> ClearPolicy {
        if clear_unset_flag || self.clear_unset {
            ClearPolicy::ClearUnset
        } else {
            ClearPolicy::Conditional
        }
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("mbtag")
        .join("config.toml")
}

pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// 설정 파일을 읽는다. 파일이 없거나 형식이 잘못되었으면 기본값을 쓴다.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// 필드 값을 결정한다.
/// 우선순위: 명시적 옵션, 위치 인자, 정식 환경 변수, 구버전 별칭 환경 변수.
/// 빈 값은 없는 것으로 본다.
pub fn resolve_update<F>(
    flags: &BTreeMap<Field, String>,
    positional: &BTreeMap<Field, String>,
    lookup: F,
) -> TagUpdate
where
    F: Fn(&str) -> Option<String>,
{
    let mut update = TagUpdate::new();

    for field in Field::ALL {
        let explicit = [flags.get(&field), positional.get(&field)]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .cloned();

        let value = explicit.or_else(|| resolve_env(field, &lookup));
        if let Some(value) = value {
            update.set(field, value);
        }
    }

    update
}

fn resolve_env<F>(field: Field, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let found: Vec<(&str, String)> = field
        .env_keys()
        .iter()
        .filter_map(|key| lookup(key).filter(|v| !v.is_empty()).map(|v| (*key, v)))
        .collect();

    let (first_key, first_value) = found.first()?;
    for (key, value) in found.iter().skip(1) {
        if value != first_value {
            warn!(
                used = first_key,
                ignored = key,
                "conflicting environment values, using the canonical name"
            );
        }
    }
    debug!(field = ?field, source = first_key, "value taken from environment");
    Some(first_value.clone())
}

/// ARL 파일 경로를 결정한다. 옵션, 환경 변수, 설정 파일 순서.
pub fn resolve_arl_file<F>(flag: Option<PathBuf>, config: &DeezerConfig, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    flag.or_else(|| {
        lookup(ARL_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
    .or_else(|| config.arl_file.clone())
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
