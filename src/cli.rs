use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input};
use tracing::info;

use crate::config::{self, DeezerConfig, TaggingConfig};
use crate::core::tagger;
use crate::error::{ArlError, SyncError};
use crate::models::{ClearPolicy, Field};
use crate::sources::deezer::{self, DeezerClient};
use crate::sources::SessionValidator;

#[derive(Parser)]
#[command(
    name = "mbtag",
    version,
    about = "MP3 파일에 앨범/아티스트/MusicBrainz ID3 태그를 동기화하는 도구"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 디버그 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일의 태그를 지정한 값으로 교체
    Tag(TagArgs),
    /// 파일의 현재 태그 값 표시
    Show {
        /// 확인할 MP3 파일
        file: PathBuf,
    },
    /// 저장된 Deezer ARL 토큰이 유효한지 확인
    CheckArl {
        /// ARL 파일 경로 (기본값: AUDIO_DEEMIX_ARL_FILE 또는 설정 파일)
        #[arg(long)]
        arl_file: Option<PathBuf>,
    },
    /// 새 ARL 토큰 저장
    SetArl {
        token: String,
        #[arg(long)]
        arl_file: Option<PathBuf>,
    },
    /// 설정 파일 편집
    Config,
}

/// 값은 옵션, 위치 인자, 환경 변수 순서로 찾는다.
/// 환경 변수: ALBUM_TITLE, ARTIST, ALBUMARTIST, MUSICBRAINZ_ALBUMID (MB_ALBUMID),
/// MUSICBRAINZ_RELEASEGROUPID (MB_RELEASEGROUPID), MUSICBRAINZ_ARTISTID
#[derive(Args, Debug)]
pub struct TagArgs {
    /// 수정할 MP3 파일
    pub file: PathBuf,

    /// 앨범 제목 (구버전 호출 방식)
    #[arg(value_name = "ALBUM_TITLE")]
    pub legacy_album: Option<String>,

    /// MusicBrainz 앨범 ID (구버전 호출 방식)
    #[arg(value_name = "MB_ALBUMID")]
    pub legacy_mb_album_id: Option<String>,

    /// MusicBrainz 릴리스 그룹 ID (구버전 호출 방식)
    #[arg(value_name = "MB_RELEASEGROUPID")]
    pub legacy_mb_release_group_id: Option<String>,

    #[arg(long)]
    pub album: Option<String>,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub album_artist: Option<String>,
    #[arg(long)]
    pub mb_album_id: Option<String>,
    #[arg(long)]
    pub mb_release_group_id: Option<String>,
    #[arg(long)]
    pub mb_artist_id: Option<String>,

    /// 값이 없는 필드의 기존 프레임도 삭제
    #[arg(long)]
    pub clear_unset: bool,
}

impl TagArgs {
    fn flag_values(&self) -> BTreeMap<Field, String> {
        collect([
            (Field::AlbumTitle, &self.album),
            (Field::Artist, &self.artist),
            (Field::AlbumArtist, &self.album_artist),
            (Field::MusicBrainzAlbumId, &self.mb_album_id),
            (Field::MusicBrainzReleaseGroupId, &self.mb_release_group_id),
            (Field::MusicBrainzArtistId, &self.mb_artist_id),
        ])
    }

    fn positional_values(&self) -> BTreeMap<Field, String> {
        collect([
            (Field::AlbumTitle, &self.legacy_album),
            (Field::MusicBrainzAlbumId, &self.legacy_mb_album_id),
            (Field::MusicBrainzReleaseGroupId, &self.legacy_mb_release_group_id),
        ])
    }
}

fn collect<'a>(
    pairs: impl IntoIterator<Item = (Field, &'a Option<String>)>,
) -> BTreeMap<Field, String> {
    pairs
        .into_iter()
        .filter_map(|(field, value)| value.clone().map(|v| (field, v)))
        .collect()
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Tag(args) => cmd_tag(&args),
        Commands::Show { file } => cmd_show(&file),
        Commands::CheckArl { arl_file } => cmd_check_arl(arl_file),
        Commands::SetArl { token, arl_file } => cmd_set_arl(&token, arl_file),
        Commands::Config => cmd_config(),
    }
}

fn cmd_tag(args: &TagArgs) -> Result<()> {
    let cfg = config::load_config();
    let update = config::resolve_update(
        &args.flag_values(),
        &args.positional_values(),
        config::env_lookup,
    );
    let policy = cfg.tagging.policy(args.clear_unset);

    if update.is_empty() && policy == ClearPolicy::Conditional {
        return Err(SyncError::MissingInput(
            "옵션, 위치 인자 또는 환경 변수로 하나 이상의 값을 지정하세요".to_string(),
        )
        .into());
    }

    let report = tagger::sync_file(&args.file, &update, policy)?;
    info!(
        path = %args.file.display(),
        fields = update.len(),
        source_version = ?report.source_version,
        "tag synchronized"
    );

    println!(
        "태그가 업데이트되었습니다: {} ({})",
        args.file.display(),
        report.summary()
    );
    for outcome in &report.outcomes {
        match &outcome.written {
            Some(value) => println!("  {}: {}", outcome.field.label(), value),
            None if outcome.removed > 0 => println!("  {}: 삭제됨", outcome.field.label()),
            None => {}
        }
    }
    Ok(())
}

fn cmd_show(file: &Path) -> Result<()> {
    let fields = tagger::read_fields(file)?;

    let mut table = Table::new();
    table.set_header(vec!["필드", "프레임", "값"]);

    for (field, values) in &fields {
        let shown = if values.is_empty() {
            "-".to_string()
        } else {
            values.join(" | ")
        };
        table.add_row(vec![
            Cell::new(field.label()),
            Cell::new(field.key().to_string()),
            Cell::new(&shown),
        ]);
    }

    println!("{table}");

    let duplicated: Vec<_> = fields.iter().filter(|(_, v)| v.len() > 1).collect();
    if !duplicated.is_empty() {
        println!(
            "\n중복된 프레임이 있습니다: {}",
            duplicated
                .iter()
                .map(|(f, _)| f.key().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

/// 토큰 하나를 검증한다.
fn check_session(validator: &dyn SessionValidator, token: &str) -> Result<u64, ArlError> {
    info!(service = validator.name(), "checking session token");
    validator.validate(token).into_result()
}

fn arl_path(flag: Option<PathBuf>, deezer: &DeezerConfig) -> Result<PathBuf, ArlError> {
    config::resolve_arl_file(flag, deezer, config::env_lookup).ok_or(ArlError::MissingFile)
}

fn cmd_check_arl(arl_file: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config();
    let path = arl_path(arl_file, &cfg.deezer)?;
    let token = deezer::read_arl_file(&path)?;

    let client = DeezerClient::new(&cfg.deezer)?;
    let user_id = check_session(&client, &token)?;

    println!("ARL 토큰 확인 완료. 문제가 없습니다. (USER_ID {})", user_id);
    Ok(())
}

fn cmd_set_arl(token: &str, arl_file: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config();
    let path = arl_path(arl_file, &cfg.deezer)?;
    deezer::write_arl_file(&path, token)?;
    println!("새 ARL 토큰을 저장했습니다: {}", path.display());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let mut cfg = config::load_config();

    println!("mbtag 설정\n");

    let current_arl = cfg
        .deezer
        .arl_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let arl_file: String = Input::new()
        .with_prompt("ARL 파일 경로")
        .with_initial_text(current_arl)
        .allow_empty(true)
        .interact_text()?;

    let current_agent = cfg
        .deezer
        .user_agent
        .clone()
        .unwrap_or_else(|| deezer::DEFAULT_USER_AGENT.to_string());

    let user_agent: String = Input::new()
        .with_prompt("User-Agent")
        .with_initial_text(current_agent)
        .interact_text()?;

    let clear_unset = Confirm::new()
        .with_prompt("값이 없는 필드의 기존 프레임도 삭제할까요?")
        .default(cfg.tagging.clear_unset)
        .interact()?;

    cfg.deezer = DeezerConfig {
        arl_file: Some(arl_file)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        gateway_url: cfg.deezer.gateway_url.take(),
        user_agent: Some(user_agent).filter(|s| s != deezer::DEFAULT_USER_AGENT),
    };
    cfg.tagging = TaggingConfig { clear_unset };

    let path = config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다: {}", path.display());
    Ok(())
}
