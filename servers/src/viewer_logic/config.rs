//! Layered configuration: built-in defaults < JSON config file < env / CLI.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lib_common::bilibili::KEY_VALIDITY;
use lib_common::ingestors::DEFAULT_REFRESH_INTERVAL;

pub const DEFAULT_CONFIG_FILE: &str = "server_viewer.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[clap(about = "Sekai master-data and bilibili proxy backend", version)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[clap(long, env = "VIEWER_PORT", help = "Port to listen on.")]
    pub port: Option<u16>,

    #[clap(long, env = "VIEWER_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "VIEWER_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "VIEWER_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "VIEWER_MASTER_DATA_DIR", help = "Directory holding local master-data snapshots.")]
    pub master_data_dir: Option<PathBuf>,

    #[clap(long, env = "VIEWER_STATIC_DIR", help = "Directory of the built frontend.")]
    pub static_dir: Option<PathBuf>,

    #[clap(long, env = "VIEWER_REFRESH_INTERVAL_SECS", help = "Seconds between master-data refreshes.")]
    pub refresh_interval_secs: Option<u64>,

    #[clap(long, env = "VIEWER_API_CACHE_TTL_SECS", help = "Lifetime of cached bilibili API responses.")]
    pub api_cache_ttl_secs: Option<u64>,

    #[clap(long, env = "VIEWER_IMAGE_CACHE_TTL_SECS", help = "Lifetime of cached images.")]
    pub image_cache_ttl_secs: Option<u64>,

    #[clap(long, env = "VIEWER_CACHE_CAPACITY", help = "Maximum entries per response cache.")]
    pub cache_capacity: Option<usize>,

    #[clap(long, env = "VIEWER_WBI_KEY_TTL_SECS", help = "Seconds a fetched WBI key stays valid.")]
    pub wbi_key_ttl_secs: Option<u64>,

    #[clap(long, env = "BILIBILI_SESSDATA", help = "SESSDATA cookie for signed bilibili requests.")]
    pub bilibili_sessdata: Option<String>,

    #[clap(long, env = "BILIBILI_COOKIE", help = "Full Cookie header; overrides BILIBILI_SESSDATA.")]
    pub bilibili_cookie: Option<String>,
}

/// Fully resolved settings handed to the rest of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub master_data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub refresh_interval: Duration,
    pub api_cache_ttl: Duration,
    pub image_cache_ttl: Duration,
    pub cache_capacity: usize,
    pub wbi_key_ttl: Duration,
    pub bilibili_sessdata: Option<String>,
    pub bilibili_cookie: Option<String>,
}

impl Config {
    pub fn defaults() -> Config {
        Config {
            port: Some(8080),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            master_data_dir: Some(PathBuf::from("./data/master")),
            static_dir: Some(PathBuf::from("./dist")),
            refresh_interval_secs: Some(DEFAULT_REFRESH_INTERVAL.as_secs()),
            api_cache_ttl_secs: Some(600),
            image_cache_ttl_secs: Some(3600),
            cache_capacity: Some(1000),
            wbi_key_ttl_secs: Some(KEY_VALIDITY.as_secs()),
            ..Default::default()
        }
    }

    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            master_data_dir: other.master_data_dir.or(self.master_data_dir),
            static_dir: other.static_dir.or(self.static_dir),
            refresh_interval_secs: other.refresh_interval_secs.or(self.refresh_interval_secs),
            api_cache_ttl_secs: other.api_cache_ttl_secs.or(self.api_cache_ttl_secs),
            image_cache_ttl_secs: other.image_cache_ttl_secs.or(self.image_cache_ttl_secs),
            cache_capacity: other.cache_capacity.or(self.cache_capacity),
            wbi_key_ttl_secs: other.wbi_key_ttl_secs.or(self.wbi_key_ttl_secs),
            bilibili_sessdata: other.bilibili_sessdata.or(self.bilibili_sessdata),
            bilibili_cookie: other.bilibili_cookie.or(self.bilibili_cookie),
        }
    }

    /// Fills every unset field from [`Config::defaults`].
    pub fn settings(self) -> Settings {
        let c = Config::defaults().merge(self);
        Settings {
            port: c.port.unwrap_or(8080),
            log_dir: c.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: c.log_level.unwrap_or_else(|| "info".to_string()),
            master_data_dir: c.master_data_dir.unwrap_or_else(|| PathBuf::from("./data/master")),
            static_dir: c.static_dir.unwrap_or_else(|| PathBuf::from("./dist")),
            refresh_interval: c.refresh_interval_secs.map_or(DEFAULT_REFRESH_INTERVAL, Duration::from_secs),
            api_cache_ttl: Duration::from_secs(c.api_cache_ttl_secs.unwrap_or(600)),
            image_cache_ttl: Duration::from_secs(c.image_cache_ttl_secs.unwrap_or(3600)),
            cache_capacity: c.cache_capacity.unwrap_or(1000),
            wbi_key_ttl: c.wbi_key_ttl_secs.map_or(KEY_VALIDITY, Duration::from_secs),
            bilibili_sessdata: c.bilibili_sessdata.filter(|s| !s.is_empty()),
            bilibili_cookie: c.bilibili_cookie.filter(|s| !s.is_empty()),
        }
    }
}

/// Reads a JSON config file. A missing or broken file is not fatal.
fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        tracing::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                tracing::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers defaults, the config file named by `cli` (or the default file) and
/// `cli` itself, which already carries env values.
pub fn resolve(cli: Config) -> Settings {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli).settings()
}

pub fn load_config() -> Settings {
    resolve(Config::parse())
}
