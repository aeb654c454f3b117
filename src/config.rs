use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bluesky::DEFAULT_SERVICE_URL;
use crate::data::DEFAULT_PAGE_SIZE;
use crate::timeline::TimelineOptions;

const DEFAULT_ENV_PREFIX: &str = "BSKY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_service_url")]
    pub url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            timeout: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl AuthConfig {
    pub fn has_login(&self) -> bool {
        !self.handle.trim().is_empty() && !self.password.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_item_height")]
    pub item_height: u16,
    #[serde(default = "default_reserved_rows")]
    pub reserved_rows: u16,
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: usize,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            item_height: default_item_height(),
            reserved_rows: default_reserved_rows(),
            prefetch_threshold: default_prefetch_threshold(),
        }
    }
}

fn default_item_height() -> u16 {
    6
}

fn default_reserved_rows() -> u16 {
    8
}

fn default_prefetch_threshold() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

impl Config {
    pub fn timeline_options(&self) -> TimelineOptions {
        TimelineOptions {
            item_height: self.ui.item_height.max(1),
            reserved_rows: self.ui.reserved_rows,
            prefetch_threshold: self.ui.prefetch_threshold,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    let path = options.config_file.or_else(default_config_path);
    if let Some(path) = path.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.service.url.trim().is_empty() {
        base.service.url = other.service.url;
    }
    if !other.service.timeout.is_zero() {
        base.service.timeout = other.service.timeout;
    }
    if other.service.page_size != 0 {
        base.service.page_size = other.service.page_size;
    }

    if !other.auth.handle.is_empty() {
        base.auth.handle = other.auth.handle;
    }
    if !other.auth.password.is_empty() {
        base.auth.password = other.auth.password;
    }

    if other.ui.item_height != 0 {
        base.ui.item_height = other.ui.item_height;
    }
    base.ui.reserved_rows = other.ui.reserved_rows;
    base.ui.prefetch_threshold = other.ui.prefetch_threshold;

    if !other.log.level.is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "service" | "service.url" => cfg.service.url = value,
        "service.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.service.timeout = duration;
            }
        }
        "service.page_size" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.service.page_size = parsed;
            }
        }
        "handle" | "auth.handle" => cfg.auth.handle = value,
        "password" | "auth.password" => cfg.auth.password = value,
        "ui.item_height" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.ui.item_height = parsed;
            }
        }
        "ui.reserved_rows" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.ui.reserved_rows = parsed;
            }
        }
        "ui.prefetch_threshold" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.ui.prefetch_threshold = parsed;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bsky-tui").join("config.yaml"))
}
