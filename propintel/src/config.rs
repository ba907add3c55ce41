//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `PROPINTEL_*` environment variables.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::export::{DEFAULT_EMAIL_CEILING, DEFAULT_EMAIL_ENTRIES, DEFAULT_EMAIL_IMAGES};
use crate::store::{FileStorage, DEFAULT_STORAGE_KEY};

pub const ENV_API_URL: &str = "PROPINTEL_API_URL";
pub const ENV_EMAIL_URL: &str = "PROPINTEL_EMAIL_URL";
pub const ENV_DATA_DIR: &str = "PROPINTEL_DATA_DIR";
pub const ENV_TIMEOUT_SECS: &str = "PROPINTEL_TIMEOUT_SECS";

/// Analysis API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
            cache_ttl_secs: 300,
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Email transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Full send-email URL. Defaults to `<api.base_url>/api/send-email`.
    pub endpoint: Option<String>,
    pub max_attachment_bytes: usize,
    pub max_entries: usize,
    pub max_images: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_attachment_bytes: DEFAULT_EMAIL_CEILING,
            max_entries: DEFAULT_EMAIL_ENTRIES,
            max_images: DEFAULT_EMAIL_IMAGES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where downloads are saved. Defaults to the user's download directory.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub max_visible: usize,
    pub default_duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_visible: 5,
            default_duration_ms: 4000,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub email: EmailConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    /// Default config file location: `<config_dir>/propintel/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("propintel").join("config.toml"))
    }

    /// Load all layers. An explicit `path` must parse; a missing default
    /// file is skipped.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a TOML file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(url) = lookup(ENV_EMAIL_URL) {
            self.email.endpoint = Some(url);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.api.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a number of seconds"))?;
        }
        Ok(())
    }

    pub fn email_endpoint(&self) -> String {
        self.email.endpoint.clone().unwrap_or_else(|| {
            format!("{}/api/send-email", self.api.base_url.trim_end_matches('/'))
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileStorage::default_dir()
                .context("Could not determine a data directory; set PROPINTEL_DATA_DIR"),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
