//! Configuration loading and root folder resolution
//!
//! The service reads its configuration once at startup into a [`Config`]
//! that is passed explicitly to the components that need it.
//!
//! Priority order, highest first:
//! 1. Command-line argument or its environment variable (resolved by the binary)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Default maximum request payload (500 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// Default notification queue depth
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 64;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Persistence backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Per-athlete JSON files next to the uploads
    #[default]
    Document,
    /// SQLite `checkins` table
    Relational,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Document => "document",
            BackendKind::Relational => "relational",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "json" => Ok(BackendKind::Document),
            "relational" | "sqlite" | "database" => Ok(BackendKind::Relational),
            other => Err(Error::Config(format!(
                "Unknown backend '{}' (expected 'document' or 'relational')",
                other
            ))),
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub coach_password: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub strict_extensions: Option<bool>,
    pub notify_webhook_url: Option<String>,
    pub notify_queue_capacity: Option<usize>,
}

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub coach_password: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub strict_extensions: Option<bool>,
    pub notify_webhook_url: Option<String>,
    pub notify_queue_capacity: Option<usize>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Folder holding `uploads/` and the SQLite database
    pub root_folder: PathBuf,
    pub backend: BackendKind,
    pub database_path: PathBuf,
    pub bind_addr: String,
    /// Coach dashboard password; `None` disables the dashboard
    pub coach_password: Option<String>,
    pub max_upload_bytes: usize,
    /// Reject attachments whose extension is not an allowed image/video type
    pub strict_extensions: bool,
    pub notify_webhook_url: Option<String>,
    pub notify_queue_capacity: usize,
}

impl Config {
    /// Merge overrides, TOML values and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: Option<TomlConfig>) -> Result<Self> {
        let toml = toml.unwrap_or_default();

        let root_folder = overrides
            .root_folder
            .or(toml.root_folder)
            .unwrap_or_else(default_root_folder);

        let database_path = overrides
            .database_path
            .or(toml.database_path)
            .unwrap_or_else(|| root_folder.join("checkins.db"));

        let max_upload_bytes = overrides
            .max_upload_bytes
            .or(toml.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be greater than 0".to_string()));
        }

        let notify_queue_capacity = overrides
            .notify_queue_capacity
            .or(toml.notify_queue_capacity)
            .unwrap_or(DEFAULT_NOTIFY_QUEUE_CAPACITY);
        if notify_queue_capacity == 0 {
            return Err(Error::Config(
                "notify_queue_capacity must be greater than 0".to_string(),
            ));
        }

        let coach_password = overrides
            .coach_password
            .or(toml.coach_password)
            .filter(|p| !p.is_empty());

        Ok(Self {
            root_folder,
            backend: overrides.backend.or(toml.backend).unwrap_or_default(),
            database_path,
            bind_addr: overrides
                .bind_addr
                .or(toml.bind_addr)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            coach_password,
            max_upload_bytes,
            strict_extensions: overrides
                .strict_extensions
                .or(toml.strict_extensions)
                .unwrap_or(false),
            notify_webhook_url: overrides
                .notify_webhook_url
                .or(toml.notify_webhook_url)
                .filter(|u| !u.is_empty()),
            notify_queue_capacity,
        })
    }

    /// Configuration rooted at `root` with every other value defaulted
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root_folder = root.into();
        Self {
            database_path: root_folder.join("checkins.db"),
            root_folder,
            backend: BackendKind::default(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            coach_password: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            strict_extensions: false,
            notify_webhook_url: None,
            notify_queue_capacity: DEFAULT_NOTIFY_QUEUE_CAPACITY,
        }
    }

    /// Directory holding athlete namespaces and document-store files
    pub fn upload_root(&self) -> PathBuf {
        self.root_folder.join("uploads")
    }
}

/// Load the TOML config file
///
/// An explicitly named file must exist and parse. Without one, the
/// platform default location is tried; a missing or unreadable default
/// file is not an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<Option<TomlConfig>> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        info!("Loaded config file: {}", path.display());
        return Ok(Some(config));
    }

    let Some(path) = default_config_file() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    match std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str::<TomlConfig>(&content).map_err(|e| e.to_string()))
    {
        Ok(config) => {
            info!("Loaded config file: {}", path.display());
            Ok(Some(config))
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Platform config file location (`~/.config/checkin/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("checkin").join("config.toml"))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("checkin"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\checkin"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("checkin"))
            .unwrap_or_else(|| PathBuf::from("./checkin_data"))
    }
}
