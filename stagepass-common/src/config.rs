//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Runtime settings that may change without a restart live in the database
//! `settings` table instead (see [`crate::db::settings`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "STAGEPASS_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "STAGEPASS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "stagepass.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default, so a missing or partial file never prevents startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database and uploaded KYC documents
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Outbound notification settings (email + webhook)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook receiving one POST per audited action. Disabled when absent.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Sender address for templated emails
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Upper bound for a single email send
    #[serde(default = "default_mail_timeout_ms")]
    pub mail_timeout_ms: u64,

    /// Upper bound for a single webhook attempt
    #[serde(default = "default_webhook_timeout_ms")]
    pub webhook_timeout_ms: u64,

    /// Total webhook attempts (1 = no retry)
    #[serde(default = "default_webhook_max_attempts")]
    pub webhook_max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_webhook_retry_backoff_ms")]
    pub webhook_retry_backoff_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            from_address: default_from_address(),
            mail_timeout_ms: default_mail_timeout_ms(),
            webhook_timeout_ms: default_webhook_timeout_ms(),
            webhook_max_attempts: default_webhook_max_attempts(),
            webhook_retry_backoff_ms: default_webhook_retry_backoff_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_from_address() -> String {
    "no-reply@stagepass.local".to_string()
}

fn default_mail_timeout_ms() -> u64 {
    5000
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_max_attempts() -> u32 {
    3
}

fn default_webhook_retry_backoff_ms() -> u64 {
    500
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from `path`
    ///
    /// A missing file is not an error: a warning is logged and defaults are used.
    /// A file that exists but does not parse IS an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Locate the TOML config file
///
/// CLI argument, then `STAGEPASS_CONFIG`, then `<config_dir>/stagepass/stagepass.toml`.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .map(|d| d.join("stagepass").join("stagepass.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/stagepass/stagepass.toml"))
}

/// Resolve the root folder: CLI > `STAGEPASS_ROOT_FOLDER` > TOML > OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/stagepass (or /var/lib/stagepass for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("stagepass"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/stagepass"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("stagepass"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/stagepass"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("stagepass"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\stagepass"))
    } else {
        PathBuf::from("./stagepass_data")
    }
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder and the document folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.documents_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    /// Folder where uploaded KYC documents are stored
    pub fn documents_path(&self) -> PathBuf {
        self.root_folder.join("kyc_docs")
    }
}
