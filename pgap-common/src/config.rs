//! Configuration loading and root folder resolution
//!
//! Missing or malformed TOML never stops startup: a warning is logged and
//! compiled defaults are used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PGAP_ROOT_FOLDER";

/// Remote store file name inside the root folder
pub const DATABASE_FILE: &str = "pgap.db";

/// Local cache file name inside the root folder
pub const CACHE_FILE: &str = "pgap-cache.json";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Default bound on the remote availability probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1500;

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Contents of `pgap.toml`; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// Remote store database file (defaults to `{root}/pgap.db`)
    pub remote_database: Option<PathBuf>,
    /// Local cache file (defaults to `{root}/pgap-cache.json`)
    pub cache_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub probe_timeout_ms: Option<u64>,
    /// Seed/demo assessment that must not be recreated once deleted
    pub demo_assessment_id: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load from the platform config location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            debug!("No pgap.toml found, using compiled defaults");
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} - using compiled defaults", e);
                Self::default()
            }
        }
    }

    /// Copy with the root folder, both store files and the port pinned to
    /// the values in effect
    pub fn resolved(&self, root: &Path, remote_database: &Path, cache_file: &Path, port: u16) -> Self {
        Self {
            root_folder: Some(root.to_path_buf()),
            remote_database: Some(remote_database.to_path_buf()),
            cache_file: Some(cache_file.to_path_buf()),
            port: Some(port),
            probe_timeout_ms: Some(self.probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS)),
            ..self.clone()
        }
    }

    /// Store-level settings derived from this file
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            probe_timeout_ms: self.probe_timeout_ms.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
            demo_assessment_id: self.demo_assessment_id.clone(),
        }
    }
}

/// Runtime settings of the hybrid store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Bound on the remote availability probe
    pub probe_timeout_ms: u64,
    pub demo_assessment_id: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            demo_assessment_id: None,
        }
    }
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Existing config file: `~/.config/pgap/pgap.toml`, then `/etc/pgap/pgap.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("pgap").join("pgap.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    let system_config = PathBuf::from("/etc/pgap/pgap.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }
    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pgap"))
        .unwrap_or_else(|| PathBuf::from("./pgap_data"))
}

/// Root folder resolution in priority order:
/// 1. Command-line argument
/// 2. `PGAP_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent compiled default
pub struct RootFolderResolver<'a> {
    cli_arg: Option<PathBuf>,
    config: &'a TomlConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(config: &'a TomlConfig) -> Self {
        Self { cli_arg: None, config }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.config.root_folder {
            return path.clone();
        }
        default_root_folder()
    }
}

/// Creates the root folder and names the files inside it
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join(CACHE_FILE)
    }
}
