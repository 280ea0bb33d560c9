//! INI configuration file.
//!
//! Settings live in `~/.tilechanges/config.ini`:
//!
//! ```ini
//! [store]
//! backend = file
//! directory = /home/me/.tilechanges/checkpoints
//! native_crs = EPSG:4326
//!
//! [logging]
//! level = info
//! directory = /home/me/.tilechanges/logs
//!
//! [changes]
//! default_tile_matrix_set = WebMercatorQuad
//! ```
//!
//! Missing keys take their defaults. Malformed values are errors.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::geometry::Crs;

const CONFIG_DIR_NAME: &str = ".tilechanges";
const CONFIG_FILE_NAME: &str = "config.ini";

const SECTION_STORE: &str = "store";
const SECTION_LOGGING: &str = "logging";
const SECTION_CHANGES: &str = "changes";

/// Default tile matrix set for change queries.
pub const DEFAULT_TILE_MATRIX_SET: &str = "WebMercatorQuad";

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Where checkpoints are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    File,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            other => Err(format!("expected 'memory' or 'file', got '{}'", other)),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: BackendKind,
    /// Root directory of the file backend.
    pub directory: PathBuf,
    /// Reference frame footprints are stored in.
    pub native_crs: Crs,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            directory: config_directory().join("checkpoints"),
            native_crs: Crs::WGS84,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `tilechanges=debug`.
    pub level: String,
    /// Enables daily rolling log files in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// `[changes]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesSettings {
    pub default_tile_matrix_set: String,
}

impl Default for ChangesSettings {
    fn default() -> Self {
        Self {
            default_tile_matrix_set: DEFAULT_TILE_MATRIX_SET.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub store: StoreSettings,
    pub logging: LoggingSettings,
    pub changes: ChangesSettings,
}

impl ConfigFile {
    /// Load from the default location, or defaults if the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config_file_path())
    }

    /// Load from `path`, or defaults if the file is absent.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }
}

/// A settable configuration key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    StoreBackend,
    StoreDirectory,
    StoreNativeCrs,
    LoggingLevel,
    LoggingDirectory,
    ChangesDefaultTileMatrixSet,
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::StoreBackend,
            ConfigKey::StoreDirectory,
            ConfigKey::StoreNativeCrs,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
            ConfigKey::ChangesDefaultTileMatrixSet,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::StoreBackend | ConfigKey::StoreDirectory | ConfigKey::StoreNativeCrs => {
                SECTION_STORE
            }
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => SECTION_LOGGING,
            ConfigKey::ChangesDefaultTileMatrixSet => SECTION_CHANGES,
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::StoreBackend => "backend",
            ConfigKey::StoreDirectory => "directory",
            ConfigKey::StoreNativeCrs => "native_crs",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::ChangesDefaultTileMatrixSet => "default_tile_matrix_set",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::StoreBackend => config.store.backend.to_string(),
            ConfigKey::StoreDirectory => config.store.directory.display().to_string(),
            ConfigKey::StoreNativeCrs => config.store.native_crs.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            ConfigKey::ChangesDefaultTileMatrixSet => {
                config.changes.default_tile_matrix_set.clone()
            }
        }
    }

    /// Parse `value` and store it in `config`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        };

        match self {
            ConfigKey::StoreBackend => config.store.backend = value.parse().map_err(invalid)?,
            ConfigKey::StoreDirectory => {
                if value.is_empty() {
                    return Err(invalid("directory must not be empty".to_string()));
                }
                config.store.directory = expand_tilde(value);
            }
            ConfigKey::StoreNativeCrs => {
                config.store.native_crs = value.parse().map_err(|e| invalid(format!("{}", e)))?
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(invalid("level must not be empty".to_string()));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = if value.is_empty() {
                    None
                } else {
                    Some(expand_tilde(value))
                };
            }
            ConfigKey::ChangesDefaultTileMatrixSet => {
                if value.is_empty() {
                    return Err(invalid("tile matrix set id must not be empty".to_string()));
                }
                config.changes.default_tile_matrix_set = value.to_string();
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// `~/.tilechanges`, or `./.tilechanges` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.tilechanges/config.ini`
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
