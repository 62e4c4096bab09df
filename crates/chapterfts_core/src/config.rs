//! Application settings loaded from `appsettings.toml`.
//!
//! # Responsibility
//! - Deserialize database and logging settings.
//! - Resolve the `%CONTENTROOTPATH%` placeholder against a content root.
//!
//! # Invariants
//! - A missing `[logging]` table falls back to build-mode defaults.
//! - The connection string is never empty once loaded.

use crate::logging::{default_log_level, LogTarget};
use serde::Deserialize;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};

/// Default settings file name, looked up under the content root.
pub const SETTINGS_FILE_NAME: &str = "appsettings.toml";
/// Placeholder replaced with the content root directory.
pub const CONTENT_ROOT_TOKEN: &str = "%CONTENTROOTPATH%";
const MEMORY_CONNECTION: &str = ":memory:";
const DEFAULT_CONNECTION: &str = "%CONTENTROOTPATH%/chapters.db";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    MissingConnection,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid settings: {err}"),
            Self::MissingConnection => write!(f, "[database] connection cannot be empty"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::MissingConnection => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Where the database lives once placeholders are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    /// File path, `:memory:`, or a path containing `%CONTENTROOTPATH%`.
    #[serde(default = "default_connection")]
    pub connection: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection: default_connection(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files; stderr when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
        }
    }
}

impl LoggingSettings {
    pub fn target(&self) -> LogTarget {
        match &self.directory {
            Some(directory) => LogTarget::Directory(directory.clone()),
            None => LogTarget::Stderr,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSettings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppSettings {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when it exists, otherwise returns defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolves the configured connection against `content_root`.
    pub fn connection_target(&self, content_root: &Path) -> DatabaseTarget {
        let connection = self.database.connection.trim();
        if connection == MEMORY_CONNECTION {
            return DatabaseTarget::Memory;
        }

        let resolved = connection.replace(CONTENT_ROOT_TOKEN, &content_root.to_string_lossy());
        DatabaseTarget::File(PathBuf::from(resolved))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.connection.trim().is_empty() {
            return Err(ConfigError::MissingConnection);
        }
        Ok(())
    }
}

/// Content root for the running process.
///
/// When the working directory is inside a cargo `target/` tree, the part
/// before `target` is used so settings next to the workspace are found.
pub fn default_content_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    content_root_from(&cwd)
}

fn content_root_from(dir: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for component in dir.components() {
        if component == Component::Normal(OsStr::new("target")) {
            return root;
        }
        root.push(component);
    }
    root
}

fn default_connection() -> String {
    DEFAULT_CONNECTION.to_string()
}

fn default_level() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{content_root_from, AppSettings, ConfigError, DatabaseTarget};
    use std::path::{Path, PathBuf};

    #[test]
    fn content_root_strips_target_directory() {
        assert_eq!(
            content_root_from(Path::new("/work/app/target/debug")),
            PathBuf::from("/work/app")
        );
        assert_eq!(
            content_root_from(Path::new("/work/app")),
            PathBuf::from("/work/app")
        );
    }

    #[test]
    fn placeholder_is_replaced_with_content_root() {
        let settings = AppSettings::from_toml_str(
            "[database]\nconnection = \"%CONTENTROOTPATH%/data/app.db\"\n",
        )
        .unwrap();
        assert_eq!(
            settings.connection_target(Path::new("/srv/site")),
            DatabaseTarget::File(PathBuf::from("/srv/site/data/app.db"))
        );
    }

    #[test]
    fn memory_connection_is_recognized() {
        let settings =
            AppSettings::from_toml_str("[database]\nconnection = \":memory:\"\n").unwrap();
        assert_eq!(
            settings.connection_target(Path::new("/ignored")),
            DatabaseTarget::Memory
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let settings = AppSettings::from_toml_str("").unwrap();
        assert_eq!(settings, AppSettings::default());
        assert!(settings.logging.directory.is_none());
    }

    #[test]
    fn blank_connection_is_rejected() {
        let err = AppSettings::from_toml_str("[database]\nconnection = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingConnection));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppSettings::from_toml_str("[database]\nconection = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
