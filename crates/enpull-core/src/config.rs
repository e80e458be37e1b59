//! Run configuration loaded once from a JSON file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_EXPORT_URL: &str = "https://www.e-activist.com/ea-dataservice/export.service";
pub const DEFAULT_PERSON_TABLE: &str = "en_supporters";
pub const DEFAULT_ACCOUNT_ID: &str = "12";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config token is empty")]
    EmptyToken,
    #[error("invalid table name {0:?}")]
    BadTableName(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Export service authentication token.
    pub token: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    /// Account identifier written when a person event carries none.
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// DuckDB file. In-memory when absent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_url")]
    pub base_url: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: default_export_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_person_table")]
    pub person_events: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            person_events: default_person_table(),
        }
    }
}

fn default_export_url() -> String {
    DEFAULT_EXPORT_URL.to_string()
}

fn default_person_table() -> String {
    DEFAULT_PERSON_TABLE.to_string()
}

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

impl Config {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Config with defaults for everything but the token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database: DatabaseConfig::default(),
            export: ExportConfig::default(),
            tables: TablesConfig::default(),
            account_id: default_account_id(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if !is_identifier(&self.tables.person_events) {
            return Err(ConfigError::BadTableName(self.tables.person_events.clone()));
        }
        Ok(())
    }
}

/// Table names are interpolated into SQL, so they must be plain identifiers.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let file = write_config(r#"{"token": "abc"}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.token, "abc");
        assert!(config.database.path.is_none());
        assert_eq!(config.export.base_url, DEFAULT_EXPORT_URL);
        assert_eq!(config.tables.person_events, "en_supporters");
        assert_eq!(config.account_id, "12");
    }

    #[test]
    fn full_config() {
        let file = write_config(
            r#"{
                "token": "abc",
                "database": { "path": "/var/lib/enpull/en.duckdb" },
                "export": { "base_url": "http://localhost:8080/export" },
                "tables": { "person_events": "leads_2024" },
                "account_id": "7"
            }"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config.database.path.as_deref(),
            Some(Path::new("/var/lib/enpull/en.duckdb"))
        );
        assert_eq!(config.export.base_url, "http://localhost:8080/export");
        assert_eq!(config.tables.person_events, "leads_2024");
        assert_eq!(config.account_id, "7");
    }

    #[test]
    fn missing_token_is_rejected() {
        let file = write_config(r#"{"database": {}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn empty_token_is_rejected() {
        let file = write_config(r#"{"token": "  "}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::EmptyToken)
        ));
    }

    #[test]
    fn unsafe_table_name_is_rejected() {
        let file = write_config(
            r#"{"token": "abc", "tables": {"person_events": "x; DROP TABLE y"}}"#,
        );
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::BadTableName(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("en_supporters"));
        assert!(is_identifier("_t1"));
        assert!(!is_identifier("1t"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
