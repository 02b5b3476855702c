//! Configuration from the environment.
//!
//! A `.env` file in the current directory is loaded first (see [`load_dotenv`]);
//! variables already set in the process environment take precedence.

use std::path::{Path, PathBuf};
use thiserror::Error;

const DB_KEYS: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_NAME", "DB_USER", "DB_PASSWORD"];
const STORAGE_KEY: &str = "STORAGE_PATH";

/// Database connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.name)
            .user(&self.user)
            .password(&self.password)
            .application_name("dbloader");
        config
    }

    /// Connection target without the password, for logs.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Everything read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db: DbConfig,
    /// Root directory input files are resolved against
    pub storage_path: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let missing: Vec<String> = DB_KEYS
            .iter()
            .filter(|&&key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required =
            |key: &str| get(key).ok_or_else(|| ConfigError::Missing(vec![key.to_string()]));

        let port = required("DB_PORT")?;
        let port = port.parse::<u16>().map_err(|_| ConfigError::Invalid {
            key: "DB_PORT",
            value: port.clone(),
            reason: "expected a port number".to_string(),
        })?;

        Ok(Self {
            db: DbConfig {
                host: required("DB_HOST")?,
                port,
                name: required("DB_NAME")?,
                user: required("DB_USER")?,
                password: required("DB_PASSWORD")?,
            },
            storage_path: get(STORAGE_KEY).map(PathBuf::from),
        })
    }

    /// Resolve an input file name against the storage root.
    pub fn resolve_input(&self, file: &Path) -> Result<PathBuf, ConfigError> {
        let root = self
            .storage_path
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(vec![STORAGE_KEY.to_string()]))?;
        Ok(root.join(file))
    }
}

/// Load `.env` from the current directory, if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable environment file"),
    }
}

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5432"),
            ("DB_NAME", "app"),
            ("DB_USER", "loader"),
            ("DB_PASSWORD", "hunter2"),
        ]
    }

    #[test]
    fn test_complete_config() {
        let mut pairs = complete();
        pairs.push(("STORAGE_PATH", "/data"));
        let config = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.db.display_target(), "loader@localhost:5432/app");
        assert_eq!(
            config.resolve_input(Path::new("sample.csv")).unwrap(),
            PathBuf::from("/data/sample.csv")
        );
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let err =
            Config::from_lookup(env(&[("DB_HOST", "localhost"), ("DB_USER", "")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required environment variables: DB_PORT, DB_NAME, DB_USER, DB_PASSWORD"
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = complete();
        pairs[1] = ("DB_PORT", "postgres");
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_storage_path_only_needed_for_files() {
        let config = Config::from_lookup(env(&complete())).unwrap();
        assert!(config.storage_path.is_none());
        let err = config.resolve_input(Path::new("sample.csv")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required environment variables: STORAGE_PATH"
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config::from_lookup(env(&complete())).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }
}
