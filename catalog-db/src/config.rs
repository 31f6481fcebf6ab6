//! Configuration loading
//!
//! Reads `DATABASE_URL` and `ENVIRONMENT` from the process environment,
//! optionally seeded from a local `.env` file. Real environment variables
//! always win over the file, so the same code path works locally and inside
//! a container.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{DbError, Result};

/// Environment variable holding the connection string
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Environment variable holding the deployment mode
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";

/// Load `.env` from the current directory (or a parent) if one exists.
///
/// Variables already present in the process environment are not
/// overwritten. A missing file is not an error; an unreadable or malformed
/// one is.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!("Loaded .env from {}", path.display());
            Ok(Some(path))
        }
        Err(e) if e.not_found() => {
            info!("Using environment variables only (no .env file found)");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load a specific `.env`-style file without overriding existing variables.
pub fn load_dotenv_from(path: &Path) -> Result<()> {
    dotenvy::from_path(path)?;
    debug!("Loaded .env from {}", path.display());
    Ok(())
}

/// Deployment mode taken from `ENVIRONMENT`.
///
/// Only the exact value `development` selects [`Environment::Development`];
/// matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    Named(String),
    #[default]
    Unspecified,
}

impl Environment {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => Self::Unspecified,
            Some("development") => Self::Development,
            Some(other) => Self::Named(other.to_string()),
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Named(name) => f.write_str(name),
            Self::Unspecified => f.write_str("unspecified"),
        }
    }
}

/// Database configuration resolved at startup. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub environment: Environment,
}

// Keep credentials embedded in the URL out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("database_url", &"<redacted>")
            .field("environment", &self.environment)
            .finish()
    }
}

impl DatabaseConfig {
    /// Load `.env` (if present) and read configuration from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingDatabaseUrl`] when `DATABASE_URL` is unset
    /// or blank, and [`DbError::Dotenv`] when a `.env` file exists but cannot
    /// be parsed.
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL_VAR)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or(DbError::MissingDatabaseUrl)?;

        let environment = Environment::parse(lookup(ENVIRONMENT_VAR).as_deref());

        Ok(Self {
            database_url,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_database_url_fails() {
        let err = DatabaseConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, DbError::MissingDatabaseUrl));
    }

    #[test]
    fn blank_database_url_fails() {
        let err = DatabaseConfig::from_lookup(lookup_from(&[("DATABASE_URL", "   ")]))
            .unwrap_err();
        assert!(matches!(err, DbError::MissingDatabaseUrl));
    }

    #[test]
    fn reads_url_and_environment() {
        let config = DatabaseConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://catalog@localhost/catalog"),
            ("ENVIRONMENT", "development"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://catalog@localhost/catalog");
        assert!(config.environment.is_development());
    }

    #[test]
    fn environment_is_case_sensitive() {
        assert!(Environment::parse(Some("development")).is_development());
        assert!(!Environment::parse(Some("Development")).is_development());
        assert!(!Environment::parse(Some("production")).is_development());
        assert_eq!(Environment::parse(None), Environment::Unspecified);
    }

    #[test]
    fn debug_redacts_url() {
        let config = DatabaseConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://admin:hunter2@db/catalog",
        )]))
        .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn dotenv_file_does_not_override_existing_vars() {
        std::env::set_var("CATALOG_DB_TEST_PRESET", "from-process");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CATALOG_DB_TEST_PRESET=from-file").unwrap();
        writeln!(file, "CATALOG_DB_TEST_FRESH=from-file").unwrap();

        load_dotenv_from(file.path()).unwrap();

        assert_eq!(
            std::env::var("CATALOG_DB_TEST_PRESET").unwrap(),
            "from-process"
        );
        assert_eq!(std::env::var("CATALOG_DB_TEST_FRESH").unwrap(), "from-file");
    }
}
