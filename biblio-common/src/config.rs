//! Service configuration
//!
//! Resolution priority for every setting: environment variable, then the TOML
//! config file, then the compiled default. The config file path itself can be
//! overridden with `BIBLIO_CONFIG`.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "BIBLIO_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "biblio.toml";

/// Runtime configuration for the API service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    /// Disables the regional catalog scrape fallback when false
    pub scrape_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5800,
            database_path: PathBuf::from("data/biblio.db"),
            uploads_dir: PathBuf::from("data/uploads"),
            jwt_secret: "biblio-dev-secret-change-me".to_string(),
            scrape_enabled: true,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the default locations.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load configuration from a specific TOML file, then apply environment
    /// overrides. A missing file is not an error; the defaults are used.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();

        if config.jwt_secret.trim().is_empty() {
            return Err(Error::Config("jwt_secret must not be empty".to_string()));
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BIBLIO_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("BIBLIO_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid BIBLIO_PORT"),
            }
        }
        if let Ok(path) = std::env::var("BIBLIO_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("BIBLIO_UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(path);
        }
        if let Ok(secret) = std::env::var("BIBLIO_JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Ok(flag) = std::env::var("BIBLIO_SCRAPE_ENABLED") {
            self.scrape_enabled = flag != "0" && !flag.eq_ignore_ascii_case("false");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = ServiceConfig::load_from(Path::new("/nonexistent/biblio.toml")).unwrap();
        assert_eq!(config.port, 5800);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.scrape_enabled);
    }

    #[test]
    fn toml_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6100\ndatabase_path = \"/tmp/test.db\"\nscrape_enabled = false"
        )
        .unwrap();

        let config = ServiceConfig::load_from(file.path()).unwrap();
        assert_eq!(config.port, 6100);
        assert_eq!(config.database_path, PathBuf::from("/tmp/test.db"));
        assert!(!config.scrape_enabled);
        // Untouched fields keep their defaults
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn rejects_empty_jwt_secret() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "jwt_secret = \"  \"").unwrap();

        assert!(ServiceConfig::load_from(file.path()).is_err());
    }
}
