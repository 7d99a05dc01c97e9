//! Runtime configuration.
//!
//! Loaded from a TOML file when one is given, otherwise defaults. The
//! signing secret can always be overridden with `LABTRACK_SECRET`, which
//! keeps it out of config files on shared machines.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in development secret. Serving with it logs a warning.
pub const DEFAULT_SECRET: &str = "labtrack-dev-secret-change-me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path; `~` is expanded. Defaults to the platform data
    /// dir (e.g. `~/.local/share/labtrack/labtrack.db`).
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(raw) = &self.path {
            let expanded = shellexpand::tilde(raw);
            return Ok(PathBuf::from(expanded.as_ref()));
        }
        let dirs = directories::ProjectDirs::from("", "", "labtrack")
            .context("Could not determine a data directory; set [database] path")?;
        Ok(dirs.data_dir().join("labtrack.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing secret.
    pub secret: String,
    /// Token lifetime in seconds; 0 issues non-expiring tokens.
    pub token_ttl_secs: u64,
    /// Whether POST /api/register is open.
    pub allow_registration: bool,
    /// Whether to create the default `admin` user on startup.
    pub seed_admin: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.into(),
            token_ttl_secs: 0,
            allow_registration: true,
            seed_admin: true,
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

impl Config {
    /// Load configuration. A missing `path` means pure defaults; a present
    /// file must parse. `LABTRACK_SECRET` wins over the file in any case.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config: Config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config: {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config: {}", p.display()))?
            }
            None => Config::default(),
        };

        if let Ok(secret) = std::env::var("LABTRACK_SECRET") {
            let secret = secret.trim();
            if !secret.is_empty() {
                config.auth.secret = secret.to_string();
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_ttl_secs, 0);
        assert!(config.auth.allow_registration);
        assert!(config.auth.seed_admin);
        assert!(config.auth.uses_default_secret());
    }

    #[test]
    fn parses_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
path = "/tmp/lims.db"

[auth]
secret = "s3cret"
token_ttl_secs = 86400
allow_registration = false
seed_admin = false
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path.as_deref(), Some("/tmp/lims.db"));
        assert_eq!(config.auth.secret, "s3cret");
        assert_eq!(config.auth.token_ttl_secs, 86400);
        assert!(!config.auth.allow_registration);
        assert!(!config.auth.seed_admin);
        assert!(!config.auth.uses_default_secret());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.auth.allow_registration);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml ][").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn database_path_expands_tilde() {
        let config = DatabaseConfig {
            path: Some("~/labtrack/test.db".into()),
        };
        let resolved = config.resolved_path().unwrap();
        assert!(!resolved.to_string_lossy().contains('~'));
        assert!(resolved.ends_with("labtrack/test.db"));
    }

    #[test]
    fn explicit_database_path_is_used_verbatim() {
        let config = DatabaseConfig {
            path: Some("/var/lib/labtrack/lims.db".into()),
        };
        assert_eq!(
            config.resolved_path().unwrap(),
            PathBuf::from("/var/lib/labtrack/lims.db")
        );
    }
}
