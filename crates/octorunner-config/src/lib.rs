// SPDX-License-Identifier: MIT OR Apache-2.0
//! octorunner-config
//!
//! Loads [`RunnerConfig`] from an optional TOML file, applies the
//! `OCTORUNNER_*` environment overlay (spec.md §6), and validates the
//! result — the same load → overlay → validate pipeline the teacher's
//! `abp-config` crate uses for `BackplaneConfig`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable prefix for the overlay (spec.md §6).
pub const ENV_PREFIX: &str = "OCTORUNNER";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent startup but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No secret configured for a repository that has webhooks pointed at
    /// this runner — every push for it will be processed unverified
    /// (spec.md §4.1, §9 open question).
    RepositoryWithoutSecret {
        /// Repository full name (`owner/repo`).
        full_name: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::RepositoryWithoutSecret { full_name } => write!(
                f,
                "repository '{full_name}' has no webhook secret configured; pushes for it will be processed unverified"
            ),
        }
    }
}

/// Per-repository credential configuration (spec.md §3 "Repository
/// credentials", §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryCredentials {
    /// Token authorising archive download and status posting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Secret authorising the webhook signature check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Web server bind configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebConfig {
    /// Bind address.
    #[serde(default = "default_server")]
    pub server: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Webhook path suffix (final path is `/<path>`).
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_server() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_path() -> String {
    "payload".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            path: default_path(),
        }
    }
}

/// Logging configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// One of `debug|info|error|fatal`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Persistent-store configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path to the embedded database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "octorunner.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Top-level runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Logging options.
    #[serde(default)]
    pub log: LogConfig,
    /// HTTP server options.
    #[serde(default)]
    pub web: WebConfig,
    /// Persistence options.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Per-repository credential overrides, keyed by `owner/repo`.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryCredentials>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            web: WebConfig::default(),
            database: DatabaseConfig::default(),
            repositories: BTreeMap::new(),
        }
    }
}

const VALID_LOG_LEVELS: &[&str] = &["debug", "info", "error", "fatal"];

/// Load a [`RunnerConfig`] from an optional TOML file path, applying the
/// environment overlay on top either way.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` is `Some` and missing, or
/// [`ConfigError::ParseError`] if the file is not valid TOML for this shape.
pub fn load_config(path: Option<&Path>) -> Result<RunnerConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => RunnerConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`RunnerConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if `content` is not valid TOML for
/// this shape.
pub fn parse_toml(content: &str) -> Result<RunnerConfig, ConfigError> {
    toml::from_str::<RunnerConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Apply the `OCTORUNNER_*` environment overlay.
///
/// Recognised variables: `OCTORUNNER_LOG_LEVEL`, `OCTORUNNER_WEB_SERVER`,
/// `OCTORUNNER_WEB_PORT`, `OCTORUNNER_WEB_PATH`, `OCTORUNNER_DATABASE_PATH`,
/// plus the per-repository overlay
/// `OCTORUNNER_<UPPER_FULL_NAME>_TOKEN`/`_SECRET` applied by
/// [`overlay_repository_credentials`], which callers (the credential store)
/// invoke directly rather than through this function since it needs a
/// specific repository name rather than a fixed variable name.
pub fn apply_env_overrides(config: &mut RunnerConfig) {
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOG_LEVEL")) {
        config.log.level = val;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_WEB_SERVER")) {
        config.web.server = val;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_WEB_PORT")) {
        if let Ok(port) = val.parse::<u16>() {
            config.web.port = port;
        }
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_WEB_PATH")) {
        config.web.path = val;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_DATABASE_PATH")) {
        config.database.path = val;
    }
}

/// Validate a parsed configuration, returning advisory warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if `log.level` is not one of
/// `debug|info|error|fatal` or `web.path` is empty.
pub fn validate_config(config: &RunnerConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(format!("invalid log.level '{}'", config.log.level));
    }
    if config.web.path.trim().is_empty() {
        errors.push("web.path must not be empty".to_string());
    }

    if !errors.is_empty() {
        return Err(ConfigError::ValidationError { reasons: errors });
    }

    let warnings = config
        .repositories
        .iter()
        .filter(|(_, creds)| creds.secret.is_none())
        .map(|(full_name, _)| ConfigWarning::RepositoryWithoutSecret {
            full_name: full_name.clone(),
        })
        .collect();

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_spec_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.web.server, "127.0.0.1");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.path, "payload");
        assert_eq!(config.database.path, "octorunner.db");
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[web]
port = 9090

[repositories."alice/proj"]
token = "tok"
secret = "shh"
"#;
        let config = parse_toml(toml).expect("parse");
        assert_eq!(config.web.port, 9090);
        let creds = config.repositories.get("alice/proj").expect("repo");
        assert_eq!(creds.token.as_deref(), Some("tok"));
        assert_eq!(creds.secret.as_deref(), Some("shh"));
    }

    #[test]
    fn load_config_missing_file_errors() {
        let err = load_config(Some(Path::new("/no/such/file.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_config_none_path_uses_defaults() {
        let config = load_config(None).expect("load");
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = RunnerConfig::default();
        config.log.level = "verbose".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validate_warns_on_repository_without_secret() {
        let mut config = RunnerConfig::default();
        config.repositories.insert(
            "alice/proj".to_string(),
            RepositoryCredentials {
                token: Some("tok".into()),
                secret: None,
            },
        );
        let warnings = validate_config(&config).expect("validate");
        assert_eq!(
            warnings,
            vec![ConfigWarning::RepositoryWithoutSecret {
                full_name: "alice/proj".to_string()
            }]
        );
    }

    #[test]
    fn env_overlay_overrides_file_values() {
        let mut config = RunnerConfig::default();
        std::env::set_var("OCTORUNNER_WEB_PORT", "1234");
        apply_env_overrides(&mut config);
        std::env::remove_var("OCTORUNNER_WEB_PORT");
        assert_eq!(config.web.port, 1234);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(file, "[web]\nport = 4321").expect("write");
        let config = load_config(Some(file.path())).expect("load");
        assert_eq!(config.web.port, 4321);
    }
}
