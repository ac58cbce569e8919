use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::export::LayoutOptions;
use crate::models::Role;

/// Application-level constants
pub const APP_NAME: &str = "Kidney Care";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 10_000;

/// Get the application data directory: ~/KidneyCare/, or ./KidneyCare when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("KidneyCare")
}

/// Default location of the rule table database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("kidneycare.db")
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "kidneycare_lib=info,kidneycare=info,tower_http=warn"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// A configured bearer token and who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub subject: String,
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: DatabaseLocation,
    pub render_timeout: Duration,
    pub layout: LayoutOptions,
    pub tokens: Vec<TokenGrant>,
    pub seed_defaults: bool,
}

impl ServerConfig {
    /// Read `KIDNEYCARE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = var("KIDNEYCARE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("KIDNEYCARE_BIND", &bind_raw, e.to_string()))?;

        let database = match var("KIDNEYCARE_DB") {
            Some(v) if v == ":memory:" => DatabaseLocation::Memory,
            Some(v) => DatabaseLocation::File(PathBuf::from(v)),
            None => DatabaseLocation::File(default_database_path()),
        };

        let render_timeout = match var("KIDNEYCARE_RENDER_TIMEOUT_MS") {
            Some(v) => {
                let ms = parse_positive("KIDNEYCARE_RENDER_TIMEOUT_MS", &v)?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
        };

        let mut layout = LayoutOptions::default();
        if let Some(v) = var("KIDNEYCARE_LINE_BUDGET") {
            let budget = parse_positive("KIDNEYCARE_LINE_BUDGET", &v)?;
            layout.line_budget = usize::try_from(budget).map_err(|e| {
                ConfigError::invalid("KIDNEYCARE_LINE_BUDGET", &v, e.to_string())
            })?;
        }

        let mut tokens = Vec::new();
        if let Some(v) = var("KIDNEYCARE_ADMIN_TOKENS") {
            tokens.extend(parse_grants("KIDNEYCARE_ADMIN_TOKENS", &v, Role::Admin)?);
        }
        if let Some(v) = var("KIDNEYCARE_CLIENT_TOKENS") {
            tokens.extend(parse_grants("KIDNEYCARE_CLIENT_TOKENS", &v, Role::Client)?);
        }

        let seed_defaults = match var("KIDNEYCARE_SEED_DEFAULTS") {
            Some(v) => parse_bool("KIDNEYCARE_SEED_DEFAULTS", &v)?,
            None => true,
        };

        Ok(Self {
            bind,
            database,
            render_timeout,
            layout,
            tokens,
            seed_defaults,
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(key, value, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::invalid(key, value, e.to_string())),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected true or false")),
    }
}

/// `subject:token` pairs separated by commas.
fn parse_grants(key: &'static str, value: &str, role: Role) -> Result<Vec<TokenGrant>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((subject, token)) if !subject.trim().is_empty() && !token.trim().is_empty() => {
                Ok(TokenGrant {
                    subject: subject.trim().to_string(),
                    token: token.trim().to_string(),
                    role,
                })
            }
            _ => Err(ConfigError::invalid(key, entry, "expected subject:token")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_folder() {
        assert!(app_data_dir().ends_with("KidneyCare"));
        assert!(default_database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        assert_eq!(config.database, DatabaseLocation::File(default_database_path()));
        assert_eq!(config.render_timeout, Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS));
        assert_eq!(config.layout, LayoutOptions::default());
        assert!(config.tokens.is_empty());
        assert!(config.seed_defaults);
    }

    #[test]
    fn memory_database_and_overrides() {
        let config = config_from(&[
            ("KIDNEYCARE_BIND", "0.0.0.0:9000"),
            ("KIDNEYCARE_DB", ":memory:"),
            ("KIDNEYCARE_RENDER_TIMEOUT_MS", "250"),
            ("KIDNEYCARE_LINE_BUDGET", "30"),
            ("KIDNEYCARE_SEED_DEFAULTS", "off"),
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.database, DatabaseLocation::Memory);
        assert_eq!(config.render_timeout, Duration::from_millis(250));
        assert_eq!(config.layout.line_budget, 30);
        assert!(!config.seed_defaults);
    }

    #[test]
    fn token_grants_carry_role_and_subject() {
        let config = config_from(&[
            ("KIDNEYCARE_ADMIN_TOKENS", "dr-ade:admin-secret"),
            ("KIDNEYCARE_CLIENT_TOKENS", "p1:tok-1, p2:tok-2"),
        ])
        .unwrap();
        assert_eq!(config.tokens.len(), 3);
        assert_eq!(config.tokens[0].role, Role::Admin);
        assert_eq!(config.tokens[0].subject, "dr-ade");
        assert_eq!(config.tokens[2].token, "tok-2");
        assert_eq!(config.tokens[2].role, Role::Client);
    }

    #[test]
    fn malformed_values_are_rejected() {
        for (key, value) in [
            ("KIDNEYCARE_BIND", "not-an-address"),
            ("KIDNEYCARE_RENDER_TIMEOUT_MS", "soon"),
            ("KIDNEYCARE_RENDER_TIMEOUT_MS", "0"),
            ("KIDNEYCARE_LINE_BUDGET", "-3"),
            ("KIDNEYCARE_SEED_DEFAULTS", "maybe"),
            ("KIDNEYCARE_ADMIN_TOKENS", "no-separator"),
            ("KIDNEYCARE_CLIENT_TOKENS", ":missing-subject"),
        ] {
            let err = config_from(&[(key, value)]).unwrap_err();
            let ConfigError::Invalid { key: got, .. } = err;
            assert_eq!(got, key);
        }
    }
}
