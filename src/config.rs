use crate::password::DEFAULT_COST;
use chrono::Duration;
use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 72;
/// One year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(String),

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Load(e.to_string())
    }
}

/// Which token format the service issues and accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBackend {
    Jwt,
    Paseto,
}

impl FromStr for TokenBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jwt" => Ok(TokenBackend::Jwt),
            "paseto" => Ok(TokenBackend::Paseto),
            other => Err(format!("unknown token backend {:?}", other)),
        }
    }
}

/// Settings as they appear in the environment (`JWT_SECRET` -> `jwt_secret`).
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    token_ttl_hours: i64,
    #[serde(default = "default_token_backend")]
    token_backend: String,
    #[serde(default = "default_bcrypt_cost")]
    bcrypt_cost: u32,
    /// Comma separated; `*` allows any origin.
    #[serde(default = "default_cors_allowed_origins")]
    cors_allowed_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_token_ttl_hours() -> i64 {
    DEFAULT_TOKEN_TTL_HOURS
}

fn default_token_backend() -> String {
    "jwt".to_string()
}

fn default_bcrypt_cost() -> u32 {
    DEFAULT_COST
}

fn default_cors_allowed_origins() -> String {
    "*".to_string()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub token_backend: TokenBackend,
    pub bcrypt_cost: u32,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Read settings from the process environment. Call `dotenv::dotenv()` first
    /// to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Read settings from the given variables instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars.into_iter().collect())))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        raw.validate()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RawSettings {
    fn validate(self) -> Result<AppConfig, ConfigError> {
        let jwt_secret = self.jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must not be empty".to_string(),
            });
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                reason: format!("must be between 1 and {}", MAX_TOKEN_TTL_HOURS),
            });
        }

        let token_backend = self
            .token_backend
            .parse()
            .map_err(|reason| ConfigError::Invalid {
                key: "TOKEN_BACKEND",
                reason,
            })?;

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let cors_allowed_origins = self
            .cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty() && *o != "*")
            .map(str::to_string)
            .collect();

        Ok(AppConfig {
            host: self.host,
            port: self.port,
            jwt_secret,
            token_ttl: Duration::hours(self.token_ttl_hours),
            token_backend,
            bcrypt_cost: self.bcrypt_cost,
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        AppConfig::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("JWT_SECRET", "secret")]).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.token_ttl, Duration::hours(72));
        assert_eq!(cfg.token_backend, TokenBackend::Jwt);
        assert_eq!(cfg.bcrypt_cost, DEFAULT_COST);
        assert!(cfg.cors_allowed_origins.is_empty());
    }

    #[test]
    fn overrides_apply() {
        let cfg = load(&[
            ("JWT_SECRET", "secret"),
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("TOKEN_TTL_HOURS", "1"),
            ("TOKEN_BACKEND", "PASETO"),
            ("BCRYPT_COST", "4"),
            (
                "CORS_ALLOWED_ORIGINS",
                "https://app.example.com, http://localhost:5173",
            ),
        ])
        .unwrap();

        assert_eq!(cfg.addr(), "127.0.0.1:3000");
        assert_eq!(cfg.token_ttl, Duration::hours(1));
        assert_eq!(cfg.token_backend, TokenBackend::Paseto);
        assert_eq!(cfg.bcrypt_cost, 4);
        assert_eq!(
            cfg.cors_allowed_origins,
            vec!["https://app.example.com", "http://localhost:5173"]
        );
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert!(matches!(
            load(&[("JWT_SECRET", "  ")]),
            Err(ConfigError::Invalid { key: "JWT_SECRET", .. })
        ));
    }

    #[test]
    fn ttl_must_be_positive_and_bounded() {
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TOKEN_TTL_HOURS", "0")]),
            Err(ConfigError::Invalid { key: "TOKEN_TTL_HOURS", .. })
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TOKEN_TTL_HOURS", "3000000000")]),
            Err(ConfigError::Invalid { key: "TOKEN_TTL_HOURS", .. })
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TOKEN_TTL_HOURS", "9223372036854775807")]),
            Err(ConfigError::Invalid { key: "TOKEN_TTL_HOURS", .. })
        ));

        let max = MAX_TOKEN_TTL_HOURS.to_string();
        let cfg = load(&[("JWT_SECRET", "s"), ("TOKEN_TTL_HOURS", max.as_str())]).unwrap();
        assert_eq!(cfg.token_ttl, Duration::hours(MAX_TOKEN_TTL_HOURS));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("PORT", "http")]),
            Err(ConfigError::Load(_))
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TOKEN_BACKEND", "saml")]),
            Err(ConfigError::Invalid { key: "TOKEN_BACKEND", .. })
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("BCRYPT_COST", "2")]),
            Err(ConfigError::Invalid { key: "BCRYPT_COST", .. })
        ));
    }
}
