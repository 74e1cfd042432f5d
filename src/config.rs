use std::env;
use std::time::Duration;

use crate::utils::password_cache::{DEFAULT_PRUNE_THRESHOLD, DEFAULT_TTL};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres key-value table; in-memory metadata when unset.
    pub database_url: Option<String>,
    /// S3-compatible bucket; in-memory objects when unset.
    pub s3_bucket: Option<String>,
    pub aws_region: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub max_upload_bytes: usize,
    pub password_cache_ttl: Duration,
    pub password_cache_prune_threshold: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match optional(name) {
                None => Ok(default),
                Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber { name, value }),
            }
        };

        let bind_addr = match lookup("BIND_ADDR") {
            None => DEFAULT_BIND_ADDR.to_string(),
            Some(addr) if addr.trim().is_empty() => return Err(ConfigError::Empty("BIND_ADDR")),
            Some(addr) => addr,
        };

        Ok(Self {
            bind_addr,
            database_url: optional("DATABASE_URL"),
            s3_bucket: optional("AWS_S3_BUCKET"),
            aws_region: optional("AWS_REGION"),
            aws_endpoint_url: optional("AWS_ENDPOINT_URL"),
            max_upload_bytes: number("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES as u64)? as usize,
            password_cache_ttl: Duration::from_secs(number("PASSWORD_CACHE_TTL_SECS", DEFAULT_TTL.as_secs())?),
            password_cache_prune_threshold: number(
                "PASSWORD_CACHE_PRUNE_THRESHOLD",
                DEFAULT_PRUNE_THRESHOLD as u64,
            )? as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert!(config.database_url.is_none());
        assert!(config.s3_bucket.is_none());
        assert_eq!(config.max_upload_bytes, 104_857_600);
        assert_eq!(config.password_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.password_cache_prune_threshold, 100);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("DATABASE_URL", "postgres://localhost/share"),
            ("AWS_S3_BUCKET", "shared-files"),
            ("AWS_ENDPOINT_URL", "http://localhost:9000"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("PASSWORD_CACHE_TTL_SECS", "60"),
            ("PASSWORD_CACHE_PRUNE_THRESHOLD", "10"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/share"));
        assert_eq!(config.s3_bucket.as_deref(), Some("shared-files"));
        assert_eq!(config.aws_endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.password_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.password_cache_prune_threshold, 10);
    }

    #[test]
    fn test_blank_optional_values_are_unset() {
        let config = config_from(&[("DATABASE_URL", "  "), ("AWS_S3_BUCKET", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.s3_bucket.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("MAX_UPLOAD_BYTES", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "MAX_UPLOAD_BYTES", .. }));

        let err = config_from(&[("BIND_ADDR", "")]).unwrap_err();
        assert!(matches!(err, ConfigError::Empty("BIND_ADDR")));
    }
}
