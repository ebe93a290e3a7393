use crate::progress::{StatusPolicy, DEFAULT_TARGET_CLASSES};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub target_classes: u32,
    pub status_policy: StatusPolicy,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let target_classes = match lookup("TUTOR_TARGET_CLASSES") {
            Some(value) => positive(&value, "TUTOR_TARGET_CLASSES")?,
            None => DEFAULT_TARGET_CLASSES,
        };

        let status_policy = match lookup("TUTOR_STATUS_POLICY") {
            Some(value) => value.parse().map_err(|err: crate::progress::ParsePolicyError| {
                ConfigError::Invalid {
                    key: "TUTOR_STATUS_POLICY",
                    value: value.clone(),
                    reason: err.to_string(),
                }
            })?,
            None => StatusPolicy::default(),
        };

        let max_connections = match lookup("TUTOR_MAX_CONNECTIONS") {
            Some(value) => positive(&value, "TUTOR_MAX_CONNECTIONS")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            target_classes,
            status_policy,
            max_connections,
        })
    }
}

fn positive(value: &str, key: &'static str) -> Result<u32, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let parsed: u32 = value
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number"))?;
    if parsed == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(parsed)
}
