use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::advisory::RetryPolicy;
use crate::error::ConfigError;
use crate::reference::DEFAULT_BENCHMARK_PATH;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const BENCHMARK_PATH_ENV: &str = "DIAGNOSTIC_BENCHMARK_PATH";
const TIMEOUT_ENV: &str = "ADVISORY_TIMEOUT_SECS";
const MAX_RETRIES_ENV: &str = "ADVISORY_MAX_RETRIES";

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AdvisoryConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub benchmark_path: PathBuf,
    pub advisory: AdvisoryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = optional(API_KEY_ENV).map(SecretString::from);
        if api_key.is_none() {
            tracing::warn!("{API_KEY_ENV} is not set; the advisory chat is disabled");
        }

        let timeout_secs: u64 = parse_optional(TIMEOUT_ENV, optional(TIMEOUT_ENV))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: TIMEOUT_ENV.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let mut retry = RetryPolicy::default();
        if let Some(max_retries) = parse_optional(MAX_RETRIES_ENV, optional(MAX_RETRIES_ENV))? {
            retry.max_retries = max_retries;
        }

        Ok(Self {
            benchmark_path: optional(BENCHMARK_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BENCHMARK_PATH)),
            advisory: AdvisoryConfig {
                api_key,
                base_url: optional(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
                retry,
            },
        })
    }
}

fn parse_optional<T>(key: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.advisory.api_key.is_none());
        assert_eq!(config.advisory.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.advisory.timeout, Duration::from_secs(60));
        assert_eq!(config.benchmark_path, PathBuf::from(DEFAULT_BENCHMARK_PATH));
    }

    #[test]
    fn reads_values_from_environment() {
        let config = Config::from_lookup(lookup(&[
            (API_KEY_ENV, "sk-123"),
            (BENCHMARK_PATH_ENV, "data/base.csv"),
            (TIMEOUT_ENV, "15"),
            (MAX_RETRIES_ENV, "4"),
        ]))
        .unwrap();

        let key = config.advisory.api_key.as_ref().map(|k| k.expose_secret().to_string());
        assert_eq!(key.as_deref(), Some("sk-123"));
        assert_eq!(config.benchmark_path, PathBuf::from("data/base.csv"));
        assert_eq!(config.advisory.timeout, Duration::from_secs(15));
        assert_eq!(config.advisory.retry.max_retries, 4);
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let config = Config::from_lookup(lookup(&[(API_KEY_ENV, "   ")])).unwrap();
        assert!(config.advisory.api_key.is_none());
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(Config::from_lookup(lookup(&[(TIMEOUT_ENV, "0")])).is_err());
    }
}
