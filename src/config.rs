//! Runtime settings read from the environment (and `.env` when present).

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub http_timeout: Duration,
    /// Where the cart and wishlist are persisted.
    pub storage_dir: PathBuf,
    /// Request queue size of every actor and service. Never zero.
    pub channel_buffer: usize,
    /// Never zero.
    pub feed_capacity: usize,
    pub resync_debounce: Duration,
    pub subscribe_timeout: Duration,
    /// Cart stock snapshots older than this are refreshed before checkout.
    pub snapshot_max_age: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".into(),
            http_timeout: Duration::from_secs(30),
            storage_dir: PathBuf::from(".maison"),
            channel_buffer: 64,
            feed_capacity: 256,
            resync_debounce: Duration::from_millis(500),
            subscribe_timeout: Duration::from_millis(10_000),
            snapshot_max_age: Duration::from_secs(900),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| parse_var::<u64>(&lookup, key);

        Ok(Self {
            api_base_url: lookup("MAISON_API_BASE_URL").unwrap_or(defaults.api_base_url),
            http_timeout: parse("MAISON_HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            storage_dir: lookup("MAISON_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            channel_buffer: parse_var::<NonZeroUsize>(&lookup, "MAISON_CHANNEL_BUFFER")?
                .map_or(defaults.channel_buffer, NonZeroUsize::get),
            feed_capacity: parse_var::<NonZeroUsize>(&lookup, "MAISON_FEED_CAPACITY")?
                .map_or(defaults.feed_capacity, NonZeroUsize::get),
            resync_debounce: parse("MAISON_RESYNC_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.resync_debounce),
            subscribe_timeout: parse("MAISON_SUBSCRIBE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.subscribe_timeout),
            snapshot_max_age: parse("MAISON_SNAPSHOT_MAX_AGE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.snapshot_max_age),
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key: key.to_string(), value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_keys_use_defaults() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])).unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("MAISON_API_BASE_URL", "https://maison-slimani.com"),
            ("MAISON_RESYNC_DEBOUNCE_MS", "250"),
            ("MAISON_CHANNEL_BUFFER", " 16 "),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://maison-slimani.com");
        assert_eq!(config.resync_debounce, Duration::from_millis(250));
        assert_eq!(config.channel_buffer, 16);
        assert_eq!(config.feed_capacity, 256);
    }

    #[test]
    fn unparseable_value_names_the_key() {
        let err = AppConfig::from_lookup(lookup(&[("MAISON_FEED_CAPACITY", "beaucoup")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "MAISON_FEED_CAPACITY".into(),
                value: "beaucoup".into()
            }
        );
    }

    #[test]
    fn zero_sized_queues_are_rejected() {
        for key in ["MAISON_CHANNEL_BUFFER", "MAISON_FEED_CAPACITY"] {
            let err = AppConfig::from_lookup(lookup(&[(key, "0")])).unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key: key.into(),
                    value: "0".into()
                }
            );
        }
    }
}
