//! Geocoding service configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::store::is_valid_key;

/// Configuration for the Nominatim geocoding client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominatimConfig {
    /// Base URL for the Nominatim API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Client identifier sent as `User-Agent` (required by the usage policy)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Comma-separated ISO country codes searches are restricted to
    #[serde(default = "default_country_codes")]
    pub country_codes: String,

    /// Preferred response language
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Maximum number of search results requested
    #[serde(default = "default_result_limit")]
    pub result_limit: u8,

    /// Minimum trimmed query length before a search hits the network
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// TTL for search and details entries, in hours
    #[serde(default = "default_search_cache_ttl_hours")]
    pub search_cache_ttl_hours: u64,

    /// TTL for reverse geocoding entries, in hours
    #[serde(default = "default_reverse_cache_ttl_hours")]
    pub reverse_cache_ttl_hours: u64,

    /// Quiet period for debounced searches, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Key under which the cache blob is persisted
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Retry policy shared by all operations
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    concat!("geocoder/", env!("CARGO_PKG_VERSION"), " (integration_geocoding)").to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_country_codes() -> String {
    "ng".to_string()
}

fn default_accept_language() -> String {
    "en".to_string()
}

const fn default_result_limit() -> u8 {
    10
}

const fn default_min_query_chars() -> usize {
    2
}

const fn default_search_cache_ttl_hours() -> u64 {
    24
}

const fn default_reverse_cache_ttl_hours() -> u64 {
    2
}

const fn default_debounce_ms() -> u64 {
    500
}

fn default_storage_key() -> String {
    "nominatim_cache".to_string()
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            country_codes: default_country_codes(),
            accept_language: default_accept_language(),
            result_limit: default_result_limit(),
            min_query_chars: default_min_query_chars(),
            search_cache_ttl_hours: default_search_cache_ttl_hours(),
            reverse_cache_ttl_hours: default_reverse_cache_ttl_hours(),
            debounce_ms: default_debounce_ms(),
            storage_key: default_storage_key(),
            retry: RetryConfig::default(),
        }
    }
}

impl NominatimConfig {
    /// Create a configuration suitable for testing against a mock server
    #[must_use]
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 2,
            debounce_ms: 50,
            retry: RetryConfig::fast(),
            ..Default::default()
        }
    }

    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// TTL for search and details entries
    #[must_use]
    pub const fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_hours.saturating_mul(3600))
    }

    /// TTL for reverse geocoding entries
    #[must_use]
    pub const fn reverse_ttl(&self) -> Duration {
        Duration::from_secs(self.reverse_cache_ttl_hours.saturating_mul(3600))
    }

    /// Debounce quiet period
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }

        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        if self.result_limit == 0 {
            return Err("result_limit must be greater than 0".to_string());
        }

        if self.result_limit > 50 {
            return Err("result_limit must be 50 or less".to_string());
        }

        if !is_valid_key(&self.storage_key) {
            return Err(format!(
                "storage_key {:?} must be non-empty ASCII letters, digits, '_', '-' or '.', not starting with '.'",
                self.storage_key
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be greater than 0".to_string());
        }

        if self.retry.multiplier < 1.0 {
            return Err("retry.multiplier must be at least 1.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err("retry.jitter_factor must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NominatimConfig::default();
        assert_eq!(config.base_url, "https://nominatim.openstreetmap.org");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.country_codes, "ng");
        assert_eq!(config.result_limit, 10);
        assert_eq!(config.min_query_chars, 2);
        assert_eq!(config.search_ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(config.reverse_ttl(), Duration::from_secs(2 * 3600));
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.storage_key, "nominatim_cache");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.user_agent.starts_with("geocoder/"));
    }

    #[test]
    fn test_testing_config() {
        let config = NominatimConfig::for_testing("http://127.0.0.1:9999");
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.retry.initial_delay_ms, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_success() {
        assert!(NominatimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_base_url() {
        let config = NominatimConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_blank_user_agent() {
        let config = NominatimConfig {
            user_agent: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = NominatimConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_result_limit_bounds() {
        let zero = NominatimConfig {
            result_limit: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let too_many = NominatimConfig {
            result_limit: 51,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_validation_storage_key_must_be_storable() {
        for key in ["", "cache:v1", "../cache", "a/b", ".cache"] {
            let config = NominatimConfig {
                storage_key: key.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "key {key:?} should be rejected");
        }

        let config = NominatimConfig {
            storage_key: "geocoder-cache.v2".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_retry_policy() {
        let mut config = NominatimConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = NominatimConfig::default();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let json = r#"{"country_codes": "ng,gh", "retry": {"max_attempts": 5}}"#;
        let config: NominatimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.country_codes, "ng,gh");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.timeout_secs, 10);
    }
}
