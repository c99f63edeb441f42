//! CLI configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `geocoder.toml` (or the file passed with `--config`), then `GEOCODER_*`
//! environment variables with `__` between nested keys, for example
//! `GEOCODER_NOMINATIM__COUNTRY_CODES=ng,gh`.

use std::path::{Path, PathBuf};

use integration_geocoding::NominatimConfig;
use serde::{Deserialize, Serialize};

/// Default file name looked up in the working directory
pub const DEFAULT_CONFIG_NAME: &str = "geocoder";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GEOCODER";

/// Where the persistent cache lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file-backed key-value store
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".geocoder")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Geocoding client settings
    #[serde(default)]
    pub nominatim: NominatimConfig,

    /// Cache storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from defaults, file and environment
    ///
    /// An explicit `path` must exist; the default `geocoder.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = path.map_or_else(
            || config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
            |p| config::File::from(p).required(true),
        );

        let builder = config::Config::builder()
            .set_default("storage.path", ".geocoder")?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded
            .nominatim
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("nominatim: {e}")))?;
        Ok(loaded)
    }
}
