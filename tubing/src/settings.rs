//! Plugin bootstrap settings. Unlike bean configuration, settings are needed before the container
//! exists, so they are read directly when a plugin gets enabled.
//!
//! By default, the settings are created with opinionated default values, which can then be
//! overwritten by environment variables prefixed with `TUBING_` or a `tubing.json` file in the
//! plugin directory.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const SETTINGS_ENV_PREFIX: &str = "TUBING";

/// Name of the default settings file.
pub const SETTINGS_FILE: &str = "tubing.json";

/// Settings used by [TubingPlugin](crate::plugin::TubingPlugin) to configure itself.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TubingSettings {
    /// Should a default tracing logger be installed when the plugin gets enabled.
    pub install_tracing_logger: bool,
}

impl Default for TubingSettings {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
        }
    }
}

impl From<OptionalTubingSettings> for TubingSettings {
    fn from(value: OptionalTubingSettings) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
        }
    }
}

impl TubingSettings {
    /// Reads settings from given plugin directory and environment.
    pub fn load_from(directory: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&directory.join(SETTINGS_FILE).to_string_lossy()).required(false),
            )
            .add_source(Environment::with_prefix(SETTINGS_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalTubingSettings>())
            .map(|config| config.into())
    }
}

#[derive(Deserialize)]
struct OptionalTubingSettings {
    install_tracing_logger: Option<bool>,
}
