//! Top-level configuration.

use cardroom_evictor::EvictorConfig;
use cardroom_session::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::CardroomError;

/// Everything a [`Cardroom`](crate::Cardroom) needs to know up front.
///
/// Missing sections and fields take their defaults:
///
/// ```rust
/// use cardroom::CardroomConfig;
///
/// let config = CardroomConfig::from_json_str(r#"{
///     "registry": { "max_sessions": 500 },
///     "evictor": { "interval_secs": 30, "policy": "delay" }
/// }"#).unwrap();
///
/// assert_eq!(config.registry.max_sessions, 500);
/// assert_eq!(config.evictor.stale_after().as_secs(), 1800);
/// assert_eq!(config.logging.directive, "info");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardroomConfig {
    pub registry: RegistryConfig,
    pub evictor: EvictorConfig,
    pub logging: LoggingConfig,
}

impl CardroomConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// Returns [`CardroomError::Config`] if the document is not valid JSON
    /// or a field has the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, CardroomError> {
        serde_json::from_str(json).map_err(CardroomError::Config)
    }
}
