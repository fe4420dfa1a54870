//! Log output setup.
//!
//! Every Cardroom crate logs through `tracing`. This module installs a
//! `tracing-subscriber` formatter for binaries that do not bring their own.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::CardroomError;

/// How log output is filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"cardroom_engine=debug,info"`.
    pub directive: String,
    /// Colored output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: "info".to_string(),
            ansi: true,
        }
    }
}

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.directive`. Returns `false` if
/// a global subscriber was already installed, which leaves it in place.
///
/// # Errors
/// Returns [`CardroomError::Logging`] if the directive does not parse.
pub fn init(config: &LoggingConfig) -> Result<bool, CardroomError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.directive)?,
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init()
        .is_ok();
    Ok(installed)
}
