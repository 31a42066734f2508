//! Tracing subscriber initialisation.
//!
//! `RUST_LOG` takes precedence over the configured level. Output goes to
//! stderr, either compact or as one JSON object per line.

use crate::errors::ExpiryflowError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"expiryflow=debug"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of compact text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Switches JSON output on or off.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Checks that the level parses as a filter directive.
    pub fn validate(&self) -> Result<(), ExpiryflowError> {
        self.filter().map(|_| ())
    }

    fn filter(&self) -> Result<EnvFilter, ExpiryflowError> {
        EnvFilter::try_new(&self.level).map_err(|err| {
            ExpiryflowError::Config(format!("invalid log level '{}': {err}", self.level))
        })
    }
}

/// Installs the global tracing subscriber.
///
/// Returns false if a subscriber was already installed; the call then has no
/// effect.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ExpiryflowError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let json = config.json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let compact = (!config.json).then(|| fmt::layer().compact().with_writer(std::io::stderr));

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(compact)
        .try_init()
        .is_ok())
}
