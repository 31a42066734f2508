//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Durations are given in milliseconds.
//!
//! ```json
//! {
//!   "step": {
//!     "start_to_close": 30000,
//!     "interruptible": true,
//!     "retry": { "max_backoff_interval": 5000, "max_attempts": null }
//!   },
//!   "logging": { "level": "info", "json": false }
//! }
//! ```

use crate::errors::ExpiryflowError;
use crate::observability::LoggingConfig;
use crate::pipeline::StepOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Per-call timeout, interruptibility and retry policy for every step.
    #[serde(default)]
    pub step: StepOptions,
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExpiryConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ExpiryflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExpiryflowError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ExpiryflowError> {
        self.step.validate()?;
        self.logging.validate()
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ExpiryflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ExpiryConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ExpiryConfig::default());
        assert_eq!(config.step.start_to_close, Duration::from_secs(30));
        assert_eq!(config.step.retry.max_backoff_interval, Duration::from_secs(5));
        assert_eq!(config.step.retry.max_attempts, None);
    }

    #[test]
    fn test_partial_document() {
        let config = ExpiryConfig::from_json_str(
            r#"{"step": {"interruptible": false, "retry": {"max_attempts": 4}},
                "logging": {"json": true}}"#,
        )
        .unwrap();
        assert!(!config.step.interruptible);
        assert_eq!(config.step.retry.max_attempts, Some(4));
        assert_eq!(config.step.retry.initial_interval, Duration::from_secs(1));
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ExpiryConfig::from_json_str(r#"{"step": {"start_to_close": 0}}"#).unwrap_err();
        assert!(matches!(err, ExpiryflowError::Config(_)));

        let err = ExpiryConfig::from_json_str(r#"{"step": {"retry": {"max_attempts": 0}}}"#)
            .unwrap_err();
        assert!(matches!(err, ExpiryflowError::Config(_)));

        let err = ExpiryConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ExpiryflowError::Serialization(_)));
    }

    #[test]
    fn test_json_round_trip_keeps_millis() {
        let config = ExpiryConfig::default();
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"start_to_close\": 30000"));
        assert_eq!(ExpiryConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"step": {{"retry": {{"max_backoff_interval": 2000}}}}}}"#).unwrap();

        let config = ExpiryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.step.retry.max_backoff_interval, Duration::from_secs(2));

        let missing = ExpiryConfig::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ExpiryflowError::Io(_))));
    }
}
