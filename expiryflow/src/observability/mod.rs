//! Logging setup for hosts that embed the coordinator.

mod logging;

pub use logging::{init_tracing, LoggingConfig};
