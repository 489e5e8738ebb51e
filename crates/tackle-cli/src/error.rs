//! Error types for the CLI

use tackle_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Tackle(#[from] tackle_common::Error),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("unknown component '{name}' (available: {available})")]
    UnknownComponent { name: String, available: String },
}
