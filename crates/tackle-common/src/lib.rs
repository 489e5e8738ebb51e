//! Common types for tackle: errors, constants, and Kubernetes utilities

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;

use std::time::Duration;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace for operator-managed add-on resources
pub const TACKLE_SYSTEM_NAMESPACE: &str = "tackle-system";

/// Field manager recorded on every object tackle writes
pub const FIELD_MANAGER: &str = "tackle";

/// Environment variable holding the operator's own container image
pub const OPERATOR_IMAGE_ENV: &str = "TACKLE_OPERATOR_IMAGE";

/// Image used when no operator image is configured
pub const DEFAULT_OPERATOR_IMAGE: &str = "ghcr.io/tackle-dev/tackle-operator:latest";

/// Interval between readiness polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Budget for a single workload to become ready
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Budget for one whole Install/Uninstall/CheckExists call
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Budget for a freshly applied CRD to report `Established`
pub const DEFAULT_CRD_ESTABLISHED_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolve the operator image from the environment, falling back to the default.
pub fn operator_image() -> String {
    std::env::var(OPERATOR_IMAGE_ENV)
        .ok()
        .filter(|image| !image.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OPERATOR_IMAGE.to_string())
}
