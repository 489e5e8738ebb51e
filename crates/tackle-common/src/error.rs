//! Error types for tackle
//!
//! Errors are structured with fields to aid debugging in production.
//! Store failures carry the `Kind namespace/name` of the object that failed,
//! decode failures carry the document position.

use std::time::Duration;

use thiserror::Error;

/// Main error type for tackle operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes client error outside of a store operation (client setup, namespace helpers)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Manifest bytes are not well-formed
    #[error("decode error in document {document} (line {line}): {message}")]
    Decode {
        /// Zero-based index of the failing document in the buffer
        document: usize,
        /// One-based line in the buffer where decoding failed
        line: usize,
        /// Description of what's malformed
        message: String,
    },

    /// Object store rejected or failed an operation
    #[error("store error: {operation} {object}: {message}")]
    Store {
        /// Store operation that failed (get, create, update, delete)
        operation: String,
        /// Object reference, formatted as `Kind namespace/name`
        object: String,
        /// Description of what failed
        message: String,
        /// Whether the store rejected a stale resource version
        conflict: bool,
    },

    /// A readiness wait ran out of time
    #[error("timed out after {waited:?} waiting for {target}")]
    Timeout {
        /// What was being waited on
        target: String,
        /// Budget that elapsed
        waited: Duration,
    },

    /// A whole component operation exceeded its deadline
    #[error("{operation} of component {component} exceeded deadline of {budget:?}")]
    DeadlineExceeded {
        /// Operation name (install, uninstall, check)
        operation: String,
        /// Component name
        component: String,
        /// Deadline that elapsed
        budget: Duration,
    },

    /// Manifest template could not be rendered
    #[error("template error: {message}")]
    Template {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "discovery", "client")
        context: String,
    },
}

impl Error {
    /// Create a decode error for a document position
    pub fn decode(document: usize, line: usize, msg: impl Into<String>) -> Self {
        Self::Decode {
            document,
            line,
            message: msg.into(),
        }
    }

    /// Create a store error for an operation against an object
    pub fn store(
        operation: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            object: object.into(),
            message: msg.into(),
            conflict: false,
        }
    }

    /// Create a store error for a stale resource version
    pub fn store_conflict(
        operation: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            object: object.into(),
            message: msg.into(),
            conflict: true,
        }
    }

    /// Create a timeout error
    pub fn timeout(target: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            waited,
        }
    }

    /// Create a deadline error for a component operation
    pub fn deadline_exceeded(
        operation: impl Into<String>,
        component: impl Into<String>,
        budget: Duration,
    ) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
            component: component.into(),
            budget,
        }
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Retrying means re-running the whole Install/Uninstall; decode and
    /// template errors need a manifest or config fix first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Decode { .. } => false,
            Error::Store { .. } => true,
            Error::Timeout { .. } => true,
            Error::DeadlineExceeded { .. } => true,
            Error::Template { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Check if this error is a stale resource version rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Store { conflict: true, .. })
    }

    /// Get the object reference if this error is tied to one object
    pub fn object(&self) -> Option<&str> {
        match self {
            Error::Store { object, .. } => Some(object),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
