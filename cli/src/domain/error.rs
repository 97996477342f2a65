//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Callers tell the kinds apart with
//! `anyhow::Error::downcast_ref`, never by matching message text.

use std::time::Duration;

use thiserror::Error;

/// Boxed cause carried by discovery errors.
///
/// `anyhow::Error` converts into this with `.into()`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Remote service errors ─────────────────────────────────────────────────────

/// Errors reported by the remote codespaces service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Creation was rejected until the user reviews additional permissions.
    #[error("additional permissions must be authorized at {allow_permissions_url}")]
    AcceptPermissionsRequired { allow_permissions_url: String },

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether a later identical request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::AcceptPermissionsRequired { .. } | Self::Decode(_) => false,
        }
    }
}

// ── Codespace workflow errors ─────────────────────────────────────────────────

/// Errors produced by the create-and-connect workflow.
#[derive(Debug, Error)]
pub enum CodespaceError {
    /// Bad user input, reported immediately.
    #[error("{0}")]
    Validation(String),

    #[error("error getting devcontainer.json paths: {source}")]
    DevContainerDiscovery {
        #[source]
        source: BoxError,
    },

    /// A catalog lookup (repository, machines) failed.
    #[error("{what}: {source}")]
    Discovery {
        what: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("there is no such machine for the repository: {name}\nAvailable machines: {}", .available.join(", "))]
    UnknownMachine { name: String, available: Vec<String> },

    /// Network or server failure that exhausted its retry budget.
    #[error("{0}")]
    Transport(String),

    #[error("codespace {name} failed to start (state: {state}){}", .diagnostic.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    ProvisionFailed {
        name: String,
        state: String,
        diagnostic: Option<String>,
    },

    #[error("timed out after {}s waiting for codespace {name} to become available", .waited.as_secs())]
    ReadinessTimeout { name: String, waited: Duration },

    #[error("codespace {name} is not ready for connections (state: {state})")]
    NotConnectable { name: String, state: String },

    /// The caller's cancellation signal fired.
    #[error("operation canceled")]
    Canceled,

    /// The failure was already explained to the user.
    #[error("SilentError")]
    Silent,
}

impl CodespaceError {
    /// Returns `true` when `err` (or anything it wraps) is [`CodespaceError::Canceled`].
    #[must_use]
    pub fn is_canceled(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Self>(), Some(Self::Canceled))
    }

    /// Returns `true` when `err` is the already-reported sentinel.
    #[must_use]
    pub fn is_silent(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Self>(), Some(Self::Silent))
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
