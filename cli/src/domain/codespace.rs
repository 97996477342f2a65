//! Codespace domain types and pure validation functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! The serde attributes describe the remote service's JSON shapes.

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::CodespaceError;

/// Maximum length the service accepts for a codespace display name.
pub const MAX_DISPLAY_NAME_LEN: usize = 48;

/// Locations where a lone devcontainer definition is picked without asking.
pub const DEFAULT_DEVCONTAINER_DEFINITIONS: &[&str] =
    &[".devcontainer.json", ".devcontainer/devcontainer.json"];

/// A repository resolved from its `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
    pub default_branch: String,
}

/// A devcontainer configuration file discovered in a repository/branch pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevContainerEntry {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl DevContainerEntry {
    /// Whether this entry sits at one of the platform default locations.
    #[must_use]
    pub fn is_default_location(&self) -> bool {
        DEFAULT_DEVCONTAINER_DEFINITIONS.contains(&self.path.as_str())
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
}

/// Codespace lifecycle state as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum CodespaceState {
    Created,
    Queued,
    Provisioning,
    Starting,
    Available,
    ShuttingDown,
    Shutdown,
    Rebuilding,
    Exporting,
    Updating,
    Archived,
    Unavailable,
    Failed,
    Deleted,
    #[default]
    Unknown,
    /// A state this client does not know about yet.
    Other(String),
}

impl From<String> for CodespaceState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Created" => Self::Created,
            "Queued" => Self::Queued,
            "Provisioning" => Self::Provisioning,
            "Starting" => Self::Starting,
            "Available" => Self::Available,
            "ShuttingDown" => Self::ShuttingDown,
            "Shutdown" => Self::Shutdown,
            "Rebuilding" => Self::Rebuilding,
            "Exporting" => Self::Exporting,
            "Updating" => Self::Updating,
            "Archived" => Self::Archived,
            "Unavailable" => Self::Unavailable,
            "Failed" | "Error" => Self::Failed,
            "Deleted" => Self::Deleted,
            "Unknown" | "" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl CodespaceState {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "Created",
            Self::Queued => "Queued",
            Self::Provisioning => "Provisioning",
            Self::Starting => "Starting",
            Self::Available => "Available",
            Self::ShuttingDown => "ShuttingDown",
            Self::Shutdown => "Shutdown",
            Self::Rebuilding => "Rebuilding",
            Self::Exporting => "Exporting",
            Self::Updating => "Updating",
            Self::Archived => "Archived",
            Self::Unavailable => "Unavailable",
            Self::Failed => "Failed",
            Self::Deleted => "Deleted",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        }
    }

    /// States in which a relay session can be opened.
    #[must_use]
    pub fn is_connectable(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// States from which the codespace will never become available on its own.
    #[must_use]
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Unavailable | Self::Archived | Self::Deleted
        )
    }
}

impl fmt::Display for CodespaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay credentials for a connectable codespace.
///
/// A bearer capability: `Debug` redacts the token and SAS, and nothing in
/// this crate persists or logs them.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub session_id: String,
    pub session_token: String,
    pub relay_endpoint: String,
    #[serde(rename = "relaySas")]
    pub relay_sas: String,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("session_id", &self.session_id)
            .field("session_token", &"<redacted>")
            .field("relay_endpoint", &self.relay_endpoint)
            .field("relay_sas", &"<redacted>")
            .finish()
    }
}

/// Partial repository view embedded in a codespace payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodespaceRepository {
    pub full_name: String,
}

/// Snapshot of a codespace. Only the remote service mutates codespaces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Codespace {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: CodespaceState,
    /// Set when server policy overrode the requested idle timeout.
    #[serde(default)]
    pub idle_timeout_notice: Option<String>,
    #[serde(default)]
    pub connection: Option<ConnectionInfo>,
    #[serde(default)]
    pub repository: Option<CodespaceRepository>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Status of one post-create setup command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCreateStatus {
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for PostCreateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Progress event emitted while first-boot setup commands run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostCreateState {
    pub name: String,
    pub status: PostCreateStatus,
}

/// Request body for creating a codespace. Sent once per create attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateParams {
    pub repository_id: u64,
    #[serde(rename = "ref")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub machine: String,
    #[serde(rename = "devcontainer_path", skip_serializing_if = "String::is_empty")]
    pub dev_container_path: String,
    /// Zero asks the service for its default.
    #[serde(skip_serializing_if = "is_zero")]
    pub idle_timeout_minutes: u32,
    /// `None` is omitted from the body so the server default applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_period_minutes: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(rename = "multi_repo_permissions_opt_out")]
    pub permissions_opt_out: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip predicates take a reference
fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Validates an `owner/name` repository reference.
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] unless `nwo` has exactly one `/`
/// with non-empty parts on both sides.
pub fn validate_repo_spec(nwo: &str) -> Result<()> {
    let mut parts = nwo.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None)
            if !owner.trim().is_empty() && !name.trim().is_empty() && !nwo.contains(char::is_whitespace)
    );
    if !valid {
        return Err(CodespaceError::Validation(format!(
            "invalid repository {nwo:?}: expected the \"OWNER/REPO\" format"
        ))
        .into());
    }
    Ok(())
}

/// Validates a user-supplied display name.
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] when the name exceeds the service
/// limit.
pub fn validate_display_name(name: &str) -> Result<()> {
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(CodespaceError::Validation(format!(
            "display name should contain a maximum of {MAX_DISPLAY_NAME_LEN} characters"
        ))
        .into());
    }
    Ok(())
}
