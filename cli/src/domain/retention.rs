//! Idle-timeout and retention-period policy.
//!
//! Merges user overrides with "let the server decide" defaults. Pure
//! functions only.

use std::time::Duration;

use anyhow::Result;

use crate::domain::codespace::Codespace;
use crate::domain::error::CodespaceError;

/// Longest retention period the service accepts (30 days).
pub const MAX_RETENTION_MINUTES: u32 = 30 * 24 * 60;

/// An optional duration that keeps "not provided" apart from "explicitly zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullableDuration {
    /// Not provided; the server default applies.
    #[default]
    Unset,
    /// Explicitly reset to the server default.
    Cleared,
    Set(Duration),
}

impl NullableDuration {
    /// Parses a flag value. An empty string clears the override.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid duration.
    pub fn parse(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::Cleared);
        }
        Ok(Self::Set(parse_duration(s)?))
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Set(d) => Some(*d),
            Self::Unset | Self::Cleared => None,
        }
    }
}

/// Idle timeout and retention period, in whole minutes, ready for a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionSpec {
    /// Zero means "server default".
    pub idle_timeout_minutes: u32,
    pub retention_period_minutes: Option<u32>,
}

/// Builds the [`RetentionSpec`] for a create request.
///
/// Durations are truncated to whole minutes.
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] when a duration does not fit in
/// minutes or the retention period exceeds [`MAX_RETENTION_MINUTES`].
pub fn build_retention(
    idle_timeout: Option<Duration>,
    retention_period: NullableDuration,
) -> Result<RetentionSpec> {
    let idle_timeout_minutes = idle_timeout
        .map(|d| whole_minutes(d, "idle timeout"))
        .transpose()?
        .unwrap_or(0);

    let retention_period_minutes = retention_period
        .duration()
        .map(|d| whole_minutes(d, "retention period"))
        .transpose()?;

    if let Some(minutes) = retention_period_minutes
        && minutes > MAX_RETENTION_MINUTES
    {
        return Err(CodespaceError::Validation(format!(
            "retention period must be at most 30 days ({MAX_RETENTION_MINUTES} minutes), got {minutes} minutes"
        ))
        .into());
    }

    Ok(RetentionSpec {
        idle_timeout_minutes,
        retention_period_minutes,
    })
}

fn whole_minutes(d: Duration, what: &str) -> Result<u32> {
    u32::try_from(d.as_secs() / 60).map_err(|_| {
        CodespaceError::Validation(format!("{what} of {}s is too long", d.as_secs())).into()
    })
}

/// The notice line to show after creation, if any.
///
/// Notices are non-essential and only shown on interactive output so that
/// piped stdout/stderr stays clean.
#[must_use]
pub fn idle_timeout_notice(codespace: &Codespace, interactive: bool) -> Option<String> {
    if !interactive {
        return None;
    }
    codespace
        .idle_timeout_notice
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("Notice: {n}"))
}

/// Parses durations such as `30m`, `48h`, `1h 30m`, `2days`, or `7d`.
///
/// A bare number is read as minutes; everything else goes through
/// [`humantime::parse_duration`].
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] on empty input, unknown units, or
/// overflow.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if let Ok(minutes) = s.parse::<u64>() {
        return minutes.checked_mul(60).map(Duration::from_secs).ok_or_else(|| {
            CodespaceError::Validation(format!("invalid duration {input:?}: too large")).into()
        });
    }
    humantime::parse_duration(s).map_err(|e| {
        CodespaceError::Validation(format!("invalid duration {input:?}: {e}")).into()
    })
}
