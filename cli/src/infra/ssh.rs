//! Local `ssh` client launched against a forwarded relay port.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Arguments for `ssh` connecting to `user@127.0.0.1:port`.
///
/// The forwarded port changes on every session, so host keys are neither
/// checked nor recorded.
#[must_use]
pub fn ssh_args(local_port: u16, remote_user: &str) -> Vec<String> {
    vec![
        "-p".to_string(),
        local_port.to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        format!("UserKnownHostsFile={NULL_DEVICE}"),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        format!("{remote_user}@127.0.0.1"),
    ]
}

/// Runs an interactive `ssh` session with inherited stdio until it exits.
///
/// # Errors
///
/// Returns an error if `ssh` cannot be spawned.
pub async fn run_interactive(local_port: u16, remote_user: &str) -> Result<ExitStatus> {
    let args = ssh_args(local_port, remote_user);
    tracing::debug!(local_port, remote_user, "launching ssh");
    let mut child = tokio::process::Command::new("ssh")
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .context("ssh is not installed or not in PATH")?;
    child.wait().await.context("waiting for ssh")
}
