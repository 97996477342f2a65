//! Application service: wait for a codespace to become connectable.
//!
//! Polling runs on a fixed interval with a single request in flight. Every
//! wait is raced against the caller's [`CancellationToken`], so no request is
//! issued after cancellation.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{CodespaceLifecycle, StatePoller};
use crate::domain::codespace::{Codespace, CodespaceState, PostCreateState, PostCreateStatus};
use crate::domain::config::PollConfig;
use crate::domain::error::{ApiError, CodespaceError};

/// Runs `fut` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`CodespaceError::Canceled`] on cancellation, otherwise whatever
/// `fut` returns.
pub async fn until_canceled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CodespaceError::Canceled.into()),
        result = fut => result,
    }
}

/// Default [`StatePoller`]: fixed interval, bounded retries, overall deadline.
///
/// A `Shutdown` snapshot is handed back as-is so the caller can start it.
#[derive(Debug, Clone)]
pub struct FixedIntervalPoller {
    pub interval: Duration,
    pub timeout: Duration,
    /// Consecutive failed rounds tolerated before giving up.
    pub max_retries: u32,
}

impl Default for FixedIntervalPoller {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

impl FixedIntervalPoller {
    #[must_use]
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
        }
    }
}

impl StatePoller for FixedIntervalPoller {
    async fn poll_states<A: CodespaceLifecycle>(
        &self,
        api: &A,
        codespace: &Codespace,
        on_event: &mut dyn FnMut(&PostCreateState),
        cancel: &CancellationToken,
    ) -> Result<Codespace> {
        let name = codespace.name.as_str();
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut seen: HashSet<String> = HashSet::new();
        let mut failures: u32 = 0;
        let mut last_failed_step: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(CodespaceError::Canceled.into());
            }

            match until_canceled(cancel, poll_round(api, name)).await {
                Ok((states, snapshot)) => {
                    failures = 0;
                    for state in &states {
                        if state.status == PostCreateStatus::Failed {
                            last_failed_step = Some(state.name.clone());
                        }
                        if seen.insert(state.name.clone()) {
                            on_event(state);
                        }
                    }

                    if snapshot.state.is_connectable() {
                        tracing::debug!(codespace = name, "codespace is available");
                        return Ok(snapshot);
                    }
                    if snapshot.state == CodespaceState::Shutdown {
                        tracing::debug!(codespace = name, "codespace is shut down");
                        return Ok(snapshot);
                    }
                    if snapshot.state.is_terminal_failure() {
                        return Err(CodespaceError::ProvisionFailed {
                            name: name.to_string(),
                            state: snapshot.state.to_string(),
                            diagnostic: last_failed_step
                                .map(|step| format!("setup step {step:?} failed")),
                        }
                        .into());
                    }
                    tracing::trace!(codespace = name, state = %snapshot.state, "still waiting");
                }
                Err(err) if CodespaceError::is_canceled(&err) => return Err(err),
                Err(err) if !is_transient(&err) => return Err(err),
                Err(err) => {
                    failures += 1;
                    if failures > self.max_retries {
                        return Err(CodespaceError::Transport(format!(
                            "polling codespace {name} failed {failures} times in a row: {err:#}"
                        ))
                        .into());
                    }
                    tracing::debug!(attempt = failures, error = %err, "poll failed, retrying");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CodespaceError::ReadinessTimeout {
                    name: name.to_string(),
                    waited: now - started,
                }
                .into());
            }
            let pause = self.interval.min(deadline - now);
            until_canceled(cancel, async {
                tokio::time::sleep(pause).await;
                Ok(())
            })
            .await?;
        }
    }
}

async fn poll_round<A: CodespaceLifecycle>(
    api: &A,
    name: &str,
) -> Result<(Vec<PostCreateState>, Codespace)> {
    let states = api.post_create_states(name).await?;
    let snapshot = api.get_codespace(name, false).await?;
    Ok((states, snapshot))
}

fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_transient)
}
