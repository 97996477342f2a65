//! Application service: open a relay session against a ready codespace and
//! start an interactive channel over it.
//!
//! Every [`Session`] returned by [`connect`] must be closed. Use
//! [`with_session`] when the work fits in one scope.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    CodespaceLifecycle, CodespacesApi, ProgressReporter, RelayConnector, RelaySession,
    ServerRequest, StatePoller, UserDirectory,
};
use crate::application::services::readiness::until_canceled;
use crate::domain::codespace::{Codespace, CodespaceState, PostCreateState};
use crate::domain::error::CodespaceError;
use crate::domain::ssh::filter_authorized_keys;

/// Login used when the SSH server does not report one.
pub const DEFAULT_REMOTE_USER: &str = "codespace";

/// Local endpoint of an interactive SSH channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEndpoint {
    pub local_port: u16,
    pub remote_user: String,
}

/// Local endpoint of a notebook server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookEndpoint {
    pub local_port: u16,
    pub token: String,
}

impl NotebookEndpoint {
    /// Browser URL for the forwarded notebook.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/?token={}", self.local_port, self.token)
    }
}

/// An open relay session. Owns the relay handle until [`Session::close`].
pub struct Session<'a, A, S> {
    api: &'a A,
    relay: S,
    codespace: String,
    closed: AtomicBool,
}

impl<'a, A, S> Session<'a, A, S>
where
    A: UserDirectory,
    S: RelaySession,
{
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Starts an SSH server authorized for the current user's public keys and
    /// forwards a local port to it.
    ///
    /// # Errors
    ///
    /// Returns [`CodespaceError::Canceled`] (after closing the session) if
    /// `cancel` fires, or the first failing negotiation step.
    pub async fn start_interactive_shell(&self, cancel: &CancellationToken) -> Result<ShellEndpoint> {
        self.negotiate(cancel, async {
            let user = self.api.current_user().await.context("error getting user")?;
            let document = self
                .api
                .authorized_keys(&user.login)
                .await
                .context("error getting authorized keys")?;
            let request = ServerRequest::Ssh {
                authorized_keys: filter_authorized_keys(&document),
            };
            let server = self
                .relay
                .start_server(&request)
                .await
                .context("error starting SSH server")?;
            let local_port = self
                .relay
                .forward_port(server.port)
                .await
                .context("error forwarding SSH port")?;
            Ok(ShellEndpoint {
                local_port,
                remote_user: server
                    .user
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| DEFAULT_REMOTE_USER.to_string()),
            })
        })
        .await
    }

    /// Starts the notebook server and forwards a local port to it.
    ///
    /// # Errors
    ///
    /// Returns [`CodespaceError::Canceled`] (after closing the session) if
    /// `cancel` fires, or the first failing negotiation step.
    pub async fn start_notebook_server(
        &self,
        cancel: &CancellationToken,
    ) -> Result<NotebookEndpoint> {
        self.negotiate(cancel, async {
            let server = self
                .relay
                .start_server(&ServerRequest::Notebook)
                .await
                .context("error starting notebook server")?;
            let token = server
                .token
                .ok_or_else(|| anyhow::anyhow!("notebook server did not report an access token"))?;
            let local_port = self
                .relay
                .forward_port(server.port)
                .await
                .context("error forwarding notebook port")?;
            Ok(NotebookEndpoint { local_port, token })
        })
        .await
    }

    /// Releases the relay session and every forwarded port. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects the close request.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(codespace = %self.codespace, "closing relay session");
        self.relay.close().await
    }

    async fn negotiate<T>(
        &self,
        cancel: &CancellationToken,
        step: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        anyhow::ensure!(!self.is_closed(), "session for {} is closed", self.codespace);
        let result = until_canceled(cancel, step).await;
        if let Err(err) = &result
            && CodespaceError::is_canceled(err)
            && let Err(close_err) = self.close().await
        {
            tracing::warn!(error = %close_err, "closing canceled session failed");
        }
        result
    }
}

/// Opens a relay session against `codespace`.
///
/// Fails fast without touching the relay when the codespace is not in a
/// connectable state. Missing connection info is re-fetched once.
///
/// # Errors
///
/// Returns [`CodespaceError::NotConnectable`], [`CodespaceError::Canceled`],
/// or the relay handshake error.
pub async fn connect<'a, A, R>(
    api: &'a A,
    relay: &R,
    codespace: &Codespace,
    cancel: &CancellationToken,
) -> Result<Session<'a, A, R::Session>>
where
    A: CodespacesApi,
    R: RelayConnector,
{
    let not_connectable = |state: &CodespaceState| CodespaceError::NotConnectable {
        name: codespace.name.clone(),
        state: state.to_string(),
    };

    if !codespace.state.is_connectable() {
        return Err(not_connectable(&codespace.state).into());
    }

    let connection = match &codespace.connection {
        Some(connection) => connection.clone(),
        None => {
            let fresh = until_canceled(cancel, api.get_codespace(&codespace.name, true))
                .await
                .context("error getting codespace connection info")?;
            if !fresh.state.is_connectable() {
                return Err(not_connectable(&fresh.state).into());
            }
            fresh
                .connection
                .ok_or_else(|| not_connectable(&fresh.state))?
        }
    };

    let relay_session = until_canceled(cancel, relay.open(&connection))
        .await
        .context("error connecting to codespace")?;
    tracing::debug!(codespace = %codespace.name, "relay session open");

    Ok(Session {
        api,
        relay: relay_session,
        codespace: codespace.name.clone(),
        closed: AtomicBool::new(false),
    })
}

/// Runs `work` with `session` and closes the session afterwards, whether
/// `work` succeeded or not.
///
/// A failed close is logged; the result of `work` is always returned.
///
/// # Errors
///
/// Returns the error of `work`.
pub async fn with_session<'a, A, S, T, F>(session: Session<'a, A, S>, work: F) -> Result<T>
where
    A: UserDirectory,
    S: RelaySession,
    F: AsyncFnOnce(&Session<'a, A, S>) -> Result<T>,
{
    let result = work(&session).await;
    if let Err(close_err) = session.close().await {
        tracing::warn!(error = %close_err, "closing session failed");
    }
    result
}

/// Starts a shut-down codespace and waits until it is connectable.
///
/// Codespaces in any other state are returned as-is.
///
/// # Errors
///
/// Returns the start request error or the poller's error.
pub async fn ensure_started<A, P>(
    api: &A,
    poller: &P,
    reporter: &impl ProgressReporter,
    codespace: Codespace,
    on_event: &mut dyn FnMut(&PostCreateState),
    cancel: &CancellationToken,
) -> Result<Codespace>
where
    A: CodespaceLifecycle,
    P: StatePoller,
{
    if codespace.state != CodespaceState::Shutdown {
        return Ok(codespace);
    }
    reporter.step(&format!("Starting codespace {}", codespace.name));
    until_canceled(cancel, api.start_codespace(&codespace.name))
        .await
        .context("error starting codespace")?;
    let ready = poller.poll_states(api, &codespace, on_event, cancel).await?;
    if ready.state == CodespaceState::Shutdown {
        return Err(CodespaceError::NotConnectable {
            name: ready.name,
            state: ready.state.to_string(),
        }
        .into());
    }
    reporter.success(&format!("Codespace {} started", ready.name));
    Ok(ready)
}
