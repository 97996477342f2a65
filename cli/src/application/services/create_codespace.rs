//! Application service: the create-and-optionally-connect use case.
//!
//! Selection → retention policy → create → readiness → live session. Each
//! stage may short-circuit with a typed error.

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    Chooser, CodespacesApi, ProgressReporter, RelayConnector, StatePoller, UserStream,
};
use crate::application::services::provision;
use crate::application::services::readiness::until_canceled;
use crate::application::services::selection::{
    MachineSelection, SelectionRequest, resolve_selection,
};
use crate::application::services::session::{
    NotebookEndpoint, Session, ShellEndpoint, connect, ensure_started,
};
use crate::domain::codespace::{Codespace, CreateParams, PostCreateState, validate_display_name};
use crate::domain::retention::{NullableDuration, build_retention, idle_timeout_notice};

/// Interactive channel to open once the codespace is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Shell,
    Notebook,
}

/// Everything the user asked for.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub selection: SelectionRequest,
    pub display_name: String,
    pub idle_timeout: Option<Duration>,
    pub retention_period: NullableDuration,
    /// Proceed with default permissions only.
    pub permissions_opt_out: bool,
    /// Report post-create progress while waiting.
    pub show_status: bool,
    /// `None` creates and returns without connecting.
    pub channel: Option<Channel>,
}

/// Injected collaborators.
pub struct CreateDeps<'a, A, R, P, C, U, G> {
    pub api: &'a A,
    pub relay: &'a R,
    pub poller: &'a P,
    pub chooser: &'a C,
    pub stream: &'a U,
    pub reporter: &'a G,
    pub machines: MachineSelection,
}

/// Channel endpoint started on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEndpoint {
    Shell(ShellEndpoint),
    Notebook(NotebookEndpoint),
}

/// Result of [`create_and_optionally_connect`].
pub enum CreateOutcome<'a, A, S> {
    /// Print-only flow.
    Created(Codespace),
    /// Interactive flow. The caller owns `session` and must close it.
    Connected {
        codespace: Codespace,
        session: Session<'a, A, S>,
        channel: ChannelEndpoint,
    },
}

/// Creates a codespace and, when a channel was requested, waits for it and
/// opens a live session.
///
/// # Errors
///
/// Returns the first failing stage's error. A permissions prompt yields
/// [`crate::domain::error::CodespaceError::Silent`].
pub async fn create_and_optionally_connect<'a, A, R, P, C, U, G>(
    deps: &CreateDeps<'a, A, R, P, C, U, G>,
    options: &CreateOptions,
    cancel: &CancellationToken,
) -> Result<CreateOutcome<'a, A, R::Session>>
where
    A: CodespacesApi,
    R: RelayConnector,
    P: StatePoller,
    C: Chooser,
    U: UserStream,
    G: ProgressReporter,
{
    validate_display_name(&options.display_name)?;
    let retention = build_retention(options.idle_timeout, options.retention_period)?;

    let selection = until_canceled(
        cancel,
        resolve_selection(
            deps.api,
            deps.chooser,
            deps.reporter,
            &options.selection,
            &deps.machines,
        ),
    )
    .await?;

    let params = CreateParams {
        repository_id: selection.repository.id,
        branch: selection.branch,
        location: selection.location,
        machine: selection.machine,
        dev_container_path: selection.dev_container_path,
        idle_timeout_minutes: retention.idle_timeout_minutes,
        retention_period_minutes: retention.retention_period_minutes,
        display_name: options.display_name.clone(),
        permissions_opt_out: options.permissions_opt_out,
    };

    deps.reporter.step(&format!(
        "Creating codespace for {} ({})",
        selection.repository.full_name, params.branch
    ));
    let codespace = until_canceled(
        cancel,
        provision::create_codespace(deps.api, deps.stream, &params),
    )
    .await?;
    tracing::info!(codespace = %codespace.name, "codespace created");

    if let Some(notice) = idle_timeout_notice(&codespace, deps.stream.is_interactive()) {
        deps.stream.println(&notice);
    }

    let reporter = deps.reporter;
    let show_status = options.show_status;
    let mut on_event = |state: &PostCreateState| {
        if show_status {
            reporter.step(&format!("{}: {}", state.name, state.status));
        }
    };

    let Some(channel) = options.channel else {
        if show_status {
            let ready = deps
                .poller
                .poll_states(deps.api, &codespace, &mut on_event, cancel)
                .await?;
            return Ok(CreateOutcome::Created(ready));
        }
        return Ok(CreateOutcome::Created(codespace));
    };

    reporter.step(&format!("Waiting for codespace {} to be ready", codespace.name));
    let ready = deps
        .poller
        .poll_states(deps.api, &codespace, &mut on_event, cancel)
        .await?;
    let ready = ensure_started(
        deps.api,
        deps.poller,
        reporter,
        ready,
        &mut on_event,
        cancel,
    )
    .await?;
    reporter.success(&format!("Codespace {} is available", ready.name));

    let session = connect(deps.api, deps.relay, &ready, cancel).await?;
    let started = match channel {
        Channel::Shell => session
            .start_interactive_shell(cancel)
            .await
            .map(ChannelEndpoint::Shell),
        Channel::Notebook => session
            .start_notebook_server(cancel)
            .await
            .map(ChannelEndpoint::Notebook),
    };
    match started {
        Ok(endpoint) => Ok(CreateOutcome::Connected {
            codespace: ready,
            session,
            channel: endpoint,
        }),
        Err(err) => {
            if let Err(close_err) = session.close().await {
                tracing::warn!(error = %close_err, "closing session failed");
            }
            Err(err)
        }
    }
}
