//! `codespace create`: create a codespace, optionally opening a shell or a
//! notebook on it.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::create_codespace::{
    Channel, ChannelEndpoint, CreateDeps, CreateOptions, CreateOutcome,
    create_and_optionally_connect,
};
use crate::application::services::readiness::FixedIntervalPoller;
use crate::application::services::selection::{MachineSelection, SelectionRequest};
use crate::application::services::session::with_session;
use crate::domain::error::CodespaceError;
use crate::domain::retention::{NullableDuration, parse_duration};
use crate::infra::api::HttpCodespacesApi;
use crate::infra::relay::RelayClient;
use crate::infra::ssh;
use crate::output::{DialoguerChooser, StderrStream, TerminalReporter};

/// Arguments for the create command.
#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Repository name with owner: OWNER/REPO
    #[arg(short = 'R', long = "repo", default_value = "")]
    pub repo: String,

    /// Repository branch (default: the repository's default branch)
    #[arg(short, long, default_value = "")]
    pub branch: String,

    /// Location: EastUs, SouthEastAsia, WestEurope, WestUs2 (determined automatically if not provided)
    #[arg(long, default_value = "")]
    pub location: String,

    /// Hardware specifications for the VM
    #[arg(short, long, default_value = "")]
    pub machine: String,

    /// Path to the devcontainer.json file to use when creating codespace
    #[arg(long = "devcontainer-path", default_value = "")]
    pub devcontainer_path: String,

    /// Display name for the codespace
    #[arg(short, long = "display-name", default_value = "")]
    pub display_name: String,

    /// Allowed inactivity before codespace is stopped, e.g. "10m", "1h"
    #[arg(long = "idle-timeout", value_parser = parse_duration_arg)]
    pub idle_timeout: Option<Duration>,

    /// Allowed time after shutting down before the codespace is automatically deleted (maximum 30 days), e.g. "1h", "72h". An empty value clears it
    #[arg(long = "retention-period")]
    pub retention_period: Option<String>,

    /// Do not prompt to accept additional permissions requested by the codespace
    #[arg(long = "default-permissions")]
    pub default_permissions: bool,

    /// Show status of post-create command and dotfiles
    #[arg(short = 's', long = "status")]
    pub status: bool,

    /// Open an SSH session once the codespace is ready
    #[arg(long, conflicts_with = "jupyter")]
    pub ssh: bool,

    /// Start a notebook server once the codespace is ready and print its URL
    #[arg(long)]
    pub jupyter: bool,
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

impl CreateArgs {
    /// Translate flags into service options.
    ///
    /// # Errors
    ///
    /// Returns an error if `--retention-period` is not a valid duration.
    pub fn to_options(&self) -> Result<CreateOptions> {
        let retention_period = match &self.retention_period {
            None => NullableDuration::Unset,
            Some(raw) => NullableDuration::parse(raw)?,
        };
        let channel = if self.ssh {
            Some(Channel::Shell)
        } else if self.jupyter {
            Some(Channel::Notebook)
        } else {
            None
        };
        Ok(CreateOptions {
            selection: SelectionRequest {
                repo: self.repo.clone(),
                branch: self.branch.clone(),
                dev_container_path: self.devcontainer_path.clone(),
                machine: self.machine.clone(),
                location: self.location.clone(),
            },
            display_name: self.display_name.clone(),
            idle_timeout: self.idle_timeout,
            retention_period,
            permissions_opt_out: self.default_permissions,
            show_status: self.status,
            channel,
        })
    }
}

/// Run `codespace create`.
///
/// Prints the codespace name on stdout. With `--ssh` it then runs `ssh`
/// through the relay; with `--jupyter` it prints the notebook URL and keeps
/// the session open until interrupted.
///
/// # Errors
///
/// Returns an error if any stage of the create flow fails.
pub async fn run(app: &AppContext, args: &CreateArgs, cancel: &CancellationToken) -> Result<ExitCode> {
    let options = args.to_options()?;
    let config = config_service::load_config(&app.config_store)?;
    let api = HttpCodespacesApi::from_env(&config.api)?;
    let relay = RelayClient::default();
    let poller = FixedIntervalPoller::from_config(&config.poll);
    let chooser = DialoguerChooser::new(app.non_interactive);
    let stream = StderrStream::new(&app.output);
    let reporter = TerminalReporter::new(&app.output);

    let deps = CreateDeps {
        api: &api,
        relay: &relay,
        poller: &poller,
        chooser: &chooser,
        stream: &stream,
        reporter: &reporter,
        machines: MachineSelection {
            policy: config.machine.policy,
            default: config.machine.default.clone(),
        },
    };

    let outcome = match create_and_optionally_connect(&deps, &options, cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            reporter.fail();
            return Err(err);
        }
    };
    reporter.finish();

    match outcome {
        CreateOutcome::Created(codespace) => {
            println!("{}", codespace.name);
            Ok(ExitCode::SUCCESS)
        }
        CreateOutcome::Connected {
            codespace,
            session,
            channel,
        } => {
            println!("{}", codespace.name);
            with_session(session, async move |_| match channel {
                ChannelEndpoint::Shell(shell) => {
                    tokio::select! {
                        () = cancel.cancelled() => Err(CodespaceError::Canceled.into()),
                        status = ssh::run_interactive(shell.local_port, &shell.remote_user) => {
                            status.map(|s| match s.code() {
                                Some(0) => ExitCode::SUCCESS,
                                Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
                                None => ExitCode::FAILURE,
                            })
                        }
                    }
                }
                ChannelEndpoint::Notebook(notebook) => {
                    app.output.info(&format!("Notebook server: {}", notebook.url()));
                    app.output.info("Press Ctrl+C to stop forwarding");
                    cancel.cancelled().await;
                    Ok(ExitCode::SUCCESS)
                }
            })
            .await
        }
    }
}
