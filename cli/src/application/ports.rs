//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`: never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    CliConfig, Codespace, ConnectionInfo, CreateParams, DevContainerEntry, Machine,
    PostCreateState, Repository, User,
};

// ── Remote Service Ports ──────────────────────────────────────────────────────

/// Repository and catalog lookups used while resolving a create request.
#[allow(async_fn_in_trait)]
pub trait RepositoryCatalog {
    /// Resolve `owner/name` to a repository.
    async fn get_repository(&self, nwo: &str) -> Result<Repository>;
    /// Devcontainer definitions for a repository/branch pair, in discovery order.
    async fn list_dev_containers(
        &self,
        repo_id: u64,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<DevContainerEntry>>;
    /// Repository names matching a partial `owner/name`.
    async fn repo_suggestions(&self, partial: &str, limit: usize) -> Result<Vec<String>>;
    /// Machine types available for a repository/branch in a location.
    async fn list_machines(
        &self,
        repo_id: u64,
        branch: &str,
        location: &str,
    ) -> Result<Vec<Machine>>;
    /// The region closest to the caller.
    async fn region_location(&self) -> Result<String>;
}

/// Codespace create/read/start operations.
#[allow(async_fn_in_trait)]
pub trait CodespaceLifecycle {
    /// Issue one create request.
    async fn create_codespace(&self, params: &CreateParams) -> Result<Codespace>;
    /// Fetch a fresh snapshot. `include_connection` asks for relay credentials.
    async fn get_codespace(&self, name: &str, include_connection: bool) -> Result<Codespace>;
    /// Ask the service to start a stopped codespace.
    async fn start_codespace(&self, name: &str) -> Result<()>;
    /// Post-create setup progress, in emission order.
    async fn post_create_states(&self, name: &str) -> Result<Vec<PostCreateState>>;
}

/// Identity lookups for the authenticated user.
#[allow(async_fn_in_trait)]
pub trait UserDirectory {
    async fn current_user(&self) -> Result<User>;
    /// The raw `authorized_keys` document published for `login`.
    async fn authorized_keys(&self, login: &str) -> Result<String>;
}

/// Composite trait: any type implementing all three sub-traits is a `CodespacesApi`.
pub trait CodespacesApi: RepositoryCatalog + CodespaceLifecycle + UserDirectory {}

/// Blanket implementation: any type implementing all three sub-traits is a `CodespacesApi`.
impl<T> CodespacesApi for T where T: RepositoryCatalog + CodespaceLifecycle + UserDirectory {}

// ── Relay Ports ───────────────────────────────────────────────────────────────

/// A server to start inside the codespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerRequest {
    /// SSH daemon accepting the given public keys (newline separated).
    Ssh { authorized_keys: String },
    /// Jupyter notebook server.
    Notebook,
}

/// A server started inside the codespace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteServer {
    /// Port the server listens on inside the codespace.
    pub port: u16,
    /// Login user for SSH servers.
    pub user: Option<String>,
    /// Access token for notebook servers.
    pub token: Option<String>,
}

/// Opens relay sessions against connectable codespaces.
#[allow(async_fn_in_trait)]
pub trait RelayConnector {
    type Session: RelaySession;

    async fn open(&self, connection: &ConnectionInfo) -> Result<Self::Session>;
}

/// One open relay session.
#[allow(async_fn_in_trait)]
pub trait RelaySession {
    /// Start a server inside the codespace.
    async fn start_server(&self, request: &ServerRequest) -> Result<RemoteServer>;
    /// Forward a local loopback port to `remote_port`. Returns the local port.
    async fn forward_port(&self, remote_port: u16) -> Result<u16>;
    /// Release the session and stop every forwarded port.
    async fn close(&self) -> Result<()>;
}

// ── Readiness Port ────────────────────────────────────────────────────────────

/// Strategy for waiting until a codespace is connectable.
///
/// Implementations dispatch each post-create state name to `on_event` at most
/// once and stop issuing requests once `cancel` fires.
#[allow(async_fn_in_trait)]
pub trait StatePoller {
    async fn poll_states<A: CodespaceLifecycle>(
        &self,
        api: &A,
        codespace: &Codespace,
        on_event: &mut dyn FnMut(&PostCreateState),
        cancel: &CancellationToken,
    ) -> Result<Codespace>;
}

// ── Presentation Ports ────────────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Interactive selection and free-text input.
pub trait Chooser {
    /// Whether prompts can be shown. When `false`, callers must not call
    /// `choose` or `input`.
    fn is_interactive(&self) -> bool;
    /// Pick one of `options`. Returns the chosen index.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt fails or is aborted.
    fn choose(&self, prompt: &str, options: &[String], default: usize) -> Result<usize>;
    /// Ask for a line of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt fails or is aborted.
    fn input(&self, prompt: &str) -> Result<String>;
}

/// User-facing error stream (stderr).
pub trait UserStream {
    /// Whether the stream is attached to a terminal.
    fn is_interactive(&self) -> bool;
    fn println(&self, message: &str);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, returning defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<CliConfig>;
    /// Persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &CliConfig) -> Result<()>;
    /// Location of the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
