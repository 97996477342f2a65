//! Shared stub implementations of the service ports.
//!
//! Every stub records the calls it receives so tests can assert on ordering
//! and on what was never called.

#![allow(dead_code, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use codespace_cli::application::ports::{
    Chooser, CodespaceLifecycle, ProgressReporter, RelayConnector, RelaySession, RemoteServer,
    RepositoryCatalog, ServerRequest, UserDirectory, UserStream,
};
use codespace_cli::domain::{
    ApiError, Codespace, CodespaceState, ConnectionInfo, CreateParams, DevContainerEntry,
    Machine, PostCreateState, PostCreateStatus, Repository, User,
};

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn dotfiles_repo() -> Repository {
    Repository {
        id: 42,
        full_name: "monalisa/dotfiles".to_string(),
        default_branch: "main".to_string(),
    }
}

pub fn machine(name: &str, cpus: u32) -> Machine {
    Machine {
        name: name.to_string(),
        display_name: format!("{cpus} cores"),
        prebuild_availability: String::new(),
        cpus,
        memory_in_bytes: u64::from(cpus) * 4 * 1024 * 1024 * 1024,
        storage_in_bytes: 32 * 1024 * 1024 * 1024,
    }
}

pub fn devcontainer(path: &str) -> DevContainerEntry {
    DevContainerEntry {
        path: path.to_string(),
        name: None,
    }
}

pub fn connection() -> ConnectionInfo {
    ConnectionInfo {
        session_id: "session-1".to_string(),
        session_token: "session-token".to_string(),
        relay_endpoint: "https://relay.example.com".to_string(),
        relay_sas: "sas".to_string(),
    }
}

pub fn codespace(name: &str, state: CodespaceState) -> Codespace {
    let connection = state.is_connectable().then(connection);
    Codespace {
        name: name.to_string(),
        state,
        connection,
        ..Codespace::default()
    }
}

pub fn step(name: &str, status: PostCreateStatus) -> PostCreateState {
    PostCreateState {
        name: name.to_string(),
        status,
    }
}

// ── StubApi ──────────────────────────────────────────────────────────────────

/// Scripted reply for one `get_codespace` poll.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Codespace),
    /// Server-side failure that may clear up.
    Transient,
    /// Client error that will not clear up.
    Fatal,
}

/// Scripted create response.
#[derive(Debug, Clone)]
pub enum CreateReply {
    Ok(Codespace),
    Permissions(String),
    Fail(u16),
}

/// In-memory codespaces service.
///
/// `polls` and `post_create` are consumed front to back; the last entry
/// repeats once the script runs out.
pub struct StubApi {
    pub repository: Option<Repository>,
    pub suggestions: Vec<String>,
    pub dev_containers: Option<Vec<DevContainerEntry>>,
    pub machines: Option<Vec<Machine>>,
    pub region: Option<String>,
    pub create: CreateReply,
    pub polls: Mutex<VecDeque<Reply>>,
    pub post_create: Mutex<VecDeque<Vec<PostCreateState>>>,
    /// Snapshot returned for `get_codespace(_, true)`.
    pub with_connection: Option<Codespace>,
    pub login: String,
    pub keys: String,
    /// Fires the token once this many polls have been answered.
    pub cancel_after_polls: Option<(usize, CancellationToken)>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreateParams>>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            repository: Some(dotfiles_repo()),
            suggestions: Vec::new(),
            dev_containers: Some(Vec::new()),
            machines: Some(vec![machine("GIGA", 32)]),
            region: Some("WestUs2".to_string()),
            create: CreateReply::Ok(codespace("monalisa-dotfiles-abcd1234", CodespaceState::Queued)),
            polls: Mutex::new(VecDeque::from([Reply::Ok(codespace(
                "monalisa-dotfiles-abcd1234",
                CodespaceState::Available,
            ))])),
            post_create: Mutex::new(VecDeque::from([Vec::new()])),
            with_connection: None,
            login: "monalisa".to_string(),
            keys: "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIG0 monalisa@laptop\n".to_string(),
            cancel_after_polls: None,
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }
}

impl StubApi {
    pub fn with_polls(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        *self.polls.lock().expect("lock") = replies.into_iter().collect();
        self
    }

    pub fn with_post_create(self, rounds: impl IntoIterator<Item = Vec<PostCreateState>>) -> Self {
        *self.post_create.lock().expect("lock") = rounds.into_iter().collect();
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("lock").push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn created(&self) -> Vec<CreateParams> {
        self.created.lock().expect("lock").clone()
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().expect("lock");
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn not_found() -> anyhow::Error {
    ApiError::Status {
        status: 404,
        message: "Not Found".to_string(),
    }
    .into()
}

impl RepositoryCatalog for StubApi {
    async fn get_repository(&self, nwo: &str) -> Result<Repository> {
        self.record(format!("get_repository {nwo}"));
        self.repository.clone().ok_or_else(not_found)
    }

    async fn list_dev_containers(
        &self,
        _repo_id: u64,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<DevContainerEntry>> {
        self.record(format!("list_dev_containers {branch} {limit}"));
        self.dev_containers.clone().ok_or_else(not_found)
    }

    async fn repo_suggestions(&self, partial: &str, _limit: usize) -> Result<Vec<String>> {
        self.record(format!("repo_suggestions {partial}"));
        Ok(self.suggestions.clone())
    }

    async fn list_machines(
        &self,
        _repo_id: u64,
        branch: &str,
        location: &str,
    ) -> Result<Vec<Machine>> {
        self.record(format!("list_machines {branch} {location}"));
        self.machines.clone().ok_or_else(|| {
            ApiError::Status {
                status: 500,
                message: "machines unavailable".to_string(),
            }
            .into()
        })
    }

    async fn region_location(&self) -> Result<String> {
        self.record("region_location");
        self.region
            .clone()
            .ok_or_else(|| ApiError::Transport("dns failure".to_string()).into())
    }
}

impl CodespaceLifecycle for StubApi {
    async fn create_codespace(&self, params: &CreateParams) -> Result<Codespace> {
        self.record("create_codespace");
        self.created.lock().expect("lock").push(params.clone());
        match &self.create {
            CreateReply::Ok(codespace) => Ok(codespace.clone()),
            CreateReply::Permissions(url) => Err(ApiError::AcceptPermissionsRequired {
                allow_permissions_url: url.clone(),
            }
            .into()),
            CreateReply::Fail(status) => Err(ApiError::Status {
                status: *status,
                message: "create failed".to_string(),
            }
            .into()),
        }
    }

    async fn get_codespace(&self, name: &str, include_connection: bool) -> Result<Codespace> {
        if include_connection {
            self.record(format!("get_codespace_connection {name}"));
            return self.with_connection.clone().ok_or_else(not_found);
        }
        self.record(format!("get_codespace {name}"));
        let reply = Self::next(&self.polls);
        if let Some((after, token)) = &self.cancel_after_polls
            && self.count("get_codespace ") >= *after
        {
            token.cancel();
        }
        match reply {
            Some(Reply::Ok(codespace)) => Ok(codespace),
            Some(Reply::Transient) => Err(ApiError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            }
            .into()),
            Some(Reply::Fatal) | None => Err(ApiError::Status {
                status: 401,
                message: "Bad credentials".to_string(),
            }
            .into()),
        }
    }

    async fn start_codespace(&self, name: &str) -> Result<()> {
        self.record(format!("start_codespace {name}"));
        Ok(())
    }

    async fn post_create_states(&self, name: &str) -> Result<Vec<PostCreateState>> {
        self.record(format!("post_create_states {name}"));
        Ok(Self::next(&self.post_create).unwrap_or_default())
    }
}

impl UserDirectory for StubApi {
    async fn current_user(&self) -> Result<User> {
        self.record("current_user");
        Ok(User {
            login: self.login.clone(),
        })
    }

    async fn authorized_keys(&self, login: &str) -> Result<String> {
        self.record(format!("authorized_keys {login}"));
        Ok(self.keys.clone())
    }
}

// ── StubRelay ────────────────────────────────────────────────────────────────

/// Relay that records every session operation in a shared log.
#[derive(Default)]
pub struct StubRelay {
    pub fail_open: bool,
    pub fail_start: bool,
    /// Never completes `start_server`, so cancellation can be observed.
    pub hang_start: bool,
    pub fail_close: bool,
    pub server: RemoteServer,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl StubRelay {
    pub fn ssh() -> Self {
        Self {
            server: RemoteServer {
                port: 2222,
                user: Some("vscode".to_string()),
                token: None,
            },
            ..Self::default()
        }
    }

    pub fn notebook() -> Self {
        Self {
            server: RemoteServer {
                port: 8888,
                user: None,
                token: Some("nb-token".to_string()),
            },
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("lock").clone()
    }
}

pub struct StubRelaySession {
    fail_start: bool,
    hang_start: bool,
    fail_close: bool,
    server: RemoteServer,
    log: Arc<Mutex<Vec<String>>>,
}

impl StubRelaySession {
    fn record(&self, event: impl Into<String>) {
        self.log.lock().expect("lock").push(event.into());
    }
}

impl RelayConnector for StubRelay {
    type Session = StubRelaySession;

    async fn open(&self, connection: &ConnectionInfo) -> Result<StubRelaySession> {
        self.log
            .lock()
            .expect("lock")
            .push(format!("open {}", connection.session_id));
        if self.fail_open {
            anyhow::bail!("relay refused the session");
        }
        Ok(StubRelaySession {
            fail_start: self.fail_start,
            hang_start: self.hang_start,
            fail_close: self.fail_close,
            server: self.server.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

impl RelaySession for StubRelaySession {
    async fn start_server(&self, request: &ServerRequest) -> Result<RemoteServer> {
        match request {
            ServerRequest::Ssh { authorized_keys } => {
                self.record(format!("start_server ssh keys={}", authorized_keys.lines().count()));
            }
            ServerRequest::Notebook => self.record("start_server notebook"),
        }
        if self.hang_start {
            std::future::pending::<()>().await;
        }
        if self.fail_start {
            anyhow::bail!("server failed to start");
        }
        Ok(self.server.clone())
    }

    async fn forward_port(&self, remote_port: u16) -> Result<u16> {
        self.record(format!("forward_port {remote_port}"));
        Ok(40_000 + remote_port % 1000)
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        if self.fail_close {
            anyhow::bail!("relay refused to leave");
        }
        Ok(())
    }
}

// ── Presentation stubs ───────────────────────────────────────────────────────

/// Chooser that answers prompts from a script and records what it was asked.
#[derive(Default)]
pub struct ScriptedChooser {
    pub interactive: bool,
    pub choices: Mutex<VecDeque<usize>>,
    pub inputs: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedChooser {
    pub fn non_interactive() -> Self {
        Self::default()
    }

    pub fn answering(choices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            interactive: true,
            choices: Mutex::new(choices.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_input(self, input: &str) -> Self {
        self.inputs.lock().expect("lock").push_back(input.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<(String, Vec<String>)> {
        self.prompts.lock().expect("lock").clone()
    }
}

impl Chooser for ScriptedChooser {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn choose(&self, prompt: &str, options: &[String], default: usize) -> Result<usize> {
        assert!(self.interactive, "prompted while non-interactive: {prompt}");
        self.prompts
            .lock()
            .expect("lock")
            .push((prompt.to_string(), options.to_vec()));
        Ok(self
            .choices
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(default))
    }

    fn input(&self, prompt: &str) -> Result<String> {
        assert!(self.interactive, "prompted while non-interactive: {prompt}");
        self.prompts
            .lock()
            .expect("lock")
            .push((prompt.to_string(), Vec::new()));
        Ok(self
            .inputs
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_default())
    }
}

/// User stream that keeps every printed line.
#[derive(Default)]
pub struct RecordingStream {
    pub interactive: bool,
    pub lines: Mutex<Vec<String>>,
}

impl RecordingStream {
    pub fn tty() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lock").clone()
    }
}

impl UserStream for RecordingStream {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn println(&self, message: &str) {
        self.lines.lock().expect("lock").push(message.to_string());
    }
}

/// Progress reporter that keeps every event as `kind: message`.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock").clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.lock().expect("lock").push(format!("step: {message}"));
    }

    fn success(&self, message: &str) {
        self.events.lock().expect("lock").push(format!("success: {message}"));
    }

    fn warn(&self, message: &str) {
        self.events.lock().expect("lock").push(format!("warn: {message}"));
    }
}
