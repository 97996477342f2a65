//! Application service: resolve repository, branch, devcontainer, machine
//! and location for a create request.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::{Chooser, ProgressReporter, RepositoryCatalog};
use crate::domain::codespace::{DevContainerEntry, Repository, validate_repo_spec};
use crate::domain::error::CodespaceError;
use crate::domain::machine::{Machine, MachinePolicy, lowest_cost};

/// How many devcontainer definitions to ask the service for.
pub const DEVCONTAINER_LIST_LIMIT: usize = 100;

/// How many repository suggestions to offer.
pub const REPO_SUGGESTION_LIMIT: usize = 7;

/// Chooser label for "let the server pick its default devcontainer".
pub const DEFAULT_DEVCONTAINER_OPTION: &str = "Default configuration";

/// Raw user input. Empty strings mean "not provided".
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub repo: String,
    pub branch: String,
    pub dev_container_path: String,
    pub machine: String,
    pub location: String,
}

/// Machine selection policy, from configuration.
#[derive(Debug, Clone, Default)]
pub struct MachineSelection {
    pub policy: MachinePolicy,
    /// Machine name used by [`MachinePolicy::Default`].
    pub default: Option<String>,
}

/// Concrete values ready for a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub repository: Repository,
    pub branch: String,
    /// Empty means "server default".
    pub dev_container_path: String,
    /// Empty means "server default".
    pub machine: String,
    /// Empty when no location was given and the region lookup failed.
    pub location: String,
}

/// Resolves every optional input of a create request.
///
/// The region is only looked up when no location was given, and only after
/// devcontainer resolution succeeded. Region lookup never fails the flow.
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] for a malformed repository,
/// [`CodespaceError::DevContainerDiscovery`] or [`CodespaceError::Discovery`]
/// when a catalog listing fails, and [`CodespaceError::UnknownMachine`] when
/// the requested machine is not offered.
pub async fn resolve_selection(
    api: &impl RepositoryCatalog,
    chooser: &impl Chooser,
    reporter: &impl ProgressReporter,
    request: &SelectionRequest,
    machines: &MachineSelection,
) -> Result<Selection> {
    let repository = resolve_repository(api, chooser, &request.repo).await?;

    let branch = if request.branch.is_empty() {
        repository.default_branch.clone()
    } else {
        request.branch.clone()
    };

    let dev_container_path = resolve_dev_container(
        api,
        chooser,
        repository.id,
        &branch,
        &request.dev_container_path,
    )
    .await?;

    let location = resolve_location(api, &request.location).await;

    let machine = resolve_machine(
        api,
        chooser,
        reporter,
        &MachineQuery {
            repo_id: repository.id,
            branch: &branch,
            location: &location,
            requested: &request.machine,
        },
        machines,
    )
    .await?;

    Ok(Selection {
        repository,
        branch,
        dev_container_path,
        machine,
        location,
    })
}

/// Resolves `owner/name` to a repository, prompting for it when empty.
///
/// # Errors
///
/// Returns [`CodespaceError::Validation`] for malformed input or when no
/// repository was given and prompting is impossible.
pub async fn resolve_repository(
    api: &impl RepositoryCatalog,
    chooser: &impl Chooser,
    repo: &str,
) -> Result<Repository> {
    let nwo = if repo.trim().is_empty() {
        if !chooser.is_interactive() {
            return Err(CodespaceError::Validation(
                "repository is required when not running interactively".to_string(),
            )
            .into());
        }
        prompt_for_repository(api, chooser).await?
    } else {
        repo.trim().to_string()
    };

    validate_repo_spec(&nwo)?;

    api.get_repository(&nwo)
        .await
        .context("error getting repository")
}

async fn prompt_for_repository(
    api: &impl RepositoryCatalog,
    chooser: &impl Chooser,
) -> Result<String> {
    let typed = chooser.input("Repository (OWNER/REPO)")?.trim().to_string();

    // No suggestions is a valid outcome, not an error.
    let suggestions = match api.repo_suggestions(&typed, REPO_SUGGESTION_LIMIT).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "repository suggestions unavailable");
            Vec::new()
        }
    };
    if suggestions.is_empty() || suggestions.iter().any(|s| s == &typed) {
        return Ok(typed);
    }

    let mut options = Vec::with_capacity(suggestions.len() + 1);
    options.push(typed);
    options.extend(suggestions);
    let idx = chooser.choose("Repository", &options, 0)?;
    options
        .into_iter()
        .nth(idx)
        .ok_or_else(|| anyhow::anyhow!("invalid repository choice {idx}"))
}

/// Picks the devcontainer definition to create from.
///
/// Returns an empty path when the repository has no definitions, so the
/// server applies its default.
///
/// # Errors
///
/// Returns [`CodespaceError::DevContainerDiscovery`] if listing fails.
pub async fn resolve_dev_container(
    api: &impl RepositoryCatalog,
    chooser: &impl Chooser,
    repo_id: u64,
    branch: &str,
    requested: &str,
) -> Result<String> {
    if !requested.is_empty() {
        return Ok(requested.to_string());
    }

    let entries = api
        .list_dev_containers(repo_id, branch, DEVCONTAINER_LIST_LIMIT)
        .await
        .map_err(|e| CodespaceError::DevContainerDiscovery { source: e.into() })?;

    pick_dev_container(chooser, &entries)
}

fn pick_dev_container(chooser: &impl Chooser, entries: &[DevContainerEntry]) -> Result<String> {
    let Some(first) = entries.first() else {
        return Ok(String::new());
    };
    if entries.len() == 1 && first.is_default_location() {
        return Ok(first.path.clone());
    }
    if !chooser.is_interactive() {
        return Ok(first.path.clone());
    }

    // `None` is the server default.
    let mut choices: Vec<Option<&str>> = Vec::with_capacity(entries.len() + 1);
    if !first.is_default_location() {
        choices.push(None);
    }
    choices.extend(entries.iter().map(|e| Some(e.path.as_str())));

    let labels: Vec<String> = choices
        .iter()
        .map(|c| c.unwrap_or(DEFAULT_DEVCONTAINER_OPTION).to_string())
        .collect();
    let idx = chooser.choose("Devcontainer definition file", &labels, 0)?;
    let choice = choices
        .get(idx)
        .ok_or_else(|| anyhow::anyhow!("invalid devcontainer choice {idx}"))?;
    Ok(choice.map(str::to_string).unwrap_or_default())
}

/// Returns `requested` when set, else the caller's region.
///
/// Best effort: a failed lookup is logged and yields an empty location.
pub async fn resolve_location(api: &impl RepositoryCatalog, requested: &str) -> String {
    if !requested.is_empty() {
        return requested.to_string();
    }
    match api.region_location().await {
        Ok(location) => location,
        Err(e) => {
            tracing::warn!(error = %e, "region lookup failed, continuing without a location");
            String::new()
        }
    }
}

/// Inputs of a machine catalog lookup.
#[derive(Debug, Clone, Copy)]
pub struct MachineQuery<'a> {
    pub repo_id: u64,
    pub branch: &'a str,
    pub location: &'a str,
    /// Machine named by the user, or empty.
    pub requested: &'a str,
}

/// Validates the requested machine or picks one by policy.
///
/// # Errors
///
/// Returns [`CodespaceError::Discovery`] if listing fails and
/// [`CodespaceError::UnknownMachine`] if the requested machine is not offered.
pub async fn resolve_machine(
    api: &impl RepositoryCatalog,
    chooser: &impl Chooser,
    reporter: &impl ProgressReporter,
    query: &MachineQuery<'_>,
    selection: &MachineSelection,
) -> Result<String> {
    let machines = api
        .list_machines(query.repo_id, query.branch, query.location)
        .await
        .map_err(|e| CodespaceError::Discovery {
            what: "error getting machine types",
            source: e.into(),
        })?;

    if !query.requested.is_empty() {
        if machines.iter().any(|m| m.name == query.requested) {
            return Ok(query.requested.to_string());
        }
        return Err(CodespaceError::UnknownMachine {
            name: query.requested.to_string(),
            available: machines.iter().map(|m| m.name.clone()).collect(),
        }
        .into());
    }

    match machines.as_slice() {
        [] => Ok(String::new()),
        [only] => Ok(only.name.clone()),
        _ => pick_machine(chooser, reporter, &machines, selection),
    }
}

fn pick_machine(
    chooser: &impl Chooser,
    reporter: &impl ProgressReporter,
    machines: &[Machine],
    selection: &MachineSelection,
) -> Result<String> {
    let cheapest = || lowest_cost(machines).map(|m| m.name.clone()).unwrap_or_default();

    match selection.policy {
        MachinePolicy::LowestCost => Ok(cheapest()),
        MachinePolicy::Default => {
            let configured = selection.default.as_deref().unwrap_or_default();
            if let Some(m) = machines.iter().find(|m| m.name == configured) {
                return Ok(m.name.clone());
            }
            tracing::warn!(machine = configured, "configured default machine is not available");
            reporter.warn(&format!(
                "Default machine {configured:?} is not available, using the smallest machine"
            ));
            Ok(cheapest())
        }
        MachinePolicy::Interactive if chooser.is_interactive() => {
            let labels: Vec<String> = machines.iter().map(Machine::label).collect();
            let idx = chooser.choose("Choose Machine Type", &labels, 0)?;
            machines
                .get(idx)
                .map(|m| m.name.clone())
                .ok_or_else(|| anyhow::anyhow!("invalid machine choice {idx}"))
        }
        MachinePolicy::Interactive => Ok(cheapest()),
    }
}
