//! Unit tests for repository, devcontainer, location and machine selection.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use codespace_cli::application::services::selection::{
    DEFAULT_DEVCONTAINER_OPTION, DEVCONTAINER_LIST_LIMIT, MachineQuery, MachineSelection,
    SelectionRequest, resolve_dev_container, resolve_location, resolve_machine,
    resolve_repository, resolve_selection,
};
use codespace_cli::domain::{CodespaceError, MachinePolicy};

use crate::stubs::{
    RecordingReporter, ScriptedChooser, StubApi, devcontainer, dotfiles_repo, machine,
};

fn query<'a>(requested: &'a str) -> MachineQuery<'a> {
    MachineQuery {
        repo_id: 42,
        branch: "main",
        location: "WestUs2",
        requested,
    }
}

fn policy(policy: MachinePolicy, default: Option<&str>) -> MachineSelection {
    MachineSelection {
        policy,
        default: default.map(str::to_string),
    }
}

// ── Repository ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_repository_looks_up_given_name() {
    let api = StubApi::default();
    let repo = resolve_repository(&api, &ScriptedChooser::non_interactive(), "monalisa/dotfiles")
        .await
        .expect("repository");
    assert_eq!(repo, dotfiles_repo());
    assert_eq!(api.calls(), vec!["get_repository monalisa/dotfiles"]);
}

#[tokio::test]
async fn test_resolve_repository_missing_when_non_interactive_is_validation_error() {
    let api = StubApi::default();
    let err = resolve_repository(&api, &ScriptedChooser::non_interactive(), "")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodespaceError>(),
        Some(CodespaceError::Validation(_))
    ));
    assert!(api.calls().is_empty(), "no lookup expected: {:?}", api.calls());
}

#[tokio::test]
async fn test_resolve_repository_malformed_name_fails_before_lookup() {
    let api = StubApi::default();
    let err = resolve_repository(&api, &ScriptedChooser::non_interactive(), "dotfiles")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodespaceError>(),
        Some(CodespaceError::Validation(_))
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_resolve_repository_lookup_failure_is_annotated() {
    let api = StubApi {
        repository: None,
        ..StubApi::default()
    };
    let err = resolve_repository(&api, &ScriptedChooser::non_interactive(), "monalisa/nope")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").starts_with("error getting repository"), "got: {err:#}");
}

#[tokio::test]
async fn test_resolve_repository_prompts_and_offers_suggestions() {
    let api = StubApi {
        suggestions: vec![
            "monalisa/dotfiles".to_string(),
            "monalisa/dotnet".to_string(),
        ],
        ..StubApi::default()
    };
    let chooser = ScriptedChooser::answering([1]).with_input("monalisa/dot");
    resolve_repository(&api, &chooser, "").await.expect("repository");

    let prompts = chooser.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[1].1,
        vec!["monalisa/dot", "monalisa/dotfiles", "monalisa/dotnet"]
    );
    assert!(api.calls().contains(&"get_repository monalisa/dotfiles".to_string()));
}

// ── Devcontainer ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_dev_container_explicit_path_skips_listing() {
    let api = StubApi::default();
    let path = resolve_dev_container(
        &api,
        &ScriptedChooser::non_interactive(),
        42,
        "main",
        ".devcontainer/go/devcontainer.json",
    )
    .await
    .expect("path");
    assert_eq!(path, ".devcontainer/go/devcontainer.json");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_resolve_dev_container_none_found_yields_empty_path() {
    let api = StubApi::default();
    let path = resolve_dev_container(&api, &ScriptedChooser::answering([]), 42, "main", "")
        .await
        .expect("path");
    assert_eq!(path, "");
    assert_eq!(
        api.calls(),
        vec![format!("list_dev_containers main {DEVCONTAINER_LIST_LIMIT}")]
    );
}

#[tokio::test]
async fn test_resolve_dev_container_single_default_location_is_taken_without_prompt() {
    let api = StubApi {
        dev_containers: Some(vec![devcontainer(".devcontainer/devcontainer.json")]),
        ..StubApi::default()
    };
    let chooser = ScriptedChooser::answering([]);
    let path = resolve_dev_container(&api, &chooser, 42, "main", "")
        .await
        .expect("path");
    assert_eq!(path, ".devcontainer/devcontainer.json");
    assert!(chooser.prompts().is_empty());
}

#[tokio::test]
async fn test_resolve_dev_container_non_interactive_takes_first_entry() {
    let api = StubApi {
        dev_containers: Some(vec![
            devcontainer(".devcontainer/rust/devcontainer.json"),
            devcontainer(".devcontainer/go/devcontainer.json"),
        ]),
        ..StubApi::default()
    };
    let path = resolve_dev_container(&api, &ScriptedChooser::non_interactive(), 42, "main", "")
        .await
        .expect("path");
    assert_eq!(path, ".devcontainer/rust/devcontainer.json");
}

#[tokio::test]
async fn test_resolve_dev_container_offers_default_option_first() {
    let api = StubApi {
        dev_containers: Some(vec![
            devcontainer(".devcontainer/rust/devcontainer.json"),
            devcontainer(".devcontainer/go/devcontainer.json"),
        ]),
        ..StubApi::default()
    };
    let chooser = ScriptedChooser::answering([0]);
    let path = resolve_dev_container(&api, &chooser, 42, "main", "")
        .await
        .expect("path");
    assert_eq!(path, "", "default option maps to the server default");
    assert_eq!(chooser.prompts()[0].1[0], DEFAULT_DEVCONTAINER_OPTION);
    assert_eq!(chooser.prompts()[0].1.len(), 3);
}

#[tokio::test]
async fn test_resolve_dev_container_listing_failure_is_discovery_error() {
    let api = StubApi {
        dev_containers: None,
        ..StubApi::default()
    };
    let err = resolve_dev_container(&api, &ScriptedChooser::non_interactive(), 42, "main", "")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodespaceError>(),
        Some(CodespaceError::DevContainerDiscovery { .. })
    ));
    assert!(err.to_string().starts_with("error getting devcontainer.json paths"));
}

// ── Location ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_location_prefers_requested() {
    let api = StubApi::default();
    assert_eq!(resolve_location(&api, "EastUs").await, "EastUs");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_resolve_location_failed_lookup_is_not_fatal() {
    let api = StubApi {
        region: None,
        ..StubApi::default()
    };
    assert_eq!(resolve_location(&api, "").await, "");
    assert_eq!(api.calls(), vec!["region_location"]);
}

// ── Machine ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_machine_unknown_request_lists_available() {
    let api = StubApi {
        machines: Some(vec![machine("basicLinux32gb", 2), machine("GIGA", 32)]),
        ..StubApi::default()
    };
    let err = resolve_machine(
        &api,
        &ScriptedChooser::non_interactive(),
        &RecordingReporter::default(),
        &query("MEGA"),
        &MachineSelection::default(),
    )
    .await
    .unwrap_err();
    match err.downcast_ref::<CodespaceError>() {
        Some(CodespaceError::UnknownMachine { name, available }) => {
            assert_eq!(name, "MEGA");
            assert_eq!(available, &["basicLinux32gb", "GIGA"]);
        }
        other => panic!("expected UnknownMachine, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_machine_requested_and_offered_is_kept() {
    let api = StubApi::default();
    let name = resolve_machine(
        &api,
        &ScriptedChooser::non_interactive(),
        &RecordingReporter::default(),
        &query("GIGA"),
        &MachineSelection::default(),
    )
    .await
    .expect("machine");
    assert_eq!(name, "GIGA");
}

#[tokio::test]
async fn test_resolve_machine_empty_catalog_yields_empty_name() {
    let api = StubApi {
        machines: Some(Vec::new()),
        ..StubApi::default()
    };
    let name = resolve_machine(
        &api,
        &ScriptedChooser::answering([]),
        &RecordingReporter::default(),
        &query(""),
        &MachineSelection::default(),
    )
    .await
    .expect("machine");
    assert_eq!(name, "");
}

#[tokio::test]
async fn test_resolve_machine_listing_failure_is_discovery_error() {
    let api = StubApi {
        machines: None,
        ..StubApi::default()
    };
    let err = resolve_machine(
        &api,
        &ScriptedChooser::non_interactive(),
        &RecordingReporter::default(),
        &query(""),
        &MachineSelection::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().starts_with("error getting machine types"));
}

#[tokio::test]
async fn test_resolve_machine_lowest_cost_policy() {
    let api = StubApi {
        machines: Some(vec![machine("GIGA", 32), machine("small", 2), machine("mid", 8)]),
        ..StubApi::default()
    };
    let name = resolve_machine(
        &api,
        &ScriptedChooser::answering([]),
        &RecordingReporter::default(),
        &query(""),
        &policy(MachinePolicy::LowestCost, None),
    )
    .await
    .expect("machine");
    assert_eq!(name, "small");
}

#[tokio::test]
async fn test_resolve_machine_missing_default_warns_and_falls_back() {
    let api = StubApi {
        machines: Some(vec![machine("GIGA", 32), machine("small", 2)]),
        ..StubApi::default()
    };
    let reporter = RecordingReporter::default();
    let name = resolve_machine(
        &api,
        &ScriptedChooser::non_interactive(),
        &reporter,
        &query(""),
        &policy(MachinePolicy::Default, Some("retired")),
    )
    .await
    .expect("machine");
    assert_eq!(name, "small");
    assert_eq!(reporter.events().len(), 1);
    assert!(reporter.events()[0].starts_with("warn:"));
}

#[tokio::test]
async fn test_resolve_machine_interactive_prompts_with_labels() {
    let mut prebuilt = machine("GIGA", 32);
    prebuilt.prebuild_availability = "pool".to_string();
    let api = StubApi {
        machines: Some(vec![machine("small", 2), prebuilt]),
        ..StubApi::default()
    };
    let chooser = ScriptedChooser::answering([1]);
    let name = resolve_machine(
        &api,
        &chooser,
        &RecordingReporter::default(),
        &query(""),
        &policy(MachinePolicy::Interactive, None),
    )
    .await
    .expect("machine");
    assert_eq!(name, "GIGA");
    assert_eq!(
        chooser.prompts()[0].1,
        vec!["2 cores", "32 cores (Prebuild ready)"]
    );
}

// ── Full resolution ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_selection_defaults_branch_and_runs_in_order() {
    let api = StubApi::default();
    let request = SelectionRequest {
        repo: "monalisa/dotfiles".to_string(),
        ..SelectionRequest::default()
    };
    let selection = resolve_selection(
        &api,
        &ScriptedChooser::non_interactive(),
        &RecordingReporter::default(),
        &request,
        &MachineSelection::default(),
    )
    .await
    .expect("selection");

    assert_eq!(selection.branch, "main");
    assert_eq!(selection.machine, "GIGA");
    assert_eq!(selection.location, "WestUs2");
    assert_eq!(selection.dev_container_path, "");
    assert_eq!(
        api.calls(),
        vec![
            "get_repository monalisa/dotfiles".to_string(),
            format!("list_dev_containers main {DEVCONTAINER_LIST_LIMIT}"),
            "region_location".to_string(),
            "list_machines main WestUs2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_resolve_selection_devcontainer_failure_skips_region_and_machines() {
    let api = StubApi {
        dev_containers: None,
        ..StubApi::default()
    };
    let request = SelectionRequest {
        repo: "monalisa/dotfiles".to_string(),
        branch: "feature".to_string(),
        ..SelectionRequest::default()
    };
    let err = resolve_selection(
        &api,
        &ScriptedChooser::non_interactive(),
        &RecordingReporter::default(),
        &request,
        &MachineSelection::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodespaceError>(),
        Some(CodespaceError::DevContainerDiscovery { .. })
    ));
    assert_eq!(api.count("region_location"), 0);
    assert_eq!(api.count("list_machines"), 0);
}
