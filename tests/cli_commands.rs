use nifi_ci::cli::commands::execute;
use nifi_ci::cli::output::{self, OutputFormat};
use nifi_ci::cli::{Cli, Commands};
use nifi_ci::client::{InMemoryNifi, ROOT_GROUP_ID};
use nifi_ci::logic::GitRefResolver;
use nifi_ci::model::*;
use nifi_ci::{AppConfig, NifiError, Result};

use clap::Parser;

struct NoGit;

#[async_trait::async_trait]
impl GitRefResolver for NoGit {
    async fn fetch_commit_sha(&self, reference: &str) -> Result<String> {
        Err(NifiError::input(format!("no provider for '{}'", reference)))
    }
}

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["nifi-ci"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

fn stopped_group() -> InMemoryNifi {
    let nifi = InMemoryNifi::new();
    let mut group = ProcessGroup::new("pg-1", "orders", Some(ROOT_GROUP_ID.to_string()));
    group.stopped_count = 4;
    nifi.add_process_group(group);
    nifi
}

#[tokio::test]
async fn test_status_is_flattened_to_strings() {
    let nifi = stopped_group();
    let command = parse(&["get_status", "--process-group-id", "pg-1"]);
    let value = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap();

    let map = output::success_payload(&value);
    assert_eq!(map["success"], "true");
    assert_eq!(map["state"], "STOPPED");
    assert_eq!(map["stopped_processors"], "4");
    assert_eq!(map["versioned"], "false");
    assert_eq!(map["version"], "");

    let dotenv = output::render(OutputFormat::Dotenv, &map);
    assert!(dotenv.lines().any(|l| l == "STATE=STOPPED"));
    let github = output::render(OutputFormat::Github, &map);
    assert!(github.lines().any(|l| l == "process_group_id=pg-1"));
}

#[tokio::test]
async fn test_failed_command_renders_error_payload() {
    let nifi = InMemoryNifi::new();
    let command = parse(&["start_flow", "--process-group-id", "missing"]);
    let err = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap_err();

    let map = output::error_payload(command.name(), &err, &[]);
    assert_eq!(map["success"], "false");
    assert_eq!(map["error_type"], "NotFoundError");
    assert_eq!(map["command"], "start_flow");
    assert!(!map.contains_key("logs"));

    let json: serde_json::Value =
        serde_json::from_str(&output::render(OutputFormat::Json, &map)).unwrap();
    assert_eq!(json["success"], "false");
}

#[tokio::test]
async fn test_malformed_parameters_fail_before_any_call() {
    let nifi = stopped_group();
    let command = parse(&[
        "configure_inherited_params",
        "--process-group-id",
        "pg-1",
        "--parameters",
        "[1, 2]",
    ]);
    let err = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InputError");
    assert!(nifi.mutations().is_empty());
}

#[tokio::test]
async fn test_unresolved_parameters_mark_failure() {
    let nifi = stopped_group();
    nifi.add_parameter_context(ParameterContext::new("ctx-1", "orders"));
    nifi.bind_parameter_context("pg-1", "ctx-1");

    let command = parse(&[
        "configure_inherited_params",
        "--process-group-id",
        "pg-1",
        "--parameters",
        r#"{"missing": "1"}"#,
    ]);
    let value = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap();
    let map = output::success_payload(&value);
    assert_eq!(map["success"], "false");
    assert!(map["errors"].contains("missing"));
}

#[tokio::test]
async fn test_resolve_git_ref_passes_shas_through() {
    let nifi = InMemoryNifi::new();
    let command = parse(&["resolve_git_ref", "--git-ref", "0a1b2c3d"]);
    let value = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap();
    assert_eq!(value["sha"], "0a1b2c3d");

    let command = parse(&["resolve_git_ref", "--git-ref", "main"]);
    let err = execute(&command, &nifi, &NoGit, &AppConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InputError");
}
