pub mod commands;
pub mod logging;
pub mod output;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::GitProvider;
use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "nifi-ci",
    version,
    about = "Automate Apache NiFi flow deployment from CI pipelines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Profile section of the profiles file to load
    #[arg(long, global = true, env = "NIFI_PROFILE")]
    pub profile: Option<String>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format; detected from the CI environment when omitted
    #[arg(long, value_enum, global = true, env = "NIFI_OUTPUT_FORMAT")]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
pub enum Commands {
    /// Create a git-backed registry client unless one with the name exists
    EnsureRegistry(EnsureRegistryArgs),
    /// Deploy a flow from a registry onto the canvas
    DeployFlow(DeployFlowArgs),
    /// Enable controller services and start all processors
    StartFlow(StartFlowArgs),
    /// Stop all processors and optionally disable controller services
    StopFlow(StopFlowArgs),
    /// Report running state, queues and version information
    GetStatus(GroupArgs),
    /// Set parameters in a single parameter context
    ConfigureParams(ConfigureParamsArgs),
    /// Set parameters in the context of the inheritance chain that owns them
    ConfigureInheritedParams(ConfigureInheritedParamsArgs),
    /// Move a versioned process group to another version
    ChangeVersion(ChangeVersionArgs),
    /// Discard local changes of a versioned process group
    RevertFlow(GroupArgs),
    /// Stop and tear down a process group
    Cleanup(CleanupArgs),
    /// Drop all queued flowfiles
    PurgeFlowfiles(PurgeArgs),
    /// Upload a file as a parameter context asset
    UploadAsset(UploadAssetArgs),
    /// List process groups on the root canvas
    ListFlows,
    /// List the flows in a registry bucket
    ListRegistryFlows(RegistryFlowsArgs),
    /// List the versions of a registry flow
    GetFlowVersions(FlowVersionsArgs),
    /// Resolve a branch or tag to a commit SHA
    ResolveGitRef(ResolveGitRefArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::EnsureRegistry(_) => "ensure_registry",
            Commands::DeployFlow(_) => "deploy_flow",
            Commands::StartFlow(_) => "start_flow",
            Commands::StopFlow(_) => "stop_flow",
            Commands::GetStatus(_) => "get_status",
            Commands::ConfigureParams(_) => "configure_params",
            Commands::ConfigureInheritedParams(_) => "configure_inherited_params",
            Commands::ChangeVersion(_) => "change_version",
            Commands::RevertFlow(_) => "revert_flow",
            Commands::Cleanup(_) => "cleanup",
            Commands::PurgeFlowfiles(_) => "purge_flowfiles",
            Commands::UploadAsset(_) => "upload_asset",
            Commands::ListFlows => "list_flows",
            Commands::ListRegistryFlows(_) => "list_registry_flows",
            Commands::GetFlowVersions(_) => "get_flow_versions",
            Commands::ResolveGitRef(_) => "resolve_git_ref",
        }
    }
}

fn parse_provider(value: &str) -> Result<GitProvider, String> {
    match value.to_lowercase().as_str() {
        "github" => Ok(GitProvider::Github),
        "gitlab" => Ok(GitProvider::Gitlab),
        other => Err(format!("unknown git provider '{}' (github or gitlab)", other)),
    }
}

#[derive(Args, Debug, Clone)]
pub struct GroupArgs {
    /// Process group id
    #[arg(long, env = "NIFI_PROCESS_GROUP_ID")]
    pub process_group_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct EnsureRegistryArgs {
    /// Registry client name
    #[arg(long, env = "NIFI_REGISTRY_CLIENT_NAME", default_value = "nifi-ci")]
    pub name: String,

    /// Git provider; defaults to the configured one
    #[arg(long, env = "NIFI_GIT_PROVIDER", value_parser = parse_provider)]
    pub provider: Option<GitProvider>,

    /// Repository (`owner/name`); defaults to GH_REPO / GL_REPO
    #[arg(long, env = "NIFI_REGISTRY_REPOSITORY")]
    pub repository: Option<String>,

    #[arg(long, env = "NIFI_REGISTRY_BRANCH", default_value = "main")]
    pub default_branch: String,

    /// Directory inside the repository holding flows
    #[arg(long, env = "NIFI_REGISTRY_PATH")]
    pub repository_path: Option<String>,

    /// Provider API URL; defaults to the public GitHub / GitLab API
    #[arg(long, env = "NIFI_GIT_API_URL")]
    pub api_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeployFlowArgs {
    /// Registry client id or name
    #[arg(long, env = "NIFI_REGISTRY_CLIENT")]
    pub registry_client: String,

    /// Bucket id or name (the branch-level folder for git registries)
    #[arg(long, env = "NIFI_BUCKET")]
    pub bucket: String,

    /// Flow id or name
    #[arg(long, env = "NIFI_FLOW")]
    pub flow: String,

    /// Branch, tag or commit SHA; newest version when omitted
    #[arg(long, env = "NIFI_FLOW_VERSION")]
    pub flow_version: Option<String>,

    /// Parent process group; the root canvas when omitted
    #[arg(long, env = "NIFI_PARENT_ID")]
    pub parent_id: Option<String>,

    #[arg(long, env = "NIFI_POSITION_X", default_value_t = 0.0)]
    pub x: f64,

    #[arg(long, env = "NIFI_POSITION_Y", default_value_t = 0.0)]
    pub y: f64,

    /// Take the first fuzzy match instead of failing on ambiguity
    #[arg(long, env = "NIFI_GREEDY", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub greedy: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StartFlowArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    #[arg(long, env = "NIFI_ENABLE_CONTROLLERS", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = true, default_missing_value = "true")]
    pub enable_controllers: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StopFlowArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    #[arg(long, env = "NIFI_DISABLE_CONTROLLERS", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub disable_controllers: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigureParamsArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// JSON object of parameter name to value
    #[arg(long, env = "NIFI_PARAMETERS")]
    pub parameters: String,

    /// Write to this context instead of the group's own
    #[arg(long, env = "NIFI_PARAMETER_CONTEXT_ID")]
    pub parameter_context_id: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigureInheritedParamsArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// JSON object of parameter name to value
    #[arg(long, env = "NIFI_PARAMETERS")]
    pub parameters: String,

    /// Report the plan without changing anything
    #[arg(long, env = "NIFI_DRY_RUN", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub dry_run: bool,

    /// Create parameters missing from the chain in the group's own context
    #[arg(long, env = "NIFI_ALLOW_OVERRIDE", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub allow_override: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ChangeVersionArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// Branch, tag or commit SHA; newest version when omitted
    #[arg(long, env = "NIFI_TARGET_VERSION")]
    pub target_version: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    #[arg(long, env = "NIFI_DELETE_PG", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub delete_pg: bool,

    /// Drop queued flowfiles so deletion can proceed
    #[arg(long, env = "NIFI_FORCE_DELETE", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub force: bool,

    #[arg(long, env = "NIFI_DELETE_PARAMETER_CONTEXT", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub delete_parameter_context: bool,

    #[arg(long, env = "NIFI_DISABLE_CONTROLLERS", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = true, default_missing_value = "true")]
    pub disable_controllers: bool,

    #[arg(long, env = "NIFI_DELETE_ORPHANED_CONTEXTS", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub delete_orphaned_contexts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// Stop the group first
    #[arg(long, env = "NIFI_STOP_BEFORE_PURGE", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = true, default_missing_value = "true")]
    pub stop: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UploadAssetArgs {
    /// File to upload
    #[arg(long, env = "NIFI_ASSET_FILE")]
    pub file_path: PathBuf,

    #[arg(long, env = "NIFI_PARAMETER_CONTEXT_ID")]
    pub parameter_context_id: Option<String>,

    /// Use this group's parameter context when no context id is given
    #[arg(long, env = "NIFI_PROCESS_GROUP_ID")]
    pub process_group_id: Option<String>,

    /// Asset name; the file name when omitted
    #[arg(long, env = "NIFI_ASSET_NAME")]
    pub asset_name: Option<String>,

    /// Parameter to bind to the uploaded asset
    #[arg(long, env = "NIFI_ASSET_PARAMETER")]
    pub parameter_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegistryFlowsArgs {
    #[arg(long, env = "NIFI_REGISTRY_CLIENT")]
    pub registry_client: String,

    #[arg(long, env = "NIFI_BUCKET")]
    pub bucket: String,

    #[arg(long, env = "NIFI_GREEDY", action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub greedy: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FlowVersionsArgs {
    #[command(flatten)]
    pub registry: RegistryFlowsArgs,

    #[arg(long, env = "NIFI_FLOW")]
    pub flow: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveGitRefArgs {
    /// Branch, tag or SHA to resolve
    #[arg(long, env = "NIFI_GIT_REF")]
    pub git_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_table_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_snake_case_subcommands() {
        let cli = Cli::try_parse_from([
            "nifi-ci",
            "-vv",
            "configure_inherited_params",
            "--process-group-id",
            "pg-1",
            "--parameters",
            r#"{"a":"1"}"#,
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command.name(), "configure_inherited_params");
        match cli.command {
            Commands::ConfigureInheritedParams(args) => {
                assert!(args.dry_run);
                assert!(!args.allow_override);
                assert_eq!(args.group.process_group_id, "pg-1");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn boolean_options_accept_explicit_values() {
        let cli = Cli::try_parse_from([
            "nifi-ci",
            "cleanup",
            "--process-group-id",
            "pg-1",
            "--disable-controllers",
            "false",
            "--delete-pg",
        ])
        .unwrap();
        match cli.command {
            Commands::Cleanup(args) => {
                assert!(!args.disable_controllers);
                assert!(args.delete_pg);
                assert!(!args.force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
