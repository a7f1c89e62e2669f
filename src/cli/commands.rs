use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Commands};
use crate::client::rest::RestClient;
use crate::client::traits::NifiApi;
use crate::config::{AppConfig, GitConfig};
use crate::error::Result;
use crate::logic::{
    self, CleanupOptions, ConfigureParamsRequest, DeployFlowRequest, DrainWait,
    EnsureRegistryRequest, GitProviderClient, GitRefResolver, InheritedParamsRequest,
    UploadAssetRequest,
};
use crate::model::Position;

fn to_value<T: Serialize>(result: T) -> Result<Value> {
    Ok(serde_json::to_value(result)?)
}

/// Load configuration, connect where needed and run the selected command.
pub async fn run(cli: &Cli) -> Result<Value> {
    let config = AppConfig::load(cli.profile.as_deref())?;
    let git = GitProviderClient::new(&config.git)?;
    // the only command that never talks to NiFi
    if let Commands::ResolveGitRef(args) = &cli.command {
        return resolve_git_ref(&git, &args.git_ref).await;
    }
    let api = RestClient::connect(&config.nifi).await?;
    execute(&cli.command, &api, &git, &config).await
}

async fn resolve_git_ref<R: GitRefResolver + ?Sized>(git: &R, reference: &str) -> Result<Value> {
    let sha = logic::resolve_git_ref(git, reference).await?;
    Ok(serde_json::json!({ "git_ref": reference, "sha": sha }))
}

/// Command table: one arm per subcommand, each a thin mapping from
/// arguments to a workflow call.
pub async fn execute<S, R>(
    command: &Commands,
    api: &S,
    git: &R,
    config: &AppConfig,
) -> Result<Value>
where
    S: NifiApi + ?Sized,
    R: GitRefResolver + ?Sized,
{
    let wait = DrainWait::from(&config.nifi);
    log::debug!("Running {}", command.name());

    match command {
        Commands::EnsureRegistry(args) => {
            let provider = args.provider.unwrap_or(config.git.provider);
            let git_config = GitConfig {
                provider,
                api_url: args.api_url.clone().or_else(|| config.git.api_url.clone()),
                ..config.git.clone()
            };
            let request = EnsureRegistryRequest {
                name: args.name.clone(),
                provider,
                repository: args.repository.clone().or_else(|| config.git.repo.clone()),
                token: config.git.token.clone(),
                api_url: git_config.effective_api_url(),
                default_branch: args.default_branch.clone(),
                repository_path: args.repository_path.clone(),
            };
            to_value(logic::ensure_registry(api, &request).await?)
        }
        Commands::DeployFlow(args) => {
            let request = DeployFlowRequest {
                registry_client: args.registry_client.clone(),
                bucket: args.bucket.clone(),
                flow: args.flow.clone(),
                version: args.flow_version.clone(),
                parent_id: args.parent_id.clone(),
                position: Position { x: args.x, y: args.y },
                greedy: args.greedy,
            };
            to_value(logic::deploy_flow(api, git, &request).await?)
        }
        Commands::StartFlow(args) => to_value(
            logic::start_flow(api, &args.group.process_group_id, args.enable_controllers).await?,
        ),
        Commands::StopFlow(args) => to_value(
            logic::stop_flow(
                api,
                &args.group.process_group_id,
                args.disable_controllers,
                wait,
            )
            .await?,
        ),
        Commands::GetStatus(args) => {
            to_value(logic::get_status(api, &args.process_group_id).await?)
        }
        Commands::ConfigureParams(args) => {
            let request = ConfigureParamsRequest {
                process_group_id: args.group.process_group_id.clone(),
                parameters: logic::parse_parameter_map(&args.parameters)?,
                parameter_context_id: args.parameter_context_id.clone(),
            };
            to_value(logic::configure_params(api, &request).await?)
        }
        Commands::ConfigureInheritedParams(args) => {
            let request = InheritedParamsRequest {
                process_group_id: args.group.process_group_id.clone(),
                parameters: logic::parse_parameter_map(&args.parameters)?,
                dry_run: args.dry_run,
                allow_override: args.allow_override,
            };
            let result = logic::configure_inherited_params(api, &request).await?;
            let success = result.errors.is_empty();
            let mut value = to_value(result)?;
            if let Value::Object(map) = &mut value {
                map.insert("success".to_string(), Value::from(success.to_string()));
            }
            Ok(value)
        }
        Commands::ChangeVersion(args) => to_value(
            logic::change_version(
                api,
                git,
                &args.group.process_group_id,
                args.target_version.as_deref(),
            )
            .await?,
        ),
        Commands::RevertFlow(args) => {
            to_value(logic::revert_flow(api, &args.process_group_id).await?)
        }
        Commands::Cleanup(args) => {
            let options = CleanupOptions {
                delete_process_group: args.delete_pg,
                force: args.force,
                delete_parameter_context: args.delete_parameter_context,
                disable_controllers: args.disable_controllers,
                delete_orphaned_contexts: args.delete_orphaned_contexts,
            };
            to_value(logic::cleanup(api, &args.group.process_group_id, &options, wait).await?)
        }
        Commands::PurgeFlowfiles(args) => to_value(
            logic::purge_flowfiles(api, &args.group.process_group_id, args.stop, wait).await?,
        ),
        Commands::UploadAsset(args) => {
            let request = UploadAssetRequest {
                parameter_context_id: args.parameter_context_id.clone(),
                process_group_id: args.process_group_id.clone(),
                file_path: args.file_path.clone(),
                asset_name: args.asset_name.clone(),
                parameter_name: args.parameter_name.clone(),
            };
            to_value(logic::upload_asset(api, &request).await?)
        }
        Commands::ListFlows => to_value(logic::list_flows(api).await?),
        Commands::ListRegistryFlows(args) => to_value(
            logic::list_registry_flows(api, &args.registry_client, &args.bucket, args.greedy)
                .await?,
        ),
        Commands::GetFlowVersions(args) => to_value(
            logic::get_flow_versions(
                api,
                &args.registry.registry_client,
                &args.registry.bucket,
                &args.flow,
                args.registry.greedy,
            )
            .await?,
        ),
        Commands::ResolveGitRef(args) => resolve_git_ref(git, &args.git_ref).await,
    }
}
