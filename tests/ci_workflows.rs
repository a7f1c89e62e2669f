use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nifi_ci::client::{InMemoryNifi, ROOT_GROUP_ID};
use nifi_ci::logic::*;
use nifi_ci::model::*;
use nifi_ci::{NifiError, Result};

// Resolver that knows a fixed set of refs and counts provider calls
struct FakeGitProvider {
    refs: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeGitProvider {
    fn new(refs: &[(&str, &str)]) -> Self {
        Self {
            refs: refs
                .iter()
                .map(|(r, sha)| (r.to_string(), sha.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GitRefResolver for FakeGitProvider {
    async fn fetch_commit_sha(&self, reference: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.refs
            .get(reference)
            .cloned()
            .ok_or_else(|| NifiError::not_found(format!("git ref '{}'", reference)))
    }
}

fn quick_wait() -> DrainWait {
    DrainWait {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(200),
    }
}

fn child_group(id: &str, name: &str) -> ProcessGroup {
    ProcessGroup::new(id, name, Some(ROOT_GROUP_ID.to_string()))
}

fn context(id: &str, name: &str, params: Vec<Parameter>, inherits: &[&str]) -> ParameterContext {
    let mut ctx = ParameterContext::new(id, name);
    ctx.parameters = params;
    ctx.inherited_parameter_contexts = inherits
        .iter()
        .map(|i| ParameterContextRef::new(*i, None))
        .collect();
    ctx
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// pg-1 is bound to `app`, which inherits `team` then `extra`; both of
/// those inherit `base`.
fn inherited_fixture() -> InMemoryNifi {
    let nifi = InMemoryNifi::new();
    nifi.add_parameter_context(context(
        "ctx-base",
        "base",
        vec![
            Parameter::new("db.url", "jdbc:base"),
            Parameter::new("db.password", "hunter2").sensitive(),
            Parameter::new("shared", "base"),
        ],
        &[],
    ));
    nifi.add_parameter_context(context(
        "ctx-team",
        "team",
        vec![
            Parameter::new("shared", "team"),
            Parameter::new("template", "").with_asset(AssetReference {
                id: "asset-1".to_string(),
                name: Some("template.xml".to_string()),
            }),
        ],
        &["ctx-base"],
    ));
    nifi.add_parameter_context(context(
        "ctx-extra",
        "extra",
        vec![
            Parameter::new("extra.key", "e"),
            Parameter::new("db.url", "jdbc:extra"),
        ],
        &["ctx-base"],
    ));
    nifi.add_parameter_context(context(
        "ctx-app",
        "app",
        vec![Parameter::new("app.name", "orders")],
        &["ctx-team", "ctx-extra"],
    ));
    nifi.add_process_group(child_group("pg-1", "orders"));
    nifi.bind_parameter_context("pg-1", "ctx-app");
    nifi
}

fn inherited_request(
    values: &[(&str, &str)],
    dry_run: bool,
    allow_override: bool,
) -> InheritedParamsRequest {
    InheritedParamsRequest {
        process_group_id: "pg-1".to_string(),
        parameters: params(values),
        dry_run,
        allow_override,
    }
}

#[tokio::test]
async fn test_ownership_is_first_definition_in_chain_order() {
    let nifi = inherited_fixture();
    let app = nifi.parameter_context("ctx-app").unwrap();
    let ownership = ParameterResolver::ownership_map(&nifi, &app).await.unwrap();

    assert_eq!(ownership.chain, vec!["ctx-app", "ctx-team", "ctx-base", "ctx-extra"]);
    assert_eq!(ownership.owner_of("app.name").unwrap().context_id, "ctx-app");
    assert_eq!(ownership.owner_of("shared").unwrap().context_id, "ctx-team");
    // base is reached through team before extra is visited
    assert_eq!(ownership.owner_of("db.url").unwrap().context_id, "ctx-base");
    assert_eq!(ownership.owner_of("extra.key").unwrap().context_id, "ctx-extra");
    assert!(ownership.owner_of("db.password").unwrap().sensitive);
    assert!(ownership.owner_of("template").unwrap().has_asset);
    assert!(ownership.owner_of("missing").is_none());
}

#[tokio::test]
async fn test_updates_land_in_owning_contexts() {
    let nifi = inherited_fixture();
    let result = configure_inherited_params(
        &nifi,
        &inherited_request(&[("shared", "new"), ("db.url", "jdbc:new")], false, false),
    )
    .await
    .unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(result.parameters_updated, 2);
    assert_eq!(result.contexts_modified, 2);
    assert_eq!(
        nifi.mutations(),
        vec![
            "update_parameter_context:ctx-base",
            "update_parameter_context:ctx-team"
        ]
    );

    let team = nifi.parameter_context("ctx-team").unwrap();
    assert_eq!(team.get_parameter("shared").unwrap().value.as_deref(), Some("new"));
    let base = nifi.parameter_context("ctx-base").unwrap();
    assert_eq!(base.get_parameter("db.url").unwrap().value.as_deref(), Some("jdbc:new"));
    // nothing was shadowed in the group's own context
    let app = nifi.parameter_context("ctx-app").unwrap();
    assert!(app.get_parameter("shared").is_none());
    assert!(app.get_parameter("db.url").is_none());
}

#[tokio::test]
async fn test_unknown_parameter_requires_override() {
    let nifi = inherited_fixture();
    let result = configure_inherited_params(
        &nifi,
        &inherited_request(&[("brand.new", "1"), ("shared", "x")], false, false),
    )
    .await
    .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0]
        .contains("'brand.new' is not defined in the inheritance chain of 'app'"));
    assert_eq!(result.contexts_modified, 0);
    assert!(nifi.mutations().is_empty());

    let result = configure_inherited_params(
        &nifi,
        &inherited_request(&[("brand.new", "1")], false, true),
    )
    .await
    .unwrap();
    assert!(result.errors.is_empty());
    assert!(result.plan[0].starts_with("CREATE 'brand.new' in 'app'"));
    let app = nifi.parameter_context("ctx-app").unwrap();
    assert_eq!(app.get_parameter("brand.new").unwrap().value.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_dry_run_never_mutates() {
    let nifi = inherited_fixture();
    let result = configure_inherited_params(
        &nifi,
        &inherited_request(
            &[("shared", "x"), ("db.url", "y"), ("template", "z"), ("brand.new", "1")],
            true,
            true,
        ),
    )
    .await
    .unwrap();

    assert!(result.dry_run);
    assert_eq!(result.plan.len(), 4);
    assert_eq!(result.parameters_updated, 0);
    assert!(nifi.mutations().is_empty());
}

#[tokio::test]
async fn test_plan_is_stable_across_runs() {
    let nifi = inherited_fixture();
    let request = inherited_request(&[("shared", "x"), ("extra.key", "y")], true, false);
    let first = configure_inherited_params(&nifi, &request).await.unwrap();
    let second = configure_inherited_params(&nifi, &request).await.unwrap();
    assert_eq!(first, second);

    let applied = configure_inherited_params(
        &nifi,
        &InheritedParamsRequest {
            dry_run: false,
            ..request.clone()
        },
    )
    .await
    .unwrap();
    assert_eq!(applied.plan, first.plan);

    let after = configure_inherited_params(&nifi, &request).await.unwrap();
    assert_eq!(after.plan, first.plan);
}

#[tokio::test]
async fn test_updates_to_one_context_are_coalesced() {
    let nifi = inherited_fixture();
    let result = configure_inherited_params(
        &nifi,
        &inherited_request(&[("shared", "s"), ("template", "inline")], false, false),
    )
    .await
    .unwrap();

    assert_eq!(result.parameters_updated, 2);
    assert_eq!(result.contexts_modified, 1);
    assert_eq!(nifi.mutations(), vec!["update_parameter_context:ctx-team"]);
    assert_eq!(
        result.warnings,
        vec!["'template' in 'team' references an asset; setting a value replaces the asset reference"]
    );

    let template = nifi
        .parameter_context("ctx-team")
        .unwrap()
        .get_parameter("template")
        .cloned()
        .unwrap();
    assert!(!template.has_asset());
    assert_eq!(template.value.as_deref(), Some("inline"));
}

#[tokio::test]
async fn test_sensitive_values_are_masked_in_plan() {
    let nifi = inherited_fixture();
    let result = configure_inherited_params(
        &nifi,
        &inherited_request(&[("db.password", "s3cret")], true, false),
    )
    .await
    .unwrap();
    assert_eq!(
        result.plan,
        vec!["UPDATE 'db.password' in 'base' (ctx-base) = ********"]
    );
}

#[tokio::test]
async fn test_group_without_context_is_a_configuration_error() {
    let nifi = InMemoryNifi::new();
    nifi.add_process_group(child_group("pg-bare", "bare"));
    let err = configure_inherited_params(
        &nifi,
        &InheritedParamsRequest {
            process_group_id: "pg-bare".to_string(),
            parameters: params(&[("a", "1")]),
            dry_run: false,
            allow_override: true,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
}

#[tokio::test]
async fn test_configure_params_writes_single_context() {
    let nifi = inherited_fixture();
    let result = configure_params(
        &nifi,
        &ConfigureParamsRequest {
            process_group_id: "pg-1".to_string(),
            parameters: params(&[("app.name", "billing"), ("shared", "local")]),
            parameter_context_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(result.parameter_context_id, "ctx-app");
    assert_eq!(result.parameters_updated, 1);
    assert_eq!(result.parameters_created, 1);
    let app = nifi.parameter_context("ctx-app").unwrap();
    assert_eq!(app.get_parameter("shared").unwrap().value.as_deref(), Some("local"));
}

fn registry_fixture() -> InMemoryNifi {
    let nifi = InMemoryNifi::new();
    nifi.add_registry_client(RegistryClient {
        id: "reg-1".to_string(),
        name: "github-flows".to_string(),
        client_type: GITHUB_CLIENT_TYPE.to_string(),
        properties: BTreeMap::new(),
    });
    nifi.add_bucket(
        "reg-1",
        Bucket {
            id: "b-1".to_string(),
            name: "connectors".to_string(),
        },
    );
    nifi.add_flow(
        "reg-1",
        VersionedFlow {
            id: "f-1".to_string(),
            name: "ingest-orders".to_string(),
            bucket_id: "b-1".to_string(),
        },
    );
    for (sha, ts) in [("abc1234", 1_000), ("def5678", 2_000)] {
        nifi.add_flow_version(
            "f-1",
            FlowVersion {
                version: sha.to_string(),
                author: Some("ci".to_string()),
                comments: None,
                timestamp: Some(ts),
            },
        );
    }
    nifi
}

#[tokio::test]
async fn test_deploy_then_change_version() {
    let nifi = registry_fixture();
    let git = FakeGitProvider::new(&[("release-1", "abc1234")]);

    let deployed = deploy_flow(
        &nifi,
        &git,
        &DeployFlowRequest {
            registry_client: "github-flows".to_string(),
            bucket: "conn".to_string(),
            flow: "orders".to_string(),
            version: Some("release-1".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(git.calls(), 1);
    assert_eq!(deployed.deployed_version, "abc1234");
    assert_eq!(deployed.parent_id, ROOT_GROUP_ID);
    assert_eq!(deployed.flow_id, "f-1");

    let status = get_status(&nifi, &deployed.process_group_id).await.unwrap();
    assert_eq!(status.version_state, Some(VersionState::Stale));

    let changed = change_version(&nifi, &git, &deployed.process_group_id, None)
        .await
        .unwrap();
    assert_eq!(changed.previous_version.as_deref(), Some("abc1234"));
    assert_eq!(changed.new_version.as_deref(), Some("def5678"));
    assert_eq!(changed.state, VersionState::UpToDate);
    // "latest" never needs the git provider
    assert_eq!(git.calls(), 1);

    let listed = list_flows(&nifi).await.unwrap();
    assert_eq!(listed.count, 1);
    assert_eq!(listed.flows[0].version.as_deref(), Some("def5678"));
}

#[tokio::test]
async fn test_deploy_with_sha_skips_git_provider() {
    let nifi = registry_fixture();
    let git = FakeGitProvider::new(&[]);
    let deployed = deploy_flow(
        &nifi,
        &git,
        &DeployFlowRequest {
            registry_client: "reg-1".to_string(),
            bucket: "b-1".to_string(),
            flow: "f-1".to_string(),
            version: Some("def5678".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(git.calls(), 0);
    assert_eq!(deployed.deployed_version, "def5678");
}

#[tokio::test]
async fn test_change_version_requires_version_control() {
    let nifi = InMemoryNifi::new();
    nifi.add_process_group(child_group("pg-1", "unversioned"));
    let git = FakeGitProvider::new(&[]);
    let err = change_version(&nifi, &git, "pg-1", Some("abc1234"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(nifi.mutations().is_empty());
}

#[tokio::test]
async fn test_revert_discards_local_changes() {
    let nifi = registry_fixture();
    let git = FakeGitProvider::new(&[]);
    let deployed = deploy_flow(
        &nifi,
        &git,
        &DeployFlowRequest {
            registry_client: "github-flows".to_string(),
            bucket: "connectors".to_string(),
            flow: "ingest-orders".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    nifi.set_version_state(&deployed.process_group_id, VersionState::LocallyModified);

    let reverted = revert_flow(&nifi, &deployed.process_group_id).await.unwrap();
    assert_eq!(reverted.previous_state, VersionState::LocallyModified);
    assert_eq!(reverted.state, VersionState::UpToDate);
    assert_eq!(reverted.version.as_deref(), Some("def5678"));
}

#[tokio::test]
async fn test_stop_then_status_reports_stopped() {
    let nifi = InMemoryNifi::new();
    let mut group = child_group("pg-1", "orders");
    group.running_count = 3;
    nifi.add_process_group(group);
    nifi.set_active_threads("pg-1", 2);

    assert_eq!(get_status(&nifi, "pg-1").await.unwrap().state, "RUNNING");

    let stopped = stop_flow(&nifi, "pg-1", true, quick_wait()).await.unwrap();
    assert!(stopped.stopped);
    assert!(stopped.controllers_disabled);
    assert_eq!(stopped.active_threads, 0);

    let status = get_status(&nifi, "pg-1").await.unwrap();
    assert_eq!(status.state, "STOPPED");
    assert_eq!(status.stopped_processors, 3);
    assert_eq!(
        nifi.controller_services_state("pg-1"),
        Some(ControllerServiceState::Disabled)
    );
}

#[tokio::test]
async fn test_lingering_threads_report_stopping() {
    let nifi = InMemoryNifi::new();
    let mut group = child_group("pg-1", "orders");
    group.stopped_count = 2;
    nifi.add_process_group(group);
    nifi.set_active_threads("pg-1", 1);
    assert_eq!(get_status(&nifi, "pg-1").await.unwrap().state, "STOPPING");

    let started = start_flow(&nifi, "pg-1", true).await.unwrap();
    assert!(started.started);
    assert_eq!(get_status(&nifi, "pg-1").await.unwrap().state, "RUNNING");
    assert_eq!(
        nifi.mutations(),
        vec!["controllers_ENABLED:pg-1", "schedule_RUNNING:pg-1"]
    );
}

fn queued(id: &str, group_id: &str, count: u64) -> Connection {
    Connection {
        id: id.to_string(),
        name: None,
        group_id: group_id.to_string(),
        queued_count: count,
        queued_bytes: count * 100,
    }
}

#[tokio::test]
async fn test_purge_reaches_nested_groups() {
    let nifi = InMemoryNifi::new();
    nifi.add_process_group(child_group("pg-1", "outer"));
    nifi.add_process_group(ProcessGroup::new("pg-2", "inner", Some("pg-1".to_string())));
    nifi.add_connection(queued("c-1", "pg-1", 4));
    nifi.add_connection(queued("c-2", "pg-2", 6));
    nifi.add_connection(queued("c-3", "pg-2", 0));

    let result = purge_flowfiles(&nifi, "pg-1", true, quick_wait()).await.unwrap();
    assert!(result.stopped);
    assert_eq!(result.connections_purged, 2);
    assert_eq!(result.flowfiles_purged, 10);
    assert_eq!(result.bytes_purged, 1_000);
    assert_eq!(result.flowfiles_remaining, 0);
    assert!(!nifi.mutations().contains(&"drop_queue:c-3".to_string()));
}

#[tokio::test]
async fn test_cleanup_of_missing_group_is_soft() {
    let nifi = InMemoryNifi::new();
    let result = cleanup(
        &nifi,
        "gone",
        &CleanupOptions {
            delete_process_group: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap();
    assert!(!result.deleted);
    assert!(result.error.unwrap().contains("gone"));
    assert!(nifi.mutations().is_empty());
}

fn cleanup_fixture() -> InMemoryNifi {
    let nifi = InMemoryNifi::new();
    let mut group = child_group("pg-1", "orders");
    group.running_count = 2;
    nifi.add_process_group(group);
    nifi.add_connection(queued("c-1", "pg-1", 5));
    nifi.add_parameter_context(ParameterContext::new("ctx-1", "orders-params"));
    nifi.bind_parameter_context("pg-1", "ctx-1");
    nifi
}

#[tokio::test]
async fn test_cleanup_deletes_group_and_context() {
    let nifi = cleanup_fixture();
    enable_controllers(&nifi).await;

    let result = cleanup(
        &nifi,
        "pg-1",
        &CleanupOptions {
            delete_process_group: true,
            force: true,
            delete_parameter_context: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap();

    assert!(result.stopped);
    assert!(result.controllers_disabled);
    assert_eq!(result.flowfiles_purged, 5);
    assert!(result.deleted);
    assert!(result.parameter_context_deleted);
    assert!(result.warnings.is_empty());
    assert!(nifi.process_group("pg-1").is_none());
    assert!(nifi.parameter_context("ctx-1").is_none());
}

async fn enable_controllers(nifi: &InMemoryNifi) {
    use nifi_ci::client::ProcessGroupApi;
    nifi.set_controller_services_state("pg-1", ControllerServiceState::Enabled)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cleanup_without_force_refuses_queued_data() {
    let nifi = cleanup_fixture();
    let err = cleanup(
        &nifi,
        "pg-1",
        &CleanupOptions {
            delete_process_group: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "ApiError");
    assert!(nifi.process_group("pg-1").is_some());
}

#[tokio::test]
async fn test_context_failure_is_reported_not_raised() {
    let nifi = cleanup_fixture();
    // stop only; the context stays bound so its deletion must fail
    let result = cleanup(
        &nifi,
        "pg-1",
        &CleanupOptions {
            delete_parameter_context: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap();
    assert!(result.stopped);
    assert!(!result.deleted);
    assert!(!result.parameter_context_deleted);
    assert_eq!(result.warnings.len(), 1);
    assert!(nifi.parameter_context("ctx-1").is_some());
}

#[tokio::test]
async fn test_orphan_sweep_follows_inheritance() {
    let nifi = cleanup_fixture();
    nifi.add_parameter_context(context("ctx-child", "child", vec![], &["ctx-parent"]));
    nifi.add_parameter_context(context("ctx-parent", "parent", vec![], &[]));

    let result = cleanup(
        &nifi,
        "pg-1",
        &CleanupOptions {
            delete_process_group: true,
            force: true,
            delete_orphaned_contexts: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap();

    let mut deleted = result.orphaned_contexts_deleted.clone();
    deleted.sort();
    // ctx-1 lost its only binding with the group
    assert_eq!(deleted, vec!["child", "orders-params", "parent"]);
}

// Delegates to the in-memory server but cannot list parameter contexts
struct ContextListingDown(InMemoryNifi);

mod context_listing_down {
    use std::collections::BTreeMap;

    use nifi_ci::client::{
        DeployRequest, ParameterContextApi, ProcessGroupApi, QueueApi, RegistryApi,
        VersioningApi,
    };
    use nifi_ci::model::*;
    use nifi_ci::{NifiError, Result};

    use super::ContextListingDown;

    #[async_trait::async_trait]
    impl ProcessGroupApi for ContextListingDown {
        async fn get_root_process_group_id(&self) -> Result<Id> {
            self.0.get_root_process_group_id().await
        }
        async fn get_process_group(&self, id: &str) -> Result<Option<ProcessGroup>> {
            self.0.get_process_group(id).await
        }
        async fn list_child_process_groups(&self, parent_id: &str) -> Result<Vec<ProcessGroup>> {
            self.0.list_child_process_groups(parent_id).await
        }
        async fn get_process_group_status(&self, id: &str) -> Result<ProcessGroupStatus> {
            self.0.get_process_group_status(id).await
        }
        async fn schedule_process_group(&self, id: &str, state: ScheduledState) -> Result<()> {
            self.0.schedule_process_group(id, state).await
        }
        async fn set_controller_services_state(
            &self,
            id: &str,
            state: ControllerServiceState,
        ) -> Result<()> {
            self.0.set_controller_services_state(id, state).await
        }
        async fn delete_process_group(&self, group: &ProcessGroup) -> Result<()> {
            self.0.delete_process_group(group).await
        }
    }

    #[async_trait::async_trait]
    impl ParameterContextApi for ContextListingDown {
        async fn get_parameter_context(&self, id: &str) -> Result<Option<ParameterContext>> {
            self.0.get_parameter_context(id).await
        }
        async fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>> {
            Err(NifiError::Api {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
        async fn update_parameter_context(
            &self,
            context: &ParameterContext,
            parameters: Vec<Parameter>,
        ) -> Result<ParameterContext> {
            self.0.update_parameter_context(context, parameters).await
        }
        async fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()> {
            self.0.delete_parameter_context(context).await
        }
        async fn upload_asset(
            &self,
            context_id: &str,
            file_name: &str,
            content: Vec<u8>,
        ) -> Result<Asset> {
            self.0.upload_asset(context_id, file_name, content).await
        }
    }

    #[async_trait::async_trait]
    impl VersioningApi for ContextListingDown {
        async fn update_flow_version(
            &self,
            group: &ProcessGroup,
            version: &str,
        ) -> Result<VersionControlInformation> {
            self.0.update_flow_version(group, version).await
        }
        async fn revert_local_changes(
            &self,
            group: &ProcessGroup,
        ) -> Result<VersionControlInformation> {
            self.0.revert_local_changes(group).await
        }
    }

    #[async_trait::async_trait]
    impl RegistryApi for ContextListingDown {
        async fn list_registry_clients(&self) -> Result<Vec<RegistryClient>> {
            self.0.list_registry_clients().await
        }
        async fn create_registry_client(
            &self,
            name: &str,
            client_type: &str,
            properties: BTreeMap<String, String>,
        ) -> Result<RegistryClient> {
            self.0.create_registry_client(name, client_type, properties).await
        }
        async fn list_buckets(&self, registry_id: &str) -> Result<Vec<Bucket>> {
            self.0.list_buckets(registry_id).await
        }
        async fn list_flows(
            &self,
            registry_id: &str,
            bucket_id: &str,
        ) -> Result<Vec<VersionedFlow>> {
            self.0.list_flows(registry_id, bucket_id).await
        }
        async fn list_flow_versions(
            &self,
            registry_id: &str,
            bucket_id: &str,
            flow_id: &str,
        ) -> Result<Vec<FlowVersion>> {
            self.0.list_flow_versions(registry_id, bucket_id, flow_id).await
        }
        async fn deploy_flow(
            &self,
            parent_id: &str,
            request: &DeployRequest,
        ) -> Result<ProcessGroup> {
            self.0.deploy_flow(parent_id, request).await
        }
    }

    #[async_trait::async_trait]
    impl QueueApi for ContextListingDown {
        async fn list_connections(&self, group_id: &str) -> Result<Vec<Connection>> {
            self.0.list_connections(group_id).await
        }
        async fn drop_queue(&self, connection_id: &str) -> Result<DropResult> {
            self.0.drop_queue(connection_id).await
        }
    }
}

#[tokio::test]
async fn test_failed_orphan_sweep_keeps_cleanup_report() {
    let nifi = ContextListingDown(cleanup_fixture());

    let result = cleanup(
        &nifi,
        "pg-1",
        &CleanupOptions {
            delete_process_group: true,
            force: true,
            delete_parameter_context: true,
            delete_orphaned_contexts: true,
            ..Default::default()
        },
        quick_wait(),
    )
    .await
    .unwrap();

    assert!(result.deleted);
    assert!(result.parameter_context_deleted);
    assert!(result.orphaned_contexts_deleted.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("unavailable"));
    assert!(nifi.0.process_group("pg-1").is_none());
    assert!(nifi.0.parameter_context("ctx-1").is_none());
}

#[tokio::test]
async fn test_upload_asset_binds_parameter() {
    let nifi = inherited_fixture();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("greeting.txt");
    std::fs::write(&file, b"hello").unwrap();

    let result = upload_asset(
        &nifi,
        &UploadAssetRequest {
            parameter_context_id: None,
            process_group_id: Some("pg-1".to_string()),
            file_path: file,
            asset_name: None,
            parameter_name: Some("greeting".to_string()),
        },
    )
    .await
    .unwrap();

    assert_eq!(result.parameter_context_id, "ctx-app");
    assert_eq!(result.asset_name, "greeting.txt");
    assert_eq!(
        result.asset_digest,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert!(result.parameter_updated);

    let greeting = nifi
        .parameter_context("ctx-app")
        .unwrap()
        .get_parameter("greeting")
        .cloned()
        .unwrap();
    assert!(greeting.has_asset());
    assert_eq!(greeting.referenced_assets[0].id, result.asset_id);
}

#[tokio::test]
async fn test_upload_missing_file_is_input_error() {
    let nifi = inherited_fixture();
    let err = upload_asset(
        &nifi,
        &UploadAssetRequest {
            parameter_context_id: Some("ctx-app".to_string()),
            process_group_id: None,
            file_path: "/nonexistent/file.bin".into(),
            asset_name: None,
            parameter_name: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "InputError");
    assert!(nifi.mutations().is_empty());
}

#[tokio::test]
async fn test_ensure_registry_is_idempotent() {
    let nifi = InMemoryNifi::new();
    let request = EnsureRegistryRequest {
        name: "github-flows".to_string(),
        provider: nifi_ci::GitProvider::Github,
        repository: Some("acme/flows".to_string()),
        token: Some("ghp_x".to_string()),
        api_url: "https://api.github.com".to_string(),
        default_branch: "main".to_string(),
        repository_path: Some("flows".to_string()),
    };

    let first = ensure_registry(&nifi, &request).await.unwrap();
    assert!(first.created);
    let second = ensure_registry(&nifi, &request).await.unwrap();
    assert!(!second.created);
    assert_eq!(first.registry_client_id, second.registry_client_id);
    assert_eq!(nifi.mutations().len(), 1);
}

#[tokio::test]
async fn test_registry_listings() {
    let nifi = registry_fixture();
    let flows = list_registry_flows(&nifi, "github", "connectors", false)
        .await
        .unwrap();
    assert_eq!(flows.count, 1);
    assert_eq!(flows.flows[0].name, "ingest-orders");

    let versions = get_flow_versions(&nifi, "reg-1", "b-1", "ingest", false)
        .await
        .unwrap();
    assert_eq!(versions.count, 2);
    assert_eq!(versions.latest.as_deref(), Some("def5678"));
}
