use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::traits::{DeployRequest, NifiApi};
use crate::config::GitProvider;
use crate::error::{NifiError, Result};
use crate::logic::git_ref::GitRefResolver;
use crate::logic::versioning::target_version;
use crate::model::{Bucket, FlowVersion, Id, Position, RegistryClient, VersionedFlow};

pub const GITHUB_CLIENT_TYPE: &str = "org.apache.nifi.github.GitHubFlowRegistryClient";
pub const GITLAB_CLIENT_TYPE: &str = "org.apache.nifi.gitlab.GitLabFlowRegistryClient";

/// Pick one item by exact id, then exact name, then case-insensitive name
/// substring. Several substring matches are an error unless `greedy`, in
/// which case the first one wins.
pub fn select_by_identifier<'a, T>(
    items: &'a [T],
    identifier: &str,
    kind: &str,
    greedy: bool,
    id_of: impl Fn(&T) -> &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T> {
    if let Some(item) = items.iter().find(|i| id_of(i) == identifier) {
        return Ok(item);
    }
    if let Some(item) = items.iter().find(|i| name_of(i) == identifier) {
        return Ok(item);
    }

    let needle = identifier.to_lowercase();
    let matches: Vec<&T> = items
        .iter()
        .filter(|i| name_of(i).to_lowercase().contains(&needle))
        .collect();
    match matches.as_slice() {
        [] => Err(NifiError::not_found(format!("{} '{}'", kind, identifier))),
        [only] => Ok(*only),
        [first, ..] if greedy => {
            log::warn!(
                "{} {} match '{}', using '{}'",
                matches.len(),
                kind,
                identifier,
                name_of(first)
            );
            Ok(*first)
        }
        _ => Err(NifiError::input(format!(
            "'{}' matches several {}s: {}",
            identifier,
            kind,
            matches.iter().map(|m| name_of(m)).collect::<Vec<_>>().join(", ")
        ))),
    }
}

async fn find_registry_client<S: NifiApi + ?Sized>(
    api: &S,
    identifier: &str,
    greedy: bool,
) -> Result<RegistryClient> {
    let clients = api.list_registry_clients().await?;
    select_by_identifier(&clients, identifier, "registry client", greedy, |c| &c.id, |c| &c.name)
        .cloned()
}

async fn find_bucket<S: NifiApi + ?Sized>(
    api: &S,
    registry_id: &str,
    identifier: &str,
    greedy: bool,
) -> Result<Bucket> {
    let buckets = api.list_buckets(registry_id).await?;
    select_by_identifier(&buckets, identifier, "bucket", greedy, |b| &b.id, |b| &b.name).cloned()
}

async fn find_flow<S: NifiApi + ?Sized>(
    api: &S,
    registry_id: &str,
    bucket_id: &str,
    identifier: &str,
    greedy: bool,
) -> Result<VersionedFlow> {
    let flows = api.list_flows(registry_id, bucket_id).await?;
    select_by_identifier(&flows, identifier, "flow", greedy, |f| &f.id, |f| &f.name).cloned()
}

#[derive(Debug, Clone)]
pub struct EnsureRegistryRequest {
    pub name: String,
    pub provider: GitProvider,
    /// `owner/name` on GitHub, the project path on GitLab
    pub repository: Option<String>,
    pub token: Option<String>,
    pub api_url: String,
    pub default_branch: String,
    pub repository_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsureRegistryResult {
    pub registry_client_id: Id,
    pub registry_client_name: String,
    pub created: bool,
}

impl EnsureRegistryRequest {
    fn client_type(&self) -> &'static str {
        match self.provider {
            GitProvider::Github => GITHUB_CLIENT_TYPE,
            GitProvider::Gitlab => GITLAB_CLIENT_TYPE,
        }
    }

    /// Registry client properties as the NiFi git clients name them.
    fn properties(&self) -> Result<BTreeMap<String, String>> {
        let repository = self
            .repository
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                NifiError::input("a repository is required to create a registry client")
            })?;
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NifiError::input("a git token is required to create a registry client")
            })?;
        let (owner, name) = repository
            .rsplit_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty())
            .ok_or_else(|| {
                NifiError::input(format!(
                    "repository '{}' must look like owner/name",
                    repository
                ))
            })?;

        let mut properties = BTreeMap::new();
        let mut set = |key: &str, value: &str| {
            properties.insert(key.to_string(), value.to_string());
        };
        match self.provider {
            GitProvider::Github => {
                set("GitHub API URL", &self.api_url);
                set("Repository Owner", owner);
                set("Repository Name", name);
                set("Authentication Type", "PERSONAL_ACCESS_TOKEN");
                set("Personal Access Token", token);
            }
            GitProvider::Gitlab => {
                set("GitLab API URL", &self.api_url);
                set("Repository Namespace", owner);
                set("Repository Name", name);
                set("Authentication Type", "ACCESS_TOKEN");
                set("Access Token", token);
            }
        }
        set("Default Branch", &self.default_branch);
        if let Some(path) = &self.repository_path {
            set("Repository Path", path);
        }
        Ok(properties)
    }
}

/// Return the registry client with the given name, creating it if absent.
pub async fn ensure_registry<S: NifiApi + ?Sized>(
    api: &S,
    request: &EnsureRegistryRequest,
) -> Result<EnsureRegistryResult> {
    if request.name.trim().is_empty() {
        return Err(NifiError::input("registry client name is empty"));
    }
    let existing = api.list_registry_clients().await?;
    if let Some(client) = existing.into_iter().find(|c| c.name == request.name) {
        log::info!("Registry client '{}' already exists", client.name);
        return Ok(EnsureRegistryResult {
            registry_client_id: client.id,
            registry_client_name: client.name,
            created: false,
        });
    }

    let properties = request.properties()?;
    log::info!("Creating registry client '{}'", request.name);
    let client = api
        .create_registry_client(&request.name, request.client_type(), properties)
        .await?;
    Ok(EnsureRegistryResult {
        registry_client_id: client.id,
        registry_client_name: client.name,
        created: true,
    })
}

#[derive(Debug, Clone, Default)]
pub struct DeployFlowRequest {
    pub registry_client: String,
    pub bucket: String,
    pub flow: String,
    /// Branch, tag or SHA; newest when absent
    pub version: Option<String>,
    /// Root canvas when absent
    pub parent_id: Option<Id>,
    pub position: Position,
    pub greedy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployResult {
    pub process_group_id: Id,
    pub process_group_name: String,
    pub parent_id: Id,
    pub registry_client_id: Id,
    pub bucket_id: Id,
    pub flow_id: Id,
    pub deployed_version: String,
}

/// Instantiate a registry flow as a new process group.
pub async fn deploy_flow<S, R>(
    api: &S,
    resolver: &R,
    request: &DeployFlowRequest,
) -> Result<DeployResult>
where
    S: NifiApi + ?Sized,
    R: GitRefResolver + ?Sized,
{
    let client = find_registry_client(api, &request.registry_client, request.greedy).await?;
    let bucket = find_bucket(api, &client.id, &request.bucket, request.greedy).await?;
    let flow = find_flow(api, &client.id, &bucket.id, &request.flow, request.greedy).await?;
    let version = target_version(
        api,
        resolver,
        &client.id,
        &bucket.id,
        &flow.id,
        request.version.as_deref(),
    )
    .await?;

    let parent_id = match &request.parent_id {
        Some(id) => id.clone(),
        None => api.get_root_process_group_id().await?,
    };
    log::info!(
        "Deploying '{}' at {} from {}/{} into {}",
        flow.name,
        version,
        client.name,
        bucket.name,
        parent_id
    );
    let group = api
        .deploy_flow(
            &parent_id,
            &DeployRequest {
                registry_id: client.id.clone(),
                bucket_id: bucket.id.clone(),
                flow_id: flow.id.clone(),
                version: version.clone(),
                position: request.position,
            },
        )
        .await?;

    let deployed_version = group
        .version_control
        .as_ref()
        .and_then(|v| v.version.clone())
        .unwrap_or(version);
    Ok(DeployResult {
        process_group_id: group.id,
        process_group_name: group.name,
        parent_id,
        registry_client_id: client.id,
        bucket_id: bucket.id,
        flow_id: flow.id,
        deployed_version,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryFlowsResult {
    pub registry_client_id: Id,
    pub bucket_id: Id,
    pub count: usize,
    pub flows: Vec<VersionedFlow>,
}

pub async fn list_registry_flows<S: NifiApi + ?Sized>(
    api: &S,
    registry_client: &str,
    bucket: &str,
    greedy: bool,
) -> Result<RegistryFlowsResult> {
    let client = find_registry_client(api, registry_client, greedy).await?;
    let bucket = find_bucket(api, &client.id, bucket, greedy).await?;
    let flows = api.list_flows(&client.id, &bucket.id).await?;
    Ok(RegistryFlowsResult {
        registry_client_id: client.id,
        bucket_id: bucket.id,
        count: flows.len(),
        flows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowVersionsResult {
    pub flow_id: Id,
    pub flow_name: String,
    pub count: usize,
    pub latest: Option<String>,
    pub versions: Vec<FlowVersion>,
}

pub async fn get_flow_versions<S: NifiApi + ?Sized>(
    api: &S,
    registry_client: &str,
    bucket: &str,
    flow: &str,
    greedy: bool,
) -> Result<FlowVersionsResult> {
    let client = find_registry_client(api, registry_client, greedy).await?;
    let bucket = find_bucket(api, &client.id, bucket, greedy).await?;
    let flow = find_flow(api, &client.id, &bucket.id, flow, greedy).await?;
    let versions = api
        .list_flow_versions(&client.id, &bucket.id, &flow.id)
        .await?;
    Ok(FlowVersionsResult {
        flow_id: flow.id,
        flow_name: flow.name,
        count: versions.len(),
        latest: crate::logic::versioning::latest_version(&versions).map(|v| v.version.clone()),
        versions,
    })
}
