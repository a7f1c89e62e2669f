use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::client::traits::{
    DeployRequest, ParameterContextApi, ProcessGroupApi, QueueApi, RegistryApi, VersioningApi,
};
use crate::error::{NifiError, Result};
use crate::model::{
    generate_id, Asset, Bucket, Connection, ControllerServiceState, DropResult, FlowVersion, Id,
    Parameter, ParameterContext, ParameterContextRef, ProcessGroup, ProcessGroupStatus,
    RegistryClient, Revision, ScheduledState, VersionControlInformation, VersionState,
    VersionedFlow,
};

pub const ROOT_GROUP_ID: &str = "root";

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<Id, ProcessGroup>,
    active_threads: HashMap<Id, u32>,
    controller_services: HashMap<Id, ControllerServiceState>,
    contexts: BTreeMap<Id, ParameterContext>,
    registry_clients: Vec<RegistryClient>,
    buckets: HashMap<Id, Vec<Bucket>>,
    flows: HashMap<Id, Vec<VersionedFlow>>,
    flow_versions: HashMap<Id, Vec<FlowVersion>>,
    connections: Vec<Connection>,
    assets: Vec<Asset>,
    mutations: Vec<String>,
}

impl State {
    fn descendants(&self, id: &str) -> Vec<Id> {
        let mut found = vec![id.to_string()];
        let mut i = 0;
        while i < found.len() {
            let current = found[i].clone();
            found.extend(
                self.groups
                    .values()
                    .filter(|g| g.parent_group_id.as_deref() == Some(current.as_str()))
                    .map(|g| g.id.clone()),
            );
            i += 1;
        }
        found
    }

    fn conflict(message: impl Into<String>) -> NifiError {
        NifiError::Api {
            status: 409,
            message: message.into(),
        }
    }

    fn latest_version(&self, flow_id: &str) -> Option<&FlowVersion> {
        self.flow_versions.get(flow_id).and_then(|v| v.last())
    }

    fn state_for(&self, flow_id: &str, version: &str) -> VersionState {
        match self.latest_version(flow_id) {
            Some(latest) if latest.version != version => VersionState::Stale,
            _ => VersionState::UpToDate,
        }
    }

    fn group_mut(&mut self, id: &str) -> Result<&mut ProcessGroup> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| NifiError::not_found(format!("process group {}", id)))
    }
}

/// A NiFi stand-in that keeps the canvas, parameter contexts and registry
/// in memory and mimics the server-side rules the workflows depend on:
/// revision checks, deletion preconditions and version states.
///
/// Every mutating call is recorded so callers can assert what was written.
#[derive(Debug)]
pub struct InMemoryNifi {
    state: RwLock<State>,
}

impl Default for InMemoryNifi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNifi {
    /// An empty canvas with only the root group
    pub fn new() -> Self {
        let mut state = State::default();
        state.groups.insert(
            ROOT_GROUP_ID.to_string(),
            ProcessGroup::new(ROOT_GROUP_ID, "NiFi Flow", None),
        );
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn add_process_group(&self, group: ProcessGroup) {
        self.state.write().groups.insert(group.id.clone(), group);
    }

    pub fn add_parameter_context(&self, context: ParameterContext) {
        self.state
            .write()
            .contexts
            .insert(context.id.clone(), context);
    }

    /// Bind a context to a group, keeping both sides consistent
    pub fn bind_parameter_context(&self, group_id: &str, context_id: &str) {
        let mut state = self.state.write();
        let name = state.contexts.get_mut(context_id).map(|ctx| {
            if !ctx.bound_process_groups.iter().any(|g| g == group_id) {
                ctx.bound_process_groups.push(group_id.to_string());
            }
            ctx.name.clone()
        });
        if let Some(group) = state.groups.get_mut(group_id) {
            group.parameter_context = Some(ParameterContextRef::new(context_id, name));
        }
    }

    pub fn add_registry_client(&self, client: RegistryClient) {
        self.state.write().registry_clients.push(client);
    }

    pub fn add_bucket(&self, registry_id: &str, bucket: Bucket) {
        self.state
            .write()
            .buckets
            .entry(registry_id.to_string())
            .or_default()
            .push(bucket);
    }

    pub fn add_flow(&self, registry_id: &str, flow: VersionedFlow) {
        let key = format!("{}/{}", registry_id, flow.bucket_id);
        self.state.write().flows.entry(key).or_default().push(flow);
    }

    /// Versions are kept in commit order; the last one added is the head
    pub fn add_flow_version(&self, flow_id: &str, version: FlowVersion) {
        self.state
            .write()
            .flow_versions
            .entry(flow_id.to_string())
            .or_default()
            .push(version);
    }

    pub fn add_connection(&self, connection: Connection) {
        self.state.write().connections.push(connection);
    }

    pub fn set_active_threads(&self, group_id: &str, threads: u32) {
        self.state
            .write()
            .active_threads
            .insert(group_id.to_string(), threads);
    }

    pub fn set_version_state(&self, group_id: &str, version_state: VersionState) {
        let mut state = self.state.write();
        if let Some(vci) = state
            .groups
            .get_mut(group_id)
            .and_then(|g| g.version_control.as_mut())
        {
            vci.state = version_state;
        }
    }

    pub fn process_group(&self, id: &str) -> Option<ProcessGroup> {
        self.state.read().groups.get(id).cloned()
    }

    pub fn parameter_context(&self, id: &str) -> Option<ParameterContext> {
        self.state.read().contexts.get(id).cloned()
    }

    pub fn controller_services_state(&self, group_id: &str) -> Option<ControllerServiceState> {
        self.state.read().controller_services.get(group_id).copied()
    }

    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.state
            .read()
            .connections
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Mutating calls received so far, as `operation:target` strings
    pub fn mutations(&self) -> Vec<String> {
        self.state.read().mutations.clone()
    }

    fn record(state: &mut State, operation: &str, target: &str) {
        state.mutations.push(format!("{}:{}", operation, target));
    }
}

#[async_trait::async_trait]
impl ProcessGroupApi for InMemoryNifi {
    async fn get_root_process_group_id(&self) -> Result<Id> {
        Ok(ROOT_GROUP_ID.to_string())
    }

    async fn get_process_group(&self, id: &str) -> Result<Option<ProcessGroup>> {
        Ok(self.process_group(id))
    }

    async fn list_child_process_groups(&self, parent_id: &str) -> Result<Vec<ProcessGroup>> {
        let state = self.state.read();
        if !state.groups.contains_key(parent_id) {
            return Err(NifiError::not_found(format!("process group {}", parent_id)));
        }
        Ok(state
            .groups
            .values()
            .filter(|g| g.parent_group_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn get_process_group_status(&self, id: &str) -> Result<ProcessGroupStatus> {
        let state = self.state.read();
        if !state.groups.contains_key(id) {
            return Err(NifiError::not_found(format!("process group {}", id)));
        }
        let scope: HashSet<Id> = state.descendants(id).into_iter().collect();
        let queued = state.connections.iter().filter(|c| scope.contains(&c.group_id));
        Ok(ProcessGroupStatus {
            active_thread_count: scope
                .iter()
                .map(|g| state.active_threads.get(g).copied().unwrap_or(0))
                .sum(),
            queued_count: queued.clone().map(|c| c.queued_count).sum(),
            queued_bytes: queued.map(|c| c.queued_bytes).sum(),
        })
    }

    async fn schedule_process_group(&self, id: &str, scheduled: ScheduledState) -> Result<()> {
        let mut state = self.state.write();
        let scope = state.descendants(id);
        state.group_mut(id)?;
        for group_id in &scope {
            let group = state.group_mut(group_id)?;
            match scheduled {
                ScheduledState::Running => {
                    group.running_count += group.stopped_count;
                    group.stopped_count = 0;
                }
                ScheduledState::Stopped => {
                    group.stopped_count += group.running_count;
                    group.running_count = 0;
                }
            }
            group.revision = group.revision.next();
            if scheduled == ScheduledState::Stopped {
                state.active_threads.remove(group_id);
            }
        }
        Self::record(&mut state, &format!("schedule_{}", scheduled.as_str()), id);
        Ok(())
    }

    async fn set_controller_services_state(
        &self,
        id: &str,
        services: ControllerServiceState,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.group_mut(id)?;
        if services == ControllerServiceState::Disabled
            && state.groups.get(id).map(|g| g.running_count > 0).unwrap_or(false)
        {
            return Err(State::conflict(format!(
                "cannot disable controller services of {} while processors are running",
                id
            )));
        }
        for group_id in state.descendants(id) {
            state.controller_services.insert(group_id, services);
        }
        Self::record(&mut state, &format!("controllers_{}", services.as_str()), id);
        Ok(())
    }

    async fn delete_process_group(&self, group: &ProcessGroup) -> Result<()> {
        let mut state = self.state.write();
        let current = state
            .groups
            .get(&group.id)
            .cloned()
            .ok_or_else(|| NifiError::not_found(format!("process group {}", group.id)))?;
        if current.revision != group.revision {
            return Err(State::conflict(format!(
                "revision {} of {} is stale",
                group.revision.version, group.id
            )));
        }

        let scope = state.descendants(&group.id);
        for group_id in &scope {
            let member = &state.groups[group_id];
            if member.running_count > 0 {
                return Err(State::conflict(format!("{} has running components", member.name)));
            }
            if state.controller_services.get(group_id) == Some(&ControllerServiceState::Enabled) {
                return Err(State::conflict(format!(
                    "{} has enabled controller services",
                    member.name
                )));
            }
        }
        if state
            .connections
            .iter()
            .any(|c| scope.contains(&c.group_id) && c.queued_count > 0)
        {
            return Err(State::conflict(format!(
                "{} has queued flowfiles",
                current.name
            )));
        }

        for group_id in &scope {
            state.groups.remove(group_id);
            state.controller_services.remove(group_id);
            state.active_threads.remove(group_id);
        }
        state.connections.retain(|c| !scope.contains(&c.group_id));
        for ctx in state.contexts.values_mut() {
            ctx.bound_process_groups.retain(|g| !scope.contains(g));
        }
        Self::record(&mut state, "delete_process_group", &group.id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ParameterContextApi for InMemoryNifi {
    async fn get_parameter_context(&self, id: &str) -> Result<Option<ParameterContext>> {
        Ok(self.parameter_context(id))
    }

    async fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>> {
        Ok(self.state.read().contexts.values().cloned().collect())
    }

    async fn update_parameter_context(
        &self,
        context: &ParameterContext,
        parameters: Vec<Parameter>,
    ) -> Result<ParameterContext> {
        let mut state = self.state.write();
        let stored = state
            .contexts
            .get_mut(&context.id)
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", context.id)))?;
        if stored.revision.version != context.revision.version {
            return Err(State::conflict(format!(
                "revision {} of parameter context {} is stale",
                context.revision.version, context.id
            )));
        }
        stored.apply_updates(&parameters);
        stored.revision = stored.revision.next();
        let updated = stored.clone();
        Self::record(&mut state, "update_parameter_context", &context.id);
        Ok(updated)
    }

    async fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()> {
        let mut state = self.state.write();
        let stored = state
            .contexts
            .get(&context.id)
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", context.id)))?;
        if stored.revision.version != context.revision.version {
            return Err(State::conflict(format!(
                "revision {} of parameter context {} is stale",
                context.revision.version, context.id
            )));
        }
        if !stored.bound_process_groups.is_empty() {
            return Err(State::conflict(format!(
                "parameter context {} is still bound to process groups",
                stored.name
            )));
        }
        let inherited_by_other = state.contexts.values().any(|c| {
            c.inherited_parameter_contexts
                .iter()
                .any(|r| r.id == context.id)
        });
        if inherited_by_other {
            return Err(State::conflict(format!(
                "parameter context {} is inherited by another context",
                context.id
            )));
        }
        state.contexts.remove(&context.id);
        state.assets.retain(|a| a.parameter_context_id != context.id);
        Self::record(&mut state, "delete_parameter_context", &context.id);
        Ok(())
    }

    async fn upload_asset(
        &self,
        context_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Asset> {
        let mut state = self.state.write();
        if !state.contexts.contains_key(context_id) {
            return Err(NifiError::not_found(format!(
                "parameter context {}",
                context_id
            )));
        }
        let asset = Asset {
            id: generate_id(),
            name: file_name.to_string(),
            digest: hex::encode(Sha256::digest(&content)),
            parameter_context_id: context_id.to_string(),
        };
        state.assets.push(asset.clone());
        Self::record(&mut state, "upload_asset", context_id);
        Ok(asset)
    }
}

#[async_trait::async_trait]
impl VersioningApi for InMemoryNifi {
    async fn update_flow_version(
        &self,
        group: &ProcessGroup,
        version: &str,
    ) -> Result<VersionControlInformation> {
        let mut state = self.state.write();
        let flow_id = state
            .group_mut(&group.id)?
            .version_control
            .as_ref()
            .map(|v| v.flow_id.clone())
            .ok_or_else(|| {
                NifiError::configuration(format!("{} is not under version control", group.id))
            })?;
        let known = state
            .flow_versions
            .get(&flow_id)
            .map(|versions| versions.iter().any(|v| v.version == version))
            .unwrap_or(false);
        if !known {
            return Err(NifiError::not_found(format!(
                "version {} of flow {}",
                version, flow_id
            )));
        }
        let new_state = state.state_for(&flow_id, version);
        let target = state.group_mut(&group.id)?;
        target.revision = target.revision.next();
        let vci = target
            .version_control
            .as_mut()
            .ok_or_else(|| NifiError::configuration("version control vanished"))?;
        vci.version = Some(version.to_string());
        vci.state = new_state;
        let updated = vci.clone();
        Self::record(&mut state, "update_flow_version", &group.id);
        Ok(updated)
    }

    async fn revert_local_changes(
        &self,
        group: &ProcessGroup,
    ) -> Result<VersionControlInformation> {
        let mut state = self.state.write();
        let target = state.group_mut(&group.id)?;
        target.revision = target.revision.next();
        let vci = target.version_control.as_mut().ok_or_else(|| {
            NifiError::configuration(format!("{} is not under version control", group.id))
        })?;
        vci.state = match vci.state {
            VersionState::LocallyModifiedAndStale | VersionState::Stale => VersionState::Stale,
            _ => VersionState::UpToDate,
        };
        let reverted = vci.clone();
        Self::record(&mut state, "revert_flow", &group.id);
        Ok(reverted)
    }
}

#[async_trait::async_trait]
impl RegistryApi for InMemoryNifi {
    async fn list_registry_clients(&self) -> Result<Vec<RegistryClient>> {
        Ok(self.state.read().registry_clients.clone())
    }

    async fn create_registry_client(
        &self,
        name: &str,
        client_type: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<RegistryClient> {
        let mut state = self.state.write();
        if state.registry_clients.iter().any(|c| c.name == name) {
            return Err(State::conflict(format!(
                "a registry client named '{}' already exists",
                name
            )));
        }
        let client = RegistryClient {
            id: generate_id(),
            name: name.to_string(),
            client_type: client_type.to_string(),
            properties,
        };
        state.registry_clients.push(client.clone());
        Self::record(&mut state, "create_registry_client", &client.id);
        Ok(client)
    }

    async fn list_buckets(&self, registry_id: &str) -> Result<Vec<Bucket>> {
        Ok(self
            .state
            .read()
            .buckets
            .get(registry_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_flows(&self, registry_id: &str, bucket_id: &str) -> Result<Vec<VersionedFlow>> {
        let key = format!("{}/{}", registry_id, bucket_id);
        Ok(self.state.read().flows.get(&key).cloned().unwrap_or_default())
    }

    async fn list_flow_versions(
        &self,
        _registry_id: &str,
        _bucket_id: &str,
        flow_id: &str,
    ) -> Result<Vec<FlowVersion>> {
        Ok(self
            .state
            .read()
            .flow_versions
            .get(flow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn deploy_flow(&self, parent_id: &str, request: &DeployRequest) -> Result<ProcessGroup> {
        let mut state = self.state.write();
        state.group_mut(parent_id)?;
        let key = format!("{}/{}", request.registry_id, request.bucket_id);
        let flow = state
            .flows
            .get(&key)
            .and_then(|flows| flows.iter().find(|f| f.id == request.flow_id))
            .cloned()
            .ok_or_else(|| NifiError::not_found(format!("flow {}", request.flow_id)))?;
        let known = state
            .flow_versions
            .get(&flow.id)
            .map(|versions| versions.iter().any(|v| v.version == request.version))
            .unwrap_or(false);
        if !known {
            return Err(NifiError::not_found(format!(
                "version {} of flow {}",
                request.version, flow.id
            )));
        }

        let mut group =
            ProcessGroup::new(generate_id(), flow.name.clone(), Some(parent_id.to_string()));
        group.revision = Revision::new(1);
        group.version_control = Some(VersionControlInformation {
            registry_id: request.registry_id.clone(),
            bucket_id: request.bucket_id.clone(),
            flow_id: flow.id.clone(),
            flow_name: Some(flow.name.clone()),
            version: Some(request.version.clone()),
            state: state.state_for(&flow.id, &request.version),
        });
        state.groups.insert(group.id.clone(), group.clone());
        Self::record(&mut state, "deploy_flow", &group.id);
        Ok(group)
    }
}

#[async_trait::async_trait]
impl QueueApi for InMemoryNifi {
    async fn list_connections(&self, group_id: &str) -> Result<Vec<Connection>> {
        Ok(self
            .state
            .read()
            .connections
            .iter()
            .filter(|c| c.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn drop_queue(&self, connection_id: &str) -> Result<DropResult> {
        let mut state = self.state.write();
        let connection = state
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or_else(|| NifiError::not_found(format!("connection {}", connection_id)))?;
        let result = DropResult {
            connection_id: connection_id.to_string(),
            dropped_count: connection.queued_count,
            dropped_bytes: connection.queued_bytes,
        };
        connection.queued_count = 0;
        connection.queued_bytes = 0;
        Self::record(&mut state, "drop_queue", connection_id);
        Ok(result)
    }
}
