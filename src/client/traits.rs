use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{
    Asset, Bucket, Connection, ControllerServiceState, DropResult, FlowVersion, Id, Parameter,
    ParameterContext, Position, ProcessGroup, ProcessGroupStatus, RegistryClient,
    ScheduledState, VersionControlInformation, VersionedFlow,
};

/// Coordinates of a registry flow to instantiate on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub registry_id: Id,
    pub bucket_id: Id,
    pub flow_id: Id,
    pub version: String,
    pub position: Position,
}

#[async_trait::async_trait]
pub trait ProcessGroupApi: Send + Sync {
    /// Id of the top-level canvas group
    async fn get_root_process_group_id(&self) -> Result<Id>;
    async fn get_process_group(&self, id: &str) -> Result<Option<ProcessGroup>>;
    /// Direct children only
    async fn list_child_process_groups(&self, parent_id: &str) -> Result<Vec<ProcessGroup>>;
    async fn get_process_group_status(&self, id: &str) -> Result<ProcessGroupStatus>;
    async fn schedule_process_group(&self, id: &str, state: ScheduledState) -> Result<()>;
    /// Applies to the group's controller services and those of all descendants
    async fn set_controller_services_state(
        &self,
        id: &str,
        state: ControllerServiceState,
    ) -> Result<()>;
    async fn delete_process_group(&self, group: &ProcessGroup) -> Result<()>;
}

#[async_trait::async_trait]
pub trait ParameterContextApi: Send + Sync {
    /// Returns the context with only its own (non-inherited) parameters
    async fn get_parameter_context(&self, id: &str) -> Result<Option<ParameterContext>>;
    async fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>>;
    /// Writes the given parameters into the context in one request and
    /// blocks until the server has applied them
    async fn update_parameter_context(
        &self,
        context: &ParameterContext,
        parameters: Vec<Parameter>,
    ) -> Result<ParameterContext>;
    async fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()>;
    async fn upload_asset(&self, context_id: &str, file_name: &str, content: Vec<u8>)
        -> Result<Asset>;
}

#[async_trait::async_trait]
pub trait VersioningApi: Send + Sync {
    /// Moves a versioned group to `version` and blocks until the update
    /// request completes
    async fn update_flow_version(
        &self,
        group: &ProcessGroup,
        version: &str,
    ) -> Result<VersionControlInformation>;
    /// Discards local modifications and blocks until the revert completes
    async fn revert_local_changes(&self, group: &ProcessGroup)
        -> Result<VersionControlInformation>;
}

#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    async fn list_registry_clients(&self) -> Result<Vec<RegistryClient>>;
    async fn create_registry_client(
        &self,
        name: &str,
        client_type: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<RegistryClient>;
    async fn list_buckets(&self, registry_id: &str) -> Result<Vec<Bucket>>;
    async fn list_flows(&self, registry_id: &str, bucket_id: &str) -> Result<Vec<VersionedFlow>>;
    async fn list_flow_versions(
        &self,
        registry_id: &str,
        bucket_id: &str,
        flow_id: &str,
    ) -> Result<Vec<FlowVersion>>;
    /// Instantiates a versioned flow as a new child of `parent_id`
    async fn deploy_flow(&self, parent_id: &str, request: &DeployRequest) -> Result<ProcessGroup>;
}

#[async_trait::async_trait]
pub trait QueueApi: Send + Sync {
    /// Connections directly inside the group
    async fn list_connections(&self, group_id: &str) -> Result<Vec<Connection>>;
    /// Drops every queued flowfile and blocks until the drop request finishes
    async fn drop_queue(&self, connection_id: &str) -> Result<DropResult>;
}

pub trait NifiApi:
    ProcessGroupApi + ParameterContextApi + VersioningApi + RegistryApi + QueueApi + Send + Sync
{
}

impl<T> NifiApi for T where
    T: ProcessGroupApi + ParameterContextApi + VersioningApi + RegistryApi + QueueApi + Send + Sync
{
}
