//! JSON shapes of the NiFi REST entities this crate reads or writes.
//!
//! Only the fields the workflows need are modeled; unknown fields are
//! ignored on input and absent fields are omitted on output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    Asset, AssetReference, Bucket, Connection, FlowVersion, Parameter, ParameterContext,
    ParameterContextRef, Position, ProcessGroup, ProcessGroupStatus, RegistryClient, Revision,
    VersionControlInformation, VersionState, VersionedFlow,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDto {
    #[serde(default)]
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl From<RevisionDto> for Revision {
    fn from(dto: RevisionDto) -> Self {
        Revision {
            version: dto.version,
            client_id: dto.client_id,
        }
    }
}

impl RevisionDto {
    pub fn for_write(revision: &Revision, client_id: &str) -> Self {
        RevisionDto {
            version: revision.version,
            client_id: Some(client_id.to_string()),
        }
    }
}

/// Registry versions are numbers on classic registries and commit ids on
/// git-backed ones.
fn version_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedComponentDto {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContextReferenceEntity {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<NamedComponentDto>,
}

impl From<ParameterContextReferenceEntity> for ParameterContextRef {
    fn from(entity: ParameterContextReferenceEntity) -> Self {
        let name = entity.component.and_then(|c| c.name);
        ParameterContextRef::new(entity.id, name)
    }
}

impl From<&ParameterContextRef> for ParameterContextReferenceEntity {
    fn from(reference: &ParameterContextRef) -> Self {
        ParameterContextReferenceEntity {
            id: reference.id.clone(),
            component: Some(NamedComponentDto {
                id: Some(reference.id.clone()),
                name: reference.name.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionControlInformationDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub registry_id: String,
    pub bucket_id: String,
    pub flow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<VersionState>,
}

impl VersionControlInformationDto {
    pub fn into_model(self) -> VersionControlInformation {
        let version = version_string(&self.version);
        VersionControlInformation {
            registry_id: self.registry_id,
            bucket_id: self.bucket_id,
            flow_id: self.flow_id,
            flow_name: self.flow_name,
            version,
            state: self.state.unwrap_or(VersionState::SyncFailure),
        }
    }

    pub fn targeting(group_id: &str, vci: &VersionControlInformation, version: &str) -> Self {
        VersionControlInformationDto {
            group_id: Some(group_id.to_string()),
            registry_id: vci.registry_id.clone(),
            bucket_id: vci.bucket_id.clone(),
            flow_id: vci.flow_id.clone(),
            flow_name: None,
            version: Some(Value::String(version.to_string())),
            state: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshotDto {
    #[serde(default)]
    pub active_thread_count: u32,
    #[serde(default)]
    pub flow_files_queued: u64,
    #[serde(default)]
    pub bytes_queued: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    #[serde(default)]
    pub aggregate_snapshot: StatusSnapshotDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_context: Option<ParameterContextReferenceEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_control_information: Option<VersionControlInformationDto>,
    #[serde(default, skip_serializing)]
    pub running_count: u32,
    #[serde(default, skip_serializing)]
    pub stopped_count: u32,
    #[serde(default, skip_serializing)]
    pub invalid_count: u32,
    #[serde(default, skip_serializing)]
    pub disabled_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub revision: RevisionDto,
    #[serde(default)]
    pub component: ProcessGroupDto,
}

impl ProcessGroupEntity {
    pub fn into_model(self) -> ProcessGroup {
        let component = self.component;
        let id = self.id.or(component.id).unwrap_or_default();
        ProcessGroup {
            name: component.name.unwrap_or_else(|| id.clone()),
            id,
            parent_group_id: component.parent_group_id,
            revision: self.revision.into(),
            parameter_context: component.parameter_context.map(Into::into),
            version_control: component
                .version_control_information
                .map(VersionControlInformationDto::into_model),
            running_count: component.running_count,
            stopped_count: component.stopped_count,
            invalid_count: component.invalid_count,
            disabled_count: component.disabled_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupsEntity {
    #[serde(default)]
    pub process_groups: Vec<ProcessGroupEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupFlowDto {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupFlowEntity {
    pub process_group_flow: ProcessGroupFlowDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGroupStatusEntity {
    pub process_group_status: StatusDto,
}

impl From<ProcessGroupStatusEntity> for ProcessGroupStatus {
    fn from(entity: ProcessGroupStatusEntity) -> Self {
        let snapshot = entity.process_group_status.aggregate_snapshot;
        ProcessGroupStatus {
            active_thread_count: snapshot.active_thread_count,
            queued_count: snapshot.flow_files_queued,
            queued_bytes: snapshot.bytes_queued,
        }
    }
}

/// Body of `PUT /flow/process-groups/{id}` and
/// `PUT /flow/process-groups/{id}/controller-services`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntity {
    pub id: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReferenceDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDto {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing)]
    pub inherited: bool,
    #[serde(default)]
    pub referenced_assets: Vec<AssetReferenceDto>,
}

impl From<&Parameter> for ParameterDto {
    fn from(parameter: &Parameter) -> Self {
        ParameterDto {
            name: parameter.name.clone(),
            value: parameter.value.clone(),
            description: parameter.description.clone(),
            sensitive: parameter.sensitive,
            inherited: false,
            referenced_assets: parameter
                .referenced_assets
                .iter()
                .map(|a| AssetReferenceDto {
                    id: a.id.clone(),
                    name: a.name.clone(),
                })
                .collect(),
        }
    }
}

impl From<ParameterDto> for Parameter {
    fn from(dto: ParameterDto) -> Self {
        Parameter {
            name: dto.name,
            value: dto.value,
            description: dto.description,
            sensitive: dto.sensitive,
            referenced_assets: dto
                .referenced_assets
                .into_iter()
                .map(|a| AssetReference {
                    id: a.id,
                    name: a.name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEntity {
    pub parameter: ParameterDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundProcessGroupEntity {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContextDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_parameter_contexts: Option<Vec<ParameterContextReferenceEntity>>,
    #[serde(default, skip_serializing)]
    pub bound_process_groups: Vec<BoundProcessGroupEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContextEntity {
    pub id: String,
    #[serde(default)]
    pub revision: RevisionDto,
    pub component: ParameterContextDto,
}

impl ParameterContextEntity {
    /// Drops parameters NiFi reports as inherited so that each context only
    /// lists the parameters it declares itself.
    pub fn into_model(self) -> ParameterContext {
        let component = self.component;
        ParameterContext {
            name: component.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: component.description,
            revision: self.revision.into(),
            parameters: component
                .parameters
                .into_iter()
                .map(|p| p.parameter)
                .filter(|p| !p.inherited)
                .map(Into::into)
                .collect(),
            inherited_parameter_contexts: component
                .inherited_parameter_contexts
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            bound_process_groups: component
                .bound_process_groups
                .into_iter()
                .map(|pg| pg.id)
                .collect(),
        }
    }

    pub fn for_update(
        context: &ParameterContext,
        parameters: &[Parameter],
        client_id: &str,
    ) -> Self {
        ParameterContextEntity {
            id: context.id.clone(),
            revision: RevisionDto::for_write(&context.revision, client_id),
            component: ParameterContextDto {
                id: context.id.clone(),
                name: None,
                description: None,
                parameters: parameters
                    .iter()
                    .map(|p| ParameterEntity {
                        parameter: p.into(),
                    })
                    .collect(),
                inherited_parameter_contexts: Some(
                    context
                        .inherited_parameter_contexts
                        .iter()
                        .map(Into::into)
                        .collect(),
                ),
                bound_process_groups: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContextsEntity {
    #[serde(default)]
    pub parameter_contexts: Vec<ParameterContextEntity>,
}

/// Shared shape of the asynchronous update/revert request DTOs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncRequestDto {
    pub request_id: String,
    #[serde(default)]
    pub complete: bool,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub percent_completed: i32,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncRequestEntity {
    pub request: AsyncRequestDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionControlInformationEntity {
    pub process_group_revision: RevisionDto,
    pub version_control_information: VersionControlInformationDto,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetEntity {
    pub asset: AssetDto,
}

impl AssetEntity {
    pub fn into_model(self, context_id: &str, local_digest: String) -> Asset {
        Asset {
            id: self.asset.id,
            name: self.asset.name,
            digest: self.asset.digest.unwrap_or(local_digest),
            parameter_context_id: context_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryClientDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: String,
    #[serde(default)]
    pub properties: std::collections::BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryClientEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub revision: RevisionDto,
    pub component: RegistryClientDto,
}

impl RegistryClientEntity {
    pub fn into_model(self) -> RegistryClient {
        let component = self.component;
        RegistryClient {
            id: self.id.or(component.id).unwrap_or_default(),
            name: component.name,
            client_type: component.client_type,
            properties: component
                .properties
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k, v)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryClientsEntity {
    #[serde(default)]
    pub registries: Vec<RegistryClientEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketDto {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub id: String,
    pub bucket: BucketDto,
}

impl From<BucketEntity> for Bucket {
    fn from(entity: BucketEntity) -> Self {
        Bucket {
            id: entity.bucket.id.unwrap_or(entity.id),
            name: entity.bucket.name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketsEntity {
    #[serde(default)]
    pub buckets: Vec<BucketEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFlowDto {
    pub flow_id: String,
    pub flow_name: String,
    pub bucket_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFlowEntity {
    pub versioned_flow: VersionedFlowDto,
}

impl From<VersionedFlowEntity> for VersionedFlow {
    fn from(entity: VersionedFlowEntity) -> Self {
        let flow = entity.versioned_flow;
        VersionedFlow {
            id: flow.flow_id,
            name: flow.flow_name,
            bucket_id: flow.bucket_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFlowsEntity {
    #[serde(default)]
    pub versioned_flows: Vec<VersionedFlowEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadataDto {
    pub version: Option<Value>,
    pub author: Option<String>,
    pub comments: Option<String>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadataEntity {
    pub versioned_flow_snapshot_metadata: SnapshotMetadataDto,
}

impl From<SnapshotMetadataEntity> for FlowVersion {
    fn from(entity: SnapshotMetadataEntity) -> Self {
        let meta = entity.versioned_flow_snapshot_metadata;
        FlowVersion {
            version: version_string(&meta.version).unwrap_or_default(),
            author: meta.author,
            comments: meta.comments,
            timestamp: meta.timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadataSetEntity {
    #[serde(default)]
    pub versioned_flow_snapshot_metadata_set: Vec<SnapshotMetadataEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub name: Option<String>,
    pub parent_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntity {
    pub id: String,
    #[serde(default)]
    pub component: Option<ConnectionDto>,
    #[serde(default)]
    pub status: StatusDto,
}

impl ConnectionEntity {
    pub fn into_model(self, group_id: &str) -> Connection {
        let component = self.component.unwrap_or_default();
        Connection {
            id: self.id,
            name: component.name.filter(|n| !n.is_empty()),
            group_id: component
                .parent_group_id
                .unwrap_or_else(|| group_id.to_string()),
            queued_count: self.status.aggregate_snapshot.flow_files_queued,
            queued_bytes: self.status.aggregate_snapshot.bytes_queued,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionsEntity {
    #[serde(default)]
    pub connections: Vec<ConnectionEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRequestDto {
    pub id: String,
    #[serde(default)]
    pub finished: bool,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub dropped_count: u64,
    #[serde(default)]
    pub dropped_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRequestEntity {
    pub drop_request: DropRequestDto,
}
