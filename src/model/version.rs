use crate::model::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization state of a versioned process group, as reported by NiFi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    UpToDate,
    LocallyModified,
    Stale,
    LocallyModifiedAndStale,
    SyncFailure,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::UpToDate => "UP_TO_DATE",
            VersionState::LocallyModified => "LOCALLY_MODIFIED",
            VersionState::Stale => "STALE",
            VersionState::LocallyModifiedAndStale => "LOCALLY_MODIFIED_AND_STALE",
            VersionState::SyncFailure => "SYNC_FAILURE",
        }
    }

    pub fn is_locally_modified(&self) -> bool {
        matches!(
            self,
            VersionState::LocallyModified | VersionState::LocallyModifiedAndStale
        )
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link between a process group and a flow stored in a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionControlInformation {
    pub registry_id: Id,
    pub bucket_id: Id,
    pub flow_id: Id,
    pub flow_name: Option<String>,
    /// Commit SHA for git-backed registries, a number for classic ones
    pub version: Option<String>,
    pub state: VersionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryClient {
    pub id: Id,
    pub name: String,
    pub client_type: String,
    #[serde(default)]
    pub properties: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedFlow {
    pub id: Id,
    pub name: String,
    pub bucket_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVersion {
    pub version: String,
    pub author: Option<String>,
    pub comments: Option<String>,
    /// Milliseconds since the epoch
    pub timestamp: Option<i64>,
}
