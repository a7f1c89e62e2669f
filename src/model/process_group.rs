use crate::model::{Id, ParameterContextRef, Revision, VersionControlInformation};
use serde::{Deserialize, Serialize};

/// Snapshot of a NiFi process group as returned by a single lookup.
/// Nothing here is cached across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessGroup {
    pub id: Id,
    pub name: String,
    pub parent_group_id: Option<Id>,
    pub revision: Revision,

    /// The context whose parameters this group can reference, if any
    pub parameter_context: Option<ParameterContextRef>,

    /// Present only when the group is under version control
    pub version_control: Option<VersionControlInformation>,

    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub stopped_count: u32,
    #[serde(default)]
    pub invalid_count: u32,
    #[serde(default)]
    pub disabled_count: u32,
}

impl ProcessGroup {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, parent_group_id: Option<Id>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_group_id,
            revision: Revision::default(),
            parameter_context: None,
            version_control: None,
            running_count: 0,
            stopped_count: 0,
            invalid_count: 0,
            disabled_count: 0,
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.version_control.is_some()
    }
}

/// Desired scheduling state for all processors of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledState {
    Running,
    Stopped,
}

impl ScheduledState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledState::Running => "RUNNING",
            ScheduledState::Stopped => "STOPPED",
        }
    }
}

/// Desired state for all controller services of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerServiceState {
    Enabled,
    Disabled,
}

impl ControllerServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerServiceState::Enabled => "ENABLED",
            ControllerServiceState::Disabled => "DISABLED",
        }
    }
}

/// Aggregate runtime numbers for a group and its descendants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessGroupStatus {
    pub active_thread_count: u32,
    pub queued_count: u64,
    pub queued_bytes: u64,
}

/// A queue between two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Id,
    pub name: Option<String>,
    pub group_id: Id,
    pub queued_count: u64,
    pub queued_bytes: u64,
}

/// Outcome of emptying one queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropResult {
    pub connection_id: Id,
    pub dropped_count: u64,
    pub dropped_bytes: u64,
}
