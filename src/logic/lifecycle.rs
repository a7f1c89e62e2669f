use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::client::traits::NifiApi;
use crate::config::NifiConfig;
use crate::error::{NifiError, Result};
use crate::model::{
    Connection, ControllerServiceState, Id, ParameterContext, ProcessGroup, ScheduledState,
    VersionState,
};

/// How long to wait for running threads to finish after a stop.
#[derive(Debug, Clone, Copy)]
pub struct DrainWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for DrainWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

impl From<&NifiConfig> for DrainWait {
    fn from(config: &NifiConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.wait_timeout_secs),
        }
    }
}

async fn require_group<S: NifiApi + ?Sized>(api: &S, id: &str) -> Result<ProcessGroup> {
    api.get_process_group(id)
        .await?
        .ok_or_else(|| NifiError::not_found(format!("process group {}", id)))
}

/// Poll until the group reports no active threads. Returns the count still
/// active when the wait gave up.
async fn wait_for_drain<S: NifiApi + ?Sized>(api: &S, id: &str, wait: DrainWait) -> Result<u32> {
    let deadline = Instant::now() + wait.timeout;
    loop {
        let status = api.get_process_group_status(id).await?;
        if status.active_thread_count == 0 {
            return Ok(0);
        }
        if Instant::now() >= deadline {
            log::warn!(
                "{} thread(s) still active in {} after {:?}",
                status.active_thread_count,
                id,
                wait.timeout
            );
            return Ok(status.active_thread_count);
        }
        log::debug!("Waiting for {} thread(s) in {}", status.active_thread_count, id);
        sleep(wait.poll_interval).await;
    }
}

/// Every connection inside the group and its descendants.
async fn collect_connections<S: NifiApi + ?Sized>(
    api: &S,
    root_id: &str,
) -> Result<Vec<Connection>> {
    let mut connections = Vec::new();
    let mut pending = vec![root_id.to_string()];
    while let Some(group_id) = pending.pop() {
        connections.extend(api.list_connections(&group_id).await?);
        pending.extend(
            api.list_child_process_groups(&group_id)
                .await?
                .into_iter()
                .map(|g| g.id),
        );
    }
    Ok(connections)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartResult {
    pub process_group_id: Id,
    pub process_group_name: String,
    pub controllers_enabled: bool,
    pub started: bool,
}

/// Enable controller services (optionally) and schedule every processor.
pub async fn start_flow<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
    enable_controllers: bool,
) -> Result<StartResult> {
    let group = require_group(api, process_group_id).await?;
    if enable_controllers {
        log::info!("Enabling controller services of '{}'", group.name);
        api.set_controller_services_state(&group.id, ControllerServiceState::Enabled)
            .await?;
    }
    log::info!("Starting '{}'", group.name);
    api.schedule_process_group(&group.id, ScheduledState::Running)
        .await?;
    Ok(StartResult {
        process_group_id: group.id,
        process_group_name: group.name,
        controllers_enabled: enable_controllers,
        started: true,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopResult {
    pub process_group_id: Id,
    pub process_group_name: String,
    pub stopped: bool,
    pub controllers_disabled: bool,
    pub active_threads: u32,
}

/// Stop every processor, wait for threads to drain, then optionally
/// disable controller services.
pub async fn stop_flow<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
    disable_controllers: bool,
    wait: DrainWait,
) -> Result<StopResult> {
    let group = require_group(api, process_group_id).await?;
    log::info!("Stopping '{}'", group.name);
    api.schedule_process_group(&group.id, ScheduledState::Stopped)
        .await?;
    let active_threads = wait_for_drain(api, &group.id, wait).await?;

    if disable_controllers {
        log::info!("Disabling controller services of '{}'", group.name);
        api.set_controller_services_state(&group.id, ControllerServiceState::Disabled)
            .await?;
    }
    Ok(StopResult {
        process_group_id: group.id,
        process_group_name: group.name,
        stopped: true,
        controllers_disabled: disable_controllers,
        active_threads,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStatus {
    pub process_group_id: Id,
    pub process_group_name: String,
    /// RUNNING, STOPPING or STOPPED
    pub state: String,
    pub running_processors: u32,
    pub stopped_processors: u32,
    pub invalid_processors: u32,
    pub disabled_processors: u32,
    pub active_threads: u32,
    pub queued_flowfiles: u64,
    pub queued_bytes: u64,
    pub versioned: bool,
    pub version: Option<String>,
    pub version_state: Option<VersionState>,
    pub parameter_context_id: Option<Id>,
    pub parameter_context_name: Option<String>,
}

pub async fn get_status<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
) -> Result<FlowStatus> {
    let group = require_group(api, process_group_id).await?;
    let status = api.get_process_group_status(&group.id).await?;

    let state = if group.running_count > 0 {
        "RUNNING"
    } else if status.active_thread_count > 0 {
        "STOPPING"
    } else {
        "STOPPED"
    };
    let vci = group.version_control.as_ref();
    Ok(FlowStatus {
        process_group_id: group.id.clone(),
        process_group_name: group.name.clone(),
        state: state.to_string(),
        running_processors: group.running_count,
        stopped_processors: group.stopped_count,
        invalid_processors: group.invalid_count,
        disabled_processors: group.disabled_count,
        active_threads: status.active_thread_count,
        queued_flowfiles: status.queued_count,
        queued_bytes: status.queued_bytes,
        versioned: vci.is_some(),
        version: vci.and_then(|v| v.version.clone()),
        version_state: vci.map(|v| v.state),
        parameter_context_id: group.parameter_context.as_ref().map(|c| c.id.clone()),
        parameter_context_name: group
            .parameter_context
            .as_ref()
            .map(|c| c.display_name().to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurgeResult {
    pub process_group_id: Id,
    pub stopped: bool,
    pub connections_purged: usize,
    pub flowfiles_purged: u64,
    pub bytes_purged: u64,
    pub flowfiles_remaining: u64,
}

/// Drop every queued flowfile in the group and its descendants.
pub async fn purge_flowfiles<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
    stop: bool,
    wait: DrainWait,
) -> Result<PurgeResult> {
    let group = require_group(api, process_group_id).await?;
    if stop {
        stop_flow(api, &group.id, false, wait).await?;
    }

    let mut result = PurgeResult {
        process_group_id: group.id.clone(),
        stopped: stop,
        connections_purged: 0,
        flowfiles_purged: 0,
        bytes_purged: 0,
        flowfiles_remaining: 0,
    };
    for connection in collect_connections(api, &group.id).await? {
        if connection.queued_count == 0 {
            continue;
        }
        let dropped = api.drop_queue(&connection.id).await?;
        log::debug!(
            "Dropped {} flowfile(s) from {}",
            dropped.dropped_count,
            connection.name.as_deref().unwrap_or(&connection.id)
        );
        result.connections_purged += 1;
        result.flowfiles_purged += dropped.dropped_count;
        result.bytes_purged += dropped.dropped_bytes;
    }
    result.flowfiles_remaining = api.get_process_group_status(&group.id).await?.queued_count;

    log::info!(
        "Purged {} flowfile(s) from {} connection(s) in '{}'",
        result.flowfiles_purged,
        result.connections_purged,
        group.name
    );
    Ok(result)
}

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub delete_process_group: bool,
    /// Purge queued flowfiles before deleting
    pub force: bool,
    pub delete_parameter_context: bool,
    pub disable_controllers: bool,
    pub delete_orphaned_contexts: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            delete_process_group: false,
            force: false,
            delete_parameter_context: false,
            disable_controllers: true,
            delete_orphaned_contexts: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupResult {
    pub process_group_id: Id,
    pub process_group_name: Option<String>,
    pub stopped: bool,
    pub controllers_disabled: bool,
    pub flowfiles_purged: u64,
    pub deleted: bool,
    pub parameter_context_deleted: bool,
    pub orphaned_contexts_deleted: Vec<String>,
    pub warnings: Vec<String>,
    /// Set when the group did not exist
    pub error: Option<String>,
}

/// Contexts bound to no process group and inherited by no other context.
pub fn orphaned_contexts(contexts: &[ParameterContext]) -> Vec<&ParameterContext> {
    let inherited: HashSet<&str> = contexts
        .iter()
        .flat_map(|c| c.inherited_parameter_contexts.iter().map(|r| r.id.as_str()))
        .collect();
    contexts
        .iter()
        .filter(|c| c.bound_process_groups.is_empty() && !inherited.contains(c.id.as_str()))
        .collect()
}

/// Stop, optionally purge and delete a process group, then tidy up its
/// parameter context. A missing group is reported, not raised.
pub async fn cleanup<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
    options: &CleanupOptions,
    wait: DrainWait,
) -> Result<CleanupResult> {
    let mut result = CleanupResult {
        process_group_id: process_group_id.to_string(),
        ..Default::default()
    };

    let found = match api.get_process_group(process_group_id).await {
        Ok(found) => found,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };
    let Some(group) = found else {
        let message = format!("process group {} not found", process_group_id);
        log::warn!("{}; nothing to clean up", message);
        result.error = Some(message);
        if options.delete_orphaned_contexts {
            sweep_orphans(api, &mut result).await;
        }
        return Ok(result);
    };
    result.process_group_name = Some(group.name.clone());

    let stop = stop_flow(api, &group.id, options.disable_controllers, wait).await?;
    result.stopped = stop.stopped;
    result.controllers_disabled = stop.controllers_disabled;

    if options.delete_process_group {
        if options.force {
            let purge = purge_flowfiles(api, &group.id, false, wait).await?;
            result.flowfiles_purged = purge.flowfiles_purged;
        }
        // stopping bumped the revision
        let fresh = require_group(api, &group.id).await?;
        log::info!("Deleting process group '{}'", fresh.name);
        api.delete_process_group(&fresh).await?;
        result.deleted = true;
    }

    if options.delete_parameter_context {
        if let Some(reference) = &group.parameter_context {
            match delete_context(api, &reference.id).await {
                Ok(()) => result.parameter_context_deleted = true,
                Err(e) => {
                    let message = format!(
                        "could not delete parameter context '{}': {}",
                        reference.display_name(),
                        e
                    );
                    log::warn!("{}", message);
                    result.warnings.push(message);
                }
            }
        }
    }

    if options.delete_orphaned_contexts {
        sweep_orphans(api, &mut result).await;
    }
    Ok(result)
}

async fn delete_context<S: NifiApi + ?Sized>(api: &S, id: &str) -> Result<()> {
    let context = api
        .get_parameter_context(id)
        .await?
        .ok_or_else(|| NifiError::not_found(format!("parameter context {}", id)))?;
    log::info!("Deleting parameter context '{}'", context.name);
    api.delete_parameter_context(&context).await
}

async fn sweep_orphans<S: NifiApi + ?Sized>(api: &S, result: &mut CleanupResult) {
    if let Err(e) = delete_orphans(api, result).await {
        let message = format!("orphaned parameter context sweep failed: {}", e);
        log::warn!("{}", message);
        result.warnings.push(message);
    }
}

/// Repeatedly delete orphaned contexts until none are left, since removing
/// one may orphan the contexts it inherited from.
async fn delete_orphans<S: NifiApi + ?Sized>(api: &S, result: &mut CleanupResult) -> Result<()> {
    let mut failed: HashSet<Id> = HashSet::new();
    loop {
        let contexts = api.list_parameter_contexts().await?;
        let candidates: Vec<ParameterContext> = orphaned_contexts(&contexts)
            .into_iter()
            .filter(|c| !failed.contains(&c.id))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        for context in candidates {
            log::info!("Deleting orphaned parameter context '{}'", context.name);
            match api.delete_parameter_context(&context).await {
                Ok(()) => result.orphaned_contexts_deleted.push(context.name.clone()),
                Err(e) => {
                    let message = format!(
                        "could not delete orphaned parameter context '{}': {}",
                        context.name, e
                    );
                    log::warn!("{}", message);
                    result.warnings.push(message);
                    failed.insert(context.id.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSummary {
    pub id: Id,
    pub name: String,
    pub versioned: bool,
    pub version: Option<String>,
    pub state: Option<VersionState>,
    pub running: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListFlowsResult {
    pub count: usize,
    pub flows: Vec<FlowSummary>,
}

/// Process groups directly under the root canvas.
pub async fn list_flows<S: NifiApi + ?Sized>(api: &S) -> Result<ListFlowsResult> {
    let root_id = api.get_root_process_group_id().await?;
    let flows: Vec<FlowSummary> = api
        .list_child_process_groups(&root_id)
        .await?
        .into_iter()
        .map(|g| FlowSummary {
            versioned: g.is_versioned(),
            version: g.version_control.as_ref().and_then(|v| v.version.clone()),
            state: g.version_control.as_ref().map(|v| v.state),
            running: g.running_count,
            id: g.id,
            name: g.name,
        })
        .collect();
    Ok(ListFlowsResult {
        count: flows.len(),
        flows,
    })
}
