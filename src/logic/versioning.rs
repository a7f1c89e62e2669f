use serde::Serialize;

use crate::client::traits::NifiApi;
use crate::error::{NifiError, Result};
use crate::logic::git_ref::{resolve_git_ref, GitRefResolver};
use crate::model::{FlowVersion, Id, ProcessGroup, VersionControlInformation, VersionState};

/// Newest version in a registry listing. Timestamps win when present;
/// otherwise the listing order is trusted and the last entry is newest.
pub fn latest_version(versions: &[FlowVersion]) -> Option<&FlowVersion> {
    versions.iter().max_by_key(|v| v.timestamp)
}

pub(crate) async fn versioned_group<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
) -> Result<(ProcessGroup, VersionControlInformation)> {
    let group = api
        .get_process_group(process_group_id)
        .await?
        .ok_or_else(|| NifiError::not_found(format!("process group {}", process_group_id)))?;
    let vci = group.version_control.clone().ok_or_else(|| {
        NifiError::configuration(format!(
            "process group '{}' is not under version control",
            group.name
        ))
    })?;
    Ok((group, vci))
}

/// Resolve the version to move to: a git ref when given, the registry's
/// newest version otherwise.
pub(crate) async fn target_version<S, R>(
    api: &S,
    resolver: &R,
    registry_id: &str,
    bucket_id: &str,
    flow_id: &str,
    requested: Option<&str>,
) -> Result<String>
where
    S: NifiApi + ?Sized,
    R: GitRefResolver + ?Sized,
{
    match requested {
        Some(reference) => resolve_git_ref(resolver, reference).await,
        None => {
            let versions = api.list_flow_versions(registry_id, bucket_id, flow_id).await?;
            latest_version(&versions)
                .map(|v| v.version.clone())
                .ok_or_else(|| NifiError::not_found(format!("any version of flow {}", flow_id)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeVersionResult {
    pub process_group_id: Id,
    pub process_group_name: String,
    pub previous_version: Option<String>,
    pub new_version: Option<String>,
    pub state: VersionState,
}

/// Move a versioned process group to another version. `version` may be a
/// branch, tag or commit SHA; `None` means the newest registry version.
pub async fn change_version<S, R>(
    api: &S,
    resolver: &R,
    process_group_id: &str,
    version: Option<&str>,
) -> Result<ChangeVersionResult>
where
    S: NifiApi + ?Sized,
    R: GitRefResolver + ?Sized,
{
    let (group, vci) = versioned_group(api, process_group_id).await?;
    let target = target_version(
        api,
        resolver,
        &vci.registry_id,
        &vci.bucket_id,
        &vci.flow_id,
        version,
    )
    .await?;

    if vci.state.is_locally_modified() {
        log::warn!(
            "'{}' has local modifications; changing version may fail or discard them",
            group.name
        );
    }
    log::info!(
        "Changing '{}' from {} to {}",
        group.name,
        vci.version.as_deref().unwrap_or("none"),
        target
    );
    let updated = api.update_flow_version(&group, &target).await?;

    Ok(ChangeVersionResult {
        process_group_id: group.id,
        process_group_name: group.name,
        previous_version: vci.version,
        new_version: updated.version,
        state: updated.state,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevertResult {
    pub process_group_id: Id,
    pub process_group_name: String,
    pub previous_state: VersionState,
    pub state: VersionState,
    pub version: Option<String>,
}

/// Discard local modifications of a versioned process group.
pub async fn revert_flow<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
) -> Result<RevertResult> {
    let (group, vci) = versioned_group(api, process_group_id).await?;
    if !vci.state.is_locally_modified() {
        log::warn!(
            "'{}' is {} and has no local changes to revert",
            group.name,
            vci.state
        );
    }
    let reverted = api.revert_local_changes(&group).await?;
    log::info!("Reverted '{}', now {}", group.name, reverted.state);

    Ok(RevertResult {
        process_group_id: group.id,
        process_group_name: group.name,
        previous_state: vci.state,
        state: reverted.state,
        version: reverted.version,
    })
}
