use std::path::PathBuf;

use serde::Serialize;

use crate::client::traits::NifiApi;
use crate::error::{NifiError, Result};
use crate::model::{Id, Parameter};

#[derive(Debug, Clone)]
pub struct UploadAssetRequest {
    /// Target context; falls back to the context bound to `process_group_id`
    pub parameter_context_id: Option<Id>,
    pub process_group_id: Option<Id>,
    pub file_path: PathBuf,
    /// Name to store the asset under; the file name when absent
    pub asset_name: Option<String>,
    /// Parameter to point at the uploaded asset
    pub parameter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadAssetResult {
    pub asset_id: Id,
    pub asset_name: String,
    pub asset_digest: String,
    pub parameter_context_id: Id,
    pub parameter_name: Option<String>,
    pub parameter_updated: bool,
}

/// Upload a file as an asset of a parameter context and optionally bind
/// it to a parameter.
pub async fn upload_asset<S: NifiApi + ?Sized>(
    api: &S,
    request: &UploadAssetRequest,
) -> Result<UploadAssetResult> {
    let context_id = match (&request.parameter_context_id, &request.process_group_id) {
        (Some(id), _) => id.clone(),
        (None, Some(group_id)) => {
            let group = api
                .get_process_group(group_id)
                .await?
                .ok_or_else(|| NifiError::not_found(format!("process group {}", group_id)))?;
            group
                .parameter_context
                .map(|c| c.id)
                .ok_or_else(|| {
                    NifiError::configuration(format!(
                        "process group '{}' has no parameter context",
                        group.name
                    ))
                })?
        }
        (None, None) => {
            return Err(NifiError::input(
                "either a parameter context or a process group is required",
            ))
        }
    };

    let asset_name = match &request.asset_name {
        Some(name) => name.clone(),
        None => request
            .file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                NifiError::input(format!("{} has no file name", request.file_path.display()))
            })?,
    };
    let content = tokio::fs::read(&request.file_path).await.map_err(|e| {
        NifiError::input(format!("cannot read {}: {}", request.file_path.display(), e))
    })?;

    log::info!(
        "Uploading {} ({} bytes) to parameter context {}",
        asset_name,
        content.len(),
        context_id
    );
    let asset = api.upload_asset(&context_id, &asset_name, content).await?;

    let mut parameter_updated = false;
    if let Some(parameter_name) = &request.parameter_name {
        let context = api
            .get_parameter_context(&context_id)
            .await?
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", context_id)))?;
        let sensitive = context
            .get_parameter(parameter_name)
            .map(|p| p.sensitive)
            .unwrap_or(false);
        let parameter = Parameter {
            sensitive,
            ..Parameter::new(parameter_name.clone(), "").with_asset(asset.reference())
        };
        log::info!("Binding '{}' to asset {}", parameter_name, asset.name);
        api.update_parameter_context(&context, vec![parameter]).await?;
        parameter_updated = true;
    }

    Ok(UploadAssetResult {
        asset_id: asset.id,
        asset_name: asset.name,
        asset_digest: asset.digest,
        parameter_context_id: context_id,
        parameter_name: request.parameter_name.clone(),
        parameter_updated,
    })
}
