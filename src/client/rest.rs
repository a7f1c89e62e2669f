use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::client::traits::{
    DeployRequest, ParameterContextApi, ProcessGroupApi, QueueApi, RegistryApi, VersioningApi,
};
use crate::client::wire::*;
use crate::config::NifiConfig;
use crate::error::{NifiError, Result};
use crate::model::{
    generate_id, Asset, Bucket, Connection, ControllerServiceState, DropResult, FlowVersion, Id,
    Parameter, ParameterContext, ProcessGroup, ProcessGroupStatus, RegistryClient, Revision,
    ScheduledState, VersionControlInformation, VersionedFlow,
};

/// NiFi REST client. One instance is built per CLI invocation from an
/// explicit [`NifiConfig`]; it holds no state besides the bearer token.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    token: Option<String>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl RestClient {
    /// Build the HTTP client and, when credentials are configured, obtain a
    /// bearer token from `POST /access/token`
    pub async fn connect(config: &NifiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl);

        if let Some(ca_cert) = &config.ca_cert {
            let pem = tokio::fs::read(ca_cert).await?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        let mut client = Self {
            http: builder.build()?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: generate_id(),
            token: config.bearer_token.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            client.token = Some(client.login(username, password).await?);
        }

        log::debug!("Connected to {} as client {}", client.base_url, client.client_id);
        Ok(client)
    }

    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/access/token"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.text().await?.trim().to_string())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(NifiError::NotFound(message));
        }
        Err(NifiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// GET that maps 404 to `None`
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(NifiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(method, path).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_with_revision(&self, path: &str, revision: &Revision) -> Result<()> {
        let response = self
            .request(Method::DELETE, path)
            .query(&[
                ("version", revision.version.to_string()),
                ("clientId", self.client_id.clone()),
            ])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Best-effort removal of a finished asynchronous request
    async fn discard(&self, path: &str) {
        if let Err(e) = self.request(Method::DELETE, path).send().await {
            log::debug!("Failed to delete request {}: {}", path, e);
        }
    }

    /// Poll `step` until it yields a value or the wait timeout elapses
    async fn poll_until<T, F, Fut>(&self, what: &str, mut step: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        loop {
            if let Some(value) = step().await? {
                return Ok(value);
            }
            if started.elapsed() >= self.wait_timeout {
                return Err(NifiError::Timeout(format!(
                    "{} did not complete within {}s",
                    what,
                    self.wait_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submit an update/revert request and block until it completes.
    async fn run_async_request<B: Serialize + ?Sized>(
        &self,
        what: &str,
        submit_path: &str,
        status_path: impl Fn(&str) -> String,
        body: &B,
    ) -> Result<()> {
        let submitted: AsyncRequestEntity = self.send_json(Method::POST, submit_path, body).await?;
        let path = status_path(&submitted.request.request_id);

        let status = path.as_str();
        let outcome = self
            .poll_until(what, move || async move {
                let current: AsyncRequestEntity = self.get_json(status).await?;
                log::debug!(
                    "{} {}% ({})",
                    what,
                    current.request.percent_completed,
                    current.request.state.as_deref().unwrap_or("")
                );
                Ok(current.request.complete.then_some(current.request))
            })
            .await;

        self.discard(&path).await;

        let request = outcome?;
        match request.failure_reason {
            Some(reason) if !reason.is_empty() => Err(NifiError::Api {
                status: 409,
                message: format!("{} failed: {}", what, reason),
            }),
            _ => Ok(()),
        }
    }

    async fn refreshed_version_control(&self, group_id: &str) -> Result<VersionControlInformation> {
        self.get_process_group(group_id)
            .await?
            .and_then(|pg| pg.version_control)
            .ok_or_else(|| {
                NifiError::not_found(format!("version control information for {}", group_id))
            })
    }
}

#[async_trait::async_trait]
impl ProcessGroupApi for RestClient {
    async fn get_root_process_group_id(&self) -> Result<Id> {
        let flow: ProcessGroupFlowEntity = self.get_json("/flow/process-groups/root").await?;
        Ok(flow.process_group_flow.id)
    }

    async fn get_process_group(&self, id: &str) -> Result<Option<ProcessGroup>> {
        let entity: Option<ProcessGroupEntity> =
            self.get_optional(&format!("/process-groups/{}", id)).await?;
        Ok(entity.map(ProcessGroupEntity::into_model))
    }

    async fn list_child_process_groups(&self, parent_id: &str) -> Result<Vec<ProcessGroup>> {
        let entity: ProcessGroupsEntity = self
            .get_json(&format!("/process-groups/{}/process-groups", parent_id))
            .await?;
        Ok(entity
            .process_groups
            .into_iter()
            .map(ProcessGroupEntity::into_model)
            .collect())
    }

    async fn get_process_group_status(&self, id: &str) -> Result<ProcessGroupStatus> {
        let entity: ProcessGroupStatusEntity = self
            .get_json(&format!("/flow/process-groups/{}/status?recursive=false", id))
            .await?;
        Ok(entity.into())
    }

    async fn schedule_process_group(&self, id: &str, state: ScheduledState) -> Result<()> {
        let body = ScheduleEntity {
            id: id.to_string(),
            state: state.as_str().to_string(),
        };
        let _: serde_json::Value = self
            .send_json(Method::PUT, &format!("/flow/process-groups/{}", id), &body)
            .await?;
        Ok(())
    }

    async fn set_controller_services_state(
        &self,
        id: &str,
        state: ControllerServiceState,
    ) -> Result<()> {
        let body = ScheduleEntity {
            id: id.to_string(),
            state: state.as_str().to_string(),
        };
        let _: serde_json::Value = self
            .send_json(
                Method::PUT,
                &format!("/flow/process-groups/{}/controller-services", id),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn delete_process_group(&self, group: &ProcessGroup) -> Result<()> {
        self.delete_with_revision(&format!("/process-groups/{}", group.id), &group.revision)
            .await
    }
}

#[async_trait::async_trait]
impl ParameterContextApi for RestClient {
    async fn get_parameter_context(&self, id: &str) -> Result<Option<ParameterContext>> {
        let entity: Option<ParameterContextEntity> = self
            .get_optional(&format!("/parameter-contexts/{}", id))
            .await?;
        Ok(entity.map(ParameterContextEntity::into_model))
    }

    async fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>> {
        let entity: ParameterContextsEntity = self.get_json("/flow/parameter-contexts").await?;
        Ok(entity
            .parameter_contexts
            .into_iter()
            .map(ParameterContextEntity::into_model)
            .collect())
    }

    async fn update_parameter_context(
        &self,
        context: &ParameterContext,
        parameters: Vec<Parameter>,
    ) -> Result<ParameterContext> {
        let body = ParameterContextEntity::for_update(context, &parameters, &self.client_id);
        let context_id = context.id.clone();
        self.run_async_request(
            &format!("parameter context update of '{}'", context.name),
            &format!("/parameter-contexts/{}/update-requests", context.id),
            |request_id| {
                format!("/parameter-contexts/{}/update-requests/{}", context_id, request_id)
            },
            &body,
        )
        .await?;

        self.get_parameter_context(&context.id)
            .await?
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", context.id)))
    }

    async fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()> {
        self.delete_with_revision(
            &format!("/parameter-contexts/{}", context.id),
            &context.revision,
        )
        .await
    }

    async fn upload_asset(
        &self,
        context_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<Asset> {
        let digest = hex::encode(Sha256::digest(&content));
        let response = self
            .request(
                Method::POST,
                &format!("/parameter-contexts/{}/assets", context_id),
            )
            .header("Filename", file_name)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;
        let entity: AssetEntity = Self::check(response).await?.json().await?;
        Ok(entity.into_model(context_id, digest))
    }
}

#[async_trait::async_trait]
impl VersioningApi for RestClient {
    async fn update_flow_version(
        &self,
        group: &ProcessGroup,
        version: &str,
    ) -> Result<VersionControlInformation> {
        let vci = group.version_control.as_ref().ok_or_else(|| {
            NifiError::configuration(format!(
                "process group {} is not under version control",
                group.id
            ))
        })?;
        let body = VersionControlInformationEntity {
            process_group_revision: RevisionDto::for_write(&group.revision, &self.client_id),
            version_control_information: VersionControlInformationDto::targeting(
                &group.id, vci, version,
            ),
        };
        self.run_async_request(
            &format!("version change of '{}'", group.name),
            &format!("/versions/update-requests/process-groups/{}", group.id),
            |request_id| format!("/versions/update-requests/{}", request_id),
            &body,
        )
        .await?;
        self.refreshed_version_control(&group.id).await
    }

    async fn revert_local_changes(
        &self,
        group: &ProcessGroup,
    ) -> Result<VersionControlInformation> {
        let vci = group.version_control.as_ref().ok_or_else(|| {
            NifiError::configuration(format!(
                "process group {} is not under version control",
                group.id
            ))
        })?;
        let current = vci.version.clone().unwrap_or_default();
        let body = VersionControlInformationEntity {
            process_group_revision: RevisionDto::for_write(&group.revision, &self.client_id),
            version_control_information: VersionControlInformationDto::targeting(
                &group.id, vci, &current,
            ),
        };
        self.run_async_request(
            &format!("revert of '{}'", group.name),
            &format!("/versions/revert-requests/process-groups/{}", group.id),
            |request_id| format!("/versions/revert-requests/{}", request_id),
            &body,
        )
        .await?;
        self.refreshed_version_control(&group.id).await
    }
}

#[async_trait::async_trait]
impl RegistryApi for RestClient {
    async fn list_registry_clients(&self) -> Result<Vec<RegistryClient>> {
        let entity: RegistryClientsEntity =
            self.get_json("/controller/registry-clients").await?;
        Ok(entity
            .registries
            .into_iter()
            .map(RegistryClientEntity::into_model)
            .collect())
    }

    async fn create_registry_client(
        &self,
        name: &str,
        client_type: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<RegistryClient> {
        let body = RegistryClientEntity {
            id: None,
            revision: RevisionDto::for_write(&Revision::new(0), &self.client_id),
            component: RegistryClientDto {
                id: None,
                name: name.to_string(),
                client_type: client_type.to_string(),
                properties: properties.into_iter().map(|(k, v)| (k, Some(v))).collect(),
            },
        };
        let created: RegistryClientEntity = self
            .send_json(Method::POST, "/controller/registry-clients", &body)
            .await?;
        Ok(created.into_model())
    }

    async fn list_buckets(&self, registry_id: &str) -> Result<Vec<Bucket>> {
        let entity: BucketsEntity = self
            .get_json(&format!("/flow/registries/{}/buckets", registry_id))
            .await?;
        Ok(entity.buckets.into_iter().map(Into::into).collect())
    }

    async fn list_flows(&self, registry_id: &str, bucket_id: &str) -> Result<Vec<VersionedFlow>> {
        let entity: VersionedFlowsEntity = self
            .get_json(&format!(
                "/flow/registries/{}/buckets/{}/flows",
                registry_id, bucket_id
            ))
            .await?;
        Ok(entity.versioned_flows.into_iter().map(Into::into).collect())
    }

    async fn list_flow_versions(
        &self,
        registry_id: &str,
        bucket_id: &str,
        flow_id: &str,
    ) -> Result<Vec<FlowVersion>> {
        let entity: SnapshotMetadataSetEntity = self
            .get_json(&format!(
                "/flow/registries/{}/buckets/{}/flows/{}/versions",
                registry_id, bucket_id, flow_id
            ))
            .await?;
        Ok(entity
            .versioned_flow_snapshot_metadata_set
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn deploy_flow(&self, parent_id: &str, request: &DeployRequest) -> Result<ProcessGroup> {
        let body = ProcessGroupEntity {
            id: None,
            revision: RevisionDto::for_write(&Revision::new(0), &self.client_id),
            component: ProcessGroupDto {
                position: Some(request.position),
                version_control_information: Some(VersionControlInformationDto {
                    group_id: None,
                    registry_id: request.registry_id.clone(),
                    bucket_id: request.bucket_id.clone(),
                    flow_id: request.flow_id.clone(),
                    flow_name: None,
                    version: Some(serde_json::Value::String(request.version.clone())),
                    state: None,
                }),
                ..Default::default()
            },
        };
        let created: ProcessGroupEntity = self
            .send_json(
                Method::POST,
                &format!("/process-groups/{}/process-groups", parent_id),
                &body,
            )
            .await?;
        Ok(created.into_model())
    }
}

#[async_trait::async_trait]
impl QueueApi for RestClient {
    async fn list_connections(&self, group_id: &str) -> Result<Vec<Connection>> {
        let entity: ConnectionsEntity = self
            .get_json(&format!("/process-groups/{}/connections", group_id))
            .await?;
        Ok(entity
            .connections
            .into_iter()
            .map(|c| c.into_model(group_id))
            .collect())
    }

    async fn drop_queue(&self, connection_id: &str) -> Result<DropResult> {
        let submitted: DropRequestEntity = self
            .send_json(
                Method::POST,
                &format!("/flowfile-queues/{}/drop-requests", connection_id),
                &serde_json::json!({}),
            )
            .await?;
        let path = format!(
            "/flowfile-queues/{}/drop-requests/{}",
            connection_id, submitted.drop_request.id
        );

        let status = path.as_str();
        let outcome = self
            .poll_until(&format!("drop request on {}", connection_id), move || async move {
                let current: DropRequestEntity = self.get_json(status).await?;
                Ok(current.drop_request.finished.then_some(current.drop_request))
            })
            .await;
        self.discard(&path).await;

        let request = outcome?;
        if let Some(reason) = request.failure_reason.filter(|r| !r.is_empty()) {
            return Err(NifiError::Api {
                status: 409,
                message: format!("drop request on {} failed: {}", connection_id, reason),
            });
        }
        Ok(DropResult {
            connection_id: connection_id.to_string(),
            dropped_count: request.dropped_count,
            dropped_bytes: request.dropped_size,
        })
    }
}
