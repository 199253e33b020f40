// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - HTTP client for the PicMover server protocol
//
// One method per endpoint. Each call returns the fields the engine
// consumes or a classified AppError; no call retries on its own.

use crate::assets::AssetRecord;
use crate::transport::{
    interpret_outcome, optional_i64_list, require_bool, require_i64, require_str, JsonObject,
    RawResponse,
};
use crate::types::{AppError, ClientSettings, PeerMeta, TaskStatus, UploadTask};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectRequest<'a> {
    client_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UploadRequest<'a> {
    connect_id: i64,
    data: &'a [AssetRecord],
}

/// Client bound to one server
#[derive(Clone)]
pub struct PeerClient {
    http_client: Client,
    base_url: String,
}

impl PeerClient {
    pub fn new(host: &str, settings: &ClientSettings) -> Result<Self, AppError> {
        Self::with_timeout(host, settings.port, settings.request_timeout())
    }

    pub fn for_peer(peer: &PeerMeta, settings: &ClientSettings) -> Result<Self, AppError> {
        Self::new(&peer.host, settings)
    }

    /// `timeout` bounds connecting and each wait for data from the server.
    /// A request that keeps making progress is never cut off, so large
    /// uploads are not limited by it.
    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: format!("http://{}:{}", host, port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /ping, returning the server's name
    pub async fn ping(&self) -> Result<String, AppError> {
        let request = self.http_client.get(self.url("/ping"));
        let response = self.execute(request).await?;

        // Discovery accepts any non-error status, not just 200
        if !(200..400).contains(&response.status) {
            return Err(AppError::Protocol(format!(
                "Ping answered with code {}",
                response.status
            )));
        }
        let object = interpret_outcome(Ok(RawResponse { status: 200, ..response }))?;
        Ok(require_str(&object, "Name")?.to_string())
    }

    /// POST /connect, returning the connect id
    pub async fn connect(&self, client_name: &str) -> Result<i64, AppError> {
        let request = self
            .http_client
            .post(self.url("/connect"))
            .json(&ConnectRequest { client_name });
        let object = self.call(request).await?;
        require_i64(&object, "ConnectId")
    }

    /// GET /status?ConnectId=, returning whether the server approved us
    pub async fn connection_status(&self, connect_id: i64) -> Result<bool, AppError> {
        let request = self
            .http_client
            .get(self.url("/status"))
            .query(&[("ConnectId", connect_id)]);
        let object = self.call(request).await?;
        require_bool(&object, "Approved")
    }

    /// POST /upload, returning the task id to poll
    pub async fn upload_batch(
        &self,
        connect_id: i64,
        records: &[AssetRecord],
    ) -> Result<i64, AppError> {
        let request = self
            .http_client
            .post(self.url("/upload"))
            .json(&UploadRequest {
                connect_id,
                data: records,
            });
        let object = self.call(request).await?;
        require_i64(&object, "TaskId")
    }

    /// GET /status?TaskId=
    pub async fn task_status(&self, task_id: i64) -> Result<UploadTask, AppError> {
        let request = self
            .http_client
            .get(self.url("/status"))
            .query(&[("TaskId", task_id)]);
        let object = self.call(request).await?;

        let raw_status = require_str(&object, "Status")?;
        let status = TaskStatus::from_wire(raw_status);
        if status == TaskStatus::Pending && raw_status != "Pending" {
            tracing::warn!("Task {} reported unknown status {:?}", task_id, raw_status);
        }

        let result = match status {
            TaskStatus::Pending => Vec::new(),
            TaskStatus::Finished => optional_i64_list(&object, "Result").unwrap_or_else(|| {
                tracing::warn!("Task {} finished without a Result list", task_id);
                Vec::new()
            }),
        };

        Ok(UploadTask {
            task_id,
            status,
            result,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call(&self, request: RequestBuilder) -> Result<JsonObject, AppError> {
        interpret_outcome(self.execute(request).await)
    }

    /// Run a request and collect its status and body
    async fn execute(&self, request: RequestBuilder) -> Result<RawResponse, AppError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                AppError::Transport(format!("Cannot connect to {} - {}", self.base_url, e))
            } else if e.is_timeout() {
                AppError::Transport(format!("Connection timed out to {}", self.base_url))
            } else {
                AppError::Transport(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        tracing::debug!("{} answered {}", response.url(), status);

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
