//! Native HTTP transport: a reqwest-backed endpoint and a tokio-spawned
//! beacon for exit-time sends.

use crate::config::GatewayConfig;
use crate::endpoint::{BeaconTransport, DocumentEndpoint, OperationsBody, RemoteDocument};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use stage_core::model::LayerStageOperation;
use std::time::Duration;

pub struct HttpEndpoint {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpEndpoint {
    /// # Errors
    /// Returns [`GatewayError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// A beacon sharing this endpoint's connection pool.
    pub fn beacon(&self) -> HttpBeacon {
        HttpBeacon {
            client: self.client.clone(),
        }
    }
}

#[async_trait(?Send)]
impl DocumentEndpoint for HttpEndpoint {
    async fn fetch_document(&self, project_id: &str) -> Result<RemoteDocument> {
        let url = self.config.document_url(project_id);
        log::debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NoDocument(project_id.to_string()));
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(RemoteDocument::default());
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn push_operations(
        &self,
        project_id: &str,
        operations: &[LayerStageOperation],
    ) -> Result<()> {
        let url = self.config.layers_url(project_id);
        log::debug!("PATCH {url} ({} operations)", operations.len());
        let response = self
            .client
            .patch(&url)
            .json(&OperationsBody { operations })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Spawns the send onto the ambient tokio runtime and forgets it.
#[derive(Clone)]
pub struct HttpBeacon {
    client: reqwest::Client,
}

impl BeaconTransport for HttpBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("beacon to {url} dropped: no tokio runtime");
            return false;
        };
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let url = url.to_string();
        runtime.spawn(async move {
            if let Err(err) = request.send().await {
                log::debug!("beacon to {url} failed: {err}");
            }
        });
        true
    }
}
