//! The remote document seam.
//!
//! `GET /projects/{id}` returns a [`RemoteDocument`]; `PATCH
//! /projects/{id}/layers` accepts an [`OperationsBody`]. Exit-time sends go
//! through a [`BeaconTransport`], which can only queue a request and never
//! learns its result.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use stage_core::model::{LayerEntity, LayerStageOperation};
use stage_core::surface::surface_json_to_layers;

/// A stored project document, as far as the layer stage cares.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Explicit layer list. Anything but an array is treated as absent.
    #[serde(default, deserialize_with = "layer_list")]
    pub layers: Option<Vec<LayerEntity>>,
    /// Legacy serialized drawing surface.
    #[serde(default)]
    pub canvas_json: Option<String>,
}

fn layer_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<LayerEntity>>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        items @ serde_json::Value::Array(_) => serde_json::from_value(items)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Where a document's layers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Layers,
    LegacySurface,
}

impl RemoteDocument {
    /// The document's layers: the explicit list when present, else the
    /// converted legacy surface. `None` when the document carries neither.
    pub fn into_layers(self) -> Option<(Vec<LayerEntity>, DocumentSource)> {
        if let Some(layers) = self.layers {
            return Some((layers, DocumentSource::Layers));
        }
        self.canvas_json
            .map(|json| (surface_json_to_layers(&json), DocumentSource::LegacySurface))
    }
}

/// Request body for committing operations.
#[derive(Debug, Serialize)]
pub struct OperationsBody<'a> {
    pub operations: &'a [LayerStageOperation],
}

#[async_trait(?Send)]
pub trait DocumentEndpoint {
    async fn fetch_document(&self, project_id: &str) -> Result<RemoteDocument>;

    /// Send one batch. Success means the server applied every operation.
    async fn push_operations(
        &self,
        project_id: &str,
        operations: &[LayerStageOperation],
    ) -> Result<()>;
}

/// Best-effort, fire-and-forget delivery used while the page tears down.
pub trait BeaconTransport {
    /// Queue `body` for delivery to `url`. Returns whether the transport
    /// accepted it; delivery itself is never confirmed.
    fn send(&self, url: &str, body: String) -> bool;
}
