//! Browser-side persistence: host-provided fetch callbacks, host toasts, and
//! `navigator.sendBeacon` for the exit flush.

use async_trait::async_trait;
use js_sys::{Function, Promise};
use stage_core::model::LayerStageOperation;
use stage_sync::endpoint::OperationsBody;
use stage_sync::error::Result;
use stage_sync::{
    BeaconTransport, DocumentEndpoint, GatewayError, NoticeLevel, Notifier, RemoteDocument,
};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Endpoint whose requests are performed by the host.
///
/// `fetch(projectId)` resolves to the document JSON string; `push(projectId,
/// body)` resolves once the server accepted the batch. A rejection of either
/// promise is a failed request.
pub struct JsEndpoint {
    fetch: Function,
    push: Function,
}

impl JsEndpoint {
    pub fn new(fetch: Function, push: Function) -> Self {
        Self { fetch, push }
    }
}

fn js_error(err: JsValue) -> GatewayError {
    GatewayError::Http(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

async fn settle(value: JsValue) -> Result<JsValue> {
    JsFuture::from(Promise::resolve(&value)).await.map_err(js_error)
}

#[async_trait(?Send)]
impl DocumentEndpoint for JsEndpoint {
    async fn fetch_document(&self, project_id: &str) -> Result<RemoteDocument> {
        let pending = self
            .fetch
            .call1(&JsValue::NULL, &JsValue::from_str(project_id))
            .map_err(js_error)?;
        match settle(pending).await?.as_string() {
            Some(body) if !body.trim().is_empty() => Ok(serde_json::from_str(&body)?),
            _ => Ok(RemoteDocument::default()),
        }
    }

    async fn push_operations(
        &self,
        project_id: &str,
        operations: &[LayerStageOperation],
    ) -> Result<()> {
        let body = serde_json::to_string(&OperationsBody { operations })?;
        let pending = self
            .push
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(project_id),
                &JsValue::from_str(&body),
            )
            .map_err(js_error)?;
        settle(pending).await?;
        Ok(())
    }
}

/// Forwards notices to a host callback `(level, message)`.
pub struct JsNotifier {
    callback: Option<Function>,
}

impl JsNotifier {
    pub fn new(callback: Option<Function>) -> Self {
        Self { callback }
    }
}

impl Notifier for JsNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let Some(callback) = &self.callback else {
            stage_sync::LogNotifier.notify(level, message);
            return;
        };
        let level = match level {
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        if let Err(err) = callback.call2(
            &JsValue::NULL,
            &JsValue::from_str(level),
            &JsValue::from_str(message),
        ) {
            log::warn!("notice callback threw: {err:?}");
        }
    }
}

/// `navigator.sendBeacon`.
pub struct NavigatorBeacon;

impl BeaconTransport for NavigatorBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        window
            .navigator()
            .send_beacon_with_opt_str(url, Some(&body))
            .unwrap_or(false)
    }
}
