use serde::Deserialize;

/// Environment variable overriding [`GatewayConfig::base_url`].
pub const API_URL_ENV: &str = "LAYER_STAGE_API_URL";
/// Environment variable overriding [`GatewayConfig::request_timeout_ms`].
pub const TIMEOUT_ENV: &str = "LAYER_STAGE_TIMEOUT_MS";

/// Settings for the persistence gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// API root; documents live under `{base_url}/projects/{id}`.
    pub base_url: String,
    /// Per-request timeout for the native HTTP endpoint.
    pub request_timeout_ms: u64,
    /// Show the success notice after a non-silent commit.
    pub notify_on_success: bool,
    pub notices: NoticeText,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
            notify_on_success: true,
            notices: NoticeText::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `LAYER_STAGE_API_URL` / `LAYER_STAGE_TIMEOUT_MS`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(raw) = var(TIMEOUT_ENV) {
            match raw.trim().parse() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => log::warn!("ignoring {TIMEOUT_ENV}={raw:?}: not a number"),
            }
        }
        self
    }

    /// `GET` target for a project's document.
    pub fn document_url(&self, project_id: &str) -> String {
        format!("{}/projects/{project_id}", self.base_url.trim_end_matches('/'))
    }

    /// `PATCH` (commit) and `POST` (exit beacon) target for operations.
    pub fn layers_url(&self, project_id: &str) -> String {
        format!("{}/layers", self.document_url(project_id))
    }
}

/// User-facing notice texts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoticeText {
    pub saved: String,
    pub save_failed: String,
    pub load_failed: String,
}

impl Default for NoticeText {
    fn default() -> Self {
        Self {
            saved: "Layers saved".to_string(),
            save_failed: "Failed to save layers. Changes are kept locally.".to_string(),
            load_failed: "Unable to load layers from server. Using cached data where available."
                .to_string(),
        }
    }
}
