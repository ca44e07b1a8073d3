use serde::Deserialize;

/// Engine settings for one editor session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageConfig {
    /// Maximum number of history snapshots kept.
    pub history_depth: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self { history_depth: 100 }
    }
}
