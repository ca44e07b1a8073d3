//! Persistence gateway: loads a project's layers into the stage and flushes
//! the stage's pending operations back to the server.
//!
//! Every remote failure is recovered locally. Hydration falls back to the
//! caller's cached layers; a failed commit leaves the queue untouched for the
//! next attempt; the exit flush is fire-and-forget and never clears anything.

use crate::config::GatewayConfig;
use crate::endpoint::{BeaconTransport, DocumentEndpoint, DocumentSource, OperationsBody};
use crate::error::GatewayError;
use crate::host::StageHost;
use crate::notify::{LogNotifier, NoticeLevel, Notifier};
use stage_core::model::LayerEntity;

/// How a hydration resolved its layers.
#[derive(Debug)]
pub enum HydrateOutcome {
    /// The document's explicit layer list.
    Remote { layers: usize },
    /// Converted from the legacy serialized surface.
    Legacy { layers: usize },
    /// The document had neither; the fallback layers were used.
    Fallback { layers: usize },
    /// The fetch failed; the fallback layers were used.
    Failed(GatewayError),
    /// No project is active; the stage was reset to the fallback layers.
    Detached,
}

#[derive(Debug)]
pub enum CommitOutcome {
    /// Nothing to send, or no active project.
    Idle,
    Saved { operations: usize },
    /// The queue was kept for a later retry.
    Failed(GatewayError),
}

impl CommitOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Suppress success and failure notices.
    pub silent: bool,
}

pub struct PersistenceGateway<E, N = LogNotifier> {
    endpoint: E,
    notifier: N,
    config: GatewayConfig,
}

impl<E: DocumentEndpoint> PersistenceGateway<E> {
    pub fn new(endpoint: E, config: GatewayConfig) -> Self {
        Self::with_notifier(endpoint, LogNotifier, config)
    }
}

impl<E: DocumentEndpoint, N: Notifier> PersistenceGateway<E, N> {
    pub fn with_notifier(endpoint: E, notifier: N, config: GatewayConfig) -> Self {
        Self {
            endpoint,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Load `project_id` (or the stage's current project) and make it the
    /// new synced baseline. The pending queue is always cleared.
    pub async fn hydrate<H: StageHost>(
        &self,
        host: &H,
        project_id: Option<&str>,
        fallback: Option<Vec<LayerEntity>>,
    ) -> HydrateOutcome {
        let project_id = match project_id {
            Some(id) => Some(id.to_string()),
            None => host.update(|stage| stage.project_id().map(str::to_string)),
        };
        let Some(project_id) = project_id else {
            log::debug!("hydrate: no active project, resetting stage");
            host.update(|stage| stage.reset(fallback.unwrap_or_default()));
            host.hydrated();
            return HydrateOutcome::Detached;
        };

        host.update(|stage| {
            stage.set_project_id(Some(project_id.clone()));
            stage.set_hydrating(true);
        });

        let (layers, outcome) = match self.endpoint.fetch_document(&project_id).await {
            Ok(document) => match document.into_layers() {
                Some((layers, DocumentSource::Layers)) => {
                    let n = layers.len();
                    (layers, HydrateOutcome::Remote { layers: n })
                }
                Some((layers, DocumentSource::LegacySurface)) => {
                    let n = layers.len();
                    (layers, HydrateOutcome::Legacy { layers: n })
                }
                None => {
                    let layers = fallback.unwrap_or_default();
                    let n = layers.len();
                    (layers, HydrateOutcome::Fallback { layers: n })
                }
            },
            Err(err) => {
                log::warn!("failed to fetch layers for {project_id}: {err}");
                self.notifier
                    .notify(NoticeLevel::Warning, &self.config.notices.load_failed);
                (fallback.unwrap_or_default(), HydrateOutcome::Failed(err))
            }
        };

        host.update(|stage| {
            stage.hydrate(layers);
            stage.set_hydrating(false);
        });
        host.hydrated();
        log::debug!("hydrated {project_id}: {outcome:?}");
        outcome
    }

    /// Send every pending operation as one batch.
    ///
    /// Operations enqueued while the request is in flight stay queued for
    /// the next commit.
    pub async fn commit<H: StageHost>(
        &self,
        host: &H,
        opts: CommitOptions,
    ) -> CommitOutcome {
        let Some(batch) = host.update(|stage| stage.begin_flush()) else {
            return CommitOutcome::Idle;
        };

        match self
            .endpoint
            .push_operations(&batch.project_id, &batch.operations)
            .await
        {
            Ok(()) => {
                host.update(|stage| stage.acknowledge(&batch));
                if !opts.silent && self.config.notify_on_success {
                    self.notifier
                        .notify(NoticeLevel::Success, &self.config.notices.saved);
                }
                CommitOutcome::Saved {
                    operations: batch.operations.len(),
                }
            }
            Err(err) => {
                log::warn!("failed to persist layer operations: {err}");
                if !opts.silent {
                    self.notifier
                        .notify(NoticeLevel::Error, &self.config.notices.save_failed);
                }
                CommitOutcome::Failed(err)
            }
        }
    }

    /// Best-effort send of the pending queue during teardown. The queue is
    /// left as is: a later commit of the same operations is expected.
    pub fn flush_on_exit<H, B>(&self, host: &H, beacon: &B) -> bool
    where
        H: StageHost,
        B: BeaconTransport + ?Sized,
    {
        let Some(batch) = host.update(|stage| stage.begin_flush()) else {
            return false;
        };
        let body = match serde_json::to_string(&OperationsBody {
            operations: &batch.operations,
        }) {
            Ok(body) => body,
            Err(err) => {
                log::error!("failed to encode exit flush: {err}");
                return false;
            }
        };
        let url = self.config.layers_url(&batch.project_id);
        log::debug!("exit flush of {} operations to {url}", batch.operations.len());
        beacon.send(&url, body)
    }
}
