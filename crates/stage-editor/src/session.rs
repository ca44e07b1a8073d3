//! One open document: the stage, its canvas adapter, and its history.
//!
//! Hosts forward surface callbacks and layer-panel actions here; the session
//! decides when the stage reconciles, when write-back runs, and when a
//! history snapshot is taken.

use crate::adapter::{CanvasAdapter, SurfaceSync};
use crate::config::StageConfig;
use crate::history::HistoryManager;
use crate::store::{LayerStage, MutationOptions};
use crate::surface::DrawingSurface;
use stage_core::model::{LayerEntity, LayerPatch};
use stage_core::{GroupId, LayerId};

pub struct EditorSession<S: DrawingSurface> {
    stage: LayerStage,
    adapter: CanvasAdapter<S>,
    history: HistoryManager,
}

impl<S: DrawingSurface> EditorSession<S> {
    pub fn new(surface: S, config: &StageConfig) -> Self {
        Self::with_stage(LayerStage::new(), surface, config)
    }

    /// A session over an existing stage. The surface's current contents
    /// become the first history entry.
    pub fn with_stage(stage: LayerStage, surface: S, config: &StageConfig) -> Self {
        let adapter = CanvasAdapter::new(surface);
        let mut history = HistoryManager::new(config.history_depth);
        history.push_snapshot(adapter.snapshot(&stage));
        Self {
            stage,
            adapter,
            history,
        }
    }

    pub fn stage(&self) -> &LayerStage {
        &self.stage
    }

    /// Direct stage access for integrations. Call [`EditorSession::sync`]
    /// afterwards so write-back runs.
    pub fn stage_mut(&mut self) -> &mut LayerStage {
        &mut self.stage
    }

    pub fn surface(&self) -> &S {
        self.adapter.surface()
    }

    /// Native access, as a user would interact. Call [`EditorSession::sync`]
    /// afterwards so the stage reconciles.
    pub fn surface_mut(&mut self) -> &mut S {
        self.adapter.surface_mut()
    }

    pub fn adapter(&self) -> &CanvasAdapter<S> {
        &self.adapter
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    // ─── Event pump ──────────────────────────────────────────────────────

    /// Reconcile pending surface events, snapshot settled edits into the
    /// history, then write stage changes back onto the surface.
    pub fn sync(&mut self) -> SurfaceSync {
        let sync = self.adapter.handle_surface_events(&mut self.stage);
        if sync == SurfaceSync::Settled {
            self.history.push_snapshot(self.adapter.snapshot(&self.stage));
        }
        self.write_back();
        sync
    }

    fn write_back(&mut self) {
        let applied = self.adapter.apply_stage_changes(&mut self.stage);
        if applied.hydrated {
            self.history.reset(self.adapter.snapshot(&self.stage));
        }
    }

    /// Replace the document with a freshly loaded baseline.
    pub fn hydrate(&mut self, layers: Vec<LayerEntity>) {
        self.stage.hydrate(layers);
        self.write_back();
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    pub fn begin_gesture(&mut self) {
        self.sync();
        self.adapter.begin_gesture();
    }

    /// Close a gesture. The outermost close takes one history snapshot if
    /// anything changed during the gesture.
    pub fn end_gesture(&mut self) {
        self.sync();
        if self.adapter.end_gesture() {
            self.history.push_snapshot(self.adapter.snapshot(&self.stage));
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        self.sync();
        let moved = self.history.undo(&mut self.adapter, &mut self.stage);
        self.write_back();
        moved
    }

    pub fn redo(&mut self) -> bool {
        self.sync();
        let moved = self.history.redo(&mut self.adapter, &mut self.stage);
        self.write_back();
        moved
    }

    pub fn restore(&mut self, index: usize) -> bool {
        self.sync();
        let moved = self.history.restore(index, &mut self.adapter, &mut self.stage);
        self.write_back();
        moved
    }

    // ─── Layer panel ─────────────────────────────────────────────────────

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) {
        self.update_layer(
            id,
            LayerPatch {
                visible: Some(visible),
                ..Default::default()
            },
        );
    }

    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f64) {
        self.update_layer(
            id,
            LayerPatch {
                opacity: Some(opacity),
                ..Default::default()
            },
        );
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) {
        self.update_layer(
            id,
            LayerPatch {
                locked: Some(locked),
                ..Default::default()
            },
        );
    }

    /// Flip a layer's lock. Returns the new state, `None` for unknown ids.
    pub fn toggle_lock(&mut self, id: LayerId) -> Option<bool> {
        let locked = !self.stage.layer(id)?.locked;
        self.set_layer_locked(id, locked);
        Some(locked)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) {
        self.update_layer(
            id,
            LayerPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        );
    }

    pub fn reorder_layer(&mut self, id: LayerId, order: f64) {
        self.sync();
        self.stage.reorder_layer(id, order, MutationOptions::default());
        self.write_back();
    }

    pub fn set_group_opacity(&mut self, id: GroupId, opacity: f64) {
        self.sync();
        self.stage
            .set_group_opacity(id, opacity, MutationOptions::default());
        self.write_back();
    }

    pub fn set_group_visibility(&mut self, id: GroupId, visible: bool) {
        self.sync();
        self.stage
            .set_group_visibility(id, visible, MutationOptions::default());
        self.write_back();
    }

    /// Select a layer. Locked and unknown layers cannot be selected.
    pub fn select(&mut self, id: Option<LayerId>) -> bool {
        let allowed = id.is_none_or(|id| self.stage.layer(id).is_some_and(|l| !l.locked));
        if allowed {
            self.adapter.select(id);
        }
        allowed
    }

    fn update_layer(&mut self, id: LayerId, patch: LayerPatch) {
        self.sync();
        self.stage.update_layer(id, patch, MutationOptions::default());
        self.write_back();
    }
}
