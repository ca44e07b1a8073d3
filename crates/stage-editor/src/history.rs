//! Snapshot undo/redo for the drawing surface.
//!
//! History is a linear list of full surface snapshots plus a cursor. Undo and
//! redo move the cursor and load the snapshot at it. Loading raises surface
//! events like any user edit, so the stage reconciles and enqueues the
//! compensating operations; the `restoring` flag only keeps the load itself
//! from being pushed back onto the history.
//!
//! Snapshots hold each layer's own visibility and opacity (see
//! [`CanvasAdapter::snapshot`]), so undo never brings back the group
//! settings that were active when the snapshot was taken.

use crate::adapter::CanvasAdapter;
use crate::store::LayerStage;
use crate::surface::DrawingSurface;
use stage_core::surface::SurfaceSnapshot;

pub struct HistoryManager {
    entries: Vec<SurfaceSnapshot>,
    /// Index of the current entry, `None` while empty.
    index: Option<usize>,
    /// Maximum number of entries kept.
    max_depth: usize,
    restoring: bool,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            max_depth: max_depth.max(1),
            restoring: false,
        }
    }

    /// Record a snapshot of the settled surface.
    ///
    /// Skipped while a restore is in progress. An empty snapshot is only
    /// recorded as the very first entry. Entries after the cursor are
    /// discarded and the oldest entries are trimmed beyond `max_depth`.
    pub fn push_snapshot(&mut self, snapshot: SurfaceSnapshot) -> bool {
        if self.restoring {
            return false;
        }
        if !self.entries.is_empty() && snapshot.is_empty() {
            return false;
        }

        self.entries.truncate(self.index.map_or(0, |i| i + 1));
        self.entries.push(snapshot);
        if self.entries.len() > self.max_depth {
            let excess = self.entries.len() - self.max_depth;
            self.entries.drain(..excess);
        }
        self.index = Some(self.entries.len() - 1);
        true
    }

    /// Drop every entry and start over from `snapshot`.
    pub fn reset(&mut self, snapshot: SurfaceSnapshot) {
        self.entries.clear();
        self.index = None;
        self.push_snapshot(snapshot);
    }

    /// Load the entry at `index` onto the surface and reconcile the stage.
    /// Out-of-range indexes are ignored.
    pub fn restore<S: DrawingSurface>(
        &mut self,
        index: usize,
        adapter: &mut CanvasAdapter<S>,
        stage: &mut LayerStage,
    ) -> bool {
        let Some(snapshot) = self.entries.get(index) else {
            log::debug!("history: restore index {index} out of range");
            return false;
        };

        self.restoring = true;
        adapter.load_snapshot(snapshot);
        adapter.handle_surface_events(stage);
        self.restoring = false;

        self.index = Some(index);
        true
    }

    pub fn undo<S: DrawingSurface>(
        &mut self,
        adapter: &mut CanvasAdapter<S>,
        stage: &mut LayerStage,
    ) -> bool {
        match self.index {
            Some(i) if i > 0 => self.restore(i - 1, adapter, stage),
            _ => false,
        }
    }

    pub fn redo<S: DrawingSurface>(
        &mut self,
        adapter: &mut CanvasAdapter<S>,
        stage: &mut LayerStage,
    ) -> bool {
        match self.index {
            Some(i) if i + 1 < self.entries.len() => self.restore(i + 1, adapter, stage),
            _ => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&SurfaceSnapshot> {
        self.entries.get(self.index?)
    }
}
