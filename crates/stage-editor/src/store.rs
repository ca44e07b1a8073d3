//! The layer stage: authoritative in-memory document for one open project.
//!
//! The stage owns three things and is their only writer:
//!
//! - **Layers**: the live, ordered layer list.
//! - **Groups**: always re-derived from the layers after every mutation.
//! - **Pending operations**: the append-only queue of committed mutations
//!   not yet persisted. Silent mutations change live state but never enqueue.
//!
//! Every mutation also records a [`StageChange`] in an outbox that the canvas
//! adapter drains to write visual state back onto the drawing surface.

use stage_core::groups::derive_groups;
use stage_core::model::*;
use stage_core::{GroupId, LayerId};
use std::collections::{HashMap, HashSet};

/// Options for layer and group mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Update live state without enqueueing an operation.
    pub silent: bool,
}

impl MutationOptions {
    pub const SILENT: Self = Self { silent: true };
}

/// Options for [`LayerStage::register_group`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Replace an existing group with the same id.
    pub overwrite: bool,
}

/// What changed in the stage, for consumers that mirror it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageChange {
    /// Layer membership, order, or content changed.
    Layers,
    /// A layer's name, order, visibility, opacity, or lock changed through
    /// the stage API (not through surface reconciliation).
    LayerProps(LayerId),
    /// A group's opacity or visibility changed.
    GroupVisuals(GroupId),
    /// A group was registered or replaced.
    Groups,
    /// The whole document was replaced by hydration.
    Hydrated,
}

/// Operations captured by value for one flush, with the queue watermark they
/// were captured at.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBatch {
    pub project_id: String,
    pub operations: Vec<LayerStageOperation>,
    /// Sequence number one past the last captured operation.
    through: u64,
}

pub struct LayerStage {
    layers: Vec<LayerEntity>,
    groups: Vec<LayerGroupState>,
    pending: Vec<LayerStageOperation>,
    /// Sequence number of `pending[0]`.
    pending_base: u64,
    project_id: Option<String>,
    hydrating: bool,
    changes: Vec<StageChange>,
    revision: u64,
}

impl Default for LayerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStage {
    /// An empty stage with the default group buckets.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            groups: derive_groups(&[], &[]),
            pending: Vec::new(),
            pending_base: 0,
            project_id: None,
            hydrating: false,
            changes: Vec::new(),
            revision: 0,
        }
    }

    /// A stage for `project_id` seeded from locally cached state.
    pub fn with_snapshot(project_id: Option<String>, snapshot: LayerStageSnapshot) -> Self {
        let layers = coerce_layers(snapshot.layers);
        let groups = derive_groups(&layers, &snapshot.groups);
        Self {
            layers,
            groups,
            project_id,
            ..Self::new()
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn layers(&self) -> &[LayerEntity] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerEntity> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn groups(&self) -> &[LayerGroupState] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&LayerGroupState> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Layers of one group, in group order.
    pub fn group_layers(&self, id: GroupId) -> Vec<&LayerEntity> {
        self.group(id)
            .map(|g| g.layer_ids.iter().filter_map(|lid| self.layer(*lid)).collect())
            .unwrap_or_default()
    }

    pub fn pending_operations(&self) -> &[LayerStageOperation] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn set_project_id(&mut self, project_id: Option<String>) {
        self.project_id = project_id;
    }

    pub fn is_hydrating(&self) -> bool {
        self.hydrating
    }

    pub fn set_hydrating(&mut self, hydrating: bool) {
        self.hydrating = hydrating;
    }

    /// Bumped on every mutation, silent or not.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> LayerStageSnapshot {
        LayerStageSnapshot {
            layers: self.layers.clone(),
            groups: self.groups.clone(),
        }
    }

    /// Take every change recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<StageChange> {
        std::mem::take(&mut self.changes)
    }

    // ─── Layer mutations ─────────────────────────────────────────────────

    /// Coerce and insert a layer. An omitted `order` becomes one past the
    /// current maximum. An id that already exists is merged as an update.
    pub fn add_layer(&mut self, draft: LayerDraft) -> LayerEntity {
        let mut draft = draft;
        if draft.order.is_none() {
            draft.order = Some(
                self.layers
                    .iter()
                    .map(|l| l.order)
                    .reduce(f64::max)
                    .map_or(0.0, |max| max + 1.0),
            );
        }
        let layer = draft.coerce();

        if let Some(existing) = self.layers.iter_mut().find(|l| l.id == layer.id) {
            log::warn!("add_layer: {} already exists, merging", layer.id);
            let changes = LayerPatch::between(existing, &layer);
            *existing = layer.clone();
            self.sort_layers();
            self.after_layers_changed();
            if !changes.is_empty() {
                self.enqueue(LayerStageOperation::UpdateLayer {
                    id: layer.id,
                    changes,
                });
            }
            return layer;
        }

        self.layers.push(layer.clone());
        self.sort_layers();
        self.after_layers_changed();
        self.enqueue(LayerStageOperation::AddLayer {
            layer: layer.clone(),
        });
        layer
    }

    /// Merge `changes` into the layer with `id`. Unknown ids are ignored.
    pub fn update_layer(&mut self, id: LayerId, changes: LayerPatch, opts: MutationOptions) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            log::debug!("update_layer: unknown layer {id}");
            return;
        };
        layer.apply(&changes);
        let reordered = changes.order.is_some();
        if reordered {
            self.sort_layers();
        }
        if changes.touches_visuals() || changes.name.is_some() || reordered {
            self.note(StageChange::LayerProps(id));
        }
        self.after_layers_changed();
        if !opts.silent {
            self.enqueue(LayerStageOperation::UpdateLayer { id, changes });
        }
    }

    /// Remove the layer with `id`. Unknown ids are ignored.
    pub fn remove_layer(&mut self, id: LayerId, opts: MutationOptions) {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            log::debug!("remove_layer: unknown layer {id}");
            return;
        }
        self.after_layers_changed();
        if !opts.silent {
            self.enqueue(LayerStageOperation::RemoveLayer { id });
        }
    }

    /// Set a layer's order, then stable-sort the whole list by order.
    pub fn reorder_layer(&mut self, id: LayerId, order: f64, opts: MutationOptions) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            log::debug!("reorder_layer: unknown layer {id}");
            return;
        };
        layer.apply(&LayerPatch {
            order: Some(order),
            ..Default::default()
        });
        let order = layer.order;
        self.sort_layers();
        self.note(StageChange::LayerProps(id));
        self.after_layers_changed();
        if !opts.silent {
            self.enqueue(LayerStageOperation::ReorderLayer { id, order });
        }
    }

    /// Bulk reconciliation: replace the live list wholesale and enqueue the
    /// field-level diff against the previous list (adds, then updates, then
    /// removes). Incoming layers are coerced first; duplicate ids keep their
    /// first occurrence.
    pub fn replace_layers(&mut self, incoming: Vec<LayerEntity>, opts: MutationOptions) {
        let next = coerce_layers(incoming);
        let prev_by_id: HashMap<LayerId, &LayerEntity> =
            self.layers.iter().map(|l| (l.id, l)).collect();
        let next_ids: HashSet<LayerId> = next.iter().map(|l| l.id).collect();

        let mut adds = Vec::new();
        let mut updates = Vec::new();
        for layer in &next {
            match prev_by_id.get(&layer.id) {
                None => adds.push(LayerStageOperation::AddLayer {
                    layer: layer.clone(),
                }),
                Some(prev) => {
                    let changes = LayerPatch::between(prev, layer);
                    if !changes.is_empty() {
                        updates.push(LayerStageOperation::UpdateLayer {
                            id: layer.id,
                            changes,
                        });
                    }
                }
            }
        }
        let removes: Vec<LayerStageOperation> = self
            .layers
            .iter()
            .filter(|l| !next_ids.contains(&l.id))
            .map(|l| LayerStageOperation::RemoveLayer { id: l.id })
            .collect();

        let op_count = adds.len() + updates.len() + removes.len();
        log::debug!(
            "replace_layers: +{} ~{} -{} (silent: {})",
            adds.len(),
            updates.len(),
            removes.len(),
            opts.silent
        );

        self.layers = next;
        self.after_layers_changed();

        if !opts.silent && op_count > 0 {
            for op in adds.into_iter().chain(updates).chain(removes) {
                self.enqueue(op);
            }
        }
    }

    // ─── Group mutations ─────────────────────────────────────────────────

    pub fn set_group_opacity(&mut self, id: GroupId, opacity: f64, opts: MutationOptions) {
        let opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            log::debug!("set_group_opacity: unknown group {id}");
            return;
        };
        group.opacity = opacity;
        self.after_group_changed(id);
        if !opts.silent {
            self.enqueue(LayerStageOperation::SetGroupOpacity { id, opacity });
        }
    }

    pub fn set_group_visibility(&mut self, id: GroupId, visible: bool, opts: MutationOptions) {
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            log::debug!("set_group_visibility: unknown group {id}");
            return;
        };
        group.visible = visible;
        self.after_group_changed(id);
        if !opts.silent {
            self.enqueue(LayerStageOperation::SetGroupVisibility { id, visible });
        }
    }

    /// Insert a group unless one with the same id exists and `overwrite` is
    /// off. Membership is re-derived either way.
    pub fn register_group(&mut self, group: LayerGroupState, opts: RegisterOptions) {
        match self.groups.iter().position(|g| g.id == group.id) {
            Some(_) if !opts.overwrite => return,
            Some(idx) => self.groups[idx] = group.clone(),
            None => self.groups.push(group.clone()),
        }
        self.groups = derive_groups(&self.layers, &self.groups);
        self.record(StageChange::Groups);
        let registered = self
            .group(group.id)
            .cloned()
            .unwrap_or(group);
        self.enqueue(LayerStageOperation::RegisterGroup { group: registered });
    }

    // ─── Hydration & flushing ────────────────────────────────────────────

    /// Establish a new synced baseline: replace the layers, re-derive groups
    /// against the current ones, and clear the pending queue.
    pub fn hydrate(&mut self, layers: Vec<LayerEntity>) {
        self.layers = coerce_layers(layers);
        self.sort_layers();
        self.groups = derive_groups(&self.layers, &self.groups);
        self.clear_pending();
        self.record(StageChange::Hydrated);
    }

    /// Like [`LayerStage::hydrate`], but also resets group settings to the
    /// defaults. Used when there is no document to load.
    pub fn reset(&mut self, layers: Vec<LayerEntity>) {
        self.groups = derive_groups(&[], &[]);
        self.hydrate(layers);
    }

    /// Capture the pending queue by value for sending. `None` when there is
    /// no active project or nothing to send.
    pub fn begin_flush(&self) -> Option<PendingBatch> {
        let project_id = self.project_id.clone()?;
        if self.pending.is_empty() {
            return None;
        }
        Some(PendingBatch {
            project_id,
            operations: self.pending.clone(),
            through: self.pending_base + self.pending.len() as u64,
        })
    }

    /// Drop the operations `batch` captured. Operations enqueued after the
    /// capture stay queued for the next flush.
    pub fn acknowledge(&mut self, batch: &PendingBatch) {
        if batch.through <= self.pending_base {
            return;
        }
        let n = ((batch.through - self.pending_base) as usize).min(self.pending.len());
        self.pending.drain(..n);
        self.pending_base += n as u64;
    }

    fn clear_pending(&mut self) {
        self.pending_base += self.pending.len() as u64;
        self.pending.clear();
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn enqueue(&mut self, op: LayerStageOperation) {
        self.pending.push(op);
    }

    fn record(&mut self, change: StageChange) {
        self.note(change);
        self.revision += 1;
    }

    /// Add `change` to the outbox once. Consumers read the current state
    /// when they drain, so repeats carry nothing new and the outbox stays
    /// bounded even when nobody drains it.
    fn note(&mut self, change: StageChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    fn sort_layers(&mut self) {
        // `sort_by` is stable: ties keep insertion order.
        self.layers.sort_by(|a, b| a.order.total_cmp(&b.order));
    }

    fn after_layers_changed(&mut self) {
        self.groups = derive_groups(&self.layers, &self.groups);
        self.record(StageChange::Layers);
    }

    fn after_group_changed(&mut self, id: GroupId) {
        self.groups = derive_groups(&self.layers, &self.groups);
        self.record(StageChange::GroupVisuals(id));
    }
}

/// Re-establish field invariants on incoming layers and drop repeated ids,
/// keeping the first occurrence.
fn coerce_layers(layers: Vec<LayerEntity>) -> Vec<LayerEntity> {
    let mut seen = HashSet::with_capacity(layers.len());
    layers
        .into_iter()
        .filter(|l| {
            let fresh = seen.insert(l.id);
            if !fresh {
                log::warn!("dropping duplicate layer id {}", l.id);
            }
            fresh
        })
        .map(|l| LayerDraft::from(l).coerce())
        .collect()
}
