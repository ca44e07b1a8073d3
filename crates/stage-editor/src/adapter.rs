//! Canvas adapter: keeps a drawing surface and the layer stage in sync.
//!
//! Two directions:
//!
//! - **Surface → stage**: lifecycle events trigger a full reconciliation.
//!   Every native object is converted to a layer and the resulting list is
//!   handed to [`LayerStage::replace_layers`], which enqueues the diff.
//! - **Stage → surface**: layer and group visual changes recorded by the
//!   stage are written back onto the native objects.
//!
//! Write-back raises surface events of its own. While `applying` is set
//! those echoes are dropped, so a write-back never feeds back into the stage
//! as a user edit.
//!
//! Native objects show *effective* values: a layer's visibility and opacity
//! combined with its group's. The stage and history snapshots only hold the
//! layers' own values.

use crate::store::{LayerStage, MutationOptions, StageChange};
use crate::surface::{DrawingSurface, SurfaceEvent, SurfaceProperty};
use stage_core::groups::{CANVAS_GROUP, group_for_layer};
use stage_core::model::{LayerData, LayerEntity, LayerGroupState};
use stage_core::surface::{
    SurfaceObject, SurfaceSnapshot, layer_to_surface_object, surface_object_to_layer,
};
use stage_core::{GroupId, LayerId};

/// Tolerance when mapping an effective native opacity back to a layer's own.
const OPACITY_EPSILON: f64 = 1e-9;

/// Outcome of processing pending surface events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSync {
    /// No events were pending.
    Idle,
    /// Events were echoes of a write-back and were dropped.
    Suppressed,
    /// The stage was reconciled mid-gesture; history waits for the gesture end.
    InGesture,
    /// The stage was reconciled and the surface is at rest.
    Settled,
}

/// How to read native visibility and opacity during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeValues {
    /// Group effects are applied and must be undone.
    Effective,
    /// Freshly loaded from a snapshot; the layers' own values.
    Own,
}

/// What [`CanvasAdapter::apply_stage_changes`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Native property writes that hit an object.
    pub written: usize,
    /// The surface was reloaded from a hydrated document.
    pub hydrated: bool,
}

pub struct CanvasAdapter<S: DrawingSurface> {
    surface: S,
    /// Set while the adapter itself is writing to the surface.
    applying: bool,
    /// A snapshot was loaded and not yet reconciled.
    snapshot_loaded: bool,
    selected: Option<LayerId>,
    gesture_depth: usize,
    gesture_dirty: bool,
}

impl<S: DrawingSurface> CanvasAdapter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            applying: false,
            snapshot_loaded: false,
            selected: None,
            gesture_depth: 0,
            gesture_dirty: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_applying(&self) -> bool {
        self.applying
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id;
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    /// Start a continuous interaction (drag, resize). Nestable.
    pub fn begin_gesture(&mut self) {
        if self.gesture_depth == 0 {
            self.gesture_dirty = false;
        }
        self.gesture_depth += 1;
    }

    /// End a gesture. Returns `true` when the outermost gesture closes after
    /// the stage was reconciled during it.
    pub fn end_gesture(&mut self) -> bool {
        if self.gesture_depth == 0 {
            return false;
        }
        self.gesture_depth -= 1;
        if self.gesture_depth > 0 {
            return false;
        }
        std::mem::take(&mut self.gesture_dirty)
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture_depth > 0
    }

    // ─── Surface → stage ─────────────────────────────────────────────────

    /// Drain surface events and reconcile the stage if any arrived.
    pub fn handle_surface_events(&mut self, stage: &mut LayerStage) -> SurfaceSync {
        let events = self.surface.take_events();
        if events.is_empty() {
            if !self.applying {
                self.snapshot_loaded = false;
            }
            return SurfaceSync::Idle;
        }
        if self.applying {
            log::trace!("dropping {} surface events raised by write-back", events.len());
            return SurfaceSync::Suppressed;
        }
        let restored = std::mem::take(&mut self.snapshot_loaded);

        if let Some(selected) = self.selected
            && events
                .iter()
                .any(|e| matches!(e, SurfaceEvent::Removed(_)) && e.target() == Some(selected))
        {
            self.selected = None;
        }

        if restored {
            self.reconcile_as(stage, MutationOptions::default(), NativeValues::Own);
            let ids: Vec<LayerId> = stage
                .layers()
                .iter()
                .filter(|l| is_surface_layer(l))
                .map(|l| l.id)
                .collect();
            self.write_group_effects(stage, &ids);
        } else {
            let fresh =
                self.reconcile_as(stage, MutationOptions::default(), NativeValues::Effective);
            self.write_group_effects(stage, &fresh);
        }

        if self.gesture_depth > 0 {
            self.gesture_dirty = true;
            SurfaceSync::InGesture
        } else {
            SurfaceSync::Settled
        }
    }

    /// Rebuild the surface-backed layers from the native objects and hand
    /// the full list to the stage. Layers owned by other integrations are
    /// carried through untouched.
    pub fn reconcile(&mut self, stage: &mut LayerStage, opts: MutationOptions) {
        self.reconcile_as(stage, opts, NativeValues::Effective);
    }

    /// Returns the ids of surface layers the stage did not know before.
    fn reconcile_as(
        &mut self,
        stage: &mut LayerStage,
        opts: MutationOptions,
        values: NativeValues,
    ) -> Vec<LayerId> {
        let canvas = match values {
            NativeValues::Effective => stage.group(GroupId::intern(CANVAS_GROUP)).cloned(),
            NativeValues::Own => None,
        };

        let mut next: Vec<LayerEntity> = stage
            .layers()
            .iter()
            .filter(|l| !is_surface_layer(l))
            .cloned()
            .collect();
        let mut fresh = Vec::new();
        let mut unnamed = Vec::new();

        for (index, mut obj) in self.surface.objects().into_iter().enumerate() {
            if obj.id.as_deref().is_none_or(str::is_empty) {
                let id = LayerId::generate();
                obj.id = Some(id.as_str().to_string());
                unnamed.push((index, id));
            }
            let mut layer = surface_object_to_layer(&obj, index);
            let prev = stage.layer(layer.id);
            if prev.is_none() {
                fresh.push(layer.id);
            }
            carry_stage_fields(&mut layer, &obj, prev, canvas.as_ref());
            next.push(layer);
        }
        next.sort_by(|a, b| a.order.total_cmp(&b.order));

        if !unnamed.is_empty() {
            self.stamp_ids(&unnamed);
        }
        stage.replace_layers(next, opts);
        fresh
    }

    /// Give id-less native objects the ids their layers were created with,
    /// so the next reconciliation matches them again.
    fn stamp_ids(&mut self, ids: &[(usize, LayerId)]) {
        let was_applying = std::mem::replace(&mut self.applying, true);
        for (index, id) in ids {
            if !self.surface.assign_id(*index, *id) {
                log::debug!("surface kept object {index} without an id");
            }
        }
        self.surface.take_events();
        self.applying = was_applying;
    }

    /// Replace the surface contents with the native payloads of `layers`,
    /// without reconciling.
    pub fn load_layers(&mut self, layers: &[LayerEntity]) {
        let objects: Vec<SurfaceObject> = layers
            .iter()
            .filter_map(|layer| {
                layer_to_surface_object(layer).map(|obj| SurfaceObject {
                    id: Some(layer.id.as_str().to_string()),
                    ..obj.clone()
                })
            })
            .collect();
        let was_applying = std::mem::replace(&mut self.applying, true);
        self.surface.load_snapshot(&SurfaceSnapshot::new(objects));
        self.surface.take_events();
        self.applying = was_applying;
        self.selected = None;
    }

    /// Load a serialized surface as if the user did it: the resulting events
    /// are reconciled on the next [`CanvasAdapter::handle_surface_events`].
    pub fn load_snapshot(&mut self, snapshot: &SurfaceSnapshot) {
        self.surface.load_snapshot(snapshot);
        self.surface.request_render();
        self.snapshot_loaded = true;
    }

    /// Serialize the surface with each layer's own visibility and opacity,
    /// so a later restore does not depend on the group settings of the time.
    pub fn snapshot(&self, stage: &LayerStage) -> SurfaceSnapshot {
        let mut snapshot = self.surface.snapshot();
        for obj in &mut snapshot.objects {
            let Some(layer) = obj
                .id
                .as_deref()
                .and_then(|id| stage.layer(LayerId::intern(id)))
            else {
                continue;
            };
            obj.visible = Some(layer.visible);
            obj.opacity = Some(layer.opacity);
        }
        snapshot
    }

    // ─── Stage → surface ─────────────────────────────────────────────────

    /// Drain the stage's change outbox and mirror visual changes onto the
    /// native objects.
    pub fn apply_stage_changes(&mut self, stage: &mut LayerStage) -> AppliedChanges {
        let changes = stage.drain_changes();
        let mut applied = AppliedChanges::default();
        if changes.is_empty() {
            return applied;
        }

        self.applying = true;
        for change in &changes {
            match change {
                StageChange::Hydrated => {
                    self.load_layers(stage.layers());
                    let ids: Vec<LayerId> = stage.layers().iter().map(|l| l.id).collect();
                    for id in ids {
                        applied.written += self.write_layer(stage, id);
                    }
                    applied.hydrated = true;
                }
                StageChange::LayerProps(id) => applied.written += self.write_layer(stage, *id),
                StageChange::GroupVisuals(group) => {
                    let ids: Vec<LayerId> = stage
                        .group(*group)
                        .map(|g| g.layer_ids.clone())
                        .unwrap_or_default();
                    for id in ids {
                        applied.written += self.write_layer(stage, id);
                    }
                }
                StageChange::Layers | StageChange::Groups => {}
            }
        }
        if applied.written > 0 || applied.hydrated {
            self.surface.request_render();
        }
        let _ = self.handle_surface_events(stage);
        self.applying = false;

        if applied.written > 0 {
            // Refresh the stored payloads silently so they match the surface.
            self.reconcile(stage, MutationOptions::SILENT);
            stage.drain_changes();
        }
        applied
    }

    /// Write effective visibility and opacity for `ids` whose group alters
    /// them, then refresh the stored payloads silently.
    fn write_group_effects(&mut self, stage: &mut LayerStage, ids: &[LayerId]) {
        let was_applying = std::mem::replace(&mut self.applying, true);
        let mut written = 0;
        for id in ids {
            let Some(layer) = stage.layer(*id) else {
                continue;
            };
            let Some(group) = stage.group(group_for_layer(layer)) else {
                continue;
            };
            if group.visible && group.opacity >= 1.0 {
                continue;
            }
            let visible = SurfaceProperty::Visible(layer.visible && group.visible);
            let opacity = SurfaceProperty::Opacity(layer.opacity * group.opacity);
            let hit = self.surface.set_property(*id, &visible);
            if self.surface.set_property(*id, &opacity) || hit {
                written += 1;
            }
        }
        if written > 0 {
            self.surface.request_render();
        }
        self.surface.take_events();
        self.applying = was_applying;

        if written > 0 {
            log::trace!("applied group effects to {written} new objects");
            self.reconcile_as(stage, MutationOptions::SILENT, NativeValues::Effective);
        }
    }

    /// Write a layer's effective visual state onto its native object.
    /// Returns 1 if the object was found.
    fn write_layer(&mut self, stage: &LayerStage, id: LayerId) -> usize {
        let Some(layer) = stage.layer(id) else {
            return 0;
        };
        if !is_surface_layer(layer) {
            return 0;
        }
        let (group_visible, group_opacity) = stage
            .group(group_for_layer(layer))
            .map_or((true, 1.0), |g| (g.visible, g.opacity));

        let props = [
            SurfaceProperty::Name(layer.name.clone()),
            SurfaceProperty::Order(layer.order),
            SurfaceProperty::Visible(layer.visible && group_visible),
            SurfaceProperty::Opacity(layer.opacity * group_opacity),
            SurfaceProperty::Locked(layer.locked),
        ];
        let mut hit = false;
        for prop in &props {
            hit |= self.surface.set_property(id, prop);
        }
        if layer.locked && self.selected == Some(id) {
            self.selected = None;
        }
        usize::from(hit)
    }
}

/// Layers whose content lives on the drawing surface: the ones carrying a
/// native payload. A layer tagged with the surface source but without a
/// payload cannot be drawn and is carried through reconciliation as is.
pub fn is_surface_layer(layer: &LayerEntity) -> bool {
    matches!(layer.data, Some(LayerData::NativeSurface(_)))
}

/// Keep stage-only fields across a reconciliation and undo the canvas
/// group's effect on native visibility and opacity.
fn carry_stage_fields(
    layer: &mut LayerEntity,
    obj: &SurfaceObject,
    prev: Option<&LayerEntity>,
    canvas: Option<&LayerGroupState>,
) {
    if let Some(prev) = prev {
        if obj.name.is_none() {
            layer.name.clone_from(&prev.name);
        }
        layer.parent_id = prev.parent_id;
        layer.children.clone_from(&prev.children);
        layer.meta.clone_from(&prev.meta);
    }

    // New objects were never written by the adapter: their values are their own.
    let (Some(prev), Some(group)) = (prev, canvas.filter(|g| g.layer_ids.contains(&layer.id)))
    else {
        return;
    };
    if !group.visible {
        layer.visible = prev.visible;
    }
    if group.opacity < 1.0 {
        let native = layer.opacity;
        layer.opacity = if group.opacity <= 0.0
            || (prev.opacity * group.opacity - native).abs() < OPACITY_EPSILON
        {
            prev.opacity
        } else {
            (native / group.opacity).clamp(0.0, 1.0)
        };
    }
}
