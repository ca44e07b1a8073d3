//! Integration tests: bidirectional surface ↔ stage sync (stage-editor ↔ stage-core).
//!
//! Native edits must reach the stage as operations; stage-driven visual
//! changes must reach the native objects without echoing back as edits.

use pretty_assertions::assert_eq;
use stage_core::groups::{BRIEF_GROUP, CANVAS_GROUP};
use stage_core::model::*;
use stage_core::surface::{SurfaceObject, surface_json_to_layers};
use stage_core::{GroupId, LayerId};
use stage_editor::integrations::{BriefLayer, MoodboardLayer};
use stage_editor::{EditorSession, MemorySurface, StageConfig};

fn make_session() -> EditorSession<MemorySurface> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = EditorSession::new(MemorySurface::new(), &StageConfig::default());
    session.hydrate(surface_json_to_layers(include_str!("fixtures/legacy_canvas.json")));
    session
}

fn layer_ids(session: &EditorSession<MemorySurface>) -> Vec<&str> {
    session.stage().layers().iter().map(|l| l.id.as_str()).collect()
}

// ─── Surface → Stage ────────────────────────────────────────────────────

#[test]
fn legacy_document_hydrates_in_order() {
    let session = make_session();
    assert_eq!(layer_ids(&session), vec!["frame", "title", "photo"]);

    let title = session.stage().layer(LayerId::intern("title")).unwrap();
    assert_eq!(title.name, "Headline");
    assert_eq!(title.kind, LayerKind::Text);
    assert_eq!(title.opacity, 0.8);

    let canvas = session.stage().group(GroupId::intern(CANVAS_GROUP)).unwrap();
    assert_eq!(canvas.layer_ids.len(), 3);
    assert_eq!(session.surface().len(), 3);
}

#[test]
fn native_move_enqueues_payload_update() {
    let mut session = make_session();
    let photo = LayerId::intern("photo");
    session.surface_mut().modify(photo, |o| {
        o.extra.insert("top".into(), serde_json::json!(300));
    });
    session.sync();

    match session.stage().pending_operations() {
        [LayerStageOperation::UpdateLayer { id, changes }] => {
            assert_eq!(*id, photo);
            assert!(changes.data.is_some());
            assert_eq!(changes.opacity, None);
            assert_eq!(changes.name, None);
        }
        other => panic!("expected one UPDATE_LAYER, got {other:?}"),
    }
}

#[test]
fn native_delete_enqueues_remove() {
    let mut session = make_session();
    let frame = LayerId::intern("frame");
    session.select(Some(frame));
    session.surface_mut().remove(frame);
    session.sync();

    assert_eq!(
        session.stage().pending_operations(),
        &[LayerStageOperation::RemoveLayer { id: frame }]
    );
    assert_eq!(session.adapter().selected(), None);
}

// ─── Stage → Surface ────────────────────────────────────────────────────

#[test]
fn lock_writes_native_flags_once() {
    let mut session = make_session();
    let title = LayerId::intern("title");
    assert!(session.select(Some(title)));

    assert_eq!(session.toggle_lock(title), Some(true));

    let native = session.surface().get(title).unwrap();
    assert_eq!(native.lock_movement_x, Some(true));
    assert_eq!(native.lock_movement_y, Some(true));
    assert_eq!(native.selectable, Some(false));
    assert_eq!(native.evented, Some(false));
    assert_eq!(session.adapter().selected(), None);
    assert!(!session.select(Some(title)));

    assert_eq!(
        session.stage().pending_operations(),
        &[LayerStageOperation::UpdateLayer {
            id: title,
            changes: LayerPatch {
                locked: Some(true),
                ..Default::default()
            },
        }]
    );
}

#[test]
fn hiding_a_layer_hides_its_object() {
    let mut session = make_session();
    let photo = LayerId::intern("photo");
    session.set_layer_visibility(photo, false);
    assert_eq!(session.surface().get(photo).unwrap().visible, Some(false));
    assert!(!session.stage().layer(photo).unwrap().visible);
    assert_eq!(session.stage().pending_operations().len(), 1);
}

#[test]
fn canvas_group_opacity_multiplies() {
    let mut session = make_session();
    let title = LayerId::intern("title");
    session.set_group_opacity(GroupId::intern(CANVAS_GROUP), 0.5);

    assert_eq!(session.surface().get(title).unwrap().opacity, Some(0.4));
    assert_eq!(session.stage().layer(title).unwrap().opacity, 0.8);
    assert_eq!(
        session.stage().pending_operations(),
        &[LayerStageOperation::SetGroupOpacity {
            id: GroupId::intern(CANVAS_GROUP),
            opacity: 0.5
        }]
    );

    session.set_group_opacity(GroupId::intern(CANVAS_GROUP), 1.0);
    assert_eq!(session.surface().get(title).unwrap().opacity, Some(0.8));
}

#[test]
fn rename_and_reorder_survive_reconcile() {
    let mut session = make_session();
    let frame = LayerId::intern("frame");
    session.rename_layer(frame, "Backdrop");
    session.reorder_layer(frame, 10.0);
    assert_eq!(layer_ids(&session), vec!["title", "photo", "frame"]);

    // An unrelated native edit re-reads every object.
    session.surface_mut().modify(LayerId::intern("photo"), |o| {
        o.extra.insert("left".into(), serde_json::json!(0));
    });
    session.sync();

    let layer = session.stage().layer(frame).unwrap();
    assert_eq!(layer.name, "Backdrop");
    assert_eq!(layer.order, 10.0);
    assert_eq!(layer_ids(&session), vec!["title", "photo", "frame"]);
}

#[test]
fn objects_added_to_a_faded_group_follow_it() {
    let mut session = make_session();
    let canvas = GroupId::intern(CANVAS_GROUP);
    session.set_group_visibility(canvas, false);
    session.set_group_opacity(canvas, 0.5);

    let late = session.surface_mut().add(SurfaceObject::new("late", "rect"));
    session.sync();

    let native = session.surface().get(late).unwrap();
    assert_eq!(native.visible, Some(false));
    assert_eq!(native.opacity, Some(0.5));

    let layer = session.stage().layer(late).unwrap();
    assert!(layer.visible);
    assert_eq!(layer.opacity, 1.0);
    assert!(matches!(
        session.stage().pending_operations().last(),
        Some(LayerStageOperation::AddLayer { layer }) if layer.id == late
    ));
}

#[test]
fn surface_tagged_layer_without_payload_is_kept() {
    let mut session = EditorSession::new(MemorySurface::new(), &StageConfig::default());
    let remote: LayerEntity = serde_json::from_value(serde_json::json!({
        "id": "remote1",
        "type": "shape",
        "source": "fabric-like-surface"
    }))
    .unwrap();
    session.hydrate(vec![remote]);

    let x = session.surface_mut().add(SurfaceObject::new("x", "rect"));
    session.sync();

    assert_eq!(layer_ids(&session), vec!["remote1", "x"]);
    match session.stage().pending_operations() {
        [LayerStageOperation::AddLayer { layer }] => assert_eq!(layer.id, x),
        other => panic!("expected a single ADD_LAYER, got {other:?}"),
    }
}

// ─── Integrations ───────────────────────────────────────────────────────

#[test]
fn brief_and_moodboard_survive_surface_edits() {
    let mut session = make_session();
    let brief = BriefLayer::new(None, false);
    let board = MoodboardLayer::new(None);
    brief.mount(session.stage_mut(), Some("{\"root\":{}}".into()));
    board.mount(session.stage_mut());
    session.sync();

    session.surface_mut().add(SurfaceObject::new("note", "textbox"));
    session.sync();

    assert_eq!(
        layer_ids(&session),
        vec!["brief-root", "frame", "title", "photo", "note", "moodboard-root"]
    );
    let brief_group = session.stage().group(GroupId::intern(BRIEF_GROUP)).unwrap();
    assert_eq!(brief_group.layer_ids, vec![brief.id()]);
    assert!(
        !session
            .stage()
            .pending_operations()
            .iter()
            .any(|op| matches!(op, LayerStageOperation::RemoveLayer { .. }))
    );
}

// ─── Flushing ───────────────────────────────────────────────────────────

#[test]
fn edits_during_flush_stay_queued() {
    let mut session = make_session();
    session.stage_mut().set_project_id(Some("proj-1".into()));
    session.set_layer_visibility(LayerId::intern("frame"), false);

    let batch = session.stage().begin_flush().unwrap();
    assert_eq!(batch.project_id, "proj-1");
    assert_eq!(batch.operations.len(), 1);

    session.surface_mut().add(SurfaceObject::new("late", "rect"));
    session.sync();
    session.stage_mut().acknowledge(&batch);

    assert!(matches!(
        session.stage().pending_operations(),
        [LayerStageOperation::AddLayer { layer }] if layer.id.as_str() == "late"
    ));
}
