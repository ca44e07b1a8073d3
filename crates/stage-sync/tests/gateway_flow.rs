//! Integration tests: persistence gateway (stage-sync ↔ stage-editor).
//!
//! Runs hydration, commit, and exit flush against an in-memory endpoint and
//! checks the pending queue and notices after each step.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use stage_core::groups::CANVAS_GROUP;
use stage_core::model::*;
use stage_core::{GroupId, LayerId};
use stage_editor::{EditorSession, LayerStage, MemorySurface, MutationOptions, StageConfig};
use stage_sync::{
    BeaconTransport, CommitOptions, CommitOutcome, DocumentEndpoint, GatewayConfig, GatewayError,
    HydrateOutcome, NoticeLevel, Notifier, PersistenceGateway, RemoteDocument,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ─── Fakes ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeEndpoint {
    /// `None` makes every fetch fail.
    document: RefCell<Option<RemoteDocument>>,
    fail_pushes: Cell<bool>,
    pushed: RefCell<Vec<Vec<LayerStageOperation>>>,
    /// Runs while a push is "in flight".
    during_push: RefCell<Option<Box<dyn FnOnce()>>>,
}

#[async_trait(?Send)]
impl DocumentEndpoint for FakeEndpoint {
    async fn fetch_document(&self, _project_id: &str) -> Result<RemoteDocument, GatewayError> {
        self.document
            .borrow()
            .clone()
            .ok_or_else(|| GatewayError::Unavailable("offline".into()))
    }

    async fn push_operations(
        &self,
        _project_id: &str,
        operations: &[LayerStageOperation],
    ) -> Result<(), GatewayError> {
        let hook = self.during_push.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
        self.pushed.borrow_mut().push(operations.to_vec());
        if self.fail_pushes.get() {
            return Err(GatewayError::Status { status: 500 });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: RefCell<Vec<(NoticeLevel, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.borrow_mut().push((level, message.to_string()));
    }
}

#[derive(Default)]
struct RecordingBeacon {
    sent: RefCell<Vec<(String, String)>>,
}

impl BeaconTransport for RecordingBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        self.sent.borrow_mut().push((url.to_string(), body));
        true
    }
}

type Gateway = PersistenceGateway<FakeEndpoint, Rc<RecordingNotifier>>;

fn make_gateway(document: Option<RemoteDocument>) -> (Gateway, Rc<RecordingNotifier>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let notices = Rc::new(RecordingNotifier::default());
    let endpoint = FakeEndpoint {
        document: RefCell::new(document),
        ..Default::default()
    };
    let config = GatewayConfig {
        base_url: "https://api.test".into(),
        ..Default::default()
    };
    (
        PersistenceGateway::with_notifier(endpoint, Rc::clone(&notices), config),
        notices,
    )
}

fn empty_document() -> Option<RemoteDocument> {
    Some(RemoteDocument {
        layers: Some(Vec::new()),
        canvas_json: None,
    })
}

fn shape(id: &str) -> LayerDraft {
    LayerDraft {
        id: Some(LayerId::intern(id)),
        kind: Some(LayerKind::Shape),
        ..Default::default()
    }
}

fn last_notice(notices: &RecordingNotifier) -> Option<(NoticeLevel, String)> {
    notices.notices.borrow().last().cloned()
}

// ─── End to end ─────────────────────────────────────────────────────────

#[tokio::test]
async fn add_commit_remove() {
    let (gateway, notices) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    gateway.hydrate(&stage, Some("p1"), None).await;

    stage.borrow_mut().add_layer(shape("r1"));
    {
        let stage = stage.borrow();
        assert_eq!(stage.layers().len(), 1);
        let canvas = stage.group(GroupId::intern(CANVAS_GROUP)).unwrap();
        assert_eq!(canvas.layer_ids, vec![LayerId::intern("r1")]);
        assert!(matches!(
            stage.pending_operations(),
            [LayerStageOperation::AddLayer { layer }] if layer.id.as_str() == "r1"
        ));
    }

    let outcome = gateway.commit(&stage, CommitOptions::default()).await;
    assert!(matches!(outcome, CommitOutcome::Saved { operations: 1 }));
    assert!(stage.borrow().pending_operations().is_empty());
    assert_eq!(
        last_notice(&notices),
        Some((NoticeLevel::Success, "Layers saved".to_string()))
    );

    stage
        .borrow_mut()
        .remove_layer(LayerId::intern("r1"), MutationOptions::default());
    let stage = stage.borrow();
    assert!(stage.layers().is_empty());
    assert_eq!(
        stage.pending_operations(),
        &[LayerStageOperation::RemoveLayer {
            id: LayerId::intern("r1")
        }]
    );
}

// ─── Commit ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_commit_keeps_queue_for_retry() {
    let (gateway, notices) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    gateway.hydrate(&stage, Some("p1"), None).await;
    stage.borrow_mut().add_layer(shape("a"));
    stage.borrow_mut().add_layer(shape("b"));
    let before = stage.borrow().pending_operations().to_vec();

    gateway.endpoint().fail_pushes.set(true);
    let outcome = gateway.commit(&stage, CommitOptions::default()).await;
    assert!(matches!(
        outcome,
        CommitOutcome::Failed(GatewayError::Status { status: 500 })
    ));
    assert_eq!(stage.borrow().pending_operations(), before.as_slice());
    assert_eq!(
        last_notice(&notices),
        Some((
            NoticeLevel::Error,
            "Failed to save layers. Changes are kept locally.".to_string()
        ))
    );

    gateway.endpoint().fail_pushes.set(false);
    assert!(gateway.commit(&stage, CommitOptions::default()).await.is_saved());
    assert!(stage.borrow().pending_operations().is_empty());
    assert_eq!(gateway.endpoint().pushed.borrow().len(), 2);
}

#[tokio::test]
async fn silent_commit_shows_no_notice() {
    let (gateway, notices) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    gateway.hydrate(&stage, Some("p1"), None).await;
    stage.borrow_mut().add_layer(shape("a"));

    gateway.endpoint().fail_pushes.set(true);
    gateway.commit(&stage, CommitOptions { silent: true }).await;
    gateway.endpoint().fail_pushes.set(false);
    gateway.commit(&stage, CommitOptions { silent: true }).await;

    assert!(notices.notices.borrow().is_empty());
    assert!(stage.borrow().pending_operations().is_empty());
}

#[tokio::test]
async fn commit_is_idle_without_project_or_operations() {
    let (gateway, _) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    stage.borrow_mut().add_layer(shape("a"));
    assert!(matches!(
        gateway.commit(&stage, CommitOptions::default()).await,
        CommitOutcome::Idle
    ));

    gateway.hydrate(&stage, Some("p1"), None).await;
    assert!(matches!(
        gateway.commit(&stage, CommitOptions::default()).await,
        CommitOutcome::Idle
    ));
    assert!(gateway.endpoint().pushed.borrow().is_empty());
}

#[tokio::test]
async fn edits_during_commit_roll_over() {
    let (gateway, _) = make_gateway(empty_document());
    let stage = Rc::new(RefCell::new(LayerStage::new()));
    gateway.hydrate(&*stage, Some("p1"), None).await;
    stage.borrow_mut().add_layer(shape("first"));

    let in_flight = Rc::clone(&stage);
    *gateway.endpoint().during_push.borrow_mut() = Some(Box::new(move || {
        in_flight.borrow_mut().add_layer(shape("second"));
    }));

    let outcome = gateway.commit(&*stage, CommitOptions::default()).await;
    assert!(matches!(outcome, CommitOutcome::Saved { operations: 1 }));
    assert!(matches!(
        stage.borrow().pending_operations(),
        [LayerStageOperation::AddLayer { layer }] if layer.id.as_str() == "second"
    ));
}

// ─── Hydration ──────────────────────────────────────────────────────────

#[tokio::test]
async fn hydration_clears_queue() {
    let remote = vec![LayerEntity::new(LayerId::intern("remote"), LayerKind::Image)];
    let (gateway, _) = make_gateway(Some(RemoteDocument {
        layers: Some(remote),
        canvas_json: None,
    }));
    let stage = RefCell::new(LayerStage::new());
    stage.borrow_mut().add_layer(shape("local"));

    let outcome = gateway.hydrate(&stage, Some("p1"), None).await;
    assert!(matches!(outcome, HydrateOutcome::Remote { layers: 1 }));
    let stage = stage.borrow();
    assert!(stage.pending_operations().is_empty());
    assert_eq!(stage.layers()[0].id.as_str(), "remote");
    assert_eq!(stage.project_id(), Some("p1"));
    assert!(!stage.is_hydrating());
}

#[tokio::test]
async fn hydration_failure_falls_back_with_warning() {
    let (gateway, notices) = make_gateway(None);
    let stage = RefCell::new(LayerStage::new());
    let cached = vec![LayerEntity::new(LayerId::intern("cached"), LayerKind::Text)];

    let outcome = gateway.hydrate(&stage, Some("p1"), Some(cached)).await;
    assert!(matches!(
        outcome,
        HydrateOutcome::Failed(GatewayError::Unavailable(_))
    ));
    assert_eq!(stage.borrow().layers()[0].id.as_str(), "cached");
    assert_eq!(
        last_notice(&notices),
        Some((
            NoticeLevel::Warning,
            "Unable to load layers from server. Using cached data where available.".to_string()
        ))
    );
}

#[tokio::test]
async fn legacy_surface_document_is_converted() {
    let (gateway, _) = make_gateway(Some(RemoteDocument {
        layers: None,
        canvas_json: Some(r#"{"objects":[{"id":"r","type":"rect"},{"id":"t","type":"i-text"}]}"#.into()),
    }));
    let stage = RefCell::new(LayerStage::new());
    let outcome = gateway.hydrate(&stage, Some("p1"), None).await;
    assert!(matches!(outcome, HydrateOutcome::Legacy { layers: 2 }));
    let kinds: Vec<LayerKind> = stage.borrow().layers().iter().map(|l| l.kind).collect();
    assert_eq!(kinds, vec![LayerKind::Shape, LayerKind::Text]);
}

#[tokio::test]
async fn malformed_legacy_document_is_empty() {
    let (gateway, _) = make_gateway(Some(RemoteDocument {
        layers: None,
        canvas_json: Some("{oops".into()),
    }));
    let stage = RefCell::new(LayerStage::new());
    let cached = vec![LayerEntity::new(LayerId::intern("cached"), LayerKind::Text)];
    let outcome = gateway.hydrate(&stage, Some("p1"), Some(cached)).await;
    assert!(matches!(outcome, HydrateOutcome::Legacy { layers: 0 }));
    assert!(stage.borrow().layers().is_empty());
}

#[tokio::test]
async fn empty_document_uses_fallback() {
    let (gateway, _) = make_gateway(Some(RemoteDocument::default()));
    let stage = RefCell::new(LayerStage::new());
    let cached = vec![LayerEntity::new(LayerId::intern("cached"), LayerKind::Text)];
    let outcome = gateway.hydrate(&stage, Some("p1"), Some(cached)).await;
    assert!(matches!(outcome, HydrateOutcome::Fallback { layers: 1 }));
}

#[tokio::test]
async fn detached_hydration_resets_groups() {
    let (gateway, _) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    let canvas = GroupId::intern(CANVAS_GROUP);
    stage
        .borrow_mut()
        .set_group_opacity(canvas, 0.3, MutationOptions::default());

    let outcome = gateway.hydrate(&stage, None, None).await;
    assert!(matches!(outcome, HydrateOutcome::Detached));
    let stage = stage.borrow();
    assert_eq!(stage.group(canvas).unwrap().opacity, 1.0);
    assert!(stage.pending_operations().is_empty());
}

#[tokio::test]
async fn hydrating_a_session_loads_its_surface() {
    let layer = stage_core::surface::surface_object_to_layer(
        &stage_core::SurfaceObject::new("saved", "rect"),
        0,
    );
    let (gateway, _) = make_gateway(Some(RemoteDocument {
        layers: Some(vec![layer]),
        canvas_json: None,
    }));
    let session = RefCell::new(EditorSession::new(
        MemorySurface::new(),
        &StageConfig::default(),
    ));

    gateway.hydrate(&session, Some("p1"), None).await;
    let session = session.borrow();
    assert!(session.surface().get(LayerId::intern("saved")).is_some());
    assert!(session.stage().pending_operations().is_empty());
    assert_eq!(session.history().len(), 1);
}

// ─── Exit flush ─────────────────────────────────────────────────────────

#[tokio::test]
async fn exit_flush_sends_everything_and_keeps_queue() {
    let (gateway, _) = make_gateway(empty_document());
    let stage = RefCell::new(LayerStage::new());
    let beacon = RecordingBeacon::default();
    assert!(!gateway.flush_on_exit(&stage, &beacon));

    gateway.hydrate(&stage, Some("p1"), None).await;
    stage.borrow_mut().add_layer(shape("a"));
    assert!(gateway.flush_on_exit(&stage, &beacon));

    let sent = beacon.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "https://api.test/projects/p1/layers");
    let body: serde_json::Value = serde_json::from_str(&sent[0].1).unwrap();
    assert_eq!(body["operations"][0]["type"], serde_json::json!("ADD_LAYER"));
    assert_eq!(stage.borrow().pending_operations().len(), 1);
}
