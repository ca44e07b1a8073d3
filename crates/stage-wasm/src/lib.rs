//! WASM bridge for the layer stage: exposes an editing session to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. The host owns the canvas
//! library and the network; Rust owns the document, history, and queue.

mod surface;
mod transport;

use js_sys::{Function, Promise};
use serde::Deserialize;
use stage_core::model::{LayerEntity, Sticker};
use stage_core::{GroupId, LayerId};
use stage_editor::integrations::{BriefLayer, MoodboardLayer};
use stage_editor::{EditorSession, StageConfig};
use stage_sync::{CommitOptions, CommitOutcome, GatewayConfig, HydrateOutcome, PersistenceGateway};
use std::cell::RefCell;
use std::rc::Rc;
use surface::{EventQueue, JsSurface, SurfaceBridge};
use transport::{JsEndpoint, JsNotifier, NavigatorBeacon};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// Settings accepted by the constructor, all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HandleConfig {
    stage: StageConfig,
    gateway: GatewayConfig,
}

type Session = EditorSession<JsSurface>;

/// The main WASM-facing stage controller.
///
/// One per open document. All layer panel actions, canvas callbacks, and
/// persistence calls from the host go through this struct.
#[wasm_bindgen]
pub struct LayerStageHandle {
    session: Rc<RefCell<Session>>,
    /// Surface events land here first, even while the session is busy.
    events: EventQueue,
    gateway: Rc<PersistenceGateway<JsEndpoint, JsNotifier>>,
    brief: Option<BriefLayer>,
    moodboard: Option<MoodboardLayer>,
}

#[wasm_bindgen]
impl LayerStageHandle {
    /// `fetch(projectId)` and `push(projectId, body)` return promises;
    /// `notify(level, message)` shows a toast.
    #[wasm_bindgen(constructor)]
    pub fn new(
        surface: SurfaceBridge,
        fetch: Function,
        push: Function,
        notify: Option<Function>,
        config_json: &str,
    ) -> Self {
        console_error_panic_hook_setup();

        let config: HandleConfig = if config_json.trim().is_empty() {
            HandleConfig::default()
        } else {
            serde_json::from_str(config_json).unwrap_or_else(|err| {
                log::warn!("invalid stage config, using defaults: {err}");
                HandleConfig::default()
            })
        };

        let events = EventQueue::default();
        let surface = JsSurface::new(surface, Rc::clone(&events));
        let session = EditorSession::new(surface, &config.stage);
        let gateway = PersistenceGateway::with_notifier(
            JsEndpoint::new(fetch, push),
            JsNotifier::new(notify),
            config.gateway,
        );

        Self {
            session: Rc::new(RefCell::new(session)),
            events,
            gateway: Rc::new(gateway),
            brief: None,
            moodboard: None,
        }
    }

    // ─── Canvas callbacks ────────────────────────────────────────────────

    /// Forward a canvas lifecycle event (`object:added`, `object:modified`,
    /// `object:removed`). Returns `true` if the stage was synced now; events
    /// raised while the stage itself is writing to the canvas stay queued
    /// and are dropped as echoes.
    pub fn surface_event(&self, kind: &str, id: Option<String>) -> bool {
        let Some(event) = surface::parse_event(kind, id) else {
            return false;
        };
        self.events.borrow_mut().push(event);
        match self.session.try_borrow_mut() {
            Ok(mut session) => {
                session.sync();
                true
            }
            Err(_) => false,
        }
    }

    pub fn begin_gesture(&self) {
        self.session.borrow_mut().begin_gesture();
    }

    pub fn end_gesture(&self) {
        self.session.borrow_mut().end_gesture();
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&self) -> bool {
        self.session.borrow_mut().undo()
    }

    pub fn redo(&self) -> bool {
        self.session.borrow_mut().redo()
    }

    pub fn restore(&self, index: usize) -> bool {
        self.session.borrow_mut().restore(index)
    }

    pub fn can_undo(&self) -> bool {
        self.session.borrow().history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.borrow().history().can_redo()
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Live layers as a JSON array.
    pub fn layers_json(&self) -> String {
        serde_json::to_string(self.session.borrow().stage().layers())
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Groups as a JSON array.
    pub fn groups_json(&self) -> String {
        serde_json::to_string(self.session.borrow().stage().groups())
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Pending operations as a JSON array.
    pub fn pending_operations_json(&self) -> String {
        serde_json::to_string(self.session.borrow().stage().pending_operations())
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Bumped on every stage mutation; poll to refresh a layer panel.
    pub fn revision(&self) -> f64 {
        self.session.borrow().stage().revision() as f64
    }

    pub fn is_hydrating(&self) -> bool {
        self.session.borrow().stage().is_hydrating()
    }

    pub fn selected_layer(&self) -> Option<String> {
        self.session
            .borrow()
            .adapter()
            .selected()
            .map(|id| id.as_str().to_string())
    }

    // ─── Layer panel ─────────────────────────────────────────────────────

    pub fn select_layer(&self, id: Option<String>) -> bool {
        let id = id.as_deref().map(LayerId::intern);
        self.session.borrow_mut().select(id)
    }

    pub fn set_layer_visibility(&self, id: &str, visible: bool) {
        self.session
            .borrow_mut()
            .set_layer_visibility(LayerId::intern(id), visible);
    }

    pub fn set_layer_opacity(&self, id: &str, opacity: f64) {
        self.session
            .borrow_mut()
            .set_layer_opacity(LayerId::intern(id), opacity);
    }

    pub fn toggle_lock(&self, id: &str) -> Option<bool> {
        self.session.borrow_mut().toggle_lock(LayerId::intern(id))
    }

    pub fn rename_layer(&self, id: &str, name: &str) {
        self.session
            .borrow_mut()
            .rename_layer(LayerId::intern(id), name);
    }

    pub fn reorder_layer(&self, id: &str, order: f64) {
        self.session
            .borrow_mut()
            .reorder_layer(LayerId::intern(id), order);
    }

    pub fn set_group_opacity(&self, id: &str, opacity: f64) {
        self.session
            .borrow_mut()
            .set_group_opacity(GroupId::intern(id), opacity);
    }

    pub fn set_group_visibility(&self, id: &str, visible: bool) {
        self.session
            .borrow_mut()
            .set_group_visibility(GroupId::intern(id), visible);
    }

    // ─── Integrations ────────────────────────────────────────────────────

    pub fn mount_brief(&mut self, id: Option<String>, initial: Option<String>, flatten: bool) {
        let brief = BriefLayer::new(id.as_deref(), flatten);
        let mut session = self.session.borrow_mut();
        brief.mount(session.stage_mut(), initial);
        session.sync();
        self.brief = Some(brief);
    }

    pub fn brief_changed(&self, content: String) {
        if let Some(brief) = &self.brief {
            brief.on_change(self.session.borrow_mut().stage_mut(), content);
        }
    }

    pub fn unmount_brief(&mut self) {
        if let Some(brief) = self.brief.take() {
            let mut session = self.session.borrow_mut();
            brief.unmount(session.stage_mut());
            session.sync();
        }
    }

    pub fn mount_moodboard(&mut self, id: Option<String>) {
        let board = MoodboardLayer::new(id.as_deref());
        let mut session = self.session.borrow_mut();
        board.mount(session.stage_mut());
        session.sync();
        self.moodboard = Some(board);
    }

    /// Replace the sticker list. Returns `false` if `stickers_json` is not
    /// a JSON array.
    pub fn sync_stickers(&self, stickers_json: &str) -> bool {
        let Some(board) = &self.moodboard else {
            return false;
        };
        let stickers: Vec<Sticker> = match serde_json::from_str(stickers_json) {
            Ok(s) => s,
            Err(_) => return false,
        };
        board.sync_stickers(self.session.borrow_mut().stage_mut(), stickers);
        true
    }

    pub fn unmount_moodboard(&mut self) {
        if let Some(board) = self.moodboard.take() {
            let mut session = self.session.borrow_mut();
            board.unmount(session.stage_mut());
            session.sync();
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Load a project. Resolves to `remote`, `legacy`, `fallback`, `failed`,
    /// or `detached`.
    pub fn hydrate(&self, project_id: Option<String>, fallback_json: Option<String>) -> Promise {
        let fallback = fallback_json.and_then(|json| {
            serde_json::from_str::<Vec<LayerEntity>>(&json)
                .map_err(|err| log::warn!("ignoring invalid fallback layers: {err}"))
                .ok()
        });
        let session = Rc::clone(&self.session);
        let gateway = Rc::clone(&self.gateway);
        future_to_promise(async move {
            let outcome = gateway
                .hydrate(&*session, project_id.as_deref(), fallback)
                .await;
            let label = match outcome {
                HydrateOutcome::Remote { .. } => "remote",
                HydrateOutcome::Legacy { .. } => "legacy",
                HydrateOutcome::Fallback { .. } => "fallback",
                HydrateOutcome::Failed(_) => "failed",
                HydrateOutcome::Detached => "detached",
            };
            Ok(JsValue::from_str(label))
        })
    }

    /// Flush pending operations. Resolves to `idle`, `saved`, or `failed`.
    pub fn commit(&self, silent: bool) -> Promise {
        let session = Rc::clone(&self.session);
        let gateway = Rc::clone(&self.gateway);
        future_to_promise(async move {
            let outcome = gateway
                .commit(&*session, CommitOptions { silent })
                .await;
            let label = match outcome {
                CommitOutcome::Idle => "idle",
                CommitOutcome::Saved { .. } => "saved",
                CommitOutcome::Failed(_) => "failed",
            };
            Ok(JsValue::from_str(label))
        })
    }

    /// Call from `beforeunload`. Returns whether a beacon was queued.
    pub fn flush_on_exit(&self) -> bool {
        self.gateway.flush_on_exit(&*self.session, &NavigatorBeacon)
    }
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("layer stage WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone conversion (no session needed) ───────────────────────────

/// Convert a legacy serialized canvas into a JSON layer array.
/// Unparseable input yields `[]`.
#[wasm_bindgen]
pub fn layers_from_canvas_json(json: &str) -> String {
    let layers = stage_core::surface::surface_json_to_layers(json);
    serde_json::to_string(&layers).unwrap_or_else(|_| "[]".to_string())
}
