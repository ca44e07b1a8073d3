//! `DrawingSurface` over a JavaScript canvas library.
//!
//! The host passes a bridge object wrapping its canvas; lifecycle callbacks
//! come back through [`crate::LayerStageHandle::surface_event`], which
//! buffers them in a queue shared with the surface.

use serde_json::Value;
use stage_core::LayerId;
use stage_core::surface::{SurfaceObject, SurfaceSnapshot};
use stage_editor::{DrawingSurface, SurfaceEvent, SurfaceProperty};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// Host-side canvas wrapper.
    pub type SurfaceBridge;

    /// `JSON.stringify(canvas.getObjects().map(o => o.toObject([...])))`.
    #[wasm_bindgen(method, js_name = objectsJson)]
    fn objects_json(this: &SurfaceBridge) -> String;

    /// Set one native field on the object with `id`; `false` if missing.
    #[wasm_bindgen(method, js_name = setProperty)]
    fn set_property(this: &SurfaceBridge, id: &str, key: &str, value: JsValue) -> bool;

    #[wasm_bindgen(method, js_name = requestRender)]
    fn request_render(this: &SurfaceBridge);

    /// Set the `id` of the object at z-index `index`; `false` if missing.
    #[wasm_bindgen(method, js_name = setIdAt)]
    fn set_id_at(this: &SurfaceBridge, index: usize, id: &str) -> bool;

    /// `canvas.loadFromJSON(json)`.
    #[wasm_bindgen(method, js_name = loadJson)]
    fn load_json(this: &SurfaceBridge, json: &str);
}

pub type EventQueue = Rc<RefCell<Vec<SurfaceEvent>>>;

pub struct JsSurface {
    bridge: SurfaceBridge,
    events: EventQueue,
}

impl JsSurface {
    pub fn new(bridge: SurfaceBridge, events: EventQueue) -> Self {
        Self { bridge, events }
    }
}

impl DrawingSurface for JsSurface {
    fn objects(&self) -> Vec<SurfaceObject> {
        let json = self.bridge.objects_json();
        serde_json::from_str(&json).unwrap_or_else(|err| {
            log::error!("surface bridge returned invalid objects: {err}");
            Vec::new()
        })
    }

    fn set_property(&mut self, id: LayerId, property: &SurfaceProperty) -> bool {
        let mut hit = false;
        for (key, value) in native_fields(property) {
            hit |= self.bridge.set_property(id.as_str(), key, to_js(&value));
        }
        hit
    }

    fn request_render(&mut self) {
        self.bridge.request_render();
    }

    fn assign_id(&mut self, index: usize, id: LayerId) -> bool {
        self.bridge.set_id_at(index, id.as_str())
    }

    fn load_snapshot(&mut self, snapshot: &SurfaceSnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => self.bridge.load_json(&json),
            Err(err) => log::error!("failed to serialize surface snapshot: {err}"),
        }
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

/// Native field writes for one property, using the canvas library's names.
pub(crate) fn native_fields(property: &SurfaceProperty) -> Vec<(&'static str, Value)> {
    match property {
        SurfaceProperty::Name(name) => vec![("name", Value::from(name.as_str()))],
        SurfaceProperty::Order(order) => vec![("order", Value::from(*order))],
        SurfaceProperty::Visible(visible) => vec![("visible", Value::from(*visible))],
        SurfaceProperty::Opacity(opacity) => vec![("opacity", Value::from(*opacity))],
        SurfaceProperty::Locked(locked) => vec![
            ("lockMovementX", Value::from(*locked)),
            ("lockMovementY", Value::from(*locked)),
            ("selectable", Value::from(!*locked)),
            ("evented", Value::from(!*locked)),
        ],
    }
}

fn to_js(value: &Value) -> JsValue {
    match value {
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Number(n) => JsValue::from_f64(n.as_f64().unwrap_or_default()),
        Value::String(s) => JsValue::from_str(s),
        _ => JsValue::NULL,
    }
}

/// Parse a host lifecycle callback (`object:added` etc.).
pub(crate) fn parse_event(kind: &str, id: Option<String>) -> Option<SurfaceEvent> {
    let id = id.filter(|s| !s.is_empty()).map(|s| LayerId::intern(&s));
    match kind.trim_start_matches("object:") {
        "added" => Some(SurfaceEvent::Added(id)),
        "modified" => Some(SurfaceEvent::Modified(id)),
        "removed" => Some(SurfaceEvent::Removed(id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lock_maps_to_four_native_fields() {
        let fields = native_fields(&SurfaceProperty::Locked(true));
        assert_eq!(
            fields,
            vec![
                ("lockMovementX", Value::from(true)),
                ("lockMovementY", Value::from(true)),
                ("selectable", Value::from(false)),
                ("evented", Value::from(false)),
            ]
        );
    }

    #[test]
    fn events_accept_library_names() {
        assert_eq!(
            parse_event("object:modified", Some("r1".into())),
            Some(SurfaceEvent::Modified(Some(LayerId::intern("r1"))))
        );
        assert_eq!(parse_event("removed", None), Some(SurfaceEvent::Removed(None)));
        assert_eq!(parse_event("selection:created", None), None);
    }
}
