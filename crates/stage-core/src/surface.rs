//! Native drawing-surface objects and their conversion into layers.
//!
//! A [`SurfaceObject`] is the serialized form a drawing library produces for
//! one object (`toObject()`): a handful of well-known fields plus arbitrary
//! geometry. A [`SurfaceSnapshot`] is a whole serialized surface, which is
//! also the legacy `canvasJson` document format.

use crate::id::LayerId;
use crate::model::{LayerData, LayerDraft, LayerEntity, LayerKind, LayerSource};
use serde::{Deserialize, Deserializer, Serialize};

/// One serialized native object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceObject {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_id"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Native kind, e.g. `rect`, `i-text`, `path`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_movement_x: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_movement_y: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evented: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    /// Geometry and everything else the stage does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accept string or numeric ids; surfaces often number anonymous objects.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    )
}

impl SurfaceObject {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    /// Locked means both movement axes are locked.
    pub fn is_locked(&self) -> bool {
        self.lock_movement_x.unwrap_or(false) && self.lock_movement_y.unwrap_or(false)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.lock_movement_x = Some(locked);
        self.lock_movement_y = Some(locked);
        self.selectable = Some(!locked);
        self.evented = Some(!locked);
    }
}

/// A whole serialized surface: `{ "objects": [...], ...background/version }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    #[serde(default)]
    pub objects: Vec<SurfaceObject>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SurfaceSnapshot {
    pub fn new(objects: Vec<SurfaceObject>) -> Self {
        Self {
            objects,
            extra: serde_json::Map::new(),
        }
    }

    /// A snapshot with zero objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Map a native kind onto the layer kind enum.
pub fn layer_kind_for(native: Option<&str>) -> LayerKind {
    match native {
        Some("i-text" | "textbox" | "text") => LayerKind::Text,
        Some("image") => LayerKind::Image,
        Some("rect" | "triangle" | "ellipse" | "circle" | "path" | "line" | "polygon") => {
            LayerKind::Shape
        }
        _ => LayerKind::Foreign,
    }
}

/// Convert one native object into a layer. `index` is its position on the
/// surface, used for the default name and order.
pub fn surface_object_to_layer(obj: &SurfaceObject, index: usize) -> LayerEntity {
    let id = match obj.id.as_deref() {
        Some(id) if !id.is_empty() => LayerId::intern(id),
        _ => LayerId::generate(),
    };
    let name = obj.name.clone().unwrap_or_else(|| {
        format!("{} {}", obj.kind.as_deref().unwrap_or("Layer"), index + 1)
    });

    LayerDraft {
        id: Some(id),
        name: Some(name),
        kind: Some(layer_kind_for(obj.kind.as_deref())),
        order: Some(obj.order.unwrap_or(index as f64)),
        opacity: Some(obj.opacity.unwrap_or(1.0)),
        visible: Some(obj.visible != Some(false)),
        locked: Some(obj.is_locked()),
        source: Some(LayerSource::Surface),
        data: Some(LayerData::NativeSurface(obj.clone())),
        ..Default::default()
    }
    .coerce()
}

/// Convert every object of a snapshot, sorted by order (stable).
pub fn snapshot_to_layers(snapshot: &SurfaceSnapshot) -> Vec<LayerEntity> {
    let mut layers: Vec<LayerEntity> = snapshot
        .objects
        .iter()
        .enumerate()
        .map(|(i, obj)| surface_object_to_layer(obj, i))
        .collect();
    layers.sort_by(|a, b| a.order.total_cmp(&b.order));
    layers
}

/// Parse a legacy serialized-surface document.
///
/// # Errors
/// Returns the JSON error if `json` is not a surface document.
pub fn parse_surface_json(json: &str) -> Result<SurfaceSnapshot, serde_json::Error> {
    serde_json::from_str(json)
}

/// Legacy `canvasJson` → layers. An unparseable document is treated as empty.
pub fn surface_json_to_layers(json: &str) -> Vec<LayerEntity> {
    if json.trim().is_empty() {
        return Vec::new();
    }
    match parse_surface_json(json) {
        Ok(snapshot) => snapshot_to_layers(&snapshot),
        Err(err) => {
            log::error!("failed to parse surface json: {err}");
            Vec::new()
        }
    }
}

/// The native payload carried by a layer, if it has one.
pub fn layer_to_surface_object(layer: &LayerEntity) -> Option<&SurfaceObject> {
    match &layer.data {
        Some(LayerData::NativeSurface(obj)) => Some(obj),
        _ => None,
    }
}

/// Replace a layer's native payload.
pub fn with_surface_object(mut layer: LayerEntity, obj: SurfaceObject) -> LayerEntity {
    layer.data = Some(LayerData::NativeSurface(obj));
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn native_kinds_map_to_layer_kinds() {
        assert_eq!(layer_kind_for(Some("i-text")), LayerKind::Text);
        assert_eq!(layer_kind_for(Some("image")), LayerKind::Image);
        assert_eq!(layer_kind_for(Some("path")), LayerKind::Shape);
        assert_eq!(layer_kind_for(Some("group")), LayerKind::Foreign);
        assert_eq!(layer_kind_for(None), LayerKind::Foreign);
    }

    #[test]
    fn object_becomes_layer() {
        let obj: SurfaceObject = serde_json::from_str(
            r#"{"id":7,"type":"rect","opacity":0.4,"visible":false,
                "lockMovementX":true,"lockMovementY":true,"left":10,"top":20}"#,
        )
        .unwrap();
        let layer = surface_object_to_layer(&obj, 2);

        assert_eq!(layer.id.as_str(), "7");
        assert_eq!(layer.name, "rect 3");
        assert_eq!(layer.kind, LayerKind::Shape);
        assert_eq!(layer.order, 2.0);
        assert_eq!(layer.opacity, 0.4);
        assert!(!layer.visible);
        assert!(layer.locked);
        assert_eq!(layer.source, Some(LayerSource::Surface));
        let native = layer_to_surface_object(&layer).unwrap();
        assert_eq!(native.extra["left"], serde_json::json!(10));
    }

    #[test]
    fn single_axis_lock_is_not_locked() {
        let mut obj = SurfaceObject::new("a", "rect");
        obj.lock_movement_x = Some(true);
        assert!(!surface_object_to_layer(&obj, 0).locked);
    }

    #[test]
    fn legacy_json_sorts_by_order() {
        let json = r#"{"version":"5.3.0","objects":[
            {"id":"top","type":"rect","order":5},
            {"id":"bottom","type":"circle","order":1}
        ]}"#;
        let layers = surface_json_to_layers(json);
        let ids: Vec<&str> = layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["bottom", "top"]);
    }

    #[test]
    fn malformed_legacy_json_is_empty() {
        assert!(surface_json_to_layers("{not json").is_empty());
        assert!(surface_json_to_layers("").is_empty());
        assert!(parse_surface_json("[1,2]").is_err());
    }

    #[test]
    fn extra_fields_survive_roundtrip() {
        let json = r##"{"objects":[{"id":"a","type":"rect","fill":"#f00"}],"background":"white"}"##;
        let snapshot = parse_surface_json(json).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["background"], serde_json::json!("white"));
        assert_eq!(value["objects"][0]["fill"], serde_json::json!("#f00"));
    }

    #[test]
    fn with_surface_object_replaces_payload() {
        let layer = surface_object_to_layer(&SurfaceObject::new("a", "rect"), 0);
        let mut replacement = SurfaceObject::new("a", "rect");
        replacement.opacity = Some(0.1);
        let layer = with_surface_object(layer, replacement.clone());
        assert_eq!(layer_to_surface_object(&layer), Some(&replacement));
    }
}
