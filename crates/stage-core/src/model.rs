//! Layer entity model for the design stage.
//!
//! A document is a flat, ordered list of [`LayerEntity`] values. Each layer is
//! one addressable visual or content unit: a native drawing-surface object, the
//! brief text document, the moodboard sticker board, or a synthetic group.
//! Layers are bucketed into [`LayerGroupState`]s by [`crate::groups::derive_groups`],
//! and every committed mutation is recorded as a [`LayerStageOperation`].

use crate::id::{GroupId, LayerId};
use crate::surface::SurfaceObject;
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

/// Free-form hints attached to a layer (e.g. an explicit `groupId`).
pub type LayerMeta = serde_json::Map<String, serde_json::Value>;

// ─── Kind & Source ───────────────────────────────────────────────────────

/// What a layer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Shape,
    Image,
    Text,
    Foreign,
    Group,
    Brief,
    Moodboard,
}

/// Provenance tag. Only consulted by group derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerSource {
    #[serde(rename = "fabric-like-surface", alias = "fabric")]
    Surface,
    #[serde(rename = "text-editor", alias = "lexical")]
    TextEditor,
    #[serde(rename = "sticker-board", alias = "moodboard")]
    StickerBoard,
    #[serde(rename = "external")]
    External,
}

// ─── Payload ─────────────────────────────────────────────────────────────

/// Serialized document of the brief text editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextDocument {
    /// Editor-serialized content; `None` until the editor produced output.
    pub content: Option<String>,
    #[serde(default)]
    pub flatten: bool,
}

/// One moodboard sticker. Opaque to the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sticker(pub serde_json::Value);

/// Opaque per-layer payload. The store never inspects it; it only replaces it
/// wholesale. Tagged so consumers can tell payload kinds apart without probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum LayerData {
    NativeSurface(SurfaceObject),
    TextDocument(TextDocument),
    Stickers(Vec<Sticker>),
}

impl LayerData {
    /// Read a stored payload. Besides the tagged form, accepts the untagged
    /// shapes older documents carry: `{fabric}`, `{content, flatten}` and
    /// `{stickers}`. Anything else is dropped with a warning.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        if value.is_null() {
            return None;
        }
        let Value::Object(mut map) = value else {
            log::warn!("ignoring non-object layer data");
            return None;
        };

        if map.contains_key("kind") {
            return serde_json::from_value(Value::Object(map))
                .map_err(|err| log::warn!("ignoring malformed layer data: {err}"))
                .ok();
        }
        if let Some(obj) = map.remove("fabric") {
            return serde_json::from_value(obj)
                .map(Self::NativeSurface)
                .map_err(|err| log::warn!("ignoring malformed native payload: {err}"))
                .ok();
        }
        if let Some(stickers) = map.remove("stickers") {
            return match stickers {
                Value::Array(items) => Some(Self::Stickers(items.into_iter().map(Sticker).collect())),
                _ => {
                    log::warn!("ignoring non-array sticker payload");
                    None
                }
            };
        }
        if map.contains_key("content") || map.contains_key("flatten") {
            let content = match map.remove("content") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s),
                Some(other) => Some(other.to_string()),
            };
            let flatten = map.get("flatten").and_then(Value::as_bool).unwrap_or(false);
            return Some(Self::TextDocument(TextDocument { content, flatten }));
        }

        log::warn!("ignoring layer data of unknown shape");
        None
    }
}

fn lenient_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<LayerData>, D::Error> {
    Ok(LayerData::from_value(serde_json::Value::deserialize(deserializer)?))
}

// ─── Layer ───────────────────────────────────────────────────────────────

/// The canonical, serializable representation of one layer.
///
/// Deserialization goes through [`LayerDraft`], so remote payloads with
/// missing fields are coerced instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LayerDraft")]
pub struct LayerEntity {
    pub id: LayerId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    /// Z-order / sequence key. Ties keep insertion order.
    pub order: f64,
    /// Always within `[0, 1]`.
    pub opacity: f64,
    pub visible: bool,
    pub locked: bool,
    /// Informational back-reference; never used for cascading deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<LayerId>,
    #[serde(skip_serializing_if = "SmallVec::is_empty")]
    pub children: SmallVec<[LayerId; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LayerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<LayerSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<LayerMeta>,
}

impl LayerEntity {
    /// A layer with every field defaulted except `id` and `kind`.
    pub fn new(id: LayerId, kind: LayerKind) -> Self {
        LayerDraft {
            id: Some(id),
            kind: Some(kind),
            ..Default::default()
        }
        .coerce()
    }

    /// The explicit `meta.groupId` hint, if any. Numbers are accepted and
    /// stringified.
    pub fn group_hint(&self) -> Option<GroupId> {
        match self.meta.as_ref()?.get("groupId")? {
            serde_json::Value::String(s) if !s.is_empty() => Some(GroupId::intern(s)),
            serde_json::Value::Number(n) => Some(GroupId::intern(&n.to_string())),
            _ => None,
        }
    }

    /// Merge `patch` into this layer, then re-establish the field invariants.
    pub fn apply(&mut self, patch: &LayerPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(children) = &patch.children {
            self.children.clone_from(children);
        }
        if let Some(data) = &patch.data {
            self.data.clone_from(data);
        }
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(meta) = &patch.meta {
            self.meta.clone_from(meta);
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.order = sanitize_order(self.order);
        self.opacity = sanitize_opacity(self.opacity);
    }
}

fn sanitize_order(order: f64) -> f64 {
    if order.is_finite() { order } else { 0.0 }
}

fn sanitize_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// A partially specified layer. Every omitted field gets a default on
/// [`LayerDraft::coerce`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDraft {
    pub id: Option<LayerId>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<LayerKind>,
    pub order: Option<f64>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub parent_id: Option<LayerId>,
    pub children: Option<SmallVec<[LayerId; 4]>>,
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Option<LayerData>,
    pub source: Option<LayerSource>,
    pub meta: Option<LayerMeta>,
}

impl LayerDraft {
    /// Fill omitted fields with defaults. Never rejects input.
    pub fn coerce(self) -> LayerEntity {
        let mut layer = LayerEntity {
            id: self.id.unwrap_or_else(LayerId::generate),
            name: self.name.unwrap_or_else(|| "Layer".to_string()),
            kind: self.kind.unwrap_or_default(),
            order: self.order.unwrap_or(0.0),
            opacity: self.opacity.unwrap_or(1.0),
            visible: self.visible.unwrap_or(true),
            locked: self.locked.unwrap_or(false),
            parent_id: self.parent_id,
            children: self.children.unwrap_or_default(),
            data: self.data,
            source: self.source,
            meta: self.meta,
        };
        layer.normalize();
        layer
    }
}

impl From<LayerDraft> for LayerEntity {
    fn from(draft: LayerDraft) -> Self {
        draft.coerce()
    }
}

impl From<LayerEntity> for LayerDraft {
    fn from(layer: LayerEntity) -> Self {
        Self {
            id: Some(layer.id),
            name: Some(layer.name),
            kind: Some(layer.kind),
            order: Some(layer.order),
            opacity: Some(layer.opacity),
            visible: Some(layer.visible),
            locked: Some(layer.locked),
            parent_id: layer.parent_id,
            children: Some(layer.children),
            data: layer.data,
            source: layer.source,
            meta: layer.meta,
        }
    }
}

// ─── Patch ───────────────────────────────────────────────────────────────

/// Partial changes to a layer. `None` means "unchanged"; for optional fields,
/// `Some(None)` clears the value (serialized as `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<LayerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub parent_id: Option<Option<LayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<SmallVec<[LayerId; 4]>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub data: Option<Option<LayerData>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub source: Option<Option<LayerSource>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub meta: Option<Option<LayerMeta>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! diff_field {
    ($patch:ident, $prev:ident, $next:ident, $field:ident) => {
        if $prev.$field != $next.$field {
            $patch.$field = Some($next.$field.clone());
        }
    };
}

impl LayerPatch {
    /// Field-level difference: only the fields of `next` that differ from
    /// `prev`. Payloads are compared structurally, so key order in
    /// serialized objects never matters.
    pub fn between(prev: &LayerEntity, next: &LayerEntity) -> Self {
        let mut patch = LayerPatch::default();
        diff_field!(patch, prev, next, name);
        diff_field!(patch, prev, next, kind);
        diff_field!(patch, prev, next, order);
        diff_field!(patch, prev, next, opacity);
        diff_field!(patch, prev, next, visible);
        diff_field!(patch, prev, next, locked);
        diff_field!(patch, prev, next, parent_id);
        diff_field!(patch, prev, next, children);
        diff_field!(patch, prev, next, data);
        diff_field!(patch, prev, next, source);
        diff_field!(patch, prev, next, meta);
        patch
    }

    pub fn is_empty(&self) -> bool {
        *self == LayerPatch::default()
    }

    /// Whether the patch touches a property the drawing surface renders
    /// directly (visibility, opacity, lock).
    pub fn touches_visuals(&self) -> bool {
        self.visible.is_some() || self.opacity.is_some() || self.locked.is_some()
    }
}

// ─── Groups ──────────────────────────────────────────────────────────────

/// A named, independently stylable bucket of layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerGroupState {
    pub id: GroupId,
    pub name: String,
    pub opacity: f64,
    pub visible: bool,
    /// Recomputed from the live layers on every store mutation.
    #[serde(default)]
    pub layer_ids: Vec<LayerId>,
}

impl LayerGroupState {
    /// A fresh, empty, fully visible group.
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            opacity: 1.0,
            visible: true,
            layer_ids: Vec::new(),
        }
    }
}

// ─── Operations ──────────────────────────────────────────────────────────

/// One committed mutation awaiting persistence. Append-only: never mutated
/// after being enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerStageOperation {
    AddLayer { layer: LayerEntity },
    UpdateLayer { id: LayerId, changes: LayerPatch },
    RemoveLayer { id: LayerId },
    ReorderLayer { id: LayerId, order: f64 },
    SetGroupOpacity { id: GroupId, opacity: f64 },
    SetGroupVisibility { id: GroupId, visible: bool },
    RegisterGroup { group: LayerGroupState },
}

/// Layers plus groups: the full renderable state of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStageSnapshot {
    pub layers: Vec<LayerEntity>,
    pub groups: Vec<LayerGroupState>,
}
