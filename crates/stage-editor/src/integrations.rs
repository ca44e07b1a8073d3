//! Content integrations that own one layer each: the brief text editor and
//! the moodboard sticker board.
//!
//! Each registers its default group on mount (never overwriting a group the
//! document already carries), adds its layer, and removes it silently on
//! unmount so closing a panel never deletes the layer remotely.

use crate::store::{LayerStage, MutationOptions, RegisterOptions};
use stage_core::groups::{BRIEF_GROUP, MOODBOARD_GROUP};
use stage_core::model::*;
use stage_core::{GroupId, LayerId};

// ─── Brief ───────────────────────────────────────────────────────────────

pub struct BriefLayer {
    id: LayerId,
    flatten: bool,
}

impl BriefLayer {
    pub const DEFAULT_ID: &'static str = "brief-root";
    pub const ORDER: f64 = -100.0;

    pub fn new(id: Option<&str>, flatten: bool) -> Self {
        Self {
            id: LayerId::intern(id.unwrap_or(Self::DEFAULT_ID)),
            flatten,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn mount(&self, stage: &mut LayerStage, initial: Option<String>) -> LayerEntity {
        stage.register_group(
            LayerGroupState::new(GroupId::intern(BRIEF_GROUP), "Brief"),
            RegisterOptions::default(),
        );
        stage.add_layer(LayerDraft {
            id: Some(self.id),
            name: Some("Brief".into()),
            kind: Some(LayerKind::Brief),
            order: Some(Self::ORDER),
            opacity: Some(1.0),
            visible: Some(true),
            locked: Some(false),
            source: Some(LayerSource::TextEditor),
            data: Some(self.document(initial)),
            ..Default::default()
        })
    }

    /// Replace the content without recording an operation, e.g. when the
    /// host reloads the editor from a saved value.
    pub fn refresh(&self, stage: &mut LayerStage, content: Option<String>) {
        stage.update_layer(self.id, self.data_patch(content), MutationOptions::SILENT);
    }

    /// The user edited the brief.
    pub fn on_change(&self, stage: &mut LayerStage, content: String) {
        stage.update_layer(
            self.id,
            self.data_patch(Some(content)),
            MutationOptions::default(),
        );
    }

    pub fn unmount(&self, stage: &mut LayerStage) {
        stage.remove_layer(self.id, MutationOptions::SILENT);
    }

    fn document(&self, content: Option<String>) -> LayerData {
        LayerData::TextDocument(TextDocument {
            content,
            flatten: self.flatten,
        })
    }

    fn data_patch(&self, content: Option<String>) -> LayerPatch {
        LayerPatch {
            data: Some(Some(self.document(content))),
            ..Default::default()
        }
    }
}

// ─── Moodboard ───────────────────────────────────────────────────────────

pub struct MoodboardLayer {
    id: LayerId,
}

impl MoodboardLayer {
    pub const DEFAULT_ID: &'static str = "moodboard-root";
    pub const ORDER: f64 = 200.0;

    pub fn new(id: Option<&str>) -> Self {
        Self {
            id: LayerId::intern(id.unwrap_or(Self::DEFAULT_ID)),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn mount(&self, stage: &mut LayerStage) -> LayerEntity {
        stage.register_group(
            LayerGroupState::new(GroupId::intern(MOODBOARD_GROUP), "Moodboard"),
            RegisterOptions::default(),
        );
        stage.add_layer(LayerDraft {
            id: Some(self.id),
            name: Some("Moodboard".into()),
            kind: Some(LayerKind::Moodboard),
            order: Some(Self::ORDER),
            opacity: Some(1.0),
            visible: Some(true),
            locked: Some(false),
            source: Some(LayerSource::StickerBoard),
            data: Some(LayerData::Stickers(Vec::new())),
            ..Default::default()
        })
    }

    /// The sticker board changed.
    pub fn sync_stickers(&self, stage: &mut LayerStage, stickers: Vec<Sticker>) {
        stage.update_layer(
            self.id,
            LayerPatch {
                kind: Some(LayerKind::Moodboard),
                source: Some(Some(LayerSource::StickerBoard)),
                data: Some(Some(LayerData::Stickers(stickers))),
                ..Default::default()
            },
            MutationOptions::default(),
        );
    }

    pub fn unmount(&self, stage: &mut LayerStage) {
        stage.remove_layer(self.id, MutationOptions::SILENT);
    }
}
