//! Group derivation: bucket layers into named groups.
//!
//! Membership is always a pure function of the live layers. Only a group's
//! identity and its own settings (`name`, `opacity`, `visible`) carry over
//! from the previous derivation, so re-deriving never compounds.

use crate::id::GroupId;
use crate::model::{LayerEntity, LayerGroupState, LayerKind, LayerSource};
use std::collections::HashMap;

pub const BRIEF_GROUP: &str = "brief";
pub const CANVAS_GROUP: &str = "canvas";
pub const MOODBOARD_GROUP: &str = "moodboard";

/// The buckets every document has, in display order.
pub const DEFAULT_GROUPS: [(&str, &str); 3] = [
    (BRIEF_GROUP, "Brief"),
    (CANVAS_GROUP, "Canvas"),
    (MOODBOARD_GROUP, "Moodboard"),
];

pub fn is_default_group(id: GroupId) -> bool {
    DEFAULT_GROUPS.iter().any(|(d, _)| id.as_str() == *d)
}

/// Which bucket a layer belongs to.
pub fn group_for_layer(layer: &LayerEntity) -> GroupId {
    if layer.kind == LayerKind::Brief || layer.source == Some(LayerSource::TextEditor) {
        return GroupId::intern(BRIEF_GROUP);
    }
    if layer.kind == LayerKind::Moodboard || layer.source == Some(LayerSource::StickerBoard) {
        return GroupId::intern(MOODBOARD_GROUP);
    }
    if layer.kind == LayerKind::Group
        && let Some(hint) = layer.group_hint()
    {
        return hint;
    }
    GroupId::intern(CANVAS_GROUP)
}

/// Recompute every group's membership from `layers`.
///
/// Output order: the default buckets, then previously known custom groups in
/// their previous order, then custom buckets first required by a layer's
/// `meta.groupId` hint (named after their id).
pub fn derive_groups(
    layers: &[LayerEntity],
    previous: &[LayerGroupState],
) -> Vec<LayerGroupState> {
    let carried = |id: GroupId, name: &str| -> LayerGroupState {
        match previous.iter().find(|g| g.id == id) {
            Some(prev) => LayerGroupState {
                layer_ids: Vec::new(),
                ..prev.clone()
            },
            None => LayerGroupState::new(id, name),
        }
    };

    let mut groups: Vec<LayerGroupState> = DEFAULT_GROUPS
        .iter()
        .map(|(id, name)| carried(GroupId::intern(id), name))
        .collect();

    for prev in previous {
        if !is_default_group(prev.id) && !groups.iter().any(|g| g.id == prev.id) {
            groups.push(LayerGroupState {
                layer_ids: Vec::new(),
                ..prev.clone()
            });
        }
    }

    let mut slot: HashMap<GroupId, usize> =
        groups.iter().enumerate().map(|(i, g)| (g.id, i)).collect();

    for layer in layers {
        let target = group_for_layer(layer);
        let idx = *slot.entry(target).or_insert_with(|| {
            groups.push(LayerGroupState::new(target, target.as_str()));
            groups.len() - 1
        });
        groups[idx].layer_ids.push(layer.id);
    }

    groups
}
