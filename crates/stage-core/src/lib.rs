pub mod groups;
pub mod id;
pub mod model;
pub mod surface;

pub use groups::{BRIEF_GROUP, CANVAS_GROUP, MOODBOARD_GROUP, derive_groups, group_for_layer};
pub use id::{GroupId, LayerId};
pub use model::*;
pub use surface::{SurfaceObject, SurfaceSnapshot};
