//! The drawing-surface seam.
//!
//! A [`DrawingSurface`] is whatever owns the native objects: a browser
//! canvas library behind wasm-bindgen, or [`MemorySurface`] in tests and
//! headless tools. The adapter only ever talks to it through this trait.

use stage_core::surface::{SurfaceObject, SurfaceSnapshot};
use stage_core::LayerId;

/// Native object lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Added(Option<LayerId>),
    Modified(Option<LayerId>),
    Removed(Option<LayerId>),
}

impl SurfaceEvent {
    pub fn target(&self) -> Option<LayerId> {
        match self {
            Self::Added(id) | Self::Modified(id) | Self::Removed(id) => *id,
        }
    }
}

/// A native property the stage writes back.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceProperty {
    Name(String),
    Order(f64),
    Visible(bool),
    Opacity(f64),
    /// Locks both movement axes and makes the object unselectable.
    Locked(bool),
}

impl SurfaceProperty {
    /// Write this property onto a serialized object.
    pub fn apply_to(&self, obj: &mut SurfaceObject) {
        match self {
            Self::Name(name) => obj.name = Some(name.clone()),
            Self::Order(order) => obj.order = Some(*order),
            Self::Visible(visible) => obj.visible = Some(*visible),
            Self::Opacity(opacity) => obj.opacity = Some(*opacity),
            Self::Locked(locked) => obj.set_locked(*locked),
        }
    }
}

pub trait DrawingSurface {
    /// Every live object, serialized, in z-order.
    fn objects(&self) -> Vec<SurfaceObject>;

    /// Write one property onto the object with `id`. Returns `false` when no
    /// such object exists.
    fn set_property(&mut self, id: LayerId, property: &SurfaceProperty) -> bool;

    fn request_render(&mut self);

    /// Set the id of the object at z-index `index`, for objects that were
    /// created without one. Returns `false` when unsupported or out of range.
    fn assign_id(&mut self, _index: usize, _id: LayerId) -> bool {
        false
    }

    /// Replace every object with the contents of `snapshot`.
    fn load_snapshot(&mut self, snapshot: &SurfaceSnapshot);

    /// Lifecycle events raised since the last call.
    fn take_events(&mut self) -> Vec<SurfaceEvent>;

    fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot::new(self.objects())
    }
}

// ─── In-memory surface ───────────────────────────────────────────────────

/// A headless surface. Like real canvas libraries it raises events for
/// programmatic writes too, so echo suppression is exercised.
#[derive(Debug, Default)]
pub struct MemorySurface {
    objects: Vec<SurfaceObject>,
    events: Vec<SurfaceEvent>,
    renders: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object on top. Objects without an id get one.
    pub fn add(&mut self, mut obj: SurfaceObject) -> LayerId {
        let id = match obj.id.as_deref() {
            Some(id) if !id.is_empty() => LayerId::intern(id),
            _ => LayerId::with_prefix(obj.kind.as_deref().unwrap_or("object")),
        };
        obj.id = Some(id.as_str().to_string());
        self.objects.push(obj);
        self.events.push(SurfaceEvent::Added(Some(id)));
        id
    }

    /// Mutate an object in place, as a user interaction would.
    pub fn modify(&mut self, id: LayerId, f: impl FnOnce(&mut SurfaceObject)) -> bool {
        let Some(obj) = self.find_mut(id) else {
            return false;
        };
        f(obj);
        self.events.push(SurfaceEvent::Modified(Some(id)));
        true
    }

    pub fn remove(&mut self, id: LayerId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id.as_deref() != Some(id.as_str()));
        if self.objects.len() == before {
            return false;
        }
        self.events.push(SurfaceEvent::Removed(Some(id)));
        true
    }

    pub fn get(&self, id: LayerId) -> Option<&SurfaceObject> {
        self.objects
            .iter()
            .find(|o| o.id.as_deref() == Some(id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// How many renders were requested so far.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    fn find_mut(&mut self, id: LayerId) -> Option<&mut SurfaceObject> {
        self.objects
            .iter_mut()
            .find(|o| o.id.as_deref() == Some(id.as_str()))
    }
}

impl DrawingSurface for MemorySurface {
    fn objects(&self) -> Vec<SurfaceObject> {
        self.objects.clone()
    }

    fn set_property(&mut self, id: LayerId, property: &SurfaceProperty) -> bool {
        let Some(obj) = self.find_mut(id) else {
            return false;
        };
        property.apply_to(obj);
        self.events.push(SurfaceEvent::Modified(Some(id)));
        true
    }

    fn request_render(&mut self) {
        self.renders += 1;
    }

    fn assign_id(&mut self, index: usize, id: LayerId) -> bool {
        let Some(obj) = self.objects.get_mut(index) else {
            return false;
        };
        obj.id = Some(id.as_str().to_string());
        self.events.push(SurfaceEvent::Modified(Some(id)));
        true
    }

    fn load_snapshot(&mut self, snapshot: &SurfaceSnapshot) {
        for old in self.objects.drain(..) {
            self.events
                .push(SurfaceEvent::Removed(old.id.as_deref().map(LayerId::intern)));
        }
        for obj in &snapshot.objects {
            self.objects.push(obj.clone());
            self.events
                .push(SurfaceEvent::Added(obj.id.as_deref().map(LayerId::intern)));
        }
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}
