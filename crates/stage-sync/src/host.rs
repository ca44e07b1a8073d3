//! Access to the stage across `.await` points.
//!
//! The gateway never holds a borrow while a request is in flight: it reads
//! or mutates the stage in short synchronous closures, so the user can keep
//! editing while a fetch or commit is pending.

use stage_editor::{DrawingSurface, EditorSession, LayerStage};
use std::cell::RefCell;

pub trait StageHost {
    /// Run `f` against the live stage.
    fn update<R>(&self, f: impl FnOnce(&mut LayerStage) -> R) -> R;

    /// Called after the stage was hydrated so mirrors can reload.
    fn hydrated(&self) {}
}

impl StageHost for RefCell<LayerStage> {
    fn update<R>(&self, f: impl FnOnce(&mut LayerStage) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

impl<S: DrawingSurface> StageHost for RefCell<EditorSession<S>> {
    fn update<R>(&self, f: impl FnOnce(&mut LayerStage) -> R) -> R {
        f(self.borrow_mut().stage_mut())
    }

    fn hydrated(&self) {
        self.borrow_mut().sync();
    }
}
