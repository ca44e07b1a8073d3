pub mod adapter;
pub mod config;
pub mod history;
pub mod integrations;
pub mod session;
pub mod store;
pub mod surface;

pub use adapter::{CanvasAdapter, SurfaceSync};
pub use config::StageConfig;
pub use history::HistoryManager;
pub use session::EditorSession;
pub use store::{LayerStage, MutationOptions, PendingBatch, RegisterOptions, StageChange};
pub use surface::{DrawingSurface, MemorySurface, SurfaceEvent, SurfaceProperty};
