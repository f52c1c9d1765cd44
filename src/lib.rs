pub mod seed;
pub mod sync;

pub use seed::{load_snapshot, parse_snapshot};
pub use sync::engine::{GallerySnapshot, SyncEngine};
pub use sync::runtime::SyncOrchestrator;
