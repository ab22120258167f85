pub mod calendar;
pub mod ids;
pub mod link;
pub mod project;
pub mod snapshot;
pub mod task;
pub mod view;

// Re-export commonly used types at the model level.
pub use calendar::WorkCalendar;
pub use ids::{ItemId, ROOT_ID};
pub use link::{Link, LinkKind};
pub use project::{Project, Removal};
pub use snapshot::{LinkRef, ProjectSnapshot, TaskRef, DEFAULT_SNAPSHOT_LIMIT};
pub use task::{Task, TaskKind, TaskPaint, TaskPatch};
pub use view::{Marker, Scale, ScaleUnit, Skin, ViewConfig, ZoomLevel};
