//! Action execution for Deo.
//!
//! The executor turns model-requested actions into filesystem and editor
//! changes, confined to the workspace root:
//! create folders, write files, insert code into the active document.

pub mod executor;
pub mod normalize;
pub mod surface;

pub use executor::ActionExecutor;
pub use normalize::decode_escapes;
pub use surface::{FileSurface, MemorySurface};
