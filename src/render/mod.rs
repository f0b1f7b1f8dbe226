//! Incremental interactive rendering.
//!
//! The driver listens for dirty events, classifies what changed, and
//! issues minimal edit calls to an external renderer backend instead of
//! restarting the render on every graph change.

pub mod backend;
pub mod driver;
pub mod edits;

pub use backend::RenderBackend;
pub use driver::{LocationChanges, RenderDriver, RenderState};
pub use edits::{EditQueue, RenderEdit};
