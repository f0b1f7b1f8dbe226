//! Renderer backend capability.
//!
//! The actual renderer is an external collaborator consumed through this
//! trait. Edits are scoped to scene paths; a backend that cannot apply an
//! edit live returns [`EditRejected`](crate::StrataError::EditRejected),
//! which the driver recovers from by restarting the render.

use glam::Mat4;

use crate::errors::Result;
use crate::graph::value::Value;
use crate::scene::globals::RenderGlobals;
use crate::scene::object::SceneObject;
use crate::scene::path::ScenePath;

/// Edit API of an external renderer.
///
/// Edits arrive on a single logical channel, in the order they were
/// coalesced; edits for paths with an ancestor/descendant relationship
/// are never reordered relative to each other.
pub trait RenderBackend: Send {
    /// Opens the render session.
    fn open(&mut self) -> Result<()>;

    /// Tears the session down. Must be safe to call when already closed.
    fn close(&mut self);

    /// Declares the render outputs. Called once per session, immediately
    /// after `open`; output changes are not live-editable.
    fn set_outputs(&mut self, globals: &RenderGlobals) -> Result<()>;

    /// Creates the object at `path` with its world transform.
    fn create_object(
        &mut self,
        path: &ScenePath,
        object: &SceneObject,
        world: &Mat4,
    ) -> Result<()>;

    /// Live-edits one parameter of an existing object.
    fn update_parameter(&mut self, path: &ScenePath, name: &str, value: &Value) -> Result<()>;

    /// Live-edits the world transform of an existing object.
    fn update_transform(&mut self, path: &ScenePath, world: &Mat4) -> Result<()>;

    /// Removes the object at `path`.
    fn remove_object(&mut self, path: &ScenePath) -> Result<()>;
}
