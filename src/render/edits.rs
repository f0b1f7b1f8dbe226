//! Render edits and the coalescing queue.

use glam::Mat4;
use rustc_hash::FxHashMap;

use std::sync::Arc;

use crate::graph::value::Value;
use crate::scene::object::SceneObject;
use crate::scene::path::ScenePath;

/// One unit of change destined for the renderer backend.
#[derive(Debug, Clone)]
pub enum RenderEdit {
    Create {
        path: ScenePath,
        object: Arc<SceneObject>,
        world: Mat4,
    },
    UpdateParameter {
        path: ScenePath,
        name: String,
        value: Value,
    },
    UpdateTransform {
        path: ScenePath,
        world: Mat4,
    },
    Remove {
        path: ScenePath,
    },
}

impl RenderEdit {
    #[must_use]
    pub fn path(&self) -> &ScenePath {
        match self {
            RenderEdit::Create { path, .. }
            | RenderEdit::UpdateParameter { path, .. }
            | RenderEdit::UpdateTransform { path, .. }
            | RenderEdit::Remove { path } => path,
        }
    }

    fn key(&self) -> EditKey {
        let kind = match self {
            RenderEdit::Create { .. } => EditKind::Create,
            RenderEdit::UpdateParameter { name, .. } => EditKind::Parameter(name.clone()),
            RenderEdit::UpdateTransform { .. } => EditKind::Transform,
            RenderEdit::Remove { .. } => EditKind::Remove,
        };
        EditKey {
            path: self.path().clone(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EditKind {
    Create,
    Parameter(String),
    Transform,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EditKey {
    path: ScenePath,
    kind: EditKind,
}

/// Ordered, coalescing edit queue.
///
/// Edits keep their first-enqueued position; a later edit with the same
/// (path, kind) replaces the queued value in place, so multiple dirty
/// events for one location/parameter collapse to the last value. A
/// removal drops queued edits for strictly nested paths — those objects
/// are about to vanish, and an update must never reference a path under a
/// delivered removal.
#[derive(Default)]
pub struct EditQueue {
    order: Vec<EditKey>,
    edits: FxHashMap<EditKey, RenderEdit>,
}

impl EditQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: RenderEdit) {
        if let RenderEdit::Remove { path } = &edit {
            let path = path.clone();
            let edits = &mut self.edits;
            self.order.retain(|key| {
                let nested = key.path.starts_with(&path) && key.path != path;
                if nested {
                    edits.remove(key);
                }
                !nested
            });
        }
        let key = edit.key();
        if self.edits.insert(key.clone(), edit).is_none() {
            self.order.push(key);
        }
    }

    /// Queued edits in delivery order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<RenderEdit> {
        let mut drained = Vec::with_capacity(self.order.len());
        for key in self.order.drain(..) {
            if let Some(edit) = self.edits.remove(&key) {
                drained.push(edit);
            }
        }
        drained
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.edits.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::bound::Bound3;

    fn update(path: &str, name: &str, value: f32) -> RenderEdit {
        RenderEdit::UpdateParameter {
            path: ScenePath::parse(path),
            name: name.to_owned(),
            value: Value::Float(value),
        }
    }

    #[test]
    fn same_key_coalesces_to_last_value_in_place() {
        let mut queue = EditQueue::new();
        queue.push(update("/a", "intensity", 1.0));
        queue.push(update("/b", "intensity", 2.0));
        queue.push(update("/a", "intensity", 3.0));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        // "/a" keeps its original position but carries the last value.
        match &drained[0] {
            RenderEdit::UpdateParameter { path, value, .. } => {
                assert_eq!(path, &ScenePath::parse("/a"));
                assert_eq!(value, &Value::Float(3.0));
            }
            other => panic!("unexpected edit {other:?}"),
        }
    }

    #[test]
    fn removal_drops_nested_edits_only() {
        let mut queue = EditQueue::new();
        queue.push(update("/group/plane", "width", 2.0));
        queue.push(update("/other", "width", 4.0));
        queue.push(RenderEdit::Remove {
            path: ScenePath::parse("/group"),
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path(), &ScenePath::parse("/other"));
        assert!(matches!(drained[1], RenderEdit::Remove { .. }));
    }

    #[test]
    fn remove_then_create_preserves_order() {
        let mut queue = EditQueue::new();
        let path = ScenePath::parse("/light");
        queue.push(RenderEdit::Remove { path: path.clone() });
        queue.push(RenderEdit::Create {
            path: path.clone(),
            object: Arc::new(SceneObject::new("light:spot", Bound3::EMPTY)),
            world: Mat4::IDENTITY,
        });

        let drained = queue.drain();
        assert!(matches!(drained[0], RenderEdit::Remove { .. }));
        assert!(matches!(drained[1], RenderEdit::Create { .. }));
    }
}
