//! Interactive render driver.
//!
//! Subscribes to the graph's dirty events and keeps an external renderer
//! backend in sync with the evaluated scene by issuing minimal edits
//! rather than re-rendering from scratch.
//!
//! # Lifecycle
//!
//! `Stopped → Running`: opens the backend, declares outputs, performs one
//! full scene traversal and creates every object. `Running → Paused`:
//! edit delivery is suspended; classified edits keep queueing and
//! coalescing. `Paused → Running`: the queue flushes in order. `→
//! Stopped`: backend teardown.
//!
//! # Classification
//!
//! Each dirty batch triggers a diff of the evaluated scene against the
//! last state delivered to the backend:
//! - parameter or transform change on an existing object → one cheap
//!   update call
//! - structural change (location added/removed, object type change,
//!   parameter removed) → remove + create for the affected subtree only
//! - render-output (globals) change → not live-editable; full restart
//!
//! A backend that rejects a live edit also triggers the restart fallback;
//! if the restart itself fails the session is dead and the error is
//! surfaced as `RestartFailed`.

use std::sync::Arc;

use bitflags::bitflags;
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::errors::{Result, StrataError};
use crate::graph::NodeKey;
use crate::graph::graph::{DirtyEvent, Graph};
use crate::render::backend::RenderBackend;
use crate::render::edits::{EditQueue, RenderEdit};
use crate::scene::globals::RenderGlobals;
use crate::scene::object::SceneObject;
use crate::scene::path::ScenePath;
use crate::scene::view::SceneView;

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Stopped,
    Running,
    Paused,
}

bitflags! {
    /// What changed at one scene location since the last delivery.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LocationChanges: u32 {
        const TRANSFORM = 1 << 0;
        const PARAMS    = 1 << 1;
        /// Type change or parameter removal; needs remove + create.
        const STRUCTURE = 1 << 2;
    }
}

struct Delivered {
    object: Arc<SceneObject>,
    world: Mat4,
}

/// Pushes the scene produced by one node to a [`RenderBackend`],
/// incrementally.
pub struct RenderDriver {
    scene_node: NodeKey,
    backend: Box<dyn RenderBackend>,
    state: RenderState,
    events: Option<flume::Receiver<DirtyEvent>>,
    delivered: FxHashMap<ScenePath, Delivered>,
    delivered_globals: Arc<RenderGlobals>,
    queue: EditQueue,
}

impl RenderDriver {
    #[must_use]
    pub fn new(scene_node: NodeKey, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            scene_node,
            backend,
            state: RenderState::Stopped,
            events: None,
            delivered: FxHashMap::default(),
            delivered_globals: Arc::new(RenderGlobals::new()),
            queue: EditQueue::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Starts (or resumes) the render. On a cold start this subscribes to
    /// dirty events, opens the backend and creates the whole scene.
    pub fn start(&mut self, graph: &mut Graph) -> Result<()> {
        match self.state {
            RenderState::Running => Ok(()),
            RenderState::Paused => self.resume(graph),
            RenderState::Stopped => {
                if self.events.is_none() {
                    self.events = Some(graph.subscribe());
                }
                self.open_session(graph)
            }
        }
    }

    /// Suspends edit delivery; edits keep queueing and coalescing.
    pub fn pause(&mut self) {
        if self.state == RenderState::Running {
            self.state = RenderState::Paused;
            log::info!("interactive render paused");
        }
    }

    /// Resumes a paused render and flushes queued edits in order.
    pub fn resume(&mut self, graph: &Graph) -> Result<()> {
        if self.state != RenderState::Paused {
            return Ok(());
        }
        self.state = RenderState::Running;
        log::info!("interactive render resumed ({} queued edits)", self.queue.len());
        self.flush(graph)
    }

    /// Stops the render and tears the backend session down.
    pub fn stop(&mut self) {
        if self.state == RenderState::Stopped {
            return;
        }
        self.backend.close();
        self.delivered.clear();
        self.delivered_globals = Arc::new(RenderGlobals::new());
        self.queue.clear();
        self.state = RenderState::Stopped;
        log::info!("interactive render stopped");
    }

    /// Drains pending dirty events and applies the edits they imply.
    ///
    /// While paused, edits queue; while running they deliver immediately.
    pub fn process_events(&mut self, graph: &Graph) -> Result<()> {
        let Some(events) = &self.events else {
            return Ok(());
        };
        let mut any = false;
        while events.try_recv().is_ok() {
            any = true;
        }
        if !any || self.state == RenderState::Stopped {
            return Ok(());
        }
        self.diff(graph)?;
        if self.state == RenderState::Running {
            self.flush(graph)?;
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn open_session(&mut self, graph: &Graph) -> Result<()> {
        self.backend.open()?;
        if let Err(err) = self.populate(graph) {
            self.backend.close();
            return Err(err);
        }
        self.state = RenderState::Running;
        log::info!(
            "interactive render started ({} objects)",
            self.delivered.len()
        );
        Ok(())
    }

    /// One full scene traversal: declares outputs and creates every
    /// object, recording the delivered state.
    fn populate(&mut self, graph: &Graph) -> Result<()> {
        let view = SceneView::new(graph, self.scene_node)?;
        let globals = view.globals()?;
        self.backend.set_outputs(&globals)?;
        self.delivered_globals = globals;

        let mut current = FxHashMap::default();
        collect_objects(&view, &ScenePath::root(), Mat4::IDENTITY, &mut current)?;

        let mut paths: Vec<ScenePath> = current.keys().cloned().collect();
        paths.sort_by_key(|p| (p.depth(), p.to_string()));
        for path in paths {
            let (object, world) = &current[&path];
            self.backend.create_object(&path, object, world)?;
        }

        self.delivered = current
            .into_iter()
            .map(|(path, (object, world))| (path, Delivered { object, world }))
            .collect();
        Ok(())
    }

    /// Diffs the evaluated scene against the delivered state, queueing the
    /// minimal edits.
    ///
    /// The queue is rebuilt from scratch: the delivered snapshot only
    /// moves on delivery, so the latest diff alone describes every
    /// pending edit and successive changes collapse to their last value.
    fn diff(&mut self, graph: &Graph) -> Result<()> {
        self.queue.clear();
        let view = SceneView::new(graph, self.scene_node)?;

        let globals = view.globals()?;
        if *globals != *self.delivered_globals {
            log::info!("render outputs changed; not live-editable, restarting");
            return self.restart(graph);
        }

        let mut current = FxHashMap::default();
        collect_objects(&view, &ScenePath::root(), Mat4::IDENTITY, &mut current)?;

        // Removals first, ancestors before descendants.
        let mut removed: Vec<ScenePath> = self
            .delivered
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();
        removed.sort_by_key(|p| (p.depth(), p.to_string()));
        for path in removed {
            self.queue.push(RenderEdit::Remove { path });
        }

        let mut paths: Vec<ScenePath> = current.keys().cloned().collect();
        paths.sort_by_key(|p| (p.depth(), p.to_string()));
        for path in paths {
            let (object, world) = &current[&path];
            let Some(delivered) = self.delivered.get(&path) else {
                self.queue.push(RenderEdit::Create {
                    path,
                    object: object.clone(),
                    world: *world,
                });
                continue;
            };

            let changes = classify(delivered, object, world);
            if changes.contains(LocationChanges::STRUCTURE) {
                self.queue.push(RenderEdit::Remove { path: path.clone() });
                self.queue.push(RenderEdit::Create {
                    path,
                    object: object.clone(),
                    world: *world,
                });
                continue;
            }
            if changes.contains(LocationChanges::TRANSFORM) {
                self.queue.push(RenderEdit::UpdateTransform {
                    path: path.clone(),
                    world: *world,
                });
            }
            if changes.contains(LocationChanges::PARAMS) {
                for (name, value) in &object.params {
                    if delivered.object.params.get(name) != Some(value) {
                        self.queue.push(RenderEdit::UpdateParameter {
                            path: path.clone(),
                            name: name.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self, graph: &Graph) -> Result<()> {
        for edit in self.queue.drain() {
            let applied = self.apply(&edit);
            match applied {
                Ok(()) => self.record(edit),
                Err(StrataError::EditRejected { path, reason }) => {
                    log::warn!(
                        "backend rejected edit at '{path}' ({reason}); falling back to restart"
                    );
                    return self.restart(graph);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn apply(&mut self, edit: &RenderEdit) -> Result<()> {
        match edit {
            RenderEdit::Create {
                path,
                object,
                world,
            } => self.backend.create_object(path, object, world),
            RenderEdit::UpdateParameter { path, name, value } => {
                self.backend.update_parameter(path, name, value)
            }
            RenderEdit::UpdateTransform { path, world } => {
                self.backend.update_transform(path, world)
            }
            RenderEdit::Remove { path } => self.backend.remove_object(path),
        }
    }

    /// Mirrors a successfully delivered edit into the delivered snapshot.
    fn record(&mut self, edit: RenderEdit) {
        match edit {
            RenderEdit::Create {
                path,
                object,
                world,
            } => {
                self.delivered.insert(path, Delivered { object, world });
            }
            RenderEdit::UpdateParameter { path, name, value } => {
                if let Some(delivered) = self.delivered.get_mut(&path) {
                    Arc::make_mut(&mut delivered.object).params.insert(name, value);
                }
            }
            RenderEdit::UpdateTransform { path, world } => {
                if let Some(delivered) = self.delivered.get_mut(&path) {
                    delivered.world = world;
                }
            }
            RenderEdit::Remove { path } => {
                self.delivered.remove(&path);
            }
        }
    }

    /// Full stop/start fallback. A failure here is fatal to the session.
    fn restart(&mut self, graph: &Graph) -> Result<()> {
        self.backend.close();
        self.delivered.clear();
        self.delivered_globals = Arc::new(RenderGlobals::new());
        self.queue.clear();
        self.state = RenderState::Stopped;
        self.open_session(graph)
            .map_err(|err| StrataError::RestartFailed(err.to_string()))
    }
}

fn classify(delivered: &Delivered, object: &Arc<SceneObject>, world: &Mat4) -> LocationChanges {
    let mut changes = LocationChanges::empty();
    if delivered.object.type_name != object.type_name
        || delivered
            .object
            .params
            .keys()
            .any(|name| !object.params.contains_key(name))
    {
        return LocationChanges::STRUCTURE;
    }
    if delivered.world != *world {
        changes |= LocationChanges::TRANSFORM;
    }
    if delivered.object.params != object.params {
        changes |= LocationChanges::PARAMS;
    }
    changes
}

/// Depth-first traversal collecting every location carrying an object,
/// with accumulated world transforms.
fn collect_objects(
    view: &SceneView<'_>,
    path: &ScenePath,
    parent_world: Mat4,
    out: &mut FxHashMap<ScenePath, (Arc<SceneObject>, Mat4)>,
) -> Result<()> {
    let world = parent_world * view.transform(path)?;
    if let Some(object) = view.object(path)? {
        out.insert(path.clone(), (object, world));
    }
    for child in view.child_names(path)? {
        collect_objects(view, &path.child(&child), world, out)?;
    }
    Ok(())
}
