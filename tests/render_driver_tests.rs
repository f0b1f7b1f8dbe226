//! Interactive Render Driver Integration Tests
//!
//! Tests for:
//! - Start: backend open, outputs, one create per object
//! - Parameter change: exactly one update call, no remove/create
//! - Type change: remove + create for that path only
//! - Transform change: one transform update
//! - Pause / queue / resume with coalescing to the last value
//! - Structural removal, removal ordering vs queued nested edits
//! - EditRejected fallback to full restart; globals change restarts
//! - Stop teardown

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3};

use strata::scene::add_output;
use strata::{
    Graph, Merge, NodeKey, ObjectSource, Outputs, RenderBackend, RenderDriver, RenderGlobals,
    RenderOutput, RenderState, SceneObject, ScenePath, Value,
};

// ============================================================================
// Recording backend
// ============================================================================

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Records every backend call; optionally rejects live edits on named
/// parameters.
struct RecordingBackend {
    log: Log,
    rejected_params: HashSet<String>,
}

impl RecordingBackend {
    fn new(log: Log) -> Self {
        Self {
            log,
            rejected_params: HashSet::new(),
        }
    }

    fn rejecting(log: Log, param: &str) -> Self {
        let mut backend = Self::new(log);
        backend.rejected_params.insert(param.to_owned());
        backend
    }
}

impl RenderBackend for RecordingBackend {
    fn open(&mut self) -> strata::Result<()> {
        self.log.push("open".to_owned());
        Ok(())
    }

    fn close(&mut self) {
        self.log.push("close".to_owned());
    }

    fn set_outputs(&mut self, globals: &RenderGlobals) -> strata::Result<()> {
        self.log.push(format!("outputs:{}", globals.outputs.len()));
        Ok(())
    }

    fn create_object(
        &mut self,
        path: &ScenePath,
        object: &SceneObject,
        _world: &Mat4,
    ) -> strata::Result<()> {
        self.log.push(format!("create:{path}:{}", object.type_name));
        Ok(())
    }

    fn update_parameter(
        &mut self,
        path: &ScenePath,
        name: &str,
        value: &Value,
    ) -> strata::Result<()> {
        if self.rejected_params.contains(name) {
            return Err(strata::StrataError::EditRejected {
                path: path.to_string(),
                reason: format!("'{name}' is not live-editable"),
            });
        }
        let rendered = match value {
            Value::Float(f) => format!("{f}"),
            other => format!("{other:?}"),
        };
        self.log.push(format!("param:{path}:{name}={rendered}"));
        Ok(())
    }

    fn update_transform(&mut self, path: &ScenePath, _world: &Mat4) -> strata::Result<()> {
        self.log.push(format!("transform:{path}"));
        Ok(())
    }

    fn remove_object(&mut self, path: &ScenePath) -> strata::Result<()> {
        self.log.push(format!("remove:{path}"));
        Ok(())
    }
}

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    graph: Graph,
    driver: RenderDriver,
    log: Log,
    plane: NodeKey,
    light: NodeKey,
}

fn fixture_with_backend(make: impl FnOnce(Log) -> RecordingBackend) -> Fixture {
    let mut graph = Graph::new();
    let plane = graph.add_node("plane", Box::new(ObjectSource::plane()));
    let light = graph.add_node("light", Box::new(ObjectSource::point_light()));
    let merge = graph.add_node("merge", Box::new(Merge::new(2)));
    let outputs = graph.add_node("outputs", Box::new(Outputs));

    let connect = |graph: &mut Graph, dest: NodeKey, plug: &str, source: NodeKey| {
        let d = graph.plug(dest, plug).unwrap();
        let s = graph.plug(source, "out").unwrap();
        graph.set_input(d, s).unwrap();
    };
    connect(&mut graph, merge, "in0", plane);
    connect(&mut graph, merge, "in1", light);
    connect(&mut graph, outputs, "in", merge);
    add_output(
        &mut graph,
        outputs,
        RenderOutput::new("beauty.exr", "exr", "rgba"),
    )
    .unwrap();

    let log = Log::default();
    let driver = RenderDriver::new(outputs, Box::new(make(log.clone())));
    Fixture {
        graph,
        driver,
        log,
        plane,
        light,
    }
}

fn fixture() -> Fixture {
    fixture_with_backend(RecordingBackend::new)
}

fn set_float(graph: &mut Graph, node: NodeKey, plug: &str, value: f32) {
    let key = graph.plug(node, plug).unwrap();
    graph.set_value(key, Value::Float(value)).unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn start_creates_the_whole_scene() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();

    assert_eq!(f.driver.state(), RenderState::Running);
    assert_eq!(
        f.log.take(),
        vec![
            "open",
            "outputs:1",
            "create:/light:light:point",
            "create:/plane:mesh:plane",
        ]
    );
}

#[test]
fn stop_tears_the_backend_down() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    f.driver.stop();
    assert_eq!(f.driver.state(), RenderState::Stopped);
    assert_eq!(f.log.take(), vec!["close"]);

    // Stopping again is a no-op.
    f.driver.stop();
    assert!(f.log.take().is_empty());
}

#[test]
fn events_while_stopped_are_discarded() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.driver.stop();
    f.log.take();

    set_float(&mut f.graph, f.light, "intensity", 2.0);
    f.driver.process_events(&f.graph).unwrap();
    assert!(f.log.take().is_empty());
}

// ============================================================================
// Edit classification
// ============================================================================

#[test]
fn scalar_parameter_change_emits_one_update() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    set_float(&mut f.graph, f.light, "intensity", 2.0);
    f.driver.process_events(&f.graph).unwrap();

    assert_eq!(f.log.take(), vec!["param:/light:intensity=2"]);
}

#[test]
fn light_type_change_recreates_that_path_only() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    let type_plug = f.graph.plug(f.light, "type").unwrap();
    f.graph.set_value(type_plug, Value::string("spot")).unwrap();
    f.driver.process_events(&f.graph).unwrap();

    assert_eq!(
        f.log.take(),
        vec!["remove:/light", "create:/light:light:spot"]
    );
}

#[test]
fn transform_change_emits_one_transform_update() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    let transform = f.graph.plug(f.plane, "transform").unwrap();
    f.graph
        .set_value(
            transform,
            Value::Matrix(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
        )
        .unwrap();
    f.driver.process_events(&f.graph).unwrap();

    assert_eq!(f.log.take(), vec!["transform:/plane"]);
}

#[test]
fn unchanged_locations_emit_nothing() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    // A no-op set (same value) produces no dirty events and no edits.
    set_float(&mut f.graph, f.light, "intensity", 1.0);
    f.driver.process_events(&f.graph).unwrap();
    assert!(f.log.take().is_empty());
}

#[test]
fn removing_a_source_removes_its_object() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    f.graph.remove_node(f.light);
    f.driver.process_events(&f.graph).unwrap();

    assert_eq!(f.log.take(), vec!["remove:/light"]);
}

// ============================================================================
// Pause / resume and coalescing
// ============================================================================

#[test]
fn paused_edits_queue_and_coalesce_to_last_value() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    f.driver.pause();
    assert_eq!(f.driver.state(), RenderState::Paused);

    set_float(&mut f.graph, f.light, "intensity", 2.0);
    f.driver.process_events(&f.graph).unwrap();
    set_float(&mut f.graph, f.light, "intensity", 3.0);
    f.driver.process_events(&f.graph).unwrap();

    // Nothing delivered while paused.
    assert!(f.log.take().is_empty());

    f.driver.resume(&f.graph).unwrap();
    assert_eq!(f.driver.state(), RenderState::Running);
    assert_eq!(f.log.take(), vec!["param:/light:intensity=3"]);
}

#[test]
fn removal_drops_queued_nested_edits() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    f.driver.pause();
    set_float(&mut f.graph, f.light, "intensity", 5.0);
    f.driver.process_events(&f.graph).unwrap();

    f.graph.remove_node(f.light);
    f.driver.process_events(&f.graph).unwrap();

    f.driver.resume(&f.graph).unwrap();
    let log = f.log.take();
    assert_eq!(log, vec!["remove:/light"]);
}

// ============================================================================
// Restart fallbacks
// ============================================================================

#[test]
fn rejected_edit_falls_back_to_full_restart() {
    let mut f = fixture_with_backend(|log| RecordingBackend::rejecting(log, "intensity"));
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    set_float(&mut f.graph, f.light, "intensity", 2.0);
    f.driver.process_events(&f.graph).unwrap();

    // Not surfaced as an error; the driver restarted the session.
    assert_eq!(f.driver.state(), RenderState::Running);
    assert_eq!(
        f.log.take(),
        vec![
            "close",
            "open",
            "outputs:1",
            "create:/light:light:point",
            "create:/plane:mesh:plane",
        ]
    );
}

#[test]
fn render_output_change_restarts() {
    let mut f = fixture();
    f.driver.start(&mut f.graph).unwrap();
    f.log.take();

    let outputs = f.graph.node_named("outputs").unwrap();
    add_output(
        &mut f.graph,
        outputs,
        RenderOutput::new("depth.exr", "exr", "z"),
    )
    .unwrap();
    f.driver.process_events(&f.graph).unwrap();

    let log = f.log.take();
    assert_eq!(log[0], "close");
    assert_eq!(log[1], "open");
    assert_eq!(log[2], "outputs:2");
    assert_eq!(f.driver.state(), RenderState::Running);
}

#[test]
fn restart_continues_tracking_edits() {
    let mut f = fixture_with_backend(|log| RecordingBackend::rejecting(log, "intensity"));
    f.driver.start(&mut f.graph).unwrap();

    set_float(&mut f.graph, f.light, "intensity", 2.0);
    f.driver.process_events(&f.graph).unwrap();
    f.log.take();

    // After the restart, cheap edits on other parameters still work.
    let width = f.graph.plug(f.plane, "width").unwrap();
    f.graph.set_value(width, Value::Float(4.0)).unwrap();
    f.driver.process_events(&f.graph).unwrap();

    let log = f.log.take();
    assert!(log.iter().any(|line| line.starts_with("param:/plane:width")));
}
