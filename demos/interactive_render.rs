//! Interactive rendering against a logging backend.
//!
//! Builds a plane + point light scene, starts the render driver, then
//! edits the light and shows the minimal edits the backend receives.
//!
//! Run with: `cargo run --example interactive_render`

use glam::Mat4;

use strata::scene::add_output;
use strata::{
    Graph, Merge, ObjectSource, Outputs, RenderBackend, RenderDriver, RenderGlobals, RenderOutput,
    SceneObject, ScenePath, Value,
};

/// Prints every edit instead of rendering.
struct LoggingBackend;

impl RenderBackend for LoggingBackend {
    fn open(&mut self) -> strata::Result<()> {
        println!("backend: open");
        Ok(())
    }

    fn close(&mut self) {
        println!("backend: close");
    }

    fn set_outputs(&mut self, globals: &RenderGlobals) -> strata::Result<()> {
        for output in &globals.outputs {
            println!("backend: output {} ({})", output.name, output.data);
        }
        Ok(())
    }

    fn create_object(
        &mut self,
        path: &ScenePath,
        object: &SceneObject,
        _world: &Mat4,
    ) -> strata::Result<()> {
        println!("backend: create {path} [{}]", object.type_name);
        Ok(())
    }

    fn update_parameter(
        &mut self,
        path: &ScenePath,
        name: &str,
        value: &Value,
    ) -> strata::Result<()> {
        println!("backend: update {path}.{name} = {value:?}");
        Ok(())
    }

    fn update_transform(&mut self, path: &ScenePath, _world: &Mat4) -> strata::Result<()> {
        println!("backend: move {path}");
        Ok(())
    }

    fn remove_object(&mut self, path: &ScenePath) -> strata::Result<()> {
        println!("backend: remove {path}");
        Ok(())
    }
}

fn main() -> strata::Result<()> {
    env_logger::init();

    let mut graph = Graph::new();
    let plane = graph.add_node("plane", Box::new(ObjectSource::plane()));
    let light = graph.add_node("light", Box::new(ObjectSource::point_light()));
    let merge = graph.add_node("merge", Box::new(Merge::new(2)));
    let outputs = graph.add_node("outputs", Box::new(Outputs));

    graph.set_input(graph.plug(merge, "in0")?, graph.plug(plane, "out")?)?;
    graph.set_input(graph.plug(merge, "in1")?, graph.plug(light, "out")?)?;
    graph.set_input(graph.plug(outputs, "in")?, graph.plug(merge, "out")?)?;
    add_output(
        &mut graph,
        outputs,
        RenderOutput::new("beauty.exr", "exr", "rgba"),
    )?;

    let mut driver = RenderDriver::new(outputs, Box::new(LoggingBackend));
    driver.start(&mut graph)?;

    // A scalar edit: one cheap update call.
    println!("-- dimming the light --");
    graph.set_value(graph.plug(light, "intensity")?, Value::Float(0.25))?;
    driver.process_events(&graph)?;

    // A structural edit: remove + create for that path only.
    println!("-- switching the light type --");
    graph.set_value(graph.plug(light, "type")?, Value::string("spot"))?;
    driver.process_events(&graph)?;

    driver.stop();
    Ok(())
}
