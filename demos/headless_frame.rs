//! Renders a few frames against the command-recording backend and prints
//! what each topology submitted. Needs no GPU.
//!
//! ```text
//! RUST_LOG=info cargo run --example headless_frame
//! ```

use strata::renderer::backend::Command;
use strata::{
    Collaborators, Engine, FrameInput, HeadlessBackend, Primitive, RenderTopology, Renderer,
    RendererSettings, SceneCommand, WaterSettings,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = RendererSettings {
        water: Some(WaterSettings::default()),
        ..RendererSettings::default()
    };
    let renderer = Renderer::new(HeadlessBackend::new(), settings, Collaborators::default())?;
    let mut engine = Engine::new(renderer);

    let torus = engine.renderer_mut().load_primitive(Primitive::Torus)?;
    engine.populate_default_scene(torus, "Torus")?;

    for topology in [RenderTopology::Forward, RenderTopology::Deferred] {
        engine.apply(SceneCommand::SetRenderTopology(topology))?;
        engine.update(&FrameInput::new(1.0 / 60.0));
        engine.renderer_mut().backend_mut().take_commands();

        let report = engine.render()?;
        let commands = engine.renderer().backend().commands();
        let passes: Vec<&str> = commands
            .iter()
            .filter_map(|c| match c {
                Command::BeginPass { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect();

        println!("{topology:?}");
        println!("  passes:         {}", passes.join(" → "));
        println!("  draw calls:     {}", report.draw_calls);
        println!("  depth blits:    {}", report.depth_blits);
        println!("  entities drawn: {}", report.entities_drawn);
        println!("  commands:       {}", commands.len());
    }

    let stats = engine.renderer().bindings().stats();
    println!(
        "vertex bindings: {} created, {} reused",
        stats.created, stats.reused
    );
    Ok(())
}
