//! Renders one deferred frame offscreen with `wgpu` and reports the adapter
//! and pipeline counts. No window is opened.
//!
//! ```text
//! RUST_LOG=strata=debug cargo run --example offscreen_wgpu
//! ```

use anyhow::Context;
use strata::{
    Collaborators, Engine, Primitive, RenderTopology, Renderer, RendererSettings, WgpuBackend,
};

async fn create_backend() -> anyhow::Result<WgpuBackend> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable adapter")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("strata offscreen"),
            ..Default::default()
        })
        .await?;

    Ok(WgpuBackend::new(device, queue).with_adapter_info(&adapter.get_info()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let backend = pollster::block_on(create_backend())?;
    let settings = RendererSettings {
        display_size: [640, 360],
        topology: RenderTopology::Deferred,
        ..RendererSettings::default()
    };
    let renderer = Renderer::new(backend, settings, Collaborators::default())?;
    let mut engine = Engine::new(renderer);

    let sphere = engine.renderer_mut().load_primitive(Primitive::Sphere)?;
    engine.populate_default_scene(sphere, "Sphere")?;

    let report = engine.render()?;
    let backend = engine.renderer().backend();

    let info = engine.renderer().info();
    println!("adapter:     {} ({})", info.name, info.backend);
    println!("passes:      {}", report.passes);
    println!("draw calls:  {}", report.draw_calls);
    println!("pipelines:   {}", backend.pipeline_count());
    Ok(())
}
