use std::time::Instant;

use winit::{event::*, event_loop::EventLoop, window::WindowBuilder};

use viz_core::{SceneSession, REGENERATE_INTERVAL_SECS};

mod assets;
mod capture;
mod render;

use assets::FsAssetLoader;
use render::GpuState;

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let asset_root = std::env::args().nth(1).unwrap_or_else(|| "assets".into());
    let loader = FsAssetLoader::new(asset_root);
    let mut session = SceneSession::new(&loader);

    // Keep the input stream alive for the lifetime of the window; when
    // capture is unavailable the fallback ramp drives the animation.
    let _capture = capture::start_capture(session.sampler.writer());
    if _capture.is_none() {
        log::warn!("no audio input device, using fallback spectrum");
    }

    let event_loop = EventLoop::new().expect("event loop");
    let window = WindowBuilder::new()
        .with_title("viz")
        .build(&event_loop)
        .expect("window");

    let mut state = pollster::block_on(GpuState::new(&window)).expect("gpu");
    let mut last_regen = Instant::now();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::Resized(size),
                ..
            } => state.resize(size),
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => elwt.exit(),
            Event::WindowEvent {
                event:
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    },
                ..
            } => {
                session.regenerate(&loader);
                last_regen = Instant::now();
            }
            Event::AboutToWait => {
                if last_regen.elapsed().as_secs_f32() >= REGENERATE_INTERVAL_SECS {
                    session.regenerate(&loader);
                    last_regen = Instant::now();
                }
                session.render();
                match state.render(&mut session) {
                    Ok(_) => state.window.request_redraw(),
                    Err(wgpu::SurfaceError::Lost) => state.resize(state.window.inner_size()),
                    Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                    Err(_) => {}
                }
            }
            _ => {}
        })
        .unwrap();
}
