//! Windowed viewer.
//!
//! [`Viewer`] opens a window, builds an [`Engine`] on a [`WgpuBackend`] and
//! ticks it once per redraw. Holding the left mouse button drags every
//! emitter's anchor to the cursor.
//!
//! ```ignore
//! Viewer::new()
//!     .with_title("sparks")
//!     .with_emitter("sparks", Vec2::ZERO, "assets/spark.png", None)
//!     .run()?;
//! ```

use std::sync::Arc;

use glam::{UVec2, Vec2};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::EmitterConfig;
use crate::engine::{Engine, DEFAULT_SURFACE_SIZE};
use crate::error::ViewerError;
use crate::gpu::WgpuBackend;
use crate::texture::TextureSource;
use crate::time::FrameClock;

struct EmitterSpec {
    name: String,
    anchor: Vec2,
    source: TextureSource,
    config: Option<EmitterConfig>,
}

/// Builder for a window that runs particle effects.
pub struct Viewer {
    size: UVec2,
    title: String,
    trails: bool,
    emitters: Vec<EmitterSpec>,
}

impl Viewer {
    pub fn new() -> Self {
        Self {
            size: DEFAULT_SURFACE_SIZE,
            title: "Flurry".to_string(),
            trails: false,
            emitters: Vec::new(),
        }
    }

    /// Initial window size in physical pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = UVec2::new(width, height);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Keep previous frames instead of clearing.
    pub fn with_trails(mut self, enabled: bool) -> Self {
        self.trails = enabled;
        self
    }

    /// Register an emitter once the engine is up. `anchor` is relative to the
    /// window center.
    pub fn with_emitter(
        mut self,
        name: impl Into<String>,
        anchor: Vec2,
        source: impl Into<TextureSource>,
        config: Option<EmitterConfig>,
    ) -> Self {
        self.emitters.push(EmitterSpec {
            name: name.into(),
            anchor,
            source: source.into(),
            config,
        });
        self
    }

    /// Open the window and block until it closes.
    pub fn run(self) -> Result<(), ViewerError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    viewer: Viewer,
    window: Option<Arc<Window>>,
    engine: Option<Engine<WgpuBackend>>,
    clock: FrameClock,
    dragging: bool,
    error: Option<ViewerError>,
}

impl App {
    fn new(viewer: Viewer) -> Self {
        Self {
            viewer,
            window: None,
            engine: None,
            clock: FrameClock::new(),
            dragging: false,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.viewer.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.viewer.size.x, self.viewer.size.y));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let backend = pollster::block_on(WgpuBackend::new(window.clone()))?;

        let mut engine = Engine::new(backend);
        engine.initialize_on_existing_surface(None)?;
        engine.set_trail_mode(self.viewer.trails);

        for spec in self.viewer.emitters.drain(..) {
            engine.create_emitter(spec.name, spec.anchor, spec.source, spec.config)?;
        }

        self.window = Some(window);
        self.engine = Some(engine);
        self.clock.reset();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ViewerError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut engine) = self.engine.take() {
                    if let Err(e) = engine.dispose() {
                        log::warn!("dispose on close failed: {}", e);
                    }
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(engine) = &mut self.engine {
                    let size = UVec2::new(physical_size.width, physical_size.height);
                    if let Err(e) = engine.resize(size) {
                        log::warn!("resize failed: {}", e);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.dragging = state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if !self.dragging {
                    return;
                }
                if let Some(engine) = &mut self.engine {
                    let Some(size) = engine.surface_size() else {
                        return;
                    };
                    let anchor = Vec2::new(position.x as f32, position.y as f32) - size.as_vec2() * 0.5;
                    for emitter in engine.emitters_mut() {
                        emitter.set_anchor(anchor);
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let delta = self.clock.update();
                if let Some(engine) = &mut self.engine {
                    if let Err(e) = engine.tick(delta) {
                        self.fail(event_loop, e.into());
                        return;
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
