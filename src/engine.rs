//! The engine context.
//!
//! [`Engine`] owns the renderer backend, the surface projection, the shared
//! quad geometry and the emitter registry. The host drives it with one
//! [`Engine::tick`] per frame.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Active --dispose--> Disposed
//! ```
//!
//! Every operation checks the state first. `Disposed` is terminal.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = Engine::new(HeadlessBackend::new());
//! engine.initialize(None)?;
//! engine.create_emitter("sparks", Vec2::ZERO, "assets/spark.png", None)?;
//!
//! loop {
//!     engine.tick(1.0)?;
//! }
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use glam::{Mat4, UVec2, Vec2};

use crate::backend::{DrawCall, GeometryHandle, ImageSource, RenderBackend, TextureEvent, TextureTicket};
use crate::config::EmitterConfig;
use crate::emitter::{Emitter, TextureState};
use crate::error::EngineError;
use crate::texture::{self, TextureSource};

/// Surface size used when `initialize` gets no dimensions.
pub const DEFAULT_SURFACE_SIZE: UVec2 = UVec2::new(480, 360);

/// Unit quad centered on the origin, as two triangles.
pub const QUAD_POSITIONS: [Vec2; 6] = [
    Vec2::new(-0.5, -0.5),
    Vec2::new(0.5, -0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(0.5, -0.5),
    Vec2::new(0.5, 0.5),
    Vec2::new(-0.5, 0.5),
];

/// Texture coordinates matching [`QUAD_POSITIONS`].
pub const QUAD_UVS: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Active,
    Disposed,
}

#[derive(Debug, Clone, Copy)]
struct Surface {
    size: UVec2,
    projection: Mat4,
    geometry: GeometryHandle,
}

impl Surface {
    fn resized(self, size: UVec2) -> Self {
        Self {
            size,
            projection: projection_for(size),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Uninitialized,
    Active(Surface),
    Disposed,
}

/// A registry entry. The generation is unique for the engine's lifetime and
/// ties texture completions to the slot that asked for them.
#[derive(Debug)]
struct Slot {
    generation: u64,
    /// Where the texture was requested from, for diagnostics.
    source: String,
    emitter: Emitter,
}

/// The particle engine.
pub struct Engine<B: RenderBackend> {
    backend: B,
    state: State,
    trail_mode: bool,
    slots: Vec<Slot>,
    next_generation: u64,
    completions_tx: Sender<TextureEvent>,
    completions_rx: Receiver<TextureEvent>,
}

impl<B: RenderBackend> Engine<B> {
    /// Wrap a backend. The engine starts uninitialized.
    pub fn new(backend: B) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            backend,
            state: State::Uninitialized,
            trail_mode: false,
            slots: Vec::new(),
            next_generation: 1,
            completions_tx,
            completions_rx,
        }
    }

    /// Activate the engine on a surface of `dimensions` (default 480×360).
    pub fn initialize(&mut self, dimensions: Option<UVec2>) -> Result<(), EngineError> {
        self.check_uninitialized()?;
        let size = dimensions.unwrap_or(DEFAULT_SURFACE_SIZE);
        self.backend.resize(size);
        self.activate(size);
        Ok(())
    }

    /// Activate the engine on the backend's existing surface.
    ///
    /// `dimensions` resizes the surface first if both components are
    /// non-zero; otherwise the surface keeps its current size.
    pub fn initialize_on_existing_surface(&mut self, dimensions: Option<UVec2>) -> Result<(), EngineError> {
        self.check_uninitialized()?;
        let size = match dimensions {
            Some(size) if size.x > 0 && size.y > 0 => {
                self.backend.resize(size);
                size
            }
            _ => self.backend.surface_size(),
        };
        self.activate(size);
        Ok(())
    }

    fn check_uninitialized(&self) -> Result<(), EngineError> {
        match self.state {
            State::Uninitialized => Ok(()),
            State::Active(_) => Err(EngineError::AlreadyInitialized),
            State::Disposed => Err(EngineError::Disposed),
        }
    }

    fn activate(&mut self, size: UVec2) {
        let geometry = self.backend.create_geometry(&QUAD_POSITIONS, &QUAD_UVS);
        self.state = State::Active(Surface {
            size,
            projection: projection_for(size),
            geometry,
        });
        log::info!("particle engine initialized at {}x{}", size.x, size.y);
    }

    fn surface(&self) -> Result<Surface, EngineError> {
        match self.state {
            State::Active(surface) => Ok(surface),
            State::Uninitialized => Err(EngineError::NotInitialized),
            State::Disposed => Err(EngineError::Disposed),
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            State::Uninitialized => Lifecycle::Uninitialized,
            State::Active(_) => Lifecycle::Active,
            State::Disposed => Lifecycle::Disposed,
        }
    }

    /// Run one frame: apply finished texture loads, clear the target unless
    /// trail mode is on, then update and draw every emitter in registration
    /// order.
    ///
    /// `delta` is a frame multiplier; 1.0 is one nominal frame.
    pub fn tick(&mut self, delta: f32) -> Result<(), EngineError> {
        self.apply_texture_completions();
        let surface = self.surface()?;

        self.backend.begin_frame(surface.size, !self.trail_mode);

        let size = surface.size.as_vec2();
        let backend = &mut self.backend;
        for slot in &mut self.slots {
            let Some(texture) = slot.emitter.texture() else {
                continue;
            };
            slot.emitter.update(delta, size, surface.projection, |sprite| {
                backend.submit_draw(DrawCall {
                    geometry: surface.geometry,
                    transform: sprite.transform,
                    texture: texture.handle,
                    tint: sprite.tint,
                });
            });
        }

        self.backend.end_frame();
        Ok(())
    }

    /// Apply texture loads that finished since the last tick, without
    /// ticking.
    ///
    /// After [`dispose`](Self::dispose) this still drains the queue and
    /// releases textures that landed late, then reports `Disposed`.
    pub fn poll_textures(&mut self) -> Result<(), EngineError> {
        self.apply_texture_completions();
        self.surface()?;
        Ok(())
    }

    fn apply_texture_completions(&mut self) {
        while let Ok(event) = self.completions_rx.try_recv() {
            let slot = self
                .slots
                .iter_mut()
                .find(|slot| slot.generation == event.generation);

            match (slot, event.result) {
                (Some(slot), Ok(info)) => {
                    log::debug!(
                        "emitter '{}' texture ready ({}x{})",
                        slot.emitter.name(),
                        info.width,
                        info.height
                    );
                    slot.emitter.set_texture(info);
                }
                (Some(slot), Err(e)) => {
                    log::error!(
                        "emitter '{}' texture from {} failed to load: {}",
                        slot.emitter.name(),
                        slot.source,
                        e
                    );
                    slot.emitter.mark_failed();
                }
                (None, Ok(info)) => {
                    log::debug!(
                        "releasing texture for retired emitter generation {}",
                        event.generation
                    );
                    self.backend.release_texture(info.handle);
                }
                (None, Err(e)) => {
                    log::debug!(
                        "ignoring failed load for retired emitter generation {}: {}",
                        event.generation,
                        e
                    );
                }
            }
        }
    }

    /// Register an emitter.
    ///
    /// URL and default sources load asynchronously; the emitter is inert
    /// until the texture arrives. A resolved source is validated now: if it
    /// is malformed the emitter is not registered and an error is logged.
    ///
    /// Reusing a name replaces the old emitter in place and releases its
    /// texture. `config` defaults to [`EmitterConfig::default`].
    pub fn create_emitter(
        &mut self,
        name: impl Into<String>,
        anchor: Vec2,
        source: impl Into<TextureSource>,
        config: Option<EmitterConfig>,
    ) -> Result<(), EngineError> {
        self.surface()?;
        let name = name.into();

        let source = source.into();
        let label = match &source {
            TextureSource::Url(url) if !url.is_empty() => format!("'{}'", url),
            TextureSource::Url(_) | TextureSource::Default => "the default texture".to_string(),
            TextureSource::Resolved(_) => "a resolved texture".to_string(),
        };

        let (state, pending) = match source {
            TextureSource::Resolved(resolved) => match resolved.validate() {
                Ok(info) => (TextureState::Ready(info), None),
                Err(reason) => {
                    log::error!("create_emitter: ({}) {}", name, reason);
                    return Err(EngineError::InvalidTexture { emitter: name, reason });
                }
            },
            TextureSource::Url(url) => (TextureState::Loading, Some(texture::image_source_for(&url))),
            TextureSource::Default => (TextureState::Loading, Some(ImageSource::Pixels(texture::default_image()))),
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let slot = Slot {
            generation,
            source: label,
            emitter: Emitter::new(name.clone(), anchor, config.unwrap_or_default(), state),
        };

        match self.slots.iter().position(|s| s.emitter.name() == name) {
            Some(index) => {
                let replaced = std::mem::replace(&mut self.slots[index], slot);
                log::debug!("emitter '{}' replaced", name);
                self.release(replaced.emitter);
            }
            None => {
                log::debug!("emitter '{}' created", name);
                self.slots.push(slot);
            }
        }

        if let Some(source) = pending {
            let ticket = TextureTicket::new(generation, self.completions_tx.clone());
            self.backend.load_texture(source, ticket);
        }

        Ok(())
    }

    /// Remove an emitter and release its texture. A load still in flight for
    /// it is discarded when it lands.
    pub fn dispose_emitter(&mut self, name: &str) -> Result<(), EngineError> {
        self.surface()?;
        let index = self
            .slots
            .iter()
            .position(|s| s.emitter.name() == name)
            .ok_or_else(|| {
                log::debug!("dispose_emitter: no emitter named '{}'", name);
                EngineError::UnknownEmitter(name.to_string())
            })?;

        let slot = self.slots.remove(index);
        self.release(slot.emitter);
        log::debug!("emitter '{}' disposed", name);
        Ok(())
    }

    fn release(&mut self, emitter: Emitter) {
        if let Some(info) = emitter.texture() {
            self.backend.release_texture(info.handle);
        }
    }

    /// Release every texture, clear the registry and retire the engine.
    pub fn dispose(&mut self) -> Result<(), EngineError> {
        self.surface()?;
        self.apply_texture_completions();

        for slot in std::mem::take(&mut self.slots) {
            self.release(slot.emitter);
        }
        self.state = State::Disposed;
        log::info!("particle engine disposed");
        Ok(())
    }

    /// Restart every emitter's spawn clock and clear its tint cache.
    /// Live particles are kept.
    pub fn reset_flow(&mut self) -> Result<(), EngineError> {
        self.surface()?;
        for slot in &mut self.slots {
            slot.emitter.reset_flow();
        }
        Ok(())
    }

    /// Resize the surface and recompute the projection.
    pub fn resize(&mut self, size: UVec2) -> Result<(), EngineError> {
        let surface = self.surface()?;
        if size.x == 0 || size.y == 0 {
            return Ok(());
        }
        self.backend.resize(size);
        self.state = State::Active(surface.resized(size));
        Ok(())
    }

    /// Surface size, once initialized.
    pub fn surface_size(&self) -> Option<UVec2> {
        self.surface().ok().map(|s| s.size)
    }

    /// When on, frames accumulate instead of being cleared.
    pub fn set_trail_mode(&mut self, enabled: bool) {
        self.trail_mode = enabled;
    }

    pub fn trail_mode(&self) -> bool {
        self.trail_mode
    }

    pub fn emitter(&self, name: &str) -> Option<&Emitter> {
        self.slots
            .iter()
            .find(|s| s.emitter.name() == name)
            .map(|s| &s.emitter)
    }

    pub fn emitter_mut(&mut self, name: &str) -> Option<&mut Emitter> {
        self.slots
            .iter_mut()
            .find(|s| s.emitter.name() == name)
            .map(|s| &mut s.emitter)
    }

    /// Emitters in registration order.
    pub fn emitters(&self) -> impl Iterator<Item = &Emitter> {
        self.slots.iter().map(|s| &s.emitter)
    }

    pub fn emitters_mut(&mut self) -> impl Iterator<Item = &mut Emitter> {
        self.slots.iter_mut().map(|s| &mut s.emitter)
    }

    /// Emitter names in registration order.
    pub fn emitter_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.emitter.name())
    }

    pub fn emitter_count(&self) -> usize {
        self.slots.len()
    }

    /// Total live particles across all emitters.
    pub fn particle_count(&self) -> usize {
        self.slots.iter().map(|s| s.emitter.particle_count()).sum()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// Pixel space with the origin at the top-left and y pointing down.
pub fn projection_for(size: UVec2) -> Mat4 {
    let size = size.as_vec2();
    Mat4::orthographic_rh(0.0, size.x, size.y, 0.0, -1.0, 1.0)
}
