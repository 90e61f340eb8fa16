//! # Flurry
//!
//! Textured 2D particle effects driven by named emitters.
//!
//! Flurry simulates particles on the CPU and hands each live particle to a
//! renderer as one textured, tinted quad. Every emitter parameter is a value
//! plus a random spread, so a handful of settings gives sparks, smoke, snow
//! or fire.
//!
//! ## Quick Start
//!
//! ```ignore
//! use flurry::prelude::*;
//!
//! fn main() -> Result<(), ViewerError> {
//!     let config = EmitterConfig {
//!         speed: Setting::new(4.0, 1.0),
//!         end_color: ColorSetting::new([255.0, 200.0, 0.0], 20.0),
//!         ..EmitterConfig::default()
//!     };
//!
//!     Viewer::new()
//!         .with_size(800, 600)
//!         .with_emitter("sparks", Vec2::new(0.0, 100.0), "assets/spark.png", Some(config))
//!         .run()
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Engine
//!
//! [`Engine`] owns a [`RenderBackend`], the surface projection and the
//! emitter registry. The host calls [`Engine::tick`] once per frame with a
//! frame multiplier (`1.0` at 60 fps; see [`time::FrameClock`]).
//!
//! ### Emitters
//!
//! An [`Emitter`] is keyed by name and anchored relative to the surface
//! center. It waits for its texture, then spawns up to `emission_rate`
//! particles per tick while below `spawn_cap`.
//!
//! ### Particles
//!
//! A [`Particle`] samples its settings once at spawn. Direction, spin, size
//! and stretch converge toward their end values; color blends from start to
//! end over the particle's life; opacity ramps in and out.
//!
//! ### Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`WgpuBackend`] | Windowed rendering through wgpu |
//! | [`HeadlessBackend`] | Tests, benchmarks, off-screen hosts |
//!
//! ## Coordinates
//!
//! Emitter anchors and particle positions are in pixels relative to the
//! surface center, y pointing down. Directions are in degrees with 0° up.

mod backend;
mod config;
mod emitter;
mod engine;
mod error;
mod gpu;
pub mod headless;
mod particle;
mod pool;
mod texture;
pub mod time;
mod tint;
pub mod trig;
mod window;

pub use backend::{
    DrawCall, GeometryHandle, ImageSource, RenderBackend, TextureHandle, TextureInfo, TextureTicket,
};
pub use config::{ColorSetting, EmitterConfig, Setting};
pub use emitter::{Emitter, TextureState};
pub use engine::{projection_for, Engine, Lifecycle, DEFAULT_SURFACE_SIZE, QUAD_POSITIONS, QUAD_UVS};
pub use error::{ConfigError, EngineError, GpuError, TextureError, ViewerError};
pub use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
pub use gpu::WgpuBackend;
pub use headless::HeadlessBackend;
pub use particle::{Particle, LIFE_DECAY_RATE, UP_BIAS_DEGREES};
pub use pool::{ParticlePool, Sprite, StepContext};
pub use texture::{decode, default_image, ResolvedTexture, TextureSource, DEFAULT_TEXTURE_SIZE};
pub use tint::{blend, TintCache};
pub use window::Viewer;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use flurry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ColorSetting, EmitterConfig, Setting};
    pub use crate::emitter::Emitter;
    pub use crate::engine::{Engine, Lifecycle};
    pub use crate::error::{EngineError, ViewerError};
    pub use crate::headless::HeadlessBackend;
    pub use crate::texture::TextureSource;
    pub use crate::time::FrameClock;
    pub use crate::window::Viewer;
    pub use crate::WgpuBackend;
    pub use glam::{UVec2, Vec2};
}
