//! The renderer seam.
//!
//! The engine simulates particles on the CPU and hands finished sprites to a
//! [`RenderBackend`]. A backend owns everything GPU-shaped: the surface, the
//! shared quad geometry, textures and the actual draw calls.
//!
//! Two implementations ship with the crate:
//! - [`WgpuBackend`](crate::WgpuBackend) renders to a window through wgpu.
//! - [`HeadlessBackend`](crate::headless::HeadlessBackend) records calls in
//!   memory for tests and off-screen hosts.
//!
//! # Texture loading
//!
//! Loading is asynchronous. The engine calls [`RenderBackend::load_texture`]
//! with a [`TextureTicket`]; the backend resolves the ticket whenever the
//! texture is ready, from any thread. Completions are applied by the engine at
//! the next tick boundary.

use std::sync::mpsc::Sender;

use glam::{Mat4, UVec2, Vec2, Vec4};
use image::RgbaImage;

use crate::error::TextureError;

/// Backend-issued texture identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Placeholder for "no texture". Backends never issue it.
    pub const NULL: TextureHandle = TextureHandle(0);

    /// Whether this is the null handle.
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// Backend-issued geometry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub u32);

/// A texture that is resident in the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    /// Backend handle.
    pub handle: TextureHandle,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl TextureInfo {
    /// Texture dimensions as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Image data a backend is asked to turn into a texture.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Location of an encoded image (PNG or JPEG) on disk.
    Url(String),
    /// Already decoded RGBA pixels.
    Pixels(RgbaImage),
}

/// One textured quad to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    /// Geometry to draw, normally the engine's unit quad.
    pub geometry: GeometryHandle,
    /// Full clip-space transform for the quad.
    pub transform: Mat4,
    /// Texture to sample.
    pub texture: TextureHandle,
    /// RGB tint in 0-1 with opacity in `w`.
    pub tint: Vec4,
}

/// Completion message for a texture load.
#[derive(Debug)]
pub(crate) struct TextureEvent {
    pub generation: u64,
    pub result: Result<TextureInfo, TextureError>,
}

/// Claim check for an in-flight texture load.
///
/// Carries the generation of the emitter slot that asked for the texture. If
/// that emitter is gone by the time the load finishes, the engine discards the
/// result and releases the texture.
#[derive(Debug)]
pub struct TextureTicket {
    generation: u64,
    sender: Sender<TextureEvent>,
}

impl TextureTicket {
    pub(crate) fn new(generation: u64, sender: Sender<TextureEvent>) -> Self {
        Self { generation, sender }
    }

    /// Generation of the emitter slot that requested the load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report the outcome of the load. Safe to call from any thread.
    pub fn resolve(self, result: Result<TextureInfo, TextureError>) {
        let event = TextureEvent {
            generation: self.generation,
            result,
        };
        if self.sender.send(event).is_err() {
            log::debug!("texture completion for generation {} dropped, engine is gone", self.generation);
        }
    }
}

/// Everything the engine needs from a renderer.
pub trait RenderBackend {
    /// Current size of the drawing surface in pixels.
    fn surface_size(&self) -> UVec2;

    /// Resize the drawing surface.
    fn resize(&mut self, size: UVec2);

    /// Upload static geometry. Called once when the engine initializes.
    fn create_geometry(&mut self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle;

    /// Start loading a texture. Resolve `ticket` when done, now or later.
    fn load_texture(&mut self, source: ImageSource, ticket: TextureTicket);

    /// Bind the render target for a new frame, clearing it if `clear` is set.
    fn begin_frame(&mut self, size: UVec2, clear: bool);

    /// Queue one textured quad.
    fn submit_draw(&mut self, draw: DrawCall);

    /// Finish the frame and present it.
    fn end_frame(&mut self);

    /// Free a texture previously delivered through a ticket.
    fn release_texture(&mut self, texture: TextureHandle);
}
