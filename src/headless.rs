//! In-memory renderer backend.
//!
//! [`HeadlessBackend`] records everything the engine asks of it and draws
//! nothing. Texture loads are parked until [`HeadlessBackend::finish_loads`]
//! runs, which lets a host or test decide exactly when a load "completes".
//!
//! ```ignore
//! let mut engine = Engine::new(HeadlessBackend::new());
//! engine.initialize(None)?;
//! engine.create_emitter("sparks", Vec2::ZERO, "", None)?;
//!
//! engine.backend_mut().finish_loads();
//! engine.tick(1.0)?; // texture applied here
//! ```

use std::collections::HashSet;

use glam::{UVec2, Vec2};

use crate::backend::{
    DrawCall, GeometryHandle, ImageSource, RenderBackend, TextureHandle, TextureInfo, TextureTicket,
};
use crate::error::TextureError;
use crate::texture;

/// A load waiting for [`HeadlessBackend::finish_loads`].
#[derive(Debug)]
pub struct PendingLoad {
    pub source: ImageSource,
    pub ticket: TextureTicket,
}

/// Records engine calls without a GPU.
#[derive(Debug)]
pub struct HeadlessBackend {
    size: UVec2,
    geometry: Vec<Vec<(Vec2, Vec2)>>,
    pending: Vec<PendingLoad>,
    live: HashSet<TextureHandle>,
    released: Vec<TextureHandle>,
    next_texture: u64,
    draws: Vec<DrawCall>,
    frames: u64,
    last_clear: Option<bool>,
    in_frame: bool,
}

impl HeadlessBackend {
    /// A backend with a zero-sized surface. `Engine::initialize` sizes it.
    pub fn new() -> Self {
        Self::with_size(UVec2::ZERO)
    }

    /// A backend whose surface already exists at `size`.
    pub fn with_size(size: UVec2) -> Self {
        Self {
            size,
            geometry: Vec::new(),
            pending: Vec::new(),
            live: HashSet::new(),
            released: Vec::new(),
            next_texture: 1,
            draws: Vec::new(),
            frames: 0,
            last_clear: None,
            in_frame: false,
        }
    }

    /// Complete every parked load. Pixel sources resolve to their own
    /// dimensions, paths are decoded from disk.
    ///
    /// Returns how many loads were resolved.
    pub fn finish_loads(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for load in pending {
            let result = texture::decode(load.source).map(|image| {
                let (width, height) = image.dimensions();
                self.issue(width as f32, height as f32)
            });
            load.ticket.resolve(result);
        }
        count
    }

    /// Complete every parked load with a texture of the given size,
    /// regardless of source.
    pub fn finish_loads_with_size(&mut self, width: f32, height: f32) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for load in pending {
            let info = self.issue(width, height);
            load.ticket.resolve(Ok(info));
        }
        count
    }

    /// Fail every parked load.
    pub fn fail_loads(&mut self, reason: &str) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for load in pending {
            load.ticket.resolve(Err(TextureError::Backend(reason.to_string())));
        }
        count
    }

    /// Hand out parked loads so the caller can resolve them itself, possibly
    /// from other threads.
    pub fn take_pending(&mut self) -> Vec<PendingLoad> {
        std::mem::take(&mut self.pending)
    }

    /// Issue a texture handle as if an upload had happened.
    pub fn issue(&mut self, width: f32, height: f32) -> TextureInfo {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.live.insert(handle);
        TextureInfo {
            handle,
            width,
            height,
        }
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Draw calls of the current or most recent frame.
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Frames completed with `end_frame`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The clear flag of the most recent `begin_frame`.
    pub fn last_clear(&self) -> Option<bool> {
        self.last_clear
    }

    pub fn is_live(&self, texture: TextureHandle) -> bool {
        self.live.contains(&texture)
    }

    pub fn live_textures(&self) -> usize {
        self.live.len()
    }

    /// Every release in call order, including repeats.
    pub fn released(&self) -> &[TextureHandle] {
        &self.released
    }

    /// How many times `texture` was released.
    pub fn release_count(&self, texture: TextureHandle) -> usize {
        self.released.iter().filter(|&&t| t == texture).count()
    }

    /// Vertices of a geometry created by the engine.
    pub fn geometry(&self, handle: GeometryHandle) -> Option<&[(Vec2, Vec2)]> {
        self.geometry.get(handle.0 as usize).map(Vec::as_slice)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for HeadlessBackend {
    fn surface_size(&self) -> UVec2 {
        self.size
    }

    fn resize(&mut self, size: UVec2) {
        self.size = size;
    }

    fn create_geometry(&mut self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle {
        let handle = GeometryHandle(self.geometry.len() as u32);
        self.geometry
            .push(positions.iter().copied().zip(uvs.iter().copied()).collect());
        handle
    }

    fn load_texture(&mut self, source: ImageSource, ticket: TextureTicket) {
        self.pending.push(PendingLoad { source, ticket });
    }

    fn begin_frame(&mut self, size: UVec2, clear: bool) {
        if self.in_frame {
            log::warn!("begin_frame called twice without end_frame");
        }
        self.size = size;
        self.last_clear = Some(clear);
        self.draws.clear();
        self.in_frame = true;
    }

    fn submit_draw(&mut self, draw: DrawCall) {
        self.draws.push(draw);
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
        self.frames += 1;
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.live.remove(&texture);
        self.released.push(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::backend::TextureEvent;

    #[test]
    fn test_pixel_loads_resolve_to_image_size() {
        let (tx, rx) = mpsc::channel::<TextureEvent>();
        let mut backend = HeadlessBackend::new();
        backend.load_texture(
            ImageSource::Pixels(texture::default_image()),
            TextureTicket::new(4, tx),
        );
        assert_eq!(backend.pending_loads(), 1);
        assert!(rx.try_recv().is_err());

        assert_eq!(backend.finish_loads(), 1);
        let event = rx.try_recv().unwrap();
        let info = event.result.unwrap();
        assert_eq!(event.generation, 4);
        assert_eq!(info.width, texture::DEFAULT_TEXTURE_SIZE as f32);
        assert!(backend.is_live(info.handle));
    }

    #[test]
    fn test_missing_file_fails_load() {
        let (tx, rx) = mpsc::channel::<TextureEvent>();
        let mut backend = HeadlessBackend::new();
        backend.load_texture(ImageSource::Url("/no/such/sprite.png".into()), TextureTicket::new(1, tx));
        backend.finish_loads();
        assert!(rx.try_recv().unwrap().result.is_err());
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_frame_recording() {
        let mut backend = HeadlessBackend::new();
        backend.begin_frame(UVec2::new(10, 10), false);
        backend.submit_draw(DrawCall {
            geometry: GeometryHandle(0),
            transform: glam::Mat4::IDENTITY,
            texture: TextureHandle(1),
            tint: glam::Vec4::ONE,
        });
        backend.end_frame();
        assert_eq!(backend.draws().len(), 1);
        assert_eq!(backend.last_clear(), Some(false));

        backend.begin_frame(UVec2::new(10, 10), true);
        assert!(backend.draws().is_empty());
        backend.end_frame();
        assert_eq!(backend.frames(), 2);
    }

    #[test]
    fn test_release_is_counted() {
        let mut backend = HeadlessBackend::new();
        let info = backend.issue(8.0, 8.0);
        backend.release_texture(info.handle);
        assert!(!backend.is_live(info.handle));
        assert_eq!(backend.release_count(info.handle), 1);
    }
}
