//! wgpu renderer backend.
//!
//! [`WgpuBackend`] draws the engine's sprites into a persistent offscreen
//! target and copies that to the window surface each frame.
//!
//! Encoded images are decoded on a worker thread. The GPU upload happens on
//! the render thread at the start of the next frame, and the load ticket is
//! resolved right after, so the emitter picks up its texture on the tick
//! that follows.

mod sprite;
mod target;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use glam::{UVec2, Vec2};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{
    DrawCall, GeometryHandle, ImageSource, RenderBackend, TextureHandle, TextureInfo, TextureTicket,
};
use crate::error::{GpuError, TextureError};
use crate::texture;

use sprite::{batch_draws, QuadVertex, SpriteInstance, SpritePipeline};
use target::OffscreenTarget;

const SPRITE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const INITIAL_INSTANCE_CAPACITY: usize = 1024;

struct GpuGeometry {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct DecodedImage {
    ticket: TextureTicket,
    result: Result<RgbaImage, TextureError>,
}

#[derive(Default)]
struct Frame {
    clear: bool,
    draws: Vec<DrawCall>,
}

/// Renders engine frames to a winit window.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    sprites: SpritePipeline,
    target: OffscreenTarget,
    geometry: Vec<GpuGeometry>,
    textures: HashMap<TextureHandle, GpuTexture>,
    next_texture: u64,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    decoded_tx: Sender<DecodedImage>,
    decoded_rx: Receiver<DecodedImage>,
    frame: Frame,
}

impl WgpuBackend {
    /// Set up a device and surface for `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flurry Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoAdapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "wgpu backend ready: {} ({:?}), surface {}x{} {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.width,
            config.height,
            config.format
        );

        let sprites = SpritePipeline::new(&device, config.format);
        let target = OffscreenTarget::new(&device, config.width, config.height, config.format);
        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCE_CAPACITY);
        let (decoded_tx, decoded_rx) = mpsc::channel();

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sprites,
            target,
            geometry: Vec::new(),
            textures: HashMap::new(),
            next_texture: 1,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            decoded_tx,
            decoded_rx,
            frame: Frame::default(),
        })
    }

    /// Number of textures currently resident.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn upload(&mut self, image: &RgbaImage) -> Result<TextureInfo, TextureError> {
        let (width, height) = image.dimensions();
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(TextureError::Backend(format!(
                "{}x{} is outside the supported texture size (1..={})",
                width, height, max
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SPRITE_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Texture Bind Group"),
            layout: &self.sprites.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sprites.sampler),
                },
            ],
        });

        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, GpuTexture { texture, bind_group });

        Ok(TextureInfo {
            handle,
            width: width as f32,
            height: height as f32,
        })
    }

    /// Upload images finished by decode workers and resolve their tickets.
    fn upload_decoded(&mut self) {
        while let Ok(decoded) = self.decoded_rx.try_recv() {
            let result = decoded.result.and_then(|image| self.upload(&image));
            decoded.ticket.resolve(result);
        }
    }

    fn ensure_instance_capacity(&mut self, needed: usize) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        log::debug!("growing sprite instance buffer to {} instances", capacity);
        self.instance_buffer = create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }

    fn render(&mut self) {
        let draws = std::mem::take(&mut self.frame.draws);

        let instances: Vec<SpriteInstance> = draws.iter().map(SpriteInstance::from).collect();
        self.ensure_instance_capacity(instances.len());
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sprite Encoder"),
            });

        {
            let load = if self.frame.clear {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            } else {
                wgpu::LoadOp::Load
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sprite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.sprites.pipeline);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

            for batch in batch_draws(&draws, |d| (d.geometry, d.texture)) {
                let Some(texture) = self.textures.get(&batch.texture) else {
                    continue;
                };
                let Some(geometry) = self.geometry.get(batch.geometry.0 as usize) else {
                    continue;
                };
                pass.set_bind_group(0, &texture.bind_group, &[]);
                pass.set_vertex_buffer(0, geometry.buffer.slice(..));
                pass.draw(0..geometry.vertex_count, batch.instances);
            }
        }

        // Reuse the allocation next frame.
        self.frame.draws = draws;
        self.frame.draws.clear();

        let output = match self.surface.get_current_texture() {
            Ok(output) => Some(output),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                None
            }
            Err(e) => {
                log::warn!("skipping present: {}", e);
                None
            }
        };

        if let Some(output) = &output {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.target.blit(&mut encoder, &view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(output) = output {
            output.present();
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn surface_size(&self) -> UVec2 {
        UVec2::new(self.config.width, self.config.height)
    }

    fn resize(&mut self, size: UVec2) {
        if size.x == 0 || size.y == 0 || size == self.surface_size() {
            return;
        }
        self.config.width = size.x;
        self.config.height = size.y;
        self.surface.configure(&self.device, &self.config);
        self.target.resize(&self.device, size.x, size.y);
    }

    fn create_geometry(&mut self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle {
        let vertices = QuadVertex::interleave(positions, uvs);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sprite Geometry"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let handle = GeometryHandle(self.geometry.len() as u32);
        self.geometry.push(GpuGeometry {
            buffer,
            vertex_count: vertices.len() as u32,
        });
        handle
    }

    fn load_texture(&mut self, source: ImageSource, ticket: TextureTicket) {
        match source {
            ImageSource::Pixels(image) => {
                let result = self.upload(&image);
                ticket.resolve(result);
            }
            encoded @ ImageSource::Url(_) => {
                let tx = self.decoded_tx.clone();
                std::thread::spawn(move || {
                    let result = texture::decode(encoded);
                    if tx.send(DecodedImage { ticket, result }).is_err() {
                        log::debug!("decoded image dropped, renderer is gone");
                    }
                });
            }
        }
    }

    fn begin_frame(&mut self, size: UVec2, clear: bool) {
        self.upload_decoded();
        self.resize(size);
        self.frame.clear = clear;
        self.frame.draws.clear();
    }

    fn submit_draw(&mut self, draw: DrawCall) {
        self.frame.draws.push(draw);
    }

    fn end_frame(&mut self) {
        self.render();
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu) = self.textures.remove(&texture) {
            gpu.texture.destroy();
        }
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Sprite Instances"),
        size: (capacity * std::mem::size_of::<SpriteInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
