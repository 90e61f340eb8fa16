//! Texture sources for emitters.
//!
//! An emitter is created from a [`TextureSource`]:
//!
//! | Variant | Behavior |
//! |---------|----------|
//! | [`TextureSource::Url`] | Loaded asynchronously by the backend. The emitter stays inert until it arrives. |
//! | [`TextureSource::Resolved`] | A texture the host already uploaded. Validated, then usable immediately. |
//! | [`TextureSource::Default`] | A plain white square, loaded like a URL. |
//!
//! # Supported Formats
//!
//! - PNG (recommended)
//! - JPEG

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::backend::{ImageSource, TextureHandle, TextureInfo};
use crate::error::TextureError;

/// Edge length of the built-in white texture, in pixels.
pub const DEFAULT_TEXTURE_SIZE: u32 = 50;

/// Where an emitter's texture comes from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Filesystem path to an encoded image. An empty string selects the
    /// default texture.
    ///
    /// Only local paths are read: `http(s)://` and `data:` URIs are not
    /// fetched and fail the load with an IO error.
    Url(String),
    /// A texture already resident in the backend.
    Resolved(ResolvedTexture),
    /// The built-in white square.
    Default,
}

impl From<&str> for TextureSource {
    fn from(url: &str) -> Self {
        TextureSource::Url(url.to_string())
    }
}

impl From<String> for TextureSource {
    fn from(url: String) -> Self {
        TextureSource::Url(url)
    }
}

impl From<TextureInfo> for TextureSource {
    fn from(info: TextureInfo) -> Self {
        TextureSource::Resolved(ResolvedTexture {
            handle: Some(info.handle),
            width: info.width,
            height: info.height,
        })
    }
}

/// A host-supplied texture description, checked before use.
///
/// Hosts often assemble these from loose data, so every field is validated
/// by [`ResolvedTexture::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTexture {
    /// Backend handle, if the host has one.
    pub handle: Option<TextureHandle>,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl ResolvedTexture {
    /// Check the description and turn it into a usable [`TextureInfo`].
    pub fn validate(&self) -> Result<TextureInfo, &'static str> {
        let handle = match self.handle {
            Some(handle) if !handle.is_null() => handle,
            _ => return Err("missing texture handle"),
        };
        let dimension_ok = |d: f32| d.is_finite() && d > 0.0;
        if !dimension_ok(self.width) || !dimension_ok(self.height) {
            return Err("width and height must be positive numbers");
        }
        Ok(TextureInfo {
            handle,
            width: self.width,
            height: self.height,
        })
    }
}

/// Pixels of the built-in white square.
pub fn default_image() -> RgbaImage {
    RgbaImage::from_pixel(
        DEFAULT_TEXTURE_SIZE,
        DEFAULT_TEXTURE_SIZE,
        Rgba([255, 255, 255, 255]),
    )
}

/// Turn a URL into the image source a backend should load.
pub(crate) fn image_source_for(url: &str) -> ImageSource {
    if url.is_empty() {
        ImageSource::Pixels(default_image())
    } else {
        ImageSource::Url(url.to_string())
    }
}

/// Decode an image source into RGBA pixels.
///
/// This blocks on file IO; backends call it from a worker thread.
pub fn decode(source: ImageSource) -> Result<RgbaImage, TextureError> {
    match source {
        ImageSource::Pixels(pixels) => Ok(pixels),
        ImageSource::Url(url) => decode_file(&url),
    }
}

fn decode_file<P: AsRef<Path>>(path: P) -> Result<RgbaImage, TextureError> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(image::load_from_memory(&bytes)?.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(handle: Option<u64>, width: f32, height: f32) -> ResolvedTexture {
        ResolvedTexture {
            handle: handle.map(TextureHandle),
            width,
            height,
        }
    }

    #[test]
    fn test_valid_texture_passes() {
        let info = resolved(Some(5), 32.0, 16.0).validate().unwrap();
        assert_eq!(info.handle, TextureHandle(5));
        assert_eq!(info.size(), glam::Vec2::new(32.0, 16.0));
    }

    #[test]
    fn test_missing_handle_is_rejected() {
        assert!(resolved(None, 32.0, 32.0).validate().is_err());
        assert!(resolved(Some(0), 32.0, 32.0).validate().is_err());
    }

    #[test]
    fn test_bad_dimensions_are_rejected() {
        assert!(resolved(Some(1), f32::NAN, 32.0).validate().is_err());
        assert!(resolved(Some(1), 32.0, f32::INFINITY).validate().is_err());
        assert!(resolved(Some(1), 0.0, 32.0).validate().is_err());
        assert!(resolved(Some(1), 32.0, -4.0).validate().is_err());
    }

    #[test]
    fn test_default_image_is_opaque_white() {
        let img = default_image();
        assert_eq!(img.dimensions(), (DEFAULT_TEXTURE_SIZE, DEFAULT_TEXTURE_SIZE));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_empty_url_selects_default_pixels() {
        assert!(matches!(image_source_for(""), ImageSource::Pixels(_)));
        assert!(matches!(image_source_for("spark.png"), ImageSource::Url(_)));
    }

    #[test]
    fn test_decode_missing_file_is_io_error() {
        let err = decode(ImageSource::Url("/definitely/not/here.png".into())).unwrap_err();
        assert!(matches!(err, TextureError::Io(_)));
    }

    #[test]
    fn test_remote_and_data_urls_are_not_fetched() {
        for url in ["https://example.com/spark.png", "data:image/png;base64,iVBORw0KGgo="] {
            let err = decode(ImageSource::Url(url.into())).unwrap_err();
            assert!(matches!(err, TextureError::Io(_)), "{}", url);
        }
    }
}
