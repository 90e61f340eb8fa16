//! Emitter configuration.
//!
//! Every tunable parameter of an emitter is a [`Setting`]: a base value plus a
//! spread. Each time a particle spawns, every setting is sampled independently
//! as `value + uniform(-1, 1) * spread`, so two particles from the same
//! emitter rarely look alike.
//!
//! # Units
//!
//! | Settings | Unit |
//! |----------|------|
//! | directions, spins | degrees (0° points up on screen) |
//! | sizes, stretches | percent of the texture size |
//! | colors | 0-255 per channel |
//! | lifetime | life units; multiplied by 100 for interpolation |
//!
//! # Loading from JSON
//!
//! Configurations serialize with serde. Missing fields fall back to the
//! engine defaults, so a document only needs the entries it changes:
//!
//! ```ignore
//! let config = EmitterConfig::from_json(r#"{
//!     "speed": { "value": 4.0, "spread": 1.0 },
//!     "end_color": { "value": [255, 200, 0], "spread": 20 }
//! }"#)?;
//! ```

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A randomized scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Center of the sampled range.
    pub value: f32,
    /// Maximum deviation from `value` in either direction.
    pub spread: f32,
}

impl Setting {
    /// A setting with the given value and spread.
    pub const fn new(value: f32, spread: f32) -> Self {
        Self { value, spread }
    }

    /// A setting that always samples to `value`.
    pub const fn fixed(value: f32) -> Self {
        Self { value, spread: 0.0 }
    }

    /// Draw one sample.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        jitter(self.value, self.spread, rng)
    }
}

/// A randomized RGB color. The spread applies to each channel independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSetting {
    /// Base color, 0-255 per channel.
    pub value: [f32; 3],
    /// Maximum per-channel deviation.
    pub spread: f32,
}

impl ColorSetting {
    /// A color setting with the given base and spread.
    pub const fn new(value: [f32; 3], spread: f32) -> Self {
        Self { value, spread }
    }

    /// Draw one color. Channels are clamped to `[0, 255]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> [f32; 3] {
        self.value
            .map(|channel| jitter(channel, self.spread, rng).clamp(0.0, 255.0))
    }
}

#[inline]
fn jitter<R: Rng + ?Sized>(value: f32, spread: f32, rng: &mut R) -> f32 {
    value + (rng.gen::<f32>() * 2.0 - 1.0) * spread
}

/// Complete emitter configuration.
///
/// `Default` gives the engine's stock effect: a small magenta-to-blue spray
/// shooting upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Upper bound on live particles, sampled each frame.
    pub spawn_cap: Setting,
    /// Particles spawned per frame while under the cap.
    pub emission_rate: Setting,
    /// Particle lifetime.
    pub lifetime: Setting,
    /// Speed along the travel direction, per frame.
    pub speed: Setting,
    /// Horizontal spawn offset from the anchor.
    pub offset_x: Setting,
    /// Vertical spawn offset from the anchor (positive is up).
    pub offset_y: Setting,
    /// Horizontal gravity, scaled by particle age.
    pub gravity_x: Setting,
    /// Vertical gravity, scaled by particle age.
    pub gravity_y: Setting,
    pub start_direction: Setting,
    pub end_direction: Setting,
    pub start_spin: Setting,
    pub end_spin: Setting,
    pub start_size: Setting,
    pub end_size: Setting,
    pub start_stretch_x: Setting,
    pub end_stretch_x: Setting,
    pub start_stretch_y: Setting,
    pub end_stretch_y: Setting,
    /// Acceleration along the line to the emitter's visual center.
    pub radial_accel: Setting,
    /// Acceleration perpendicular to that line.
    pub tangential_accel: Setting,
    /// Horizontal wave amplitude.
    pub sin_amplitude: Setting,
    /// Vertical wave amplitude.
    pub cos_amplitude: Setting,
    /// Horizontal wave frequency.
    pub sin_frequency: Setting,
    /// Vertical wave frequency.
    pub cos_frequency: Setting,
    /// Frames of age per unit of fade-in opacity.
    pub fade_in: Setting,
    /// Frames of remaining life per unit of fade-out opacity.
    pub fade_out: Setting,
    pub start_color: ColorSetting,
    pub end_color: ColorSetting,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            spawn_cap: Setting::fixed(50.0),
            emission_rate: Setting::fixed(1.0),
            lifetime: Setting::new(0.4, 0.1),
            speed: Setting::fixed(15.0),
            offset_x: Setting::fixed(10.0),
            offset_y: Setting::fixed(0.0),
            gravity_x: Setting::fixed(0.0),
            gravity_y: Setting::fixed(-1.5),
            start_direction: Setting::new(0.0, 25.0),
            end_direction: Setting::fixed(0.0),
            start_spin: Setting::fixed(0.0),
            end_spin: Setting::new(45.0, 135.0),
            start_size: Setting::new(25.0, 10.0),
            end_size: Setting::new(15.0, 5.0),
            start_stretch_x: Setting::fixed(100.0),
            end_stretch_x: Setting::fixed(100.0),
            start_stretch_y: Setting::fixed(100.0),
            end_stretch_y: Setting::fixed(100.0),
            radial_accel: Setting::fixed(0.0),
            tangential_accel: Setting::fixed(0.0),
            sin_amplitude: Setting::fixed(0.0),
            cos_amplitude: Setting::fixed(0.0),
            sin_frequency: Setting::fixed(1.0),
            cos_frequency: Setting::fixed(1.0),
            fade_in: Setting::new(0.0, 5.0),
            fade_out: Setting::new(15.0, 2.0),
            start_color: ColorSetting::new([255.0, 0.0, 255.0], 0.0),
            end_color: ColorSetting::new([0.0, 0.0, 255.0], 0.0),
        }
    }
}

impl EmitterConfig {
    /// Parse a configuration from JSON. Absent entries keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_fixed_setting_has_no_variance() {
        let mut rng = SmallRng::seed_from_u64(7);
        let setting = Setting::fixed(3.5);
        for _ in 0..50 {
            assert_eq!(setting.sample(&mut rng), 3.5);
        }
    }

    #[test]
    fn test_sample_stays_within_spread() {
        let mut rng = SmallRng::seed_from_u64(11);
        let setting = Setting::new(10.0, 2.0);
        for _ in 0..1000 {
            let v = setting.sample(&mut rng);
            assert!((8.0..=12.0).contains(&v), "{v} outside spread");
        }
    }

    #[test]
    fn test_color_channels_are_clamped() {
        let mut rng = SmallRng::seed_from_u64(3);
        let color = ColorSetting::new([250.0, 5.0, 128.0], 40.0);
        for _ in 0..500 {
            for channel in color.sample(&mut rng) {
                assert!((0.0..=255.0).contains(&channel));
            }
        }
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EmitterConfig::from_json(
            r#"{ "spawn_cap": { "value": 0, "spread": 0 }, "speed": { "value": 4, "spread": 1 } }"#,
        )
        .unwrap();

        assert_eq!(config.spawn_cap, Setting::fixed(0.0));
        assert_eq!(config.speed, Setting::new(4.0, 1.0));
        assert_eq!(config.lifetime, EmitterConfig::default().lifetime);
        assert_eq!(config.end_color, EmitterConfig::default().end_color);
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let mut config = EmitterConfig::default();
        config.start_color = ColorSetting::new([12.0, 34.0, 56.0], 7.0);
        let json = config.to_json().unwrap();
        assert_eq!(EmitterConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = EmitterConfig::from_json(r#"{ "speed": "fast" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
