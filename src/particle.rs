//! Particle records.
//!
//! A particle samples every emitter setting once at spawn and keeps the
//! results for its whole life. Only position, age, remaining life and the
//! five converging attributes (direction, spin, size, stretch x/y) change
//! afterwards.
//!
//! # Two clocks
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `age` | frames since spawn, grows by `delta` per tick |
//! | `life` | remaining life, shrinks by [`LIFE_DECAY_RATE`]` * delta` per tick |
//! | `total_life` | sampled lifetime × 100, the denominator for interpolation |
//!
//! `life` and `total_life` are independent: a particle dies when `life` runs
//! out, whether or not its attributes have finished converging.

use glam::Vec2;
use rand::Rng;

use crate::config::{EmitterConfig, Setting};

/// Remaining life consumed per unit of frame delta.
pub const LIFE_DECAY_RATE: f32 = 0.01;

/// Degrees subtracted from configured directions and spins so that 0° points
/// up on a y-down surface.
pub const UP_BIAS_DEGREES: f32 = 90.0;

/// Scale from percent settings (size, stretch) to factors.
const PERCENT: f32 = 0.01;

/// Scale from sampled lifetime to interpolation units.
const LIFE_UNITS: f32 = 100.0;

/// A single live particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Frames since spawn.
    pub age: f32,
    /// Remaining life.
    pub life: f32,
    /// Interpolation denominator, sampled lifetime × 100.
    pub total_life: f32,

    /// Integrated position, relative to the surface center.
    pub origin: Vec2,
    /// `origin` plus the wave overlay. This is what gets drawn.
    pub position: Vec2,

    /// Travel direction in degrees.
    pub direction: f32,
    pub end_direction: f32,
    /// Rotation in degrees.
    pub spin: f32,
    pub end_spin: f32,
    /// Uniform scale factor.
    pub size: f32,
    pub end_size: f32,
    /// Per-axis scale factors.
    pub stretch: Vec2,
    pub end_stretch: Vec2,

    pub speed: f32,
    pub gravity: Vec2,
    pub radial_accel: f32,
    pub tangential_accel: f32,

    /// Wave amplitudes, x from sine and y from cosine.
    pub wave_amplitude: Vec2,
    /// Wave frequencies, x from sine and y from cosine.
    pub wave_frequency: Vec2,

    pub fade_in: f32,
    pub fade_out: f32,

    /// Spawn color, 0-255 per channel.
    pub start_color: [f32; 3],
    /// Death color, 0-255 per channel.
    pub end_color: [f32; 3],
}

impl Particle {
    /// Sample a new particle from `config`, spawned around `origin`.
    ///
    /// `origin` is the emitter's biased spawn point; the configured offsets
    /// are added on top. The vertical offset is negated so positive values
    /// move up.
    pub fn spawn<R: Rng + ?Sized>(config: &EmitterConfig, origin: Vec2, rng: &mut R) -> Self {
        let life = config.lifetime.sample(rng);
        let up = |s: &Setting| Setting::new(s.value - UP_BIAS_DEGREES, s.spread);
        let down = Setting::new(-config.offset_y.value, config.offset_y.spread);

        let spawn_at = origin + Vec2::new(config.offset_x.sample(rng), down.sample(rng));

        Self {
            age: 0.0,
            life,
            total_life: life * LIFE_UNITS,
            origin: spawn_at,
            position: spawn_at,
            direction: up(&config.start_direction).sample(rng),
            end_direction: up(&config.end_direction).sample(rng),
            spin: up(&config.start_spin).sample(rng),
            end_spin: up(&config.end_spin).sample(rng),
            size: config.start_size.sample(rng) * PERCENT,
            end_size: config.end_size.sample(rng) * PERCENT,
            stretch: Vec2::new(
                config.start_stretch_x.sample(rng),
                config.start_stretch_y.sample(rng),
            ) * PERCENT,
            end_stretch: Vec2::new(
                config.end_stretch_x.sample(rng),
                config.end_stretch_y.sample(rng),
            ) * PERCENT,
            speed: config.speed.sample(rng),
            gravity: Vec2::new(config.gravity_x.sample(rng), config.gravity_y.sample(rng)),
            radial_accel: config.radial_accel.sample(rng),
            tangential_accel: config.tangential_accel.sample(rng),
            wave_amplitude: Vec2::new(
                config.sin_amplitude.sample(rng),
                config.cos_amplitude.sample(rng),
            ),
            wave_frequency: Vec2::new(
                config.sin_frequency.sample(rng),
                config.cos_frequency.sample(rng),
            ),
            fade_in: config.fade_in.sample(rng),
            fade_out: config.fade_out.sample(rng),
            start_color: config.start_color.sample(rng),
            end_color: config.end_color.sample(rng),
        }
    }

    /// Whether one more tick of `delta` would use up the remaining life.
    #[inline]
    pub fn expires_within(&self, delta: f32) -> bool {
        self.life - LIFE_DECAY_RATE * delta <= 0.0
    }

    /// Fraction of `total_life` reached by `age`, clamped to `[0, 1]`.
    #[inline]
    pub fn life_fraction(&self) -> f32 {
        clamp_unit(self.age / self.total_life)
    }

    /// Opacity from the fade-in and fade-out ramps.
    ///
    /// A zero fade rate yields a non-finite ramp; that value is passed on to
    /// the renderer as is.
    pub fn opacity(&self) -> f32 {
        let fade_in = self.age * (1.0 / self.fade_in);
        let fade_out = (self.total_life - self.age) * (1.0 / self.fade_out);
        let nearest = if fade_in.is_nan() || fade_out.is_nan() {
            f32::NAN
        } else {
            fade_in.min(fade_out)
        };
        clamp_unit(nearest)
    }
}

/// Clamp to `[0, 1]`, letting NaN through.
#[inline]
pub(crate) fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
