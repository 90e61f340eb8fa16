//! Table-driven sine and cosine.
//!
//! The integrator evaluates trig for every live particle every frame, so it
//! reads from a precomputed table instead of calling `f32::sin`/`f32::cos`.
//! The table spans one full period with a power-of-two bucket count, which
//! lets a lookup wrap with a bitmask instead of a modulo.
//!
//! ```ignore
//! use flurry::trig::{fast_cos, fast_sin};
//!
//! let x = fast_cos(angle) * speed;
//! let y = fast_sin(angle) * speed;
//! ```
//!
//! Results are quantized to the bucket containing the angle, so the error is
//! bounded by one bucket width ([`BUCKET_WIDTH`] radians).

use std::f32::consts::TAU;
use std::sync::LazyLock;

/// Number of buckets covering `[0, 2π)`. Must be a power of two.
pub const BUCKETS: usize = 8192;

/// Angular width of a single bucket in radians.
pub const BUCKET_WIDTH: f32 = TAU / BUCKETS as f32;

const MASK: i64 = BUCKETS as i64 - 1;
const INV_BUCKET_WIDTH: f32 = BUCKETS as f32 / TAU;

/// Precomputed sine and cosine samples over one period.
pub struct TrigTable {
    sin: Box<[f32]>,
    cos: Box<[f32]>,
}

impl TrigTable {
    /// Build the table. Sample `i` holds the value at angle `i * 2π / BUCKETS`.
    pub fn new() -> Self {
        let (sin, cos): (Vec<f32>, Vec<f32>) = (0..BUCKETS)
            .map(|i| {
                let angle = (i as f64 / BUCKETS as f64) * std::f64::consts::TAU;
                (angle.sin() as f32, angle.cos() as f32)
            })
            .unzip();

        Self {
            sin: sin.into_boxed_slice(),
            cos: cos.into_boxed_slice(),
        }
    }

    /// Approximate `sin(radians)`.
    #[inline]
    pub fn sin(&self, radians: f32) -> f32 {
        self.sin[bucket(radians)]
    }

    /// Approximate `cos(radians)`.
    #[inline]
    pub fn cos(&self, radians: f32) -> f32 {
        self.cos[bucket(radians)]
    }
}

impl Default for TrigTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an angle to its bucket. Negative angles wrap through two's complement.
#[inline]
fn bucket(radians: f32) -> usize {
    // `as i64` saturates and sends NaN to 0, so every input lands in range.
    ((radians * INV_BUCKET_WIDTH).floor() as i64 & MASK) as usize
}

static TABLE: LazyLock<TrigTable> = LazyLock::new(TrigTable::new);

/// Approximate sine from the shared table.
#[inline]
pub fn fast_sin(radians: f32) -> f32 {
    TABLE.sin(radians)
}

/// Approximate cosine from the shared table.
#[inline]
pub fn fast_cos(radians: f32) -> f32 {
    TABLE.cos(radians)
}
