//! The per-tick particle algorithm.
//!
//! [`ParticlePool::step`] advances every live particle of one emitter by one
//! frame and emits a [`Sprite`] for each particle that is visible. Per
//! particle, in pool order:
//!
//! 1. Cull if the remaining life would run out this tick.
//! 2. Integrate the origin: directional speed, radial and tangential
//!    acceleration toward the emitter's visual center, gravity. Accelerations
//!    scale with age.
//! 3. Add the wave overlay to get the render position.
//! 4. Compute opacity from the fade ramps.
//! 5. Look up (or compute and cache) the tint.
//! 6. Advance age and consume life.
//! 7. Skip drawing if the sprite lies entirely off the surface.
//! 8. Emit the sprite.
//! 9. Nudge direction, spin, size and stretch toward their end values.
//!
//! Culling compacts the pool in place during the same pass, preserving the
//! order of the survivors.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::particle::{Particle, LIFE_DECAY_RATE};
use crate::tint::{self, TintCache};
use crate::trig::{fast_cos, fast_sin};

/// Inputs shared by every particle of an emitter for one tick.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// Frame multiplier; 1.0 is one nominal frame.
    pub delta: f32,
    /// Emitter anchor.
    pub anchor: Vec2,
    /// Surface size in pixels.
    pub surface: Vec2,
    /// Emitter texture size in pixels.
    pub texture: Vec2,
    /// Pixel-to-clip projection.
    pub projection: Mat4,
}

impl StepContext {
    /// Reference point for radial and tangential acceleration: the anchor
    /// shifted by half the surface.
    #[inline]
    pub fn visual_center(&self) -> Vec2 {
        self.anchor + self.surface * 0.5
    }
}

/// A sprite ready for submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Full transform for the unit quad.
    pub transform: Mat4,
    /// RGB tint in 0-1 and opacity in `w`.
    pub tint: Vec4,
}

/// Live particles of one emitter.
#[derive(Debug, Default, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Live particles in pool order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Add a particle at the end of the pool.
    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Remove every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Advance all particles by one tick, calling `draw` for each visible one.
    pub fn step(&mut self, ctx: &StepContext, tints: &mut TintCache, mut draw: impl FnMut(Sprite)) {
        let decay = LIFE_DECAY_RATE * ctx.delta;
        let center = ctx.visual_center();

        self.particles.retain_mut(|p| {
            if p.expires_within(ctx.delta) {
                return false;
            }

            integrate(p, center, ctx.delta);
            apply_wave(p);

            let opacity = p.opacity();
            let color = tints.get_or_insert_with(p.life, || {
                tint::blend(p.start_color, p.end_color, p.life_fraction())
            });

            p.age += ctx.delta;
            p.life -= decay;

            if let Some(sprite) = sprite_for(p, ctx, color.extend(opacity)) {
                draw(sprite);
            }

            converge(p, ctx.delta);
            true
        });
    }
}

fn integrate(p: &mut Particle, center: Vec2, delta: f32) {
    let offset = p.position - center;
    let magnitude = offset.length();
    // A particle sitting on the center (or a NaN offset) uses a unit divisor.
    let magnitude = if magnitude == 0.0 || magnitude.is_nan() { 1.0 } else { magnitude };
    let normal = offset / magnitude;

    let heading = p.direction.to_radians();
    let radial = p.radial_accel * p.age;
    let tangential = p.tangential_accel * p.age;

    p.origin.x += (fast_cos(heading) * p.speed + normal.x * radial - normal.y * tangential) * delta;
    p.origin.x -= p.gravity.x * p.age * delta;
    p.origin.y += (fast_sin(heading) * p.speed + normal.y * radial + normal.x * tangential) * delta;
    p.origin.y -= p.gravity.y * p.age * delta;
}

fn apply_wave(p: &mut Particle) {
    // Phase follows consumed life rather than age.
    let phase = p.total_life - p.life;
    p.position = p.origin
        + Vec2::new(
            fast_sin(phase * p.wave_frequency.x) * p.wave_amplitude.x,
            fast_cos(phase * p.wave_frequency.y) * p.wave_amplitude.y,
        );
}

/// Build the sprite, or `None` if its bounds miss the surface entirely.
fn sprite_for(p: &Particle, ctx: &StepContext, tint: Vec4) -> Option<Sprite> {
    let screen = p.position + ctx.surface * 0.5;
    let extent = ctx.texture * p.size * p.stretch;

    if screen.x + extent.x < 0.0
        || screen.x - extent.x > ctx.surface.x
        || screen.y + extent.y < 0.0
        || screen.y - extent.y > ctx.surface.y
    {
        return None;
    }

    let transform = ctx.projection
        * Mat4::from_translation(screen.extend(0.0))
        * Mat4::from_rotation_z(p.spin.to_radians())
        * Mat4::from_scale(Vec3::new(extent.x, extent.y, 1.0));

    Some(Sprite { transform, tint })
}

fn converge(p: &mut Particle, delta: f32) {
    let rate = delta / p.total_life;
    p.direction += (p.end_direction - p.direction) * rate;
    p.spin += (p.end_spin - p.spin) * rate;
    p.size += (p.end_size - p.size) * rate;
    p.stretch += (p.end_stretch - p.stretch) * rate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorSetting, EmitterConfig, Setting};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const SURFACE: Vec2 = Vec2::new(480.0, 360.0);

    fn context(anchor: Vec2) -> StepContext {
        StepContext {
            delta: 1.0,
            anchor,
            surface: SURFACE,
            texture: Vec2::new(50.0, 50.0),
            projection: Mat4::orthographic_rh(0.0, SURFACE.x, SURFACE.y, 0.0, -1.0, 1.0),
        }
    }

    /// A particle with every random setting pinned and all motion disabled.
    fn still_particle() -> Particle {
        let mut config = EmitterConfig::default();
        config.lifetime = Setting::fixed(0.5);
        config.speed = Setting::fixed(0.0);
        config.offset_x = Setting::fixed(0.0);
        config.gravity_y = Setting::fixed(0.0);
        config.start_direction = Setting::fixed(0.0);
        config.end_spin = Setting::fixed(0.0);
        config.start_size = Setting::fixed(20.0);
        config.end_size = Setting::fixed(20.0);
        config.fade_in = Setting::fixed(1.0);
        config.fade_out = Setting::fixed(1.0);
        let mut rng = SmallRng::seed_from_u64(9);
        Particle::spawn(&config, Vec2::ZERO, &mut rng)
    }

    fn step_collect(pool: &mut ParticlePool, ctx: &StepContext, tints: &mut TintCache) -> Vec<Sprite> {
        let mut sprites = Vec::new();
        pool.step(ctx, tints, |s| sprites.push(s));
        sprites
    }

    #[test]
    fn test_expiring_particle_is_removed_before_processing() {
        let mut pool = ParticlePool::new();
        let mut dying = still_particle();
        dying.life = 0.005;
        let mut healthy = still_particle();
        healthy.life = 0.02;
        pool.push(dying);
        pool.push(healthy);

        let mut tints = TintCache::new();
        let sprites = step_collect(&mut pool, &context(Vec2::ZERO), &mut tints);

        assert_eq!(pool.len(), 1);
        assert_eq!(sprites.len(), 1);
        assert!((pool.particles()[0].life - 0.01).abs() < 1e-6);
        // The culled particle never reached the tint stage.
        assert_eq!(tints.len(), 1);
    }

    #[test]
    fn test_survivors_keep_their_order() {
        let mut pool = ParticlePool::new();
        for (i, life) in [0.5, 0.001, 0.4, 0.002, 0.3].into_iter().enumerate() {
            let mut p = still_particle();
            p.life = life;
            p.speed = i as f32;
            pool.push(p);
        }

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());

        let speeds: Vec<f32> = pool.particles().iter().map(|p| p.speed).collect();
        assert_eq!(speeds, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_directional_speed_moves_origin() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.speed = 10.0;
        // -90° is straight up.
        p.end_direction = p.direction;
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let moved = pool.particles()[0].origin;
        assert!(moved.x.abs() < 0.01);
        assert!((moved.y + 10.0).abs() < 0.01);
    }

    #[test]
    fn test_gravity_scales_with_age() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.gravity = Vec2::new(0.0, -2.0);
        pool.push(p);

        let ctx = context(Vec2::ZERO);
        let mut tints = TintCache::new();
        // Age 0 on the first tick: no gravity yet.
        step_collect(&mut pool, &ctx, &mut tints);
        assert_eq!(pool.particles()[0].origin.y, 0.0);
        // Age 1: y -= -2 * 1.
        step_collect(&mut pool, &ctx, &mut tints);
        assert!((pool.particles()[0].origin.y - 2.0).abs() < 1e-5);
        // Age 2: y -= -2 * 2.
        step_collect(&mut pool, &ctx, &mut tints);
        assert!((pool.particles()[0].origin.y - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_radial_acceleration_points_along_center_offset() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.radial_accel = 1.0;
        p.age = 1.0;
        // Visual center is (240, 180) for a zero anchor; sit 10px to its right.
        p.position = Vec2::new(250.0, 180.0);
        p.origin = p.position;
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let origin = pool.particles()[0].origin;
        assert!((origin.x - 251.0).abs() < 1e-4);
        assert!((origin.y - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_tangential_acceleration_is_perpendicular() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.tangential_accel = 1.0;
        p.age = 1.0;
        p.position = Vec2::new(250.0, 180.0);
        p.origin = p.position;
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let origin = pool.particles()[0].origin;
        assert!((origin.x - 250.0).abs() < 1e-4);
        assert!((origin.y - 181.0).abs() < 1e-4);
    }

    #[test]
    fn test_wave_offsets_render_position_only() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.wave_amplitude = Vec2::new(0.0, 5.0);
        // Zero frequency pins the phase at 0, so cos contributes the full amplitude.
        p.wave_frequency = Vec2::ZERO;
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let p = &pool.particles()[0];
        assert_eq!(p.origin, Vec2::ZERO);
        assert!((p.position.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_wave_phase_is_consumed_life() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.wave_amplitude = Vec2::new(10.0, 10.0);
        p.wave_frequency = Vec2::new(0.01, 0.01);
        // Phase uses life before this tick's decay: 50 - 0.5.
        let phase = p.total_life - p.life;
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let p = &pool.particles()[0];
        assert_eq!(p.origin, Vec2::ZERO);
        assert!((p.position.x - fast_sin(phase * 0.01) * 10.0).abs() < 1e-5);
        assert!((p.position.y - fast_cos(phase * 0.01) * 10.0).abs() < 1e-5);
        assert!((p.position.x - 4.75).abs() < 0.01);
        assert!((p.position.y - 8.80).abs() < 0.01);
    }

    #[test]
    fn test_acceleration_normal_uses_render_position() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.radial_accel = 1.0;
        p.age = 1.0;
        // Last drawn 10px below the visual center (240, 180), while the
        // integrated origin sits 10px to its right.
        p.position = Vec2::new(240.0, 190.0);
        p.origin = Vec2::new(250.0, 180.0);
        pool.push(p);

        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        let origin = pool.particles()[0].origin;
        assert!((origin.x - 250.0).abs() < 1e-4);
        assert!((origin.y - 181.0).abs() < 1e-4);
    }

    #[test]
    fn test_tint_interpolates_start_to_end() {
        let mut p = still_particle();
        p.start_color = [255.0, 0.0, 0.0];
        p.end_color = [0.0, 0.0, 255.0];

        let mut pool = ParticlePool::new();
        pool.push(p.clone());
        let first = step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        assert!(first[0].tint.truncate().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));

        let mut late = p;
        late.age = late.total_life;
        let mut pool = ParticlePool::new();
        pool.push(late);
        let last = step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());
        assert!(last[0].tint.truncate().abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_equal_life_shares_cached_tint() {
        let mut red = still_particle();
        red.start_color = [255.0, 0.0, 0.0];
        let mut green = still_particle();
        green.start_color = [0.0, 255.0, 0.0];

        let mut pool = ParticlePool::new();
        pool.push(red);
        pool.push(green);

        let mut tints = TintCache::new();
        let sprites = step_collect(&mut pool, &context(Vec2::ZERO), &mut tints);

        assert_eq!(sprites.len(), 2);
        assert_eq!(sprites[0].tint, sprites[1].tint);
        assert_eq!(tints.len(), 1);
    }

    #[test]
    fn test_off_screen_particle_integrates_without_drawing() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.speed = 3.0;
        p.origin = Vec2::new(5000.0, 0.0);
        p.position = p.origin;
        pool.push(p);

        let ctx = context(Vec2::ZERO);
        let mut tints = TintCache::new();
        let before = pool.particles()[0].origin;
        let sprites = step_collect(&mut pool, &ctx, &mut tints);
        let after = pool.particles()[0].origin;

        assert!(sprites.is_empty());
        assert_ne!(before, after);
        assert_eq!(pool.particles()[0].age, 1.0);

        let sprites = step_collect(&mut pool, &ctx, &mut tints);
        assert!(sprites.is_empty());
        assert_ne!(after, pool.particles()[0].origin);
    }

    #[test]
    fn test_attributes_converge_linearly() {
        let mut p = still_particle();
        p.size = 1.0;
        p.end_size = 0.0;
        p.spin = 0.0;
        p.end_spin = 100.0;
        let total = p.total_life;

        let mut pool = ParticlePool::new();
        pool.push(p);
        step_collect(&mut pool, &context(Vec2::ZERO), &mut TintCache::new());

        let p = &pool.particles()[0];
        assert!((p.size - (1.0 - 1.0 / total)).abs() < 1e-6);
        assert!((p.spin - 100.0 / total).abs() < 1e-5);
    }

    #[test]
    fn test_sprite_transform_maps_quad_to_screen() {
        let mut pool = ParticlePool::new();
        let mut p = still_particle();
        p.spin = 0.0;
        p.end_spin = 0.0;
        pool.push(p);

        let ctx = context(Vec2::ZERO);
        let sprites = step_collect(&mut pool, &ctx, &mut TintCache::new());

        // Particle at the origin draws at the surface center. Quad corner
        // (0.5, 0.5) lands half an extent (50 * 0.2 / 2 = 5px) further.
        let corner = sprites[0].transform.project_point3(Vec3::new(0.5, 0.5, 0.0));
        let expected = ctx.projection.project_point3(Vec3::new(245.0, 185.0, 0.0));
        assert!(corner.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_delta_scales_age_and_decay() {
        let mut pool = ParticlePool::new();
        pool.push(still_particle());

        let mut ctx = context(Vec2::ZERO);
        ctx.delta = 2.5;
        step_collect(&mut pool, &ctx, &mut TintCache::new());

        let p = &pool.particles()[0];
        assert_eq!(p.age, 2.5);
        assert!((p.life - (0.5 - 0.025)).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_colors_from_config() {
        let mut config = EmitterConfig::default();
        config.start_color = ColorSetting::new([10.0, 20.0, 30.0], 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let p = Particle::spawn(&config, Vec2::ZERO, &mut rng);
        assert_eq!(p.start_color, [10.0, 20.0, 30.0]);
    }
}
