//! Named particle emitters.
//!
//! An emitter owns a configuration, an anchor point, a texture, a particle
//! pool and a tint cache. Each tick it may spawn new particles and then runs
//! the pool algorithm (see [`crate::pool`]).
//!
//! # Spawn policy
//!
//! Every tick the emitter samples a cap from `spawn_cap`. From its second
//! tick on (counting from creation or the last flow reset), if the pool is
//! below the cap, it samples `emission_rate` and spawns that many particles,
//! never more than the cap and never past it.
//!
//! New particles start a quarter texture left of and below the anchor,
//! which centers emission on the texture, plus the configured offsets.
//!
//! # Texture gate
//!
//! Until its texture is ready an emitter does nothing at all: no spawning,
//! no aging, no drawing. An emitter whose texture failed to load stays that
//! way.

use glam::{Mat4, Vec2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::backend::TextureInfo;
use crate::config::EmitterConfig;
use crate::particle::Particle;
use crate::pool::{ParticlePool, Sprite, StepContext};
use crate::tint::TintCache;

/// Where an emitter's texture is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureState {
    /// Load requested, not finished.
    Loading,
    /// Resident and drawable.
    Ready(TextureInfo),
    /// The load failed. There is no retry.
    Failed,
}

/// A named source of particles.
#[derive(Debug)]
pub struct Emitter {
    name: String,
    anchor: Vec2,
    config: EmitterConfig,
    texture: TextureState,
    pool: ParticlePool,
    tick_count: u64,
    tints: TintCache,
    rng: SmallRng,
}

impl Emitter {
    pub(crate) fn new(name: String, anchor: Vec2, config: EmitterConfig, texture: TextureState) -> Self {
        Self {
            name,
            anchor,
            config,
            texture,
            pool: ParticlePool::new(),
            tick_count: 0,
            tints: TintCache::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Anchor position, relative to the surface center.
    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    /// Move the emitter. Live particles keep their positions.
    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Edit the configuration. Changes apply to particles spawned afterwards.
    pub fn config_mut(&mut self) -> &mut EmitterConfig {
        &mut self.config
    }

    pub fn texture_state(&self) -> TextureState {
        self.texture
    }

    /// The texture, if it is ready.
    pub fn texture(&self) -> Option<TextureInfo> {
        match self.texture {
            TextureState::Ready(info) => Some(info),
            TextureState::Loading | TextureState::Failed => None,
        }
    }

    /// Number of live particles.
    pub fn particle_count(&self) -> usize {
        self.pool.len()
    }

    /// Live particles in pool order.
    pub fn particles(&self) -> &[Particle] {
        self.pool.particles()
    }

    /// Ticks run since creation or the last flow reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tint_cache(&self) -> &TintCache {
        &self.tints
    }

    pub(crate) fn set_texture(&mut self, info: TextureInfo) {
        self.texture = TextureState::Ready(info);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.texture = TextureState::Failed;
    }

    /// Restart the spawn clock and forget cached tints. Live particles stay.
    pub(crate) fn reset_flow(&mut self) {
        self.tick_count = 0;
        self.tints.clear();
    }

    /// Run one tick. Returns `false` without touching anything if the texture
    /// is not ready.
    pub(crate) fn update(
        &mut self,
        delta: f32,
        surface: Vec2,
        projection: Mat4,
        draw: impl FnMut(Sprite),
    ) -> bool {
        let Some(texture) = self.texture() else {
            return false;
        };

        self.tick_count += 1;

        let cap = self.config.spawn_cap.sample(&mut self.rng).round();
        let spawn_origin = self.anchor + Vec2::new(-texture.width, texture.height) * 0.25;

        if self.tick_count > 1 && (self.pool.len() as f32) < cap {
            self.spawn(cap, spawn_origin);
        }

        let ctx = StepContext {
            delta,
            anchor: self.anchor,
            surface,
            texture: texture.size(),
            projection,
        };
        self.pool.step(&ctx, &mut self.tints, draw);
        true
    }

    fn spawn(&mut self, cap: f32, origin: Vec2) {
        let emission = self.config.emission_rate.sample(&mut self.rng).round();
        let headroom = cap - self.pool.len() as f32;
        let count = emission.min(cap).min(headroom);
        if !(count >= 1.0) {
            return;
        }

        for _ in 0..count as usize {
            let particle = Particle::spawn(&self.config, origin, &mut self.rng);
            self.pool.push(particle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureHandle;
    use crate::config::Setting;

    const SURFACE: Vec2 = Vec2::new(480.0, 360.0);

    fn texture() -> TextureInfo {
        TextureInfo {
            handle: TextureHandle(1),
            width: 40.0,
            height: 20.0,
        }
    }

    fn emitter(config: EmitterConfig, state: TextureState) -> Emitter {
        Emitter::new("test".into(), Vec2::new(8.0, -4.0), config, state)
    }

    fn run(emitter: &mut Emitter) -> usize {
        let mut drawn = 0;
        emitter.update(1.0, SURFACE, Mat4::IDENTITY, |_| drawn += 1);
        drawn
    }

    fn pinned() -> EmitterConfig {
        EmitterConfig {
            spawn_cap: Setting::fixed(5.0),
            emission_rate: Setting::fixed(2.0),
            lifetime: Setting::fixed(10.0),
            offset_x: Setting::fixed(0.0),
            offset_y: Setting::fixed(0.0),
            ..EmitterConfig::default()
        }
    }

    #[test]
    fn test_first_tick_never_spawns() {
        let mut e = emitter(pinned(), TextureState::Ready(texture()));
        run(&mut e);
        assert_eq!(e.tick_count(), 1);
        assert_eq!(e.particle_count(), 0);
        run(&mut e);
        assert_eq!(e.particle_count(), 2);
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let mut e = emitter(pinned(), TextureState::Ready(texture()));
        for _ in 0..20 {
            run(&mut e);
            assert!(e.particle_count() <= 5);
        }
        assert_eq!(e.particle_count(), 5);
    }

    #[test]
    fn test_emission_larger_than_cap_is_limited() {
        let config = EmitterConfig {
            emission_rate: Setting::fixed(100.0),
            ..pinned()
        };
        let mut e = emitter(config, TextureState::Ready(texture()));
        run(&mut e);
        run(&mut e);
        assert_eq!(e.particle_count(), 5);
    }

    #[test]
    fn test_zero_cap_spawns_nothing() {
        let config = EmitterConfig {
            spawn_cap: Setting::fixed(0.0),
            ..pinned()
        };
        let mut e = emitter(config, TextureState::Ready(texture()));
        for _ in 0..10 {
            run(&mut e);
        }
        assert_eq!(e.particle_count(), 0);
    }

    #[test]
    fn test_negative_emission_spawns_nothing() {
        let config = EmitterConfig {
            emission_rate: Setting::fixed(-3.0),
            ..pinned()
        };
        let mut e = emitter(config, TextureState::Ready(texture()));
        run(&mut e);
        run(&mut e);
        assert_eq!(e.particle_count(), 0);
    }

    #[test]
    fn test_spawn_origin_is_biased_by_quarter_texture() {
        let mut e = emitter(pinned(), TextureState::Ready(texture()));
        e.spawn(5.0, e.anchor() + Vec2::new(-texture().width, texture().height) * 0.25);
        let p = &e.particles()[0];
        assert_eq!(p.origin, Vec2::new(8.0 - 10.0, -4.0 + 5.0));
    }

    #[test]
    fn test_textureless_emitter_is_inert() {
        for state in [TextureState::Loading, TextureState::Failed] {
            let mut e = emitter(pinned(), state);
            for _ in 0..5 {
                assert!(!e.update(1.0, SURFACE, Mat4::IDENTITY, |_| {}));
            }
            assert_eq!(e.tick_count(), 0);
            assert_eq!(e.particle_count(), 0);
        }
    }

    #[test]
    fn test_reset_flow_keeps_particles() {
        let mut e = emitter(pinned(), TextureState::Ready(texture()));
        run(&mut e);
        run(&mut e);
        assert!(!e.tint_cache().is_empty());

        e.reset_flow();
        assert_eq!(e.tick_count(), 0);
        assert!(e.tint_cache().is_empty());
        assert_eq!(e.particle_count(), 2);

        // The first tick after a reset does not spawn.
        run(&mut e);
        assert_eq!(e.particle_count(), 2);
    }
}
