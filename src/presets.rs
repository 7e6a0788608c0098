//! Ready-made particle system configurations.
//!
//! Common effects as one-liners. Each preset returns a plain
//! [`ParticleSystemConfig`] anchored at a point, so every value can still be
//! tweaked with the builder methods before the system is created.
//!
//! ```ignore
//! let fire = ParticleSystem::new(presets::fire(Vec3::ZERO, 200.0).with_size(0.2, 0.6));
//! let bang = ParticleSystem::new(presets::explosion(Vec3::new(0.0, 2.0, 0.0), 300));
//! ```
//!
//! Times below are in scaled time units. With the default `update_speed` of
//! 0.01 a 60 fps host advances 0.6 units per second.

use crate::config::{BlendMode, ParticleSystemConfig};
use crate::emitter::{EmitterAnchor, EmitterShape};
use glam::{Vec3, Vec4};
use std::f32::consts::PI;

/// Fire preset: rising embers going from yellow to deep red.
///
/// # Arguments
///
/// * `position` - Emission point (base of the fire)
/// * `rate` - Particles per unit of scaled time
pub fn fire(position: Vec3, rate: f32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("fire", 2_000)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Cone {
            radius: 0.3,
            angle: 0.8,
        })
        .with_emit_rate(rate)
        .with_life_time(0.6, 1.0)
        .with_emit_power(0.8, 1.2)
        .with_size(0.2, 0.5)
        .with_blend_mode(BlendMode::OneOne)
        .with_color_gradient(0.0, Vec4::new(1.0, 0.9, 0.3, 1.0))
        .with_color_gradient(0.6, Vec4::new(1.0, 0.4, 0.0, 0.8))
        .with_color_gradient(1.0, Vec4::new(0.8, 0.2, 0.0, 0.0))
}

/// Fountain preset: particles arc up and fall back down.
pub fn fountain(position: Vec3, rate: f32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("fountain", 3_000)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Box {
            direction1: Vec3::new(-0.3, 1.0, -0.3),
            direction2: Vec3::new(0.3, 1.0, 0.3),
            min_emit_box: Vec3::ZERO,
            max_emit_box: Vec3::ZERO,
        })
        .with_emit_rate(rate)
        .with_life_time(1.5, 2.0)
        .with_emit_power(2.0, 3.0)
        .with_size(0.05, 0.1)
        .with_gravity(Vec3::new(0.0, -3.0, 0.0))
        .with_colors(
            Vec4::new(0.7, 0.85, 1.0, 1.0),
            Vec4::new(0.2, 0.4, 0.8, 1.0),
            Vec4::new(0.2, 0.4, 0.8, 0.0),
        )
}

/// Smoke preset: slow-rising puffs that grow and fade.
pub fn smoke(position: Vec3, rate: f32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("smoke", 1_000)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Cone {
            radius: 0.5,
            angle: 1.2,
        })
        .with_emit_rate(rate)
        .with_life_time(2.0, 3.0)
        .with_emit_power(0.2, 0.4)
        .with_size(0.5, 1.5)
        .with_angular_speed(-0.5, 0.5)
        .with_blend_mode(BlendMode::Multiply)
        .with_color_gradient(0.0, Vec4::new(0.4, 0.4, 0.4, 0.0))
        .with_color_gradient(0.2, Vec4::new(0.4, 0.4, 0.4, 0.6))
        .with_color_gradient(1.0, Vec4::new(0.15, 0.15, 0.15, 0.0))
}

/// Sparkler preset: short-lived white-hot sparks in every direction.
pub fn sparkler(position: Vec3, rate: f32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("sparkler", 2_000)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Sphere {
            radius: 0.02,
            direction_randomizer: 0.5,
        })
        .with_emit_rate(rate)
        .with_life_time(0.2, 0.4)
        .with_emit_power(1.5, 2.5)
        .with_size(0.02, 0.05)
        .with_blend_mode(BlendMode::OneOne)
        .with_colors(
            Vec4::ONE,
            Vec4::new(1.0, 0.9, 0.6, 1.0),
            Vec4::new(1.0, 0.6, 0.1, 0.0),
        )
}

/// Rain preset: streaks falling from a slab above `position`.
///
/// Not billboarded, so the renderer can stretch drops along their direction.
pub fn rain(position: Vec3, rate: f32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("rain", 5_000)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Box {
            direction1: Vec3::new(0.0, -1.0, 0.0),
            direction2: Vec3::new(0.05, -1.0, 0.05),
            min_emit_box: Vec3::new(-5.0, 4.5, -5.0),
            max_emit_box: Vec3::new(5.0, 5.0, 5.0),
        })
        .with_emit_rate(rate)
        .with_life_time(1.5, 1.5)
        .with_emit_power(4.0, 5.0)
        .with_size(0.02, 0.02)
        .with_scale(1.0, 1.0, 8.0, 12.0)
        .with_billboard(false)
        .with_colors(
            Vec4::new(0.6, 0.7, 0.9, 0.6),
            Vec4::new(0.4, 0.5, 0.7, 0.6),
            Vec4::new(0.4, 0.5, 0.7, 0.6),
        )
}

/// Explosion preset: one burst of `count` particles flying outward.
///
/// The system stops on its own after the shortest particle lifetime and asks
/// to be disposed once the last particle fades.
pub fn explosion(position: Vec3, count: u32) -> ParticleSystemConfig {
    ParticleSystemConfig::new("explosion", count as usize)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Sphere {
            radius: 0.1,
            direction_randomizer: 0.0,
        })
        .with_manual_emit_count(count)
        .with_target_stop_duration(0.5)
        .with_dispose_on_stop(true)
        .with_life_time(0.5, 0.8)
        .with_emit_power(2.0, 4.0)
        .with_size(0.05, 0.2)
        .with_blend_mode(BlendMode::OneOne)
        .with_color_gradient(0.0, Vec4::new(1.0, 1.0, 0.8, 1.0))
        .with_color_gradient(1.0, Vec4::new(1.0, 0.3, 0.0, 0.0))
}

/// Firework preset: rockets shot upward that burst into sparks on death.
///
/// Each rocket carries an [`explosion`] as its sub-emitter; run it in a
/// [`SystemTree`](crate::SystemTree) so the bursts are spawned.
pub fn firework(position: Vec3) -> ParticleSystemConfig {
    let mut burst = explosion(Vec3::ZERO, 150);
    burst.name = "firework_burst".to_string();
    burst.emitter = None;

    ParticleSystemConfig::new("firework", 20)
        .with_emitter(EmitterAnchor::Point(position))
        .with_shape(EmitterShape::Cone {
            radius: 0.2,
            angle: PI / 8.0,
        })
        .with_emit_rate(3.0)
        .with_life_time(0.8, 1.2)
        .with_emit_power(6.0, 8.0)
        .with_size(0.05, 0.05)
        .with_gravity(Vec3::new(0.0, -4.0, 0.0))
        .with_colors(
            Vec4::new(1.0, 0.8, 0.4, 1.0),
            Vec4::new(1.0, 0.6, 0.2, 1.0),
            Vec4::new(1.0, 0.4, 0.1, 1.0),
        )
        .with_sub_emitter(burst)
}
