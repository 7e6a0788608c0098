//! # Emberfall
//!
//! Pooled CPU particle systems for real-time engines.
//!
//! Emberfall simulates particles on the CPU and hands packed vertex data to
//! your renderer. It owns no window, GPU device or scene graph: the host
//! drives it with one step per frame and draws whatever it produces.
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberfall::prelude::*;
//!
//! let mut system = ParticleSystem::new(
//!     ParticleSystemConfig::new("sparks", 2_000)
//!         .with_emitter(EmitterAnchor::Point(Vec3::ZERO))
//!         .with_emit_rate(300.0)
//!         .with_life_time(0.3, 0.8)
//!         .with_emit_power(1.0, 3.0)
//!         .with_gravity(Vec3::new(0.0, -9.81, 0.0))
//!         .with_color_gradient(0.0, Vec4::new(1.0, 1.0, 0.6, 1.0))
//!         .with_color_gradient(1.0, Vec4::new(1.0, 0.2, 0.0, 0.0)),
//! );
//! system.start();
//!
//! let mut clock = FrameClock::new();
//! loop {
//!     let tick = clock.tick();
//!     system.step(&tick.context(&NoTransforms));
//!     system.render(&mut |call: &DrawCall<'_>| {
//!         // upload call.vertices, set blend state, draw call.particle_count quads
//!     });
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pool
//!
//! Each system keeps its particles in a [`ParticlePool`] bounded by a fixed
//! capacity. Dead particles are kept in a free list and reused, so a system
//! in steady state does not allocate.
//!
//! ### Time
//!
//! Systems advance by the host frame *ratio* (1.0 at 60 fps) multiplied by
//! the system's `update_speed`. All lifetimes, rates and speeds are expressed
//! in that scaled time. [`FrameClock`] computes the ratio from real time.
//!
//! ### Emission
//!
//! An [`EmitterAnchor`] says where particles come from (a point, or a scene
//! node resolved through a [`TransformResolver`]); an [`EmitterShape`] says
//! how they are placed and aimed. Emission is either continuous
//! (`emit_rate`, with fractional carry between frames) or a one-shot burst
//! (`manual_emit_count`).
//!
//! ### Color
//!
//! Without gradients each particle blends two birth colors and walks towards
//! `color_dead` over its lifetime. A [`ColorGradientTable`] replaces that with
//! keyframes sampled by normalized age.
//!
//! ### Sub-emitters
//!
//! A configuration may carry sub-emitter templates. When a particle dies one
//! template is cloned at its position as a new system. A [`SystemTree`] owns
//! the resulting hierarchy, stops it in cascade and disposes finished
//! children.
//!
//! ## Rendering
//!
//! After each step the system packs one record per particle (or four, when
//! instancing is unavailable). [`VertexLayout`] describes the record as wgpu
//! vertex attributes; [`ParticleSystem::render`] passes the bytes to a
//! [`ParticleRenderer`].
//!
//! ## Persistence
//!
//! [`ParticleSystemConfig`] is serde-serializable; use
//! [`to_json`](ParticleSystemConfig::to_json) and
//! [`from_json`](ParticleSystemConfig::from_json) to save and load effects.

pub mod config;
pub mod emitter;
pub mod error;
pub mod gradient;
pub mod particle;
pub mod pool;
pub mod presets;
pub mod random;
pub mod render;
pub mod sub_emitter;
pub mod system;
pub mod time;
pub mod vertex;

pub use bytemuck;
pub use glam::{Mat4, Vec2, Vec3, Vec4};

pub use config::{BlendMode, ParticleSystemConfig, SpriteSheet};
pub use emitter::{
    EmitterAnchor, EmitterShape, NoTransforms, NodeId, StartDirectionFn, StartPositionFn, TransformResolver,
};
pub use error::{ParticleError, Result};
pub use gradient::{ColorGradient, ColorGradientTable};
pub use particle::{Particle, SpriteCellPolicy};
pub use pool::ParticlePool;
pub use random::ParticleRng;
pub use render::{DrawCall, ParticleRenderer};
pub use sub_emitter::{SystemId, SystemTree, TreeStepReport};
pub use system::{AnimationEndFn, FrameContext, ParticleSystem, StepOutcome, SubEmission, SystemState};
pub use time::{FrameClock, FrameTick};
pub use vertex::{QuadCorner, RenderCaps, VertexLayout, QUAD_CORNERS};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use emberfall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{BlendMode, ParticleSystemConfig, SpriteSheet};
    pub use crate::emitter::{EmitterAnchor, EmitterShape, NoTransforms, NodeId, TransformResolver};
    pub use crate::error::{ParticleError, Result};
    pub use crate::presets;
    pub use crate::render::{DrawCall, ParticleRenderer};
    pub use crate::sub_emitter::{SystemId, SystemTree};
    pub use crate::system::{FrameContext, ParticleSystem, SystemState};
    pub use crate::time::FrameClock;
    pub use crate::vertex::{RenderCaps, VertexLayout};
    pub use crate::{Mat4, Vec2, Vec3, Vec4};
}
