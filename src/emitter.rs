//! Particle emitters: where particles appear and which way they fly.
//!
//! An emitter has two halves:
//!
//! - an [`EmitterAnchor`], the thing particles are emitted from. Either a raw
//!   point or a node of the host scene whose world matrix is looked up every
//!   frame through a [`TransformResolver`];
//! - an [`EmitterShape`], which turns that world matrix into an initial
//!   position and direction for each new particle.
//!
//! # Shapes
//!
//! | Type | Position | Direction |
//! |------|----------|-----------|
//! | [`EmitterShape::Box`] | inside a box | random between two directions |
//! | [`EmitterShape::Sphere`] | inside a sphere | outward from the center |
//! | [`EmitterShape::SphereDirected`] | inside a sphere | random between two directions |
//! | [`EmitterShape::Cone`] | on the cone base | away from the apex |
//!
//! Both halves of the shape can be replaced per system with
//! [`StartPositionFn`] / [`StartDirectionFn`] overrides.
//!
//! # Example
//!
//! ```ignore
//! // Fountain shooting upward
//! let config = ParticleSystemConfig::new("fountain", 2_000)
//!     .with_emitter(EmitterAnchor::Point(Vec3::new(0.0, -0.5, 0.0)))
//!     .with_shape(EmitterShape::Cone { radius: 0.1, angle: 0.3 });
//! ```

use crate::particle::Particle;
use crate::random::ParticleRng;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque handle to a node of the host scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// What particles are emitted from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EmitterAnchor {
    /// A fixed point in world space.
    Point(Vec3),
    /// A scene node; its world matrix is resolved each frame.
    Node(NodeId),
}

impl EmitterAnchor {
    /// World matrix of the anchor, or `None` when a node cannot be resolved.
    pub fn world_matrix(&self, transforms: &dyn TransformResolver) -> Option<Mat4> {
        match self {
            EmitterAnchor::Point(position) => Some(Mat4::from_translation(*position)),
            EmitterAnchor::Node(node) => transforms.world_matrix(*node),
        }
    }
}

/// Looks up world matrices of scene nodes.
///
/// Implemented by the host scene, or by any `Fn(NodeId) -> Option<Mat4>`.
pub trait TransformResolver {
    fn world_matrix(&self, node: NodeId) -> Option<Mat4>;
}

/// Resolver for hosts without a scene graph. Enough for point anchors.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransforms;

impl TransformResolver for NoTransforms {
    fn world_matrix(&self, _node: NodeId) -> Option<Mat4> {
        None
    }
}

impl<F> TransformResolver for F
where
    F: Fn(NodeId) -> Option<Mat4>,
{
    fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        self(node)
    }
}

/// Caller-supplied replacement for a shape's start position.
pub type StartPositionFn = Arc<dyn Fn(&Mat4, &Particle, &mut ParticleRng) -> Vec3 + Send + Sync>;

/// Caller-supplied replacement for a shape's start direction.
pub type StartDirectionFn = Arc<dyn Fn(&Mat4, &Particle, &mut ParticleRng) -> Vec3 + Send + Sync>;

/// Geometry new particles are emitted from.
///
/// Each shape is a stateless strategy: given the emitter's world matrix it
/// produces an initial position and an initial (unscaled) direction. The
/// direction is later multiplied by the sampled emission power.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EmitterShape {
    /// Emit from inside an axis-aligned box (in emitter space).
    ///
    /// Directions are picked componentwise between `direction1` and
    /// `direction2`.
    Box {
        direction1: Vec3,
        direction2: Vec3,
        min_emit_box: Vec3,
        max_emit_box: Vec3,
    },

    /// Emit from inside a sphere, flying away from its center.
    ///
    /// `direction_randomizer` (0 to 1) jitters each direction before it is
    /// normalized.
    Sphere {
        radius: f32,
        direction_randomizer: f32,
    },

    /// Emit from inside a sphere with box-style directions.
    SphereDirected {
        radius: f32,
        direction1: Vec3,
        direction2: Vec3,
    },

    /// Emit from the base disk of a cone opening along +Y.
    ///
    /// `angle` is the full opening angle in radians. Zero emits straight up.
    Cone { radius: f32, angle: f32 },
}

impl Default for EmitterShape {
    fn default() -> Self {
        EmitterShape::Box {
            direction1: Vec3::Y,
            direction2: Vec3::Y,
            min_emit_box: Vec3::splat(-0.5),
            max_emit_box: Vec3::splat(0.5),
        }
    }
}

impl EmitterShape {
    /// Initial position for `particle` in world space.
    pub fn start_position(&self, world: &Mat4, _particle: &Particle, rng: &mut ParticleRng) -> Vec3 {
        let local = match self {
            EmitterShape::Box {
                min_emit_box,
                max_emit_box,
                ..
            } => rng.vec3_between(*min_emit_box, *max_emit_box),
            EmitterShape::Sphere { radius, .. } | EmitterShape::SphereDirected { radius, .. } => {
                rng.in_sphere(*radius)
            }
            EmitterShape::Cone { radius, .. } => {
                let s = rng.range(0.0, std::f32::consts::TAU);
                let r = rng.unit().sqrt() * radius;
                Vec3::new(r * s.sin(), 0.0, r * s.cos())
            }
        };
        world.transform_point3(local)
    }

    /// Initial direction for `particle` in world space.
    ///
    /// Shapes that aim away from a center (sphere, cone) read the particle's
    /// already assigned position, so call this after
    /// [`start_position`](Self::start_position).
    pub fn start_direction(&self, world: &Mat4, particle: &Particle, rng: &mut ParticleRng) -> Vec3 {
        match self {
            EmitterShape::Box {
                direction1,
                direction2,
                ..
            }
            | EmitterShape::SphereDirected {
                direction1,
                direction2,
                ..
            } => world.transform_vector3(rng.vec3_between(*direction1, *direction2)),

            EmitterShape::Sphere {
                direction_randomizer,
                ..
            } => {
                let center = world.w_axis.truncate();
                let outward = (particle.position - center).normalize_or(Vec3::Y);
                let jitter = Vec3::new(
                    rng.range(0.0, *direction_randomizer),
                    rng.range(0.0, *direction_randomizer),
                    rng.range(0.0, *direction_randomizer),
                );
                (outward + jitter).normalize_or(outward)
            }

            EmitterShape::Cone { radius, angle } => {
                if *angle == 0.0 {
                    return world.transform_vector3(Vec3::Y).normalize_or(Vec3::Y);
                }
                // Apex sits below the base so that the rim is `angle / 2` off axis.
                let height = radius / (angle / 2.0).tan();
                let local = world.inverse().transform_point3(particle.position);
                let from_apex = Vec3::new(local.x, height, local.z);
                world.transform_vector3(from_apex).normalize_or(Vec3::Y)
            }
        }
    }
}
