//! Renderer sink.
//!
//! The core never touches a GPU. After each step a [`ParticleSystem`]
//! holds packed vertex data; [`ParticleSystem::render`] hands it to a
//! [`ParticleRenderer`] implemented by the host, together with everything
//! needed to issue the draw.
//!
//! [`ParticleSystem`]: crate::ParticleSystem
//! [`ParticleSystem::render`]: crate::ParticleSystem::render

use crate::config::{BlendMode, SpriteSheet};
use crate::vertex::{QuadCorner, VertexLayout};
use glam::Vec4;

/// Everything the renderer needs to draw one particle system.
#[derive(Clone, Copy, Debug)]
pub struct DrawCall<'a> {
    pub layout: VertexLayout,
    pub blend_mode: BlendMode,
    pub texture_mask: Vec4,
    pub sprite_sheet: Option<&'a SpriteSheet>,
    /// Packed records, ready for upload.
    pub vertices: &'a [u8],
    /// Quad indices, indexed layout only.
    pub indices: Option<&'a [u32]>,
    /// Shared quad corners, instanced layout only.
    pub corners: Option<&'a [QuadCorner]>,
    /// Particles to draw (instances, or quads).
    pub particle_count: usize,
}

impl DrawCall<'_> {
    /// Index count for an indexed draw.
    pub fn index_count(&self) -> usize {
        if self.layout.instanced {
            0
        } else {
            self.particle_count * 6
        }
    }
}

/// Receives draw calls from particle systems.
pub trait ParticleRenderer {
    fn draw(&mut self, call: &DrawCall<'_>);
}

impl<F> ParticleRenderer for F
where
    F: FnMut(&DrawCall<'_>),
{
    fn draw(&mut self, call: &DrawCall<'_>) {
        self(call)
    }
}
