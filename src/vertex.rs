//! Packed vertex records for the renderer.
//!
//! Each active particle becomes one record of `f32`s (instanced layout) or
//! four records, one per quad corner (indexed layout). Which layout is used
//! is decided once, when the system is created, from [`RenderCaps`].
//!
//! # Record layout
//!
//! | Location | Field | Format | Present |
//! |----------|-------|--------|---------|
//! | 0 | position | `Float32x3` | always |
//! | 1 | color | `Float32x4` | always |
//! | 2 | angle | `Float32` | always |
//! | 3 | size (`scale * size`) | `Float32x2` | always |
//! | next | sprite cell | `Float32` | sprite sheet enabled |
//! | next | orientation | `Float32x3` | not billboarded |
//! | next | corner offset | `Float32x2` | indexed layout only |
//!
//! With instancing the corner offsets live in a separate per-vertex buffer
//! of four [`QuadCorner`]s shared by every particle.

use crate::config::ParticleSystemConfig;
use crate::particle::Particle;
use bytemuck::{Pod, Zeroable};

/// Corner offsets are pulled this far inside the cell so sprite-sheet
/// sampling does not bleed into neighbouring cells.
const CORNER_EPSILON: f32 = 0.01;

/// Renderer capabilities that fix the vertex layout at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderCaps {
    /// Hardware instancing available.
    pub instancing: bool,
}

impl Default for RenderCaps {
    fn default() -> Self {
        Self { instancing: true }
    }
}

/// One corner of the unit quad, used by the instanced layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadCorner {
    pub offset: [f32; 2],
}

/// Corners in the order the index buffer expects.
pub const QUAD_CORNERS: [QuadCorner; 4] = [
    QuadCorner { offset: [0.0, 0.0] },
    QuadCorner { offset: [1.0, 0.0] },
    QuadCorner { offset: [1.0, 1.0] },
    QuadCorner { offset: [0.0, 1.0] },
];

/// Shape of one vertex record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub instanced: bool,
    pub sprite_sheet: bool,
    pub billboard: bool,
}

impl VertexLayout {
    /// Layout for a configuration under the given capabilities.
    pub fn for_config(config: &ParticleSystemConfig, caps: RenderCaps) -> Self {
        Self {
            instanced: caps.instancing,
            sprite_sheet: config.is_animation_sheet_enabled(),
            billboard: config.billboard,
        }
    }

    /// Number of `f32`s in one record.
    pub fn stride_floats(&self) -> usize {
        let mut stride = 3 + 4 + 1 + 2;
        if self.sprite_sheet {
            stride += 1;
        }
        if !self.billboard {
            stride += 3;
        }
        if !self.instanced {
            stride += 2;
        }
        stride
    }

    /// Size of one record in bytes.
    pub fn stride_bytes(&self) -> u64 {
        (self.stride_floats() * std::mem::size_of::<f32>()) as u64
    }

    /// Records written per particle.
    pub fn vertices_per_particle(&self) -> usize {
        if self.instanced {
            1
        } else {
            4
        }
    }

    /// Attributes of the particle buffer, in record order.
    pub fn attributes(&self) -> Vec<wgpu::VertexAttribute> {
        let mut attributes = Vec::with_capacity(7);
        let mut offset = 0u64;
        let mut location = 0u32;
        let mut push = |format: wgpu::VertexFormat| {
            attributes.push(wgpu::VertexAttribute {
                format,
                offset,
                shader_location: location,
            });
            offset += format.size();
            location += 1;
        };

        push(wgpu::VertexFormat::Float32x3); // position
        push(wgpu::VertexFormat::Float32x4); // color
        push(wgpu::VertexFormat::Float32); // angle
        push(wgpu::VertexFormat::Float32x2); // size
        if self.sprite_sheet {
            push(wgpu::VertexFormat::Float32); // cell index
        }
        if !self.billboard {
            push(wgpu::VertexFormat::Float32x3); // orientation
        }
        if !self.instanced {
            push(wgpu::VertexFormat::Float32x2); // corner offset
        }
        attributes
    }

    /// Buffer layout for the particle buffer.
    ///
    /// `attributes` is normally the result of [`attributes`](Self::attributes);
    /// it is borrowed because wgpu layouts do not own their attribute list.
    pub fn buffer_layout<'a>(&self, attributes: &'a [wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride_bytes(),
            step_mode: if self.instanced {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            },
            attributes,
        }
    }

    /// Shader location of the shared corner buffer in the instanced layout.
    pub fn corner_location(&self) -> u32 {
        self.attributes().len() as u32
    }

    /// Attribute list of the shared corner buffer, placed after the
    /// particle attributes.
    pub fn corner_attributes(&self) -> [wgpu::VertexAttribute; 1] {
        [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: self.corner_location(),
        }]
    }

    /// Append the record(s) of one particle to `out`.
    pub fn pack(&self, particle: &Particle, out: &mut Vec<f32>) {
        if self.instanced {
            self.pack_vertex(particle, None, out);
        } else {
            for corner in &QUAD_CORNERS {
                self.pack_vertex(particle, Some(corner.offset), out);
            }
        }
    }

    fn pack_vertex(&self, particle: &Particle, corner: Option<[f32; 2]>, out: &mut Vec<f32>) {
        out.extend_from_slice(&particle.position.to_array());
        out.extend_from_slice(&particle.color.to_array());
        out.push(particle.angle);
        out.push(particle.scale.x * particle.size);
        out.push(particle.scale.y * particle.size);

        if self.sprite_sheet {
            out.push(particle.cell_index as f32);
        }
        if !self.billboard {
            out.extend_from_slice(&particle.orientation().to_array());
        }
        if let Some([x, y]) = corner {
            if self.sprite_sheet {
                out.push(inset(x));
                out.push(inset(y));
            } else {
                out.push(x);
                out.push(y);
            }
        }
    }
}

fn inset(offset: f32) -> f32 {
    if offset == 0.0 {
        CORNER_EPSILON
    } else if offset == 1.0 {
        1.0 - CORNER_EPSILON
    } else {
        offset
    }
}

/// Buffer layout for the shared corner buffer of the instanced layout.
pub fn corner_buffer_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadCorner>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// Index buffer for `capacity` quads: `0 1 2, 0 2 3` shifted by 4 per quad.
pub fn quad_indices(capacity: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(capacity * 6);
    for quad in 0..capacity as u32 {
        let base = quad * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    indices
}
