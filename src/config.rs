//! Particle system configuration.
//!
//! [`ParticleSystemConfig`] holds every tunable of a particle system as plain
//! data. It can be built in code with the `with_*` builder methods, edited in
//! place through [`ParticleSystem::config_mut`](crate::ParticleSystem::config_mut),
//! and persisted as JSON with [`to_json`](ParticleSystemConfig::to_json) /
//! [`from_json`](ParticleSystemConfig::from_json).
//!
//! # Ranges
//!
//! Sampled attributes come in `min_*` / `max_*` pairs. Each new particle
//! draws uniformly between them. Equal bounds give a constant; reversed
//! bounds are not rejected.
//!
//! # Example
//!
//! ```ignore
//! let config = ParticleSystemConfig::new("sparks", 500)
//!     .with_emitter(EmitterAnchor::Point(Vec3::ZERO))
//!     .with_emit_rate(200.0)
//!     .with_life_time(0.3, 0.6)
//!     .with_emit_power(1.0, 3.0)
//!     .with_gravity(Vec3::new(0.0, -9.81, 0.0))
//!     .with_color_gradient(0.0, Vec4::new(1.0, 1.0, 0.8, 1.0))
//!     .with_color_gradient(1.0, Vec4::new(1.0, 0.3, 0.0, 0.0));
//! ```

use crate::emitter::{EmitterAnchor, EmitterShape};
use crate::error::Result;
use crate::gradient::ColorGradientTable;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Blend mode handed to the renderer with every draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Source and destination added at full weight. Overlapping particles
    /// saturate towards white; good for sparks and fire.
    OneOne,

    /// Standard alpha blending (default).
    #[default]
    Standard,

    /// Additive blending weighted by source alpha.
    Add,

    /// Colors are multiplied, darkening the result. Useful for smoke.
    Multiply,
}

/// Sprite-sheet animation settings.
///
/// Cells are numbered row by row. A particle starts at `start_cell` and
/// walks towards `end_cell`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheet {
    pub start_cell: u32,
    pub end_cell: u32,
    /// Frames per cell. Zero spreads the cells evenly over each particle's
    /// lifetime instead.
    pub change_speed: f32,
    /// Wrap back to `start_cell` after `end_cell` (custom speed only).
    pub looping: bool,
    /// Cell size in texels, forwarded to the renderer.
    pub cell_width: u32,
    pub cell_height: u32,
}

impl Default for SpriteSheet {
    fn default() -> Self {
        Self {
            start_cell: 0,
            end_cell: 0,
            change_speed: 1.0,
            looping: false,
            cell_width: 0,
            cell_height: 0,
        }
    }
}

/// Every tunable of a particle system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    /// Name, used in logs and for sub-emitter clones.
    pub name: String,
    /// Maximum number of live particles.
    pub capacity: usize,

    /// What particles are emitted from. Without an anchor the system is not
    /// ready and its step does nothing.
    pub emitter: Option<EmitterAnchor>,
    /// Shape used to place and aim new particles.
    pub shape: EmitterShape,

    /// Particles emitted per unit of scaled time.
    pub emit_rate: f32,
    /// Manual emission. `Some(n)` emits exactly `n` particles on the next
    /// step and then stays at `Some(0)` until set back to `None`.
    pub manual_emit_count: Option<u32>,
    /// Multiplier from the host frame ratio to simulated time.
    pub update_speed: f32,
    /// Stop automatically after this much scaled time. Zero disables.
    pub target_stop_duration: f32,
    /// Ask the owning tree to dispose the system once it has fully stopped.
    pub dispose_on_stop: bool,

    pub min_emit_power: f32,
    pub max_emit_power: f32,
    pub min_life_time: f32,
    pub max_life_time: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub min_scale_x: f32,
    pub max_scale_x: f32,
    pub min_scale_y: f32,
    pub max_scale_y: f32,
    pub min_angular_speed: f32,
    pub max_angular_speed: f32,

    /// Acceleration added to every particle's direction.
    pub gravity: Vec3,

    /// Birth colors; each particle picks a random blend of the two.
    pub color1: Vec4,
    pub color2: Vec4,
    /// Color reached at death when no gradient is set.
    pub color_dead: Vec4,
    /// Lifetime color keyframes. Take precedence over the color fields.
    pub color_gradients: ColorGradientTable,

    /// Texture channel mask, forwarded to the renderer.
    pub texture_mask: Vec4,
    pub blend_mode: BlendMode,
    /// Billboards always face the camera. When off, each vertex carries the
    /// particle's direction for the renderer to orient the quad.
    pub billboard: bool,
    /// Sprite-sheet animation; `None` renders a single image.
    pub sprite_sheet: Option<SpriteSheet>,

    /// Steps simulated synchronously on start.
    pub pre_warm_cycles: u32,
    /// Frame ratio used for each pre-warm step.
    pub pre_warm_step_offset: f32,

    /// Templates cloned at the position of each dying particle.
    pub sub_emitters: Vec<ParticleSystemConfig>,

    /// Fixed RNG seed; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ParticleSystemConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            capacity: 1_000,
            emitter: None,
            shape: EmitterShape::default(),
            emit_rate: 10.0,
            manual_emit_count: None,
            update_speed: 0.01,
            target_stop_duration: 0.0,
            dispose_on_stop: false,
            min_emit_power: 1.0,
            max_emit_power: 1.0,
            min_life_time: 1.0,
            max_life_time: 1.0,
            min_size: 1.0,
            max_size: 1.0,
            min_scale_x: 1.0,
            max_scale_x: 1.0,
            min_scale_y: 1.0,
            max_scale_y: 1.0,
            min_angular_speed: 0.0,
            max_angular_speed: 0.0,
            gravity: Vec3::ZERO,
            color1: Vec4::ONE,
            color2: Vec4::ONE,
            color_dead: Vec4::new(0.0, 0.0, 0.0, 1.0),
            color_gradients: ColorGradientTable::new(),
            texture_mask: Vec4::ONE,
            blend_mode: BlendMode::default(),
            billboard: true,
            sprite_sheet: None,
            pre_warm_cycles: 0,
            pre_warm_step_offset: 1.0,
            sub_emitters: Vec::new(),
            seed: None,
        }
    }
}

impl ParticleSystemConfig {
    /// Create a configuration with default tunables.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            ..Default::default()
        }
    }

    // =========================================================================
    // BUILDER METHODS
    // =========================================================================

    pub fn with_emitter(mut self, emitter: EmitterAnchor) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_shape(mut self, shape: EmitterShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_emit_rate(mut self, rate: f32) -> Self {
        self.emit_rate = rate;
        self
    }

    /// Switch to manual emission with `count` particles pending.
    pub fn with_manual_emit_count(mut self, count: u32) -> Self {
        self.manual_emit_count = Some(count);
        self
    }

    pub fn with_update_speed(mut self, speed: f32) -> Self {
        self.update_speed = speed;
        self
    }

    pub fn with_target_stop_duration(mut self, duration: f32) -> Self {
        self.target_stop_duration = duration;
        self
    }

    pub fn with_dispose_on_stop(mut self, dispose: bool) -> Self {
        self.dispose_on_stop = dispose;
        self
    }

    pub fn with_emit_power(mut self, min: f32, max: f32) -> Self {
        self.min_emit_power = min;
        self.max_emit_power = max;
        self
    }

    pub fn with_life_time(mut self, min: f32, max: f32) -> Self {
        self.min_life_time = min;
        self.max_life_time = max;
        self
    }

    pub fn with_size(mut self, min: f32, max: f32) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    pub fn with_scale(mut self, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        self.min_scale_x = min_x;
        self.max_scale_x = max_x;
        self.min_scale_y = min_y;
        self.max_scale_y = max_y;
        self
    }

    pub fn with_angular_speed(mut self, min: f32, max: f32) -> Self {
        self.min_angular_speed = min;
        self.max_angular_speed = max;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Birth colors (random blend of the two) and the color reached at death.
    pub fn with_colors(mut self, color1: Vec4, color2: Vec4, color_dead: Vec4) -> Self {
        self.color1 = color1;
        self.color2 = color2;
        self.color_dead = color_dead;
        self
    }

    /// Add one lifetime color keyframe.
    pub fn with_color_gradient(mut self, ratio: f32, color: Vec4) -> Self {
        self.color_gradients.add(ratio, color);
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_billboard(mut self, billboard: bool) -> Self {
        self.billboard = billboard;
        self
    }

    pub fn with_sprite_sheet(mut self, sheet: SpriteSheet) -> Self {
        self.sprite_sheet = Some(sheet);
        self
    }

    pub fn with_pre_warm(mut self, cycles: u32, step_offset: f32) -> Self {
        self.pre_warm_cycles = cycles;
        self.pre_warm_step_offset = step_offset;
        self
    }

    /// Add a template spawned where particles die.
    pub fn with_sub_emitter(mut self, template: ParticleSystemConfig) -> Self {
        self.sub_emitters.push(template);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a configuration written by [`to_json`](Self::to_json).
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether sprite-sheet animation is enabled.
    #[inline]
    pub fn is_animation_sheet_enabled(&self) -> bool {
        self.sprite_sheet.is_some()
    }

    /// First sprite cell for newly emitted particles.
    #[inline]
    pub fn start_cell(&self) -> u32 {
        self.sprite_sheet.as_ref().map_or(0, |sheet| sheet.start_cell)
    }
}
