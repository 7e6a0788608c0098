//! Individual particle data.
//!
//! A [`Particle`] is a plain mutable record. It is owned by a
//! [`ParticlePool`](crate::ParticlePool) and rewritten in place every step;
//! particles are never shared between systems.

use crate::config::SpriteSheet;
use glam::{Vec2, Vec3, Vec4};

/// Relative slack on the lifetime check. Ages are summed in f32 one step at
/// a time, so a particle whose life is a whole number of steps can land a few
/// ulps short of it.
const LIFE_TOLERANCE: f32 = 1e-5;

/// How a particle walks through sprite-sheet cells.
///
/// Chosen once when the particle is emitted, from the sheet's
/// `change_speed`: zero selects [`SpriteCellPolicy::Computed`], anything else
/// [`SpriteCellPolicy::Custom`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpriteCellPolicy {
    /// No sprite sheet; the cell index never changes.
    #[default]
    Fixed,
    /// Dwell time per cell derived from the remaining lifetime, so the last
    /// cell is reached exactly at death.
    Computed,
    /// Advance one cell every `change_speed` frames.
    Custom,
}

impl SpriteCellPolicy {
    /// Policy for particles emitted with the given sheet configuration.
    pub fn for_sheet(sheet: Option<&SpriteSheet>) -> Self {
        match sheet {
            None => SpriteCellPolicy::Fixed,
            Some(sheet) if sheet.change_speed == 0.0 => SpriteCellPolicy::Computed,
            Some(_) => SpriteCellPolicy::Custom,
        }
    }
}

/// A single particle.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Current world position.
    pub position: Vec3,
    /// Velocity, already scaled by the emission power.
    pub direction: Vec3,
    /// Unscaled emission direction, cached only when the emission power was
    /// exactly zero so non-billboard rendering still has an orientation.
    pub initial_direction: Option<Vec3>,
    /// RGBA color.
    pub color: Vec4,
    /// Color delta per unit of scaled time, used when no gradient is set.
    pub color_step: Vec4,
    /// Lifetime in scaled time units.
    pub life_time: f32,
    /// Time lived so far.
    pub age: f32,
    pub size: f32,
    /// Non-uniform scale applied on top of `size`.
    pub scale: Vec2,
    /// Rotation in radians.
    pub angle: f32,
    /// Rotation speed in radians per unit of scaled time.
    pub angular_speed: f32,
    /// Current sprite-sheet cell.
    pub cell_index: u32,
    pub(crate) sprite_policy: SpriteCellPolicy,
    pub(crate) frame_counter: f32,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            initial_direction: None,
            color: Vec4::ZERO,
            color_step: Vec4::ZERO,
            life_time: 1.0,
            age: 0.0,
            size: 0.0,
            scale: Vec2::ONE,
            angle: 0.0,
            angular_speed: 0.0,
            cell_index: 0,
            sprite_policy: SpriteCellPolicy::Fixed,
            frame_counter: 0.0,
        }
    }
}

impl Particle {
    /// Normalized age, 0 at birth and 1 at death.
    #[inline]
    pub fn ratio(&self) -> f32 {
        self.age / self.life_time
    }

    /// Whether the particle has reached the end of its life.
    ///
    /// An age within a relative 1e-5 of the lifetime counts as reached.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age >= self.life_time - self.life_time.abs() * LIFE_TOLERANCE
    }

    /// Sprite policy selected at emission.
    pub fn sprite_policy(&self) -> SpriteCellPolicy {
        self.sprite_policy
    }

    /// Direction used to orient non-billboard quads.
    pub fn orientation(&self) -> Vec3 {
        self.initial_direction.unwrap_or(self.direction)
    }

    /// Put the particle back to its "just emitted" sprite state.
    pub(crate) fn rewind(&mut self, start_cell: u32) {
        self.age = 0.0;
        self.cell_index = start_cell;
        self.frame_counter = 0.0;
    }

    /// Advance the sprite cell by one step of `scaled_step`.
    pub fn update_cell_index(&mut self, sheet: &SpriteSheet, scaled_step: f32) {
        match self.sprite_policy {
            SpriteCellPolicy::Fixed => {}
            SpriteCellPolicy::Computed => self.update_cell_computed(sheet, scaled_step),
            SpriteCellPolicy::Custom => self.update_cell_custom(sheet),
        }
    }

    fn update_cell_computed(&mut self, sheet: &SpriteSheet, scaled_step: f32) {
        if scaled_step <= 0.0 {
            return;
        }
        let remaining_cells = (sheet.end_cell + 1).saturating_sub(self.cell_index).max(1);
        // Whole updates only; the remainder is spent on the last cell.
        let updates_per_cell = (((self.life_time - self.age) / scaled_step) / remaining_cells as f32).floor();

        self.frame_counter += scaled_step;
        if self.frame_counter >= updates_per_cell * scaled_step {
            self.frame_counter = 0.0;
            self.cell_index = (self.cell_index + 1).min(sheet.end_cell);
        }
    }

    fn update_cell_custom(&mut self, sheet: &SpriteSheet) {
        if self.frame_counter >= sheet.change_speed {
            self.frame_counter = 0.0;
            self.cell_index += 1;
            if self.cell_index > sheet.end_cell {
                self.cell_index = if sheet.looping {
                    sheet.start_cell
                } else {
                    sheet.end_cell
                };
            }
        } else {
            self.frame_counter += 1.0;
        }
    }
}
