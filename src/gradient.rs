//! Color gradients over particle lifetime.
//!
//! A [`ColorGradientTable`] holds keyframes mapping a lifetime ratio
//! (`age / life_time`, 0 at birth, 1 at death) to an RGBA color. Particles
//! sample it every step and blend linearly between the two keyframes that
//! bracket their current ratio.
//!
//! ```ignore
//! let mut table = ColorGradientTable::new();
//! table.add(0.0, Vec4::new(1.0, 0.9, 0.3, 1.0)); // yellow at birth
//! table.add(1.0, Vec4::new(0.8, 0.2, 0.0, 0.0)); // transparent red at death
//! ```

use glam::Vec4;
use serde::{Deserialize, Serialize};

/// One keyframe of a color gradient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorGradient {
    /// Lifetime ratio of this keyframe, normally in `[0, 1]`.
    pub gradient: f32,
    /// Color at this ratio.
    pub color: Vec4,
}

impl ColorGradient {
    pub fn new(gradient: f32, color: Vec4) -> Self {
        Self { gradient, color }
    }
}

/// Keyframes sorted ascending by ratio.
///
/// Equal ratios are allowed and keep insertion order; interpolation uses the
/// first bracketing pair it finds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorGradientTable {
    entries: Vec<ColorGradient>,
}

impl ColorGradientTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from unordered keyframes.
    pub fn from_entries(entries: impl IntoIterator<Item = ColorGradient>) -> Self {
        let mut table = Self {
            entries: entries.into_iter().collect(),
        };
        table.sort();
        table
    }

    /// Insert a keyframe and re-sort. Duplicate ratios are kept.
    pub fn add(&mut self, gradient: f32, color: Vec4) {
        self.entries.push(ColorGradient::new(gradient, color));
        self.sort();
    }

    /// Remove the first keyframe whose ratio is exactly `gradient`.
    ///
    /// Returns `false` (and changes nothing) when no keyframe matches.
    pub fn remove(&mut self, gradient: f32) -> bool {
        match self.entries.iter().position(|g| g.gradient == gradient) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ColorGradient] {
        &self.entries
    }

    /// Color of the first keyframe, used as a freshly emitted particle's color.
    pub fn first_color(&self) -> Option<Vec4> {
        self.entries.first().map(|g| g.color)
    }

    /// Interpolated color at `ratio`.
    ///
    /// Returns `None` when no pair of keyframes brackets `ratio`, which is
    /// always the case for tables with fewer than two entries. Callers keep
    /// the particle's current color in that case.
    pub fn sample(&self, ratio: f32) -> Option<Vec4> {
        self.entries.windows(2).find_map(|pair| {
            let (current, next) = (pair[0], pair[1]);
            if ratio >= current.gradient && ratio <= next.gradient {
                let span = next.gradient - current.gradient;
                let scale = if span > 0.0 {
                    (ratio - current.gradient) / span
                } else {
                    0.0
                };
                Some(lerp_color(current.color, next.color, scale))
            } else {
                None
            }
        })
    }

    fn sort(&mut self) {
        // Vec::sort_by is stable, so equal ratios keep insertion order.
        self.entries.sort_by(|a, b| {
            a.gradient
                .partial_cmp(&b.gradient)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Linear blend written so that `t == 0` yields `a` and `t == 1` yields `b`
/// bit for bit.
#[inline]
pub fn lerp_color(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    a * (1.0 - t) + b * t
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
    const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

    fn red_to_blue() -> ColorGradientTable {
        let mut table = ColorGradientTable::new();
        table.add(0.0, RED);
        table.add(1.0, BLUE);
        table
    }

    #[test]
    fn test_midpoint_blend() {
        let table = red_to_blue();
        assert_eq!(table.sample(0.5), Some(Vec4::new(0.5, 0.0, 0.5, 1.0)));
    }

    #[test]
    fn test_boundaries_are_exact() {
        let mut table = ColorGradientTable::new();
        table.add(0.0, Vec4::new(0.3, 0.7, 0.1, 0.9));
        table.add(0.37, Vec4::new(0.11, 0.23, 0.97, 0.5));
        table.add(1.0, Vec4::new(0.6, 0.2, 0.8, 0.0));

        assert_eq!(table.sample(0.0), Some(Vec4::new(0.3, 0.7, 0.1, 0.9)));
        assert_eq!(table.sample(0.37), Some(Vec4::new(0.11, 0.23, 0.97, 0.5)));
        assert_eq!(table.sample(1.0), Some(Vec4::new(0.6, 0.2, 0.8, 0.0)));
    }

    #[test]
    fn test_add_keeps_sorted() {
        let mut table = ColorGradientTable::new();
        table.add(1.0, BLUE);
        table.add(0.0, RED);
        table.add(0.5, GREEN);

        let ratios: Vec<f32> = table.entries().iter().map(|g| g.gradient).collect();
        assert_eq!(ratios, vec![0.0, 0.5, 1.0]);
        assert_eq!(table.first_color(), Some(RED));
    }

    #[test]
    fn test_equal_ratios_keep_insertion_order() {
        let mut table = ColorGradientTable::new();
        table.add(0.5, RED);
        table.add(0.5, GREEN);
        table.add(0.0, BLUE);

        assert_eq!(table.entries()[1].color, RED);
        assert_eq!(table.entries()[2].color, GREEN);
    }

    #[test]
    fn test_remove_first_exact_match() {
        let mut table = ColorGradientTable::new();
        table.add(0.5, RED);
        table.add(0.5, GREEN);

        assert!(table.remove(0.5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].color, GREEN);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut table = red_to_blue();
        assert!(!table.remove(0.3));
        assert_eq!(table, red_to_blue());
    }

    #[test]
    fn test_single_entry_never_samples() {
        let mut table = ColorGradientTable::new();
        table.add(0.0, GREEN);
        assert_eq!(table.sample(0.0), None);
        assert_eq!(table.sample(0.8), None);
        assert_eq!(table.first_color(), Some(GREEN));
    }

    #[test]
    fn test_ratio_before_first_key() {
        let mut table = ColorGradientTable::new();
        table.add(0.2, RED);
        table.add(1.0, BLUE);
        assert_eq!(table.sample(0.1), None);
    }
}
