//! Small value types shared across crates.

use serde::{Deserialize, Serialize};

/// Width and height of a presentable surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero (e.g. a minimized window).
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height, or 1.0 for an empty extent.
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extent_has_unit_aspect() {
        assert!(Extent2d::new(0, 900).is_empty());
        assert!((Extent2d::new(0, 0).aspect_ratio() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn aspect_ratio() {
        let extent = Extent2d::new(1600, 900);
        assert!(!extent.is_empty());
        assert!((extent.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
    }
}
