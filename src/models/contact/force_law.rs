//! Smoothed unilateral contact law.

use serde::{Deserialize, Serialize};

/// Stiffness of the term that keeps the law continuous above ground, N/m.
pub const FICTITIOUS_STIFFNESS: f64 = 1.0;

/// Normal force of a point contact against a horizontal ground plane.
///
/// ```text
/// depth      = ground_height - y          (positive when penetrating)
/// F_normal   = k * max(0, depth) + k_fict * depth
/// ```
///
/// The `k_fict * depth` term is applied on both sides of the ground, so a
/// point above ground feels a small negative force. The law is therefore not
/// strictly unilateral but stays continuous with a non-zero slope everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactForceLaw {
    pub fictitious_stiffness: f64,
    pub ground_height: f64,
}

impl Default for ContactForceLaw {
    fn default() -> Self {
        Self {
            fictitious_stiffness: FICTITIOUS_STIFFNESS,
            ground_height: 0.0,
        }
    }
}

impl ContactForceLaw {
    pub fn new(fictitious_stiffness: f64, ground_height: f64) -> Self {
        Self {
            fictitious_stiffness,
            ground_height,
        }
    }

    /// Signed penetration depth; positive when `height` is below ground.
    #[inline]
    pub fn depth(&self, height: f64) -> f64 {
        self.ground_height - height
    }

    /// Normal (vertical) force for a contact of the given stiffness whose
    /// station sits at `height`.
    #[inline]
    pub fn force(&self, stiffness: f64, height: f64) -> f64 {
        let depth = self.depth(height);
        // f64::max would swallow a NaN depth; keep it poisoned instead.
        let depth_pos = if depth > 0.0 || depth.is_nan() {
            depth
        } else {
            0.0
        };
        stiffness * depth_pos + self.fictitious_stiffness * depth
    }
}
