//! Problem-specific parameter containers used to tune calibrators without hard-coding
//! constants in the calibrator implementation. Each problem provides its own struct
//! that implements the [`ModelParams`] trait so that the calibration entry points can
//! pass arbitrary parameters down to the calibrator in a type-erased fashion.

use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::models::contact::force_law::FICTITIOUS_STIFFNESS;

/// Marker trait for type-erased parameter structs.
///
/// Only provides a down-casting hook via `as_any`, which keeps the trait
/// object safe.
pub trait ModelParams: Send + Sync + std::fmt::Debug {
    /// Returns the boxed value as `&dyn Any` so that callers can attempt a
    /// concrete `downcast_ref::<T>()` when the concrete type is known.
    fn as_any(&self) -> &dyn Any;
}

/// Parameters of the foot-ground contact calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactModelParams {
    /// Number of contact points. The optimization vector has `2 * num_contacts`
    /// entries: normalized marker heights followed by normalized stiffnesses.
    pub num_contacts: usize,

    /// Physical range (m) mapped onto the normalized marker height `[0, 1]`.
    pub marker_height_bounds: (f64, f64),

    /// Multiplier from a normalized stiffness to the stiffness in `stiffness_unit`.
    pub stiffness_scale: f64,

    /// Physical unit of the scaled stiffness, N/m.
    pub stiffness_unit: f64,

    /// Slope of the contact law above ground, N/m.
    pub fictitious_stiffness: f64,

    /// Height of the ground plane, m.
    pub ground_height: f64,

    /// Markers are looked up as `{marker_prefix}{i}`.
    pub marker_prefix: String,

    /// Contacts are looked up as `{marker_prefix}{i}{contact_suffix}`.
    pub contact_suffix: String,
}

impl Default for ContactModelParams {
    fn default() -> Self {
        Self {
            num_contacts: 6,
            marker_height_bounds: (-0.06, 0.05),
            stiffness_scale: 1e8,
            stiffness_unit: 1.0,
            fictitious_stiffness: FICTITIOUS_STIFFNESS,
            ground_height: 0.0,
            marker_prefix: "marker".to_string(),
            contact_suffix: "_contact".to_string(),
        }
    }
}

impl ContactModelParams {
    pub fn marker_name(&self, icontact: usize) -> String {
        format!("{}{}", self.marker_prefix, icontact)
    }

    pub fn contact_name(&self, icontact: usize) -> String {
        format!("{}{}{}", self.marker_prefix, icontact, self.contact_suffix)
    }
}

impl ModelParams for ContactModelParams {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Parameters of the bouncing-ball stiffness calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallModelParams {
    /// Ball mass, kg
    pub mass: f64,
    /// Stiffness used to generate the reference force, N/m
    pub stiffness: f64,
    /// Gravitational acceleration magnitude, m/s^2
    pub gravity: f64,
    /// Physical range (N/m) mapped onto the normalized stiffness `[0, 1]`.
    pub stiffness_bounds: (f64, f64),
    /// Simulated duration, s
    pub duration: f64,
    /// Number of integration steps
    pub num_steps: usize,
    /// Initial height, m
    pub initial_height: f64,
    /// Initial vertical speed, m/s
    pub initial_speed: f64,
}

impl Default for BallModelParams {
    fn default() -> Self {
        Self {
            mass: 50.0,
            stiffness: 3180.0,
            gravity: 9.81,
            stiffness_bounds: (0.0, 10000.0),
            duration: 1.25,
            num_steps: 1000,
            initial_height: 1.0,
            initial_speed: 0.0,
        }
    }
}

impl ModelParams for BallModelParams {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
