//! Bouncing-ball stiffness calibration.
//!
//! A point mass falls onto the ground under gravity and the smoothed contact
//! law. The simulated contact force along the trajectory serves as the
//! reference, and a single stiffness parameter is recovered from it. This is
//! the smallest end-to-end check of the contact law and optimizer stack.

use std::any::Any;

use anyhow::{anyhow, Result};
use roots::find_root_brent;

use crate::calibration::types::ModelCalibrator;
use crate::model_params::BallModelParams;
use crate::models::contact::force_law::ContactForceLaw;

/// Sampled ball motion and the contact force acting on it.
#[derive(Debug, Clone, Default)]
pub struct BallTrajectory {
    pub times: Vec<f64>,
    pub heights: Vec<f64>,
    pub speeds: Vec<f64>,
    pub forces: Vec<f64>,
}

impl BallTrajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BouncingBall {
    pub mass: f64,
    pub stiffness: f64,
    pub gravity: f64,
    pub law: ContactForceLaw,
}

impl BouncingBall {
    pub fn new(params: &BallModelParams) -> Self {
        Self {
            mass: params.mass,
            stiffness: params.stiffness,
            gravity: params.gravity,
            law: ContactForceLaw::default(),
        }
    }

    /// Vertical acceleration at height `y`.
    fn acceleration(&self, y: f64) -> f64 {
        -self.gravity + self.law.force(self.stiffness, y) / self.mass
    }

    /// Integrate with semi-implicit Euler over `duration` in `num_steps` steps.
    /// The returned trajectory holds `num_steps + 1` samples including the
    /// initial one.
    pub fn simulate(
        &self,
        initial_height: f64,
        initial_speed: f64,
        duration: f64,
        num_steps: usize,
    ) -> BallTrajectory {
        let dt = duration / num_steps as f64;
        let mut traj = BallTrajectory {
            times: Vec::with_capacity(num_steps + 1),
            heights: Vec::with_capacity(num_steps + 1),
            speeds: Vec::with_capacity(num_steps + 1),
            forces: Vec::with_capacity(num_steps + 1),
        };
        let (mut y, mut vy) = (initial_height, initial_speed);
        for step in 0..=num_steps {
            traj.times.push(step as f64 * dt);
            traj.heights.push(y);
            traj.speeds.push(vy);
            traj.forces.push(self.law.force(self.stiffness, y));

            vy += dt * self.acceleration(y);
            y += dt * vy;
        }
        traj
    }

    /// Height at which the contact force carries the ball's weight.
    pub fn equilibrium_height(&self) -> Result<f64> {
        let weight = self.mass * self.gravity;
        let total_stiffness = self.stiffness + self.law.fictitious_stiffness;
        if total_stiffness <= 0.0 {
            return Err(anyhow!("contact cannot support the ball (stiffness {})", total_stiffness));
        }
        let residual = |y: f64| self.law.force(self.stiffness, y) - weight;
        let lower = self.law.ground_height - 2.0 * weight / total_stiffness - 1e-3;
        let upper = self.law.ground_height;
        find_root_brent(lower, upper, &residual, &mut 1e-10_f64)
            .map_err(|e| anyhow!("equilibrium search failed: {:?}", e))
    }
}

/// Recovers the contact stiffness from a height trajectory and its force.
///
/// The optimizer sees one normalized parameter `x in [0, 1]`, mapped linearly
/// onto `stiffness_bounds`. The objective is the mean squared force residual
/// relative to the ball's weight.
#[derive(Debug, Clone)]
pub struct BallCalibrator {
    heights: Vec<f64>,
    forces: Vec<f64>,
    law: ContactForceLaw,
    stiffness_bounds: (f64, f64),
    weight: f64,
    param_bounds: Vec<(f64, f64)>,
}

impl BallCalibrator {
    pub fn new(trajectory: &BallTrajectory, params: &BallModelParams) -> Self {
        Self {
            heights: trajectory.heights.clone(),
            forces: trajectory.forces.clone(),
            law: ContactForceLaw::default(),
            stiffness_bounds: params.stiffness_bounds,
            weight: params.mass * params.gravity,
            param_bounds: vec![(0.0, 1.0)],
        }
    }

    /// Physical stiffness (N/m) of the normalized parameter `x`.
    pub fn stiffness(&self, x: f64) -> f64 {
        let (lower, upper) = self.stiffness_bounds;
        (1.0 - x) * lower + x * upper
    }

    /// Normalized parameter of a physical stiffness.
    pub fn normalize(&self, stiffness: f64) -> f64 {
        let (lower, upper) = self.stiffness_bounds;
        (stiffness - lower) / (upper - lower)
    }
}

impl ModelCalibrator for BallCalibrator {
    fn model_name(&self) -> &str {
        "ball"
    }

    fn param_count(&self) -> usize {
        1
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        assert_eq!(x.len(), 1, "ball calibration has a single parameter");
        let stiffness = self.stiffness(x[0]);
        let sse: f64 = self
            .heights
            .iter()
            .zip(&self.forces)
            .map(|(&y, &f_exp)| (self.law.force(stiffness, y) - f_exp).powi(2))
            .sum();
        sse / (self.weight * self.weight * self.heights.len() as f64)
    }

    fn param_names(&self) -> Vec<String> {
        vec!["stiffness".to_string()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_falls_then_bounces() {
        let params = BallModelParams::default();
        let ball = BouncingBall::new(&params);
        let traj = ball.simulate(1.0, 0.0, 1.25, 1000);
        assert_eq!(traj.len(), 1001);
        let lowest = traj.heights.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(lowest < 0.0, "ball should penetrate the ground");
        assert!(traj.forces.iter().any(|&f| f > params.mass * params.gravity));
    }

    #[test]
    fn equilibrium_balances_weight() {
        let ball = BouncingBall::new(&BallModelParams::default());
        let y = ball.equilibrium_height().unwrap();
        let expected = -50.0 * 9.81 / (3180.0 + 1.0);
        assert!((y - expected).abs() < 1e-9);
    }

    #[test]
    fn objective_vanishes_at_true_stiffness() {
        let params = BallModelParams::default();
        let traj = BouncingBall::new(&params).simulate(1.0, 0.0, 1.25, 1000);
        let calib = BallCalibrator::new(&traj, &params);
        let x_true = calib.normalize(3180.0);
        assert!((x_true - 0.318).abs() < 1e-12);
        assert!(calib.evaluate_objective(&[x_true]) < 1e-20);
        assert!(calib.evaluate_objective(&[0.3]) > 0.0);
        assert!(calib.evaluate_objective(&[0.2]) > calib.evaluate_objective(&[0.3]));
    }

    #[test]
    fn normalized_parameter_spans_stiffness_bounds() {
        let params = BallModelParams {
            stiffness_bounds: (1000.0, 5000.0),
            ..BallModelParams::default()
        };
        let traj = BouncingBall::new(&params).simulate(1.0, 0.0, 1.25, 1000);
        let calib = BallCalibrator::new(&traj, &params);
        assert_eq!(calib.param_bounds(), &[(0.0, 1.0)]);
        assert_eq!(calib.stiffness(0.0), 1000.0);
        assert_eq!(calib.stiffness(1.0), 5000.0);
        assert_eq!(calib.normalize(3000.0), 0.5);
    }
}
