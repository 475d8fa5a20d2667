// src/models/contact/objective.rs

//! Contact calibration objective.
//!
//! For a normalized parameter vector the objective writes marker heights and
//! stiffnesses into the calling thread's model clone, replays the fixed state
//! trajectory, and accumulates the squared difference between the summed
//! vertical contact force and the reference force:
//!
//! ```text
//! J(x) = sum_s (F_sim(s; x) - F_exp(t_s))^2 / (m g N)
//! ```
//!
//! where `m g` is body weight and `N` the number of states.

use std::any::Any;
use std::sync::OnceLock;

use anyhow::Result;
use log::{error, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::calibration::error::CalibrationError;
use crate::calibration::types::ModelCalibrator;
use crate::model_params::ContactModelParams;
use crate::models::contact::comparison::{ComparisonRow, ComparisonSink, ComparisonSummary};
use crate::models::contact::force_law::ContactForceLaw;
use crate::models::contact::mapping::ParameterMapping;
use crate::models::contact::metrics::{MetricsSnapshot, ObjectiveMetrics};
use crate::models::contact::pool::ModelPool;
use crate::models::contact::signal::ForceSignal;
use crate::models::multibody::{ModelError, Multibody, State, StateTrajectory};

pub struct ContactCalibrator<M: Multibody> {
    pool: ModelPool<M>,
    trajectory: StateTrajectory,
    signal: ForceSignal,
    mapping: ParameterMapping,
    law: ContactForceLaw,
    param_bounds: Vec<(f64, f64)>,
    /// Body weight, N
    weight: f64,
    metrics: ObjectiveMetrics,
    fatal: OnceLock<ModelError>,
}

impl<M: Multibody> ContactCalibrator<M> {
    /// Validate the canonical model against the naming convention in `params`
    /// and wrap it in a pool. Every setup mistake surfaces here.
    pub fn new(
        mut model: M,
        trajectory: StateTrajectory,
        signal: ForceSignal,
        params: &ContactModelParams,
    ) -> Result<Self, CalibrationError> {
        if trajectory.is_empty() {
            return Err(CalibrationError::EmptyTrajectory);
        }
        model.init_system()?;
        let mapping = ParameterMapping::new(&model, params)?;
        let weight = model.weight();
        let param_bounds = vec![(0.0, 1.0); mapping.param_count()];

        Ok(Self {
            pool: ModelPool::new(model),
            trajectory,
            signal,
            mapping,
            law: ContactForceLaw::new(params.fictitious_stiffness, params.ground_height),
            param_bounds,
            weight,
            metrics: ObjectiveMetrics::default(),
            fatal: OnceLock::new(),
        })
    }

    pub fn mapping(&self) -> &ParameterMapping {
        &self.mapping
    }

    pub fn pool(&self) -> &ModelPool<M> {
        &self.pool
    }

    pub fn trajectory(&self) -> &StateTrajectory {
        &self.trajectory
    }

    pub fn signal(&self) -> &ForceSignal {
        &self.signal
    }

    pub fn force_law(&self) -> &ContactForceLaw {
        &self.law
    }

    /// Body weight used for normalization, N.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.pool.len())
    }

    /// Objective value for `x`, evaluated on the calling thread's clone.
    ///
    /// Panics if `x` does not have `2 * num_contacts` entries.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        let value = match self.pool.acquire() {
            Ok(slot) => {
                let mut model = slot.lock();
                self.evaluate_with(&mut model, x)
            }
            Err(e) => {
                if self.fatal.set(e.clone()).is_ok() {
                    error!("model clone could not be initialized: {}", e);
                }
                f64::NAN
            }
        };
        self.metrics.record(value);
        value
    }

    /// Objective value for `x` on a model context owned by the caller. The
    /// context must come from [`ModelPool::detached`] or be an initialized
    /// clone of the canonical model.
    pub fn evaluate_with(&self, model: &mut M, x: &[f64]) -> f64 {
        assert_eq!(
            x.len(),
            self.mapping.param_count(),
            "parameter vector length must be 2 * num_contacts"
        );

        self.mapping.apply(model, x);
        model.refresh();

        let mut sum = 0.0;
        // Fresh copies: station geometry cached under a previous parameter
        // set must not be reused.
        for mut state in self.trajectory.iter_fresh() {
            model.realize_velocity(&mut state);
            let sim_fy = self.simulated_force(model, &state);
            let exp_fy = self.signal.at(state.time());
            sum += (sim_fy - exp_fy).powi(2);
        }
        sum / (self.weight * self.trajectory.len() as f64)
    }

    /// Evaluate a population in parallel. Every rayon job split owns one
    /// detached model context, and the first split takes over the context
    /// built up front to validate the model.
    pub fn evaluate_batch(&self, population: &[Vec<f64>]) -> Result<Vec<f64>, CalibrationError> {
        // Surface a broken definition before spawning any work.
        let validated = Mutex::new(Some(self.pool.detached()?));
        let values: Vec<f64> = population
            .par_iter()
            .map_init(
                || match validated.lock().take() {
                    Some(model) => Ok(model),
                    None => self.pool.detached(),
                },
                |ctx, x| match ctx {
                    Ok(model) => self.evaluate_with(model, x),
                    Err(_) => f64::NAN,
                },
            )
            .collect();
        for &value in &values {
            self.metrics.record(value);
        }
        Ok(values)
    }

    /// Summed vertical contact force at a realized state.
    fn simulated_force(&self, model: &M, state: &State) -> f64 {
        model
            .contacts()
            .iter()
            .map(|&contact| {
                self.law
                    .force(model.contact_stiffness(contact), model.station_height(state, contact))
            })
            .sum()
    }

    /// Replay the trajectory for `x` on a dedicated model clone and send every
    /// `(time, simulation, experiment)` triple to `sink`.
    pub fn compare(&self, x: &[f64], sink: &mut dyn ComparisonSink) -> Result<ComparisonSummary> {
        if x.len() != self.mapping.param_count() {
            return Err(CalibrationError::ParameterCount {
                expected: self.mapping.param_count(),
                provided: x.len(),
            }
            .into());
        }
        let mut model = self.pool.detached()?;
        self.mapping.apply(&mut model, x);
        model.refresh();

        let mut rows = Vec::with_capacity(self.trajectory.len());
        for mut state in self.trajectory.iter_fresh() {
            model.realize_velocity(&mut state);
            let row = ComparisonRow {
                time: state.time(),
                simulation: self.simulated_force(&model, &state),
                experiment: self.signal.at(state.time()),
            };
            sink.record(&row)?;
            rows.push(row);
        }
        sink.finish()?;

        let summary = ComparisonSummary::from_rows(&rows);
        if !summary.rmse.is_finite() {
            warn!("comparison contains non-finite forces");
        }
        Ok(summary)
    }
}

impl<M: Multibody> ModelCalibrator for ContactCalibrator<M> {
    fn model_name(&self) -> &str {
        "contact"
    }

    fn param_count(&self) -> usize {
        self.mapping.param_count()
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        self.evaluate(x)
    }

    fn param_names(&self) -> Vec<String> {
        let n = self.mapping.num_contacts();
        (0..n)
            .map(|i| format!("height_{}", i))
            .chain((0..n).map(|i| format!("stiffness_{}", i)))
            .collect()
    }

    fn fatal_error(&self) -> Option<String> {
        self.fatal.get().map(|e| e.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::multibody::PlanarFootModel;

    fn standing_trajectory(n: usize, ty: f64) -> StateTrajectory {
        let states = (0..n)
            .map(|i| State::new(i as f64 * 0.01, vec![0.0, 0.0, ty], vec![0.0, 0.0, 0.0]))
            .collect();
        StateTrajectory::new(states, 3, 3).unwrap()
    }

    fn calibrator(ty: f64) -> ContactCalibrator<PlanarFootModel> {
        let model = PlanarFootModel::foot_with_contacts(6, 70.0, 5e7).unwrap();
        let signal = ForceSignal::zero(0.0, 1.0).unwrap();
        ContactCalibrator::new(
            model,
            standing_trajectory(10, ty),
            signal,
            &ContactModelParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn repeated_calls_are_identical() {
        let calib = calibrator(0.0);
        let x = vec![0.3; 12];
        let first = calib.evaluate(&x);
        calib.evaluate(&[0.9; 12]);
        let second = calib.evaluate(&x);
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(calib.metrics().evaluations, 3);
        assert_eq!(calib.metrics().clones, 1);
    }

    #[test]
    fn canonical_model_is_untouched() {
        let calib = calibrator(0.0);
        calib.evaluate(&[1.0; 12]);
        let canonical = calib.pool().canonical();
        let marker = canonical.marker_index("marker0").unwrap();
        assert_eq!(canonical.marker_height(marker), -0.027);
    }

    #[test]
    fn high_feet_only_see_fictitious_force() {
        // Markers at the top of their range and the foot lifted well clear.
        let calib = calibrator(1.0);
        let x: Vec<f64> = [vec![1.0; 6], vec![0.5; 6]].concat();
        let height = 1.0 + 0.05;
        let fy = 6.0 * (0.0 - height);
        let expected = fy * fy * 10.0 / (calib.weight() * 10.0);
        assert!((calib.evaluate(&x) - expected).abs() < 1e-12);
    }

    #[test]
    fn batch_matches_pooled_evaluation() {
        let calib = calibrator(0.02);
        let population: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64 / 15.0; 12]).collect();
        let batch = calib.evaluate_batch(&population).unwrap();
        for (x, value) in population.iter().zip(&batch) {
            assert_eq!(calib.evaluate(x).to_bits(), value.to_bits());
        }
    }

    #[test]
    fn single_candidate_batch_reuses_validated_context() {
        let calib = calibrator(0.02);
        let values = calib.evaluate_batch(&[vec![0.5; 12]]).unwrap();
        assert_eq!(values.len(), 1);
        assert!(values[0].is_finite());
        assert_eq!(calib.pool().detached_builds(), 1);
    }

    #[test]
    fn compare_rejects_wrong_length() {
        let calib = calibrator(0.0);
        let mut rows: Vec<ComparisonRow> = Vec::new();
        assert!(calib.compare(&[0.5; 3], &mut rows).is_err());
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_trajectory_is_rejected() {
        let model = PlanarFootModel::foot_with_contacts(6, 70.0, 5e7).unwrap();
        let traj = StateTrajectory::new(Vec::new(), 3, 3).unwrap();
        let err = ContactCalibrator::new(
            model,
            traj,
            ForceSignal::zero(0.0, 1.0).unwrap(),
            &ContactModelParams::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CalibrationError::EmptyTrajectory));
    }

    #[test]
    fn param_names_follow_layout() {
        let calib = calibrator(0.0);
        let names = calib.param_names();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "height_0");
        assert_eq!(names[6], "stiffness_0");
    }
}
