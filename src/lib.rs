//! # contact-calib: Foot-Ground Contact Parameter Calibration
//!
//! `contact-calib` fits the parameters of a smoothed foot-ground contact model
//! so that the vertical contact force of a multibody model, replayed along a
//! fixed kinematic trajectory, matches a measured ground reaction force.
//!
//! ## Core Features
//!
//! - **Contact objective**: normalized marker heights and stiffnesses mapped onto
//!   a model, scored against a cubic-spline reference force
//! - **Thread-safe evaluation**: one lazily created model clone per worker thread,
//!   plus explicit per-worker contexts for batch evaluation
//! - **Calibration**: CMA-ES with optional L-BFGS-B refinement, or L-BFGS-B alone
//! - **Diagnostics**: simulated-versus-experimental force series as CSV or in memory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contact_calib::{calibrate_contact, default_configs, CalibrationParams};
//! use contact_calib::{ForceSignal, PlanarFootModel, State, StateTrajectory};
//!
//! # fn load_states() -> Vec<State> { vec![] }
//! # fn load_force() -> Vec<(f64, f64)> { vec![] }
//! let model = PlanarFootModel::foot_with_contacts(6, 70.0, 5e7)?;
//! let trajectory = StateTrajectory::new(load_states(), 3, 3)?;
//! let signal = ForceSignal::from_samples(&load_force())?;
//!
//! let (outcome, physical) = calibrate_contact(
//!     model,
//!     trajectory,
//!     signal,
//!     default_configs::fast(),
//!     CalibrationParams::default(),
//!     None,
//! )?;
//! println!("{} objective={:.4e}", outcome.status, outcome.objective);
//! println!("marker heights: {:?}", physical.marker_heights);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration Presets
//!
//! - `production()`: CMA-ES with BIPOP restarts and L-BFGS-B refinement
//! - `fast()`: Balanced speed/accuracy for development
//! - `research()`: Large populations and budgets
//! - `minimal()`: Quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod model_params;
pub mod models;

// ================================================================================================
// IMPORTS
// ================================================================================================

use anyhow::{anyhow, Result};
use log::info;

use calibration::pipeline::{calibrate_model, CalibrationProcess};
use models::ball::{BallCalibrator, BouncingBall};
use models::contact::{ComparisonSink, ComparisonSummary, ContactCalibrator, PhysicalParameters};
use models::multibody::Multibody;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Configuration and optimizer results
pub use calibration::{
    config::{CmaEsConfig, OptimizationConfig, SearchStrategy},
    error::CalibrationError,
    types::{CalibrationOutcome, ModelCalibrator, OptimizerStatus},
};

// Contact model types
pub use models::contact::{
    ComparisonRow, ContactForceLaw, CsvComparisonWriter, ForceSignal, MetricsSnapshot,
};
pub use models::multibody::{ModelError, PlanarFootModel, State, StateTrajectory};

// Model parameter types
pub use model_params::{BallModelParams, ContactModelParams, ModelParams};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured optimization settings for common use cases.
///
/// - [`production()`]: accurate settings for final fits
/// - [`fast()`]: development settings
/// - [`research()`]: exhaustive search
/// - [`minimal()`]: quick validation
pub mod default_configs {
    use crate::calibration::config::OptimizationConfig;

    /// Production configuration.
    ///
    /// **Characteristics:**
    /// - Population 25, up to 200 generations, 2 BIPOP restarts
    /// - L-BFGS-B refinement of the CMA-ES result
    /// - 20,000 evaluation budget
    ///
    /// # Example
    ///
    /// ```rust
    /// use contact_calib::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert!(config.cmaes.lbfgsb_enabled);
    /// ```
    pub fn production() -> OptimizationConfig {
        OptimizationConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - Population 16, up to 50 generations
    /// - No refinement stage
    pub fn fast() -> OptimizationConfig {
        OptimizationConfig::fast()
    }

    /// High-precision configuration for research.
    ///
    /// **Characteristics:**
    /// - Population 50, up to 500 generations
    /// - IPOP and BIPOP restarts, L-BFGS-B refinement
    pub fn research() -> OptimizationConfig {
        OptimizationConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    ///
    /// **Characteristics:**
    /// - Population 8, 10 generations, 200 evaluation budget
    /// - Lower accuracy, suitable for unit tests
    pub fn minimal() -> OptimizationConfig {
        OptimizationConfig::minimal()
    }
}

/// Problem parameters handed to the calibration entry points.
#[derive(Debug)]
pub struct CalibrationParams {
    /// Model-specific parameters (type-erased). `None` uses the defaults of
    /// the problem being calibrated.
    pub model_params: Option<Box<dyn ModelParams>>,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            model_params: Some(Box::new(ContactModelParams::default())),
        }
    }
}

impl CalibrationParams {
    /// Parameters for the bouncing-ball problem.
    pub fn ball() -> Self {
        Self {
            model_params: Some(Box::new(BallModelParams::default())),
        }
    }

    fn downcast<T: Clone + Default + 'static>(&self) -> T {
        self.model_params
            .as_ref()
            .and_then(|mp| mp.as_any().downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }
}

/// Calibrate contact marker heights and stiffnesses against a reference
/// vertical ground reaction force.
///
/// The optimization vector has `2 * num_contacts` entries in `[0, 1]`:
/// normalized marker heights followed by normalized stiffnesses.
///
/// # Returns
///
/// - [`CalibrationOutcome`]: terminal status, best objective and the
///   normalized parameter vector
/// - [`PhysicalParameters`]: the same vector in physical units
///
/// # Errors
///
/// * the model lacks a marker or contact named by [`ContactModelParams`]
/// * the trajectory is empty or the initial guess has the wrong length
/// * the optimizer fails, or the best objective is not finite
pub fn calibrate_contact<M: Multibody>(
    model: M,
    trajectory: StateTrajectory,
    signal: ForceSignal,
    config: OptimizationConfig,
    calib_params: CalibrationParams,
    initial_guess: Option<Vec<f64>>,
) -> Result<(CalibrationOutcome, PhysicalParameters)> {
    let params: ContactModelParams = calib_params.downcast();
    let calibrator = ContactCalibrator::new(model, trajectory, signal, &params)?;

    let mut process = CalibrationProcess::new(Box::new(calibrator), config);
    if let Some(guess) = initial_guess {
        process = process.with_initial_guess(guess);
    }
    let outcome = process.run()?;

    let calibrator = process
        .calibrator()
        .as_any()
        .downcast_ref::<ContactCalibrator<M>>()
        .ok_or_else(|| anyhow!("unexpected calibrator type"))?;
    let metrics = calibrator.metrics();
    info!(
        "contact calibration: {} evaluations ({} non-finite) on {} model clones",
        metrics.evaluations, metrics.non_finite, metrics.clones
    );

    let physical = calibrator.mapping().physical(&outcome.params);
    Ok((outcome, physical))
}

/// Evaluate the contact objective for a fixed normalized parameter vector.
///
/// Produces exactly the value [`calibrate_contact`] minimizes, so fit quality
/// can be measured without running the optimizer.
pub fn evaluate_contact<M: Multibody>(
    model: M,
    trajectory: StateTrajectory,
    signal: ForceSignal,
    x: &[f64],
    calib_params: CalibrationParams,
) -> Result<f64> {
    let params: ContactModelParams = calib_params.downcast();
    let calibrator = ContactCalibrator::new(model, trajectory, signal, &params)?;
    if x.len() != calibrator.param_count() {
        return Err(CalibrationError::ParameterCount {
            expected: calibrator.param_count(),
            provided: x.len(),
        }
        .into());
    }
    Ok(calibrator.evaluate(x))
}

/// Replay the trajectory for `x` and write the simulated and reference force
/// series to `sink`.
pub fn compare_contact<M: Multibody>(
    model: M,
    trajectory: StateTrajectory,
    signal: ForceSignal,
    x: &[f64],
    calib_params: CalibrationParams,
    sink: &mut dyn ComparisonSink,
) -> Result<ComparisonSummary> {
    let params: ContactModelParams = calib_params.downcast();
    let calibrator = ContactCalibrator::new(model, trajectory, signal, &params)?;
    calibrator.compare(x, sink)
}

/// Simulate a bouncing ball with the configured stiffness, then recover that
/// stiffness from the recorded contact force. The returned parameter is the
/// physical stiffness in N/m.
pub fn calibrate_ball(
    config: OptimizationConfig,
    calib_params: CalibrationParams,
) -> Result<CalibrationOutcome> {
    let params: BallModelParams = calib_params.downcast();
    let ball = BouncingBall::new(&params);
    let trajectory = ball.simulate(
        params.initial_height,
        params.initial_speed,
        params.duration,
        params.num_steps,
    );
    info!(
        "simulated {} ball samples, static equilibrium at y = {:.6} m",
        trajectory.len(),
        ball.equilibrium_height()?
    );

    let calibrator = BallCalibrator::new(&trajectory, &params);
    let mut outcome = calibrate_model(&calibrator, &config, None)?;
    outcome.params = outcome
        .params
        .iter()
        .map(|&x| calibrator.stiffness(x))
        .collect();
    Ok(outcome)
}
