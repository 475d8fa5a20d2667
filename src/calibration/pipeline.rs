use std::sync::atomic::{AtomicUsize, Ordering};

use cmaes_lbfgsb::cmaes::{canonical_cmaes_optimize, CmaesCanonicalConfig};
use cmaes_lbfgsb::lbfgsb_optimize::{lbfgsb_optimize, LbfgsbConfig};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::calibration::config::{OptimizationConfig, SearchStrategy};
use crate::calibration::error::CalibrationError;
use crate::calibration::types::{CalibrationOutcome, ModelCalibrator, OptimizerStatus};

/// Drives a bounded optimizer against a calibrator and tracks the run state
/// (`Idle -> Running -> {Converged, IterationBudgetExhausted, Failed}`).
pub struct CalibrationProcess {
    model: Box<dyn ModelCalibrator>,
    config: OptimizationConfig,
    initial_guess: Option<Vec<f64>>,
    status: OptimizerStatus,
}

impl CalibrationProcess {
    pub fn new(model: Box<dyn ModelCalibrator>, config: OptimizationConfig) -> Self {
        Self {
            model,
            config,
            initial_guess: None,
            status: OptimizerStatus::Idle,
        }
    }

    /// Set initial guess for optimization
    pub fn with_initial_guess(mut self, guess: Vec<f64>) -> Self {
        self.initial_guess = Some(guess);
        self
    }

    pub fn status(&self) -> OptimizerStatus {
        self.status
    }

    pub fn calibrator(&self) -> &dyn ModelCalibrator {
        &*self.model
    }

    /// Run the optimizer and return the best parameters. A failed run is
    /// reported as an error and leaves the process in `Failed`.
    pub fn run(&mut self) -> Result<CalibrationOutcome, CalibrationError> {
        self.status = OptimizerStatus::Running;
        let result = calibrate_model(&*self.model, &self.config, self.initial_guess.clone());
        self.status = match &result {
            Ok(outcome) => outcome.status,
            Err(_) => OptimizerStatus::Failed,
        };
        result
    }
}

/// Starting point: the supplied guess, or `initial_value` of the way through
/// every bound.
fn starting_point(
    model: &dyn ModelCalibrator,
    config: &OptimizationConfig,
    initial_guess: Option<Vec<f64>>,
) -> Result<Vec<f64>, CalibrationError> {
    let expected = model.param_count();
    match initial_guess {
        Some(guess) if guess.len() != expected => Err(CalibrationError::ParameterCount {
            expected,
            provided: guess.len(),
        }),
        Some(guess) => Ok(guess),
        None => Ok(model
            .param_bounds()
            .iter()
            .map(|&(lo, hi)| lo + config.initial_value * (hi - lo))
            .collect()),
    }
}

/// How an optimizer stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageEnd {
    Converged,
    Exhausted,
    /// Stopped early without meeting the tolerance
    Stalled,
}

/// Result of one optimizer stage.
struct StageResult {
    objective: f64,
    params: Vec<f64>,
    end: StageEnd,
}

/// Optimize `model` within its bounds.
///
/// `Evolutionary` runs CMA-ES from the starting point (population evaluated
/// in parallel when enabled), followed by an optional L-BFGS-B polish whose
/// failure falls back to the CMA-ES candidate. `Gradient` runs L-BFGS-B
/// alone, and its failure fails the run. Non-finite objective values are
/// presented to the optimizer as `f64::MAX`.
pub fn calibrate_model(
    model: &dyn ModelCalibrator,
    config: &OptimizationConfig,
    initial_guess: Option<Vec<f64>>,
) -> Result<CalibrationOutcome, CalibrationError> {
    let start = starting_point(model, config, initial_guess)?;
    let bounds = model.param_bounds();
    let evaluations = AtomicUsize::new(0);
    let obj_fn = |x: &[f64]| {
        evaluations.fetch_add(1, Ordering::Relaxed);
        let value = model.evaluate_objective(x);
        if value.is_finite() {
            value
        } else {
            f64::MAX
        }
    };

    let best = match config.strategy {
        SearchStrategy::Evolutionary => {
            let cmaes_config = CmaesCanonicalConfig {
                population_size: config.pop_size,
                max_generations: config.max_gen,
                seed: config.cmaes.seed.unwrap_or(123456),
                c1: None,
                c_mu: None,
                c_sigma: None,
                d_sigma: None,
                parallel_eval: config.cmaes.parallel_eval,
                verbosity: config.cmaes.verbosity,
                ipop_restarts: config.cmaes.ipop_restarts,
                ipop_increase_factor: config.cmaes.ipop_increase_factor,
                bipop_restarts: config.cmaes.bipop_restarts,
                total_evals_budget: config.cmaes.total_evals_budget,
                use_subrun_budgeting: config.cmaes.use_subrun_budgeting,
                alpha_mu: None,
                hsig_threshold_factor: None,
                bipop_small_population_factor: None,
                bipop_small_budget_factor: None,
                bipop_large_budget_factor: None,
                bipop_large_pop_increase_factor: None,
                max_bound_iterations: None,
                eig_precision_threshold: None,
                min_eig_value: None,
                matrix_op_threshold: None,
                stagnation_limit: Some(config.cmaes.stagnation_generations),
                min_sigma: None,
            };

            info!(
                "{}: running CMA-ES over {} parameters (population {}, {} generations)",
                model.model_name(),
                model.param_count(),
                config.pop_size,
                config.max_gen
            );
            // Running best objective after every evaluation.
            let best_history = Mutex::new(Vec::<f64>::new());
            let tracked = |x: &[f64]| {
                let value = obj_fn(x);
                let mut history = best_history.lock();
                let best = history.last().map_or(value, |&b: &f64| b.min(value));
                history.push(best);
                value
            };
            let cmaes_result = canonical_cmaes_optimize(tracked, bounds, cmaes_config, Some(start));
            let end = cmaes_end(
                &cmaes_result.termination_reason,
                &best_history.into_inner(),
                config,
            );
            let (_, cmaes_params) = cmaes_result.best_solution;
            let cmaes_stage = StageResult {
                objective: obj_fn(&cmaes_params),
                params: cmaes_params,
                end,
            };
            info!(
                "{}: CMA-ES stopped after {} generations, {} evaluations ({}), objective = {:.6e}",
                model.model_name(),
                cmaes_result.generations_used,
                evaluations.load(Ordering::Relaxed),
                cmaes_result.termination_reason,
                cmaes_stage.objective
            );

            if config.cmaes.lbfgsb_enabled {
                info!("{}: running L-BFGS-B refinement", model.model_name());
                match run_lbfgsb(&obj_fn, bounds, &cmaes_stage.params, config) {
                    Ok(refined) if refined.end == StageEnd::Stalled => {
                        info!("L-BFGS-B stalled short of the tolerance, keeping CMA-ES solution");
                        cmaes_stage
                    }
                    Ok(refined) if refined.objective < cmaes_stage.objective => {
                        info!(
                            "L-BFGS-B improved objective: {:.6e} -> {:.6e}",
                            cmaes_stage.objective, refined.objective
                        );
                        refined
                    }
                    Ok(_) => {
                        info!("L-BFGS-B did not improve objective, keeping CMA-ES solution");
                        cmaes_stage
                    }
                    Err(e) => {
                        warn!("L-BFGS-B failed: {}, keeping CMA-ES solution", e);
                        cmaes_stage
                    }
                }
            } else {
                cmaes_stage
            }
        }
        SearchStrategy::Gradient => {
            info!(
                "{}: running L-BFGS-B over {} parameters",
                model.model_name(),
                model.param_count()
            );
            run_lbfgsb(&obj_fn, bounds, &start, config)?
        }
    };

    if let Some(reason) = model.fatal_error() {
        return Err(CalibrationError::WorkerSetup(reason));
    }
    if best.end == StageEnd::Stalled {
        return Err(CalibrationError::OptimizerFailed(format!(
            "L-BFGS-B stalled before the projected gradient fell below {:e}",
            config.tolerance
        )));
    }

    // Report the raw objective, not the value the optimizer was shown.
    let objective = model.evaluate_objective(&best.params);
    if !objective.is_finite() {
        return Err(CalibrationError::NonFiniteObjective(objective));
    }

    let status = match best.end {
        StageEnd::Exhausted => OptimizerStatus::IterationBudgetExhausted,
        _ => OptimizerStatus::Converged,
    };
    info!("{}: {} with objective {:.6e}", model.model_name(), status, objective);

    Ok(CalibrationOutcome {
        status,
        objective,
        params: best.params,
        evaluations: evaluations.load(Ordering::Relaxed),
    })
}

/// CMA-ES has converged when it stopped on stagnation, or when its best
/// objective improved by at most `tolerance` (relative to `1 + |best|`) over
/// the last `stagnation_generations` generations. Anything else means it ran
/// out of generations or evaluations.
fn cmaes_end(
    termination_reason: &str,
    best_history: &[f64],
    config: &OptimizationConfig,
) -> StageEnd {
    if termination_reason.contains("No improvement") {
        return StageEnd::Converged;
    }
    let window = config.cmaes.stagnation_generations * config.pop_size;
    let earlier = best_history
        .len()
        .checked_sub(window + 1)
        .map(|i| best_history[i]);
    match (earlier, best_history.last()) {
        (Some(earlier), Some(&best)) if earlier - best <= config.tolerance * (1.0 + best.abs()) => {
            StageEnd::Converged
        }
        _ => StageEnd::Exhausted,
    }
}

/// L-BFGS-B settings. The objective-change stop is disabled so the run ends
/// on the gradient tolerance, the iteration cap, or a vanishing step.
fn lbfgsb_settings() -> LbfgsbConfig {
    LbfgsbConfig {
        obj_tol: 0.0,
        ..LbfgsbConfig::default()
    }
}

fn lbfgsb_end(gradient_norm: f64, iterations: usize, config: &OptimizationConfig) -> StageEnd {
    if gradient_norm < config.tolerance {
        StageEnd::Converged
    } else if iterations >= config.cmaes.lbfgsb_max_iterations {
        StageEnd::Exhausted
    } else {
        StageEnd::Stalled
    }
}

/// Largest component of the central-difference gradient at `x`, with the
/// components that push against an active bound dropped.
fn projected_gradient_norm<F>(obj_fn: &F, x: &[f64], bounds: &[(f64, f64)]) -> f64
where
    F: Fn(&[f64]) -> f64,
{
    let settings = lbfgsb_settings();
    let sqrt_eps = settings.fd_epsilon.sqrt();
    let mut shifted = x.to_vec();
    let mut norm = 0.0_f64;
    for (i, &(lower, upper)) in bounds.iter().enumerate() {
        let step = (sqrt_eps * x[i].abs().max(settings.fd_epsilon)).max(settings.fd_min_step);
        shifted[i] = x[i] + step;
        let forward = obj_fn(&shifted);
        shifted[i] = x[i] - step;
        let backward = obj_fn(&shifted);
        shifted[i] = x[i];

        let g = (forward - backward) / (2.0 * step);
        let at_lower = (x[i] - lower).abs() < settings.boundary_tol && g > 0.0;
        let at_upper = (x[i] - upper).abs() < settings.boundary_tol && g < 0.0;
        if !(at_lower || at_upper) {
            norm = norm.max(g.abs());
        }
    }
    norm
}

fn run_lbfgsb<F>(
    obj_fn: &F,
    bounds: &[(f64, f64)],
    start: &[f64],
    config: &OptimizationConfig,
) -> Result<StageResult, CalibrationError>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let iterations = AtomicUsize::new(0);
    let mut solution = start.to_vec();
    let result = lbfgsb_optimize(
        &mut solution,
        bounds,
        obj_fn,
        config.cmaes.lbfgsb_max_iterations,
        config.tolerance,
        Some(|_current_x: &[f64], current_obj: f64| {
            let it = iterations.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("L-BFGS-B iteration {} => objective = {:.6e}", it, current_obj);
        }),
        Some(lbfgsb_settings()),
    );

    let (objective, params) =
        result.map_err(|e| CalibrationError::OptimizerFailed(format!("L-BFGS-B: {:?}", e)))?;
    let gradient_norm = projected_gradient_norm(obj_fn, &params, bounds);
    let iterations = iterations.load(Ordering::Relaxed);
    let end = lbfgsb_end(gradient_norm, iterations, config);
    debug!(
        "L-BFGS-B ended {:?} after {} iterations, projected gradient {:.3e}",
        end, iterations, gradient_norm
    );
    Ok(StageResult {
        objective,
        params,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    /// Weighted separable quadratic with its minimum at 0.3 in every
    /// coordinate. Records every point it is evaluated at.
    struct Bowl {
        bounds: Vec<(f64, f64)>,
        curvature: Vec<f64>,
        poisoned: bool,
        seen: Mutex<Vec<Vec<f64>>>,
    }

    impl Bowl {
        fn new(n: usize) -> Self {
            Self::with_bounds(vec![(0.0, 1.0); n])
        }

        fn with_bounds(bounds: Vec<(f64, f64)>) -> Self {
            Self {
                curvature: vec![1.0; bounds.len()],
                bounds,
                poisoned: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        /// Curvature grows with the coordinate index.
        fn stretched(n: usize) -> Self {
            let mut bowl = Self::new(n);
            bowl.curvature = (1..=n).map(|i| i as f64).collect();
            bowl
        }
    }

    impl ModelCalibrator for Bowl {
        fn model_name(&self) -> &str {
            "bowl"
        }
        fn param_count(&self) -> usize {
            self.bounds.len()
        }
        fn param_bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
        fn evaluate_objective(&self, x: &[f64]) -> f64 {
            self.seen.lock().push(x.to_vec());
            if self.poisoned {
                return f64::NAN;
            }
            x.iter()
                .zip(&self.curvature)
                .map(|(v, c)| c * (v - 0.3).powi(2))
                .sum()
        }
        fn param_names(&self) -> Vec<String> {
            (0..self.bounds.len()).map(|i| format!("x{}", i)).collect()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn sequential(mut config: OptimizationConfig) -> OptimizationConfig {
        config.cmaes.parallel_eval = false;
        config
    }

    #[test]
    fn process_starts_idle() {
        let process =
            CalibrationProcess::new(Box::new(Bowl::new(2)), OptimizationConfig::minimal());
        assert_eq!(process.status(), OptimizerStatus::Idle);
    }

    #[test]
    fn gradient_strategy_finds_minimum() {
        let mut process =
            CalibrationProcess::new(Box::new(Bowl::new(3)), OptimizationConfig::gradient());
        let outcome = process.run().unwrap();
        assert_eq!(process.status(), OptimizerStatus::Converged);
        for v in &outcome.params {
            assert!((v - 0.3).abs() < 1e-3);
        }
        assert!(outcome.evaluations > 0);
    }

    #[test]
    fn gradient_run_cut_short_is_budget_exhausted() {
        let mut config = OptimizationConfig::gradient();
        config.cmaes.lbfgsb_max_iterations = 1;
        let outcome = calibrate_model(&Bowl::stretched(2), &config, None).unwrap();
        assert_eq!(outcome.status, OptimizerStatus::IterationBudgetExhausted);
    }

    #[test]
    fn lbfgsb_end_prefers_the_gradient_test() {
        let config = OptimizationConfig::gradient();
        let cap = config.cmaes.lbfgsb_max_iterations;
        // Meeting the tolerance on the last allowed iteration is convergence.
        assert_eq!(lbfgsb_end(1e-12, cap, &config), StageEnd::Converged);
        assert_eq!(lbfgsb_end(1e-12, cap + 1, &config), StageEnd::Converged);
        assert_eq!(lbfgsb_end(1e-3, cap, &config), StageEnd::Exhausted);
        // Stopping early with a large gradient is a stall.
        assert_eq!(lbfgsb_end(1e-3, 3, &config), StageEnd::Stalled);
    }

    #[test]
    fn projected_gradient_ignores_active_bounds() {
        let bowl = Bowl::with_bounds(vec![(0.0, 1.0), (0.5, 1.0)]);
        let objective = |x: &[f64]| bowl.evaluate_objective(x);
        let bounds = bowl.param_bounds();
        // At the lower bound the descent direction leaves the box.
        let pinned = projected_gradient_norm(&objective, &[0.3, 0.5], bounds);
        assert!(pinned < 1e-9);
        let interior = projected_gradient_norm(&objective, &[0.3, 0.7], bounds);
        assert!((interior - 0.8).abs() < 1e-6);
    }

    #[test]
    fn easy_bowl_converges_under_cmaes() {
        let config = sequential(OptimizationConfig::default());
        let outcome = calibrate_model(&Bowl::new(2), &config, None).unwrap();
        assert_eq!(outcome.status, OptimizerStatus::Converged);
        assert!(outcome.objective < 1e-6);
    }

    #[test]
    fn short_cmaes_run_is_budget_exhausted() {
        let mut config = sequential(OptimizationConfig::minimal());
        config.max_gen = 2;
        config.tolerance = 1e-12;
        let outcome = calibrate_model(&Bowl::new(2), &config, None).unwrap();
        assert_eq!(outcome.status, OptimizerStatus::IterationBudgetExhausted);
    }

    #[test]
    fn cmaes_end_reads_stagnation_and_history() {
        let mut config = OptimizationConfig::minimal();
        config.cmaes.stagnation_generations = 2;
        config.tolerance = 1e-4;
        let window = 2 * config.pop_size;

        assert_eq!(
            cmaes_end("No improvement for 2 consecutive generations", &[], &config),
            StageEnd::Converged
        );
        assert_eq!(
            cmaes_end("Max generations 10 reached", &[], &config),
            StageEnd::Exhausted
        );

        let mut flat = vec![1.0; 5];
        flat.extend(vec![1e-3; window + 1]);
        assert_eq!(
            cmaes_end("Max generations 10 reached", &flat, &config),
            StageEnd::Converged
        );

        let falling: Vec<f64> = (0..=window).map(|i| 1.0 / (1.0 + i as f64)).collect();
        assert_eq!(
            cmaes_end("Max generations 10 reached", &falling, &config),
            StageEnd::Exhausted
        );
    }

    #[test]
    fn evolutionary_search_starts_at_initial_value() {
        let mut config = sequential(OptimizationConfig::minimal());
        config.initial_value = 0.95;
        config.max_gen = 1;
        let bowl = Bowl::new(2);
        calibrate_model(&bowl, &config, None).unwrap();

        let seen = bowl.seen.lock();
        let first_generation = &seen[..config.pop_size];
        let mean = first_generation.iter().flatten().sum::<f64>() / (2 * config.pop_size) as f64;
        assert!(mean > 0.65, "first generation centred at {}", mean);
    }

    #[test]
    fn evolutionary_strategy_stays_in_bounds() {
        let config = sequential(OptimizationConfig::minimal());
        let mut process = CalibrationProcess::new(Box::new(Bowl::new(2)), config);
        let outcome = process.run().unwrap();
        assert!(outcome.objective.is_finite() && outcome.objective >= 0.0);
        assert!(outcome.params.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(matches!(
            outcome.status,
            OptimizerStatus::Converged | OptimizerStatus::IterationBudgetExhausted
        ));
    }

    #[test]
    fn poisoned_objective_fails_the_run() {
        let mut bowl = Bowl::new(2);
        bowl.poisoned = true;
        let mut process = CalibrationProcess::new(Box::new(bowl), OptimizationConfig::minimal());
        let err = process.run().unwrap_err();
        assert!(matches!(err, CalibrationError::NonFiniteObjective(_)));
        assert_eq!(process.status(), OptimizerStatus::Failed);
    }

    #[test]
    fn wrong_guess_length_is_rejected() {
        let mut process =
            CalibrationProcess::new(Box::new(Bowl::new(2)), OptimizationConfig::minimal())
                .with_initial_guess(vec![0.5; 3]);
        let err = process.run().unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::ParameterCount {
                expected: 2,
                provided: 3
            }
        ));
    }

    #[test]
    fn default_start_is_inside_bounds() {
        let bowl = Bowl::with_bounds(vec![(0.0, 1.0), (0.0, 10000.0)]);
        let start = starting_point(&bowl, &OptimizationConfig::default(), None).unwrap();
        assert_eq!(start, vec![0.5, 5000.0]);
    }
}
