use std::any::Any;
use std::fmt;

/// Calibrator trait for parameter optimization.
///
/// `evaluate_objective` may be called concurrently from any number of
/// threads, in any order. The returned value must depend on `x` only.
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the problem (e.g., "contact")
    fn model_name(&self) -> &str;

    /// How many parameters are in the optimization vector
    fn param_count(&self) -> usize;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Given a parameter vector `x`, returns the objective value. Degenerate
    /// inputs yield a non-finite value instead of a panic.
    fn evaluate_objective(&self, x: &[f64]) -> f64;

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<String>;

    /// A fatal setup error hit by a worker during evaluation, if any. A
    /// calibrator reporting one makes the whole run fail.
    fn fatal_error(&self) -> Option<String> {
        None
    }

    /// Support for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Lifecycle of an optimizer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerStatus {
    Idle,
    Running,
    Converged,
    IterationBudgetExhausted,
    Failed,
}

impl OptimizerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Converged | Self::IterationBudgetExhausted | Self::Failed
        )
    }
}

impl fmt::Display for OptimizerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Converged => "converged",
            Self::IterationBudgetExhausted => "iteration budget exhausted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Best candidate found by a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// `Converged` or `IterationBudgetExhausted`
    pub status: OptimizerStatus,
    /// Objective value of `params`
    pub objective: f64,
    /// Best parameter vector observed
    pub params: Vec<f64>,
    /// Objective evaluations requested by the optimizer
    pub evaluations: usize,
}
