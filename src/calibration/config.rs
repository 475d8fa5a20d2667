use std::path::Path;

use serde::Deserialize;

use crate::calibration::error::CalibrationError;

/// Which optimizer drives the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// CMA-ES global search, optionally polished by L-BFGS-B
    Evolutionary,
    /// L-BFGS-B only, starting from the initial guess
    Gradient,
}

/// CMA-ES specific configuration parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmaEsConfig {
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    /// Whether to evaluate the population in parallel
    pub parallel_eval: bool,
    /// Verbosity level passed to the optimizer (0=silent, 1=minimal, 2=normal)
    pub verbosity: u8,
    /// Number of IPOP restarts (0 = no IPOP)
    pub ipop_restarts: usize,
    /// Factor to increase population size in IPOP restarts
    pub ipop_increase_factor: f64,
    /// Number of BIPOP restarts (0 = no BIPOP)
    pub bipop_restarts: usize,
    /// Enable L-BFGS-B refinement after CMA-ES?
    pub lbfgsb_enabled: bool,
    /// Max iterations for L-BFGS-B
    pub lbfgsb_max_iterations: usize,
    /// Total function evaluations budget across all restarts
    pub total_evals_budget: usize,
    /// Whether to use advanced sub-run budgeting logic
    pub use_subrun_budgeting: bool,
    /// Generations over which the best objective must improve by more than
    /// `tolerance` for the search to count as still progressing
    pub stagnation_generations: usize,
}

impl Default for CmaEsConfig {
    fn default() -> Self {
        Self {
            seed: Some(123456),
            parallel_eval: true,
            verbosity: 0, // Silent by default for library use
            ipop_restarts: 0,
            ipop_increase_factor: 2.0,
            bipop_restarts: 0,
            lbfgsb_enabled: false,
            lbfgsb_max_iterations: 200,
            total_evals_budget: 200000,
            use_subrun_budgeting: false,
            stagnation_generations: 20,
        }
    }
}

/// Main configuration struct for optimization
#[derive(Debug, Deserialize, Clone)]
pub struct OptimizationConfig {
    #[serde(default = "default_strategy")]
    pub strategy: SearchStrategy,

    /// Convergence tolerance: the largest objective improvement over the
    /// stagnation window for CMA-ES, the largest projected gradient component
    /// for L-BFGS-B
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Population size per CMA-ES generation
    #[serde(default = "default_pop_size")]
    pub pop_size: usize,

    /// Maximum CMA-ES generations per run
    #[serde(default = "default_max_gen")]
    pub max_gen: usize,

    /// Initial value of every normalized parameter when no guess is supplied
    #[serde(default = "default_initial_value")]
    pub initial_value: f64,

    /// CMA-ES specific configuration
    #[serde(default)]
    pub cmaes: CmaEsConfig,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            tolerance: default_tolerance(),
            pop_size: default_pop_size(),
            max_gen: default_max_gen(),
            initial_value: default_initial_value(),
            cmaes: CmaEsConfig::default(),
        }
    }
}

impl OptimizationConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(text: &str) -> Result<Self, CalibrationError> {
        toml::from_str(text).map_err(|e| CalibrationError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CalibrationError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self {
            strategy: SearchStrategy::Evolutionary,
            tolerance: 1e-8,
            pop_size: 25,
            max_gen: 200,
            initial_value: 0.5,
            cmaes: CmaEsConfig {
                bipop_restarts: 2,
                lbfgsb_enabled: true,
                total_evals_budget: 20000,
                ..CmaEsConfig::default()
            },
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            strategy: SearchStrategy::Evolutionary,
            tolerance: 1e-6,
            pop_size: 16,
            max_gen: 50,
            initial_value: 0.5,
            cmaes: CmaEsConfig {
                verbosity: 1,
                lbfgsb_max_iterations: 50,
                ..CmaEsConfig::default()
            },
        }
    }

    /// High-precision configuration for research
    pub fn research() -> Self {
        Self {
            strategy: SearchStrategy::Evolutionary,
            tolerance: 1e-9,
            pop_size: 50,
            max_gen: 500,
            initial_value: 0.5,
            cmaes: CmaEsConfig {
                verbosity: 1,
                bipop_restarts: 5,
                ipop_restarts: 3,
                lbfgsb_enabled: true,
                lbfgsb_max_iterations: 500,
                total_evals_budget: 200000,
                ..CmaEsConfig::default()
            },
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            strategy: SearchStrategy::Evolutionary,
            tolerance: 1e-4,
            pop_size: 8,
            max_gen: 10,
            initial_value: 0.5,
            cmaes: CmaEsConfig {
                lbfgsb_max_iterations: 20,
                total_evals_budget: 200,
                ..CmaEsConfig::default()
            },
        }
    }

    /// Gradient-only configuration: L-BFGS-B from the initial guess
    pub fn gradient() -> Self {
        Self {
            strategy: SearchStrategy::Gradient,
            tolerance: 1e-8,
            cmaes: CmaEsConfig {
                lbfgsb_max_iterations: 100,
                ..CmaEsConfig::default()
            },
            ..Self::default()
        }
    }
}

fn default_strategy() -> SearchStrategy {
    SearchStrategy::Evolutionary
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_pop_size() -> usize {
    12
}

fn default_max_gen() -> usize {
    250
}

fn default_initial_value() -> f64 {
    0.5
}
