//! Calibration errors.

use thiserror::Error;

use crate::models::contact::signal::SignalError;
use crate::models::multibody::ModelError;

/// Errors that end a calibration run.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The model definition is incomplete or inconsistent
    #[error("model configuration error: {0}")]
    Model(#[from] ModelError),

    /// The reference force signal could not be built
    #[error("invalid experimental signal: {0}")]
    Signal(#[from] SignalError),

    /// Nothing to compare against
    #[error("state trajectory is empty")]
    EmptyTrajectory,

    /// Initial guess of the wrong length
    #[error("parameter vector has {provided} entries, expected {expected}")]
    ParameterCount { expected: usize, provided: usize },

    /// A worker could not initialize its model clone during evaluation
    #[error("worker model setup failed: {0}")]
    WorkerSetup(String),

    /// Underlying optimizer reported a non-recoverable failure
    #[error("optimizer failed: {0}")]
    OptimizerFailed(String),

    /// Best candidate has a poisoned objective
    #[error("best objective value is not finite ({0})")]
    NonFiniteObjective(f64),

    /// Configuration file could not be read or parsed
    #[error("invalid configuration: {0}")]
    Config(String),
}
