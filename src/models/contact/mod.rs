//! Foot-ground contact calibration: the force law, the mapping from
//! normalized optimizer parameters onto the model, per-thread model clones,
//! and the objective that ties them to a reference force signal.

pub mod comparison;
pub mod force_law;
pub mod mapping;
pub mod metrics;
pub mod objective;
pub mod pool;
pub mod signal;

pub use comparison::{ComparisonRow, ComparisonSink, ComparisonSummary, CsvComparisonWriter};
pub use force_law::{ContactForceLaw, FICTITIOUS_STIFFNESS};
pub use mapping::{ParameterMapping, PhysicalParameters};
pub use metrics::{MetricsSnapshot, ObjectiveMetrics};
pub use objective::ContactCalibrator;
pub use pool::{ModelPool, WorkerModel};
pub use signal::{ForceSignal, SignalError};
