//! Invariant and statistical evaluation of generated topologies.
//!
//! Checks identifier uniqueness, edge endpoints, containment parents,
//! self-loops and endpoint kinds, and compares realized association counts
//! against their binomial expectation.

pub mod engine;
pub mod errors;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod report;

pub use engine::{EvaluationEngine, METRICS_FILE, REPORT_FILE};
pub use errors::EvalError;
pub use loader::load_csv_export;
pub use metrics::{
    AssociationMetrics, CheckStats, InvariantSummary, KindMetrics, METRICS_VERSION,
    MetricsReport, PerformanceMetrics,
};
pub use model::{EvaluateOptions, EvaluationResult, Violation};
pub use report::render_report;
