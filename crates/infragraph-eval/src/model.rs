use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::MetricsReport;

/// Options for topology evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateOptions {
    /// Fail when any violation is found.
    pub strict: bool,
    /// Largest accepted |z| for binomial counts.
    pub z_tolerance: f64,
    /// Limit the number of examples emitted in the report.
    pub max_examples: usize,
    /// Where metrics.json and report.md are written; nothing is written when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            z_tolerance: 6.0,
            max_examples: 20,
            out_dir: None,
        }
    }
}

/// Structured violation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl Violation {
    pub fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            example: None,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Result of a topology evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub metrics_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub metrics: MetricsReport,
    pub report: String,
    pub violations: Vec<Violation>,
}

impl EvaluationResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}
