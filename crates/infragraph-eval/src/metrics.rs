use serde::{Deserialize, Serialize};

use infragraph_core::{Association, EdgeType, EntityKind};

/// Metrics contract version for topology evaluation.
pub const METRICS_VERSION: &str = "0.1";

/// Machine-readable metrics for a topology evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metrics_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub entity_total: u64,
    pub edge_total: u64,
    pub entities: Vec<KindMetrics>,
    pub associations: Vec<AssociationMetrics>,
    pub invariants: InvariantSummary,
    pub z_tolerance: f64,
    pub violation_count: u64,
    pub performance: PerformanceMetrics,
}

/// Realized vs expected count for one entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindMetrics {
    pub kind: EntityKind,
    pub found: u64,
    pub expected: f64,
    pub std_dev: f64,
    /// Absent when the count is exact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    pub within_tolerance: bool,
}

/// Realized vs expected edge count for one association family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationMetrics {
    pub association: Association,
    pub edge_type: EdgeType,
    pub source: EntityKind,
    pub target: EntityKind,
    pub probability: f64,
    pub candidates: u64,
    pub expected: f64,
    pub std_dev: f64,
    pub realized: u64,
    /// Absent when the probability is 0 or 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    pub within_tolerance: bool,
}

/// Counters for one structural check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    pub checked: u64,
    pub violations: u64,
}

/// Outcomes of the structural invariant checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvariantSummary {
    pub unique_identifiers: CheckStats,
    pub edge_endpoints: CheckStats,
    pub containment_parents: CheckStats,
    pub self_loops: CheckStats,
    pub endpoint_kinds: CheckStats,
}

impl InvariantSummary {
    pub fn violations(&self) -> u64 {
        self.unique_identifiers.violations
            + self.edge_endpoints.violations
            + self.containment_parents.violations
            + self.self_loops.violations
            + self.endpoint_kinds.violations
    }
}

/// Performance timings for the evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub load_ms: u128,
    pub validate_ms: u128,
    pub total_ms: u128,
}
