use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use infragraph_core::{
    Association, CountEstimate, EdgeType, EntityId, EntityKind, ScaleConfig, TopologySnapshot,
    estimate,
};

use crate::errors::EvalError;
use crate::loader::load_csv_export;
use crate::metrics::{
    AssociationMetrics, InvariantSummary, KindMetrics, METRICS_VERSION, MetricsReport,
    PerformanceMetrics,
};
use crate::model::{EvaluateOptions, EvaluationResult, Violation};
use crate::report::render_report;

pub const METRICS_FILE: &str = "metrics.json";
pub const REPORT_FILE: &str = "report.md";

/// Evaluate a generated topology against its configuration.
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    options: EvaluateOptions,
}

impl EvaluationEngine {
    pub fn new(options: EvaluateOptions) -> Self {
        Self { options }
    }

    pub fn evaluate(
        &self,
        snapshot: &TopologySnapshot,
        config: &ScaleConfig,
    ) -> Result<EvaluationResult, EvalError> {
        self.evaluate_loaded(snapshot, config, Instant::now(), 0)
    }

    /// Load a CSV export directory and evaluate it.
    pub fn evaluate_export(
        &self,
        export_dir: &Path,
        config: &ScaleConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let total_start = Instant::now();
        let snapshot = load_csv_export(export_dir)?;
        let load_ms = total_start.elapsed().as_millis();
        self.evaluate_loaded(&snapshot, config, total_start, load_ms)
    }

    fn evaluate_loaded(
        &self,
        snapshot: &TopologySnapshot,
        config: &ScaleConfig,
        total_start: Instant,
        load_ms: u128,
    ) -> Result<EvaluationResult, EvalError> {
        let validate_start = Instant::now();
        let tolerance = self.options.z_tolerance;

        let mut violations = Vec::new();
        let mut invariants = InvariantSummary::default();
        check_structure(snapshot, &mut invariants, &mut violations);

        let entities = kind_metrics(snapshot, config, tolerance);
        for metric in entities.iter().filter(|metric| !metric.within_tolerance) {
            violations.push(Violation::new(
                "entity_count",
                format!(
                    "{} count {} deviates from expected {:.1}",
                    metric.kind, metric.found, metric.expected
                ),
            ));
        }

        let associations = association_metrics(snapshot, config, tolerance);
        for metric in associations.iter().filter(|metric| !metric.within_tolerance) {
            violations.push(Violation::new(
                "association_count",
                format!(
                    "{} {} -> {} count {} deviates from expected {:.1} (z = {})",
                    metric.edge_type,
                    metric.source,
                    metric.target,
                    metric.realized,
                    metric.expected,
                    metric
                        .z_score
                        .map(|z| format!("{z:.2}"))
                        .unwrap_or_else(|| "exact".to_string())
                ),
            ));
        }

        let metrics = MetricsReport {
            metrics_version: METRICS_VERSION.to_string(),
            seed: config.seed,
            entity_total: snapshot.entities.len() as u64,
            edge_total: snapshot.edges.len() as u64,
            entities,
            associations,
            invariants,
            z_tolerance: tolerance,
            violation_count: violations.len() as u64,
            performance: PerformanceMetrics {
                load_ms,
                validate_ms: validate_start.elapsed().as_millis(),
                total_ms: total_start.elapsed().as_millis(),
            },
        };

        let report = render_report(&metrics, &violations, self.options.max_examples);

        let (metrics_path, report_path) = match &self.options.out_dir {
            Some(out_dir) => {
                std::fs::create_dir_all(out_dir)?;
                let metrics_path = out_dir.join(METRICS_FILE);
                std::fs::write(&metrics_path, serde_json::to_vec_pretty(&metrics)?)?;
                let report_path = out_dir.join(REPORT_FILE);
                std::fs::write(&report_path, report.as_bytes())?;
                (Some(metrics_path), Some(report_path))
            }
            None => (None, None),
        };

        if self.options.strict && !violations.is_empty() {
            return Err(EvalError::Violations(violations.len() as u64));
        }

        Ok(EvaluationResult {
            metrics_path,
            report_path,
            metrics,
            report,
            violations,
        })
    }
}

fn check_structure(
    snapshot: &TopologySnapshot,
    summary: &mut InvariantSummary,
    violations: &mut Vec<Violation>,
) {
    let mut kinds: HashMap<&EntityId, EntityKind> = HashMap::with_capacity(snapshot.entities.len());
    for entity in &snapshot.entities {
        summary.unique_identifiers.checked += 1;
        if kinds.insert(&entity.id, entity.kind).is_some() {
            summary.unique_identifiers.violations += 1;
            violations.push(
                Violation::new(
                    "duplicate_identifier",
                    format!("identifier assigned more than once ({})", entity.kind),
                )
                .with_example(entity.id.as_str()),
            );
        }
    }

    let mut parents: HashMap<&EntityId, u64> = HashMap::new();
    for edge in &snapshot.edges {
        for endpoint in [&edge.source, &edge.target] {
            summary.edge_endpoints.checked += 1;
            if kinds.get(&endpoint.id) != Some(&endpoint.kind) {
                summary.edge_endpoints.violations += 1;
                violations.push(
                    Violation::new(
                        "dangling_endpoint",
                        format!("{} edge references missing {}", edge.edge_type, endpoint.kind),
                    )
                    .with_example(endpoint.id.as_str()),
                );
            }
        }

        summary.self_loops.checked += 1;
        if edge.source.id == edge.target.id {
            summary.self_loops.violations += 1;
            violations.push(
                Violation::new(
                    "self_loop",
                    format!("{} edge from {} to itself", edge.edge_type, edge.source.kind),
                )
                .with_example(edge.source.id.as_str()),
            );
        }

        summary.endpoint_kinds.checked += 1;
        if !edge
            .edge_type
            .endpoints()
            .contains(&(edge.source.kind, edge.target.kind))
        {
            summary.endpoint_kinds.violations += 1;
            violations.push(Violation::new(
                "endpoint_kind",
                format!(
                    "{} does not connect {} to {}",
                    edge.edge_type, edge.source.kind, edge.target.kind
                ),
            ));
        }

        if edge.edge_type.is_containment() {
            *parents.entry(&edge.target.id).or_insert(0) += 1;
        }
    }

    let contained = containment_children();
    for entity in snapshot
        .entities
        .iter()
        .filter(|entity| contained.contains(&entity.kind))
    {
        summary.containment_parents.checked += 1;
        let count = parents.get(&entity.id).copied().unwrap_or(0);
        if count != 1 {
            summary.containment_parents.violations += 1;
            violations.push(
                Violation::new(
                    "containment_parent",
                    format!("{} has {count} containment parent(s)", entity.kind),
                )
                .with_example(entity.id.as_str()),
            );
        }
    }
}

/// Kinds created together with a containment edge.
fn containment_children() -> BTreeSet<EntityKind> {
    EdgeType::ALL
        .into_iter()
        .filter(|edge_type| edge_type.is_containment())
        .flat_map(|edge_type| edge_type.endpoints().iter().map(|(_, target)| *target))
        .collect()
}

fn kind_metrics(
    snapshot: &TopologySnapshot,
    config: &ScaleConfig,
    tolerance: f64,
) -> Vec<KindMetrics> {
    let counts = snapshot.entity_counts();
    let found = |kind: EntityKind| counts.get(&kind).copied().unwrap_or(0);
    let expected = estimate(config);

    EntityKind::ALL
        .into_iter()
        .map(|kind| {
            // Bernoulli-created kinds are scored against the parents actually present
            let count = match kind {
                EntityKind::Application => {
                    CountEstimate::binomial(found(EntityKind::Vm), config.apps_per_vm)
                }
                EntityKind::Service => CountEstimate::binomial(
                    found(EntityKind::Pod),
                    config.probabilities.pod_service,
                ),
                other => expected.entity(other),
            };
            let (z_score, within_tolerance) = score(found(kind), count, tolerance);
            KindMetrics {
                kind,
                found: found(kind),
                expected: count.expected,
                std_dev: count.std_dev,
                z_score,
                within_tolerance,
            }
        })
        .collect()
}

fn association_metrics(
    snapshot: &TopologySnapshot,
    config: &ScaleConfig,
    tolerance: f64,
) -> Vec<AssociationMetrics> {
    let counts = snapshot.entity_counts();
    let population = |kind: EntityKind| counts.get(&kind).copied().unwrap_or(0);

    Association::ALL
        .into_iter()
        .map(|association| {
            let sources = population(association.source());
            let targets = population(association.target());
            let candidates = if association.excludes_self_pairs() {
                sources.saturating_mul(targets.saturating_sub(1))
            } else {
                sources.saturating_mul(targets)
            };
            let probability = association.probability(config);
            let count = CountEstimate::binomial(candidates, probability);
            let realized = snapshot.count_edges_between(
                association.edge_type(),
                association.source(),
                association.target(),
            );
            let (z_score, within_tolerance) = score(realized, count, tolerance);
            AssociationMetrics {
                association,
                edge_type: association.edge_type(),
                source: association.source(),
                target: association.target(),
                probability,
                candidates,
                expected: count.expected,
                std_dev: count.std_dev,
                realized,
                z_score,
                within_tolerance,
            }
        })
        .collect()
}

fn score(found: u64, count: CountEstimate, tolerance: f64) -> (Option<f64>, bool) {
    if count.is_exact() {
        return (None, found as f64 == count.expected);
    }
    let z = (found as f64 - count.expected) / count.std_dev;
    (Some(z), z.abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use infragraph_core::{Edge, Entity};

    use super::*;

    fn entity(id: &str, kind: EntityKind) -> Entity {
        Entity::new(EntityId::new(id), kind)
    }

    #[test]
    fn structural_defects_are_reported() {
        let dc = entity("dc-0", EntityKind::Datacenter);
        let rack = entity("rack-0", EntityKind::Rack);
        let orphan = entity("rack-1", EntityKind::Rack);
        let net = entity("net-0", EntityKind::NetworkDevice);
        let ghost = entity("host-9", EntityKind::Host);
        let snapshot = TopologySnapshot {
            entities: vec![dc.clone(), rack.clone(), orphan, net.clone(), dc.clone()],
            edges: vec![
                Edge::new(EdgeType::HasRack, &dc, &rack),
                Edge::new(EdgeType::ConnectedTo, &net, &net),
                Edge::new(EdgeType::HasHost, &rack, &ghost),
                Edge::new(EdgeType::RunsOn, &dc, &net),
            ],
        };

        let mut summary = InvariantSummary::default();
        let mut violations = Vec::new();
        check_structure(&snapshot, &mut summary, &mut violations);

        assert_eq!(summary.unique_identifiers.violations, 1);
        assert_eq!(summary.edge_endpoints.violations, 1);
        assert_eq!(summary.self_loops.violations, 1);
        assert_eq!(summary.endpoint_kinds.violations, 1);
        assert_eq!(summary.containment_parents.violations, 1);
        assert_eq!(summary.violations() as usize, violations.len());
    }

    #[test]
    fn exact_counts_must_match() {
        assert_eq!(score(4, CountEstimate::exact(4), 6.0), (None, true));
        assert_eq!(score(5, CountEstimate::exact(4), 6.0), (None, false));
        let (z, ok) = score(60, CountEstimate::binomial(100, 0.5), 6.0);
        assert!(ok);
        assert!((z.expect("z") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn containment_children_cover_placed_kinds() {
        let children = containment_children();
        for kind in [
            EntityKind::Rack,
            EntityKind::Host,
            EntityKind::Vm,
            EntityKind::Application,
            EntityKind::K8sNode,
            EntityKind::Pod,
            EntityKind::Service,
        ] {
            assert!(children.contains(&kind), "{kind}");
        }
        assert!(!children.contains(&EntityKind::Datacenter));
        assert!(!children.contains(&EntityKind::NetworkDevice));
    }
}
