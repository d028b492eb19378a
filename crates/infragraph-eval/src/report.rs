use crate::metrics::{CheckStats, MetricsReport};
use crate::model::Violation;

/// Render a deterministic markdown report from metrics and violations.
pub fn render_report(
    metrics: &MetricsReport,
    violations: &[Violation],
    max_examples: usize,
) -> String {
    let mut lines = Vec::new();

    lines.push("# Infragraph Evaluation Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!("- metrics_version: {}", metrics.metrics_version));
    lines.push(format!(
        "- seed: {}",
        metrics
            .seed
            .map(|seed| seed.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!("- entities: {}", metrics.entity_total));
    lines.push(format!("- edges: {}", metrics.edge_total));
    lines.push(format!("- z_tolerance: {}", metrics.z_tolerance));
    lines.push(String::new());

    lines.push("## Entity counts".to_string());
    lines.push("| kind | expected | found | z | ok |".to_string());
    lines.push("| --- | --- | --- | --- | --- |".to_string());
    for entity in &metrics.entities {
        lines.push(format!(
            "| {} | {:.1} | {} | {} | {} |",
            entity.kind,
            entity.expected,
            entity.found,
            format_z(entity.z_score),
            entity.within_tolerance
        ));
    }
    lines.push(String::new());

    lines.push("## Associations".to_string());
    lines.push("| association | edge | p | candidates | expected | realized | z | ok |".to_string());
    lines.push("| --- | --- | --- | --- | --- | --- | --- | --- |".to_string());
    for association in &metrics.associations {
        lines.push(format!(
            "| {} | {} {} -> {} | {} | {} | {:.1} | {} | {} | {} |",
            association.association.name(),
            association.edge_type,
            association.source,
            association.target,
            association.probability,
            association.candidates,
            association.expected,
            association.realized,
            format_z(association.z_score),
            association.within_tolerance
        ));
    }
    lines.push(String::new());

    lines.push("## Invariant summary".to_string());
    lines.push("| check | checked | violations |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    let invariants = &metrics.invariants;
    push_check_row(&mut lines, "unique_identifiers", &invariants.unique_identifiers);
    push_check_row(&mut lines, "edge_endpoints", &invariants.edge_endpoints);
    push_check_row(&mut lines, "containment_parents", &invariants.containment_parents);
    push_check_row(&mut lines, "self_loops", &invariants.self_loops);
    push_check_row(&mut lines, "endpoint_kinds", &invariants.endpoint_kinds);
    lines.push(String::new());

    if !violations.is_empty() {
        lines.push("## Top violations".to_string());
        for violation in violations.iter().take(max_examples) {
            let example = violation
                .example
                .as_ref()
                .map(|value| format!(" example={value}"))
                .unwrap_or_default();
            lines.push(format!(
                "- {}: {}{}",
                violation.code, violation.message, example
            ));
        }
        if violations.len() > max_examples {
            lines.push(format!(
                "- ... {} more",
                violations.len() - max_examples
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Recommendations".to_string());
    lines.extend(recommendations(metrics, violations));
    lines.join("\n")
}

fn format_z(z_score: Option<f64>) -> String {
    z_score
        .map(|z| format!("{z:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

fn push_check_row(lines: &mut Vec<String>, name: &str, stats: &CheckStats) {
    lines.push(format!(
        "| {} | {} | {} |",
        name, stats.checked, stats.violations
    ));
}

fn recommendations(metrics: &MetricsReport, violations: &[Violation]) -> Vec<String> {
    let mut lines = Vec::new();
    let invariants = &metrics.invariants;
    if invariants.unique_identifiers.violations > 0 {
        lines.push("- reset the target store or change the seed before rerunning.".to_string());
    }
    if invariants.edge_endpoints.violations > 0 || invariants.containment_parents.violations > 0 {
        lines.push("- resume the interrupted layer so every parent and child is committed.".to_string());
    }
    if invariants.self_loops.violations > 0 || invariants.endpoint_kinds.violations > 0 {
        lines.push("- the export was edited or produced by another tool; regenerate it.".to_string());
    }
    if metrics
        .associations
        .iter()
        .any(|association| !association.within_tolerance)
    {
        lines.push(
            "- compare the export against the configuration it was generated from.".to_string(),
        );
    }
    if metrics.entities.iter().any(|entity| !entity.within_tolerance) {
        lines.push("- entity counts diverge from the scale settings; check the run was complete.".to_string());
    }
    if violations.is_empty() {
        lines.push("- no violations detected; compare metrics across seeds for drift.".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use infragraph_core::EntityKind;

    use super::*;
    use crate::metrics::{InvariantSummary, KindMetrics, PerformanceMetrics};

    fn metrics(found: u64) -> MetricsReport {
        MetricsReport {
            metrics_version: "0.1".to_string(),
            seed: Some(3),
            entity_total: found,
            edge_total: 0,
            entities: vec![KindMetrics {
                kind: EntityKind::Datacenter,
                found,
                expected: 2.0,
                std_dev: 0.0,
                z_score: None,
                within_tolerance: found == 2,
            }],
            associations: Vec::new(),
            invariants: InvariantSummary::default(),
            z_tolerance: 6.0,
            violation_count: 0,
            performance: PerformanceMetrics {
                load_ms: 0,
                validate_ms: 0,
                total_ms: 0,
            },
        }
    }

    #[test]
    fn clean_report_has_no_violation_section() {
        let report = render_report(&metrics(2), &[], 5);
        assert!(report.starts_with("# Infragraph Evaluation Report"));
        assert!(report.contains("| Datacenter | 2.0 | 2 | - | true |"));
        assert!(!report.contains("## Top violations"));
        assert!(report.contains("no violations detected"));
    }

    #[test]
    fn violations_are_truncated_to_max_examples() {
        let violations: Vec<Violation> = (0..4)
            .map(|index| {
                Violation::new("self_loop", format!("loop {index}")).with_example(format!("n-{index}"))
            })
            .collect();
        let report = render_report(&metrics(3), &violations, 2);
        assert!(report.contains("- self_loop: loop 1 example=n-1"));
        assert!(!report.contains("loop 2"));
        assert!(report.contains("- ... 2 more"));
        assert!(report.contains("entity counts diverge"));
    }
}
