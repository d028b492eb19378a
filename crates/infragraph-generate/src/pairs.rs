use rand::Rng;
use rand::distr::{Bernoulli, Distribution};

use infragraph_core::{Association, Edge, EdgeType, Entity, ScaleConfig};

use crate::errors::GenerationError;
use crate::sampler::AttributeSampler;

/// One association family sampled over a full cross product.
#[derive(Debug, Clone, Copy)]
pub struct PairRule {
    pub edge_type: EdgeType,
    pub probability: f64,
    /// Skip `(a, a)` when sources and targets are the same population.
    pub exclude_self: bool,
    trial: Bernoulli,
}

impl PairRule {
    pub fn new(
        edge_type: EdgeType,
        probability: f64,
        exclude_self: bool,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            edge_type,
            probability,
            exclude_self,
            trial: AttributeSampler::bernoulli(probability)?,
        })
    }

    pub fn for_association(
        association: Association,
        config: &ScaleConfig,
    ) -> Result<Self, GenerationError> {
        Self::new(
            association.edge_type(),
            association.probability(config),
            association.excludes_self_pairs(),
        )
    }
}

/// Candidate pairs evaluated and edges accepted by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairStats {
    pub candidates: u64,
    pub accepted: u64,
}

/// Run one independent Bernoulli trial per ordered (source, target) pair.
///
/// Cost is O(N×M) trials; callers bound N×M through configuration limits.
/// Every accepted pair is appended to `out` in source-major order. Boundary
/// probabilities skip the random source entirely so `p = 0` yields no edges
/// and `p = 1` yields every candidate.
pub fn sample_pairs<R: Rng + ?Sized>(
    rng: &mut R,
    rule: &PairRule,
    sources: &[Entity],
    targets: &[Entity],
    out: &mut Vec<Edge>,
) -> PairStats {
    let mut stats = PairStats::default();

    for source in sources {
        for target in targets {
            if rule.exclude_self && source.id == target.id {
                continue;
            }
            stats.candidates += 1;
            let accept = if rule.probability <= 0.0 {
                false
            } else if rule.probability >= 1.0 {
                true
            } else {
                rule.trial.sample(rng)
            };
            if accept {
                out.push(Edge::new(rule.edge_type, source, target));
                stats.accepted += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use infragraph_core::{EntityId, EntityKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn devices(count: usize) -> Vec<Entity> {
        (0..count)
            .map(|idx| Entity::new(EntityId::new(format!("net-{idx}")), EntityKind::NetworkDevice))
            .collect()
    }

    fn rule(probability: f64, exclude_self: bool) -> PairRule {
        PairRule::new(EdgeType::ConnectedTo, probability, exclude_self).expect("rule")
    }

    #[test]
    fn boundary_probabilities_are_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let nodes = devices(6);
        let mut out = Vec::new();

        let stats = sample_pairs(&mut rng, &rule(0.0, true), &nodes, &nodes, &mut out);
        assert_eq!(stats.candidates, 30);
        assert_eq!(stats.accepted, 0);
        assert!(out.is_empty());

        let stats = sample_pairs(&mut rng, &rule(1.0, true), &nodes, &nodes, &mut out);
        assert_eq!(stats.accepted, 30);
        assert_eq!(out.len(), 30);
    }

    #[test]
    fn self_pairs_are_skipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let nodes = devices(12);
        let mut out = Vec::new();
        sample_pairs(&mut rng, &rule(1.0, true), &nodes, &nodes, &mut out);
        assert!(out.iter().all(|edge| edge.source.id != edge.target.id));

        out.clear();
        let stats = sample_pairs(&mut rng, &rule(1.0, false), &nodes, &nodes, &mut out);
        assert_eq!(stats.candidates, 144);
    }

    #[test]
    fn invalid_probability_is_rejected() {
        assert!(PairRule::new(EdgeType::RunsOn, -0.1, false).is_err());
    }

    #[test]
    fn accepted_count_concentrates_around_expectation() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sources = devices(200);
        let targets = devices(100);
        let mut out = Vec::new();
        let stats = sample_pairs(&mut rng, &rule(0.25, false), &sources, &targets, &mut out);
        let expected = 20_000.0 * 0.25;
        let std_dev = (20_000.0_f64 * 0.25 * 0.75).sqrt();
        let z = (stats.accepted as f64 - expected) / std_dev;
        assert!(z.abs() < 6.0, "z = {z}");
    }
}
