use std::collections::BTreeMap;

use fake::Fake;
use fake::faker::company::en::CompanyName;
use rand::distr::{Bernoulli, Distribution};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use infragraph_core::{AttributeDomains, CategoricalField, EntityId, EntityKind, NumericField};

use crate::errors::GenerationError;

/// Identifier scheme selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierScheme {
    /// UUID v4 layout built from the run's random source.
    #[default]
    Uuid,
    /// `<prefix>-<kind>-<counter>` with a per-kind counter.
    Sequential,
}

/// Allocates identifiers that never repeat within a run.
pub trait IdAllocator {
    fn allocate(&mut self, kind: EntityKind, rng: &mut dyn RngCore) -> EntityId;
}

/// 122 random bits per identifier, drawn from the seeded generator.
#[derive(Debug, Default)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&mut self, _kind: EntityKind, rng: &mut dyn RngCore) -> EntityId {
        let bytes: [u8; 16] = rng.random();
        EntityId::new(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

/// Counter-based identifiers; never consumes randomness.
#[derive(Debug, Default)]
pub struct SequentialAllocator {
    prefix: Option<String>,
    counters: BTreeMap<EntityKind, u64>,
}

impl SequentialAllocator {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|value| !value.is_empty()),
            counters: BTreeMap::new(),
        }
    }
}

impl IdAllocator for SequentialAllocator {
    fn allocate(&mut self, kind: EntityKind, _rng: &mut dyn RngCore) -> EntityId {
        let counter = self.counters.entry(kind).or_insert(0);
        let value = *counter;
        *counter += 1;
        match &self.prefix {
            Some(prefix) => EntityId::new(format!("{prefix}-{}-{value}", kind.slug())),
            None => EntityId::new(format!("{}-{value}", kind.slug())),
        }
    }
}

impl IdentifierScheme {
    pub fn allocator(self, prefix: Option<String>) -> Box<dyn IdAllocator> {
        match self {
            IdentifierScheme::Uuid => Box::new(UuidAllocator),
            IdentifierScheme::Sequential => Box::new(SequentialAllocator::new(prefix)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierScheme::Uuid => "uuid",
            IdentifierScheme::Sequential => "sequential",
        }
    }
}

/// Draws identifiers and attribute values from one seeded random source.
pub struct AttributeSampler {
    domains: AttributeDomains,
    ids: Box<dyn IdAllocator>,
    rng: ChaCha8Rng,
}

impl AttributeSampler {
    /// Build a sampler; empty domains are rejected here, never while sampling.
    pub fn new(
        domains: AttributeDomains,
        ids: Box<dyn IdAllocator>,
        rng: ChaCha8Rng,
    ) -> Result<Self, GenerationError> {
        domains.validate()?;
        Ok(Self { domains, ids, rng })
    }

    pub fn from_seed(
        domains: AttributeDomains,
        ids: Box<dyn IdAllocator>,
        seed: u64,
    ) -> Result<Self, GenerationError> {
        Self::new(domains, ids, ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn sample_identifier(&mut self, kind: EntityKind) -> EntityId {
        self.ids.allocate(kind, &mut self.rng)
    }

    pub fn sample_categorical(&mut self, field: CategoricalField) -> String {
        self.domains
            .categorical(field)
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default()
    }

    pub fn sample_numeric(&mut self, field: NumericField) -> i64 {
        self.domains
            .numeric(field)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default()
    }

    pub fn company_name(&mut self) -> String {
        CompanyName().fake_with_rng(&mut self.rng)
    }

    /// Build a reusable trial distribution for probability `p`.
    pub fn bernoulli(p: f64) -> Result<Bernoulli, GenerationError> {
        Bernoulli::new(p).map_err(|err| {
            GenerationError::Config(infragraph_core::Error::Configuration(format!(
                "invalid probability {p}: {err}"
            )))
        })
    }

    pub fn trial(&mut self, distribution: &Bernoulli) -> bool {
        distribution.sample(&mut self.rng)
    }

    /// Distinct indices in `0..len`, returned in ascending order.
    pub fn choose_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        let amount = amount.min(len);
        let mut indices = rand::seq::index::sample(&mut self.rng, len, amount).into_vec();
        indices.sort_unstable();
        indices
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sampler(scheme: IdentifierScheme, seed: u64) -> AttributeSampler {
        AttributeSampler::from_seed(AttributeDomains::default(), scheme.allocator(None), seed)
            .expect("sampler")
    }

    #[test]
    fn categorical_values_stay_in_domain() {
        let mut sampler = sampler(IdentifierScheme::Uuid, 1);
        let domains = AttributeDomains::default();
        for field in CategoricalField::ALL {
            for _ in 0..50 {
                let value = sampler.sample_categorical(field);
                assert!(domains.categorical(field).contains(&value), "{value}");
            }
        }
        for _ in 0..50 {
            let cpu = sampler.sample_numeric(NumericField::HostCpu);
            assert!([32, 48, 64].contains(&cpu));
        }
    }

    #[test]
    fn uuid_identifiers_are_deterministic_per_seed() {
        let mut left = sampler(IdentifierScheme::Uuid, 9);
        let mut right = sampler(IdentifierScheme::Uuid, 9);
        for _ in 0..10 {
            assert_eq!(
                left.sample_identifier(EntityKind::Host),
                right.sample_identifier(EntityKind::Host)
            );
        }
        let id = left.sample_identifier(EntityKind::Vm);
        let parsed = uuid::Uuid::parse_str(id.as_str()).expect("uuid layout");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn sequential_identifiers_count_per_kind() {
        let mut allocator = SequentialAllocator::new(Some("r1".to_string()));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            allocator.allocate(EntityKind::Datacenter, &mut rng).as_str(),
            "r1-dc-0"
        );
        assert_eq!(
            allocator.allocate(EntityKind::Datacenter, &mut rng).as_str(),
            "r1-dc-1"
        );
        assert_eq!(
            allocator.allocate(EntityKind::K8sNode, &mut rng).as_str(),
            "r1-k8s-node-0"
        );
    }

    #[test]
    fn identifiers_do_not_repeat() {
        let mut sampler = sampler(IdentifierScheme::Uuid, 3);
        let mut seen = HashSet::new();
        for _ in 0..20_000 {
            assert!(seen.insert(sampler.sample_identifier(EntityKind::Pod)));
        }
    }

    #[test]
    fn empty_domain_fails_at_construction() {
        let domains = AttributeDomains {
            vm_os: Vec::new(),
            ..AttributeDomains::default()
        };
        let result = AttributeSampler::from_seed(domains, Box::new(UuidAllocator), 1);
        assert!(matches!(result, Err(GenerationError::Config(_))));
    }

    #[test]
    fn choose_indices_is_sorted_and_bounded() {
        let mut sampler = sampler(IdentifierScheme::Sequential, 5);
        let picked = sampler.choose_indices(10, 4);
        assert_eq!(picked.len(), 4);
        assert!(picked.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(sampler.choose_indices(3, 8), vec![0, 1, 2]);
    }

    #[test]
    fn invalid_probability_is_a_config_error() {
        assert!(AttributeSampler::bernoulli(1.5).is_err());
        let always = AttributeSampler::bernoulli(1.0).expect("p=1");
        let mut sampler = sampler(IdentifierScheme::Uuid, 2);
        assert!((0..100).all(|_| sampler.trial(&always)));
    }
}
