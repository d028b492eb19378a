use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ScaleConfig;
use crate::model::{EdgeType, EntityKind};

/// Cross-product association families sampled by independent Bernoulli trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    HostHypervisor,
    SanStorage,
    HostSan,
    NetworkNetwork,
    HostNetwork,
    VmK8sNode,
}

impl Association {
    pub const ALL: [Association; 6] = [
        Association::HostHypervisor,
        Association::SanStorage,
        Association::HostSan,
        Association::NetworkNetwork,
        Association::HostNetwork,
        Association::VmK8sNode,
    ];

    pub fn edge_type(self) -> EdgeType {
        match self {
            Association::HostHypervisor => EdgeType::RunsOn,
            Association::VmK8sNode => EdgeType::RunsNode,
            _ => EdgeType::ConnectedTo,
        }
    }

    pub fn source(self) -> EntityKind {
        match self {
            Association::HostHypervisor | Association::HostSan | Association::HostNetwork => {
                EntityKind::Host
            }
            Association::SanStorage => EntityKind::SanSwitch,
            Association::NetworkNetwork => EntityKind::NetworkDevice,
            Association::VmK8sNode => EntityKind::Vm,
        }
    }

    pub fn target(self) -> EntityKind {
        match self {
            Association::HostHypervisor => EntityKind::Hypervisor,
            Association::SanStorage => EntityKind::StorageArray,
            Association::HostSan => EntityKind::SanSwitch,
            Association::NetworkNetwork | Association::HostNetwork => EntityKind::NetworkDevice,
            Association::VmK8sNode => EntityKind::K8sNode,
        }
    }

    /// Self-pairs are excluded when source and target share a population.
    pub fn excludes_self_pairs(self) -> bool {
        self.source() == self.target()
    }

    pub fn probability(self, config: &ScaleConfig) -> f64 {
        let p = &config.probabilities;
        match self {
            Association::HostHypervisor => p.host_hypervisor,
            Association::SanStorage => p.san_storage,
            Association::HostSan => p.host_san,
            Association::NetworkNetwork => p.network_network,
            Association::HostNetwork => p.host_network,
            Association::VmK8sNode => p.vm_k8s_node,
        }
    }

    /// Number of candidate pairs evaluated: O(N×M).
    pub fn candidates(self, config: &ScaleConfig) -> u64 {
        let sources = population(config, self.source());
        let targets = population(config, self.target());
        if self.excludes_self_pairs() {
            sources.saturating_mul(targets.saturating_sub(1))
        } else {
            sources.saturating_mul(targets)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Association::HostHypervisor => "host_hypervisor",
            Association::SanStorage => "san_storage",
            Association::HostSan => "host_san",
            Association::NetworkNetwork => "network_network",
            Association::HostNetwork => "host_network",
            Association::VmK8sNode => "vm_k8s_node",
        }
    }
}

/// Exact population size for kinds whose count does not depend on a trial.
fn population(config: &ScaleConfig, kind: EntityKind) -> u64 {
    match kind {
        EntityKind::Datacenter => config.datacenters as u64,
        EntityKind::Rack => config.total_racks(),
        EntityKind::Host => config.total_hosts(),
        EntityKind::Hypervisor => config.hypervisors.len() as u64,
        EntityKind::Vm => config.total_vms(),
        EntityKind::StorageArray => config.storage_arrays as u64,
        EntityKind::SanSwitch => config.san_switches as u64,
        EntityKind::NetworkDevice => config.network_devices as u64,
        EntityKind::K8sCluster => 1,
        EntityKind::K8sNode => config.k8s_nodes as u64,
        EntityKind::Pod => config.total_pods(),
        EntityKind::Application | EntityKind::Service => 0,
    }
}

/// Expected value with binomial spread; `std_dev` is zero for exact counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountEstimate {
    pub expected: f64,
    pub std_dev: f64,
}

impl CountEstimate {
    pub fn exact(count: u64) -> Self {
        Self {
            expected: count as f64,
            std_dev: 0.0,
        }
    }

    pub fn binomial(trials: u64, p: f64) -> Self {
        let n = trials as f64;
        Self {
            expected: n * p,
            std_dev: (n * p * (1.0 - p)).max(0.0).sqrt(),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.std_dev == 0.0
    }
}

/// Expected edge count for one (type, source kind, target kind) family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEstimate {
    pub edge_type: EdgeType,
    pub source: EntityKind,
    pub target: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<Association>,
    pub candidates: u64,
    pub count: CountEstimate,
}

/// Expected shape of a topology for a given configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyEstimate {
    pub entities: BTreeMap<EntityKind, CountEstimate>,
    pub edges: Vec<EdgeEstimate>,
}

impl TopologyEstimate {
    pub fn expected_entities(&self) -> f64 {
        self.entities.values().map(|count| count.expected).sum()
    }

    pub fn expected_edges(&self) -> f64 {
        self.edges.iter().map(|edge| edge.count.expected).sum()
    }

    pub fn entity(&self, kind: EntityKind) -> CountEstimate {
        self.entities
            .get(&kind)
            .copied()
            .unwrap_or(CountEstimate::exact(0))
    }

    pub fn association(&self, association: Association) -> Option<&EdgeEstimate> {
        self.edges
            .iter()
            .find(|edge| edge.association == Some(association))
    }

    pub fn max_candidates(&self) -> u64 {
        self.edges
            .iter()
            .map(|edge| edge.candidates)
            .max()
            .unwrap_or(0)
    }
}

/// Compute expected entity and edge counts without generating anything.
pub fn estimate(config: &ScaleConfig) -> TopologyEstimate {
    let mut entities = BTreeMap::new();
    for kind in EntityKind::ALL {
        let count = match kind {
            EntityKind::Application => {
                CountEstimate::binomial(config.total_vms(), config.apps_per_vm)
            }
            EntityKind::Service => {
                CountEstimate::binomial(config.total_pods(), config.probabilities.pod_service)
            }
            other => CountEstimate::exact(population(config, other)),
        };
        entities.insert(kind, count);
    }

    let mut edges = Vec::new();
    let containment = [
        (EdgeType::HasRack, EntityKind::Datacenter, EntityKind::Rack),
        (EdgeType::HasHost, EntityKind::Rack, EntityKind::Host),
        (EdgeType::HostsVm, EntityKind::Host, EntityKind::Vm),
        (EdgeType::RunsApp, EntityKind::Vm, EntityKind::Application),
        (EdgeType::HasNode, EntityKind::K8sCluster, EntityKind::K8sNode),
        (EdgeType::RunsPod, EntityKind::K8sNode, EntityKind::Pod),
        (EdgeType::ExposesService, EntityKind::Pod, EntityKind::Service),
    ];
    for (edge_type, source, target) in containment {
        // one containment edge per child
        let count = entities
            .get(&target)
            .copied()
            .unwrap_or(CountEstimate::exact(0));
        let candidates = match target {
            EntityKind::Application => config.total_vms(),
            EntityKind::Service => config.total_pods(),
            _ => count.expected as u64,
        };
        edges.push(EdgeEstimate {
            edge_type,
            source,
            target,
            association: None,
            candidates,
            count,
        });
    }

    for association in Association::ALL {
        let candidates = association.candidates(config);
        edges.push(EdgeEstimate {
            edge_type: association.edge_type(),
            source: association.source(),
            target: association.target(),
            association: Some(association),
            candidates,
            count: CountEstimate::binomial(candidates, association.probability(config)),
        });
    }

    TopologyEstimate { entities, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_matches_reference_topology() {
        let estimate = estimate(&ScaleConfig::default());
        assert_eq!(estimate.entity(EntityKind::Host).expected, 800.0);
        assert_eq!(estimate.entity(EntityKind::Vm).expected, 8000.0);
        assert_eq!(estimate.entity(EntityKind::Application).expected, 4000.0);
        assert_eq!(estimate.entity(EntityKind::Pod).expected, 4000.0);
        assert_eq!(estimate.entity(EntityKind::K8sCluster).expected, 1.0);

        let net = estimate
            .association(Association::NetworkNetwork)
            .expect("network estimate");
        assert_eq!(net.candidates, 120 * 119);
        assert_eq!(estimate.max_candidates(), 8000 * 1000);
    }

    #[test]
    fn boundary_probabilities_have_no_spread() {
        let one = CountEstimate::binomial(50, 1.0);
        assert_eq!(one.expected, 50.0);
        assert!(one.is_exact());
        let zero = CountEstimate::binomial(50, 0.0);
        assert_eq!(zero.expected, 0.0);
        assert!(zero.is_exact());
    }
}
