use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{EdgeType, EntityKind};

/// Generation layers: one step of entity creation plus its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Datacenters,
    RacksAndHosts,
    Hypervisors,
    VirtualMachines,
    Applications,
    Storage,
    Network,
    Kubernetes,
}

impl Layer {
    pub const ALL: [Layer; 8] = [
        Layer::Datacenters,
        Layer::RacksAndHosts,
        Layer::Hypervisors,
        Layer::VirtualMachines,
        Layer::Applications,
        Layer::Storage,
        Layer::Network,
        Layer::Kubernetes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Datacenters => "datacenters",
            Layer::RacksAndHosts => "racks_and_hosts",
            Layer::Hypervisors => "hypervisors",
            Layer::VirtualMachines => "virtual_machines",
            Layer::Applications => "applications",
            Layer::Storage => "storage",
            Layer::Network => "network",
            Layer::Kubernetes => "kubernetes",
        }
    }

    /// Layers whose entities this layer references.
    pub fn dependencies(self) -> &'static [Layer] {
        match self {
            Layer::Datacenters => &[],
            Layer::RacksAndHosts => &[Layer::Datacenters],
            Layer::Hypervisors => &[Layer::RacksAndHosts],
            Layer::VirtualMachines => &[Layer::RacksAndHosts],
            Layer::Applications => &[Layer::VirtualMachines],
            Layer::Storage => &[Layer::RacksAndHosts],
            Layer::Network => &[Layer::RacksAndHosts],
            Layer::Kubernetes => &[Layer::VirtualMachines],
        }
    }

    /// Entity kinds created by this layer.
    pub fn creates(self) -> &'static [EntityKind] {
        match self {
            Layer::Datacenters => &[EntityKind::Datacenter],
            Layer::RacksAndHosts => &[EntityKind::Rack, EntityKind::Host],
            Layer::Hypervisors => &[EntityKind::Hypervisor],
            Layer::VirtualMachines => &[EntityKind::Vm],
            Layer::Applications => &[EntityKind::Application],
            Layer::Storage => &[EntityKind::StorageArray, EntityKind::SanSwitch],
            Layer::Network => &[EntityKind::NetworkDevice],
            Layer::Kubernetes => &[
                EntityKind::K8sCluster,
                EntityKind::K8sNode,
                EntityKind::Pod,
                EntityKind::Service,
            ],
        }
    }

    /// Edge types emitted by this layer.
    pub fn emits(self) -> &'static [EdgeType] {
        match self {
            Layer::Datacenters => &[],
            Layer::RacksAndHosts => &[EdgeType::HasRack, EdgeType::HasHost],
            Layer::Hypervisors => &[EdgeType::RunsOn],
            Layer::VirtualMachines => &[EdgeType::HostsVm],
            Layer::Applications => &[EdgeType::RunsApp],
            Layer::Storage | Layer::Network => &[EdgeType::ConnectedTo],
            Layer::Kubernetes => &[
                EdgeType::HasNode,
                EdgeType::RunsPod,
                EdgeType::ExposesService,
                EdgeType::RunsNode,
            ],
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the layer dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for layer dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerGraphReport {
    pub summary: LayerGraphSummary,
    pub topo_order: Option<Vec<Layer>>,
    pub cycle: Option<Vec<Layer>>,
}

/// Build a deterministic dependency report for the generation layers.
pub fn build_layer_graph_report() -> LayerGraphReport {
    let graph = build_adjacency(&Layer::ALL);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = LayerGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => LayerGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => LayerGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

/// Layers in dependency order; ties break on declaration order.
pub fn layer_order() -> Vec<Layer> {
    build_layer_graph_report()
        .topo_order
        .unwrap_or_else(|| Layer::ALL.to_vec())
}

fn build_adjacency(layers: &[Layer]) -> BTreeMap<Layer, BTreeSet<Layer>> {
    let mut graph: BTreeMap<Layer, BTreeSet<Layer>> = BTreeMap::new();

    for layer in layers {
        graph.entry(*layer).or_default();
        for dependency in layer.dependencies() {
            graph.entry(*dependency).or_default().insert(*layer);
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<Layer, BTreeSet<Layer>>) -> Result<Vec<Layer>, Vec<Layer>> {
    let mut indegree: BTreeMap<Layer, usize> = graph.keys().map(|node| (*node, 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(*target).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<Layer> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);

        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*target);
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<Layer> = indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node) } else { None })
            .collect();
        Err(cycle_nodes)
    }
}
