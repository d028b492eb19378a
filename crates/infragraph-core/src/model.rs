use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Entity kinds emitted by the topology generator.
///
/// Declaration order is the order used for constraint declaration and
/// for deterministic iteration in reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum EntityKind {
    Datacenter,
    Rack,
    Host,
    Hypervisor,
    #[serde(rename = "VM")]
    Vm,
    Application,
    StorageArray,
    SanSwitch,
    NetworkDevice,
    K8sCluster,
    K8sNode,
    Pod,
    Service,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Datacenter,
        EntityKind::Rack,
        EntityKind::Host,
        EntityKind::Hypervisor,
        EntityKind::Vm,
        EntityKind::Application,
        EntityKind::StorageArray,
        EntityKind::SanSwitch,
        EntityKind::NetworkDevice,
        EntityKind::K8sCluster,
        EntityKind::K8sNode,
        EntityKind::Pod,
        EntityKind::Service,
    ];

    /// Graph label used by sinks.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Datacenter => "Datacenter",
            EntityKind::Rack => "Rack",
            EntityKind::Host => "Host",
            EntityKind::Hypervisor => "Hypervisor",
            EntityKind::Vm => "VM",
            EntityKind::Application => "Application",
            EntityKind::StorageArray => "StorageArray",
            EntityKind::SanSwitch => "SanSwitch",
            EntityKind::NetworkDevice => "NetworkDevice",
            EntityKind::K8sCluster => "K8sCluster",
            EntityKind::K8sNode => "K8sNode",
            EntityKind::Pod => "Pod",
            EntityKind::Service => "Service",
        }
    }

    /// Short lowercase token used in sequential identifiers.
    pub fn slug(self) -> &'static str {
        match self {
            EntityKind::Datacenter => "dc",
            EntityKind::Rack => "rack",
            EntityKind::Host => "host",
            EntityKind::Hypervisor => "hv",
            EntityKind::Vm => "vm",
            EntityKind::Application => "app",
            EntityKind::StorageArray => "storage",
            EntityKind::SanSwitch => "san",
            EntityKind::NetworkDevice => "net",
            EntityKind::K8sCluster => "cluster",
            EntityKind::K8sNode => "k8s-node",
            EntityKind::Pod => "pod",
            EntityKind::Service => "svc",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Globally unique, immutable entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute value carried by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Text(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value.as_str()),
            AttributeValue::Int(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            AttributeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Text(value) => f.write_str(value),
        }
    }
}

/// Typed entity record ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: AttributeValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            kind: self.kind,
            id: self.id.clone(),
        }
    }
}

/// Reference to an entity by kind and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// Directed relationship types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    HasRack,
    HasHost,
    RunsOn,
    HostsVm,
    RunsApp,
    ConnectedTo,
    HasNode,
    RunsPod,
    ExposesService,
    RunsNode,
}

impl EdgeType {
    pub const ALL: [EdgeType; 10] = [
        EdgeType::HasRack,
        EdgeType::HasHost,
        EdgeType::RunsOn,
        EdgeType::HostsVm,
        EdgeType::RunsApp,
        EdgeType::ConnectedTo,
        EdgeType::HasNode,
        EdgeType::RunsPod,
        EdgeType::ExposesService,
        EdgeType::RunsNode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::HasRack => "HAS_RACK",
            EdgeType::HasHost => "HAS_HOST",
            EdgeType::RunsOn => "RUNS_ON",
            EdgeType::HostsVm => "HOSTS_VM",
            EdgeType::RunsApp => "RUNS_APP",
            EdgeType::ConnectedTo => "CONNECTED_TO",
            EdgeType::HasNode => "HAS_NODE",
            EdgeType::RunsPod => "RUNS_POD",
            EdgeType::ExposesService => "EXPOSES_SERVICE",
            EdgeType::RunsNode => "RUNS_NODE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|edge| edge.as_str() == name)
    }

    /// Containment edges are created together with their child and give
    /// every child exactly one parent.
    pub fn is_containment(self) -> bool {
        matches!(
            self,
            EdgeType::HasRack
                | EdgeType::HasHost
                | EdgeType::HostsVm
                | EdgeType::RunsApp
                | EdgeType::HasNode
                | EdgeType::RunsPod
                | EdgeType::ExposesService
        )
    }

    /// Allowed (source, target) kinds for this edge type.
    pub fn endpoints(self) -> &'static [(EntityKind, EntityKind)] {
        use EntityKind::*;
        match self {
            EdgeType::HasRack => &[(Datacenter, Rack)],
            EdgeType::HasHost => &[(Rack, Host)],
            EdgeType::RunsOn => &[(Host, Hypervisor)],
            EdgeType::HostsVm => &[(Host, Vm)],
            EdgeType::RunsApp => &[(Vm, Application)],
            EdgeType::ConnectedTo => &[
                (SanSwitch, StorageArray),
                (Host, SanSwitch),
                (NetworkDevice, NetworkDevice),
                (Host, NetworkDevice),
            ],
            EdgeType::HasNode => &[(K8sCluster, K8sNode)],
            EdgeType::RunsPod => &[(K8sNode, Pod)],
            EdgeType::ExposesService => &[(Pod, Service)],
            EdgeType::RunsNode => &[(Vm, K8sNode)],
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub edge_type: EdgeType,
    pub source: EntityRef,
    pub target: EntityRef,
}

impl Edge {
    pub fn new(edge_type: EdgeType, source: &Entity, target: &Entity) -> Self {
        Self {
            edge_type,
            source: source.to_ref(),
            target: target.to_ref(),
        }
    }
}

/// A complete set of entities and edges, in commit order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
}

impl TopologySnapshot {
    pub fn entity_counts(&self) -> BTreeMap<EntityKind, u64> {
        let mut counts = BTreeMap::new();
        for entity in &self.entities {
            *counts.entry(entity.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn edge_counts(&self) -> BTreeMap<EdgeType, u64> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.edge_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_kind(&self, kind: EntityKind) -> u64 {
        self.entities
            .iter()
            .filter(|entity| entity.kind == kind)
            .count() as u64
    }

    pub fn count_edges(&self, edge_type: EdgeType) -> u64 {
        self.edges
            .iter()
            .filter(|edge| edge.edge_type == edge_type)
            .count() as u64
    }

    /// Count edges of a type between specific endpoint kinds.
    pub fn count_edges_between(
        &self,
        edge_type: EdgeType,
        source: EntityKind,
        target: EntityKind,
    ) -> u64 {
        self.edges
            .iter()
            .filter(|edge| {
                edge.edge_type == edge_type
                    && edge.source.kind == source
                    && edge.target.kind == target
            })
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_label(kind.label()), Some(kind));
        }
        for edge in EdgeType::ALL {
            assert_eq!(EdgeType::from_name(edge.as_str()), Some(edge));
        }
    }

    #[test]
    fn vm_kind_serializes_as_label() {
        let json = serde_json::to_string(&EntityKind::Vm).expect("serialize kind");
        assert_eq!(json, "\"VM\"");
        let json = serde_json::to_string(&EdgeType::ExposesService).expect("serialize edge");
        assert_eq!(json, "\"EXPOSES_SERVICE\"");
    }

    #[test]
    fn association_edges_are_not_containment() {
        assert!(!EdgeType::RunsOn.is_containment());
        assert!(!EdgeType::ConnectedTo.is_containment());
        assert!(!EdgeType::RunsNode.is_containment());
        assert!(EdgeType::RunsPod.is_containment());
    }
}
