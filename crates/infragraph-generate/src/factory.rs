use infragraph_core::{
    AttributeValue, CategoricalField, Edge, EdgeType, Entity, EntityKind, NumericField,
};

use crate::sampler::AttributeSampler;

/// A containment-created entity with the edge tying it to its parent.
#[derive(Debug, Clone)]
pub struct Placed {
    pub entity: Entity,
    pub edge: Edge,
}

/// Builds fully populated entity records, one operation per kind.
///
/// The factory only knows containment; association edges are decided by
/// the topology builder.
pub struct EntityFactory {
    sampler: AttributeSampler,
}

impl EntityFactory {
    pub fn new(sampler: AttributeSampler) -> Self {
        Self { sampler }
    }

    pub fn sampler(&mut self) -> &mut AttributeSampler {
        &mut self.sampler
    }

    pub fn datacenter(&mut self, ordinal: u32) -> Entity {
        self.blank(EntityKind::Datacenter)
            .with_attribute("name", AttributeValue::Text(format!("DC-{ordinal}")))
            .with_attribute("region", self.categorical(CategoricalField::DatacenterRegion))
    }

    pub fn rack(&mut self, datacenter: &Entity) -> Placed {
        let rack = self.blank(EntityKind::Rack);
        place(EdgeType::HasRack, datacenter, rack)
    }

    pub fn host(&mut self, rack: &Entity) -> Placed {
        let host = self
            .blank(EntityKind::Host)
            .with_attribute("vendor", self.categorical(CategoricalField::HostVendor))
            .with_attribute("cpu", self.numeric(NumericField::HostCpu))
            .with_attribute("memory", self.numeric(NumericField::HostMemory));
        place(EdgeType::HasHost, rack, host)
    }

    pub fn hypervisor(&mut self, name: &str) -> Entity {
        self.blank(EntityKind::Hypervisor)
            .with_attribute("name", AttributeValue::Text(name.to_string()))
    }

    pub fn vm(&mut self, host: &Entity) -> Placed {
        let vm = self
            .blank(EntityKind::Vm)
            .with_attribute("os", self.categorical(CategoricalField::VmOs))
            .with_attribute("cpu", self.numeric(NumericField::VmCpu))
            .with_attribute("memory", self.numeric(NumericField::VmMemory));
        place(EdgeType::HostsVm, host, vm)
    }

    pub fn application(&mut self, vm: &Entity) -> Placed {
        let name = self.sampler.company_name();
        let app = self
            .blank(EntityKind::Application)
            .with_attribute("name", AttributeValue::Text(name))
            .with_attribute("tier", self.categorical(CategoricalField::ApplicationTier));
        place(EdgeType::RunsApp, vm, app)
    }

    pub fn storage_array(&mut self) -> Entity {
        self.blank(EntityKind::StorageArray)
            .with_attribute("vendor", self.categorical(CategoricalField::StorageVendor))
    }

    pub fn san_switch(&mut self) -> Entity {
        self.blank(EntityKind::SanSwitch)
    }

    pub fn network_device(&mut self) -> Entity {
        self.blank(EntityKind::NetworkDevice)
            .with_attribute("type", self.categorical(CategoricalField::NetworkDeviceType))
    }

    pub fn k8s_cluster(&mut self) -> Entity {
        self.blank(EntityKind::K8sCluster)
    }

    pub fn k8s_node(&mut self, cluster: &Entity) -> Placed {
        let node = self.blank(EntityKind::K8sNode);
        place(EdgeType::HasNode, cluster, node)
    }

    pub fn pod(&mut self, node: &Entity) -> Placed {
        let pod = self.blank(EntityKind::Pod);
        place(EdgeType::RunsPod, node, pod)
    }

    pub fn service(&mut self, pod: &Entity) -> Placed {
        let service = self.blank(EntityKind::Service);
        place(EdgeType::ExposesService, pod, service)
    }

    fn blank(&mut self, kind: EntityKind) -> Entity {
        Entity::new(self.sampler.sample_identifier(kind), kind)
    }

    fn categorical(&mut self, field: CategoricalField) -> AttributeValue {
        AttributeValue::Text(self.sampler.sample_categorical(field))
    }

    fn numeric(&mut self, field: NumericField) -> AttributeValue {
        AttributeValue::Int(self.sampler.sample_numeric(field))
    }
}

fn place(edge_type: EdgeType, parent: &Entity, child: Entity) -> Placed {
    let edge = Edge::new(edge_type, parent, &child);
    Placed {
        entity: child,
        edge,
    }
}

#[cfg(test)]
mod tests {
    use infragraph_core::AttributeDomains;

    use super::*;
    use crate::sampler::IdentifierScheme;

    fn factory() -> EntityFactory {
        let sampler = AttributeSampler::from_seed(
            AttributeDomains::default(),
            IdentifierScheme::Sequential.allocator(None),
            11,
        )
        .expect("sampler");
        EntityFactory::new(sampler)
    }

    #[test]
    fn containment_kinds_carry_parent_edge() {
        let mut factory = factory();
        let dc = factory.datacenter(0);
        let rack = factory.rack(&dc);
        assert_eq!(rack.edge.edge_type, EdgeType::HasRack);
        assert_eq!(rack.edge.source, dc.to_ref());
        assert_eq!(rack.edge.target, rack.entity.to_ref());

        let host = factory.host(&rack.entity);
        assert_eq!(host.edge.source.kind, EntityKind::Rack);
        assert!(host.entity.attribute("vendor").is_some());
        assert!(host.entity.attribute("cpu").and_then(|v| v.as_i64()).is_some());
        assert!(host.entity.attribute("memory").is_some());
    }

    #[test]
    fn records_are_fully_populated() {
        let mut factory = factory();
        let dc = factory.datacenter(3);
        assert_eq!(dc.attribute("name").and_then(|v| v.as_str()), Some("DC-3"));
        assert!(dc.attribute("region").is_some());

        let rack = factory.rack(&dc);
        let host = factory.host(&rack.entity);
        let vm = factory.vm(&host.entity);
        for key in ["os", "cpu", "memory"] {
            assert!(vm.entity.attribute(key).is_some(), "{key}");
        }
        let app = factory.application(&vm.entity);
        let name = app.entity.attribute("name").and_then(|v| v.as_str());
        assert!(name.is_some_and(|value| !value.is_empty()));
        assert!(app.entity.attribute("tier").is_some());

        let hv = factory.hypervisor("KVM");
        assert_eq!(hv.attribute("name").and_then(|v| v.as_str()), Some("KVM"));
        assert!(factory.storage_array().attribute("vendor").is_some());
        assert!(factory.network_device().attribute("type").is_some());
        assert!(factory.san_switch().attributes.is_empty());
    }

    #[test]
    fn kubernetes_chain() {
        let mut factory = factory();
        let cluster = factory.k8s_cluster();
        let node = factory.k8s_node(&cluster);
        let pod = factory.pod(&node.entity);
        let service = factory.service(&pod.entity);
        assert_eq!(node.edge.edge_type, EdgeType::HasNode);
        assert_eq!(pod.edge.edge_type, EdgeType::RunsPod);
        assert_eq!(service.edge.edge_type, EdgeType::ExposesService);
        assert_eq!(service.edge.source, pod.entity.to_ref());
        assert_eq!(cluster.id.as_str(), "cluster-0");
    }
}
