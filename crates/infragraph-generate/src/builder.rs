use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use infragraph_core::{
    Association, Edge, Entity, EntityKind, IDENTITY_FIELD, Layer, ScaleConfig, validate_config,
};

use crate::errors::{GenerationError, LayerFailure};
use crate::factory::{EntityFactory, Placed};
use crate::model::LayerReport;
use crate::pairs::{PairRule, sample_pairs};
use crate::planner::{LayerTask, plan_layers};
use crate::sampler::{AttributeSampler, IdAllocator};
use crate::sink::{BatchProgress, GraphSink, Operation, commit_in_batches};

/// Builds the topology layer by layer and commits it through a sink.
///
/// Each layer is fully materialized (entity creations first, then edges)
/// before any of it is committed. A rejected batch stops the build and keeps
/// the layer's operations with their commit offset; [`TopologyBuilder::resume`]
/// continues from the first uncommitted batch without re-sampling.
pub struct TopologyBuilder {
    config: ScaleConfig,
    factory: EntityFactory,
    batch_size: usize,
    tasks: Vec<LayerTask>,
    registry: BTreeMap<EntityKind, Vec<Entity>>,
    completed: Vec<LayerReport>,
    pending: Option<PendingLayer>,
    constraints_declared: bool,
}

/// A materialized layer. `operations` holds only what is not committed yet;
/// `entities` is the copy later layers sample from once the layer commits.
struct PendingLayer {
    layer: Layer,
    entities: Vec<Entity>,
    operations: VecDeque<Operation>,
    progress: BatchProgress,
    report: LayerReport,
    elapsed: Duration,
}

impl TopologyBuilder {
    pub fn new(
        config: ScaleConfig,
        factory: EntityFactory,
        batch_size: usize,
    ) -> Result<Self, GenerationError> {
        validate_config(&config)?;
        if batch_size == 0 {
            return Err(GenerationError::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let tasks = plan_layers(&config);
        Ok(Self {
            config,
            factory,
            batch_size,
            tasks,
            registry: BTreeMap::new(),
            completed: Vec::new(),
            pending: None,
            constraints_declared: false,
        })
    }

    /// Builder with a sampler seeded from `seed` over the config's domains.
    pub fn seeded(
        config: ScaleConfig,
        seed: u64,
        ids: Box<dyn IdAllocator>,
        batch_size: usize,
    ) -> Result<Self, GenerationError> {
        let sampler = AttributeSampler::from_seed(config.attributes.clone(), ids, seed)?;
        Self::new(config, EntityFactory::new(sampler), batch_size)
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[LayerTask] {
        &self.tasks
    }

    /// Reports for fully committed layers, in commit order.
    pub fn reports(&self) -> &[LayerReport] {
        &self.completed
    }

    /// Layer holding uncommitted operations after a failure.
    pub fn pending_layer(&self) -> Option<Layer> {
        self.pending.as_ref().map(|pending| pending.layer)
    }

    /// Operations of the pending layer that are not committed yet.
    pub fn pending_operations(&self) -> usize {
        self.pending
            .as_ref()
            .map_or(0, |pending| pending.operations.len())
    }

    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.tasks.len()
    }

    /// Committed entities of one kind, in creation order.
    pub fn entities(&self, kind: EntityKind) -> &[Entity] {
        population(&self.registry, kind)
    }

    /// Run every remaining layer.
    pub fn build(&mut self, sink: &mut dyn GraphSink) -> Result<(), GenerationError> {
        if !self.constraints_declared {
            for kind in EntityKind::ALL {
                sink.declare_unique_constraint(kind, IDENTITY_FIELD)?;
            }
            self.constraints_declared = true;
            debug!(kinds = EntityKind::ALL.len(), "unique constraints declared");
        }

        let tasks = self.tasks.clone();
        for task in tasks.iter().skip(self.completed.len()) {
            self.run_layer(task, sink)?;
        }
        Ok(())
    }

    /// Continue after a failed batch: the pending layer restarts at its
    /// first uncommitted batch, then the remaining layers run.
    pub fn resume(&mut self, sink: &mut dyn GraphSink) -> Result<(), GenerationError> {
        if let Some(pending) = &self.pending {
            info!(
                layer = %pending.layer,
                committed = pending.progress.committed,
                remaining = pending.operations.len(),
                "resuming layer"
            );
        }
        self.build(sink)
    }

    fn run_layer(
        &mut self,
        task: &LayerTask,
        sink: &mut dyn GraphSink,
    ) -> Result<(), GenerationError> {
        let started = Instant::now();
        let mut pending = match self.pending.take().filter(|p| p.layer == task.layer) {
            Some(pending) => pending,
            None => {
                info!(
                    layer = %task.layer,
                    expected_entities = task.expected_entities,
                    expected_edges = task.expected_edges,
                    candidate_pairs = task.candidate_pairs,
                    "building layer"
                );
                let output =
                    materialize(task.layer, &self.config, &self.registry, &mut self.factory)?;
                output.into_pending(task.layer)
            }
        };

        let result = commit_in_batches(
            sink,
            &mut pending.operations,
            self.batch_size,
            &mut pending.progress,
        );
        pending.elapsed += started.elapsed();

        if let Err(failure) = result {
            let err = LayerFailure {
                layer: pending.layer,
                batch: failure.batch,
                operation_index: failure.operation_index,
                operation: failure.error.operation,
                committed: pending.progress.committed,
                source: failure.error.source,
            };
            warn!(
                layer = %err.layer,
                batch = err.batch,
                operation_index = err.operation_index,
                operation = %err.operation,
                committed = err.committed,
                error = %err.source,
                "layer failed"
            );
            self.pending = Some(pending);
            return Err(err.into());
        }

        let report = self.register(pending);
        info!(
            layer = %report.layer,
            entities = report.entity_total(),
            edges = report.edge_total(),
            batches = report.batches,
            duration_ms = report.duration_ms,
            "layer committed"
        );
        self.completed.push(report);
        Ok(())
    }

    /// Make a committed layer's entities addressable to later layers.
    fn register(&mut self, pending: PendingLayer) -> LayerReport {
        let mut report = pending.report;
        report.batches = pending.progress.batches;
        report.duration_ms = pending.elapsed.as_millis() as u64;

        for entity in pending.entities {
            self.registry.entry(entity.kind).or_default().push(entity);
        }
        report
    }
}

#[derive(Default)]
struct LayerOutput {
    entities: Vec<Entity>,
    edges: Vec<Edge>,
    candidate_pairs: u64,
}

impl LayerOutput {
    fn push_placed(&mut self, placed: Placed) {
        self.entities.push(placed.entity);
        self.edges.push(placed.edge);
    }

    fn sweep(
        &mut self,
        factory: &mut EntityFactory,
        config: &ScaleConfig,
        association: Association,
        sources: &[Entity],
        targets: &[Entity],
    ) -> Result<(), GenerationError> {
        let rule = PairRule::for_association(association, config)?;
        let stats = sample_pairs(
            factory.sampler().rng(),
            &rule,
            sources,
            targets,
            &mut self.edges,
        );
        self.candidate_pairs += stats.candidates;
        debug!(
            association = association.name(),
            candidates = stats.candidates,
            accepted = stats.accepted,
            "pairs sampled"
        );
        Ok(())
    }

    /// Edges move into the operation queue; only entities keep a second copy.
    fn into_pending(self, layer: Layer) -> PendingLayer {
        let mut report = LayerReport::new(layer);
        report.candidate_pairs = self.candidate_pairs;
        let mut operations = VecDeque::with_capacity(self.entities.len() + self.edges.len());
        for entity in &self.entities {
            report.record_entity(entity.kind);
            operations.push_back(Operation::CreateEntity(entity.clone()));
        }
        for edge in self.edges {
            report.record_edge(edge.edge_type);
            operations.push_back(Operation::CreateEdge(edge));
        }
        PendingLayer {
            layer,
            entities: self.entities,
            operations,
            progress: BatchProgress::default(),
            report,
            elapsed: Duration::ZERO,
        }
    }
}

fn population(registry: &BTreeMap<EntityKind, Vec<Entity>>, kind: EntityKind) -> &[Entity] {
    registry.get(&kind).map(Vec::as_slice).unwrap_or(&[])
}

fn materialize(
    layer: Layer,
    config: &ScaleConfig,
    registry: &BTreeMap<EntityKind, Vec<Entity>>,
    factory: &mut EntityFactory,
) -> Result<LayerOutput, GenerationError> {
    let mut out = LayerOutput::default();
    let hosts = population(registry, EntityKind::Host);

    match layer {
        Layer::Datacenters => {
            for ordinal in 0..config.datacenters {
                out.entities.push(factory.datacenter(ordinal));
            }
        }
        Layer::RacksAndHosts => {
            for datacenter in population(registry, EntityKind::Datacenter) {
                for _ in 0..config.racks_per_datacenter {
                    let rack = factory.rack(datacenter);
                    let rack_hosts: Vec<Placed> = (0..config.hosts_per_rack)
                        .map(|_| factory.host(&rack.entity))
                        .collect();
                    out.push_placed(rack);
                    for host in rack_hosts {
                        out.push_placed(host);
                    }
                }
            }
        }
        Layer::Hypervisors => {
            let hypervisors: Vec<Entity> = config
                .hypervisors
                .iter()
                .map(|name| factory.hypervisor(name))
                .collect();
            out.sweep(factory, config, Association::HostHypervisor, hosts, &hypervisors)?;
            out.entities.extend(hypervisors);
        }
        Layer::VirtualMachines => {
            let selected = factory
                .sampler()
                .choose_indices(hosts.len(), config.vm_host_limit as usize);
            for host in selected.into_iter().filter_map(|idx| hosts.get(idx)) {
                for _ in 0..config.vms_per_host {
                    out.push_placed(factory.vm(host));
                }
            }
        }
        Layer::Applications => {
            let trial = AttributeSampler::bernoulli(config.apps_per_vm)?;
            for vm in population(registry, EntityKind::Vm) {
                if factory.sampler().trial(&trial) {
                    out.push_placed(factory.application(vm));
                }
            }
        }
        Layer::Storage => {
            let arrays: Vec<Entity> = (0..config.storage_arrays)
                .map(|_| factory.storage_array())
                .collect();
            let switches: Vec<Entity> = (0..config.san_switches)
                .map(|_| factory.san_switch())
                .collect();
            out.sweep(factory, config, Association::SanStorage, &switches, &arrays)?;
            out.sweep(factory, config, Association::HostSan, hosts, &switches)?;
            out.entities.extend(arrays);
            out.entities.extend(switches);
        }
        Layer::Network => {
            let devices: Vec<Entity> = (0..config.network_devices)
                .map(|_| factory.network_device())
                .collect();
            out.sweep(factory, config, Association::NetworkNetwork, &devices, &devices)?;
            out.sweep(factory, config, Association::HostNetwork, hosts, &devices)?;
            out.entities.extend(devices);
        }
        Layer::Kubernetes => {
            let cluster = factory.k8s_cluster();
            let (nodes, node_edges): (Vec<Entity>, Vec<Edge>) = (0..config.k8s_nodes)
                .map(|_| {
                    let placed = factory.k8s_node(&cluster);
                    (placed.entity, placed.edge)
                })
                .unzip();

            let service_trial = AttributeSampler::bernoulli(config.probabilities.pod_service)?;
            let mut pods = Vec::new();
            let mut services = Vec::new();
            for node in &nodes {
                for _ in 0..config.pods_per_node {
                    let pod = factory.pod(node);
                    if factory.sampler().trial(&service_trial) {
                        services.push(factory.service(&pod.entity));
                    }
                    pods.push(pod);
                }
            }

            let vms = population(registry, EntityKind::Vm);
            out.sweep(factory, config, Association::VmK8sNode, vms, &nodes)?;

            out.entities.push(cluster);
            out.entities.extend(nodes);
            out.edges.extend(node_edges);
            for placed in pods.into_iter().chain(services) {
                out.push_placed(placed);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::IdentifierScheme;
    use crate::sink::{InMemoryGraphStore, SinkError};

    fn tiny() -> ScaleConfig {
        ScaleConfig {
            datacenters: 1,
            racks_per_datacenter: 2,
            hosts_per_rack: 3,
            vm_host_limit: 4,
            vms_per_host: 2,
            storage_arrays: 2,
            san_switches: 3,
            network_devices: 4,
            k8s_nodes: 2,
            pods_per_node: 2,
            ..ScaleConfig::default()
        }
    }

    fn builder(config: ScaleConfig, batch_size: usize) -> TopologyBuilder {
        TopologyBuilder::seeded(
            config,
            17,
            IdentifierScheme::Sequential.allocator(None),
            batch_size,
        )
        .expect("builder")
    }

    #[test]
    fn constraints_are_declared_before_entities() {
        let mut store = InMemoryGraphStore::new();
        let mut builder = builder(tiny(), 50);
        builder.build(&mut store).expect("build");
        assert_eq!(store.constraints().len(), EntityKind::ALL.len());
        assert!(builder.is_complete());
    }

    #[test]
    fn vm_hosts_are_a_bounded_subset() {
        let mut store = InMemoryGraphStore::new();
        let mut builder = builder(tiny(), 50);
        builder.build(&mut store).expect("build");
        assert_eq!(builder.entities(EntityKind::Vm).len(), 8);
        let mut parents: Vec<&str> = store
            .edges()
            .iter()
            .filter(|edge| edge.edge_type == infragraph_core::EdgeType::HostsVm)
            .map(|edge| edge.source.id.as_str())
            .collect();
        parents.sort_unstable();
        parents.dedup();
        assert_eq!(parents.len(), 4);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = TopologyBuilder::seeded(
            tiny(),
            1,
            IdentifierScheme::Uuid.allocator(None),
            0,
        );
        assert!(matches!(result, Err(GenerationError::InvalidOptions(_))));
    }

    #[test]
    fn failure_keeps_pending_layer_and_resume_finishes() {
        let mut store = InMemoryGraphStore::new();
        let mut builder = builder(tiny(), 3);
        store.inject_outage_after(4);
        let err = builder.build(&mut store).expect_err("outage");
        let GenerationError::Layer(failure) = err else {
            panic!("expected layer failure");
        };
        assert!(matches!(failure.source, SinkError::BackendUnavailable(_)));
        assert_eq!(builder.pending_layer(), Some(failure.layer));
        assert_eq!(failure.committed % 3, 0);
        let uncommitted = builder.pending_operations();
        assert!(uncommitted > 0);

        builder.resume(&mut store).expect("resume");
        assert!(builder.is_complete());
        assert_eq!(builder.pending_layer(), None);
        assert_eq!(builder.pending_operations(), 0);

        // Committed operations were handed to the store, not kept twice.
        let report = builder
            .reports()
            .iter()
            .find(|report| report.layer == failure.layer)
            .expect("failed layer report");
        assert_eq!(report.operations as usize, failure.committed + uncommitted);
        let total: u64 = builder.reports().iter().map(|r| r.entity_total()).sum();
        assert_eq!(total as usize, store.entities().len());
    }
}
