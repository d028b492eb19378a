use infragraph_core::{Edge, Entity, EntityKind, TopologySnapshot};

use crate::sink::{BatchError, GraphSink, IdentityIndex, Operation, RejectedBatch, SinkError};

/// Graph store held in memory, used for tests, dry runs and evaluation.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    index: IdentityIndex,
    entities: Vec<Entity>,
    edges: Vec<Edge>,
    batches_committed: u64,
    outage_after: Option<u64>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `BackendUnavailable` for the batch following `batches`
    /// committed batches. The outage clears after firing once.
    pub fn inject_outage_after(&mut self, batches: u64) {
        self.outage_after = Some(batches);
    }

    /// Drop all entities and edges; declared constraints remain.
    pub fn clear(&mut self) {
        self.index.clear();
        self.entities.clear();
        self.edges.clear();
        self.batches_committed = 0;
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed
    }

    pub fn constraints(&self) -> Vec<(EntityKind, String)> {
        self.index.constraints().cloned().collect()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            entities: self.entities.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn into_snapshot(self) -> TopologySnapshot {
        TopologySnapshot {
            entities: self.entities,
            edges: self.edges,
        }
    }
}

impl InMemoryGraphStore {
    fn check_outage(&mut self, operations: &[Operation]) -> Result<(), BatchError> {
        if let (Some(after), Some(first)) = (self.outage_after, operations.first())
            && after == self.batches_committed
        {
            self.outage_after = None;
            return Err(BatchError::new(
                0,
                first,
                SinkError::BackendUnavailable("injected outage".to_string()),
            ));
        }
        Ok(())
    }
}

impl GraphSink for InMemoryGraphStore {
    fn declare_unique_constraint(
        &mut self,
        kind: EntityKind,
        field: &str,
    ) -> Result<(), SinkError> {
        self.index.declare(kind, field);
        Ok(())
    }

    fn create_entity(&mut self, entity: &Entity) -> Result<(), SinkError> {
        self.index.check_entity(entity)?;
        self.index.insert(entity);
        self.entities.push(entity.clone());
        Ok(())
    }

    fn create_edge(&mut self, edge: &Edge) -> Result<(), SinkError> {
        self.index.check_edge(edge)?;
        self.edges.push(edge.clone());
        Ok(())
    }

    fn run_batch(&mut self, operations: &[Operation]) -> Result<(), BatchError> {
        self.check_outage(operations)?;
        self.index.validate_batch(operations)?;
        self.index.commit_batch(operations);
        for operation in operations {
            match operation {
                Operation::CreateEntity(entity) => self.entities.push(entity.clone()),
                Operation::CreateEdge(edge) => self.edges.push(edge.clone()),
            }
        }
        self.batches_committed += 1;
        Ok(())
    }

    fn run_owned_batch(&mut self, operations: Vec<Operation>) -> Result<(), RejectedBatch> {
        let checked = self
            .check_outage(&operations)
            .and_then(|()| self.index.validate_batch(&operations));
        if let Err(error) = checked {
            return Err(RejectedBatch { error, operations });
        }
        self.index.commit_batch(&operations);
        for operation in operations {
            match operation {
                Operation::CreateEntity(entity) => self.entities.push(entity),
                Operation::CreateEdge(edge) => self.edges.push(edge),
            }
        }
        self.batches_committed += 1;
        Ok(())
    }
}
