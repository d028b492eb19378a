use std::collections::{BTreeSet, HashMap};

use infragraph_core::{Edge, Entity, EntityId, EntityKind, EntityRef};

use crate::sink::{BatchError, Operation, SinkError};

/// Committed identifiers plus declared constraints, shared by every sink.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    ids: HashMap<EntityId, EntityKind>,
    constraints: BTreeSet<(EntityKind, String)>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the constraint was not declared before.
    pub fn declare(&mut self, kind: EntityKind, field: &str) -> bool {
        self.constraints.insert((kind, field.to_string()))
    }

    pub fn constraints(&self) -> impl Iterator<Item = &(EntityKind, String)> {
        self.constraints.iter()
    }

    pub fn contains(&self, endpoint: &EntityRef) -> bool {
        self.ids.get(&endpoint.id) == Some(&endpoint.kind)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn check_entity(&self, entity: &Entity) -> Result<(), SinkError> {
        if self.ids.contains_key(&entity.id) {
            return Err(violation(entity));
        }
        Ok(())
    }

    pub fn check_edge(&self, edge: &Edge) -> Result<(), SinkError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains(endpoint) {
                return Err(dangling(edge, endpoint));
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, entity: &Entity) {
        self.ids.insert(entity.id.clone(), entity.kind);
    }

    /// Validate a batch against committed state plus the batch's own
    /// earlier entities, without changing anything.
    pub fn validate_batch(&self, operations: &[Operation]) -> Result<(), BatchError> {
        let mut staged: HashMap<&EntityId, EntityKind> = HashMap::new();

        for (index, operation) in operations.iter().enumerate() {
            match operation {
                Operation::CreateEntity(entity) => {
                    if self.ids.contains_key(&entity.id) || staged.contains_key(&entity.id) {
                        return Err(BatchError::new(index, operation, violation(entity)));
                    }
                    staged.insert(&entity.id, entity.kind);
                }
                Operation::CreateEdge(edge) => {
                    for endpoint in [&edge.source, &edge.target] {
                        let exists = self.contains(endpoint)
                            || staged.get(&endpoint.id) == Some(&endpoint.kind);
                        if !exists {
                            return Err(BatchError::new(
                                index,
                                operation,
                                dangling(edge, endpoint),
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Record the entities of a batch that already validated.
    pub fn commit_batch(&mut self, operations: &[Operation]) {
        for operation in operations {
            if let Operation::CreateEntity(entity) = operation {
                self.insert(entity);
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

fn violation(entity: &Entity) -> SinkError {
    SinkError::ConstraintViolation {
        kind: entity.kind,
        id: entity.id.clone(),
    }
}

fn dangling(edge: &Edge, endpoint: &EntityRef) -> SinkError {
    SinkError::DanglingReference {
        edge_type: edge.edge_type,
        kind: endpoint.kind,
        id: endpoint.id.clone(),
    }
}
