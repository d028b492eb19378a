//! Persistence sink contract and the in-tree in-memory store.

pub mod batch;
pub mod identity;
pub mod memory;

use std::fmt;

use thiserror::Error;

use infragraph_core::{Edge, EdgeType, Entity, EntityId, EntityKind};

pub use batch::{BatchFailure, BatchProgress, commit_in_batches};
pub use identity::IdentityIndex;
pub use memory::InMemoryGraphStore;

/// Failures reported by a graph store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("constraint violation: {kind} with id '{id}' already exists")]
    ConstraintViolation { kind: EntityKind, id: EntityId },
    #[error("dangling reference: {edge_type} endpoint {kind} '{id}' does not exist")]
    DanglingReference {
        edge_type: EdgeType,
        kind: EntityKind,
        id: EntityId,
    },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl SinkError {
    pub fn code(&self) -> &'static str {
        match self {
            SinkError::ConstraintViolation { .. } => "constraint_violation",
            SinkError::DanglingReference { .. } => "dangling_reference",
            SinkError::BackendUnavailable(_) => "backend_unavailable",
        }
    }
}

/// One write inside a transactional batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateEntity(Entity),
    CreateEdge(Edge),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateEntity(entity) => {
                write!(f, "create {} '{}'", entity.kind, entity.id)
            }
            Operation::CreateEdge(edge) => write!(
                f,
                "create {} {} '{}' -> {} '{}'",
                edge.edge_type, edge.source.kind, edge.source.id, edge.target.kind, edge.target.id
            ),
        }
    }
}

/// A rejected batch, naming the first offending operation.
#[derive(Debug, Clone, Error)]
#[error("batch operation {index} ({operation}) failed: {source}")]
pub struct BatchError {
    /// Index of the offending operation within the batch.
    pub index: usize,
    pub operation: String,
    pub source: SinkError,
}

impl BatchError {
    pub fn new(index: usize, operation: &Operation, source: SinkError) -> Self {
        Self {
            index,
            operation: operation.to_string(),
            source,
        }
    }
}

/// A rejected owned batch; the operations come back untouched.
#[derive(Debug)]
pub struct RejectedBatch {
    pub error: BatchError,
    pub operations: Vec<Operation>,
}

/// Graph store consumed by the topology builder.
pub trait GraphSink {
    /// Enforce uniqueness of `field` for `kind`. Safe to call repeatedly.
    fn declare_unique_constraint(&mut self, kind: EntityKind, field: &str)
    -> Result<(), SinkError>;

    fn create_entity(&mut self, entity: &Entity) -> Result<(), SinkError>;

    fn create_edge(&mut self, edge: &Edge) -> Result<(), SinkError>;

    /// Apply every operation or none of them.
    fn run_batch(&mut self, operations: &[Operation]) -> Result<(), BatchError>;

    /// Owned form of [`GraphSink::run_batch`]. Stores that keep what they
    /// commit take the operations instead of cloning them.
    fn run_owned_batch(&mut self, operations: Vec<Operation>) -> Result<(), RejectedBatch> {
        match self.run_batch(&operations) {
            Ok(()) => Ok(()),
            Err(error) => Err(RejectedBatch { error, operations }),
        }
    }

    /// Push buffered output to the backend.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
