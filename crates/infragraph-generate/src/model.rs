use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use infragraph_core::{EdgeType, EntityKind, Layer};

use crate::errors::GenerationError;
use crate::sampler::IdentifierScheme;

/// Default number of operations per transactional batch.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Directory where run artifacts are written.
    pub out_dir: PathBuf,
    /// Operations per `run_batch` call.
    pub batch_size: usize,
    pub identifiers: IdentifierScheme,
    /// Prefix for sequential identifiers.
    pub id_prefix: Option<String>,
    /// Overrides the configuration seed.
    pub seed: Option<u64>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            batch_size: DEFAULT_BATCH_SIZE,
            identifiers: IdentifierScheme::Uuid,
            id_prefix: None,
            seed: None,
        }
    }
}

/// Summary of a committed layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerReport {
    pub layer: Layer,
    pub entities: BTreeMap<EntityKind, u64>,
    pub edges: BTreeMap<EdgeType, u64>,
    pub candidate_pairs: u64,
    pub operations: u64,
    pub batches: u64,
    pub duration_ms: u64,
}

impl LayerReport {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            entities: BTreeMap::new(),
            edges: BTreeMap::new(),
            candidate_pairs: 0,
            operations: 0,
            batches: 0,
            duration_ms: 0,
        }
    }

    pub fn record_entity(&mut self, kind: EntityKind) {
        *self.entities.entry(kind).or_insert(0) += 1;
        self.operations += 1;
    }

    pub fn record_edge(&mut self, edge_type: EdgeType) {
        *self.edges.entry(edge_type).or_insert(0) += 1;
        self.operations += 1;
    }

    pub fn entity_total(&self) -> u64 {
        self.entities.values().sum()
    }

    pub fn edge_total(&self) -> u64 {
        self.edges.values().sum()
    }
}

/// Where and why a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<usize>,
}

impl FailureReport {
    pub fn from_error(err: &GenerationError) -> Self {
        match err {
            GenerationError::Layer(failure) => Self {
                code: failure.source.code().to_string(),
                message: err.to_string(),
                layer: Some(failure.layer),
                batch: Some(failure.batch),
                operation_index: Some(failure.operation_index),
                operation: Some(failure.operation.clone()),
                committed: Some(failure.committed),
            },
            GenerationError::Sink(source) => Self::message(source.code(), err.to_string()),
            _ => Self::message("generation_failed", err.to_string()),
        }
    }

    pub fn message(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            layer: None,
            batch: None,
            operation_index: None,
            operation: None,
            committed: None,
        }
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub identifiers: IdentifierScheme,
    pub batch_size: usize,
    pub started_at: String,
    pub layers: Vec<LayerReport>,
    pub entity_counts: BTreeMap<EntityKind, u64>,
    pub edge_counts: BTreeMap<EdgeType, u64>,
    pub candidate_pairs: u64,
    pub operations: u64,
    pub batches: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(
        run_id: String,
        seed: u64,
        identifiers: IdentifierScheme,
        batch_size: usize,
    ) -> Self {
        Self {
            run_id,
            seed,
            identifiers,
            batch_size,
            started_at: chrono::Utc::now().to_rfc3339(),
            layers: Vec::new(),
            entity_counts: BTreeMap::new(),
            edge_counts: BTreeMap::new(),
            candidate_pairs: 0,
            operations: 0,
            batches: 0,
            failure: None,
            duration_ms: 0,
        }
    }

    pub fn record_layer(&mut self, layer: &LayerReport) {
        for (kind, count) in &layer.entities {
            *self.entity_counts.entry(*kind).or_insert(0) += count;
        }
        for (edge_type, count) in &layer.edges {
            *self.edge_counts.entry(*edge_type).or_insert(0) += count;
        }
        self.candidate_pairs += layer.candidate_pairs;
        self.operations += layer.operations;
        self.batches += layer.batches;
        self.layers.push(layer.clone());
    }

    pub fn record_failure(&mut self, failure: FailureReport) {
        self.failure = Some(failure);
    }

    pub fn entity_total(&self) -> u64 {
        self.entity_counts.values().sum()
    }

    pub fn edge_total(&self) -> u64 {
        self.edge_counts.values().sum()
    }
}
