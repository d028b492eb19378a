use thiserror::Error;

use infragraph_core::Layer;

use crate::model::GenerationReport;
use crate::sink::SinkError;

/// A layer stopped because the sink rejected one of its batches.
#[derive(Debug, Error)]
#[error(
    "layer '{layer}' failed at batch {batch}, operation {operation_index} ({operation}) \
     after {committed} committed operation(s): {source}"
)]
pub struct LayerFailure {
    pub layer: Layer,
    /// Zero-based index of the rejected batch within the layer.
    pub batch: u64,
    /// Zero-based index of the offending operation within the layer.
    pub operation_index: usize,
    pub operation: String,
    /// Operations of this layer committed before the failure.
    pub committed: usize,
    pub source: SinkError,
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] infragraph_core::Error),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Layer(#[from] LayerFailure),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generation failed")]
    Failed(GenerationReport),
}
