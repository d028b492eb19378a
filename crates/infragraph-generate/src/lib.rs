//! Topology generation engine for infragraph.
//!
//! Builds datacenter, compute, storage, network and Kubernetes layers from a
//! `ScaleConfig`, sampling containment and Bernoulli association edges from
//! one seeded random source, and commits them through a `GraphSink` in
//! transactional batches.

pub mod builder;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod model;
pub mod output;
pub mod pairs;
pub mod planner;
pub mod sampler;
pub mod sink;

pub use builder::TopologyBuilder;
pub use engine::{GenerationEngine, GenerationResult, REPORT_FILE, RESOLVED_CONFIG_FILE};
pub use errors::{GenerationError, LayerFailure};
pub use factory::{EntityFactory, Placed};
pub use model::{
    DEFAULT_BATCH_SIZE, FailureReport, GenerateOptions, GenerationReport, LayerReport,
};
pub use output::{CsvExportSink, CypherScriptSink};
pub use planner::{LayerTask, plan_layers};
pub use sampler::{
    AttributeSampler, IdAllocator, IdentifierScheme, SequentialAllocator, UuidAllocator,
};
pub use sink::{
    BatchError, GraphSink, InMemoryGraphStore, Operation, RejectedBatch, SinkError,
};
