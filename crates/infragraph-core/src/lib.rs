//! Core contracts and helpers for infragraph.
//!
//! This crate defines the topology data model, the scale configuration and
//! its validation, attribute domains, the layer dependency graph, and
//! expected-count estimation shared by the generator, evaluator and CLI.

pub mod config;
pub mod domains;
pub mod error;
pub mod estimate;
pub mod graph;
pub mod model;
pub mod validation;

pub use config::{EdgeProbabilities, ScaleConfig, ScaleLimits, load_config};
pub use domains::{AttributeDomains, CategoricalField, NumericField};
pub use error::{Error, Result};
pub use estimate::{Association, CountEstimate, EdgeEstimate, TopologyEstimate, estimate};
pub use graph::{Layer, LayerGraphReport, LayerGraphSummary, build_layer_graph_report, layer_order};
pub use model::{
    AttributeValue, Edge, EdgeType, Entity, EntityId, EntityKind, EntityRef, TopologySnapshot,
};
pub use validation::validate_config;

/// Identity field used for uniqueness constraints on every entity kind.
pub const IDENTITY_FIELD: &str = "id";
