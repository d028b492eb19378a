use serde::{Deserialize, Serialize};

use infragraph_core::{Association, EdgeEstimate, Layer, ScaleConfig, estimate, layer_order};

/// Planned generation step for one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerTask {
    pub layer: Layer,
    pub expected_entities: f64,
    pub expected_edges: f64,
    pub candidate_pairs: u64,
}

/// Layers in dependency order, each with its expected size.
pub fn plan_layers(config: &ScaleConfig) -> Vec<LayerTask> {
    let estimate = estimate(config);

    layer_order()
        .into_iter()
        .map(|layer| {
            let expected_entities = layer
                .creates()
                .iter()
                .map(|kind| estimate.entity(*kind).expected)
                .sum();
            let edges: Vec<&EdgeEstimate> = estimate
                .edges
                .iter()
                .filter(|edge| edge_layer(edge) == Some(layer))
                .collect();
            LayerTask {
                layer,
                expected_entities,
                expected_edges: edges.iter().map(|edge| edge.count.expected).sum(),
                candidate_pairs: edges
                    .iter()
                    .filter(|edge| edge.association.is_some())
                    .map(|edge| edge.candidates)
                    .sum(),
            }
        })
        .collect()
}

/// Containment edges belong to the layer creating their child; association
/// edges to the layer that samples them.
fn edge_layer(edge: &EdgeEstimate) -> Option<Layer> {
    match edge.association {
        Some(Association::HostHypervisor) => Some(Layer::Hypervisors),
        Some(Association::SanStorage | Association::HostSan) => Some(Layer::Storage),
        Some(Association::NetworkNetwork | Association::HostNetwork) => Some(Layer::Network),
        Some(Association::VmK8sNode) => Some(Layer::Kubernetes),
        None => Layer::ALL
            .into_iter()
            .find(|layer| layer.creates().contains(&edge.target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_follow_layer_order() {
        let tasks = plan_layers(&ScaleConfig::default());
        let layers: Vec<Layer> = tasks.iter().map(|task| task.layer).collect();
        assert_eq!(layers, layer_order());
    }

    #[test]
    fn every_edge_family_lands_in_an_emitting_layer() {
        let estimate = estimate(&ScaleConfig::default());
        for edge in &estimate.edges {
            let layer = edge_layer(edge).expect("layer for edge");
            assert!(layer.emits().contains(&edge.edge_type), "{layer} {}", edge.edge_type);
        }
    }

    #[test]
    fn default_storage_layer_expectations() {
        let tasks = plan_layers(&ScaleConfig::default());
        let storage = tasks
            .iter()
            .find(|task| task.layer == Layer::Storage)
            .expect("storage task");
        assert_eq!(storage.expected_entities, 50.0);
        assert_eq!(storage.candidate_pairs, 40 * 10 + 800 * 40);
        let expected = 400.0 * 0.3 + 32_000.0 * 0.2;
        assert!((storage.expected_edges - expected).abs() < 1e-6);
    }
}
