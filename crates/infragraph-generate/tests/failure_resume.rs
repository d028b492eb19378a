use std::path::PathBuf;

use infragraph_core::{EntityKind, Layer, ScaleConfig};
use infragraph_generate::{
    GenerateOptions, GenerationEngine, GenerationError, GenerationReport, IdentifierScheme,
    InMemoryGraphStore, REPORT_FILE, RESOLVED_CONFIG_FILE, SinkError, TopologyBuilder,
};

fn temp_out_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("infragraph_{label}_{}", uuid::Uuid::new_v4()))
}

fn small() -> ScaleConfig {
    ScaleConfig {
        datacenters: 2,
        racks_per_datacenter: 3,
        hosts_per_rack: 4,
        vm_host_limit: 10,
        vms_per_host: 3,
        storage_arrays: 3,
        san_switches: 5,
        network_devices: 8,
        k8s_nodes: 6,
        pods_per_node: 3,
        ..ScaleConfig::default()
    }
}

fn builder(seed: u64, batch_size: usize) -> TopologyBuilder {
    TopologyBuilder::seeded(small(), seed, IdentifierScheme::Uuid.allocator(None), batch_size)
        .expect("builder")
}

#[test]
fn resume_matches_uninterrupted_run() {
    let mut reference = InMemoryGraphStore::new();
    builder(21, 16)
        .build(&mut reference)
        .expect("uninterrupted build");

    let mut store = InMemoryGraphStore::new();
    store.inject_outage_after(7);
    let mut interrupted = builder(21, 16);
    let err = interrupted.build(&mut store).expect_err("injected outage");
    let GenerationError::Layer(failure) = err else {
        panic!("expected a layer failure");
    };
    assert!(matches!(failure.source, SinkError::BackendUnavailable(_)));
    let completed: usize = interrupted
        .reports()
        .iter()
        .map(|report| report.operations as usize)
        .sum();
    let stored = store.entities().len() + store.edges().len();
    assert_eq!(failure.committed, stored - completed);
    assert_eq!(interrupted.pending_layer(), Some(failure.layer));

    interrupted.resume(&mut store).expect("resume");
    assert!(interrupted.is_complete());
    assert_eq!(store.entities(), reference.entities());
    assert_eq!(store.edges(), reference.edges());
}

#[test]
fn rerun_into_unreset_store_violates_uniqueness() {
    let mut store = InMemoryGraphStore::new();
    builder(5, 100).build(&mut store).expect("first run");
    let committed = store.entities().len();

    let err = builder(5, 100)
        .build(&mut store)
        .expect_err("same seed, same identifiers");
    let GenerationError::Layer(failure) = err else {
        panic!("expected a layer failure");
    };
    assert_eq!(failure.layer, Layer::Datacenters);
    assert_eq!(failure.batch, 0);
    assert_eq!(failure.operation_index, 0);
    assert_eq!(failure.committed, 0);
    assert!(matches!(
        failure.source,
        SinkError::ConstraintViolation {
            kind: EntityKind::Datacenter,
            ..
        }
    ));
    assert_eq!(store.entities().len(), committed);

    store.clear();
    builder(5, 100).build(&mut store).expect("run after reset");
    assert_eq!(store.entities().len(), committed);
}

#[test]
fn engine_records_failure_in_report() {
    let out_dir = temp_out_dir("engine_failure");
    let options = GenerateOptions {
        out_dir: out_dir.clone(),
        batch_size: 10,
        seed: Some(8),
        ..GenerateOptions::default()
    };
    let mut store = InMemoryGraphStore::new();
    store.inject_outage_after(3);

    let err = GenerationEngine::new(options)
        .run(&small(), &mut store)
        .expect_err("outage");
    assert!(matches!(err, GenerationError::Layer(_)));

    let raw = std::fs::read_to_string(out_dir.join(REPORT_FILE)).expect("report");
    let report: GenerationReport = serde_json::from_str(&raw).expect("parse report");
    assert_eq!(report.seed, 8);
    let failure = report.failure.expect("failure recorded");
    assert_eq!(failure.code, "backend_unavailable");
    assert!(failure.layer.is_some());
    assert!(failure.operation.is_some());

    let resolved = std::fs::read_to_string(out_dir.join(RESOLVED_CONFIG_FILE)).expect("config");
    let resolved: ScaleConfig = serde_json::from_str(&resolved).expect("parse config");
    assert_eq!(resolved.seed, Some(8));

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn engine_rejects_invalid_configuration_before_generating() {
    let out_dir = temp_out_dir("engine_invalid");
    let options = GenerateOptions {
        out_dir: out_dir.clone(),
        ..GenerateOptions::default()
    };
    let mut config = small();
    config.probabilities.host_network = 2.0;
    let mut store = InMemoryGraphStore::new();

    let err = GenerationEngine::new(options)
        .run(&config, &mut store)
        .expect_err("invalid probability");
    assert!(matches!(err, GenerationError::Config(_)));
    assert!(store.entities().is_empty());
    assert!(store.constraints().is_empty());

    let _ = std::fs::remove_dir_all(&out_dir);
}
