use std::path::{Path, PathBuf};

use infragraph_core::{EntityKind, ScaleConfig};
use infragraph_generate::output::csv::{node_file_name, relationship_file_name};
use infragraph_generate::{
    CsvExportSink, CypherScriptSink, GenerateOptions, GenerationEngine, IdentifierScheme,
    REPORT_FILE,
};

fn temp_out_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("infragraph_{label}_{}", uuid::Uuid::new_v4()))
}

fn config() -> ScaleConfig {
    ScaleConfig {
        seed: Some(12),
        datacenters: 1,
        racks_per_datacenter: 2,
        hosts_per_rack: 4,
        vm_host_limit: 4,
        vms_per_host: 2,
        storage_arrays: 2,
        san_switches: 3,
        network_devices: 5,
        k8s_nodes: 3,
        pods_per_node: 2,
        ..ScaleConfig::default()
    }
}

fn options(out_dir: &Path) -> GenerateOptions {
    GenerateOptions {
        out_dir: out_dir.to_path_buf(),
        batch_size: 25,
        identifiers: IdentifierScheme::Sequential,
        id_prefix: Some("t".to_string()),
        seed: None,
    }
}

#[test]
fn cypher_script_has_one_transaction_per_batch() {
    let out_dir = temp_out_dir("cypher");
    std::fs::create_dir_all(&out_dir).expect("out dir");
    let script_path = out_dir.join("topology.cypher");
    let mut sink = CypherScriptSink::create(&script_path, true).expect("sink");

    let result = GenerationEngine::new(options(&out_dir))
        .run(&config(), &mut sink)
        .expect("generate");
    assert_eq!(result.seed, 12);
    assert_eq!(sink.transactions(), result.report.batches);

    let script = std::fs::read_to_string(&script_path).expect("script");
    assert!(script.starts_with("MATCH (n) DETACH DELETE n;"));
    assert_eq!(
        script.matches("CREATE CONSTRAINT").count(),
        EntityKind::ALL.len()
    );
    assert_eq!(
        script.matches(":begin").count() as u64,
        result.report.batches
    );
    assert_eq!(script.matches(":begin").count(), script.matches(":commit").count());
    assert!(script.contains("'t-dc-0'"));
    assert!(out_dir.join(REPORT_FILE).exists());

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn csv_export_has_one_row_per_entity_and_edge() {
    let out_dir = temp_out_dir("csv_export");
    let export_dir = out_dir.join("import");
    let mut sink = CsvExportSink::create(&export_dir).expect("sink");

    let result = GenerationEngine::new(options(&out_dir))
        .run(&config(), &mut sink)
        .expect("generate");

    for (kind, count) in &result.report.entity_counts {
        let path = export_dir.join(node_file_name(*kind));
        let mut reader = csv::Reader::from_path(&path).expect("node file");
        assert_eq!(reader.records().count() as u64, *count, "{kind}");
    }
    for (edge_type, count) in &result.report.edge_counts {
        let path = export_dir.join(relationship_file_name(*edge_type));
        let mut reader = csv::Reader::from_path(&path).expect("relationship file");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(headers.get(0), Some(":START_ID"));
        assert_eq!(reader.records().count() as u64, *count, "{edge_type}");
    }

    let hosts = std::fs::read_to_string(export_dir.join("nodes_Host.csv")).expect("hosts");
    assert_eq!(
        hosts.lines().next(),
        Some("id:ID,cpu:int,memory:int,vendor,:LABEL")
    );

    let _ = std::fs::remove_dir_all(&out_dir);
}
