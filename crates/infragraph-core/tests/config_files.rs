use std::path::Path;

use infragraph_core::{EntityKind, ScaleConfig, estimate, load_config, validate_config};
use schemars::schema_for;

fn config_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs").join(name)
}

#[test]
fn reference_config_matches_defaults() {
    let config = load_config(&config_path("reference.toml")).expect("load reference config");
    validate_config(&config).expect("reference config validates");
    assert_eq!(config, ScaleConfig::default());
}

#[test]
fn small_config_overrides_domains() {
    let config = load_config(&config_path("small.toml")).expect("load small config");
    validate_config(&config).expect("small config validates");

    assert_eq!(config.seed, Some(42));
    assert_eq!(config.attributes.datacenter_region, vec!["EMEA".to_string()]);
    assert_eq!(config.attributes.host_vendor.len(), 3);

    let estimate = estimate(&config);
    assert_eq!(estimate.entity(EntityKind::Host).expected, 32.0);
    assert_eq!(estimate.entity(EntityKind::Vm).expected, 64.0);
}

#[test]
fn json_schema_lists_scale_parameters() {
    let schema = schema_for!(ScaleConfig);
    let json = serde_json::to_value(&schema).expect("serialize generated schema");
    let properties = json
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("schema properties");

    for key in [
        "datacenters",
        "racks_per_datacenter",
        "hosts_per_rack",
        "vms_per_host",
        "apps_per_vm",
        "k8s_nodes",
        "pods_per_node",
        "probabilities",
        "limits",
        "attributes",
    ] {
        assert!(properties.contains_key(key), "missing {key}");
    }
}
