use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domains::AttributeDomains;
use crate::error::{Error, Result};

/// Scale parameters for a generation run.
///
/// Every downstream count is a function of these values; components read
/// them and never embed their own constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleConfig {
    /// Fixed seed for reproducible runs. A seed is drawn when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub datacenters: u32,
    pub racks_per_datacenter: u32,
    pub hosts_per_rack: u32,
    /// Fixed hypervisor set; one entity is created per name.
    pub hypervisors: Vec<String>,
    /// Upper bound on the number of hosts that receive VMs.
    pub vm_host_limit: u32,
    pub vms_per_host: u32,
    /// Bernoulli mean for creating one application per VM.
    pub apps_per_vm: f64,
    pub storage_arrays: u32,
    pub san_switches: u32,
    pub network_devices: u32,
    pub k8s_nodes: u32,
    pub pods_per_node: u32,
    pub probabilities: EdgeProbabilities,
    pub limits: ScaleLimits,
    pub attributes: AttributeDomains,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            seed: None,
            datacenters: 2,
            racks_per_datacenter: 20,
            hosts_per_rack: 20,
            hypervisors: vec!["VMware".to_string(), "Hyper-V".to_string()],
            vm_host_limit: 800,
            vms_per_host: 10,
            apps_per_vm: 0.5,
            storage_arrays: 10,
            san_switches: 40,
            network_devices: 120,
            k8s_nodes: 1000,
            pods_per_node: 4,
            probabilities: EdgeProbabilities::default(),
            limits: ScaleLimits::default(),
            attributes: AttributeDomains::default(),
        }
    }
}

/// Per-pair trial probabilities for association edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeProbabilities {
    /// Host RUNS_ON Hypervisor.
    pub host_hypervisor: f64,
    /// SanSwitch CONNECTED_TO StorageArray.
    pub san_storage: f64,
    /// Host CONNECTED_TO SanSwitch.
    pub host_san: f64,
    /// NetworkDevice CONNECTED_TO NetworkDevice, distinct ordered pairs.
    pub network_network: f64,
    /// Host CONNECTED_TO NetworkDevice.
    pub host_network: f64,
    /// Bernoulli mean for creating one service per pod.
    pub pod_service: f64,
    /// VM RUNS_NODE K8sNode.
    pub vm_k8s_node: f64,
}

impl Default for EdgeProbabilities {
    fn default() -> Self {
        Self {
            host_hypervisor: 0.5,
            san_storage: 0.3,
            host_san: 0.2,
            network_network: 0.05,
            host_network: 0.1,
            pod_service: 0.3,
            vm_k8s_node: 0.2,
        }
    }
}

impl EdgeProbabilities {
    /// Named view used by validation and reporting.
    pub fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("host_hypervisor", self.host_hypervisor),
            ("san_storage", self.san_storage),
            ("host_san", self.host_san),
            ("network_network", self.network_network),
            ("host_network", self.host_network),
            ("pod_service", self.pod_service),
            ("vm_k8s_node", self.vm_k8s_node),
        ]
    }
}

/// Sanity limits that guard against runaway cross products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleLimits {
    /// Maximum candidate pairs evaluated for a single cross product.
    pub max_candidate_pairs: u64,
    /// Maximum expected entity total for the run.
    pub max_entities: u64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            max_candidate_pairs: 50_000_000,
            max_entities: 5_000_000,
        }
    }
}

impl ScaleConfig {
    pub fn total_racks(&self) -> u64 {
        (self.datacenters as u64).saturating_mul(self.racks_per_datacenter as u64)
    }

    pub fn total_hosts(&self) -> u64 {
        self.total_racks().saturating_mul(self.hosts_per_rack as u64)
    }

    /// Number of hosts selected to receive VMs.
    pub fn vm_hosts(&self) -> u64 {
        self.total_hosts().min(self.vm_host_limit as u64)
    }

    pub fn total_vms(&self) -> u64 {
        self.vm_hosts().saturating_mul(self.vms_per_host as u64)
    }

    pub fn total_pods(&self) -> u64 {
        (self.k8s_nodes as u64).saturating_mul(self.pods_per_node as u64)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| Error::Parse(err.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| Error::Parse(err.to_string()))
    }
}

/// Load a scale configuration from a `.toml` or `.json` file.
pub fn load_config(path: &Path) -> Result<ScaleConfig> {
    let raw = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => ScaleConfig::from_toml_str(&raw),
        Some("json") => ScaleConfig::from_json_str(&raw),
        _ => Err(Error::Configuration(format!(
            "unsupported config format: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ScaleConfig::from_toml_str(
            r#"
            seed = 7
            datacenters = 1
            apps_per_vm = 1.0

            [probabilities]
            host_san = 0.0
            "#,
        )
        .expect("parse toml");

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.datacenters, 1);
        assert_eq!(config.racks_per_datacenter, 20);
        assert_eq!(config.probabilities.host_san, 0.0);
        assert_eq!(config.probabilities.san_storage, 0.3);
    }

    #[test]
    fn negative_count_is_a_parse_error() {
        let err = ScaleConfig::from_toml_str("datacenters = -1").expect_err("negative count");
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ScaleConfig::from_json_str(r#"{"datacentres": 3}"#).expect_err("typo");
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn vm_hosts_is_bounded_by_host_count() {
        let config = ScaleConfig {
            datacenters: 1,
            racks_per_datacenter: 2,
            hosts_per_rack: 3,
            vm_host_limit: 800,
            ..ScaleConfig::default()
        };
        assert_eq!(config.total_hosts(), 6);
        assert_eq!(config.vm_hosts(), 6);
        assert_eq!(ScaleConfig::default().vm_hosts(), 800);
    }
}
