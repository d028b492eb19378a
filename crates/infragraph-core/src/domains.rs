use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::EntityKind;

/// Categorical (entity kind, field) pairs drawn by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoricalField {
    DatacenterRegion,
    HostVendor,
    VmOs,
    ApplicationTier,
    StorageVendor,
    NetworkDeviceType,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 6] = [
        CategoricalField::DatacenterRegion,
        CategoricalField::HostVendor,
        CategoricalField::VmOs,
        CategoricalField::ApplicationTier,
        CategoricalField::StorageVendor,
        CategoricalField::NetworkDeviceType,
    ];

    pub fn kind(self) -> EntityKind {
        match self {
            CategoricalField::DatacenterRegion => EntityKind::Datacenter,
            CategoricalField::HostVendor => EntityKind::Host,
            CategoricalField::VmOs => EntityKind::Vm,
            CategoricalField::ApplicationTier => EntityKind::Application,
            CategoricalField::StorageVendor => EntityKind::StorageArray,
            CategoricalField::NetworkDeviceType => EntityKind::NetworkDevice,
        }
    }

    /// Attribute name written on the entity.
    pub fn name(self) -> &'static str {
        match self {
            CategoricalField::DatacenterRegion => "region",
            CategoricalField::HostVendor | CategoricalField::StorageVendor => "vendor",
            CategoricalField::VmOs => "os",
            CategoricalField::ApplicationTier => "tier",
            CategoricalField::NetworkDeviceType => "type",
        }
    }
}

/// Numeric (entity kind, field) pairs drawn by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericField {
    HostCpu,
    HostMemory,
    VmCpu,
    VmMemory,
}

impl NumericField {
    pub const ALL: [NumericField; 4] = [
        NumericField::HostCpu,
        NumericField::HostMemory,
        NumericField::VmCpu,
        NumericField::VmMemory,
    ];

    pub fn kind(self) -> EntityKind {
        match self {
            NumericField::HostCpu | NumericField::HostMemory => EntityKind::Host,
            NumericField::VmCpu | NumericField::VmMemory => EntityKind::Vm,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NumericField::HostCpu | NumericField::VmCpu => "cpu",
            NumericField::HostMemory | NumericField::VmMemory => "memory",
        }
    }
}

/// Enumerated attribute domains. Every list must be non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AttributeDomains {
    pub datacenter_region: Vec<String>,
    pub host_vendor: Vec<String>,
    pub host_cpu: Vec<i64>,
    pub host_memory: Vec<i64>,
    pub vm_os: Vec<String>,
    pub vm_cpu: Vec<i64>,
    pub vm_memory: Vec<i64>,
    pub application_tier: Vec<String>,
    pub storage_vendor: Vec<String>,
    pub network_device_type: Vec<String>,
}

impl Default for AttributeDomains {
    fn default() -> Self {
        Self {
            datacenter_region: strings(&["APAC", "EMEA", "US"]),
            host_vendor: strings(&["Dell", "HPE", "Lenovo"]),
            host_cpu: vec![32, 48, 64],
            host_memory: vec![128, 256, 512],
            vm_os: strings(&["Linux", "Windows"]),
            vm_cpu: vec![2, 4, 8],
            vm_memory: vec![4, 8, 16],
            application_tier: strings(&["frontend", "backend", "db"]),
            storage_vendor: strings(&["NetApp", "EMC", "Pure"]),
            network_device_type: strings(&["Core", "Distribution", "Access"]),
        }
    }
}

impl AttributeDomains {
    pub fn categorical(&self, field: CategoricalField) -> &[String] {
        match field {
            CategoricalField::DatacenterRegion => &self.datacenter_region,
            CategoricalField::HostVendor => &self.host_vendor,
            CategoricalField::VmOs => &self.vm_os,
            CategoricalField::ApplicationTier => &self.application_tier,
            CategoricalField::StorageVendor => &self.storage_vendor,
            CategoricalField::NetworkDeviceType => &self.network_device_type,
        }
    }

    pub fn numeric(&self, field: NumericField) -> &[i64] {
        match field {
            NumericField::HostCpu => &self.host_cpu,
            NumericField::HostMemory => &self.host_memory,
            NumericField::VmCpu => &self.vm_cpu,
            NumericField::VmMemory => &self.vm_memory,
        }
    }

    /// Reject empty domains and blank categorical values.
    pub fn validate(&self) -> Result<()> {
        for field in CategoricalField::ALL {
            let values = self.categorical(field);
            if values.is_empty() {
                return Err(empty_domain(field.kind(), field.name()));
            }
            if values.iter().any(|value| value.trim().is_empty()) {
                return Err(Error::Configuration(format!(
                    "domain {}.{} contains a blank value",
                    field.kind(),
                    field.name()
                )));
            }
        }
        for field in NumericField::ALL {
            if self.numeric(field).is_empty() {
                return Err(empty_domain(field.kind(), field.name()));
            }
        }
        Ok(())
    }
}

fn empty_domain(kind: EntityKind, field: &str) -> Error {
    Error::Configuration(format!("domain {kind}.{field} must not be empty"))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_domains_are_valid() {
        let domains = AttributeDomains::default();
        domains.validate().expect("defaults validate");
        assert_eq!(domains.numeric(NumericField::HostMemory), &[128, 256, 512]);
        assert_eq!(CategoricalField::NetworkDeviceType.name(), "type");
    }

    #[test]
    fn empty_domain_is_rejected() {
        let domains = AttributeDomains {
            vm_os: Vec::new(),
            ..AttributeDomains::default()
        };
        let err = domains.validate().expect_err("empty domain");
        assert!(err.to_string().contains("VM.os"));
    }
}
