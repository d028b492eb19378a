use std::collections::BTreeSet;

use crate::config::ScaleConfig;
use crate::error::{Error, Result};
use crate::estimate::{Association, estimate};

/// Validate scale parameters before any entity is generated.
///
/// This checks:
/// - probabilities and ratios are finite and within [0, 1]
/// - hypervisor names are present and unique
/// - attribute domains are non-empty
/// - every cross product and the expected entity total respect the limits
pub fn validate_config(config: &ScaleConfig) -> Result<()> {
    check_probability("apps_per_vm", config.apps_per_vm)?;
    for (name, value) in config.probabilities.named() {
        check_probability(&format!("probabilities.{name}"), value)?;
    }

    let mut names = BTreeSet::new();
    for name in &config.hypervisors {
        if name.trim().is_empty() {
            return Err(Error::Configuration(
                "hypervisor names must not be blank".to_string(),
            ));
        }
        if !names.insert(name.as_str()) {
            return Err(Error::Configuration(format!(
                "duplicate hypervisor name: {name}"
            )));
        }
    }

    config.attributes.validate()?;

    let hosts = config
        .total_racks()
        .checked_mul(config.hosts_per_rack as u64);
    if hosts.is_none() {
        return Err(Error::Configuration(format!(
            "host population {} x {} x {} overflows",
            config.datacenters, config.racks_per_datacenter, config.hosts_per_rack
        )));
    }

    if config.limits.max_candidate_pairs == 0 || config.limits.max_entities == 0 {
        return Err(Error::Configuration(
            "limits must be greater than zero".to_string(),
        ));
    }

    for association in Association::ALL {
        let candidates = association.candidates(config);
        if candidates > config.limits.max_candidate_pairs {
            return Err(Error::Configuration(format!(
                "{} cross product evaluates {} candidate pairs, above limit {}",
                association.name(),
                candidates,
                config.limits.max_candidate_pairs
            )));
        }
    }

    let expected = estimate(config).expected_entities();
    if expected > config.limits.max_entities as f64 {
        return Err(Error::Configuration(format!(
            "expected {expected:.0} entities, above limit {}",
            config.limits.max_entities
        )));
    }

    Ok(())
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
