// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Semantic validation of domain configurations.
//!
//! Runs before compilation and rejects configurations that parse but contradict the
//! domain model. A failure is fatal for the offending domain only.

use std::collections::BTreeSet;

use crate::config::{Configuration, DomainConfig, HostConfig, Layer};
use crate::constants::ZONE_EXTERNAL;
use crate::errors::{ConfigValidationError, DomainError};
use crate::records::normalize_fqdn;

use super::graph::{needs_bottom, qualify};
use super::presentation::{self, PresentationName};
use super::zones;

/// Validates one domain of a configuration.
///
/// # Arguments
///
/// * `name` - Domain name
/// * `domain` - The domain's configuration
/// * `config` - The whole configuration, used to resolve the bottom reference
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_domain(name: &str, domain: &DomainConfig, config: &Configuration) -> Result<(), DomainError> {
    check_layer_children(name, domain)?;

    match domain.layer {
        Layer::Bottom => validate_bottom(name, domain),
        Layer::Top => validate_top(name, domain, config),
    }
}

fn check_layer_children(name: &str, domain: &DomainConfig) -> Result<(), ConfigValidationError> {
    let mismatch = |reason: &str| ConfigValidationError::LayerMismatch {
        domain: name.to_string(),
        reason: reason.to_string(),
    };

    match domain.layer {
        Layer::Bottom => {
            if !domain.domains.is_empty() || domain.domains_from_exec.is_some() {
                return Err(mismatch("a bottom domain cannot declare subdomain groups"));
            }
            if domain.bottom.is_some() {
                return Err(mismatch("a bottom domain cannot reference another bottom domain"));
            }
        }
        Layer::Top => {
            if !domain.hosts.is_empty() || domain.hosts_from_exec.is_some() {
                return Err(mismatch("a top domain cannot declare hosts"));
            }
        }
    }
    Ok(())
}

fn validate_bottom(name: &str, domain: &DomainConfig) -> Result<(), DomainError> {
    let mut seen = BTreeSet::new();
    for host in &domain.hosts {
        if !seen.insert(host.name.as_str()) {
            return Err(ConfigValidationError::DuplicateHost {
                domain: name.to_string(),
                host: host.name.clone(),
            }
            .into());
        }
        validate_host(host)?;
    }
    Ok(())
}

/// Validates the zones and mid names of one host.
///
/// # Errors
///
/// Returns the first zone or mid name violation of the host.
pub fn validate_host(host: &HostConfig) -> Result<(), DomainError> {
    for (zone, addresses) in host.addresses.iter() {
        if addresses.is_none() {
            continue;
        }
        if zone == ZONE_EXTERNAL {
            return Err(ConfigValidationError::ZoneContradiction {
                host: host.name.clone(),
                zone,
            }
            .into());
        }
        if zones::is_reserved(zone) {
            return Err(ConfigValidationError::ReservedZone {
                host: host.name.clone(),
                zone,
            }
            .into());
        }
    }

    for mid_name in &host.mid_names {
        PresentationName::parse(&mid_name.name)?;
        if let Some(zone) = mid_name.current_zone {
            if !host.addresses.contains(zone) {
                return Err(ConfigValidationError::UnknownCurrentZone {
                    host: host.name.clone(),
                    name: mid_name.name.clone(),
                    zone,
                }
                .into());
            }
        }
    }

    presentation::check_current(host)
}

fn validate_top(name: &str, domain: &DomainConfig, config: &Configuration) -> Result<(), DomainError> {
    if let Some(bottom) = &domain.bottom {
        check_bottom_reference(name, bottom, config)?;
    }

    let mut labels = BTreeSet::new();
    for group in &domain.domains {
        if group.names.is_empty() {
            if let Some(alias) = group.cnames.first() {
                return Err(ConfigValidationError::DanglingAlias {
                    domain: name.to_string(),
                    alias: alias.clone(),
                }
                .into());
            }
        }
        labels.extend(group.names.iter().map(|label| qualify(label, name)));
    }

    for alias in domain.domains.iter().flat_map(|group| &group.cnames) {
        if labels.contains(&qualify(alias, name)) {
            return Err(ConfigValidationError::LabelCollision {
                domain: name.to_string(),
                label: alias.clone(),
            }
            .into());
        }
    }

    let capabilities = domain.backend.capabilities();
    for group in &domain.domains {
        for record in &group.records {
            if domain.bottom.is_none() && needs_bottom(&record.value) {
                return Err(ConfigValidationError::MissingBottomReference {
                    domain: name.to_string(),
                    value: record.value.clone(),
                }
                .into());
            }
            for label in &group.names {
                capabilities.check_line(
                    domain.backend.as_str(),
                    &qualify(label, name),
                    record.line.as_deref().filter(|line| !line.trim().is_empty()),
                )?;
            }
        }
    }

    Ok(())
}

fn check_bottom_reference(name: &str, bottom: &str, config: &Configuration) -> Result<(), ConfigValidationError> {
    let invalid = |reason: &str| ConfigValidationError::InvalidBottomReference {
        domain: name.to_string(),
        bottom: bottom.to_string(),
        reason: reason.to_string(),
    };

    let target = config
        .domains
        .iter()
        .find(|(candidate, _)| normalize_fqdn(candidate) == normalize_fqdn(bottom))
        .map(|(_, domain)| domain)
        .ok_or_else(|| invalid("no such domain is configured"))?;

    if target.layer != Layer::Bottom {
        return Err(invalid("the referenced domain is not a bottom-layer domain"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
