// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain graph builder.
//!
//! Turns a validated domain configuration into its desired record set. Bottom-layer
//! domains publish their hosts' expanded names; top-layer domains publish their
//! subdomain groups, resolving unqualified values against the bottom domain.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::config::{DomainConfig, HostConfig, Layer, SubdomainGroup};
use crate::constants::{APEX_LABEL, TTL_TOP_SECS};
use crate::errors::{CompilationError, ConfigValidationError, DomainError, ZoneError};
use crate::records::{normalize_fqdn, DesiredRecord, RecordKey, RecordType};

use super::presentation::{self, Binding};
use super::zones::{self, ZoneSelector};

/// The desired state of one domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledDomain {
    /// Domain name (zone apex)
    pub domain: String,
    pub layer: Layer,
    /// Desired record sets, sorted by key
    pub records: Vec<DesiredRecord>,
    /// Owner names bound to externally managed zones; reconciliation never touches them
    pub external: BTreeSet<String>,
}

impl CompiledDomain {
    /// Returns the record set at a key.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&DesiredRecord> {
        self.records.iter().find(|record| &record.key == key)
    }

    /// Returns true if the owner name is bound to an externally managed zone.
    #[must_use]
    pub fn is_external(&self, fqdn: &str) -> bool {
        self.external.contains(&normalize_fqdn(fqdn))
    }
}

/// Qualifies a label with its domain; `@` denotes the apex.
#[must_use]
pub fn qualify(label: &str, domain: &str) -> String {
    if label == APEX_LABEL {
        normalize_fqdn(domain)
    } else {
        normalize_fqdn(&format!("{label}.{domain}"))
    }
}

/// Returns true if a top-layer value needs the bottom domain appended.
#[must_use]
pub fn needs_bottom(value: &str) -> bool {
    let value = value.trim();
    value.parse::<IpAddr>().is_err() && !value.ends_with('.')
}

#[derive(Debug)]
struct PendingSet {
    source: String,
    values: BTreeSet<String>,
    ttl: u32,
}

/// Accumulates record sets by key, rejecting conflicting contributions.
///
/// Values inserted under the same source accumulate into one set. A second source
/// may only contribute a set identical to the first one.
#[derive(Debug, Default)]
struct RecordSetBuilder {
    sets: BTreeMap<RecordKey, PendingSet>,
}

impl RecordSetBuilder {
    fn insert(&mut self, source: &str, key: RecordKey, value: String, ttl: u32) {
        self.sets
            .entry(key)
            .or_insert_with(|| PendingSet {
                source: source.to_string(),
                values: BTreeSet::new(),
                ttl,
            })
            .values
            .insert(value);
    }

    /// Merges the record sets contributed by one source.
    fn merge(&mut self, contribution: RecordSetBuilder) -> Result<(), CompilationError> {
        for (key, incoming) in contribution.sets {
            match self.sets.get(&key) {
                Some(existing) if existing.values != incoming.values || existing.ttl != incoming.ttl => {
                    return Err(CompilationError::RecordConflict {
                        fqdn: key.fqdn.clone(),
                        record_type: key.record_type,
                        line: key.line.clone(),
                        existing: join(&existing.values),
                        incoming: join(&incoming.values),
                    });
                }
                Some(existing) => {
                    debug!(key = %key, first = %existing.source, second = %incoming.source, "Duplicate record set");
                }
                None => {
                    self.sets.insert(key, incoming);
                }
            }
        }
        Ok(())
    }

    /// Checks the accumulated sets and converts them into desired records.
    ///
    /// Names listed in `external` must not receive records of their own.
    fn finish(self, external: &BTreeSet<String>) -> Result<Vec<DesiredRecord>, CompilationError> {
        if let Some(key) = self.sets.keys().find(|key| external.contains(&key.fqdn)) {
            return Err(CompilationError::ExternalConflict {
                fqdn: key.fqdn.clone(),
            });
        }

        let mut address_owners: BTreeSet<(&str, &str)> = BTreeSet::new();
        for key in self.sets.keys().filter(|k| k.record_type != RecordType::CNAME) {
            address_owners.insert((key.fqdn.as_str(), key.line.as_str()));
        }

        for (key, set) in self.sets.iter().filter(|(k, _)| k.record_type == RecordType::CNAME) {
            if address_owners.contains(&(key.fqdn.as_str(), key.line.as_str())) {
                return Err(CompilationError::CnameCoexistence {
                    fqdn: key.fqdn.clone(),
                    line: key.line.clone(),
                });
            }
            if set.values.len() > 1 {
                let mut values = set.values.iter();
                let existing = values.next().cloned().unwrap_or_default();
                return Err(CompilationError::RecordConflict {
                    fqdn: key.fqdn.clone(),
                    record_type: key.record_type,
                    line: key.line.clone(),
                    existing,
                    incoming: values.cloned().collect::<Vec<_>>().join(", "),
                });
            }
        }

        Ok(self
            .sets
            .into_iter()
            .map(|(key, set)| DesiredRecord::new(key, set.values, set.ttl))
            .collect())
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Compiles a bottom-layer domain.
///
/// # Errors
///
/// Returns a [`DomainError`] if a host fails expansion or two sources conflict.
pub fn compile_bottom(name: &str, domain: &DomainConfig) -> Result<CompiledDomain, DomainError> {
    let mut builder = RecordSetBuilder::default();
    let mut external = BTreeSet::new();

    for host in &domain.hosts {
        for expanded in presentation::expand_host(host)? {
            let fqdn = qualify(&expanded.name, name);
            let ttl = domain.ttl.unwrap_or_else(|| expanded.role.default_ttl());

            let (zone, family) = match expanded.binding {
                Binding::Zone(zone) => (zone, None),
                Binding::ZoneFamily { zone, family } => (zone, Some(family)),
                Binding::Unbound => continue,
            };

            let addresses = match zones::resolve(host, ZoneSelector::Id(zone)) {
                Ok(addresses) => addresses,
                Err(ZoneError::ZoneManagedExternally { .. }) => {
                    debug!(host = %host.name, fqdn = %fqdn, "Name bound to externally managed zone, skipping");
                    external.insert(fqdn);
                    continue;
                }
                Err(ZoneError::ZoneUnresolvable { .. }) => continue,
            };

            let source = source_of(host, &expanded.name);
            let mut contribution = RecordSetBuilder::default();
            for address in addresses
                .iter()
                .filter(|address| family.map_or(true, |family| family.matches(address)))
            {
                let (record_type, value) = RecordType::infer(address);
                contribution.insert(
                    &source,
                    RecordKey::new(&fqdn, record_type, None),
                    value,
                    ttl,
                );
            }
            builder.merge(contribution)?;
        }
    }

    Ok(CompiledDomain {
        domain: normalize_fqdn(name),
        layer: Layer::Bottom,
        records: builder.finish(&external)?,
        external,
    })
}

fn source_of(host: &HostConfig, name: &str) -> String {
    format!("host {} name {name}", host.name)
}

/// Compiles a top-layer domain.
///
/// # Errors
///
/// Returns a [`DomainError`] if an unqualified value has no bottom domain to resolve
/// against or two groups conflict.
pub fn compile_top(name: &str, domain: &DomainConfig) -> Result<CompiledDomain, DomainError> {
    let mut builder = RecordSetBuilder::default();
    let ttl = domain.ttl.unwrap_or(TTL_TOP_SECS);

    for (index, group) in domain.domains.iter().enumerate() {
        let source = format!("group {index}");
        builder.merge(compile_group(name, domain, group, &source, ttl)?)?;
    }

    Ok(CompiledDomain {
        domain: normalize_fqdn(name),
        layer: Layer::Top,
        records: builder.finish(&BTreeSet::new())?,
        external: BTreeSet::new(),
    })
}

fn compile_group(
    name: &str,
    domain: &DomainConfig,
    group: &SubdomainGroup,
    source: &str,
    ttl: u32,
) -> Result<RecordSetBuilder, DomainError> {
    let mut contribution = RecordSetBuilder::default();

    for record in &group.records {
        let value = resolve_value(name, domain, &record.value)?;
        let (record_type, value) = RecordType::infer(&value);
        if record_type != RecordType::CNAME {
            warn!(domain = %name, value = %value, "Top-layer record points at an IP literal");
        }

        for label in &group.names {
            let fqdn = qualify(label, name);
            contribution.insert(
                source,
                RecordKey::new(&fqdn, record_type, record.line.as_deref()),
                value.clone(),
                ttl,
            );
        }
    }

    if let Some(target) = group.names.first() {
        let (_, target) = RecordType::infer(&qualify(target, name));
        for alias in &group.cnames {
            contribution.insert(
                source,
                RecordKey::new(&qualify(alias, name), RecordType::CNAME, None),
                target.clone(),
                ttl,
            );
        }
    }

    Ok(contribution)
}

fn resolve_value(name: &str, domain: &DomainConfig, value: &str) -> Result<String, ConfigValidationError> {
    if !needs_bottom(value) {
        return Ok(value.trim().to_string());
    }
    match &domain.bottom {
        Some(bottom) => Ok(format!("{}.{}.", value.trim(), normalize_fqdn(bottom))),
        None => Err(ConfigValidationError::MissingBottomReference {
            domain: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Compiles a domain according to its layer.
///
/// # Errors
///
/// Returns the first [`DomainError`] raised by the layer's builder.
pub fn compile_domain(name: &str, domain: &DomainConfig) -> Result<CompiledDomain, DomainError> {
    let compiled = match domain.layer {
        Layer::Bottom => compile_bottom(name, domain)?,
        Layer::Top => compile_top(name, domain)?,
    };
    debug!(
        domain = %name,
        layer = %domain.layer,
        records = compiled.records.len(),
        external = compiled.external.len(),
        "Compiled desired record set"
    );
    Ok(compiled)
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod graph_tests;
