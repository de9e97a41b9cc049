// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Diff of a compiled domain against provider records.
//!
//! Only records carrying the domain layer's ownership marker take part in the diff.
//! Records at externally managed owner names are invisible. The result is ordered:
//! creates, then updates, then deletes, each group sorted by key.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::compiler::CompiledDomain;
use crate::config::Layer;
use crate::constants::OWNER_COMMENT_TIME_FORMAT;
use crate::errors::CapabilityError;
use crate::records::{ActualRecord, DesiredRecord, Operation, RecordKey};

/// Ownership marker of a layer and the comment stamped on written records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ownership {
    pub marker: &'static str,
    pub comment: String,
}

impl Ownership {
    /// Builds the ownership of a layer for a run started at `now`.
    ///
    /// The stamped comment is `<marker> <UTC timestamp>`.
    #[must_use]
    pub fn new(layer: Layer, now: DateTime<Utc>) -> Self {
        let marker = layer.owner_marker();
        Self {
            marker,
            comment: format!("{marker} {}", now.format(OWNER_COMMENT_TIME_FORMAT)),
        }
    }

    /// Returns true if the record is owned and not at an externally managed name.
    #[must_use]
    pub fn claims(&self, compiled: &CompiledDomain, record: &ActualRecord) -> bool {
        record.is_owned_by(self.marker) && !compiled.is_external(&record.key.fqdn)
    }
}

/// Checks every desired record of a domain against a provider's capabilities.
///
/// # Errors
///
/// Returns the first [`CapabilityError`] found.
pub fn check_capabilities(
    compiled: &CompiledDomain,
    capabilities: &Capabilities,
    provider: &str,
) -> Result<(), CapabilityError> {
    compiled
        .records
        .iter()
        .try_for_each(|record| capabilities.check_record(provider, &compiled.domain, record))
}

/// Computes the operations that bring the owned provider records of a domain to its
/// desired state.
///
/// # Arguments
///
/// * `compiled` - Desired state of the domain
/// * `actual` - Every record the provider reports for the zone
/// * `capabilities` - Provider capabilities; TTLs are raised to the provider floor
/// * `provider` - Provider name, used in errors
/// * `ownership` - Marker that selects owned records, and the comment to stamp
/// * `force` - Rewrite record sets even when they already match
///
/// # Errors
///
/// Returns a [`CapabilityError`] if a desired record cannot be held by the provider;
/// no operation is produced in that case.
pub fn plan(
    compiled: &CompiledDomain,
    actual: &[ActualRecord],
    capabilities: &Capabilities,
    provider: &str,
    ownership: &Ownership,
    force: bool,
) -> Result<Vec<Operation>, CapabilityError> {
    check_capabilities(compiled, capabilities, provider)?;

    let mut owned: BTreeMap<RecordKey, Vec<ActualRecord>> = BTreeMap::new();
    for record in actual.iter().filter(|r| ownership.claims(compiled, r)) {
        owned.entry(record.key.clone()).or_default().push(record.clone());
    }

    let mut operations = Vec::new();
    for record in &compiled.records {
        let record = DesiredRecord {
            ttl: capabilities.effective_ttl(record.ttl),
            ..record.clone()
        };
        match owned.remove(&record.key) {
            None => operations.push(Operation::Create {
                record,
                comment: ownership.comment.clone(),
            }),
            Some(current) => {
                if force || differs(&record, &current) {
                    operations.push(Operation::Update {
                        record,
                        current,
                        comment: ownership.comment.clone(),
                    });
                }
            }
        }
    }

    operations.extend(
        owned
            .into_iter()
            .map(|(key, current)| Operation::Delete { key, current }),
    );
    operations.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.key().cmp(b.key())));

    debug!(
        domain = %compiled.domain,
        operations = operations.len(),
        "Planned reconciliation"
    );
    Ok(operations)
}

fn differs(desired: &DesiredRecord, current: &[ActualRecord]) -> bool {
    let values: BTreeSet<&str> = current.iter().map(|r| r.value.as_str()).collect();
    current.len() != desired.values.len()
        || values.len() != current.len()
        || !desired.values.iter().all(|v| values.contains(v.as_str()))
        || current.iter().any(|r| r.ttl != desired.ttl)
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod plan_tests;
