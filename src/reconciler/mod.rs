// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation engine.
//!
//! For every selected domain: compile the desired record set, check it against the
//! provider's capabilities, fetch the zone through the account queue, diff, and
//! apply the resulting operations one by one.
//!
//! - [`plan`] - Ownership-aware diff producing ordered operations
//! - [`queue`] - Per-account serialization and cancellation
//! - [`report`] - Per-domain outcomes
//!
//! Domains are reconciled concurrently. Calls of one provider account are
//! serialized. A failed call halts its domain and abandons the domain's remaining
//! operations; the engine itself never retries.
//!
//! # Example
//!
//! ```rust,no_run
//! use tetra::config::Configuration;
//! use tetra::provider::HttpAdapterFactory;
//! use tetra::reconciler::{reconcile, ReconcileOptions};
//!
//! async fn run(config: Configuration) {
//!     let options = ReconcileOptions { dry_run: true, ..Default::default() };
//!     let report = reconcile(&config, &HttpAdapterFactory::default(), &options).await;
//!     for domain in &report.domains {
//!         println!("{domain}");
//!     }
//! }
//! ```

pub mod plan;
pub mod queue;
pub mod report;

pub use plan::{check_capabilities, plan, Ownership};
pub use queue::{AccountId, AccountQueue};
pub use report::{DomainReport, DomainStatus, FailedOperation, ReconcileReport};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::compiler;
use crate::config::Configuration;
use crate::errors::{ConfigValidationError, DomainError, ProviderError};
use crate::metrics;
use crate::provider::credentials::Credentials;
use crate::provider::AdapterFactory;

/// Options of a reconciliation run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Plan and report operations without applying them
    pub dry_run: bool,
    /// Rewrite owned record sets even when they already match
    pub force: bool,
    /// Domains to reconcile; empty selects every configured domain
    pub domains: Vec<String>,
}

/// Reconciles the selected domains of a configuration.
///
/// Bottom references are resolved against the whole configuration, so a top domain
/// can be selected without its bottom domain. Unknown selected domains are reported
/// as invalid.
pub async fn reconcile(
    config: &Configuration,
    factory: &dyn AdapterFactory,
    options: &ReconcileOptions,
) -> ReconcileReport {
    let now = Utc::now();
    let selected = config.select(&options.domains);

    let mut queues: BTreeMap<AccountId, Arc<AccountQueue>> = BTreeMap::new();
    for name in &selected {
        let Some(domain) = config.domains.get(*name) else {
            continue;
        };
        let credentials = Credentials::new(domain.auth.clone());
        let id = AccountId::new(domain.backend, &credentials);
        queues.entry(id.clone()).or_insert_with(|| {
            debug!(account = %id, "Creating provider adapter");
            Arc::new(AccountQueue::new(id, factory.create(domain.backend, &credentials)))
        });
    }

    info!(
        domains = selected.len(),
        accounts = queues.len(),
        dry_run = options.dry_run,
        force = options.force,
        "Starting reconciliation"
    );

    let tasks = selected.iter().map(|name| {
        let queue = config.domains.get(*name).map(|domain| {
            let id = AccountId::new(domain.backend, &Credentials::new(domain.auth.clone()));
            queues.get(&id).cloned()
        });
        reconcile_domain(name, config, queue.flatten(), options, now)
    });
    let domains = futures::future::join_all(tasks).await;

    let report = ReconcileReport { domains };
    info!(
        domains = report.domains.len(),
        applied = report.applied_count(),
        failures = report.has_failures(),
        "Reconciliation finished"
    );
    report
}

async fn reconcile_domain(
    name: &str,
    config: &Configuration,
    queue: Option<Arc<AccountQueue>>,
    options: &ReconcileOptions,
    now: DateTime<Utc>,
) -> DomainReport {
    let start = Instant::now();
    let report = run_domain(name, config, queue, options, now).await;

    match &report.error {
        Some(e) if e.is_configuration_error() => {
            warn!(domain = name, reason = e.status_reason(), error = %e, "Domain configuration rejected");
        }
        Some(e) => {
            error!(
                domain = name,
                reason = e.status_reason(),
                error = %e,
                applied = report.applied.len(),
                abandoned = report.abandoned.len(),
                "Domain reconciliation failed"
            );
        }
        None => {
            info!(
                domain = name,
                status = %report.status,
                planned = report.planned.len(),
                applied = report.applied.len(),
                "Domain reconciled"
            );
        }
    }
    metrics::record_domain_reconciliation(name, report.status.as_str(), start.elapsed());
    report
}

async fn run_domain(
    name: &str,
    config: &Configuration,
    queue: Option<Arc<AccountQueue>>,
    options: &ReconcileOptions,
    now: DateTime<Utc>,
) -> DomainReport {
    let Some(domain) = config.domains.get(name) else {
        let error = ConfigValidationError::UnknownDomain {
            domain: name.to_string(),
        };
        return DomainReport::new(name, None, None).invalid(error.into());
    };
    let mut report = DomainReport::new(name, Some(domain.layer), Some(domain.backend));

    let compiled = match compiler::compile(name, config) {
        Ok(compiled) => compiled,
        Err(e) => return report.invalid(e),
    };
    report.desired = compiled.records.len();
    metrics::record_desired_records(name, compiled.records.len());

    let Some(queue) = queue else {
        let error = ProviderError::Credentials {
            reason: format!("no provider account for domain {name}"),
        };
        return report.invalid(error.into());
    };

    let capabilities = queue.capabilities();
    if let Err(e) = check_capabilities(&compiled, &capabilities, queue.provider_name()) {
        return report.invalid(e.into());
    }

    let actual = match queue
        .run(|adapter| async move { adapter.fetch_actual_records(name).await })
        .await
    {
        Ok(actual) => actual,
        Err(e) => {
            report.status = DomainStatus::Failed;
            report.error = Some(e.into());
            return report;
        }
    };
    debug!(domain = name, actual = actual.len(), "Fetched provider records");

    let ownership = Ownership::new(domain.layer, now);
    let operations = match plan(
        &compiled,
        &actual,
        &capabilities,
        queue.provider_name(),
        &ownership,
        options.force,
    ) {
        Ok(operations) => operations,
        Err(e) => return report.invalid(DomainError::from(e)),
    };
    for operation in &operations {
        metrics::record_operation(name, operation.kind().as_str(), "planned");
    }
    report.planned.clone_from(&operations);

    if operations.is_empty() {
        report.status = DomainStatus::Converged;
        return report;
    }
    if options.dry_run {
        for operation in &operations {
            info!(domain = name, operation = %operation, "Planned operation (dry run)");
        }
        report.status = DomainStatus::Planned;
        return report;
    }

    report.status = DomainStatus::Applied;
    for (index, operation) in operations.iter().enumerate() {
        let result = queue
            .run(|adapter| async move { adapter.apply_operation(name, operation).await })
            .await;

        match result {
            Ok(()) => {
                metrics::record_operation(name, operation.kind().as_str(), "applied");
                report.applied.push(operation.clone());
            }
            Err(e) => {
                let remaining = if matches!(e, ProviderError::AccountCancelled { .. }) {
                    &operations[index..]
                } else {
                    metrics::record_operation(name, operation.kind().as_str(), "failed");
                    report.failed = Some(FailedOperation {
                        operation: operation.clone(),
                        error: e.clone(),
                    });
                    &operations[index + 1..]
                };
                for abandoned in remaining {
                    metrics::record_operation(name, abandoned.kind().as_str(), "abandoned");
                }
                report.abandoned = remaining.to_vec();
                report.status = DomainStatus::Failed;
                report.error = Some(e.into());
                break;
            }
        }
    }
    report
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
