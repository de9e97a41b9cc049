// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider adapters.
//!
//! The reconciler talks to DNS providers only through [`ProviderAdapter`]. One adapter
//! instance exists per account and is built by an [`AdapterFactory`]:
//!
//! - [`cloudflare`] - Cloudflare API v4
//! - [`dnspod`] - Tencent Cloud DNSPod API 3.0
//! - [`memory`] - In-memory provider for tests and offline planning
//!
//! Adapters translate an [`Operation`] on a record set into per-record provider calls
//! (see [`record_changes`]) and retry transient HTTP failures themselves.

pub mod cloudflare;
pub mod credentials;
pub mod dnspod;
pub mod memory;
pub mod retry;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::capabilities::{BackendKind, Capabilities};
use crate::constants::APEX_LABEL;
use crate::errors::ProviderError;
use crate::records::{normalize_fqdn, ActualRecord, Operation};

use self::cloudflare::CloudflareAdapter;
use self::credentials::Credentials;
use self::dnspod::DnspodAdapter;
use self::retry::RetryPolicy;

/// A DNS provider account.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// What the provider can hold.
    fn capabilities(&self) -> Capabilities;

    /// Lists the A, AAAA and CNAME records of a zone.
    async fn fetch_actual_records(&self, domain: &str) -> Result<Vec<ActualRecord>, ProviderError>;

    /// Applies one operation to a zone.
    async fn apply_operation(&self, domain: &str, operation: &Operation) -> Result<(), ProviderError>;
}

/// Builds one adapter per account.
pub trait AdapterFactory: Send + Sync {
    /// Creates the adapter for an account.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Credentials`] if the credentials the backend needs
    /// cannot be resolved.
    fn create(
        &self,
        backend: BackendKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;
}

/// Factory for the HTTP adapters of the real providers.
#[derive(Clone, Debug, Default)]
pub struct HttpAdapterFactory {
    retry: RetryPolicy,
}

impl HttpAdapterFactory {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn create(
        &self,
        backend: BackendKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        match backend {
            BackendKind::Cloudflare => Ok(Arc::new(CloudflareAdapter::new(
                &credentials.get("token")?,
                self.retry,
            )?)),
            BackendKind::Dnspod => Ok(Arc::new(DnspodAdapter::new(
                &credentials.get("secret_id")?,
                &credentials.get("secret_key")?,
                self.retry,
            )?)),
        }
    }
}

/// A single provider record change derived from an [`Operation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordChange<'a> {
    /// Create a record with this value
    Add { value: &'a str },
    /// Rewrite an existing record with this value
    Modify {
        record: &'a ActualRecord,
        value: &'a str,
    },
    /// Remove an existing record
    Remove { record: &'a ActualRecord },
}

/// Splits an operation into per-record changes.
///
/// Updates rewrite existing records in place before adding or removing any, so a
/// single-valued CNAME is replaced without a window where it is missing. Records that
/// already hold a desired value are rewritten with that value, which refreshes their
/// TTL and ownership comment.
#[must_use]
pub fn record_changes(operation: &Operation) -> Vec<RecordChange<'_>> {
    match operation {
        Operation::Create { record, .. } => record
            .values
            .iter()
            .map(|value| RecordChange::Add { value })
            .collect(),
        Operation::Update {
            record, current, ..
        } => {
            let mut changes = Vec::new();
            let mut stale = Vec::new();
            let mut kept = BTreeSet::new();
            for actual in current {
                if record.values.contains(&actual.value) && kept.insert(actual.value.as_str()) {
                    changes.push(RecordChange::Modify {
                        record: actual,
                        value: &actual.value,
                    });
                } else {
                    stale.push(actual);
                }
            }

            let mut stale = stale.into_iter();
            let mut additions = Vec::new();
            for value in record.values.iter().filter(|v| !kept.contains(v.as_str())) {
                match stale.next() {
                    Some(actual) => changes.push(RecordChange::Modify {
                        record: actual,
                        value,
                    }),
                    None => additions.push(RecordChange::Add { value }),
                }
            }
            changes.extend(additions);
            changes.extend(stale.map(|record| RecordChange::Remove { record }));
            changes
        }
        Operation::Delete { current, .. } => current
            .iter()
            .map(|record| RecordChange::Remove { record })
            .collect(),
    }
}

/// Returns the label of `fqdn` relative to `domain`, `@` for the apex.
#[must_use]
pub fn relative_label(fqdn: &str, domain: &str) -> String {
    let fqdn = normalize_fqdn(fqdn);
    let domain = normalize_fqdn(domain);
    if fqdn == domain {
        return APEX_LABEL.to_string();
    }
    fqdn.strip_suffix(&format!(".{domain}"))
        .map_or(fqdn.clone(), str::to_string)
}

/// Returns the owner name of a provider label relative to `domain`.
#[must_use]
pub fn absolute_name(label: &str, domain: &str) -> String {
    if label.is_empty() || label == APEX_LABEL {
        normalize_fqdn(domain)
    } else {
        normalize_fqdn(&format!("{label}.{domain}"))
    }
}
