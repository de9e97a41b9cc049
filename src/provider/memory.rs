// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider.
//!
//! Holds zones in process memory and applies operations the way a real provider
//! would: one record per value, ids assigned on creation, comments stored verbatim.
//! Used for offline planning and by the test suites, which can seed records and
//! inject failures per zone or per owner name.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capabilities::{BackendKind, Capabilities};
use crate::errors::ProviderError;
use crate::records::{normalize_fqdn, ActualRecord, Operation};

use super::credentials::Credentials;
use super::{record_changes, AdapterFactory, ProviderAdapter, RecordChange};

/// Auth bundle key that names an in-memory account
pub const ACCOUNT_KEY: &str = "account";

#[derive(Debug, Default)]
struct State {
    zones: BTreeMap<String, Vec<ActualRecord>>,
    applied: Vec<(String, Operation)>,
    fetches: usize,
    next_id: u64,
    fail_fetch: HashMap<String, ProviderError>,
    fail_apply: HashMap<String, ProviderError>,
}

/// A provider account held in memory.
#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    capabilities: Capabilities,
    state: Mutex<State>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new(name: &str, capabilities: Capabilities) -> Self {
        Self {
            name: name.to_string(),
            capabilities,
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a provider with the capabilities of a real backend.
    #[must_use]
    pub fn for_backend(backend: BackendKind) -> Self {
        Self::new(backend.as_str(), backend.capabilities())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a record to a zone as if it had been created out of band.
    pub fn seed(&self, domain: &str, record: ActualRecord) {
        self.state()
            .zones
            .entry(normalize_fqdn(domain))
            .or_default()
            .push(record);
    }

    /// Current records of a zone.
    #[must_use]
    pub fn records(&self, domain: &str) -> Vec<ActualRecord> {
        self.state()
            .zones
            .get(&normalize_fqdn(domain))
            .cloned()
            .unwrap_or_default()
    }

    /// Every operation applied so far, with its zone, in order.
    #[must_use]
    pub fn applied(&self) -> Vec<(String, Operation)> {
        self.state().applied.clone()
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.state().fetches
    }

    /// Makes every fetch of `domain` fail with `error`.
    pub fn fail_fetch(&self, domain: &str, error: ProviderError) {
        self.state().fail_fetch.insert(normalize_fqdn(domain), error);
    }

    /// Makes every operation on the owner name `fqdn` fail with `error`.
    pub fn fail_operations_on(&self, fqdn: &str, error: ProviderError) {
        self.state().fail_apply.insert(normalize_fqdn(fqdn), error);
    }
}

#[async_trait]
impl ProviderAdapter for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn fetch_actual_records(&self, domain: &str) -> Result<Vec<ActualRecord>, ProviderError> {
        let mut state = self.state();
        let domain = normalize_fqdn(domain);
        if let Some(error) = state.fail_fetch.get(&domain) {
            return Err(error.clone());
        }
        state.fetches += 1;
        Ok(state.zones.get(&domain).cloned().unwrap_or_default())
    }

    async fn apply_operation(&self, domain: &str, operation: &Operation) -> Result<(), ProviderError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let key = operation.key();
        if let Some(error) = state.fail_apply.get(&key.fqdn) {
            return Err(error.clone());
        }

        let (ttl, comment) = match operation {
            Operation::Create { record, comment } | Operation::Update { record, comment, .. } => {
                (record.ttl, Some(comment.clone()))
            }
            Operation::Delete { .. } => (0, None),
        };

        let domain = normalize_fqdn(domain);
        let zone = state.zones.entry(domain.clone()).or_default();
        for change in record_changes(operation) {
            match change {
                RecordChange::Add { value } => {
                    state.next_id += 1;
                    zone.push(ActualRecord::new(
                        format!("mem-{}", state.next_id),
                        &key.fqdn,
                        key.record_type,
                        value,
                        ttl,
                        key.line(),
                        comment.clone(),
                    ));
                }
                RecordChange::Modify { record, value } => {
                    let existing = zone.iter_mut().find(|r| r.id == record.id).ok_or_else(|| {
                        ProviderError::Rejected {
                            provider: self.name.clone(),
                            reason: format!("record {} does not exist", record.id),
                        }
                    })?;
                    existing.value = key.record_type.normalize_value(value);
                    existing.ttl = ttl;
                    existing.comment.clone_from(&comment);
                }
                RecordChange::Remove { record } => {
                    zone.retain(|r| r.id != record.id);
                }
            }
        }
        state.applied.push((domain, operation.clone()));
        Ok(())
    }
}

/// Factory handing out in-memory accounts.
///
/// Accounts are keyed by the `account` entry of the auth bundle, or by the backend
/// name when the bundle has none. Unknown accounts are created on first use with
/// the backend's capabilities and kept for later calls.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    accounts: Mutex<HashMap<String, Arc<MemoryProvider>>>,
}

impl MemoryFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under an account name.
    pub fn register(&self, account: &str, provider: Arc<MemoryProvider>) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.to_string(), provider);
    }

    /// Returns the provider registered under an account name.
    #[must_use]
    pub fn account(&self, account: &str) -> Option<Arc<MemoryProvider>> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned()
    }
}

impl AdapterFactory for MemoryFactory {
    fn create(
        &self,
        backend: BackendKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let account = credentials
            .bundle()
            .get(ACCOUNT_KEY)
            .cloned()
            .unwrap_or_else(|| backend.as_str().to_string());

        let provider = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account)
            .or_insert_with(|| Arc::new(MemoryProvider::for_backend(backend)))
            .clone();
        Ok(provider)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
