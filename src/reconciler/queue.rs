// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-account call queues.
//!
//! Every adapter call of an account goes through the account's queue, so calls of
//! one account never overlap while different accounts proceed in parallel. An
//! authentication-fatal failure cancels the queue: every later call on the account,
//! from any domain, fails with [`ProviderError::AccountCancelled`] without reaching
//! the provider.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::capabilities::{BackendKind, Capabilities};
use crate::errors::ProviderError;
use crate::provider::credentials::Credentials;
use crate::provider::ProviderAdapter;

/// Identity of a provider account: backend plus credential fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId {
    pub backend: BackendKind,
    pub fingerprint: String,
}

impl AccountId {
    #[must_use]
    pub fn new(backend: BackendKind, credentials: &Credentials) -> Self {
        Self {
            backend,
            fingerprint: credentials.fingerprint(),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.fingerprint)
    }
}

/// Serializes the adapter calls of one account.
pub struct AccountQueue {
    id: AccountId,
    adapter: Result<Arc<dyn ProviderAdapter>, ProviderError>,
    /// Queue lock; holds the cancellation reason once the account is cancelled
    cancelled: Mutex<Option<String>>,
}

impl AccountQueue {
    /// Creates the queue of an account.
    ///
    /// `adapter` is the result of building the account's adapter; a failure is
    /// reported by the first call and cancels the account.
    #[must_use]
    pub fn new(id: AccountId, adapter: Result<Arc<dyn ProviderAdapter>, ProviderError>) -> Self {
        Self {
            id,
            adapter,
            cancelled: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Capabilities of the account's provider.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match &self.adapter {
            Ok(adapter) => adapter.capabilities(),
            Err(_) => self.id.backend.capabilities(),
        }
    }

    /// Provider name used in errors.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        match &self.adapter {
            Ok(adapter) => adapter.name(),
            Err(_) => self.id.backend.as_str(),
        }
    }

    /// Runs one adapter call in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AccountCancelled`] if the account was cancelled before
    /// the call got its turn, or the call's own error.
    pub async fn run<T, F, Fut>(&self, call: F) -> Result<T, ProviderError>
    where
        F: FnOnce(Arc<dyn ProviderAdapter>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut cancelled = self.cancelled.lock().await;
        if let Some(reason) = cancelled.as_ref() {
            return Err(ProviderError::AccountCancelled {
                account: self.id.to_string(),
                reason: reason.clone(),
            });
        }

        let result = match &self.adapter {
            Ok(adapter) => call(Arc::clone(adapter)).await,
            Err(e) => Err(e.clone()),
        };

        if let Err(e) = &result {
            if e.is_auth_fatal() {
                warn!(account = %self.id, error = %e, "Cancelling account queue");
                *cancelled = Some(e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
