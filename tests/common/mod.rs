// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tetra::capabilities::BackendKind;
use tetra::config::Configuration;
use tetra::errors::ProviderError;
use tetra::provider::memory::{MemoryFactory, MemoryProvider};
use tetra::records::{ActualRecord, Operation, OperationKind, RecordType};
use tetra::reconciler::{reconcile, ReconcileOptions, ReconcileReport};

/// Bottom domain shared by the scenarios
pub const BOTTOM: &str = r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  auth: { account: infra }
  hosts:
    - name: h1
      addresses:
        0: [1.1.1.1, "::1"]
        1: [2.2.2.2]
      mid_names:
        - { name: cn0-v0, current: true, current_zone: 0 }
"#;

/// Parse a configuration or fail the test
pub fn load(yaml: &str) -> Configuration {
    Configuration::from_yaml_str(yaml).expect("test configuration should parse")
}

/// A factory with one pre-registered in-memory account per name
pub fn factory_with(accounts: &[(&str, BackendKind)]) -> (MemoryFactory, Vec<Arc<MemoryProvider>>) {
    let factory = MemoryFactory::new();
    let providers = accounts
        .iter()
        .map(|(name, backend)| {
            let provider = Arc::new(MemoryProvider::for_backend(*backend));
            factory.register(name, Arc::clone(&provider));
            provider
        })
        .collect();
    (factory, providers)
}

/// Reconcile every domain with default options
pub async fn run(config: &Configuration, factory: &MemoryFactory) -> ReconcileReport {
    reconcile(config, factory, &ReconcileOptions::default()).await
}

/// Kinds of the operations planned for a domain
pub fn planned_kinds(report: &ReconcileReport, domain: &str) -> Vec<OperationKind> {
    report
        .get(domain)
        .map(|d| d.planned.iter().map(Operation::kind).collect())
        .unwrap_or_default()
}

/// A record created out of band, without an ownership marker
pub fn foreign(id: &str, fqdn: &str, value: &str) -> ActualRecord {
    ActualRecord::new(id, fqdn, RecordType::A, value, 300, None, Some("managed by hand".to_string()))
}

pub fn auth_failure() -> ProviderError {
    ProviderError::Authentication {
        provider: "cloudflare".to_string(),
        reason: "Invalid API Token".to_string(),
    }
}

pub fn outage() -> ProviderError {
    ProviderError::Transient {
        provider: "cloudflare".to_string(),
        reason: "HTTP 503".to_string(),
    }
}
