// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation reports.

use std::fmt;

use crate::capabilities::BackendKind;
use crate::config::Layer;
use crate::errors::{DomainError, ProviderError};
use crate::records::Operation;

/// Final status of one domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DomainStatus {
    /// Provider state already matched the configuration
    Converged,
    /// Every planned operation was applied
    Applied,
    /// Dry run: operations were planned, not applied
    Planned,
    /// Validation, compilation or a capability check failed; nothing was fetched or applied
    Invalid,
    /// A provider call failed; remaining operations were abandoned
    Failed,
}

impl DomainStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Applied => "applied",
            Self::Planned => "planned",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }

    /// Returns true for statuses that count as a failed run.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Invalid | Self::Failed)
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation whose provider call failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedOperation {
    pub operation: Operation,
    pub error: ProviderError,
}

/// Outcome of one domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    /// Layer, unknown when the domain is not configured
    pub layer: Option<Layer>,
    /// Backend, unknown when the domain is not configured
    pub backend: Option<BackendKind>,
    pub status: DomainStatus,
    /// Number of desired record sets
    pub desired: usize,
    /// Every operation the diff produced, in apply order
    pub planned: Vec<Operation>,
    /// Operations applied successfully
    pub applied: Vec<Operation>,
    pub failed: Option<FailedOperation>,
    /// Operations never attempted because an earlier call failed
    pub abandoned: Vec<Operation>,
    /// Error that ended the domain, if any
    pub error: Option<DomainError>,
}

impl DomainReport {
    pub(crate) fn new(domain: &str, layer: Option<Layer>, backend: Option<BackendKind>) -> Self {
        Self {
            domain: domain.to_string(),
            layer,
            backend,
            status: DomainStatus::Converged,
            desired: 0,
            planned: Vec::new(),
            applied: Vec::new(),
            failed: None,
            abandoned: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn invalid(mut self, error: DomainError) -> Self {
        self.status = DomainStatus::Invalid;
        self.error = Some(error);
        self
    }

    /// Stable reason of the error that ended the domain.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        self.error.as_ref().map(DomainError::status_reason)
    }
}

impl fmt::Display for DomainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (desired {}, planned {}, applied {}, abandoned {})",
            self.domain,
            self.status,
            self.desired,
            self.planned.len(),
            self.applied.len(),
            self.abandoned.len()
        )?;
        if let Some(error) = &self.error {
            write!(f, " [{}] {error}", error.status_reason())?;
        }
        Ok(())
    }
}

/// Outcome of a whole run, one entry per selected domain in selection order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub domains: Vec<DomainReport>,
}

impl ReconcileReport {
    /// Returns the report of a domain.
    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&DomainReport> {
        self.domains.iter().find(|report| report.domain == domain)
    }

    /// Returns true if any domain is invalid or failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.domains.iter().any(|report| report.status.is_failure())
    }

    /// Total number of operations applied across domains.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.domains.iter().map(|report| report.applied.len()).sum()
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod report_tests;
