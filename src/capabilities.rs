// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider capability model.
//!
//! A pure lookup table from backend kind to what the backend can hold. The validation
//! layer and the reconciler branch on these flags only, never on the backend identity,
//! so a new provider needs a new table entry and an adapter but no change to core logic.
//!
//! | Backend | Lines | Types | Min TTL | Apex CNAME |
//! |---------|-------|-------|---------|------------|
//! | `cloudflare` | no | A, AAAA, CNAME | 1 | yes (flattened) |
//! | `dnspod` | yes | A, AAAA, CNAME | 600 | no |

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::CapabilityError;
use crate::records::{DesiredRecord, RecordType};

/// Backend kinds a domain can be synchronized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Cloudflare DNS (API v4)
    Cloudflare,
    /// DNSPod (Tencent Cloud API 3.0)
    Dnspod,
}

impl BackendKind {
    /// Returns the backend name as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloudflare => "cloudflare",
            Self::Dnspod => "dnspod",
        }
    }

    /// Returns the capability set of this backend.
    #[must_use]
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Cloudflare => Capabilities {
                supports_line: false,
                supported_types: RecordType::ALL.into_iter().collect(),
                min_ttl: 1,
                apex_cname: true,
            },
            Self::Dnspod => Capabilities {
                supports_line: true,
                supported_types: RecordType::ALL.into_iter().collect(),
                min_ttl: 600,
                apex_cname: false,
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider can hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether records may carry a resolution line
    pub supports_line: bool,
    /// Record types the provider accepts
    pub supported_types: BTreeSet<RecordType>,
    /// Lowest TTL the provider accepts; lower desired TTLs are raised to it
    pub min_ttl: u32,
    /// Whether a CNAME may be placed at the zone apex
    pub apex_cname: bool,
}

impl Capabilities {
    /// A capability set that accepts everything.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            supports_line: true,
            supported_types: RecordType::ALL.into_iter().collect(),
            min_ttl: 1,
            apex_cname: true,
        }
    }

    /// Returns true if the provider accepts records of this type.
    #[must_use]
    pub fn supports_type(&self, record_type: RecordType) -> bool {
        self.supported_types.contains(&record_type)
    }

    /// Raises a TTL to the provider's floor.
    #[must_use]
    pub fn effective_ttl(&self, ttl: u32) -> u32 {
        ttl.max(self.min_ttl)
    }

    /// Checks a resolution line request against the capability set.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::UnsupportedLine`] if `line` is set and the provider
    /// has no lines.
    pub fn check_line(
        &self,
        provider: &str,
        fqdn: &str,
        line: Option<&str>,
    ) -> Result<(), CapabilityError> {
        match line {
            Some(line) if !self.supports_line => Err(CapabilityError::UnsupportedLine {
                provider: provider.to_string(),
                fqdn: fqdn.to_string(),
                line: line.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Checks that a desired record can be held by the provider.
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider name, used in error messages
    /// * `apex` - The zone apex the record belongs to
    /// * `record` - The record to check
    ///
    /// # Errors
    ///
    /// Returns the first capability the record exceeds.
    pub fn check_record(
        &self,
        provider: &str,
        apex: &str,
        record: &DesiredRecord,
    ) -> Result<(), CapabilityError> {
        self.check_line(provider, record.fqdn(), record.key.line())?;

        if !self.supports_type(record.record_type()) {
            return Err(CapabilityError::UnsupportedRecordType {
                provider: provider.to_string(),
                fqdn: record.fqdn().to_string(),
                record_type: record.record_type(),
            });
        }

        if record.record_type() == RecordType::CNAME
            && !self.apex_cname
            && record.fqdn().eq_ignore_ascii_case(apex.trim_end_matches('.'))
        {
            return Err(CapabilityError::ApexCname {
                provider: provider.to_string(),
                fqdn: record.fqdn().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod capabilities_tests;
