// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record model shared by the compiler, the reconciler and provider adapters.
//!
//! # Types
//!
//! - [`RecordType`] - The record types Tetra manages (A, AAAA, CNAME)
//! - [`RecordKey`] - Diff key `(fqdn, type, line)` with the line normalized to a sentinel
//! - [`DesiredRecord`] - A compiled record set, all values that share one key
//! - [`ActualRecord`] - A single record as reported by a provider
//! - [`Operation`] - A create, update or delete of one record set
//!
//! Values are normalized on construction so that desired and actual records compare
//! equal when they describe the same data: IPv6 literals use their canonical textual
//! form, CNAME targets are lowercase and end with a dot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::constants::DEFAULT_LINE;

/// DNS record types managed by Tetra.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    AAAA,
    /// Canonical name (alias) record
    CNAME,
}

impl RecordType {
    /// All record types, in display order.
    pub const ALL: [RecordType; 3] = [RecordType::A, RecordType::AAAA, RecordType::CNAME];

    /// Returns the wire name of the record type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CNAME => "CNAME",
        }
    }

    /// Infers the record type from a value's shape and returns it with the normalized value.
    ///
    /// IPv4 literals become A records, IPv6 literals become AAAA records, anything else
    /// is treated as a reference name and becomes a CNAME target.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tetra::records::RecordType;
    ///
    /// assert_eq!(RecordType::infer("192.0.2.1"), (RecordType::A, "192.0.2.1".to_string()));
    /// assert_eq!(RecordType::infer("2001:DB8::1"), (RecordType::AAAA, "2001:db8::1".to_string()));
    /// assert_eq!(RecordType::infer("Edge.Example.com"), (RecordType::CNAME, "edge.example.com.".to_string()));
    /// ```
    #[must_use]
    pub fn infer(value: &str) -> (RecordType, String) {
        let value = value.trim();
        match value.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) => (Self::A, addr.to_string()),
            Ok(IpAddr::V6(addr)) => (Self::AAAA, addr.to_string()),
            Err(_) => (Self::CNAME, normalize_target(value)),
        }
    }

    /// Normalizes a provider-reported value of this type.
    ///
    /// Values that fail to parse as the expected address family are returned trimmed
    /// but otherwise untouched, so they still show up as a difference when diffed.
    #[must_use]
    pub fn normalize_value(self, value: &str) -> String {
        let value = value.trim();
        match self {
            Self::A | Self::AAAA => value
                .parse::<IpAddr>()
                .map_or_else(|_| value.to_string(), |addr| addr.to_string()),
            Self::CNAME => normalize_target(value),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::AAAA),
            "CNAME" => Ok(Self::CNAME),
            other => Err(format!("unsupported record type '{other}'")),
        }
    }
}

/// Lowercases a CNAME target and makes it fully qualified.
#[must_use]
pub fn normalize_target(value: &str) -> String {
    let mut target = value.trim().to_ascii_lowercase();
    if !target.ends_with('.') {
        target.push('.');
    }
    target
}

/// Lowercases a record owner name and strips any trailing dot.
#[must_use]
pub fn normalize_fqdn(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Diff key of a record set.
///
/// Records without a resolution line share the [`DEFAULT_LINE`] sentinel, so line-less
/// backends always land in a single bucket per `(fqdn, type)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Fully qualified owner name, lowercase, without trailing dot
    pub fqdn: String,
    /// Record type
    pub record_type: RecordType,
    /// Resolution line, [`DEFAULT_LINE`] when none was requested
    pub line: String,
}

impl RecordKey {
    /// Creates a key, normalizing the owner name and the line.
    #[must_use]
    pub fn new(fqdn: &str, record_type: RecordType, line: Option<&str>) -> Self {
        let line = match line.map(str::trim) {
            None | Some("") => DEFAULT_LINE.to_string(),
            Some(line) => line.to_string(),
        };
        Self {
            fqdn: normalize_fqdn(fqdn),
            record_type,
            line,
        }
    }

    /// Returns the explicit resolution line, or `None` for the default line.
    #[must_use]
    pub fn line(&self) -> Option<&str> {
        if self.line == DEFAULT_LINE {
            None
        } else {
            Some(&self.line)
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.fqdn, self.record_type, self.line)
    }
}

/// A compiled record set: every value requested for one [`RecordKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Diff key
    pub key: RecordKey,
    /// Normalized values, ordered
    pub values: BTreeSet<String>,
    /// Time to live in seconds
    pub ttl: u32,
}

impl DesiredRecord {
    /// Creates a record set from already normalized values.
    #[must_use]
    pub fn new(key: RecordKey, values: BTreeSet<String>, ttl: u32) -> Self {
        Self { key, values, ttl }
    }

    /// Fully qualified owner name.
    #[must_use]
    pub fn fqdn(&self) -> &str {
        &self.key.fqdn
    }

    /// Record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.key.record_type
    }

    /// Values joined for display.
    #[must_use]
    pub fn values_display(&self) -> String {
        self.values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for DesiredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (ttl {})", self.key, self.values_display(), self.ttl)
    }
}

/// A single record as reported by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualRecord {
    /// Provider-assigned record identifier
    pub id: String,
    /// Diff key
    pub key: RecordKey,
    /// Normalized value
    pub value: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// Free-form comment, carries the ownership marker for records Tetra created
    pub comment: Option<String>,
}

impl ActualRecord {
    /// Creates a provider record, normalizing the owner name, line and value.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        fqdn: &str,
        record_type: RecordType,
        value: &str,
        ttl: u32,
        line: Option<&str>,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            key: RecordKey::new(fqdn, record_type, line),
            value: record_type.normalize_value(value),
            ttl,
            comment,
        }
    }

    /// Returns true if the record's comment carries the given ownership marker.
    #[must_use]
    pub fn is_owned_by(&self, marker: &str) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|comment| comment.contains(marker))
    }
}

impl fmt::Display for ActualRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (ttl {}, id {})", self.key, self.value, self.ttl, self.id)
    }
}

/// Kind of an [`Operation`], ordered by apply priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to one record set at a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
    /// Create every value of a record set that does not exist yet
    Create {
        record: DesiredRecord,
        /// Comment to stamp on the created records
        comment: String,
    },
    /// Replace the provider records at a key with the desired record set
    Update {
        record: DesiredRecord,
        /// Provider records currently held at the key
        current: Vec<ActualRecord>,
        /// Comment to stamp on the written records
        comment: String,
    },
    /// Remove every owned provider record at a key
    Delete {
        key: RecordKey,
        /// Provider records to remove
        current: Vec<ActualRecord>,
    },
}

impl Operation {
    /// Key of the record set this operation touches.
    #[must_use]
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::Create { record, .. } | Self::Update { record, .. } => &record.key,
            Self::Delete { key, .. } => key,
        }
    }

    /// Kind of the operation.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { record, .. } => write!(f, "create {record}"),
            Self::Update {
                record, current, ..
            } => {
                let before = current
                    .iter()
                    .map(|r| r.value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "update {record} (was {before})")
            }
            Self::Delete { key, current } => {
                let before = current
                    .iter()
                    .map(|r| r.value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "delete {key} (was {before})")
            }
        }
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
