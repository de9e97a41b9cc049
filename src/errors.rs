// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Tetra.
//!
//! This module provides specialized error types for:
//! - Semantic validation of the configuration tree
//! - Compilation of the desired record set
//! - Provider capability checks
//! - Zone resolution inside the compiler
//! - Provider adapter calls (authentication, transient failures, rejections)
//!
//! Every error that ends a domain's reconciliation is wrapped in [`DomainError`], which
//! provides a stable status reason used in reports and metric labels.

use thiserror::Error;

use crate::records::RecordType;

/// Errors raised by semantic validation of a domain's configuration.
///
/// These errors are fatal for the offending domain only. Other domains in the same
/// run are still reconciled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Zone 10 (externally managed) carries addresses
    ///
    /// Zone 10 means the host's addresses are maintained outside of Tetra, so it must
    /// be declared with a null value.
    #[error("Host '{host}' declares addresses for zone {zone}, which is externally managed and must be null")]
    ZoneContradiction {
        /// Host name
        host: String,
        /// Offending zone id
        zone: u32,
    },

    /// A zone reserved for future fixed semantics (2-9) carries addresses
    #[error("Host '{host}' populates reserved zone {zone}; zones 2-9 must not carry addresses")]
    ReservedZone {
        /// Host name
        host: String,
        /// Offending zone id
        zone: u32,
    },

    /// Two mid names of one host are current at the same zone
    #[error("Host '{host}' has more than one current mid name at zone {zone}: '{first}' and '{second}'")]
    AmbiguousCurrent {
        /// Host name
        host: String,
        /// Zone both mid names designate
        zone: u32,
        /// First current mid name
        first: String,
        /// Second current mid name
        second: String,
    },

    /// `current` set on a fixed network name
    #[error("Mid name '{name}' on host '{host}' is a fixed network name and cannot be current")]
    CurrentOnFixedName {
        /// Host name
        host: String,
        /// Mid name
        name: String,
    },

    /// A mid name designates a zone the host does not define
    #[error("Mid name '{name}' on host '{host}' designates zone {zone}, which the host does not define")]
    UnknownCurrentZone {
        /// Host name
        host: String,
        /// Mid name
        name: String,
        /// Designated zone
        zone: u32,
    },

    /// Host name declared more than once in one domain
    #[error("Host '{host}' is declared more than once in domain '{domain}'")]
    DuplicateHost {
        /// Domain name
        domain: String,
        /// Host name
        host: String,
    },

    /// A label is used both as a primary name and as a cname alias
    #[error("Label '{label}' in domain '{domain}' is used both as a name and as a cname alias")]
    LabelCollision {
        /// Domain name
        domain: String,
        /// Colliding label
        label: String,
    },

    /// A group declares cname aliases but no names for them to point at
    #[error("Cname alias '{alias}' in domain '{domain}' belongs to a group without names")]
    DanglingAlias {
        /// Domain name
        domain: String,
        /// Alias label
        alias: String,
    },

    /// A record value is not fully qualified and the domain has no bottom reference
    #[error("Record value '{value}' in domain '{domain}' is not fully qualified and the domain has no bottom reference")]
    MissingBottomReference {
        /// Domain name
        domain: String,
        /// Unqualified value
        value: String,
    },

    /// The bottom reference does not resolve to a bottom-layer domain
    #[error("Bottom reference '{bottom}' of domain '{domain}' is invalid: {reason}")]
    InvalidBottomReference {
        /// Domain name
        domain: String,
        /// Referenced bottom domain
        bottom: String,
        /// Why the reference is invalid
        reason: String,
    },

    /// The domain is not part of the configuration
    #[error("Domain '{domain}' is not configured")]
    UnknownDomain {
        /// Domain name
        domain: String,
    },

    /// Children that do not belong to the domain's layer
    #[error("Domain '{domain}' is misconfigured for its layer: {reason}")]
    LayerMismatch {
        /// Domain name
        domain: String,
        /// What is wrong
        reason: String,
    },
}

/// Errors raised while compiling the desired record set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilationError {
    /// Two sources request different values for the same record key
    #[error("Conflicting records for {fqdn} {record_type} [{line}]: '{existing}' vs '{incoming}'")]
    RecordConflict {
        /// Owner name
        fqdn: String,
        /// Record type
        record_type: RecordType,
        /// Resolution line
        line: String,
        /// Values already compiled for the key
        existing: String,
        /// Values that conflict with them
        incoming: String,
    },

    /// A mid name looks like a variant name but its index is not a non-negative integer
    #[error("Malformed presentation name '{name}': {reason}")]
    MalformedPresentationName {
        /// The mid name as configured
        name: String,
        /// Why it is malformed
        reason: String,
    },

    /// A CNAME shares its owner name and line with address records
    #[error("CNAME at {fqdn} [{line}] cannot coexist with other records")]
    CnameCoexistence {
        /// Owner name
        fqdn: String,
        /// Resolution line
        line: String,
    },

    /// A name is bound to the externally managed zone by one host and to addresses by another
    #[error("{fqdn} is externally managed but another binding requests records for it")]
    ExternalConflict {
        /// Owner name
        fqdn: String,
    },
}

/// Errors raised when a desired record exceeds what the target provider supports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The record requests a resolution line but the provider has no lines
    #[error("Provider '{provider}' does not support resolution lines, but {fqdn} requests line '{line}'")]
    UnsupportedLine {
        /// Provider name
        provider: String,
        /// Owner name
        fqdn: String,
        /// Requested line
        line: String,
    },

    /// The provider cannot hold records of this type
    #[error("Provider '{provider}' does not support {record_type} records ({fqdn})")]
    UnsupportedRecordType {
        /// Provider name
        provider: String,
        /// Owner name
        fqdn: String,
        /// Record type
        record_type: RecordType,
    },

    /// The provider cannot hold a CNAME at the zone apex
    #[error("Provider '{provider}' does not allow a CNAME at the zone apex ({fqdn})")]
    ApexCname {
        /// Provider name
        provider: String,
        /// Apex name
        fqdn: String,
    },
}

/// Errors raised by the zone resolver.
///
/// [`ZoneError::ZoneManagedExternally`] is a signal, not a failure: callers skip the
/// selection entirely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// The host does not define the selected zone
    #[error("Host '{host}' does not define zone {zone}")]
    ZoneUnresolvable {
        /// Host name
        host: String,
        /// Selected zone
        zone: u32,
    },

    /// The selected zone is managed outside of Tetra
    #[error("Zone {zone} of host '{host}' is managed externally")]
    ZoneManagedExternally {
        /// Host name
        host: String,
        /// Selected zone
        zone: u32,
    },
}

/// Errors returned by provider adapters.
///
/// The core never retries these. Adapters retry transient HTTP failures themselves
/// before surfacing them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Credentials were rejected by the provider
    ///
    /// Fatal for the whole account: every operation queued on the account is abandoned.
    #[error("Authentication with provider '{provider}' failed: {reason}")]
    Authentication {
        /// Provider name
        provider: String,
        /// Provider message
        reason: String,
    },

    /// Network failure, rate limiting or provider-side error that outlived adapter retries
    #[error("Transient failure from provider '{provider}': {reason}")]
    Transient {
        /// Provider name
        provider: String,
        /// Failure description
        reason: String,
    },

    /// The provider rejected the request (invalid data, missing zone, conflict)
    #[error("Provider '{provider}' rejected the request: {reason}")]
    Rejected {
        /// Provider name
        provider: String,
        /// Provider message
        reason: String,
    },

    /// Credentials could not be resolved from the auth bundle
    #[error("Credentials unavailable: {reason}")]
    Credentials {
        /// What is missing or unreadable
        reason: String,
    },

    /// An earlier authentication failure cancelled the account's queue
    #[error("Account '{account}' was cancelled after an authentication failure: {reason}")]
    AccountCancelled {
        /// Account identifier
        account: String,
        /// The authentication failure that cancelled the account
        reason: String,
    },
}

impl ProviderError {
    /// Returns true if this error must cancel every pending call on the account.
    #[must_use]
    pub fn is_auth_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Credentials { .. })
    }

    /// Returns true if an adapter may retry the failed request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Composite error that ends the reconciliation of one domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Semantic validation failed
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    /// Record compilation failed
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// A desired record exceeds the provider's capabilities
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// A provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl DomainError {
    /// Returns the status reason code for this error.
    ///
    /// Reasons are stable CamelCase identifiers used in reports and metric labels.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Validation(ConfigValidationError::ZoneContradiction { .. }) => {
                "ZoneContradiction"
            }
            Self::Validation(ConfigValidationError::ReservedZone { .. }) => "ReservedZone",
            Self::Validation(ConfigValidationError::AmbiguousCurrent { .. }) => "AmbiguousCurrent",
            Self::Validation(ConfigValidationError::CurrentOnFixedName { .. }) => {
                "CurrentOnFixedName"
            }
            Self::Validation(ConfigValidationError::UnknownCurrentZone { .. }) => {
                "UnknownCurrentZone"
            }
            Self::Validation(ConfigValidationError::DuplicateHost { .. }) => "DuplicateHost",
            Self::Validation(ConfigValidationError::LabelCollision { .. }) => "LabelCollision",
            Self::Validation(ConfigValidationError::DanglingAlias { .. }) => "DanglingAlias",
            Self::Validation(ConfigValidationError::MissingBottomReference { .. }) => {
                "MissingBottomReference"
            }
            Self::Validation(ConfigValidationError::InvalidBottomReference { .. }) => {
                "InvalidBottomReference"
            }
            Self::Validation(ConfigValidationError::UnknownDomain { .. }) => "UnknownDomain",
            Self::Validation(ConfigValidationError::LayerMismatch { .. }) => "LayerMismatch",

            Self::Compilation(CompilationError::RecordConflict { .. }) => "RecordConflict",
            Self::Compilation(CompilationError::MalformedPresentationName { .. }) => {
                "MalformedPresentationName"
            }
            Self::Compilation(CompilationError::CnameCoexistence { .. }) => "CnameCoexistence",
            Self::Compilation(CompilationError::ExternalConflict { .. }) => "ExternalConflict",

            Self::Capability(CapabilityError::UnsupportedLine { .. }) => "UnsupportedLine",
            Self::Capability(CapabilityError::UnsupportedRecordType { .. }) => {
                "UnsupportedRecordType"
            }
            Self::Capability(CapabilityError::ApexCname { .. }) => "ApexCname",

            Self::Provider(ProviderError::Authentication { .. }) => "ProviderAuthenticationFailed",
            Self::Provider(ProviderError::Transient { .. }) => "ProviderUnavailable",
            Self::Provider(ProviderError::Rejected { .. }) => "ProviderRejected",
            Self::Provider(ProviderError::Credentials { .. }) => "CredentialsUnavailable",
            Self::Provider(ProviderError::AccountCancelled { .. }) => "AccountCancelled",
        }
    }

    /// Returns true if the error was found before any provider call was made.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Provider(_))
    }
}
