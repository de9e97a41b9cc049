// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Presentation name expansion.
//!
//! A mid name of the form `<base>-v<N>` is a variable presentation name. It expands
//! into a fixed family of variant names, each bound to a zone (or a zone filtered by
//! address family) of its host:
//!
//! | Name | Binding |
//! |------|---------|
//! | `B-vN` | custom zone `N` if the host defines it, otherwise unbound |
//! | `B-vN-ext` | zone 1 |
//! | `B-vN-ip4` | IPv4 members of zone 0 |
//! | `B-vN-ip6` | IPv6 members of zone 0 |
//! | `B-vN-<z>` | custom zone `z`, one per custom zone the host defines |
//! | `B` | the `current_zone`, only when the mid name is current |
//!
//! Any other mid name is a fixed network name bound to its `current_zone`.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{HostConfig, MidName};
use crate::constants::{
    SUFFIX_IPV4, SUFFIX_IPV6, SUFFIX_PROXIED, TTL_NETWORK_SECS, TTL_PRESENTATION_SECS,
    VARIANT_SEPARATOR, ZONE_NATIVE, ZONE_PROXIED,
};
use crate::errors::{CompilationError, ConfigValidationError, DomainError};

use super::zones::{self, AddressFamily};

/// A parsed mid name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationName {
    /// `<base>-v<index>`
    Variable {
        /// Canonical base name
        base: String,
        /// Variant index
        index: u32,
    },
    /// Any name without a variant suffix
    Fixed,
}

impl PresentationName {
    /// Parses a mid name.
    ///
    /// The last `-`-separated segment decides: `v` followed by a digit must be a valid
    /// non-negative 32-bit index, a bare `v` is malformed, anything else (`dev-vpn`)
    /// is a fixed name.
    ///
    /// # Errors
    ///
    /// Returns [`CompilationError::MalformedPresentationName`] for names such as
    /// `web-v`, `web-v2a` or `-v2`.
    pub fn parse(name: &str) -> Result<Self, CompilationError> {
        let malformed = |reason: &str| CompilationError::MalformedPresentationName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let Some(split) = name.rfind(VARIANT_SEPARATOR) else {
            return Ok(Self::Fixed);
        };
        let (base, index) = (&name[..split], &name[split + VARIANT_SEPARATOR.len()..]);
        if index.contains('-') {
            return Ok(Self::Fixed);
        }

        if index.is_empty() {
            return Err(malformed("missing variant index after '-v'"));
        }
        if !index.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(Self::Fixed);
        }

        let index = index
            .parse::<u32>()
            .map_err(|_| malformed("variant index must be a non-negative 32-bit integer"))?;
        if base.is_empty() {
            return Err(malformed("missing base name before '-v'"));
        }

        Ok(Self::Variable {
            base: base.to_string(),
            index,
        })
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable { .. })
    }
}

/// Role of an expanded name, which decides its default TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameRole {
    /// A member of a variant family (`B-vN...`)
    Variant,
    /// The canonical base name of a current mid name
    Canonical,
    /// A fixed network name
    Fixed,
}

impl NameRole {
    #[must_use]
    pub fn default_ttl(self) -> u32 {
        match self {
            Self::Variant => TTL_PRESENTATION_SECS,
            Self::Canonical | Self::Fixed => TTL_NETWORK_SECS,
        }
    }
}

/// What an expanded name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Every address of a zone
    Zone(u32),
    /// The members of a zone of one address family
    ZoneFamily { zone: u32, family: AddressFamily },
    /// Nothing; the name produces no records
    Unbound,
}

/// A DNS label derived from a mid name, with its binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedName {
    /// Label relative to the bottom domain
    pub name: String,
    pub role: NameRole,
    pub binding: Binding,
}

impl ExpandedName {
    fn new(name: String, role: NameRole, binding: Binding) -> Self {
        Self {
            name,
            role,
            binding,
        }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding {
            Binding::Zone(zone) => write!(f, "{} -> zone {zone}", self.name),
            Binding::ZoneFamily { zone, family } => {
                write!(f, "{} -> zone {zone} ({family:?})", self.name)
            }
            Binding::Unbound => write!(f, "{} -> unbound", self.name),
        }
    }
}

/// Expands one mid name of a host.
///
/// # Errors
///
/// Returns [`CompilationError::MalformedPresentationName`] if the name cannot be parsed.
pub fn expand(host: &HostConfig, mid_name: &MidName) -> Result<Vec<ExpandedName>, CompilationError> {
    let current_binding = zones::current_zone(host, mid_name).map_or(Binding::Unbound, Binding::Zone);

    let (base, index) = match PresentationName::parse(&mid_name.name)? {
        PresentationName::Fixed => {
            return Ok(vec![ExpandedName::new(
                mid_name.name.clone(),
                NameRole::Fixed,
                current_binding,
            )]);
        }
        PresentationName::Variable { base, index } => (base, index),
    };

    let stem = &mid_name.name;
    let bare_binding = if zones::is_custom(index) && host.addresses.contains(index) {
        Binding::Zone(index)
    } else {
        Binding::Unbound
    };

    let mut names = vec![
        ExpandedName::new(stem.clone(), NameRole::Variant, bare_binding),
        ExpandedName::new(
            format!("{stem}-{SUFFIX_PROXIED}"),
            NameRole::Variant,
            Binding::Zone(ZONE_PROXIED),
        ),
        ExpandedName::new(
            format!("{stem}-{SUFFIX_IPV4}"),
            NameRole::Variant,
            Binding::ZoneFamily {
                zone: ZONE_NATIVE,
                family: AddressFamily::V4,
            },
        ),
        ExpandedName::new(
            format!("{stem}-{SUFFIX_IPV6}"),
            NameRole::Variant,
            Binding::ZoneFamily {
                zone: ZONE_NATIVE,
                family: AddressFamily::V6,
            },
        ),
    ];

    names.extend(
        host.addresses
            .zone_ids()
            .filter(|zone| zones::is_custom(*zone))
            .map(|zone| ExpandedName::new(format!("{stem}-{zone}"), NameRole::Variant, Binding::Zone(zone))),
    );

    if mid_name.current {
        names.push(ExpandedName::new(base, NameRole::Canonical, current_binding));
    }

    Ok(names)
}

/// Checks the `current` flags of a host's mid names.
///
/// # Errors
///
/// - [`ConfigValidationError::CurrentOnFixedName`] if a fixed name is current
/// - [`ConfigValidationError::AmbiguousCurrent`] if two mid names are current at one zone
/// - [`CompilationError::MalformedPresentationName`] if a mid name cannot be parsed
pub fn check_current(host: &HostConfig) -> Result<(), DomainError> {
    let mut current_by_zone: BTreeMap<Option<u32>, &str> = BTreeMap::new();

    for mid_name in host.mid_names.iter().filter(|m| m.current) {
        if !PresentationName::parse(&mid_name.name)?.is_variable() {
            return Err(ConfigValidationError::CurrentOnFixedName {
                host: host.name.clone(),
                name: mid_name.name.clone(),
            }
            .into());
        }

        let zone = zones::current_zone(host, mid_name);
        if let Some(first) = current_by_zone.insert(zone, &mid_name.name) {
            return Err(ConfigValidationError::AmbiguousCurrent {
                host: host.name.clone(),
                zone: zone.unwrap_or(ZONE_NATIVE),
                first: first.to_string(),
                second: mid_name.name.clone(),
            }
            .into());
        }
    }

    Ok(())
}

/// Expands every mid name of a host.
///
/// # Errors
///
/// Returns the first error of [`check_current`] or [`expand`].
pub fn expand_host(host: &HostConfig) -> Result<Vec<ExpandedName>, DomainError> {
    check_current(host)?;

    let mut names = Vec::new();
    for mid_name in &host.mid_names {
        names.extend(expand(host, mid_name)?);
    }
    Ok(names)
}

#[cfg(test)]
#[path = "presentation_tests.rs"]
mod presentation_tests;
