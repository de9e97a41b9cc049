// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone resolution for bottom-layer hosts.
//!
//! Zone ids carry fixed meaning below 10:
//!
//! | Zone | Meaning |
//! |------|---------|
//! | 0 | Native addresses |
//! | 1 | Proxied or tunnelled addresses |
//! | 2-9 | Reserved, must not carry addresses |
//! | 10 | Managed externally, must be null |
//! | 11+ | Custom |
//!
//! Addresses are returned verbatim. Their shape is only interpreted when records
//! are built.

use std::net::IpAddr;

use crate::config::{HostConfig, MidName};
use crate::constants::{ZONE_EXTERNAL, ZONE_NATIVE, ZONE_RESERVED_MAX, ZONE_RESERVED_MIN};
use crate::errors::ZoneError;

/// Selects a zone of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneSelector<'a> {
    /// An explicit zone id
    Id(u32),
    /// The zone a mid name designates through `current_zone`
    Current(&'a MidName),
}

/// Address family filter applied to a zone's addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Returns true if `address` is an IP literal of this family.
    #[must_use]
    pub fn matches(self, address: &str) -> bool {
        matches!(
            (self, address.trim().parse::<IpAddr>()),
            (Self::V4, Ok(IpAddr::V4(_))) | (Self::V6, Ok(IpAddr::V6(_)))
        )
    }
}

/// Returns true for zone ids 2-9.
#[must_use]
pub fn is_reserved(zone: u32) -> bool {
    (ZONE_RESERVED_MIN..=ZONE_RESERVED_MAX).contains(&zone)
}

/// Returns true for zone ids that may be named by a variant suffix (10 and above).
#[must_use]
pub fn is_custom(zone: u32) -> bool {
    zone >= ZONE_EXTERNAL
}

/// Returns the zone a mid name binds its canonical (or fixed) name to.
///
/// Defaults to zone 0 when the host defines it, else the lowest zone the host defines.
/// Returns `None` only for a host without zones.
#[must_use]
pub fn current_zone(host: &HostConfig, mid_name: &MidName) -> Option<u32> {
    mid_name.current_zone.or_else(|| {
        if host.addresses.contains(ZONE_NATIVE) {
            Some(ZONE_NATIVE)
        } else {
            host.addresses.lowest()
        }
    })
}

/// Resolves the addresses of a host's zone.
///
/// A zone declared with `null` resolves to an empty slice.
///
/// # Errors
///
/// - [`ZoneError::ZoneManagedExternally`] if the selection is zone 10; callers skip it
/// - [`ZoneError::ZoneUnresolvable`] if the host does not define the zone
pub fn resolve<'a>(host: &'a HostConfig, selector: ZoneSelector<'_>) -> Result<&'a [String], ZoneError> {
    let zone = match selector {
        ZoneSelector::Id(zone) => zone,
        ZoneSelector::Current(mid_name) => {
            current_zone(host, mid_name).ok_or_else(|| ZoneError::ZoneUnresolvable {
                host: host.name.clone(),
                zone: mid_name.current_zone.unwrap_or(ZONE_NATIVE),
            })?
        }
    };

    if zone == ZONE_EXTERNAL {
        return Err(ZoneError::ZoneManagedExternally {
            host: host.name.clone(),
            zone,
        });
    }

    match host.addresses.get(zone) {
        Some(addresses) => Ok(addresses.unwrap_or_default()),
        None => Err(ZoneError::ZoneUnresolvable {
            host: host.name.clone(),
            zone,
        }),
    }
}

#[cfg(test)]
#[path = "zones_tests.rs"]
mod zones_tests;
