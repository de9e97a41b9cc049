// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for Tetra.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Zone Constants
// ============================================================================

/// Zone holding a host's native addresses
pub const ZONE_NATIVE: u32 = 0;

/// Zone holding a host's proxied or tunnelled addresses
pub const ZONE_PROXIED: u32 = 1;

/// Zone marking addresses that are managed outside of Tetra.
///
/// A host may declare this zone only with a null value.
pub const ZONE_EXTERNAL: u32 = 10;

/// First zone id reserved for future fixed semantics
pub const ZONE_RESERVED_MIN: u32 = 2;

/// Last zone id reserved for future fixed semantics
pub const ZONE_RESERVED_MAX: u32 = 9;

// ============================================================================
// Presentation Name Constants
// ============================================================================

/// Separator between a presentation base and its variant index (`web-v2`)
pub const VARIANT_SEPARATOR: &str = "-v";

/// Suffix for the proxied (zone 1) variant name
pub const SUFFIX_PROXIED: &str = "ext";

/// Suffix for the IPv4 members of the native zone
pub const SUFFIX_IPV4: &str = "ip4";

/// Suffix for the IPv6 members of the native zone
pub const SUFFIX_IPV6: &str = "ip6";

// ============================================================================
// TTL Constants
// ============================================================================

/// TTL for variant presentation names (1 day).
pub const TTL_PRESENTATION_SECS: u32 = 86400;

/// TTL for canonical and fixed network names (1 means "automatic" at Cloudflare)
pub const TTL_NETWORK_SECS: u32 = 1;

/// TTL for top-layer records (10 minutes)
pub const TTL_TOP_SECS: u32 = 600;

// ============================================================================
// Ownership Constants
// ============================================================================

/// Comment marker stamped on records owned by a bottom-layer domain
pub const OWNER_MARKER_BOTTOM: &str = "TETRAB";

/// Comment marker stamped on records owned by a top-layer domain
pub const OWNER_MARKER_TOP: &str = "TETRAT";

/// Timestamp format appended to the ownership marker in record comments
pub const OWNER_COMMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// DNS Constants
// ============================================================================

/// Label that denotes the zone apex
pub const APEX_LABEL: &str = "@";

/// Sentinel line used for records that do not carry an explicit resolution line
pub const DEFAULT_LINE: &str = "default";

// ============================================================================
// Provider Constants
// ============================================================================

/// Cloudflare API v4 base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Page size used when listing Cloudflare DNS records
pub const CLOUDFLARE_PAGE_SIZE: u32 = 1000;

/// Tencent Cloud DNSPod API endpoint
pub const DNSPOD_API_BASE: &str = "https://dnspod.tencentcloudapi.com";

/// Tencent Cloud DNSPod API version
pub const DNSPOD_API_VERSION: &str = "2021-03-23";

/// Tencent Cloud service name used in the TC3 credential scope
pub const DNSPOD_SERVICE: &str = "dnspod";

/// Name of the default resolution line at DNSPod
pub const DNSPOD_DEFAULT_LINE: &str = "默认";

/// Page size used when listing DNSPod records
pub const DNSPOD_PAGE_SIZE: u32 = 3000;

/// Timeout for a single provider HTTP request
pub const PROVIDER_HTTP_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// CLI Constants
// ============================================================================

/// Configuration file used when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "tetra.yaml";
