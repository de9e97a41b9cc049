// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration model for Tetra.
//!
//! The configuration is a mapping of domain name to [`DomainConfig`]. Bottom-layer
//! domains list hosts with zoned addresses and mid names; top-layer domains list
//! subdomain groups that point at names published by a bottom domain.
//!
//! # Example
//!
//! ```yaml
//! infra.example.net:
//!   layer: bottom
//!   backend: cloudflare
//!   auth:
//!     token_file: /run/secrets/cloudflare
//!   hosts:
//!     - name: h1
//!       addresses:
//!         0: [192.0.2.10, "2001:db8::10"]
//!         1: 198.51.100.7
//!         10: null
//!       mid_names:
//!         - { name: edge-v2, current: true }
//!         - lab
//!
//! example.com:
//!   layer: top
//!   backend: dnspod
//!   bottom: infra.example.net
//!   auth:
//!     secret_id: AKIDEXAMPLE
//!     secret_key_file: /run/secrets/dnspod
//!   domains:
//!     - names: ["@", www]
//!       records:
//!         - edge
//!         - { value: edge-v2-ext, line: 境外 }
//!       cnames: w3
//! ```
//!
//! Scalars are accepted wherever a list is expected, and a host's `addresses` may be a
//! single address or a plain list, both meaning zone 0.

use anyhow::{bail, Context, Result};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::capabilities::BackendKind;
use crate::constants::{OWNER_MARKER_BOTTOM, OWNER_MARKER_TOP, ZONE_NATIVE};
use crate::provider::credentials::AuthBundle;

/// The whole configuration: domain name to domain configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    /// Domains keyed by their DNS name
    pub domains: BTreeMap<String, DomainConfig>,
}

/// Layer of a domain in the two-layer model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Holds canonical hosts and their addresses
    Bottom,
    /// Holds public subdomains that reference a bottom domain
    Top,
}

impl Layer {
    /// Returns the comment marker identifying records owned by this layer.
    #[must_use]
    pub fn owner_marker(self) -> &'static str {
        match self {
            Self::Bottom => OWNER_MARKER_BOTTOM,
            Self::Top => OWNER_MARKER_TOP,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bottom => "bottom",
            Self::Top => "top",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of one domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Layer of the domain
    pub layer: Layer,

    /// Provider the domain is hosted at
    pub backend: BackendKind,

    /// Opaque credential bundle, resolved by the credential store at call time
    #[serde(default)]
    pub auth: AuthBundle,

    /// TTL override for every record of the domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Hosts of a bottom domain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<HostConfig>,

    /// Command whose JSON output lists additional hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts_from_exec: Option<String>,

    /// Subdomain groups of a top domain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<SubdomainGroup>,

    /// Command whose JSON output lists additional subdomain groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains_from_exec: Option<String>,

    /// Bottom domain that unqualified top-layer values are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
}

/// A host of a bottom-layer domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name, used to identify the host in errors and logs
    pub name: String,

    /// Addresses by zone id
    #[serde(default)]
    pub addresses: ZoneMap,

    /// Names published for this host
    #[serde(default, deserialize_with = "one_or_many")]
    pub mid_names: Vec<MidName>,
}

/// Addresses of a host keyed by zone id.
///
/// A `None` value is a zone declared with `null`: present, but without addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ZoneMap(BTreeMap<u32, Option<Vec<String>>>);

impl ZoneMap {
    /// Builds a zone map with the given addresses in zone 0.
    #[must_use]
    pub fn native(addresses: Vec<String>) -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(ZONE_NATIVE, Some(addresses));
        Self(zones)
    }

    /// Returns the entry of a zone: `None` if absent, `Some(None)` if declared null.
    #[must_use]
    pub fn get(&self, zone: u32) -> Option<Option<&[String]>> {
        self.0.get(&zone).map(|addresses| addresses.as_deref())
    }

    /// Returns true if the zone is declared, even as null.
    #[must_use]
    pub fn contains(&self, zone: u32) -> bool {
        self.0.contains_key(&zone)
    }

    /// Declared zone ids in ascending order.
    pub fn zone_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    /// The lowest declared zone id.
    #[must_use]
    pub fn lowest(&self) -> Option<u32> {
        self.0.keys().next().copied()
    }

    /// Iterates over declared zones.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<&[String]>)> + '_ {
        self.0
            .iter()
            .map(|(zone, addresses)| (*zone, addresses.as_deref()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u32, Option<Vec<String>>)> for ZoneMap {
    fn from_iter<T: IntoIterator<Item = (u32, Option<Vec<String>>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for ZoneMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ZoneMapVisitor;

        impl<'de> Visitor<'de> for ZoneMapVisitor {
            type Value = ZoneMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an address, a list of addresses, or a map of zone id to addresses")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ZoneMap, E> {
                Ok(ZoneMap::native(vec![value.to_string()]))
            }

            fn visit_unit<E: de::Error>(self) -> Result<ZoneMap, E> {
                Ok(ZoneMap::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<ZoneMap, E> {
                Ok(ZoneMap::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ZoneMap, A::Error> {
                let mut addresses = Vec::new();
                while let Some(address) = seq.next_element::<String>()? {
                    addresses.push(address);
                }
                Ok(ZoneMap::native(addresses))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ZoneMap, A::Error> {
                let mut zones = BTreeMap::new();
                while let Some((zone, addresses)) =
                    map.next_entry::<ZoneId, Option<OneOrMany<String>>>()?
                {
                    zones.insert(zone.0, addresses.map(Vec::from));
                }
                Ok(ZoneMap(zones))
            }
        }

        deserializer.deserialize_any(ZoneMapVisitor)
    }
}

/// Zone id map key. YAML sources use integer keys, JSON sources use integer strings.
struct ZoneId(u32);

impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ZoneIdVisitor;

        impl Visitor<'_> for ZoneIdVisitor {
            type Value = ZoneId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer zone id")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ZoneId, E> {
                u32::try_from(value)
                    .map(ZoneId)
                    .map_err(|_| E::custom(format!("zone id {value} is out of range")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ZoneId, E> {
                u32::try_from(value)
                    .map(ZoneId)
                    .map_err(|_| E::custom(format!("zone id {value} must be a non-negative integer")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ZoneId, E> {
                value
                    .trim()
                    .parse::<u32>()
                    .map(ZoneId)
                    .map_err(|_| E::custom(format!("zone id '{value}' must be a non-negative integer")))
            }
        }

        deserializer.deserialize_any(ZoneIdVisitor)
    }
}

/// A name published for a host.
///
/// Written either as a bare string or as a mapping with `name`, `current` and
/// `current_zone`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MidNameSpec")]
pub struct MidName {
    /// The name as configured, `<base>-v<N>` for variable presentation names
    pub name: String,

    /// Whether this name also publishes its canonical base name
    pub current: bool,

    /// Zone the canonical (or fixed) name binds to, defaults to the host's lowest zone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_zone: Option<u32>,
}

impl MidName {
    /// A non-current mid name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: false,
            current_zone: None,
        }
    }

    /// A current mid name, optionally bound to an explicit zone.
    #[must_use]
    pub fn current(name: &str, current_zone: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            current: true,
            current_zone,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MidNameSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        current: bool,
        #[serde(default)]
        current_zone: Option<u32>,
    },
}

impl From<MidNameSpec> for MidName {
    fn from(spec: MidNameSpec) -> Self {
        match spec {
            MidNameSpec::Name(name) => Self {
                name,
                current: false,
                current_zone: None,
            },
            MidNameSpec::Detailed {
                name,
                current,
                current_zone,
            } => Self {
                name,
                current,
                current_zone,
            },
        }
    }
}

/// A group of top-layer subdomains sharing the same records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainGroup {
    /// Subdomain labels, `@` for the apex
    #[serde(deserialize_with = "one_or_many")]
    pub names: Vec<String>,

    /// Record values, optionally per resolution line
    #[serde(deserialize_with = "one_or_many")]
    pub records: Vec<RecordSpec>,

    /// Alias labels that point at the group's first name
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub cnames: Vec<String>,
}

/// A record value of a subdomain group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordSpecRaw")]
pub struct RecordSpec {
    /// IP literal, fully-qualified name (trailing dot) or name relative to the bottom domain
    pub value: String,

    /// Resolution line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl RecordSpec {
    #[must_use]
    pub fn new(value: &str, line: Option<&str>) -> Self {
        Self {
            value: value.to_string(),
            line: line.map(str::to_string),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordSpecRaw {
    Value(String),
    Detailed {
        value: String,
        #[serde(default)]
        line: Option<String>,
    },
}

impl From<RecordSpecRaw> for RecordSpec {
    fn from(raw: RecordSpecRaw) -> Self {
        match raw {
            RecordSpecRaw::Value(value) => Self { value, line: None },
            RecordSpecRaw::Detailed { value, line } => Self { value, line },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<OneOrMany<T>>::deserialize(deserializer).map(|value| value.map(Vec::from).unwrap_or_default())
}

impl Configuration {
    /// Parses a configuration from YAML text.
    ///
    /// Exec sources are not resolved; see [`Configuration::resolve_exec_sources`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse configuration")
    }

    /// Loads a configuration file and resolves its exec sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an exec source fails.
    pub async fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        config.resolve_exec_sources().await?;
        info!(
            path = %path.display(),
            domains = config.domains.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Runs every `hosts_from_exec` / `domains_from_exec` command and prepends its
    /// JSON output to the statically configured list.
    ///
    /// # Errors
    ///
    /// Returns an error if a command fails or prints something that is not a JSON list
    /// of hosts (or subdomain groups).
    pub async fn resolve_exec_sources(&mut self) -> Result<()> {
        for (name, domain) in &mut self.domains {
            if let Some(command) = domain.hosts_from_exec.take() {
                let mut hosts: Vec<HostConfig> = read_from_exec(&command)
                    .await
                    .with_context(|| format!("hosts_from_exec of domain {name}"))?;
                debug!(domain = %name, count = hosts.len(), "Loaded hosts from exec");
                hosts.append(&mut domain.hosts);
                domain.hosts = hosts;
            }
            if let Some(command) = domain.domains_from_exec.take() {
                let mut groups: Vec<SubdomainGroup> = read_from_exec(&command)
                    .await
                    .with_context(|| format!("domains_from_exec of domain {name}"))?;
                debug!(domain = %name, count = groups.len(), "Loaded subdomain groups from exec");
                groups.append(&mut domain.domains);
                domain.domains = groups;
            }
        }
        Ok(())
    }

    /// Returns the names of the selected domains, in selection order without repeats.
    ///
    /// An empty selection selects every domain. Names that are not configured are
    /// kept so they can be reported.
    #[must_use]
    pub fn select<'a>(&'a self, names: &'a [String]) -> Vec<&'a str> {
        if names.is_empty() {
            return self.domains.keys().map(String::as_str).collect();
        }
        let mut seen = BTreeSet::new();
        names
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

async fn read_from_exec<T: serde::de::DeserializeOwned>(command: &str) -> Result<T> {
    let Some(argv) = shlex::split(command) else {
        bail!("Cannot split '{command}' into arguments");
    };
    let Some((program, args)) = argv.split_first() else {
        bail!("Exec source command is empty");
    };

    debug!(command, "Running exec source");
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute '{command}'"))?;

    if !output.status.success() {
        bail!(
            "'{command}' exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("Output of '{command}' is not valid JSON for this source"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
