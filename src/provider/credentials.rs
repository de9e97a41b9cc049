// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Credential store.
//!
//! A domain's `auth` bundle is an opaque mapping of keys to values. Every key may be
//! given inline or through a `<key>_file` indirection, which takes precedence and is
//! read from disk with surrounding whitespace trimmed:
//!
//! ```yaml
//! auth:
//!   secret_id: AKIDEXAMPLE
//!   secret_key_file: /run/secrets/dnspod
//! ```

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::ProviderError;

/// Raw credential bundle as written in configuration.
pub type AuthBundle = BTreeMap<String, String>;

/// Suffix selecting file indirection for a credential key
const FILE_SUFFIX: &str = "_file";

/// Hex characters of the bundle digest kept in account identifiers
const FINGERPRINT_LEN: usize = 16;

/// Resolves credential values from an [`AuthBundle`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    bundle: AuthBundle,
}

impl Credentials {
    #[must_use]
    pub fn new(bundle: AuthBundle) -> Self {
        Self { bundle }
    }

    /// Returns the raw bundle.
    #[must_use]
    pub fn bundle(&self) -> &AuthBundle {
        &self.bundle
    }

    /// Resolves a key, preferring its `_file` form.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Credentials`] if neither form is present, the file
    /// cannot be read, or the resolved value is empty.
    pub fn get(&self, key: &str) -> Result<String, ProviderError> {
        let file_key = format!("{key}{FILE_SUFFIX}");

        let value = if let Some(path) = self.bundle.get(&file_key) {
            std::fs::read_to_string(Path::new(path)).map_err(|e| ProviderError::Credentials {
                reason: format!("cannot read {file_key} '{path}': {e}"),
            })?
        } else if let Some(value) = self.bundle.get(key) {
            value.clone()
        } else {
            return Err(ProviderError::Credentials {
                reason: format!("'{key}' (or '{file_key}') is missing from auth"),
            });
        };

        let value = value.trim();
        if value.is_empty() {
            return Err(ProviderError::Credentials {
                reason: format!("'{key}' resolves to an empty value"),
            });
        }
        Ok(value.to_string())
    }

    /// Returns a stable fingerprint of the bundle.
    ///
    /// Two domains with identical bundles share one fingerprint and therefore one
    /// account. The fingerprint covers the bundle as written, not the resolved secrets.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.bundle {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());
        digest[..FINGERPRINT_LEN].to_string()
    }
}

impl From<AuthBundle> for Credentials {
    fn from(bundle: AuthBundle) -> Self {
        Self::new(bundle)
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
