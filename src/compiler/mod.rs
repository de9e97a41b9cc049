// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain-model compiler.
//!
//! Expands the declarative configuration into a concrete desired record set:
//!
//! - [`validation`] - Cross-field invariant checks, run first
//! - [`zones`] - Zone selection and zone-id semantics
//! - [`presentation`] - Expansion of `name-vN` mid names into variant families
//! - [`graph`] - Linking of bottom hosts and top groups into fully qualified records
//!
//! # Example
//!
//! ```rust
//! use tetra::compiler::compile;
//! use tetra::config::Configuration;
//!
//! let config = Configuration::from_yaml_str(r#"
//! infra.example.net:
//!   layer: bottom
//!   backend: cloudflare
//!   hosts:
//!     - name: h1
//!       addresses: { 0: [1.1.1.1] }
//!       mid_names: lab
//! "#).unwrap();
//!
//! let compiled = compile("infra.example.net", &config).unwrap();
//! assert_eq!(compiled.records[0].fqdn(), "lab.infra.example.net");
//! ```

pub mod graph;
pub mod presentation;
pub mod validation;
pub mod zones;

pub use graph::{compile_domain, CompiledDomain};
pub use validation::validate_domain;

use crate::config::Configuration;
use crate::errors::{ConfigValidationError, DomainError};

/// Validates and compiles one domain of a configuration.
///
/// # Errors
///
/// Returns the first validation or compilation error of the domain.
pub fn compile(name: &str, config: &Configuration) -> Result<CompiledDomain, DomainError> {
    let domain = config
        .domains
        .get(name)
        .ok_or_else(|| ConfigValidationError::UnknownDomain {
            domain: name.to_string(),
        })?;

    validate_domain(name, domain, config)?;
    compile_domain(name, domain)
}
