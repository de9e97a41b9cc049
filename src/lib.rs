// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Tetra - Layered DNS Record Synchronization
//!
//! Tetra keeps DNS records at hosted providers in line with a declarative, two-layer
//! domain model.
//!
//! ## Overview
//!
//! - **Bottom** domains hold canonical hosts and their addresses, classified into
//!   numbered zones (native, proxied, externally managed, custom).
//! - **Top** domains publish subdomain groups whose values point into a bottom
//!   domain, optionally per resolution line where the provider supports it.
//!
//! A run compiles each domain into its desired record set, diffs it against the
//! records the provider reports, and applies the minimal create/update/delete
//! operations. Only records carrying the layer's ownership marker are ever touched.
//!
//! ## Modules
//!
//! - [`config`] - Configuration tree, file loading and exec sources
//! - [`compiler`] - Validation, zone resolution, name expansion and record compilation
//! - [`capabilities`] - What each provider backend can hold
//! - [`reconciler`] - Diff, per-account queues and reports
//! - [`provider`] - Provider adapters, credentials and retry
//! - [`records`] - Record types, keys and operations
//! - [`errors`] - Error taxonomy
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use tetra::config::Configuration;
//! use tetra::provider::HttpAdapterFactory;
//! use tetra::reconciler::{reconcile, ReconcileOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Configuration::load(std::path::Path::new("tetra.yaml")).await?;
//! let report = reconcile(&config, &HttpAdapterFactory::default(), &ReconcileOptions::default()).await;
//! if report.has_failures() {
//!     anyhow::bail!("some domains failed");
//! }
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod errors;
pub mod metrics;
pub mod provider;
pub mod reconciler;
pub mod records;
