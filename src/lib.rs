//! ocne-capi - Cluster API reconciliation for OCNE clusters on OCI
//!
//! Renders a catalog of parameterized CAPI manifests from one cluster
//! configuration, reconciles them against the admin cluster with a
//! create-or-merge strategy, and waits until the cluster and its machines
//! report ready.
//!
//! # Modules
//!
//! - [`template`] - Template rendering into multi-document YAML
//! - [`object`] - Document tree, resource type inference, nested fields
//! - [`merge`] - Structural merge with locked fields
//! - [`variables`] - Cluster configuration, node pools, drift hashes
//! - [`cloud`] - Image and subnet lookups
//! - [`catalog`] - Built-in manifest templates by lifecycle phase
//! - [`capi`] - API client, reconciler, readiness, garbage collection and
//!   the cluster lifecycle
//! - [`config`] - Driver configuration file
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod capi;
pub mod catalog;
pub mod cloud;
pub mod config;
pub mod error;
pub mod merge;
pub mod object;
pub mod template;
pub mod variables;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
