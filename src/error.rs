//! Error types for cluster reconciliation
//!
//! Every variant that touches the API server carries the resource type and
//! object name it was working on, so an error read from a log line is enough
//! to locate the offending manifest.

use std::time::Duration;

use thiserror::Error;

use crate::capi::client::ApiError;
use crate::capi::ready::NotReadyReason;
use crate::merge::MergeError;
use crate::object::{FieldError, Gvr};
use crate::template::TemplateError;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for reconciliation operations
#[derive(Debug, Error)]
pub enum Error {
    /// Template parse or execute failure
    #[error("render failed for {descriptor}: {source}")]
    Render {
        /// Descriptor whose template failed
        descriptor: String,
        /// Underlying template error
        source: TemplateError,
    },

    /// Read failure other than not-found
    #[error("get failed {resource} {name}: {source}")]
    Fetch {
        /// Resource type being read
        resource: Gvr,
        /// Object name
        name: String,
        /// Classified API failure
        source: ApiError,
    },

    /// Label-selected list failure
    #[error("list failed {resource}: {source}")]
    List {
        /// Resource type being listed
        resource: Gvr,
        /// Classified API failure
        source: ApiError,
    },

    /// Create failure other than an already-exists race
    #[error("create failed {resource} {name}: {source}")]
    Create {
        /// Resource type being created
        resource: Gvr,
        /// Object name
        name: String,
        /// Classified API failure
        source: ApiError,
    },

    /// Update failure, including resource-version conflicts
    #[error("update failed {resource} {name}: {source}")]
    Update {
        /// Resource type being updated
        resource: Gvr,
        /// Object name
        name: String,
        /// Classified API failure
        source: ApiError,
    },

    /// Delete failure other than not-found
    #[error("delete failed {resource} {name}: {source}")]
    Delete {
        /// Resource type being deleted
        resource: Gvr,
        /// Object name
        name: String,
        /// Classified API failure
        source: ApiError,
    },

    /// Existing and desired documents cannot be merged
    #[error("merge failed {resource} {name}: {source}")]
    Merge {
        /// Resource type being merged
        resource: Gvr,
        /// Object name
        name: String,
        /// Structural incompatibility
        source: MergeError,
    },

    /// Post-merge adjustment could not be applied
    #[error("spec update failed {resource} {name}: {source}")]
    Adjust {
        /// Resource type being adjusted
        resource: Gvr,
        /// Object name
        name: String,
        /// Field that could not be read or written
        source: FieldError,
    },

    /// Readiness deadline exceeded
    #[error("timed out waiting for {target} {name} after {waited:?}")]
    Timeout {
        /// What was being waited on (cluster, deployment)
        target: &'static str,
        /// Object name
        name: String,
        /// Configured deadline
        waited: Duration,
    },

    /// Single-shot readiness check found the cluster still converging
    #[error("cluster {cluster} is not ready: {reason}")]
    NotReady {
        /// Cluster name
        cluster: String,
        /// First failing predicate
        reason: NotReadyReason,
    },

    /// Invalid configuration
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Cluster whose configuration is invalid
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g., "nodePools")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Cloud lookup failure while populating configuration
    #[error("cloud lookup failed for {lookup}: {message}")]
    Cloud {
        /// Lookup being performed (e.g., "subnet ocid1.subnet...")
        lookup: String,
        /// Description of what failed
        message: String,
    },

    /// Kubernetes client construction error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

impl Error {
    /// Create a validation error without cluster context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field name
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a cloud lookup error
    pub fn cloud(lookup: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Cloud {
            lookup: lookup.into(),
            message: msg.into(),
        }
    }

    /// True when the error means "still converging" rather than a hard failure
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// True when a readiness wait ran past its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
