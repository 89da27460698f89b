//! Structural merge of desired state into live objects
//!
//! `merge` walks both trees key by key. Desired values overwrite or
//! introduce keys, nested objects are merged recursively, and keys present
//! only in the live object survive. Paths listed as locked always keep the
//! live value so fields owned by other writers (status, admission defaults)
//! are not clobbered by repeated reconciliation.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::object::{nested_field, FieldError, FieldPath};

/// Set of field paths whose existing value must survive a merge
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockedFields(BTreeSet<FieldPath>);

impl LockedFields {
    /// Nothing locked
    pub const EMPTY: Self = Self(BTreeSet::new());

    /// An empty lock set
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock an additional path
    pub fn with(mut self, path: impl Into<FieldPath>) -> Self {
        self.0.insert(path.into());
        self
    }

    /// True when `path` is locked
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.0.contains(path)
    }

    /// Iterate the locked paths
    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.iter()
    }

    /// True when nothing is locked
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when some locked path lies strictly below `path`
    pub fn locks_below(&self, path: &FieldPath) -> bool {
        let prefix = path.segments();
        self.0.iter().any(|locked| {
            locked.segments().len() > prefix.len() && locked.segments().starts_with(prefix)
        })
    }
}

impl<P: Into<FieldPath>> FromIterator<P> for LockedFields {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Documents that cannot be merged
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// One of the roots is not an object
    #[error("{side} document is not a map")]
    RootNotObject {
        /// "existing" or "desired"
        side: &'static str,
    },

    /// A locked path runs through an existing value that is not a tree
    #[error("locked field {path}: {source}")]
    LockedParent {
        /// The locked path
        path: FieldPath,
        /// Where the walk failed
        source: FieldError,
    },
}

/// Merge `desired` into `existing`, honoring `locked`
pub fn merge(existing: &Value, desired: &Value, locked: &LockedFields) -> Result<Value, MergeError> {
    let existing_map = existing
        .as_object()
        .ok_or(MergeError::RootNotObject { side: "existing" })?;
    let desired_map = desired
        .as_object()
        .ok_or(MergeError::RootNotObject { side: "desired" })?;

    for path in locked.iter() {
        let Some(parent) = path.parent() else {
            continue;
        };
        match nested_field(existing, parent.segments()) {
            Ok(value) if value.is_object() => {}
            Ok(_) => {
                return Err(MergeError::LockedParent {
                    path: path.clone(),
                    source: FieldError::NotAnObject {
                        path: parent.to_string(),
                    },
                })
            }
            Err(FieldError::NotFound { .. }) => {}
            Err(source) => {
                return Err(MergeError::LockedParent {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    Ok(Value::Object(merge_maps(
        existing_map,
        desired_map,
        &FieldPath::default(),
        locked,
    )))
}

fn merge_maps(
    existing: &Map<String, Value>,
    desired: &Map<String, Value>,
    at: &FieldPath,
    locked: &LockedFields,
) -> Map<String, Value> {
    let mut merged = existing.clone();

    for (key, desired_value) in desired {
        let path = at.child(key.as_str());
        if locked.contains(&path) {
            continue;
        }

        let value = match (existing.get(key), desired_value) {
            (Some(Value::Object(live)), Value::Object(want)) => {
                Value::Object(merge_maps(live, want, &path, locked))
            }
            // Replacing the subtree would drop locked values underneath
            (Some(live @ Value::Object(_)), _) if locked.locks_below(&path) => live.clone(),
            (_, Value::Object(want)) if locked.locks_below(&path) => {
                Value::Object(merge_maps(&Map::new(), want, &path, locked))
            }
            _ => desired_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}
