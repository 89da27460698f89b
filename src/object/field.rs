//! Structured field paths and nested-field access over document trees

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// A path from a document root to a nested field, one segment per key
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from its segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `spec.template.spec.version`
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|s| !s.is_empty()))
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The path of the containing tree, `None` for the root
    pub fn parent(&self) -> Option<FieldPath> {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    /// A new path with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// True when the path has no segments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

/// Failure to resolve a nested field
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// Some segment of the path does not exist
    #[error("field {path} not found")]
    NotFound {
        /// Path that was being resolved
        path: String,
    },

    /// An intermediate value exists but is not a tree
    #[error("{path} is not a map")]
    NotAnObject {
        /// Path of the offending intermediate value
        path: String,
    },

    /// The leaf exists but has a different type than requested
    #[error("field {path} is not a {expected}")]
    WrongType {
        /// Path of the leaf
        path: String,
        /// Type the caller asked for
        expected: &'static str,
    },
}

/// Walk `path` inside `root` and return the value it names
///
/// Distinguishes a missing segment from an intermediate value that is not
/// an object.
pub fn nested_field<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Result<&'a Value, FieldError> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let map = current.as_object().ok_or_else(|| FieldError::NotAnObject {
            path: join(&path[..depth]),
        })?;
        current = map.get(segment.as_ref()).ok_or_else(|| FieldError::NotFound {
            path: join(&path[..=depth]),
        })?;
    }
    Ok(current)
}

/// Resolve a string leaf
pub fn nested_str<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Result<&'a str, FieldError> {
    nested_field(root, path)?
        .as_str()
        .ok_or_else(|| FieldError::WrongType {
            path: join(path),
            expected: "string",
        })
}

/// Resolve a boolean leaf
pub fn nested_bool<S: AsRef<str>>(root: &Value, path: &[S]) -> Result<bool, FieldError> {
    nested_field(root, path)?
        .as_bool()
        .ok_or_else(|| FieldError::WrongType {
            path: join(path),
            expected: "bool",
        })
}

/// Resolve an integer leaf
pub fn nested_i64<S: AsRef<str>>(root: &Value, path: &[S]) -> Result<i64, FieldError> {
    nested_field(root, path)?
        .as_i64()
        .ok_or_else(|| FieldError::WrongType {
            path: join(path),
            expected: "integer",
        })
}

/// Set the value at `path`, creating intermediate objects as needed
///
/// Fails with [`FieldError::NotAnObject`] when an existing intermediate
/// value is not a tree.
pub fn set_nested_field<S: AsRef<str>>(
    root: &mut Value,
    path: &[S],
    value: Value,
) -> Result<(), FieldError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let map = current.as_object_mut().ok_or_else(|| FieldError::NotAnObject {
            path: join(&path[..depth]),
        })?;
        current = map
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let map = current.as_object_mut().ok_or_else(|| FieldError::NotAnObject {
        path: join(parents),
    })?;
    map.insert(last.as_ref().to_string(), value);
    Ok(())
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}
