//! Structured documents rendered from templates and read from the API server
//!
//! A [`Document`] is a JSON value tree whose root is always an object. It
//! knows its own kind, apiVersion and metadata, and from those its
//! [`Gvr`] when a descriptor does not pin one.

mod field;
pub mod gvr;

pub use field::{
    nested_bool, nested_field, nested_i64, nested_str, set_nested_field, FieldError, FieldPath,
};
pub use gvr::{infer_resource, split_api_version, Gvr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// A self-describing object tree (kind/apiVersion/metadata/spec)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document(Value);

impl Document {
    /// Wrap a value, rejecting anything whose root is not an object
    pub fn from_value(value: Value) -> Result<Self, Error> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(Error::serialization(format!(
                "document root must be an object, got {}",
                type_name(&value)
            )))
        }
    }

    /// Object kind, empty when absent
    pub fn kind(&self) -> &str {
        self.str_at(&["kind"])
    }

    /// Object apiVersion, empty when absent
    pub fn api_version(&self) -> &str {
        self.str_at(&["apiVersion"])
    }

    /// `metadata.name`, empty when absent
    pub fn name(&self) -> &str {
        self.str_at(&["metadata", "name"])
    }

    /// `metadata.namespace`, empty for cluster-scoped objects
    pub fn namespace(&self) -> &str {
        self.str_at(&["metadata", "namespace"])
    }

    /// Resource type inferred from apiVersion and kind
    pub fn gvr(&self) -> Gvr {
        Gvr::for_kind(self.api_version(), self.kind())
    }

    /// Look up a nested field
    pub fn field<S: AsRef<str>>(&self, path: &[S]) -> Result<&Value, FieldError> {
        nested_field(&self.0, path)
    }

    /// Look up a nested string field
    pub fn str_field<S: AsRef<str>>(&self, path: &[S]) -> Result<&str, FieldError> {
        nested_str(&self.0, path)
    }

    /// Look up a nested boolean field
    pub fn bool_field<S: AsRef<str>>(&self, path: &[S]) -> Result<bool, FieldError> {
        nested_bool(&self.0, path)
    }

    /// Look up a nested integer field
    pub fn i64_field<S: AsRef<str>>(&self, path: &[S]) -> Result<i64, FieldError> {
        nested_i64(&self.0, path)
    }

    /// Set a nested field, creating intermediate objects
    pub fn set_field<S: AsRef<str>>(&mut self, path: &[S], value: Value) -> Result<(), FieldError> {
        if path.is_empty() {
            return Err(FieldError::NotAnObject {
                path: String::new(),
            });
        }
        set_nested_field(&mut self.0, path, value)
    }

    /// Borrow the underlying tree
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying tree
    pub fn into_value(self) -> Value {
        self.0
    }

    fn str_at(&self, path: &[&str]) -> &str {
        nested_str(&self.0, path).unwrap_or_default()
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.0
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
