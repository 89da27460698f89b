//! Manifest templating
//!
//! Descriptors carry template text that is rendered against the serialized
//! cluster configuration and then decoded into [`Document`]s. A template may
//! produce zero documents (an add-on toggled off), one, or many (one per node
//! pool). Multi-document output uses YAML `---` separators; `kind: *List`
//! documents are flattened into their items.
//!
//! Template context keys are the camelCase configuration fields, e.g.
//! `{{ name }}`, `{{ kubernetesVersion }}`, `{% for pool in nodePools %}`.

mod engine;
mod error;
mod filters;

pub use engine::TemplateEngine;
pub use error::TemplateError;

use serde::Deserialize;
use serde_json::Value;

use crate::object::Document;

/// Decode multi-document YAML into documents
///
/// Empty documents are skipped. A document whose kind ends in `List` and
/// that carries an `items` array is replaced by its items.
pub fn parse_documents(yaml: &str) -> Result<Vec<Document>, TemplateError> {
    let mut docs = Vec::new();

    for (index, de) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = Value::deserialize(de)?;
        match value {
            Value::Null => continue,
            Value::Object(ref map) if is_list(map) => {
                let items = map
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for item in items {
                    let doc = Document::from_value(item)
                        .map_err(|_| TemplateError::NotAnObject { index })?;
                    docs.push(doc);
                }
            }
            Value::Object(_) => docs.push(
                Document::from_value(value).map_err(|_| TemplateError::NotAnObject { index })?,
            ),
            _ => return Err(TemplateError::NotAnObject { index }),
        }
    }

    Ok(docs)
}

fn is_list(map: &serde_json::Map<String, Value>) -> bool {
    let kind = map.get("kind").and_then(Value::as_str).unwrap_or_default();
    kind.ends_with("List") && map.get("items").is_some_and(Value::is_array)
}
