//! Helper functions and filters available to manifest templates
//!
//! - `contains(haystack, needle)`: substring test, as a function or filter
//! - `b64encode`: base64 encode a string (Secret and ConfigMap payloads)
//!
//! `indent` comes from the minijinja builtins.

use base64::{engine::general_purpose::STANDARD, Engine};

/// Substring test
///
/// Usage: `{% if contains(kubernetesVersion, "1.26") %}` or
/// `{% if kubernetesVersion | contains("1.26") %}`
pub fn contains(haystack: &str, needle: &str) -> bool {
    haystack.contains(needle)
}

/// Base64 encode filter
///
/// Usage: `{{ value | b64encode }}`
pub fn b64encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}
