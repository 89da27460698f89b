//! Template error types

use std::fmt;

/// Errors that can occur while rendering a descriptor
#[derive(Debug)]
pub enum TemplateError {
    /// Template execution failed
    Render(minijinja::Error),
    /// Template syntax is invalid
    Syntax(String),
    /// A referenced variable is undefined
    Undefined(String),
    /// Rendered output is not valid YAML
    Yaml(String),
    /// A rendered document is not an object
    NotAnObject {
        /// Zero-based position of the document in the rendered output
        index: usize,
    },
}

impl TemplateError {
    /// Classify a minijinja error by kind
    pub fn classify(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => Self::Syntax(err.to_string()),
            minijinja::ErrorKind::UndefinedError => Self::Undefined(err.to_string()),
            _ => Self::Render(err),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Syntax(msg) => write!(f, "template syntax error: {}", msg),
            Self::Undefined(msg) => write!(f, "undefined variable: {}", msg),
            Self::Yaml(msg) => write!(f, "rendered YAML is invalid: {}", msg),
            Self::NotAnObject { index } => {
                write!(f, "rendered document {} is not an object", index)
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::classify(err)
    }
}

impl From<serde_yaml::Error> for TemplateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}
