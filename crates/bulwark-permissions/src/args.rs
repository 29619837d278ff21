//! Projection of structured tool arguments onto a single matchable string.
//!
//! The projection is lossy: arguments that carry their payload under an
//! unrecognized field name fall back to the whole-structure JSON string, so a
//! narrow argument glob like `git *` will not match them.

use serde_json::Value;

/// Field names probed in priority order.
const COMMAND_FIELD: &str = "command";
const PATH_FIELDS: [&str; 2] = ["path", "file_path"];
const URL_FIELD: &str = "url";

/// Closed set of argument shapes recognized at the gate boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentShape {
    Command(String),
    Path(String),
    Url(String),
    /// Canonical serialization of anything else.
    Opaque(String),
}

impl ArgumentShape {
    /// Classify tool arguments, preferring command text, then a path, then a URL.
    pub fn classify(arguments: &Value) -> Self {
        if let Some(command) = string_field(arguments, COMMAND_FIELD) {
            return ArgumentShape::Command(command.to_string());
        }
        if let Some(path) = PATH_FIELDS
            .iter()
            .find_map(|field| string_field(arguments, field))
        {
            return ArgumentShape::Path(path.to_string());
        }
        if let Some(url) = string_field(arguments, URL_FIELD) {
            return ArgumentShape::Url(url.to_string());
        }
        match arguments {
            Value::String(s) => ArgumentShape::Opaque(s.clone()),
            // serde_json keeps object keys sorted, so this form is canonical.
            other => ArgumentShape::Opaque(other.to_string()),
        }
    }

    /// The string argument globs are matched against.
    pub fn as_str(&self) -> &str {
        match self {
            ArgumentShape::Command(s)
            | ArgumentShape::Path(s)
            | ArgumentShape::Url(s)
            | ArgumentShape::Opaque(s) => s,
        }
    }
}

fn string_field<'a>(arguments: &'a Value, field: &str) -> Option<&'a str> {
    arguments.get(field).and_then(Value::as_str)
}
