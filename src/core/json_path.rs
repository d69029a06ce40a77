//! Dotted-path extraction of model identifiers from listing payloads.
//!
//! `data.id` walks to the `data` array and reads `id` from every element;
//! a single segment such as `id` reads from a top-level array.

use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPathError {
    /// The path itself is empty or has an empty segment.
    Invalid(String),
    MissingSegment(String),
    NotAnObject(String),
}

impl fmt::Display for JsonPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonPathError::Invalid(path) => write!(f, "invalid JSON path '{path}'"),
            JsonPathError::MissingSegment(segment) => {
                write!(f, "path segment '{segment}' not found")
            }
            JsonPathError::NotAnObject(segment) => {
                write!(f, "expected an object before segment '{segment}'")
            }
        }
    }
}

impl Error for JsonPathError {}

/// Split and validate a dotted path into `(object segments, field name)`.
pub fn parse_path(path: &str) -> Result<(Vec<&str>, &str), JsonPathError> {
    let segments: Vec<&str> = path.trim().split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(JsonPathError::Invalid(path.to_string()));
    }
    match segments.split_last() {
        Some((field, parents)) => Ok((parents.to_vec(), field)),
        None => Err(JsonPathError::Invalid(path.to_string())),
    }
}

/// Collect the string values named by `path`.
///
/// Array elements that are not objects, lack the field, or hold a non-string
/// value are skipped. If the walk ends on something other than an array the
/// result is empty rather than an error.
pub fn extract_models(value: &Value, path: &str) -> Result<Vec<String>, JsonPathError> {
    let (parents, field) = parse_path(path)?;

    let mut current = value;
    for segment in parents {
        let object = current
            .as_object()
            .ok_or_else(|| JsonPathError::NotAnObject(segment.to_string()))?;
        current = object
            .get(segment)
            .ok_or_else(|| JsonPathError::MissingSegment(segment.to_string()))?;
    }

    let models = current
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(models)
}
