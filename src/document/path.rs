//! Dotted, index-aware path expressions into the proxy document.
//!
//! A path such as `Services.0.Listen` is split on `.`. While walking the
//! document, a segment made only of ASCII digits addresses a sequence element
//! when the cursor is a sequence; in every other position it is a plain key.
//! Reads and writes share [`step`] so both sides agree on that rule.

use serde_json::Value;
use std::fmt;

use super::error::{DocumentError, Result};

/// A parsed path expression. Always holds at least one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    raw: String,
    segments: Vec<String>,
}

impl PathExpression {
    /// Split `raw` on `.`. Empty segments are kept as literal empty keys.
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// All segments but the last, plus the last one.
    pub fn split_last(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, prefix)) => (prefix, last.as_str()),
            None => (&[], ""),
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for PathExpression {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Parse a segment as a sequence index. Only plain ASCII digits qualify, so
/// `+1`, `-0` or ` 2` stay keys. Digit strings too large for `usize` map to
/// `usize::MAX`, which is always out of range.
pub(crate) fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(segment.parse().unwrap_or(usize::MAX))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Resolve one segment below `cursor`.
pub(crate) fn step<'a>(cursor: &'a Value, segment: &str, path: &PathExpression) -> Result<&'a Value> {
    match cursor {
        Value::Array(items) => {
            let index = as_index(segment).ok_or_else(|| mismatch(path, segment, cursor))?;
            items.get(index).ok_or_else(|| DocumentError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len: items.len(),
            })
        }
        Value::Object(map) => map.get(segment).ok_or_else(|| DocumentError::PathNotFound {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
        scalar => Err(mismatch(path, segment, scalar)),
    }
}

/// Mutable twin of [`step`].
pub(crate) fn step_mut<'a>(
    cursor: &'a mut Value,
    segment: &str,
    path: &PathExpression,
) -> Result<&'a mut Value> {
    let found = kind_of(cursor);
    match cursor {
        Value::Array(items) => {
            let index = as_index(segment).ok_or_else(|| DocumentError::TypeMismatch {
                path: path.to_string(),
                segment: segment.to_string(),
                found,
            })?;
            let len = items.len();
            items.get_mut(index).ok_or_else(|| DocumentError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len,
            })
        }
        Value::Object(map) => map.get_mut(segment).ok_or_else(|| DocumentError::PathNotFound {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
        _ => Err(DocumentError::TypeMismatch {
            path: path.to_string(),
            segment: segment.to_string(),
            found,
        }),
    }
}

pub(crate) fn mismatch(path: &PathExpression, segment: &str, at: &Value) -> DocumentError {
    DocumentError::TypeMismatch {
        path: path.to_string(),
        segment: segment.to_string(),
        found: kind_of(at),
    }
}
