//! Pure operations on an in-memory proxy document.
//!
//! None of these touch the disk; [`super::store::ConfigStore`] wraps them
//! in load/save cycles.

use serde_json::{Map, Value};

use super::error::{DocumentError, Result};
use super::path::{as_index, kind_of, mismatch, step, step_mut, PathExpression};

/// Top-level named sequences of the proxy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Services,
    Outbounds,
}

impl Section {
    /// Key of the sequence in the document root.
    pub fn key(self) -> &'static str {
        match self {
            Section::Services => "Services",
            Section::Outbounds => "Outbounds",
        }
    }

    /// Singular label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            Section::Services => "service",
            Section::Outbounds => "outbound",
        }
    }
}

/// Resolve `path` from the document root.
pub fn get<'a>(doc: &'a Value, path: &PathExpression) -> Result<&'a Value> {
    path.segments()
        .iter()
        .try_fold(doc, |cursor, segment| step(cursor, segment, path))
}

/// Resolve every segment but the last. Missing containers are never created.
fn parent_mut<'a>(doc: &'a mut Value, path: &PathExpression) -> Result<(&'a mut Value, String)> {
    let (prefix, last) = path.split_last();
    let mut cursor = doc;
    for segment in prefix {
        cursor = step_mut(cursor, segment, path)?;
    }
    Ok((cursor, last.to_string()))
}

/// Assign `value` at `path`. The final key is created when the parent is an
/// object; sequence slots must already exist.
pub fn set(doc: &mut Value, path: &PathExpression, value: Value) -> Result<()> {
    let (parent, last) = parent_mut(doc, path)?;
    let found = kind_of(parent);
    match parent {
        Value::Array(items) => {
            let index = as_index(&last).ok_or_else(|| DocumentError::TypeMismatch {
                path: path.to_string(),
                segment: last.clone(),
                found,
            })?;
            let len = items.len();
            let slot = items.get_mut(index).ok_or_else(|| DocumentError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len,
            })?;
            *slot = value;
            Ok(())
        }
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        _ => Err(DocumentError::TypeMismatch {
            path: path.to_string(),
            segment: last,
            found,
        }),
    }
}

/// Remove the key or element at `path`, returning what was there.
pub fn delete(doc: &mut Value, path: &PathExpression) -> Result<Value> {
    let (parent, last) = parent_mut(doc, path)?;
    let found = kind_of(parent);
    match parent {
        Value::Array(items) => {
            let index = as_index(&last).ok_or_else(|| DocumentError::TypeMismatch {
                path: path.to_string(),
                segment: last.clone(),
                found,
            })?;
            if index >= items.len() {
                return Err(DocumentError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        }
        Value::Object(map) => map.shift_remove(&last).ok_or(DocumentError::PathNotFound {
            path: path.to_string(),
            segment: last,
        }),
        _ => Err(DocumentError::TypeMismatch {
            path: path.to_string(),
            segment: last,
            found,
        }),
    }
}

fn root_map_mut<'a>(doc: &'a mut Value, section: Section) -> Result<&'a mut Map<String, Value>> {
    let path = PathExpression::parse(section.key());
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(mismatch(&path, section.key(), other)),
    }
}

/// Borrow the section's sequence, if present.
fn section_items(doc: &Value, section: Section) -> Result<Option<&Vec<Value>>> {
    let path = PathExpression::parse(section.key());
    match doc.get(section.key()) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(mismatch(&path, section.key(), other)),
    }
}

fn entry_name(entry: &Value) -> Option<&str> {
    entry.get("Name").and_then(Value::as_str)
}

/// Append `entry` to the section, creating the sequence when absent.
/// Name uniqueness is not checked here; see [`ensure_unique_name`].
pub fn append_entry(doc: &mut Value, section: Section, entry: Value) -> Result<()> {
    let path = PathExpression::parse(section.key());
    let root = root_map_mut(doc, section)?;
    let slot = root
        .entry(section.key())
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(items) => {
            items.push(entry);
            Ok(())
        }
        other => Err(mismatch(&path, section.key(), other)),
    }
}

/// Fail with `DuplicateEntry` when the section already holds `name`.
pub fn ensure_unique_name(doc: &Value, section: Section, name: &str) -> Result<()> {
    let taken = section_items(doc, section)?
        .map(|items| items.iter().any(|e| entry_name(e) == Some(name)))
        .unwrap_or(false);
    if taken {
        return Err(DocumentError::DuplicateEntry {
            section: section.label(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Remove the first entry whose `Name` equals `name`. The document is left
/// untouched when nothing matches.
pub fn remove_entry(doc: &mut Value, section: Section, name: &str) -> Result<Value> {
    let not_found = || DocumentError::EntryNotFound {
        section: section.label(),
        name: name.to_string(),
    };
    let position = section_items(doc, section)?
        .and_then(|items| items.iter().position(|e| entry_name(e) == Some(name)))
        .ok_or_else(not_found)?;

    match doc.get_mut(section.key()) {
        Some(Value::Array(items)) => Ok(items.remove(position)),
        _ => Err(not_found()),
    }
}
