//! Accessors for nested fields of untyped JSON objects
//!
//! Dynamic objects keep everything outside of `.metadata` as a [`serde_json::Value`].
//! These helpers read and write fields by path, e.g. `&["spec", "replicas"]`, and report
//! precisely where a path stopped matching the shape of the object.
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from walking a field path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Nothing is stored at the path
    #[error("field {path} not found")]
    NotFound {
        /// The dotted path that was looked up
        path: String,
    },

    /// A value along the path is not a map, so it has no fields
    #[error("{path} is not an object")]
    NotAnObject {
        /// The dotted path of the offending value
        path: String,
    },

    /// The value at the path was expected to be a list
    #[error("{path} is not an array")]
    NotAnArray {
        /// The dotted path of the offending value
        path: String,
    },

    /// A list is shorter than the requested index
    #[error("{path}[{index}] is out of bounds (length {len})")]
    IndexOutOfBounds {
        /// The dotted path of the list
        path: String,
        /// The requested index
        index: usize,
        /// The length of the list
        len: usize,
    },

    /// The value at the path has an unexpected JSON type
    #[error("{path} is not a {expected}")]
    WrongType {
        /// The dotted path of the offending value
        path: String,
        /// The expected JSON type
        expected: &'static str,
    },
}

pub(crate) fn dotted(path: &[&str]) -> String {
    path.join(".")
}

/// The value at `path`, if every segment along the way exists
pub fn nested_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.as_object()?.get(*segment))
}

/// Mutable access to the value at `path`, if every segment along the way exists
pub fn nested_field_mut<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter()
        .try_fold(value, |current, segment| current.as_object_mut()?.get_mut(*segment))
}

/// The integer at `path`
///
/// `Ok(None)` when nothing is stored there, an error when something else than an integer is.
pub fn nested_i64(value: &Value, path: &[&str]) -> Result<Option<i64>, FieldError> {
    nested_field(value, path)
        .map(|field| {
            field.as_i64().ok_or_else(|| FieldError::WrongType {
                path: dotted(path),
                expected: "integer",
            })
        })
        .transpose()
}

/// The string at `path`
///
/// `Ok(None)` when nothing is stored there, an error when something else than a string is.
pub fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Result<Option<&'a str>, FieldError> {
    nested_field(value, path)
        .map(|field| {
            field.as_str().ok_or_else(|| FieldError::WrongType {
                path: dotted(path),
                expected: "string",
            })
        })
        .transpose()
}

/// Mutable access to the list at `path`
pub fn nested_slice_mut<'a>(value: &'a mut Value, path: &[&str]) -> Result<&'a mut Vec<Value>, FieldError> {
    nested_field_mut(value, path)
        .ok_or_else(|| FieldError::NotFound { path: dotted(path) })?
        .as_array_mut()
        .ok_or_else(|| FieldError::NotAnArray { path: dotted(path) })
}

/// Mutable access to element `index` of the list at `path`
pub fn nested_item_mut<'a>(
    value: &'a mut Value,
    path: &[&str],
    index: usize,
) -> Result<&'a mut Value, FieldError> {
    let list = nested_slice_mut(value, path)?;
    let len = list.len();
    list.get_mut(index).ok_or_else(|| FieldError::IndexOutOfBounds {
        path: dotted(path),
        index,
        len,
    })
}

/// Mutable access to the map at `path`, creating it and any missing parents
pub fn nested_object_mut<'a>(
    value: &'a mut Value,
    path: &[&str],
) -> Result<&'a mut Map<String, Value>, FieldError> {
    let mut current = value;
    for depth in 0..path.len() {
        let map = current.as_object_mut().ok_or_else(|| FieldError::NotAnObject {
            path: dotted(&path[..depth]),
        })?;
        current = map
            .entry(path[depth])
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut().ok_or_else(|| FieldError::NotAnObject { path: dotted(path) })
}

/// Store `field` at `path`, creating missing parent maps
///
/// Fails without modifying anything if a parent exists but is not a map.
///
/// ```
/// use crud_core::unstructured::{nested_i64, set_nested_field};
/// let mut obj = serde_json::json!({ "spec": {} });
/// set_nested_field(&mut obj, 1.into(), &["spec", "replicas"]).unwrap();
/// assert_eq!(nested_i64(&obj, &["spec", "replicas"]), Ok(Some(1)));
/// ```
pub fn set_nested_field(value: &mut Value, field: Value, path: &[&str]) -> Result<(), FieldError> {
    let Some((last, parents)) = path.split_last() else {
        *value = field;
        return Ok(());
    };
    if let Some(depth) = blocked_at(value, parents) {
        return Err(FieldError::NotAnObject {
            path: dotted(&parents[..depth]),
        });
    }
    nested_object_mut(value, parents)?.insert((*last).to_string(), field);
    Ok(())
}

/// Remove and return the value at `path`
pub fn remove_nested_field(value: &mut Value, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    nested_field_mut(value, parents)?.as_object_mut()?.remove(*last)
}

/// Depth of the first existing non-map value along `path`, if any
fn blocked_at(value: &Value, path: &[&str]) -> Option<usize> {
    let mut current = value;
    for (depth, segment) in path.iter().enumerate() {
        let map = current.as_object()?;
        match map.get(*segment) {
            Some(next) if next.is_object() => current = next,
            Some(_) => return Some(depth + 1),
            None => return None,
        }
    }
    None
}
