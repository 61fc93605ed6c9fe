// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use crate::error::SyncError;

/// Split a JSON-Pointer-style path ("/foo/bar/0") into its unescaped
/// segments. An empty path addresses the document root.
fn segments(path: &str) -> Result<Vec<String>, SyncError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(SyncError::MalformedPath(path.to_string()));
    }
    Ok(path[1..]
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn index_of(map_len: usize, segment: &str, allow_append: bool) -> Result<usize, SyncError> {
    if allow_append && segment == "-" {
        return Ok(map_len);
    }
    segment.parse::<usize>().map_err(|_| SyncError::MalformedPath(segment.to_string()))
}

/// Read the value at `path`, or `None` if any segment along the way is
/// absent.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segs = segments(path).ok()?;
    let mut cur = root;
    for seg in segs {
        cur = match cur {
            Value::Object(map) => map.get(&seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Set the value at `path`, creating intermediate objects as needed.
/// The final array segment may be `-` to append.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), SyncError> {
    let segs = segments(path)?;
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut cur = root;
    for seg in parents {
        cur = match cur {
            Value::Object(map) => map.entry(seg.clone()).or_insert_with(|| Value::Object(Default::default())),
            Value::Array(items) => {
                let idx = index_of(items.len(), seg, false)?;
                items.get_mut(idx).ok_or_else(|| SyncError::PathNotFound(path.to_string()))?
            }
            _ => return Err(SyncError::PathNotFound(path.to_string())),
        };
    }

    match cur {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let idx = index_of(items.len(), last, true)?;
            if idx == items.len() {
                items.push(value);
            } else if idx < items.len() {
                items[idx] = value;
            } else {
                return Err(SyncError::PathNotFound(path.to_string()));
            }
            Ok(())
        }
        _ => Err(SyncError::PathNotFound(path.to_string())),
    }
}

/// Remove and return the value at `path`.
pub fn remove(root: &mut Value, path: &str) -> Result<Value, SyncError> {
    let segs = segments(path)?;
    let Some((last, parents)) = segs.split_last() else {
        return Err(SyncError::MalformedPath(path.to_string()));
    };

    let mut cur = root;
    for seg in parents {
        cur = match cur {
            Value::Object(map) => map.get_mut(seg).ok_or_else(|| SyncError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let idx = index_of(items.len(), seg, false)?;
                items.get_mut(idx).ok_or_else(|| SyncError::PathNotFound(path.to_string()))?
            }
            _ => return Err(SyncError::PathNotFound(path.to_string())),
        };
    }

    match cur {
        Value::Object(map) => map.remove(last).ok_or_else(|| SyncError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let idx = index_of(items.len(), last, false)?;
            if idx < items.len() {
                Ok(items.remove(idx))
            } else {
                Err(SyncError::PathNotFound(path.to_string()))
            }
        }
        _ => Err(SyncError::PathNotFound(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_reads_nested_path() {
        let v = json!({"a": {"b": 1}});
        assert_eq!(get(&v, "/a/b"), Some(&json!(1)));
    }

    #[test]
    fn get_missing_path_is_none() {
        let v = json!({"a": 1});
        assert_eq!(get(&v, "/a/b"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut v = json!({});
        set(&mut v, "/a/b", json!(5)).unwrap();
        assert_eq!(v, json!({"a": {"b": 5}}));
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut v = json!({"a": 1});
        set(&mut v, "/a", json!(2)).unwrap();
        assert_eq!(v, json!({"a": 2}));
    }

    #[test]
    fn set_append_to_array() {
        let mut v = json!({"items": [1, 2]});
        set(&mut v, "/items/-", json!(3)).unwrap();
        assert_eq!(v, json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn remove_deletes_key() {
        let mut v = json!({"a": 1, "b": 2});
        let removed = remove(&mut v, "/a").unwrap();
        assert_eq!(removed, json!(1));
        assert_eq!(v, json!({"b": 2}));
    }

    #[test]
    fn remove_missing_key_errors() {
        let mut v = json!({"a": 1});
        assert!(remove(&mut v, "/missing").is_err());
    }

    #[test]
    fn set_root_replaces_whole_document() {
        let mut v = json!({"a": 1});
        set(&mut v, "", json!({"b": 2})).unwrap();
        assert_eq!(v, json!({"b": 2}));
    }
}
