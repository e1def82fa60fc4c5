//! Path operations on a JSON data tree.
//!
//! Containers are JSON objects; anything else is a leaf value that cannot
//! be traversed.

use serde_json::{Map, Value};

use super::DataPath;
use crate::error::StoreError;

/// Returns the node at `path`, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`StoreError::NotTraversable`] if an intermediate segment is a
/// leaf value.
pub fn read_at<'a>(root: &'a Value, path: &DataPath) -> Result<Option<&'a Value>, StoreError> {
    let mut current = root;
    for segment in path.segments() {
        let Value::Object(map) = current else {
            return Err(StoreError::NotTraversable(path.to_string()));
        };
        match map.get(segment) {
            Some(child) => current = child,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Replaces the node at `path` with `value`, creating missing containers.
///
/// # Errors
///
/// Returns [`StoreError::NotTraversable`] if an intermediate segment is a
/// leaf value.
pub fn put_at(root: &mut Value, path: &DataPath, value: Value) -> Result<(), StoreError> {
    *container_at(root, path)? = value;
    Ok(())
}

/// Deep-merges `value` into the node at `path`, creating missing containers.
///
/// Objects merge key by key; any other value replaces what is there.
///
/// # Errors
///
/// Returns [`StoreError::NotTraversable`] if an intermediate segment is a
/// leaf value.
pub fn merge_at(root: &mut Value, path: &DataPath, value: Value) -> Result<(), StoreError> {
    deep_merge(container_at(root, path)?, value);
    Ok(())
}

/// Removes the node at `path`. Removing a missing node is a no-op; removing
/// the root leaves an empty tree.
///
/// # Errors
///
/// Returns [`StoreError::NotTraversable`] if an intermediate segment is a
/// leaf value.
pub fn delete_at(root: &mut Value, path: &DataPath) -> Result<(), StoreError> {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = Value::Object(Map::new());
        return Ok(());
    };
    let mut current = root;
    for segment in parents {
        let Value::Object(map) = current else {
            return Err(StoreError::NotTraversable(path.to_string()));
        };
        match map.get_mut(segment) {
            Some(child) => current = child,
            None => return Ok(()),
        }
    }
    match current {
        Value::Object(map) => {
            map.remove(last);
            Ok(())
        }
        _ => Err(StoreError::NotTraversable(path.to_string())),
    }
}

fn container_at<'a>(root: &'a mut Value, path: &DataPath) -> Result<&'a mut Value, StoreError> {
    let mut current = root;
    for segment in path.segments() {
        let Value::Object(map) = current else {
            return Err(StoreError::NotTraversable(path.to_string()));
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(current)
}

fn deep_merge(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, child) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, child),
                    None => {
                        existing.insert(key, child);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn put_creates_intermediate_containers() {
        let mut root = json!({});
        let path = DataPath::parse("interfaces/eth0");
        let Ok(()) = put_at(&mut root, &path, json!({"mtu": 1500})) else {
            panic!("put failed");
        };
        assert_eq!(root, json!({"interfaces": {"eth0": {"mtu": 1500}}}));
    }

    #[test]
    fn merge_keeps_untouched_siblings() {
        let mut root = json!({"system": {"hostname": "r1", "ntp": {"enabled": false}}});
        let path = DataPath::parse("system");
        let Ok(()) = merge_at(&mut root, &path, json!({"ntp": {"enabled": true}, "domain": "lab"}))
        else {
            panic!("merge failed");
        };
        assert_eq!(
            root,
            json!({"system": {"hostname": "r1", "ntp": {"enabled": true}, "domain": "lab"}})
        );
    }

    #[test]
    fn delete_missing_node_is_noop() {
        let mut root = json!({"a": {"b": 1}});
        assert!(delete_at(&mut root, &DataPath::parse("x/y")).is_ok());
        assert!(delete_at(&mut root, &DataPath::parse("a/b")).is_ok());
        assert_eq!(root, json!({"a": {}}));
    }

    #[test]
    fn traversing_leaf_is_rejected() {
        let mut root = json!({"a": 1});
        let path = DataPath::parse("a/b");
        assert!(matches!(
            put_at(&mut root, &path, json!(2)),
            Err(StoreError::NotTraversable(_))
        ));
        assert!(matches!(read_at(&root, &path), Err(StoreError::NotTraversable(_))));
    }

    #[test]
    fn read_returns_none_for_missing() {
        let root = json!({"a": {"b": 1}});
        let Ok(found) = read_at(&root, &DataPath::parse("a/b")) else {
            panic!("read failed");
        };
        assert_eq!(found, Some(&json!(1)));
        assert!(matches!(read_at(&root, &DataPath::parse("a/c")), Ok(None)));
    }
}
