//! JSON tree operations shared by the local store adapters.
//!
//! The tree follows Realtime Database semantics: `null` and empty objects do
//! not exist, so writing either removes the node and empty parents are pruned.

use serde_json::{Map, Value};

use super::path::StorePath;

pub(crate) fn read(root: &Value, path: &StorePath) -> Option<Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node.clone())
    }
}

pub(crate) fn write(root: &mut Value, path: &StorePath, value: Value) {
    write_segments(root, path.segments(), prune(value));
}

pub(crate) fn update(root: &mut Value, path: &StorePath, partial: Map<String, Value>) -> Result<(), crate::error::StoreError> {
    let mut children = Vec::with_capacity(partial.len());
    for (key, value) in partial {
        children.push((path.child(&key)?, value));
    }
    for (child, value) in children {
        write(root, &child, value);
    }
    Ok(())
}

pub(crate) fn remove(root: &mut Value, path: &StorePath) {
    write_segments(root, path.segments(), Value::Null);
}

fn write_segments(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        if rest.is_empty() {
            if value.is_null() {
                map.remove(head);
            } else {
                map.insert(head.clone(), value);
            }
            return;
        }

        let child = map.entry(head.clone()).or_insert(Value::Null);
        write_segments(child, rest, value);
        if is_empty(child) {
            map.remove(head);
        }
    }
}

fn is_empty(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, prune(child)))
                .filter(|(_, child)| !is_empty(child))
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn test_write_creates_parents_and_read_returns_subtree() {
        let mut root = json!({});
        write(&mut root, &path("Riwayat/1"), json!({ "nama": "Budi" }));
        write(&mut root, &path("Riwayat/2"), json!({ "nama": "Ani" }));

        assert_eq!(read(&root, &path("Riwayat/1")), Some(json!({ "nama": "Budi" })));
        assert_eq!(read(&root, &path("Riwayat")).unwrap().as_object().unwrap().len(), 2);
        assert_eq!(read(&root, &path("Riwayat/3")), None);
        assert_eq!(read(&root, &path("Riwayat/1/nama/x")), None);
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let mut root = json!({});
        write(&mut root, &path("Riwayat/1"), json!({ "nama": "Budi" }));
        remove(&mut root, &path("Riwayat/1"));

        assert_eq!(root, json!({}));
        assert_eq!(read(&root, &path("Riwayat")), None);

        // Removing something absent is harmless
        remove(&mut root, &path("Riwayat/404"));
        assert_eq!(root, json!({}));
    }

    #[test]
    fn test_write_null_and_empty_objects_remove() {
        let mut root = json!({ "a": { "b": 1, "c": 2 } });
        write(&mut root, &path("a/b"), Value::Null);
        write(&mut root, &path("a/c"), json!({ "nested": {} }));
        assert_eq!(root, json!({}));
    }

    #[test]
    fn test_update_merges_and_removes_keys() {
        let mut root = json!({ "Riwayat": { "1": { "nama": "Budi", "umur": "6" } } });
        let partial = json!({ "umur": "7", "nama": null, "ibu": "Sari" });
        update(&mut root, &path("Riwayat/1"), partial.as_object().unwrap().clone()).unwrap();

        assert_eq!(read(&root, &path("Riwayat/1")), Some(json!({ "umur": "7", "ibu": "Sari" })));
    }

    #[test]
    fn test_update_rejects_bad_keys() {
        let mut root = json!({});
        let partial = json!({ "a.b": 1 });
        assert!(update(&mut root, &path("x"), partial.as_object().unwrap().clone()).is_err());
        assert_eq!(root, json!({}));
    }

    #[test]
    fn test_write_replaces_scalar_parent() {
        let mut root = json!({ "a": 5 });
        write(&mut root, &path("a/b"), json!(1));
        assert_eq!(root, json!({ "a": { "b": 1 } }));
    }
}
