//! In-process hierarchical document tree.
//!
//! Every record of the marketplace lives at a slash separated path (see
//! [`paths`]). Single writes and atomic multi-path transactions are applied
//! under one lock, and every applied write is published as a [`ChangeEvent`]
//! so live subscribers can follow a subtree.

pub mod paths;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Set,
    Remove,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub path: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    /// True when the event touches `prefix` itself, something below it, or
    /// one of its ancestors.
    pub fn touches(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return true;
        }
        is_same_or_below(&self.path, prefix) || is_same_or_below(prefix, &self.path)
    }
}

fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

#[derive(Debug, Clone)]
enum Write {
    Set(String, Value),
    Remove(String),
}

pub struct TreeStore {
    root: RwLock<Value>,
    events_tx: broadcast::Sender<ChangeEvent>,
}

impl TreeStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events_tx.subscribe()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        lookup(&self.read_root(), path).cloned()
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        decode_opt(lookup(&self.read_root(), path))
    }

    pub fn exists(&self, path: &str) -> bool {
        lookup(&self.read_root(), path).is_some()
    }

    pub fn children_as<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<(String, T)>, AppError> {
        decode_children(lookup(&self.read_root(), path))
    }

    /// Number of direct children below `path`.
    pub fn count(&self, path: &str) -> usize {
        match lookup(&self.read_root(), path) {
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    pub fn set<T: Serialize>(&self, path: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        self.apply(vec![Write::Set(path.to_string(), value)]);
        Ok(())
    }

    pub fn remove(&self, path: &str) {
        self.apply(vec![Write::Remove(path.to_string())]);
    }

    /// Runs `f` against a consistent view of the tree while holding the write
    /// lock. Writes staged on the [`Txn`] are applied together when `f`
    /// returns `Ok`, and discarded when it returns `Err`.
    ///
    /// Reads inside the transaction see the tree as it was when the
    /// transaction began, not the writes staged so far.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Txn<'_>) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut root = self.write_root();
        let mut txn = Txn {
            tree: &*root,
            writes: Vec::new(),
        };

        let outcome = f(&mut txn)?;
        let writes = txn.writes;
        let events = apply_writes(&mut root, writes);
        drop(root);

        self.publish(events);
        Ok(outcome)
    }

    fn apply(&self, writes: Vec<Write>) {
        let events = {
            let mut root = self.write_root();
            apply_writes(&mut root, writes)
        };
        self.publish(events);
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        for event in events {
            let _ = self.events_tx.send(event);
        }
    }

    fn read_root(&self) -> RwLockReadGuard<'_, Value> {
        self.root.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_root(&self) -> RwLockWriteGuard<'_, Value> {
        self.root.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Staged multi-path write. Created by [`TreeStore::transaction`].
pub struct Txn<'a> {
    tree: &'a Value,
    writes: Vec<Write>,
}

impl Txn<'_> {
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(self.tree, path)
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        decode_opt(lookup(self.tree, path))
    }

    pub fn children_as<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<(String, T)>, AppError> {
        decode_children(lookup(self.tree, path))
    }

    pub fn set<T: Serialize>(
        &mut self,
        path: impl Into<String>,
        value: &T,
    ) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        self.writes.push(Write::Set(path.into(), value));
        Ok(())
    }

    pub fn remove(&mut self, path: impl Into<String>) {
        self.writes.push(Write::Remove(path.into()));
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments(path) {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

fn decode_opt<T: DeserializeOwned>(value: Option<&Value>) -> Result<Option<T>, AppError> {
    value
        .map(|value| serde_json::from_value(value.clone()))
        .transpose()
        .map_err(AppError::from)
}

fn decode_children<T: DeserializeOwned>(
    value: Option<&Value>,
) -> Result<Vec<(String, T)>, AppError> {
    let Some(Value::Object(map)) = value else {
        return Ok(Vec::new());
    };

    map.iter()
        .map(|(key, child)| Ok((key.clone(), serde_json::from_value(child.clone())?)))
        .collect()
}

fn apply_writes(root: &mut Value, writes: Vec<Write>) -> Vec<ChangeEvent> {
    let mut events = Vec::with_capacity(writes.len());

    for write in writes {
        match write {
            Write::Set(path, Value::Null) | Write::Remove(path) => {
                let segs: Vec<&str> = segments(&path).collect();
                if segs.is_empty() {
                    *root = Value::Object(Map::new());
                } else {
                    remove_at(root, &segs);
                }
                events.push(ChangeEvent {
                    path: normalize(&path),
                    op: ChangeOp::Remove,
                });
            }
            Write::Set(path, value) => {
                let segs: Vec<&str> = segments(&path).collect();
                set_at(root, &segs, value);
                events.push(ChangeEvent {
                    path: normalize(&path),
                    op: ChangeOp::Set,
                });
            }
        }
    }

    events
}

fn set_at(node: &mut Value, segs: &[&str], value: Value) {
    let Some((head, rest)) = segs.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map
            .entry(head.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set_at(child, rest, value);
    }
}

/// Removes the value at `segs`, pruning ancestors left empty. Returns true
/// when `node` itself is now empty.
fn remove_at(node: &mut Value, segs: &[&str]) -> bool {
    let Value::Object(map) = node else {
        return false;
    };
    let Some((head, rest)) = segs.split_first() else {
        return false;
    };

    if rest.is_empty() {
        map.remove(*head);
    } else if let Some(child) = map.get_mut(*head) {
        if remove_at(child, rest) {
            map.remove(*head);
        }
    }

    map.is_empty()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{ChangeOp, TreeStore};
    use crate::error::AppError;

    #[test]
    fn set_creates_intermediate_nodes() {
        let store = TreeStore::new(16);
        store.set("vehicles/v1/location", &json!({ "lat": 1.0 })).unwrap();

        assert_eq!(store.get("vehicles/v1/location/lat"), Some(json!(1.0)));
        assert!(store.exists("vehicles/v1"));
        assert_eq!(store.count("vehicles"), 1);
    }

    #[test]
    fn remove_prunes_empty_parents() {
        let store = TreeStore::new(16);
        store.set("notifications/u1/n1", &json!({ "read": false })).unwrap();
        store.remove("notifications/u1/n1");

        assert!(!store.exists("notifications/u1"));
        assert!(!store.exists("notifications"));
    }

    #[test]
    fn null_write_removes_the_node() {
        let store = TreeStore::new(16);
        store.set("users/u1", &json!({ "name": "A" })).unwrap();
        store.set("users/u1", &Value::Null).unwrap();

        assert!(store.get("users/u1").is_none());
    }

    #[test]
    fn failed_transaction_applies_nothing() {
        let store = TreeStore::new(16);
        store.set("orders/retailer/u1/o1/status", &"pending").unwrap();

        let result: Result<(), AppError> = store.transaction(|txn| {
            txn.set("orders/retailer/u1/o1/status", &"completed")?;
            txn.set("notifications/u1/n1", &json!({ "message": "done" }))?;
            Err(AppError::Conflict("changed underneath".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(
            store.get("orders/retailer/u1/o1/status"),
            Some(json!("pending"))
        );
        assert!(store.get("notifications/u1").is_none());
    }

    #[test]
    fn committed_transaction_publishes_every_path() {
        let store = TreeStore::new(16);
        let mut rx = store.subscribe();

        store
            .transaction(|txn| {
                txn.set("a/1", &1)?;
                txn.set("/b/2/", &2)?;
                txn.remove("c");
                Ok(())
            })
            .unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let third = rx.try_recv().unwrap();
        assert_eq!(first.path, "a/1");
        assert_eq!(second.path, "b/2");
        assert_eq!(third.op, ChangeOp::Remove);
    }

    #[test]
    fn touches_matches_ancestors_and_descendants_only() {
        let store = TreeStore::new(16);
        let mut rx = store.subscribe();
        store.set("orders/retailer/u1/o1", &json!({})).unwrap();
        let event = rx.try_recv().unwrap();

        assert!(event.touches("orders"));
        assert!(event.touches("orders/retailer/u1/o1/status"));
        assert!(event.touches(""));
        assert!(!event.touches("orders/retailer/u10"));
        assert!(!event.touches("notifications"));
    }
}
