//! In-memory implementation of the core's `RemoteStore`.
//!
//! A JSON tree with real listener bookkeeping and full-snapshot change
//! notification: a listener receives the current value at its path on
//! registration, then the complete value again after every mutation touching
//! its subtree (ancestor or descendant path). Backs the integration tests;
//! the production store is an external managed service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use flatman_core::store::{EventCallback, ListenerHandle, RemoteStore, StoreEvent, StorePath};
use flatman_core::{Error, Result};

struct ListenerEntry {
    path: StorePath,
    callback: EventCallback,
}

pub struct MemoryStore {
    tree: Mutex<Value>,
    listeners: Mutex<HashMap<ListenerHandle, ListenerEntry>>,
    next_handle: AtomicU64,
    denied_prefixes: Mutex<Vec<StorePath>>,
    failing_paths: Mutex<Vec<StorePath>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Value::Object(Map::new())),
            listeners: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            denied_prefixes: Mutex::new(Vec::new()),
            failing_paths: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every subsequent write at or under `prefix`.
    pub fn deny_writes_under(&self, prefix: StorePath) {
        self.denied_prefixes.lock().unwrap().push(prefix);
    }

    pub fn allow_all_writes(&self) {
        self.denied_prefixes.lock().unwrap().clear();
    }

    /// New subscriptions at exactly `path` immediately receive a terminal
    /// error and are not registered.
    pub fn fail_listeners_at(&self, path: StorePath) {
        self.failing_paths.lock().unwrap().push(path);
    }

    /// Delivers a terminal `StoreEvent::Error` to every listener registered
    /// at exactly `path`. The listeners stay in the table until the consumer
    /// side deregisters them.
    pub fn emit_error_at(&self, path: &StorePath, message: &str) {
        let pending: Vec<EventCallback> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .values()
                .filter(|entry| &entry.path == path)
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };
        for callback in pending {
            callback(StoreEvent::Error(message.to_string()));
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Current value at `path`; `Null` when absent.
    pub fn value_at(&self, path: &StorePath) -> Value {
        let tree = self.tree.lock().unwrap();
        lookup(&tree, path).cloned().unwrap_or(Value::Null)
    }

    fn write_allowed(&self, path: &StorePath) -> Result<()> {
        let denied = self.denied_prefixes.lock().unwrap();
        for prefix in denied.iter() {
            if prefix.contains(path) {
                return Err(Error::write(path.to_string(), "write denied"));
            }
        }
        Ok(())
    }

    /// Delivers a full snapshot to every listener whose path is an ancestor
    /// or descendant of the touched path. Callbacks run outside the locks.
    fn notify_touched(&self, touched: &StorePath) {
        let tree = self.tree.lock().unwrap().clone();
        let pending: Vec<(EventCallback, Value)> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .values()
                .filter(|entry| entry.path.contains(touched) || touched.contains(&entry.path))
                .map(|entry| {
                    let snapshot = lookup(&tree, &entry.path).cloned().unwrap_or(Value::Null);
                    (Arc::clone(&entry.callback), snapshot)
                })
                .collect()
        };
        for (callback, snapshot) in pending {
            callback(StoreEvent::Snapshot(snapshot));
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(&self, path: &StorePath, callback: EventCallback) -> ListenerHandle {
        let handle = ListenerHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));

        if self.failing_paths.lock().unwrap().iter().any(|p| p == path) {
            callback(StoreEvent::Error(format!("permission denied at {}", path)));
            return handle;
        }

        let snapshot = self.value_at(path);
        callback(StoreEvent::Snapshot(snapshot));
        self.listeners.lock().unwrap().insert(
            handle.clone(),
            ListenerEntry {
                path: path.clone(),
                callback,
            },
        );
        debug!("listener registered at {}", path);
        handle
    }

    fn unsubscribe(&self, path: &StorePath, handle: &ListenerHandle) {
        let mut listeners = self.listeners.lock().unwrap();
        let matches = listeners
            .get(handle)
            .map(|entry| &entry.path == path)
            .unwrap_or(false);
        if matches {
            listeners.remove(handle);
            debug!("listener deregistered at {}", path);
        }
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String> {
        self.write_allowed(path)?;
        let id = Uuid::new_v4().to_string();
        {
            let mut tree = self.tree.lock().unwrap();
            let parent = parent_map(&mut tree, path.segments());
            parent.insert(id.clone(), value);
        }
        self.notify_touched(&path.clone().child(id.clone()));
        Ok(id)
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        self.write_allowed(path)?;
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(Error::invalid_request("cannot set the tree root"));
        };
        {
            let mut tree = self.tree.lock().unwrap();
            let parent = parent_map(&mut tree, parents);
            parent.insert(last.clone(), value);
        }
        self.notify_touched(path);
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        self.write_allowed(path)?;
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(Error::invalid_request("cannot remove the tree root"));
        };
        {
            let mut tree = self.tree.lock().unwrap();
            if let Some(parent) = lookup_mut(&mut tree, parents).and_then(Value::as_object_mut) {
                parent.remove(last);
            }
        }
        self.notify_touched(path);
        Ok(())
    }
}

fn lookup<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn lookup_mut<'a>(tree: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = tree;
    for segment in segments {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

/// Walks down to the object at `segments`, creating objects along the way.
fn parent_map<'a>(tree: &'a mut Value, segments: &[String]) -> &'a mut Map<String, Value> {
    let mut current = tree;
    for segment in segments {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .expect("object ensured above")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current.as_object_mut().expect("object ensured above")
}
