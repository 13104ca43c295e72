use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use super::{ListenerHandle, RemoteStore, StorePath};

/// Bookkeeping of every live `(path, listener)` pair opened through one
/// repository, so sign-out can tear all of them down in one sweep, including
/// listeners whose consumer stream was never explicitly canceled.
///
/// Owned by a repository instance; never a process-wide singleton.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<Mutex<HashMap<ListenerHandle, StorePath>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: StorePath, handle: ListenerHandle) {
        self.entries.lock().unwrap().insert(handle, path);
    }

    /// Removes one pair. Unknown handles are a no-op, so a registry sweep
    /// followed by a subscription drop never double-deregisters.
    pub fn unregister(&self, handle: &ListenerHandle) {
        self.entries.lock().unwrap().remove(handle);
    }

    /// Deregisters every outstanding listener against `store`.
    pub fn unregister_all(&self, store: &dyn RemoteStore) {
        let drained: Vec<(ListenerHandle, StorePath)> =
            self.entries.lock().unwrap().drain().collect();
        debug!("deregistering {} outstanding listeners", drained.len());
        for (handle, path) in drained {
            store.unsubscribe(&path, &handle);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
