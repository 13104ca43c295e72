//! Store abstraction and live query layer.
//!
//! [`RemoteStore`] is the surface of the remote per-user hierarchical store
//! (an external managed service with its own local cache and offline replay);
//! [`observe`] bridges its callback-based change notifications into
//! cancelable [`Subscription`] streams, and [`SubscriptionRegistry`] tracks
//! every live listener for bulk teardown on sign-out.

mod live;
mod path;
mod registry;

pub use live::{observe, Subscription};
pub use path::StorePath;
pub use registry::SubscriptionRegistry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// One notification delivered to a subscribed listener.
///
/// A snapshot is the complete current value at the path, never a delta. An
/// error is terminal for the subscription that receives it.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Snapshot(serde_json::Value),
    Error(String),
}

/// Opaque identity of one registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Callback invoked by the store for every event on a subscribed path.
pub type EventCallback = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// The remote per-user hierarchical data store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Registers a listener for value changes at `path`. The store delivers
    /// the current value immediately, then a full snapshot after every
    /// change. Each call registers a fresh listener; registrations are never
    /// shared.
    fn subscribe(&self, path: &StorePath, callback: EventCallback) -> ListenerHandle;

    /// Deregisters one listener. Idempotent: unknown or already-removed
    /// handles are a no-op.
    fn unsubscribe(&self, path: &StorePath, handle: &ListenerHandle);

    /// Appends `value` under a generated child key and returns the key.
    async fn push(&self, path: &StorePath, value: serde_json::Value) -> Result<String>;

    /// Overwrites the value at `path`.
    async fn set(&self, path: &StorePath, value: serde_json::Value) -> Result<()>;

    /// Removes the subtree at `path`. Removing an absent path succeeds.
    async fn remove(&self, path: &StorePath) -> Result<()>;
}
