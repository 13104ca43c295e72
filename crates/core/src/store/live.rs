use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::{
    EventCallback, ListenerHandle, RemoteStore, StoreEvent, StorePath, SubscriptionRegistry,
};

/// A live, cancelable stream of decoded values for one store path.
///
/// Backed by exactly one upstream listener; dropping or canceling the
/// subscription deregisters exactly the `(path, handle)` pair that was
/// registered. Cancellation is idempotent. A `StoreEvent::Error` is terminal:
/// the listener is torn down and the stream ends after whatever the decode
/// callback emitted for it.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    guard: Arc<ListenerGuard>,
}

/// Shared between the subscription and the store callback, so either side
/// can tear the registration down exactly once.
struct ListenerGuard {
    store: Arc<dyn RemoteStore>,
    registry: SubscriptionRegistry,
    path: StorePath,
    handle: Mutex<Option<ListenerHandle>>,
    released: AtomicBool,
}

impl ListenerGuard {
    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().unwrap().take() {
            self.store.unsubscribe(&self.path, &handle);
            self.registry.unregister(&handle);
        }
    }
}

impl<T> Subscription<T> {
    /// Waits for the next decoded emission; `None` once the stream has
    /// ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Deregisters the upstream listener and closes the channel. A second
    /// call, or the eventual drop, is a no-op.
    pub fn cancel(&mut self) {
        self.guard.release();
        self.rx.close();
    }

    /// The path this subscription is listening on.
    pub fn path(&self) -> &StorePath {
        &self.guard.path
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Bridges one listener registration into a channel-backed subscription.
///
/// `decode` turns each raw store event into zero or more emissions on the
/// channel. Every call registers a fresh listener, so concurrent calls for
/// the same path yield independent notification streams. The registration is
/// recorded in `registry` so a sign-out sweep reaches it even if the returned
/// subscription is never canceled.
///
/// A `StoreEvent::Error` ends the subscription: after `decode` has seen the
/// event, the sender is dropped so the channel closes, and the listener is
/// deregistered from both the store and the registry.
pub fn observe<T, F>(
    store: Arc<dyn RemoteStore>,
    registry: SubscriptionRegistry,
    path: StorePath,
    decode: F,
) -> Subscription<T>
where
    T: Send + 'static,
    F: Fn(StoreEvent, &mpsc::UnboundedSender<T>) + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let guard = Arc::new(ListenerGuard {
        store: Arc::clone(&store),
        registry: registry.clone(),
        path: path.clone(),
        handle: Mutex::new(None),
        released: AtomicBool::new(false),
    });

    let callback_guard = Arc::clone(&guard);
    let sender = Mutex::new(Some(tx));
    let callback: EventCallback = Arc::new(move |event| {
        let mut slot = sender.lock().unwrap();
        let Some(out) = slot.as_ref() else { return };
        let terminal = matches!(event, StoreEvent::Error(_));
        decode(event, out);
        if terminal {
            slot.take();
            callback_guard.release();
        }
    });

    let handle = store.subscribe(&path, callback);
    *guard.handle.lock().unwrap() = Some(handle.clone());
    registry.register(path, handle);
    if guard.released.load(Ordering::SeqCst) {
        // the error arrived before the handle was recorded; finish the
        // teardown the callback could not do
        if let Some(handle) = guard.handle.lock().unwrap().take() {
            guard.store.unsubscribe(&guard.path, &handle);
            guard.registry.unregister(&handle);
        }
    }

    Subscription { rx, guard }
}
