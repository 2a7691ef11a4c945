//! Single-resolution signal.

use tokio::sync::watch;

/// A value that resolves at most once and can be awaited by any number of
/// waiters, before or after resolution.
///
/// Dropping a waiter's future only drops its watch receiver; the signal
/// itself is untouched.
pub(crate) struct Signal<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Signal<T> {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the signal. Returns `false` if it was already resolved, in
    /// which case `value` is discarded.
    pub(crate) fn resolve(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = value.take();
            true
        })
    }

    pub(crate) fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub(crate) async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(value) = current {
                return value;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                continue;
            }
        }
    }
}
