//! Subscriber registries with disposable handles.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Callback<T> = Box<dyn Fn(&[T]) + Send + Sync>;

struct Entry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

/// Ordered list of callbacks for one publication channel.
///
/// Publishing holds the registry lock, so deliveries on a channel never
/// interleave. A panicking callback is logged and skipped; later
/// subscribers still receive the snapshot. Unsubscribing only flips a flag and is safe from inside a
/// callback; subscribing to the same channel from inside one is not.
pub struct Registry<T> {
    inner: Mutex<RegistryInner<T>>,
}

struct RegistryInner<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }
}

impl<T> Registry<T> {
    /// Registers `callback` and hands it `initial()` before any publish can
    /// reach it.
    pub fn subscribe<F>(&self, callback: F, initial: impl FnOnce() -> Vec<T>) -> Subscription
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let active = Arc::new(AtomicBool::new(true));

        callback(&initial());
        inner.entries.push(Entry {
            id,
            active: active.clone(),
            callback: Box::new(callback),
        });
        Subscription { id, active }
    }

    /// Delivers `items` to every live subscriber in subscription order.
    pub fn publish(&self, items: &[T]) {
        let mut inner = self.inner.lock();
        inner.entries.retain(|entry| entry.active.load(Ordering::Acquire));
        for entry in &inner.entries {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(items))).is_err() {
                tracing::warn!(subscription = entry.id, "subscriber panicked, delivery skipped");
            }
        }
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.active.load(Ordering::Acquire))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn ids(&self) -> Vec<u64> {
        self.inner.lock().entries.iter().map(|entry| entry.id).collect()
    }
}

/// Keeps a registration alive. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn initial_delivery_happens_on_subscribe() {
        let registry = Registry::<u32>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = registry.subscribe(move |items| sink.lock().push(items.to_vec()), || vec![1, 2]);
        assert_eq!(*seen.lock(), vec![vec![1, 2]]);

        registry.publish(&[3]);
        assert_eq!(*seen.lock(), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn publishes_in_subscription_order() {
        let registry = Registry::<u8>::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|n| {
                let order = order.clone();
                registry.subscribe(move |_| order.lock().push(n), Vec::new)
            })
            .collect();
        order.lock().clear();
        registry.publish(&[0]);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(registry.ids(), subs.iter().map(Subscription::id).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_subscriber_does_not_block_later_ones() {
        let registry = Registry::<u8>::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _bad = registry.subscribe(
            |items| {
                if items == [9] {
                    panic!("subscriber failure");
                }
            },
            Vec::new,
        );
        let _good = registry.subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Vec::new,
        );

        registry.publish(&[9]);
        registry.publish(&[9]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let registry = Registry::<u8>::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = registry.subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Vec::new,
        );
        assert_eq!(registry.len(), 1);

        sub.unsubscribe();
        registry.publish(&[1]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
