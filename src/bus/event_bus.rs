//! Kind-keyed publish/subscribe bus

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::error::panic_message;
use crate::record::{Entry, Record, RecordKind};

use super::subscription::{Subscription, SubscriptionId};

type Handler = Arc<dyn Fn(&Record) + Send + Sync>;

struct HandlerSlot {
    id: SubscriptionId,
    handler: Handler,
}

/// Shared bus state; subscriptions keep a weak reference to it
pub(crate) struct BusInner {
    /// Handler lists indexed by `RecordKind::index`, each behind its own lock
    handlers: [RwLock<Vec<HandlerSlot>>; RecordKind::COUNT],
    next_id: AtomicU64,
    runtime: Option<Handle>,
}

impl BusInner {
    /// Invoke a snapshot of the handlers for the record's kind
    ///
    /// The handler lock is released before any handler runs.
    fn deliver(&self, record: &Record) -> usize {
        let kind = record.kind();
        let handlers: Vec<Handler> = self.handlers[kind.index()]
            .read()
            .iter()
            .map(|slot| Arc::clone(&slot.handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(record))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::warn!(
                        kind = %kind,
                        panic = panic_message(payload.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }
        delivered
    }

    pub(crate) fn remove(&self, kind: RecordKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers[kind.index()].write();
        let before = handlers.len();
        handlers.retain(|slot| slot.id != id);
        handlers.len() != before
    }
}

/// Multicast bus delivering records to the handlers registered for their kind
///
/// Cheap to clone; clones share the same handler lists.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus
    ///
    /// If called inside a tokio runtime, asynchronous deliveries are scheduled
    /// on that runtime's blocking pool even when published from other threads.
    pub fn new() -> Self {
        Self::build(Handle::try_current().ok())
    }

    /// Create a bus that schedules asynchronous deliveries on `handle`
    pub fn with_runtime(handle: Handle) -> Self {
        Self::build(Some(handle))
    }

    fn build(runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: Default::default(),
                next_id: AtomicU64::new(1),
                runtime,
            }),
        }
    }

    /// Subscribe to records of type `E`
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Entry,
        F: Fn(&Arc<E>) + Send + Sync + 'static,
    {
        self.subscribe_kind(E::KIND, move |record| {
            if let Some(entry) = E::from_record(record) {
                handler(entry);
            }
        })
    }

    /// Subscribe to every record of `kind`
    pub fn subscribe_kind<F>(&self, kind: RecordKind, handler: F) -> Subscription
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers[kind.index()].write().push(HandlerSlot {
            id,
            handler: Arc::new(handler),
        });

        tracing::debug!(kind = %kind, subscription = id, "Handler subscribed");
        Subscription::new(Arc::downgrade(&self.inner), kind, id)
    }

    /// Remove a handler; returns false if it was already gone
    pub fn unsubscribe(&self, kind: RecordKind, id: SubscriptionId) -> bool {
        self.inner.remove(kind, id)
    }

    /// Deliver `record` synchronously on the calling thread
    ///
    /// Handlers run in registration order. A panicking handler is logged and
    /// skipped; the rest still run. Returns the number of handlers that
    /// completed.
    pub fn publish(&self, record: &Record) -> usize {
        self.inner.deliver(record)
    }

    /// Schedule delivery of `record` off the calling thread and return immediately
    ///
    /// Each call is an independent unit of work, so deliveries from
    /// concurrent or rapid publishes may run out of order.
    pub fn publish_async(&self, record: Record) {
        let inner = Arc::clone(&self.inner);
        let runtime = self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok());

        match runtime {
            Some(handle) => {
                handle.spawn_blocking(move || {
                    inner.deliver(&record);
                });
            }
            None => {
                let spawned = std::thread::Builder::new()
                    .name("event-bus-delivery".into())
                    .spawn(move || {
                        inner.deliver(&record);
                    });
                if let Err(e) = spawned {
                    tracing::error!(error = %e, "Failed to spawn event delivery thread");
                }
            }
        }
    }

    pub fn subscriber_count(&self, kind: RecordKind) -> usize {
        self.inner.handlers[kind.index()].read().len()
    }

    pub fn subscriber_count_of<E: Entry>(&self) -> usize {
        self.subscriber_count(E::KIND)
    }

    /// Drop every handler of every kind
    pub fn clear_all(&self) {
        for handlers in &self.inner.handlers {
            handlers.write().clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(RecordKind, usize)> = RecordKind::ALL
            .iter()
            .map(|&kind| (kind, self.subscriber_count(kind)))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::record::{ConsoleEntry, LogLevel, NetworkEntry};

    use super::*;

    fn log_record(message: &str) -> Record {
        Arc::new(ConsoleEntry::new(LogLevel::Information, "test", message)).into_record()
    }

    #[test]
    fn test_publish_reaches_only_matching_kind() {
        let bus = EventBus::new();
        let console_hits = Arc::new(AtomicUsize::new(0));
        let network_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&console_hits);
        let _c = bus.subscribe::<ConsoleEntry, _>(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let hits = Arc::clone(&network_hits);
        let _n = bus.subscribe::<NetworkEntry, _>(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&log_record("x")), 1);
        assert_eq!(console_hits.load(Ordering::SeqCst), 1);
        assert_eq!(network_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe_kind(RecordKind::Console, move |_| order.lock().push(n));
        }

        bus.publish(&log_record("x"));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.subscribe_kind(RecordKind::Console, |_| panic!("handler failure"));
        let hits = Arc::clone(&reached);
        bus.subscribe_kind(RecordKind::Console, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = bus.publish(&log_record("x"));

        assert_eq!(delivered, 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe_kind(RecordKind::Network, |_| {});
        assert_eq!(bus.subscriber_count(RecordKind::Network), 1);

        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(bus.subscriber_count(RecordKind::Network), 0);
        assert!(!bus.unsubscribe(RecordKind::Network, sub.id()));
    }

    #[test]
    fn test_dispose_removes_only_its_handler() {
        let bus = EventBus::new();
        let first = bus.subscribe::<ConsoleEntry, _>(|_| {});
        let _second = bus.subscribe::<ConsoleEntry, _>(|_| {});

        first.dispose();
        assert_eq!(bus.subscriber_count_of::<ConsoleEntry>(), 1);
    }

    #[test]
    fn test_unsubscribe_during_publish() {
        let bus = EventBus::new();
        let target = Arc::new(AtomicU64::new(0));
        let late_hits = Arc::new(AtomicUsize::new(0));

        let remover = bus.clone();
        let target_id = Arc::clone(&target);
        bus.subscribe_kind(RecordKind::Console, move |_| {
            remover.unsubscribe(RecordKind::Console, target_id.load(Ordering::SeqCst));
        });
        let hits = Arc::clone(&late_hits);
        let sub = bus.subscribe_kind(RecordKind::Console, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        target.store(sub.id(), Ordering::SeqCst);

        // The in-progress delivery may or may not reach the removed handler
        bus.publish(&log_record("first"));
        let after_first = late_hits.load(Ordering::SeqCst);
        assert!(after_first <= 1);

        bus.publish(&log_record("second"));
        assert_eq!(late_hits.load(Ordering::SeqCst), after_first);
        assert_eq!(bus.subscriber_count(RecordKind::Console), 1);
    }

    #[test]
    fn test_clear_all() {
        let bus = EventBus::new();
        for kind in RecordKind::ALL {
            bus.subscribe_kind(kind, |_| {});
        }

        bus.clear_all();
        for kind in RecordKind::ALL {
            assert_eq!(bus.subscriber_count(kind), 0);
        }
    }

    #[test]
    fn test_publish_async_without_runtime() {
        let bus = EventBus::new();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        bus.subscribe::<ConsoleEntry, _>(move |entry| {
            let _ = tx.lock().send(entry.message.clone());
        });

        bus.publish_async(log_record("off-thread"));
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message, "off-thread");
    }

    #[tokio::test]
    async fn test_publish_async_on_runtime() {
        let bus = EventBus::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        bus.subscribe::<ConsoleEntry, _>(move |entry| {
            let _ = tx.send(std::thread::current().id());
            assert_eq!(entry.message, "scheduled");
        });

        let caller = std::thread::current().id();
        bus.publish_async(log_record("scheduled"));

        let handler_thread = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(handler_thread, caller);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe_kind(RecordKind::Performance, |_| {});
        drop(bus);

        // No bus left to remove from; must not panic
        sub.dispose();
        assert!(sub.is_disposed());
    }
}
