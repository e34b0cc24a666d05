//! Subscription handles

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use crate::record::RecordKind;

use super::event_bus::BusInner;

/// Identifier of a registered handler
pub type SubscriptionId = u64;

/// Handle to one registered handler
///
/// Dropping the handle leaves the handler registered; call
/// [`dispose`](Self::dispose) to remove it.
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: RecordKind,
    id: SubscriptionId,
    disposed: AtomicBool,
}

impl Subscription {
    pub(super) fn new(bus: Weak<BusInner>, kind: RecordKind, id: SubscriptionId) -> Self {
        Self {
            bus,
            kind,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Remove the handler from the bus; later calls do nothing
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.kind, self.id);
            tracing::debug!(kind = %self.kind, subscription = self.id, "Handler unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
