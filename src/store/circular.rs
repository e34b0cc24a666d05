//! Fixed-capacity circular store
//!
//! The unit of bounded retention: once full, every insert silently discards
//! the oldest item. Iteration is always oldest to newest regardless of where
//! the ring has wrapped to internally.

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// A page of items together with the store size observed at the same instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Ring buffer state guarded by a [`CircularStore`]'s mutex
///
/// Every insert is assigned a monotonically increasing sequence number. The
/// retained items always cover the contiguous sequence window
/// `[next_sequence - count, next_sequence)`.
#[derive(Debug)]
pub struct Ring<T> {
    slots: Vec<Option<T>>,
    /// Physical slot of the oldest item
    head: usize,
    /// Physical slot the next insert writes to
    tail: usize,
    count: usize,
    next_sequence: u64,
}

impl<T: Clone> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            head: 0,
            tail: 0,
            count: 0,
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Insert an item, overwriting the oldest one if full
    ///
    /// Returns the sequence number assigned to the item.
    pub fn push(&mut self, item: T) -> u64 {
        let capacity = self.capacity();
        let sequence = self.next_sequence;

        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % capacity;

        if self.count == capacity {
            // Slot at head was just overwritten
            self.head = (self.head + 1) % capacity;
        } else {
            self.count += 1;
        }

        self.next_sequence += 1;
        sequence
    }

    /// Get the item `offset` positions after the oldest one
    pub fn get(&self, offset: usize) -> Option<&T> {
        if offset >= self.count {
            return None;
        }
        self.slots[(self.head + offset) % self.capacity()].as_ref()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |offset| self.get(offset))
    }

    /// Iterate oldest to newest, paired with each item's sequence number
    pub fn iter_sequenced(&self) -> impl Iterator<Item = (u64, &T)> + '_ {
        let first = self.first_sequence();
        self.iter()
            .enumerate()
            .map(move |(offset, item)| (first + offset as u64, item))
    }

    /// Copy out `limit` items starting `offset` after the oldest
    ///
    /// A `limit` of zero means everything from `offset` on.
    pub fn range(&self, offset: usize, limit: usize) -> Vec<T> {
        if offset >= self.count {
            return Vec::new();
        }

        let available = self.count - offset;
        let take = if limit == 0 { available } else { limit.min(available) };

        (offset..offset + take)
            .filter_map(|i| self.get(i).cloned())
            .collect()
    }

    pub fn latest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.capacity();
        self.slots[(self.tail + capacity - 1) % capacity].as_ref()
    }

    /// Sequence number of the oldest retained item
    pub fn first_sequence(&self) -> u64 {
        self.next_sequence - self.count as u64
    }

    /// Whether the item inserted with `sequence` is still retained
    pub fn retains(&self, sequence: u64) -> bool {
        sequence >= self.first_sequence() && sequence < self.next_sequence
    }

    /// Drop every item; sequence numbering continues
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

/// Thread-safe fixed-capacity store that overwrites its oldest item when full
///
/// Every operation holds the same mutex for its full duration, so no reader
/// ever observes a partially written slot.
#[derive(Debug)]
pub struct CircularStore<T> {
    name: &'static str,
    ring: Mutex<Ring<T>>,
}

impl<T: Clone> CircularStore<T> {
    /// Create a store holding at most `capacity` items
    ///
    /// Fails if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::named("circular store", capacity)
    }

    /// Create a store with a name used in errors and logs
    pub fn named(name: &'static str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { name });
        }

        Ok(Self {
            name,
            ring: Mutex::new(Ring::with_capacity(capacity)),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add an item, discarding the oldest one if the store is full
    ///
    /// Returns the item's sequence number.
    pub fn add(&self, item: T) -> u64 {
        self.ring.lock().push(item)
    }

    pub fn count(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    /// Snapshot of every item, oldest to newest
    pub fn all(&self) -> Vec<T> {
        self.ring.lock().iter().cloned().collect()
    }

    /// Snapshot of `limit` items after skipping `offset` from the oldest
    ///
    /// `limit == 0` returns everything remaining; an `offset` past the end
    /// returns an empty vector.
    pub fn range(&self, offset: usize, limit: usize) -> Vec<T> {
        self.ring.lock().range(offset, limit)
    }

    /// Like [`range`](Self::range), also reporting the count seen under the same lock
    pub fn page(&self, offset: usize, limit: usize) -> Page<T> {
        let ring = self.ring.lock();
        Page {
            items: ring.range(offset, limit),
            total: ring.len(),
        }
    }

    /// Most recently added item
    pub fn latest(&self) -> Option<T> {
        self.ring.lock().latest().cloned()
    }

    pub fn clear(&self) {
        self.ring.lock().clear();
    }

    /// Lock the ring for a composite operation
    pub fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.ring.lock()
    }
}
