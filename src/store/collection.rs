//! Indexed collection of every record kind
//!
//! One circular store per historized kind, a single slot for the latest
//! application snapshot, and an id index over network records.
//!
//! Lock order for network operations is always store then index.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::record::{ApplicationInfo, ConsoleEntry, NetworkEntry, PerformanceEntry, RecordKind};

use super::circular::{CircularStore, Page, Ring};
use super::config::StoreConfig;

/// Index entry for a network record
#[derive(Debug, Clone)]
struct IndexSlot {
    /// Store sequence number the record was inserted with
    sequence: u64,
    entry: Arc<NetworkEntry>,
}

/// Bounded history of every record kind plus network id lookup
#[derive(Debug)]
pub struct IndexedCollection {
    network: CircularStore<Arc<NetworkEntry>>,
    network_index: RwLock<HashMap<String, IndexSlot>>,
    console: CircularStore<Arc<ConsoleEntry>>,
    performance: CircularStore<Arc<PerformanceEntry>>,
    application: RwLock<Option<Arc<ApplicationInfo>>>,
    rebuild_factor: usize,
}

impl IndexedCollection {
    /// Build the collection, failing if any capacity is zero
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            network: CircularStore::named("network", config.network_capacity)?,
            network_index: RwLock::new(HashMap::with_capacity(config.network_capacity)),
            console: CircularStore::named("console", config.console_capacity)?,
            performance: CircularStore::named("performance", config.performance_capacity)?,
            application: RwLock::new(None),
            rebuild_factor: config.index_rebuild_factor,
        })
    }

    // ------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------

    /// Retain a network record and index it by id
    ///
    /// A record with an id already in the index replaces the older mapping.
    pub fn add_network(&self, entry: Arc<NetworkEntry>) {
        let mut ring = self.network.lock();
        let mut index = self.network_index.write();

        let sequence = ring.push(Arc::clone(&entry));
        index.insert(entry.id.clone(), IndexSlot { sequence, entry });

        let threshold = ring.capacity().saturating_mul(self.rebuild_factor);
        if index.len() > threshold {
            let stale = index.len();
            rebuild_index(&ring, &mut index);
            tracing::debug!(
                stale = stale,
                live = index.len(),
                "Network index rebuilt"
            );
        }
    }

    /// Look up a retained network record by id
    ///
    /// Records that were evicted or cleared are never returned, even if the
    /// index has not been rebuilt since.
    pub fn network_by_id(&self, id: &str) -> Option<Arc<NetworkEntry>> {
        let ring = self.network.lock();
        let index = self.network_index.read();

        index
            .get(id)
            .filter(|slot| ring.retains(slot.sequence))
            .map(|slot| Arc::clone(&slot.entry))
    }

    pub fn network_all(&self) -> Vec<Arc<NetworkEntry>> {
        self.network.all()
    }

    pub fn network_range(&self, offset: usize, limit: usize) -> Vec<Arc<NetworkEntry>> {
        self.network.range(offset, limit)
    }

    pub fn network_page(&self, offset: usize, limit: usize) -> Page<Arc<NetworkEntry>> {
        self.network.page(offset, limit)
    }

    pub fn network_count(&self) -> usize {
        self.network.count()
    }

    /// Clear network history and its index together
    pub fn clear_network(&self) {
        let mut ring = self.network.lock();
        let mut index = self.network_index.write();
        ring.clear();
        index.clear();
    }

    // ------------------------------------------------------------------
    // Console
    // ------------------------------------------------------------------

    pub fn add_console(&self, entry: Arc<ConsoleEntry>) {
        self.console.add(entry);
    }

    pub fn console_all(&self) -> Vec<Arc<ConsoleEntry>> {
        self.console.all()
    }

    pub fn console_range(&self, offset: usize, limit: usize) -> Vec<Arc<ConsoleEntry>> {
        self.console.range(offset, limit)
    }

    pub fn console_page(&self, offset: usize, limit: usize) -> Page<Arc<ConsoleEntry>> {
        self.console.page(offset, limit)
    }

    pub fn console_count(&self) -> usize {
        self.console.count()
    }

    pub fn clear_console(&self) {
        self.console.clear();
    }

    // ------------------------------------------------------------------
    // Performance
    // ------------------------------------------------------------------

    pub fn add_performance(&self, entry: Arc<PerformanceEntry>) {
        self.performance.add(entry);
    }

    pub fn performance_all(&self) -> Vec<Arc<PerformanceEntry>> {
        self.performance.all()
    }

    pub fn performance_range(&self, offset: usize, limit: usize) -> Vec<Arc<PerformanceEntry>> {
        self.performance.range(offset, limit)
    }

    pub fn performance_page(&self, offset: usize, limit: usize) -> Page<Arc<PerformanceEntry>> {
        self.performance.page(offset, limit)
    }

    pub fn performance_count(&self) -> usize {
        self.performance.count()
    }

    /// Most recent resource snapshot
    pub fn latest_performance(&self) -> Option<Arc<PerformanceEntry>> {
        self.performance.latest()
    }

    pub fn clear_performance(&self) {
        self.performance.clear();
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    /// Replace the application snapshot
    pub fn set_application_info(&self, info: Arc<ApplicationInfo>) {
        *self.application.write() = Some(info);
    }

    pub fn application_info(&self) -> Option<Arc<ApplicationInfo>> {
        self.application.read().clone()
    }

    pub fn clear_application_info(&self) {
        *self.application.write() = None;
    }

    // ------------------------------------------------------------------
    // Any kind
    // ------------------------------------------------------------------

    /// Number of records held for `kind` (0 or 1 for the application slot)
    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Network => self.network_count(),
            RecordKind::Console => self.console_count(),
            RecordKind::Performance => self.performance_count(),
            RecordKind::Application => usize::from(self.application.read().is_some()),
        }
    }

    /// Clear one kind
    pub fn clear(&self, kind: RecordKind) {
        match kind {
            RecordKind::Network => self.clear_network(),
            RecordKind::Console => self.clear_console(),
            RecordKind::Performance => self.clear_performance(),
            RecordKind::Application => self.clear_application_info(),
        }
        tracing::debug!(kind = %kind, "Collection cleared");
    }

    /// Clear every kind; each kind is cleared atomically, not all of them together
    pub fn clear_all(&self) {
        for kind in RecordKind::ALL {
            self.clear(kind);
        }
    }
}

/// Repopulate the index from the store's current contents
///
/// Later records win when ids repeat, matching insertion behavior.
fn rebuild_index(ring: &Ring<Arc<NetworkEntry>>, index: &mut HashMap<String, IndexSlot>) {
    index.clear();
    for (sequence, entry) in ring.iter_sequenced() {
        index.insert(
            entry.id.clone(),
            IndexSlot {
                sequence,
                entry: Arc::clone(entry),
            },
        );
    }
}
