//! Ingestion boundary
//!
//! The [`Collector`] is the application context producers talk to. It owns the
//! indexed collection and the event bus; every `add_*` call retains the record
//! first and then schedules its publication, so a subscriber that reacts to a
//! record can always read it back from the collection.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::error::Result;
use crate::record::{ApplicationInfo, ConsoleEntry, Entry, NetworkEntry, PerformanceEntry};
use crate::store::{IndexedCollection, StoreConfig};

/// Shared handle to the collection and the bus
///
/// Cheap to clone; clones feed the same history and the same subscribers.
#[derive(Debug, Clone)]
pub struct Collector {
    collection: Arc<IndexedCollection>,
    bus: EventBus,
    config: StoreConfig,
}

impl Collector {
    /// Build a collector with fresh, empty history
    pub fn new(config: StoreConfig) -> Result<Self> {
        Self::with_bus(config, EventBus::new())
    }

    /// Build a collector publishing on an existing bus
    pub fn with_bus(config: StoreConfig, bus: EventBus) -> Result<Self> {
        let collection = Arc::new(IndexedCollection::new(&config)?);
        tracing::debug!(
            network = config.network_capacity,
            console = config.console_capacity,
            performance = config.performance_capacity,
            "Collector created"
        );

        Ok(Self {
            collection,
            bus,
            config,
        })
    }

    /// Record an HTTP exchange
    pub fn add_network(&self, entry: NetworkEntry) -> Arc<NetworkEntry> {
        let entry = Arc::new(entry);
        self.collection.add_network(Arc::clone(&entry));
        self.bus.publish_async(Arc::clone(&entry).into_record());
        entry
    }

    /// Record a log line
    pub fn add_log(&self, entry: ConsoleEntry) -> Arc<ConsoleEntry> {
        let entry = Arc::new(entry);
        self.collection.add_console(Arc::clone(&entry));
        self.bus.publish_async(Arc::clone(&entry).into_record());
        entry
    }

    /// Record a resource usage snapshot
    pub fn add_performance(&self, entry: PerformanceEntry) -> Arc<PerformanceEntry> {
        let entry = Arc::new(entry);
        self.collection.add_performance(Arc::clone(&entry));
        self.bus.publish_async(Arc::clone(&entry).into_record());
        entry
    }

    /// Replace the process identity snapshot
    pub fn set_application_info(&self, info: ApplicationInfo) -> Arc<ApplicationInfo> {
        let info = Arc::new(info);
        self.collection.set_application_info(Arc::clone(&info));
        self.bus.publish_async(Arc::clone(&info).into_record());
        info
    }

    pub fn collection(&self) -> &Arc<IndexedCollection> {
        &self.collection
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Retention settings, including the body ceiling producers should honor
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Drop all retained history
    pub fn clear_all(&self) {
        self.collection.clear_all();
        tracing::info!("Collector history cleared");
    }
}
