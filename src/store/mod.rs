//! Bounded record retention
//!
//! [`CircularStore`] is the unit of retention; [`IndexedCollection`] composes
//! one store per historized record kind with the network id index and the
//! application snapshot slot.

pub mod circular;
pub mod collection;
pub mod config;

pub use circular::{CircularStore, Page, Ring};
pub use collection::IndexedCollection;
pub use config::StoreConfig;
