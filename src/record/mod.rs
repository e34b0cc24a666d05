//! Telemetry record types
//!
//! Every captured event is one of four kinds. Records are immutable once built
//! and are shared behind `Arc`, so retaining a record in a store, indexing it
//! and fanning it out to subscribers never copies the payload.

pub mod application;
pub mod console;
pub mod network;
pub mod performance;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use application::ApplicationInfo;
pub use console::{ConsoleEntry, ExceptionDetail, LogLevel};
pub use network::{NetworkEntry, NetworkEntryBuilder, NetworkTiming};
pub use performance::{MemoryUsage, PerformanceEntry, ThreadCounts};

/// Kind of a telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// HTTP request/response exchange
    Network,
    /// Log line
    Console,
    /// Resource usage snapshot
    Performance,
    /// Process identity snapshot (latest value only)
    Application,
}

impl RecordKind {
    /// Number of kinds
    pub const COUNT: usize = 4;

    /// All kinds, in a stable order
    pub const ALL: [RecordKind; Self::COUNT] = [
        RecordKind::Network,
        RecordKind::Console,
        RecordKind::Performance,
        RecordKind::Application,
    ];

    /// Dense index used for per-kind tables
    pub const fn index(self) -> usize {
        match self {
            RecordKind::Network => 0,
            RecordKind::Console => 1,
            RecordKind::Performance => 2,
            RecordKind::Application => 3,
        }
    }

    /// Envelope `type` tag used on the streaming channel
    pub const fn envelope_type(self) -> &'static str {
        match self {
            RecordKind::Network => "network:entry",
            RecordKind::Console => "console:entry",
            RecordKind::Performance => "performance:entry",
            RecordKind::Application => "application:info",
        }
    }

    /// Whether records of this kind are kept as history
    pub const fn is_historized(self) -> bool {
        !matches!(self, RecordKind::Application)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Network => "network",
            RecordKind::Console => "console",
            RecordKind::Performance => "performance",
            RecordKind::Application => "application",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured record of any kind
///
/// Serializes as the bare payload, without a kind tag; the tag lives on the
/// [`Envelope`](crate::registry::Envelope).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Record {
    Network(Arc<NetworkEntry>),
    Console(Arc<ConsoleEntry>),
    Performance(Arc<PerformanceEntry>),
    Application(Arc<ApplicationInfo>),
}

impl Record {
    /// Get the kind of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Network(_) => RecordKind::Network,
            Record::Console(_) => RecordKind::Console,
            Record::Performance(_) => RecordKind::Performance,
            Record::Application(_) => RecordKind::Application,
        }
    }
}

/// A concrete record type with a fixed [`RecordKind`]
pub trait Entry: fmt::Debug + Send + Sync + 'static {
    const KIND: RecordKind;

    /// Wrap a shared entry into a [`Record`]
    fn into_record(self: Arc<Self>) -> Record;

    /// Borrow the entry out of a record of the matching kind
    fn from_record(record: &Record) -> Option<&Arc<Self>>;
}

macro_rules! impl_entry {
    ($ty:ty, $variant:ident) => {
        impl Entry for $ty {
            const KIND: RecordKind = RecordKind::$variant;

            fn into_record(self: Arc<Self>) -> Record {
                Record::$variant(self)
            }

            fn from_record(record: &Record) -> Option<&Arc<Self>> {
                match record {
                    Record::$variant(entry) => Some(entry),
                    _ => None,
                }
            }
        }
    };
}

impl_entry!(NetworkEntry, Network);
impl_entry!(ConsoleEntry, Console);
impl_entry!(PerformanceEntry, Performance);
impl_entry!(ApplicationInfo, Application);
