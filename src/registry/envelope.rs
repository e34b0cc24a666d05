//! Streaming envelope
//!
//! Every record pushed to a streaming client is wrapped as
//! `{"type": "<kind>:entry", "data": <record>}` (or `application:info`).

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::record::{Record, RecordKind};

/// A record tagged with its kind for the streaming channel
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Record,
}

impl Envelope {
    pub fn new(record: Record) -> Self {
        Self {
            kind: record.kind().envelope_type(),
            data: record,
        }
    }

    pub fn record_kind(&self) -> RecordKind {
        self.data.kind()
    }

    /// Serialize once for sharing across every client
    pub fn to_payload(&self) -> Result<Arc<str>> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}

impl From<Record> for Envelope {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}
