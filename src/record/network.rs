//! HTTP exchange records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timing breakdown of one exchange, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTiming {
    pub dns_ms: f64,
    pub connect_ms: f64,
    pub tls_ms: f64,
    pub send_ms: f64,
    /// Time to first byte
    pub wait_ms: f64,
    pub receive_ms: f64,
    pub total_ms: f64,
}

/// One captured HTTP request/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    /// Process-unique identifier, used for point lookups
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    /// Response status (None if the exchange failed before a response)
    pub status_code: Option<u16>,
    pub request_headers: BTreeMap<String, String>,
    pub response_headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    /// Original request body size in bytes, before any truncation
    pub request_body_size: usize,
    /// Original response body size in bytes, before any truncation
    pub response_body_size: usize,
    pub request_body_truncated: bool,
    pub response_body_truncated: bool,
    pub content_type: Option<String>,
    pub timing: NetworkTiming,
    pub is_error: bool,
    pub error_message: Option<String>,
}

impl NetworkEntry {
    /// Start building an entry with a freshly generated id
    pub fn builder(method: impl Into<String>, url: impl Into<String>) -> NetworkEntryBuilder {
        NetworkEntryBuilder::new(method, url)
    }
}

/// Builder for [`NetworkEntry`]
///
/// Body setters take the byte ceiling the producer is configured with and
/// truncate on a UTF-8 character boundary.
#[derive(Debug, Clone)]
pub struct NetworkEntryBuilder {
    entry: NetworkEntry,
}

impl NetworkEntryBuilder {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            entry: NetworkEntry {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                method: method.into(),
                url: url.into(),
                status_code: None,
                request_headers: BTreeMap::new(),
                response_headers: BTreeMap::new(),
                request_body: None,
                response_body: None,
                request_body_size: 0,
                response_body_size: 0,
                request_body_truncated: false,
                response_body_truncated: false,
                content_type: None,
                timing: NetworkTiming::default(),
                is_error: false,
                error_message: None,
            },
        }
    }

    /// Override the generated id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.entry.id = id.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.entry.status_code = Some(status);
        self.entry.is_error |= status >= 500;
        self
    }

    pub fn request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry.request_headers.insert(name.into(), value.into());
        self
    }

    pub fn response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("content-type") {
            self.entry.content_type = Some(value.clone());
        }
        self.entry.response_headers.insert(name, value);
        self
    }

    pub fn request_body(mut self, body: &str, max_bytes: usize) -> Self {
        let (captured, truncated) = capture_body(body, max_bytes);
        self.entry.request_body = Some(captured);
        self.entry.request_body_size = body.len();
        self.entry.request_body_truncated = truncated;
        self
    }

    pub fn response_body(mut self, body: &str, max_bytes: usize) -> Self {
        let (captured, truncated) = capture_body(body, max_bytes);
        self.entry.response_body = Some(captured);
        self.entry.response_body_size = body.len();
        self.entry.response_body_truncated = truncated;
        self
    }

    pub fn timing(mut self, timing: NetworkTiming) -> Self {
        self.entry.timing = timing;
        self
    }

    /// Mark the exchange as failed
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.entry.is_error = true;
        self.entry.error_message = Some(message.into());
        self
    }

    pub fn build(self) -> NetworkEntry {
        self.entry
    }
}

/// Truncate `body` to at most `max_bytes`, never splitting a character
fn capture_body(body: &str, max_bytes: usize) -> (String, bool) {
    if body.len() <= max_bytes {
        return (body.to_owned(), false);
    }

    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    (body[..end].to_owned(), true)
}
