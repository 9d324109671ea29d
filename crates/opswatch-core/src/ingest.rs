//! JSON ingestion adapter.
//!
//! Producers hand over events as loosely typed JSON. [`EventPayload`] is
//! the wire shape; [`EventPayload::into_event`] turns it into a validated
//! [`Event`], mapping every malformed field to
//! [`EventError::Validation`].
//!
//! ```json
//! {"source": "db", "level": "error", "metadata": {"host": "pg-1"},
//!  "timestamp": "2026-02-07T12:00:00Z"}
//! ```

use opswatch_types::{AlertLevel, ParseLevelError};
use serde::Deserialize;

use crate::allocator::EventIdAllocator;
use crate::event::{Event, EventError, Metadata, parse_timestamp};

/// An event as submitted by a producer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventPayload {
    /// Origin of the event. Must not be blank.
    pub source: String,
    /// Severity name, case-insensitive (`normal`, `warning`, `error`).
    pub level: String,
    /// Opaque key-value payload.
    #[serde(default)]
    pub metadata: Metadata,
    /// RFC 3339 instant with an explicit offset. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl EventPayload {
    /// Decode a payload from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Validation`] for malformed JSON or missing
    /// required fields.
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        serde_json::from_str(raw).map_err(|e| EventError::Validation {
            reason: format!("malformed event payload: {e}"),
        })
    }

    /// Validate the payload and create the event, drawing its id from `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Validation`] for an unknown level, a bad
    /// timestamp or a blank source, and [`EventError::IdsExhausted`] if no
    /// id is left.
    pub fn into_event(self, ids: &EventIdAllocator) -> Result<Event, EventError> {
        let level: AlertLevel = self.level.parse().map_err(|e: ParseLevelError| {
            EventError::Validation {
                reason: e.to_string(),
            }
        })?;
        let timestamp = self.timestamp.as_deref().map(parse_timestamp).transpose()?;
        Event::create(ids, self.source, self.metadata, level, timestamp)
    }
}
