//! The event entity and its validation and transition rules.
//!
//! An [`Event`] is an immutable occurrence record (source, metadata, level,
//! timestamp) with one mutable field: its [`EventStatus`]. The status may
//! move from `New` to `Acknowledged` exactly once, and only for levels that
//! require acknowledgment.
//!
//! Events are only ever built through [`Event::create`], which validates
//! the input before drawing an id from the injected [`EventIdAllocator`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use opswatch_types::{AlertLevel, EventId, EventStatus};

use crate::allocator::EventIdAllocator;

/// Opaque key-value payload attached to an event. Never inspected by the core.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Errors raised by the event entity itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Creation input was malformed (empty source, bad timestamp, unknown level).
    #[error("invalid event: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// An acknowledgment was attempted that the lifecycle does not allow.
    #[error("invalid transition for event {id}: {reason}")]
    InvalidTransition {
        /// The event the transition was attempted on.
        id: EventId,
        /// Why the transition was rejected.
        reason: String,
    },

    /// The id allocator has handed out every representable id.
    #[error("event id space exhausted")]
    IdsExhausted,
}

/// An operational event.
///
/// Equality and hashing consider only [`Event::id`]. The [`Ord`]
/// implementation is the display order: level priority descending, then
/// timestamp ascending, then id ascending.
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    source: String,
    metadata: Metadata,
    level: AlertLevel,
    timestamp: DateTime<Utc>,
    status: EventStatus,
}

impl Event {
    /// Create a new event in `New` status.
    ///
    /// When `timestamp` is `None` the current instant is captured. The id
    /// is allocated only after validation succeeds, so rejected input never
    /// consumes an id.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Validation`] if `source` is empty or blank, and
    /// [`EventError::IdsExhausted`] if the allocator has run out of ids.
    pub fn create(
        ids: &EventIdAllocator,
        source: impl Into<String>,
        metadata: Metadata,
        level: AlertLevel,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, EventError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(EventError::Validation {
                reason: "event source cannot be empty".to_owned(),
            });
        }

        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let id = ids.allocate()?;

        Ok(Self {
            id,
            source,
            metadata,
            level,
            timestamp,
            status: EventStatus::New,
        })
    }

    /// Acknowledge this event, moving it from `New` to `Acknowledged`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidTransition`] if the level does not
    /// require acknowledgment or the event is already acknowledged. The
    /// status is left untouched on error.
    pub fn acknowledge(&mut self) -> Result<(), EventError> {
        if !self.level.requires_acknowledgment() {
            return Err(EventError::InvalidTransition {
                id: self.id,
                reason: format!(
                    "cannot acknowledge {} event: no acknowledgment required",
                    self.level
                ),
            });
        }
        if self.status.is_acknowledged() {
            return Err(EventError::InvalidTransition {
                id: self.id,
                reason: "event is already acknowledged".to_owned(),
            });
        }
        self.status = EventStatus::Acknowledged;
        Ok(())
    }

    /// Whether this event's level requires an acknowledgment.
    pub const fn requires_acknowledgment(&self) -> bool {
        self.level.requires_acknowledgment()
    }

    /// Whether this event should currently be alerting.
    pub const fn needs_alert(&self) -> bool {
        self.requires_acknowledgment() && self.status.is_new()
    }

    /// The event's unique id.
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Origin of the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Opaque metadata supplied at creation.
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Severity level.
    pub const fn level(&self) -> AlertLevel {
        self.level
    }

    /// When the event occurred.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Current lifecycle status.
    pub const fn status(&self) -> EventStatus {
        self.status
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Same id means same event, whatever the other fields say.
        if self.id == other.id {
            return Ordering::Equal;
        }
        other
            .level
            .cmp(&self.level)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse an RFC 3339 timestamp and normalize it to UTC.
///
/// The input must carry an explicit offset (`Z` or `+hh:mm`); naive times
/// are rejected rather than guessed.
///
/// # Errors
///
/// Returns [`EventError::Validation`] if `raw` is empty, lacks an offset,
/// or is otherwise not a valid RFC 3339 instant.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EventError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EventError::Validation {
            reason: "event timestamp cannot be empty".to_owned(),
        });
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| EventError::Validation {
            reason: format!("event timestamp must be a timezone-aware RFC 3339 instant ({trimmed:?}: {e})"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap()
    }

    fn make(ids: &EventIdAllocator, level: AlertLevel) -> Event {
        Event::create(ids, "api-gateway", Metadata::new(), level, Some(fixed_timestamp()))
            .unwrap()
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let ids = EventIdAllocator::new();
        let a = make(&ids, AlertLevel::Error);
        let b = make(&ids, AlertLevel::Warning);
        let c = make(&ids, AlertLevel::Normal);
        assert_eq!(a.id(), EventId::new(1));
        assert_eq!(b.id(), EventId::new(2));
        assert_eq!(c.id(), EventId::new(3));
    }

    #[test]
    fn create_starts_new_with_given_fields() {
        let ids = EventIdAllocator::new();
        let mut metadata = Metadata::new();
        metadata.insert("error".to_owned(), serde_json::json!("timeout"));
        let event = Event::create(
            &ids,
            "db",
            metadata.clone(),
            AlertLevel::Warning,
            Some(fixed_timestamp()),
        )
        .unwrap();
        assert_eq!(event.source(), "db");
        assert_eq!(event.metadata(), &metadata);
        assert_eq!(event.level(), AlertLevel::Warning);
        assert_eq!(event.timestamp(), fixed_timestamp());
        assert_eq!(event.status(), EventStatus::New);
    }

    #[test]
    fn create_without_timestamp_uses_now() {
        let ids = EventIdAllocator::new();
        let before = Utc::now();
        let event = Event::create(&ids, "cron", Metadata::new(), AlertLevel::Normal, None)
            .unwrap();
        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= Utc::now());
    }

    #[test]
    fn empty_or_blank_source_is_rejected() {
        let ids = EventIdAllocator::new();
        for source in ["", "   ", "\t\n"] {
            let result = Event::create(&ids, source, Metadata::new(), AlertLevel::Error, None);
            assert!(matches!(result, Err(EventError::Validation { .. })));
        }
    }

    #[test]
    fn rejected_create_does_not_consume_an_id() {
        let ids = EventIdAllocator::new();
        let _ = Event::create(&ids, "", Metadata::new(), AlertLevel::Error, None);
        let event = make(&ids, AlertLevel::Error);
        assert_eq!(event.id(), EventId::new(1));
    }

    #[test]
    fn acknowledge_error_and_warning() {
        let ids = EventIdAllocator::new();
        for level in [AlertLevel::Error, AlertLevel::Warning] {
            let mut event = make(&ids, level);
            assert!(event.acknowledge().is_ok());
            assert_eq!(event.status(), EventStatus::Acknowledged);
        }
    }

    #[test]
    fn second_acknowledge_is_rejected() {
        let ids = EventIdAllocator::new();
        let mut event = make(&ids, AlertLevel::Error);
        event.acknowledge().unwrap();
        let err = event.acknowledge().unwrap_err();
        assert!(matches!(err, EventError::InvalidTransition { .. }));
        assert_eq!(event.status(), EventStatus::Acknowledged);
    }

    #[test]
    fn normal_event_cannot_be_acknowledged() {
        let ids = EventIdAllocator::new();
        let mut event = make(&ids, AlertLevel::Normal);
        let err = event.acknowledge().unwrap_err();
        assert!(matches!(err, EventError::InvalidTransition { id, .. } if id == event.id()));
        assert_eq!(event.status(), EventStatus::New);
    }

    #[test]
    fn needs_alert_matches_definition() {
        let ids = EventIdAllocator::new();
        for level in AlertLevel::all() {
            let mut event = make(&ids, *level);
            assert_eq!(
                event.needs_alert(),
                event.requires_acknowledgment() && event.status().is_new()
            );
            let _ = event.acknowledge();
            assert_eq!(
                event.needs_alert(),
                event.requires_acknowledgment() && event.status().is_new()
            );
            assert!(!event.needs_alert());
        }
    }

    #[test]
    fn equality_is_by_id_only() {
        let ids = EventIdAllocator::new();
        let a = make(&ids, AlertLevel::Error);
        let mut same = a.clone();
        same.acknowledge().unwrap();
        let other = make(&ids, AlertLevel::Error);
        assert_eq!(a, same);
        assert_ne!(a, other);
        assert_eq!(a.cmp(&same), Ordering::Equal);
    }

    #[test]
    fn order_is_level_then_timestamp_then_id() {
        let ids = EventIdAllocator::new();
        let t0 = fixed_timestamp();
        let later = t0 + Duration::seconds(5);
        let normal = Event::create(&ids, "a", Metadata::new(), AlertLevel::Normal, Some(t0)).unwrap();
        let warning_late =
            Event::create(&ids, "b", Metadata::new(), AlertLevel::Warning, Some(later)).unwrap();
        let warning_early =
            Event::create(&ids, "c", Metadata::new(), AlertLevel::Warning, Some(t0)).unwrap();
        let warning_tie =
            Event::create(&ids, "d", Metadata::new(), AlertLevel::Warning, Some(t0)).unwrap();
        let error = Event::create(&ids, "e", Metadata::new(), AlertLevel::Error, Some(later)).unwrap();

        assert!(error < warning_early);
        assert!(warning_early < warning_late);
        assert!(warning_early < warning_tie);
        assert!(warning_late < normal);
    }

    #[test]
    fn parse_timestamp_accepts_offsets() {
        let parsed = parse_timestamp("2026-02-07T14:00:00+02:00").unwrap();
        assert_eq!(parsed, fixed_timestamp());
        assert_eq!(parse_timestamp("2026-02-07T12:00:00Z").unwrap(), fixed_timestamp());
    }

    #[test]
    fn parse_timestamp_rejects_naive_and_malformed() {
        for raw in ["2026-01-01T00:00:00", "", "yesterday", "2026-13-01T00:00:00Z"] {
            assert!(matches!(
                parse_timestamp(raw),
                Err(EventError::Validation { .. })
            ));
        }
    }
}
