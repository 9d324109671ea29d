//! Type-safe event identifier.
//!
//! Event ids are plain 64-bit integers handed out in creation order by the
//! allocator in `opswatch-core`. Wrapping them in a newtype keeps them from
//! being mixed up with counts, sequence numbers, or capacities.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for an event, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// Wrap a raw id value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the inner `u64` value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<EventId> for u64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Error returned when a string is not a valid event id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event id: {input:?}")]
pub struct ParseEventIdError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for EventId {
    type Err = ParseEventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_err| ParseEventIdError {
                input: s.to_owned(),
            })
    }
}
