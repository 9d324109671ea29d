//! Enumeration types for the `OpsWatch` event monitor.
//!
//! Both enums are closed sets. Behavior attached to a variant (priority,
//! whether acknowledgment is required) is expressed with exhaustive `match`
//! so adding a variant is a compile-time checked change.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Alert levels
// ---------------------------------------------------------------------------

/// Severity classification of an event.
///
/// Variants are declared in ascending priority so the derived [`Ord`]
/// agrees with [`AlertLevel::priority`]: `Normal < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// Routine event. Displayed, never alerted.
    Normal,
    /// Degraded condition. Alerts until acknowledged.
    Warning,
    /// Failure. Alerts until acknowledged.
    Error,
}

impl AlertLevel {
    /// Fixed integer rank of this level (`NORMAL=0`, `WARNING=1`, `ERROR=2`).
    pub const fn priority(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }

    /// Whether events at this level need an operator acknowledgment.
    pub const fn requires_acknowledgment(self) -> bool {
        match self {
            Self::Normal => false,
            Self::Warning | Self::Error => true,
        }
    }

    /// Canonical upper-case name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Every level, in ascending priority.
    pub const fn all() -> &'static [Self] {
        &[Self::Normal, Self::Warning, Self::Error]
    }
}

impl core::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an [`AlertLevel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert level: {input:?} (expected NORMAL, WARNING or ERROR)")]
pub struct ParseLevelError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for AlertLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(ParseLevelError {
                input: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Event status
// ---------------------------------------------------------------------------

/// Lifecycle state of an event.
///
/// The only transition is `New -> Acknowledged`, and it is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    /// Not yet handled by the operator.
    #[default]
    New,
    /// Handled by the operator; irreversible.
    Acknowledged,
}

impl EventStatus {
    /// Whether the event is still waiting for the operator.
    pub const fn is_new(self) -> bool {
        matches!(self, Self::New)
    }

    /// Whether the operator has acknowledged the event.
    pub const fn is_acknowledged(self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    /// Canonical upper-case name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Acknowledged => "ACKNOWLEDGED",
        }
    }
}

impl core::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
