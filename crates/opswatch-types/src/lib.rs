//! Shared type definitions for the `OpsWatch` event monitor.
//!
//! This crate holds the small value types that every other crate in the
//! workspace agrees on: severity levels, lifecycle states, and event
//! identifiers. None of them carry behavior beyond pure lookups.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed event identifier
//! - [`enums`] -- [`AlertLevel`] and [`EventStatus`]

pub mod enums;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use enums::{AlertLevel, EventStatus, ParseLevelError};
pub use ids::{EventId, ParseEventIdError};
