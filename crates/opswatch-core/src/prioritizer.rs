//! Deterministic display ordering for events.
//!
//! Higher severity first, then earlier timestamp, then lower id. The key is
//! [`Event`]'s [`Ord`] implementation; these helpers only apply it.

use crate::event::Event;

/// Order events for display.
///
/// The sort is stable and total, so any input multiset produces the same
/// output regardless of its initial order.
pub fn order(mut events: Vec<Event>) -> Vec<Event> {
    events.sort();
    events
}

/// Clone and order a borrowed slice of events.
pub fn order_slice(events: &[Event]) -> Vec<Event> {
    order(events.to_vec())
}
