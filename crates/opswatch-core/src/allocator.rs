//! Monotonic event id allocation.
//!
//! One [`EventIdAllocator`] is built at startup and shared (by reference or
//! `Arc`) with whatever creates events. Tests build their own so id
//! sequences are predictable and isolated.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use opswatch_types::EventId;

use crate::event::EventError;

/// First id handed out by [`EventIdAllocator::new`].
const FIRST_ID: u64 = 1;

/// Hands out strictly increasing [`EventId`] values.
///
/// Allocation is lock-free and safe from any number of threads. The
/// counter never wraps: once `u64::MAX` has been handed out, every further
/// call fails with [`EventError::IdsExhausted`].
#[derive(Debug)]
pub struct EventIdAllocator {
    /// The next id to hand out.
    next: AtomicU64,
    /// Set once `u64::MAX` itself has been allocated.
    exhausted: AtomicBool,
}

impl EventIdAllocator {
    /// Create an allocator whose first id is 1.
    pub const fn new() -> Self {
        Self::starting_at(FIRST_ID)
    }

    /// Create an allocator whose first id is `first`.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Allocate the next id.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::IdsExhausted`] once every `u64` id has been used.
    pub fn allocate(&self) -> Result<EventId, EventError> {
        if self.exhausted.load(Ordering::Acquire) {
            return Err(EventError::IdsExhausted);
        }
        let taken = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(1)
            });
        match taken {
            Ok(id) => Ok(EventId::new(id)),
            Err(last) => {
                // `last` is u64::MAX: hand it out exactly once.
                if self.exhausted.swap(true, Ordering::AcqRel) {
                    Err(EventError::IdsExhausted)
                } else {
                    Ok(EventId::new(last))
                }
            }
        }
    }

    /// The id the next successful [`allocate`](Self::allocate) would return.
    pub fn peek(&self) -> Option<EventId> {
        if self.exhausted.load(Ordering::Acquire) {
            None
        } else {
            Some(EventId::new(self.next.load(Ordering::Acquire)))
        }
    }
}

impl Default for EventIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
