//! Event repository: the single authority over stored events.
//!
//! [`EventRepository`] is the contract the rest of the crate depends on;
//! [`InMemoryEventRepository`] is the only implementation. All mutation of
//! a stored [`Event`] goes through the repository, which serializes it
//! behind one lock. Readers receive owned copies, never references into
//! the store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use opswatch_types::{AlertLevel, EventId, EventStatus};
use tracing::{debug, info};

use crate::config::{CapacityPolicy, RepositoryConfig, RepositoryKind};
use crate::event::{Event, EventError};
use crate::prioritizer;

/// Errors returned by repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No event with the given id is stored.
    #[error("event {id} not found")]
    NotFound {
        /// The requested id.
        id: EventId,
    },

    /// The repository is full and the capacity policy refused the event.
    #[error("repository full: capacity of {max_events} events reached")]
    Capacity {
        /// The configured bound.
        max_events: usize,
    },

    /// An event with the same id is already stored.
    #[error("event {id} is already stored")]
    Duplicate {
        /// The conflicting id.
        id: EventId,
    },

    /// The event itself rejected the operation.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A thread panicked while holding the repository lock.
    #[error("repository lock poisoned")]
    Poisoned,
}

/// Storage contract for events.
///
/// Implementations must serialize every mutating operation with respect to
/// each other and to [`snapshot`](Self::snapshot), and must never hand out
/// live references to stored events.
pub trait EventRepository: Send + Sync {
    /// Store a new event.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Capacity`] if the repository is full and
    /// its policy refuses the event, or [`RepositoryError::Duplicate`] if
    /// the id is already stored.
    fn add(&self, event: Event) -> Result<(), RepositoryError>;

    /// Return a copy of the event with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] for an unknown id.
    fn get(&self, id: EventId) -> Result<Event, RepositoryError>;

    /// Acknowledge the stored event with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] for an unknown id, or the
    /// event's own [`EventError::InvalidTransition`] wrapped in
    /// [`RepositoryError::Event`].
    fn acknowledge(&self, id: EventId) -> Result<(), RepositoryError>;

    /// Delete the event with the given id, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] for an unknown id.
    fn remove(&self, id: EventId) -> Result<Event, RepositoryError>;

    /// A consistent point-in-time copy of every stored event, in ascending
    /// id order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Poisoned`] if the store is unusable.
    fn snapshot(&self) -> Result<Vec<Event>, RepositoryError>;

    /// Number of stored events.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Poisoned`] if the store is unusable.
    fn len(&self) -> Result<usize, RepositoryError>;

    /// Whether the repository holds no events.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Poisoned`] if the store is unusable.
    fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }

    /// Events with the given status, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Poisoned`] if the store is unusable.
    fn by_status(&self, status: EventStatus) -> Result<Vec<Event>, RepositoryError> {
        let mut events = self.snapshot()?;
        events.retain(|event| event.status() == status);
        Ok(prioritizer::order(events))
    }

    /// Events with the given level, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Poisoned`] if the store is unusable.
    fn by_level(&self, level: AlertLevel) -> Result<Vec<Event>, RepositoryError> {
        let mut events = self.snapshot()?;
        events.retain(|event| event.level() == level);
        Ok(prioritizer::order(events))
    }
}

/// Build the repository selected by configuration.
pub fn build_repository(config: &RepositoryConfig) -> Arc<dyn EventRepository> {
    match config.kind {
        RepositoryKind::InMemory => Arc::new(InMemoryEventRepository::new(
            config.max_events,
            config.on_full,
        )),
    }
}

/// Process-local repository backed by an ordered map.
///
/// A single [`RwLock`] guards the map. Writers (`add`, `acknowledge`,
/// `remove`) take it exclusively; `snapshot` copies under a shared lock and
/// releases it before returning.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    /// Stored events keyed by id. Ascending key order is arrival order.
    events: RwLock<BTreeMap<EventId, Event>>,
    /// Optional capacity bound.
    max_events: Option<usize>,
    /// What to do when `max_events` is reached.
    policy: CapacityPolicy,
}

impl InMemoryEventRepository {
    /// Create a repository with an optional capacity bound and the policy
    /// applied when the bound is reached.
    pub const fn new(max_events: Option<usize>, policy: CapacityPolicy) -> Self {
        Self {
            events: RwLock::new(BTreeMap::new()),
            max_events,
            policy,
        }
    }

    /// Create an unbounded repository.
    pub const fn unbounded() -> Self {
        Self::new(None, CapacityPolicy::Reject)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<EventId, Event>>, RepositoryError> {
        self.events.read().map_err(|_err| RepositoryError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<EventId, Event>>, RepositoryError> {
        self.events.write().map_err(|_err| RepositoryError::Poisoned)
    }

    /// Make room for one more event according to the capacity policy.
    fn make_room(
        &self,
        events: &mut BTreeMap<EventId, Event>,
        max_events: usize,
    ) -> Result<(), RepositoryError> {
        let victim = match self.policy {
            CapacityPolicy::Reject => None,
            CapacityPolicy::EvictOldest => events.keys().next().copied(),
            CapacityPolicy::EvictOldestNormal => events
                .values()
                .find(|event| event.level() == AlertLevel::Normal)
                .map(Event::id),
        };

        let Some(victim) = victim else {
            return Err(RepositoryError::Capacity { max_events });
        };

        if let Some(evicted) = events.remove(&victim) {
            info!(
                event_id = %evicted.id(),
                level = %evicted.level(),
                source = evicted.source(),
                policy = ?self.policy,
                "Evicted event to admit a new one"
            );
        }
        Ok(())
    }
}

impl EventRepository for InMemoryEventRepository {
    fn add(&self, event: Event) -> Result<(), RepositoryError> {
        let mut events = self.write()?;
        let id = event.id();
        if events.contains_key(&id) {
            return Err(RepositoryError::Duplicate { id });
        }
        if let Some(max_events) = self.max_events
            && events.len() >= max_events
        {
            self.make_room(&mut events, max_events)?;
        }
        debug!(event_id = %id, level = %event.level(), "Event stored");
        events.insert(id, event);
        Ok(())
    }

    fn get(&self, id: EventId) -> Result<Event, RepositoryError> {
        self.read()?
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound { id })
    }

    fn acknowledge(&self, id: EventId) -> Result<(), RepositoryError> {
        let mut events = self.write()?;
        let event = events.get_mut(&id).ok_or(RepositoryError::NotFound { id })?;
        event.acknowledge()?;
        Ok(())
    }

    fn remove(&self, id: EventId) -> Result<Event, RepositoryError> {
        self.write()?
            .remove(&id)
            .ok_or(RepositoryError::NotFound { id })
    }

    fn snapshot(&self) -> Result<Vec<Event>, RepositoryError> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.len())
    }
}
