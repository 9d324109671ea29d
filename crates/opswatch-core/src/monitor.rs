//! The [`EventMonitor`] facade.
//!
//! Adapters (the operator console, an ingestion endpoint) talk to the
//! monitor only. It owns the id allocator, the repository and the alert
//! scheduler, and sequences them:
//!
//! - **record**: create, store, then register an alert if the level
//!   requires acknowledgment.
//! - **acknowledge**: mark acknowledged in the repository, then cancel the
//!   alert. When `acknowledge` returns `Ok`, the event's alert is silent
//!   for good.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opswatch_types::{AlertLevel, EventId};
use tracing::{info, warn};

use crate::allocator::EventIdAllocator;
use crate::config::{ConfigError, MonitorConfig};
use crate::emitter::AlertEmitter;
use crate::event::{Event, EventError, Metadata};
use crate::ingest::EventPayload;
use crate::prioritizer;
use crate::repository::{EventRepository, RepositoryError, build_repository};
use crate::scheduler::{AlertScheduler, AlertState, SchedulerError, SchedulerSettings};

/// Any failure surfaced by the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The event rejected the input or the transition.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The repository refused the operation.
    #[error(transparent)]
    Repository(RepositoryError),

    /// The alert could not be scheduled.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<RepositoryError> for MonitorError {
    fn from(err: RepositoryError) -> Self {
        // Entity errors surface as themselves, whichever layer raised them.
        match err {
            RepositoryError::Event(inner) => Self::Event(inner),
            other => Self::Repository(other),
        }
    }
}

/// Facade over event storage, prioritization and alerting.
pub struct EventMonitor {
    ids: Arc<EventIdAllocator>,
    repository: Arc<dyn EventRepository>,
    scheduler: AlertScheduler,
    repeat_interval: Duration,
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("next_id", &self.ids.peek())
            .field("scheduler", &self.scheduler)
            .field("repeat_interval", &self.repeat_interval)
            .finish_non_exhaustive()
    }
}

impl EventMonitor {
    /// Assemble a monitor from its parts.
    ///
    /// `scheduler` must read from the same `repository`.
    pub const fn new(
        ids: Arc<EventIdAllocator>,
        repository: Arc<dyn EventRepository>,
        scheduler: AlertScheduler,
        repeat_interval: Duration,
    ) -> Self {
        Self {
            ids,
            repository,
            scheduler,
            repeat_interval,
        }
    }

    /// Build a monitor from configuration, delivering alerts via `emitter`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the configuration does not
    /// validate.
    pub fn from_config(
        config: &MonitorConfig,
        emitter: Arc<dyn AlertEmitter>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let repeat_interval = config.alert.repeat_interval()?;
        let repository = build_repository(&config.repository);
        let scheduler = AlertScheduler::new(
            Arc::clone(&repository),
            emitter,
            SchedulerSettings::from(&config.alert),
        );

        info!(
            repeat_interval_ms = u64::try_from(repeat_interval.as_millis()).unwrap_or(u64::MAX),
            max_events = ?config.repository.max_events,
            on_full = ?config.repository.on_full,
            "Event monitor ready"
        );

        Ok(Self::new(
            Arc::new(EventIdAllocator::new()),
            repository,
            scheduler,
            repeat_interval,
        ))
    }

    /// Record a new event and, if it requires acknowledgment, start its
    /// alert. Returns a copy of the stored event.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::Event`] if the input is invalid.
    /// - [`MonitorError::Repository`] if the repository refuses it.
    /// - [`MonitorError::Scheduler`] if the alert cannot be started. The
    ///   event is then taken back out of the repository, so a refused event
    ///   is never stored without its alert.
    pub async fn record(
        &self,
        source: impl Into<String>,
        metadata: Metadata,
        level: AlertLevel,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Event, MonitorError> {
        let event = Event::create(&self.ids, source, metadata, level, timestamp)?;
        self.admit(event).await
    }

    /// Record an event from an ingestion payload.
    ///
    /// # Errors
    ///
    /// Same as [`record`](Self::record).
    pub async fn ingest(&self, payload: EventPayload) -> Result<Event, MonitorError> {
        let event = payload.into_event(&self.ids)?;
        self.admit(event).await
    }

    async fn admit(&self, event: Event) -> Result<Event, MonitorError> {
        let id = event.id();
        self.repository.add(event.clone())?;

        if event.needs_alert() {
            if let Err(e) = self.scheduler.register(id, self.repeat_interval).await {
                // Events are stored before they are registered, so undo the add.
                if let Err(remove_err) = self.repository.remove(id) {
                    warn!(event_id = %id, "Refused event could not be removed: {remove_err}");
                }
                warn!(event_id = %id, source = event.source(), "Event refused: {e}");
                return Err(e.into());
            }
        }

        info!(
            event_id = %id,
            level = %event.level(),
            source = event.source(),
            "Event recorded"
        );
        Ok(event)
    }

    /// Every stored event in display order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Repository`] if the store is unusable.
    pub fn list(&self) -> Result<Vec<Event>, MonitorError> {
        Ok(prioritizer::order(self.repository.snapshot()?))
    }

    /// Events awaiting acknowledgment (NEW WARNING and ERROR events), in
    /// display order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Repository`] if the store is unusable.
    pub fn pending_alerts(&self) -> Result<Vec<Event>, MonitorError> {
        let mut events = self.repository.snapshot()?;
        events.retain(Event::needs_alert);
        Ok(prioritizer::order(events))
    }

    /// A copy of one event.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Repository`] with
    /// [`RepositoryError::NotFound`] for an unknown id.
    pub fn get(&self, id: EventId) -> Result<Event, MonitorError> {
        Ok(self.repository.get(id)?)
    }

    /// Acknowledge an event and silence its alert.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::Repository`] with [`RepositoryError::NotFound`]
    ///   for an unknown id.
    /// - [`MonitorError::Event`] with [`EventError::InvalidTransition`] for
    ///   a NORMAL or already acknowledged event.
    pub async fn acknowledge(&self, id: EventId) -> Result<(), MonitorError> {
        self.repository.acknowledge(id)?;
        self.scheduler.cancel(id).await;
        info!(event_id = %id, "Event acknowledged");
        Ok(())
    }

    /// Alert lifecycle state for an event.
    pub async fn alert_state(&self, id: EventId) -> AlertState {
        self.scheduler.state(id).await
    }

    /// Number of alerts currently running.
    pub async fn active_alerts(&self) -> usize {
        self.scheduler.active_count().await
    }

    /// The interval between repeated alerts.
    pub const fn repeat_interval(&self) -> Duration {
        self.repeat_interval
    }

    /// Cancel every running alert. Stored events are kept.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
