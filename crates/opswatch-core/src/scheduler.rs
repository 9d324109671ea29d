//! Recurring, cancellable alerts for unacknowledged events.
//!
//! The [`AlertScheduler`] runs one tokio task per alerting event. Each task
//! ticks on a fixed interval and, on every tick, re-reads the event from the
//! repository and emits an [`AlertSignal`] only while the event still needs
//! an alert.
//!
//! # Per-id lifecycle
//!
//! ```text
//! Unregistered --register--> Active --cancel / self-complete--> Cancelled
//! ```
//!
//! `Cancelled` is terminal: registering a cancelled id again is a no-op.
//! The scheduler forgets a cancelled id once its event has left the
//! repository (see [`AlertScheduler::prune_retired`]); such an id reads as
//! `Unregistered` again, and a new timer for it would find nothing to emit.
//!
//! # Cancellation
//!
//! Every alert owns a *gate*: a mutex around a `closed` flag. A tick holds
//! the gate from the moment it re-reads the event until it has emitted.
//! [`AlertScheduler::cancel`] takes the same gate and closes it, so once
//! `cancel` returns no tick for that id can emit again. Callers acknowledge
//! the event in the repository *before* calling `cancel`; the repository
//! lock, the registry lock and the gate are never held together.
//!
//! Dropping the scheduler stops every timer it started, whether or not
//! [`AlertScheduler::shutdown`] ran first.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use opswatch_types::EventId;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::emitter::{AlertEmitter, AlertSignal};
use crate::repository::{EventRepository, RepositoryError};

/// Errors returned by [`AlertScheduler::register`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The repeat interval was zero.
    #[error("alert interval must be greater than zero")]
    InvalidInterval,

    /// `register` was called outside a tokio runtime.
    #[error("no tokio runtime available to run the alert timer")]
    NoRuntime,

    /// The active-alert budget is exhausted.
    #[error("alert capacity reached: {limit} alerts already active")]
    Capacity {
        /// The configured maximum number of active alerts.
        limit: usize,
    },
}

/// Observable state of an event's alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// Never registered.
    Unregistered,
    /// A timer is running for the event.
    Active,
    /// The timer was cancelled or completed on its own. Terminal.
    Cancelled,
}

/// Signal flags and resource budget for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Request an audible cue on every signal.
    pub sound: bool,
    /// Request a visual cue on every signal.
    pub visual: bool,
    /// Maximum number of alert timers running at once.
    pub max_active_alerts: usize,
}

impl From<&AlertConfig> for SchedulerSettings {
    fn from(config: &AlertConfig) -> Self {
        Self {
            sound: config.enable_sound,
            visual: config.enable_visual,
            max_active_alerts: config.max_active_alerts,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&AlertConfig::default())
    }
}

/// Gate shared by an alert's task and whoever cancels it. `true` = closed.
type Gate = Arc<Mutex<bool>>;

/// Registry entry for a running alert.
#[derive(Debug)]
struct ActiveAlert {
    gate: Gate,
    task: JoinHandle<()>,
}

/// Retired-set size that first triggers [`AlertScheduler::prune_retired`].
const RETIRED_PRUNE_FLOOR: usize = 1024;

#[derive(Debug)]
struct Registry {
    active: HashMap<EventId, ActiveAlert>,
    /// Ids that were active once and must never be re-armed.
    retired: HashSet<EventId>,
    /// `retired` size at which `register` prunes next.
    prune_at: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            active: HashMap::new(),
            retired: HashSet::new(),
            prune_at: RETIRED_PRUNE_FLOOR,
        }
    }
}

/// Runs one recurring alert per unacknowledged event.
pub struct AlertScheduler {
    repository: Arc<dyn EventRepository>,
    emitter: Arc<dyn AlertEmitter>,
    settings: SchedulerSettings,
    registry: Arc<Mutex<Registry>>,
    /// Never sent on. Timer tasks stop once it is dropped with the scheduler.
    alive: watch::Sender<()>,
}

impl std::fmt::Debug for AlertScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertScheduler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AlertScheduler {
    /// Create a scheduler reading events from `repository` and delivering
    /// signals through `emitter`.
    pub fn new(
        repository: Arc<dyn EventRepository>,
        emitter: Arc<dyn AlertEmitter>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            repository,
            emitter,
            settings,
            registry: Arc::new(Mutex::new(Registry::default())),
            alive: watch::Sender::new(()),
        }
    }

    /// The settings this scheduler was built with.
    pub const fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Start a recurring alert for `id`, firing immediately and then every
    /// `interval`.
    ///
    /// Registering an id that is already active, or that was cancelled, is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] for a zero interval,
    /// [`SchedulerError::NoRuntime`] outside a tokio runtime, and
    /// [`SchedulerError::Capacity`] when the active-alert budget is spent.
    pub async fn register(&self, id: EventId, interval: Duration) -> Result<(), SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        let runtime = Handle::try_current().map_err(|_err| SchedulerError::NoRuntime)?;

        let mut registry = self.registry.lock().await;
        if registry.active.contains_key(&id) {
            debug!(event_id = %id, "Alert already active; register ignored");
            return Ok(());
        }
        if registry.retired.contains(&id) {
            debug!(event_id = %id, "Alert already cancelled; register ignored");
            return Ok(());
        }
        let limit = self.settings.max_active_alerts;
        if registry.active.len() >= limit {
            warn!(event_id = %id, limit, "Alert capacity reached; register refused");
            return Err(SchedulerError::Capacity { limit });
        }

        let gate: Gate = Arc::new(Mutex::new(false));
        let task = AlertTask {
            id,
            interval,
            gate: Arc::clone(&gate),
            repository: Arc::clone(&self.repository),
            emitter: Arc::clone(&self.emitter),
            registry: Arc::clone(&self.registry),
            alive: self.alive.subscribe(),
            sound: self.settings.sound,
            visual: self.settings.visual,
        };
        let handle = runtime.spawn(task.run());
        registry.active.insert(id, ActiveAlert { gate, task: handle });

        info!(
            event_id = %id,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            active = registry.active.len(),
            "Alert registered"
        );
        let prune_due = registry.retired.len() >= registry.prune_at;
        drop(registry);

        if prune_due {
            self.prune_retired().await;
        }
        Ok(())
    }

    /// Forget retired ids whose events are no longer in the repository and
    /// return how many were forgotten.
    ///
    /// Event ids are never reused, so a forgotten id cannot come back with
    /// a live event. `register` calls this whenever the retired set doubles
    /// past its last pruned size, which keeps it proportional to what the
    /// repository still holds.
    pub async fn prune_retired(&self) -> usize {
        let candidates: Vec<EventId> =
            self.registry.lock().await.retired.iter().copied().collect();
        let gone: Vec<EventId> = candidates
            .into_iter()
            .filter(|id| {
                matches!(
                    self.repository.get(*id),
                    Err(RepositoryError::NotFound { .. })
                )
            })
            .collect();

        let mut registry = self.registry.lock().await;
        for id in &gone {
            registry.retired.remove(id);
        }
        registry.prune_at = registry
            .retired
            .len()
            .saturating_mul(2)
            .max(RETIRED_PRUNE_FLOOR);
        debug!(
            forgotten = gone.len(),
            retained = registry.retired.len(),
            "Retired alerts pruned"
        );
        gone.len()
    }

    /// Stop the alert for `id`.
    ///
    /// Idempotent and infallible: cancelling an unregistered or already
    /// cancelled id does nothing. When this returns, no further signal for
    /// `id` will be emitted.
    pub async fn cancel(&self, id: EventId) {
        let removed = {
            let mut registry = self.registry.lock().await;
            let removed = registry.active.remove(&id);
            if removed.is_some() {
                registry.retired.insert(id);
            }
            removed
        };

        let Some(alert) = removed else {
            debug!(event_id = %id, "No active alert; cancel ignored");
            return;
        };

        close(alert).await;
        info!(event_id = %id, "Alert cancelled");
    }

    /// Current lifecycle state of the alert for `id`.
    pub async fn state(&self, id: EventId) -> AlertState {
        let registry = self.registry.lock().await;
        if registry.active.contains_key(&id) {
            AlertState::Active
        } else if registry.retired.contains(&id) {
            AlertState::Cancelled
        } else {
            AlertState::Unregistered
        }
    }

    /// Number of alerts currently running.
    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.active.len()
    }

    /// Cancel every active alert.
    pub async fn shutdown(&self) {
        let drained: Vec<(EventId, ActiveAlert)> = {
            let mut registry = self.registry.lock().await;
            let drained: Vec<_> = registry.active.drain().collect();
            for (id, _) in &drained {
                registry.retired.insert(*id);
            }
            drained
        };

        let cancelled = drained.len();
        for (_, alert) in drained {
            close(alert).await;
        }
        info!(cancelled, "Alert scheduler shut down");
    }
}

/// Close an alert's gate, waiting out any in-flight tick, then stop its task.
async fn close(alert: ActiveAlert) {
    *alert.gate.lock().await = true;
    alert.task.abort();
}

// ---------------------------------------------------------------------------
// Timer task
// ---------------------------------------------------------------------------

/// Everything one alert's timer task owns.
struct AlertTask {
    id: EventId,
    interval: Duration,
    gate: Gate,
    repository: Arc<dyn EventRepository>,
    emitter: Arc<dyn AlertEmitter>,
    registry: Arc<Mutex<Registry>>,
    alive: watch::Receiver<()>,
    sound: bool,
    visual: bool,
}

impl AlertTask {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sequence: u64 = 0;

        loop {
            tokio::select! {
                biased;
                // Nothing is ever sent, so this resolves once the scheduler
                // is dropped.
                _ = self.alive.changed() => {
                    debug!(event_id = %self.id, "Scheduler dropped; alert stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let closed = self.gate.lock().await;
            if *closed {
                return;
            }

            match self.repository.get(self.id) {
                Ok(event) if event.needs_alert() => {
                    sequence = sequence.saturating_add(1);
                    let signal = AlertSignal {
                        event_id: self.id,
                        source: event.source().to_owned(),
                        level: event.level(),
                        sound: self.sound,
                        visual: self.visual,
                        emitted_at: Utc::now(),
                        sequence,
                    };
                    self.emitter.emit(&signal);
                    debug!(event_id = %self.id, sequence, "Alert emitted");
                }
                Ok(_) => {
                    debug!(event_id = %self.id, "Event no longer needs an alert");
                    break;
                }
                Err(RepositoryError::NotFound { .. }) => {
                    info!(event_id = %self.id, "Event left the repository; alert stopped");
                    break;
                }
                Err(e) => {
                    warn!(event_id = %self.id, "Alert tick could not read event: {e}");
                }
            }
        }

        self.retire().await;
    }

    /// Remove this task's own registry entry after completing on its own.
    async fn retire(&self) {
        let mut registry = self.registry.lock().await;
        let ours = registry
            .active
            .get(&self.id)
            .is_some_and(|alert| Arc::ptr_eq(&alert.gate, &self.gate));
        if ours {
            registry.active.remove(&self.id);
        }
        registry.retired.insert(self.id);
        debug!(event_id = %self.id, "Alert completed");
    }
}
