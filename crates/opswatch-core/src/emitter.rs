//! Alert signal delivery.
//!
//! The scheduler decides *when* an alert fires; an [`AlertEmitter`] decides
//! *how* it reaches the operator. Delivery is fire-and-forget: an emitter
//! cannot fail the scheduler.

use std::io::Write;

use chrono::{DateTime, Utc};
use opswatch_types::{AlertLevel, EventId};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Capacity of the broadcast channel for alert signals.
///
/// A subscriber that falls behind by more than this many signals receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest.
const BROADCAST_CAPACITY: usize = 256;

/// ASCII bell, the audible cue written to the terminal.
const BELL: &[u8] = b"\x07";

/// One alert firing for one event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AlertSignal {
    /// The event being alerted on.
    pub event_id: EventId,
    /// Origin of the event.
    pub source: String,
    /// Severity of the event.
    pub level: AlertLevel,
    /// Whether an audible cue is requested.
    pub sound: bool,
    /// Whether a visual cue is requested.
    pub visual: bool,
    /// When the signal was produced.
    pub emitted_at: DateTime<Utc>,
    /// 1-based count of signals emitted for this event so far.
    pub sequence: u64,
}

/// Delivers alert signals to the operator.
pub trait AlertEmitter: Send + Sync {
    /// Deliver one signal.
    fn emit(&self, signal: &AlertSignal);
}

/// Emitter that reports alerts through `tracing` and rings the terminal
/// bell.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl AlertEmitter for TracingEmitter {
    fn emit(&self, signal: &AlertSignal) {
        if signal.visual {
            match signal.level {
                AlertLevel::Error => error!(
                    event_id = %signal.event_id,
                    source = %signal.source,
                    sequence = signal.sequence,
                    "ALERT: unacknowledged ERROR event"
                ),
                AlertLevel::Warning => warn!(
                    event_id = %signal.event_id,
                    source = %signal.source,
                    sequence = signal.sequence,
                    "ALERT: unacknowledged WARNING event"
                ),
                AlertLevel::Normal => info!(
                    event_id = %signal.event_id,
                    source = %signal.source,
                    sequence = signal.sequence,
                    "Alert for NORMAL event"
                ),
            }
        }

        if signal.sound {
            let mut stderr = std::io::stderr().lock();
            if let Err(e) = stderr.write_all(BELL).and_then(|()| stderr.flush()) {
                debug!(event_id = %signal.event_id, "Failed to ring terminal bell: {e}");
            }
        }
    }
}

/// Emitter that publishes every signal on a broadcast channel.
///
/// Subscribers (a UI, a test) each receive every signal sent after they
/// subscribed.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    /// Broadcast sender for alert signals.
    tx: broadcast::Sender<AlertSignal>,
}

impl BroadcastEmitter {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to alert signals.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertSignal> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertEmitter for BroadcastEmitter {
    fn emit(&self, signal: &AlertSignal) {
        // send fails only when nobody is subscribed, which is not an error.
        let delivered = self.tx.send(signal.clone()).unwrap_or(0);
        debug!(event_id = %signal.event_id, delivered, "Alert signal broadcast");
    }
}
