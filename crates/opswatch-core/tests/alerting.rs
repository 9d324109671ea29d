//! Alert cadence and the acknowledge/cancel race.
//!
//! Once `acknowledge` has returned, no further signal for that event may
//! ever be emitted, however the timer ticks interleave with the operator.
//! The paused-clock tests pin the cadence; the multi-thread tests run real
//! interleavings on a short interval.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opswatch_core::allocator::EventIdAllocator;
use opswatch_core::config::CapacityPolicy;
use opswatch_core::emitter::{AlertEmitter, AlertSignal};
use opswatch_core::event::Metadata;
use opswatch_core::monitor::{EventMonitor, MonitorError};
use opswatch_core::repository::{EventRepository, InMemoryEventRepository};
use opswatch_core::scheduler::{AlertScheduler, AlertState, SchedulerSettings};
use opswatch_types::{AlertLevel, EventId};

/// Counts signals per event.
#[derive(Default)]
struct CountingEmitter {
    counts: Mutex<HashMap<EventId, u64>>,
}

impl CountingEmitter {
    fn count(&self, id: EventId) -> u64 {
        self.counts.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

impl AlertEmitter for CountingEmitter {
    fn emit(&self, signal: &AlertSignal) {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(signal.event_id).or_insert(0);
        *entry = entry.saturating_add(1);
    }
}

fn monitor(interval: Duration, max_active_alerts: usize) -> (Arc<EventMonitor>, Arc<CountingEmitter>) {
    let emitter = Arc::new(CountingEmitter::default());
    let repository: Arc<dyn EventRepository> =
        Arc::new(InMemoryEventRepository::new(None, CapacityPolicy::Reject));
    let scheduler = AlertScheduler::new(
        Arc::clone(&repository),
        Arc::clone(&emitter) as Arc<dyn AlertEmitter>,
        SchedulerSettings {
            sound: false,
            visual: false,
            max_active_alerts,
        },
    );
    let monitor = EventMonitor::new(
        Arc::new(EventIdAllocator::new()),
        repository,
        scheduler,
        interval,
    );
    (Arc::new(monitor), emitter)
}

#[tokio::test(start_paused = true)]
async fn three_signals_then_silence_after_acknowledge() {
    let (monitor, emitter) = monitor(Duration::from_secs(1), 16);
    let event = monitor
        .record("db", Metadata::new(), AlertLevel::Error, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(emitter.count(event.id()), 3);

    monitor.acknowledge(event.id()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(emitter.count(event.id()), 3);
}

#[tokio::test(start_paused = true)]
async fn acknowledge_on_a_tick_boundary() {
    let (monitor, emitter) = monitor(Duration::from_secs(1), 16);
    let event = monitor
        .record("db", Metadata::new(), AlertLevel::Warning, None)
        .await
        .unwrap();

    // Land exactly on the second tick's deadline.
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.acknowledge(event.id()).await.unwrap();
    let at_ack = emitter.count(event.id());
    assert!((1..=2).contains(&at_ack));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(emitter.count(event.id()), at_ack);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_signal_after_acknowledge_returns() {
    const EVENTS: u64 = 64;
    let (monitor, emitter) = monitor(Duration::from_millis(2), 256);

    let mut ids = Vec::new();
    for n in 0..EVENTS {
        let level = if n % 2 == 0 {
            AlertLevel::Error
        } else {
            AlertLevel::Warning
        };
        let event = monitor
            .record(format!("svc-{n}"), Metadata::new(), level, None)
            .await
            .unwrap();
        ids.push(event.id());
    }

    let acks: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(n, id)| {
            let monitor = Arc::clone(&monitor);
            let emitter = Arc::clone(&emitter);
            let id = *id;
            let delay = Duration::from_micros(150).saturating_mul(u32::try_from(n).unwrap());
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                monitor.acknowledge(id).await.unwrap();
                (id, emitter.count(id))
            })
        })
        .collect();

    let mut at_ack = Vec::new();
    for handle in acks {
        at_ack.push(handle.await.unwrap());
    }

    // Give any stray timer plenty of chances to fire.
    tokio::time::sleep(Duration::from_millis(100)).await;

    for (id, count) in at_ack {
        assert_eq!(emitter.count(id), count, "event {id} alerted after acknowledge");
        assert_eq!(monitor.alert_state(id).await, AlertState::Cancelled);
    }
    assert_eq!(monitor.active_alerts().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acknowledge_succeeds_once() {
    let (monitor, emitter) = monitor(Duration::from_millis(1), 16);
    let event = monitor
        .record("db", Metadata::new(), AlertLevel::Error, None)
        .await
        .unwrap();
    let id = event.id();

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.acknowledge(id).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for attempt in attempts {
        outcomes.push(attempt.await.unwrap());
    }
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MonitorError::Event(_)))
    );

    let settled = emitter.count(id);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(emitter.count(id), settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ingestion_during_acknowledgment() {
    let (monitor, emitter) = monitor(Duration::from_millis(3), 512);

    let producer = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            let mut ids = Vec::new();
            for n in 0..100 {
                let event = monitor
                    .record(format!("node-{n}"), Metadata::new(), AlertLevel::Error, None)
                    .await
                    .unwrap();
                ids.push(event.id());
                tokio::task::yield_now().await;
            }
            ids
        })
    };

    let ids = producer.await.unwrap();
    let mut at_ack = Vec::new();
    for id in ids.iter().rev() {
        monitor.acknowledge(*id).await.unwrap();
        at_ack.push((*id, emitter.count(*id)));
        // Listing must stay consistent while alerts run.
        assert_eq!(monitor.list().unwrap().len(), 100);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    for (id, count) in at_ack {
        assert_eq!(emitter.count(id), count);
    }
    assert!(monitor.pending_alerts().unwrap().is_empty());
}
