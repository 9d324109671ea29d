//! Event store, prioritization, and recurring alert scheduling for `OpsWatch`.
//!
//! This crate owns the event lifecycle: an event is created and validated,
//! stored in a repository, ranked for display, and, when its severity
//! demands it, alerted on a fixed cadence until the operator acknowledges
//! it.
//!
//! # Modules
//!
//! - [`allocator`] -- Monotonic [`EventIdAllocator`].
//! - [`config`] -- Configuration loading from `opswatch.yaml` into
//!   strongly-typed structs.
//! - [`emitter`] -- [`AlertEmitter`] trait, [`TracingEmitter`] and
//!   [`BroadcastEmitter`].
//! - [`event`] -- The [`Event`] entity and its validation and transition
//!   rules.
//! - [`ingest`] -- JSON payload adapter producing validated events.
//! - [`monitor`] -- [`EventMonitor`] facade wiring ingestion, listing and
//!   acknowledgment.
//! - [`prioritizer`] -- Deterministic display ordering.
//! - [`repository`] -- [`EventRepository`] trait and the in-memory store.
//! - [`scheduler`] -- [`AlertScheduler`]: one cancellable timer per
//!   alerting event.
//!
//! # Acknowledgment ordering
//!
//! Acknowledging an event first marks it acknowledged in the repository and
//! only then cancels its timer. Every timer tick re-reads the event under
//! that alert's gate right before emitting, so once
//! [`EventMonitor::acknowledge`] returns no further signal for the event is
//! ever emitted.
//!
//! [`EventIdAllocator`]: allocator::EventIdAllocator
//! [`AlertEmitter`]: emitter::AlertEmitter
//! [`TracingEmitter`]: emitter::TracingEmitter
//! [`BroadcastEmitter`]: emitter::BroadcastEmitter
//! [`Event`]: event::Event
//! [`EventMonitor`]: monitor::EventMonitor
//! [`EventMonitor::acknowledge`]: monitor::EventMonitor::acknowledge
//! [`EventRepository`]: repository::EventRepository
//! [`AlertScheduler`]: scheduler::AlertScheduler

pub mod allocator;
pub mod config;
pub mod emitter;
pub mod event;
pub mod ingest;
pub mod monitor;
pub mod prioritizer;
pub mod repository;
pub mod scheduler;
