//! Executes parsed commands against the monitor.
//!
//! Every outcome, including rejections, becomes text for the operator.
//! Nothing here ends the session: a bad id or a refused acknowledgment is
//! reported and the console keeps reading.

use opswatch_core::event::EventError;
use opswatch_core::ingest::EventPayload;
use opswatch_core::monitor::{EventMonitor, MonitorError};
use opswatch_core::repository::RepositoryError;
use tracing::warn;

use crate::command::{self, Command};
use crate::render;

/// Run one command and return the text to show the operator.
pub async fn execute(monitor: &EventMonitor, command: Command) -> String {
    match command {
        Command::List => match monitor.list() {
            Ok(events) => render::event_table(&events),
            Err(e) => failure(&e),
        },
        Command::Pending => match monitor.pending_alerts() {
            Ok(events) => render::event_table(&events),
            Err(e) => failure(&e),
        },
        Command::Ack(id) => match monitor.acknowledge(id).await {
            Ok(()) => format!("event {id} acknowledged\n"),
            Err(MonitorError::Repository(RepositoryError::NotFound { .. })) => {
                format!("rejected: no event with id {id}\n")
            }
            Err(MonitorError::Event(EventError::InvalidTransition { reason, .. })) => {
                format!("rejected: event {id}: {reason}\n")
            }
            Err(e) => failure(&e),
        },
        Command::Emit(raw) => {
            let payload = match EventPayload::from_json(&raw) {
                Ok(payload) => payload,
                Err(e) => return format!("rejected: {e}\n"),
            };
            match monitor.ingest(payload).await {
                Ok(event) => render::recorded(&event),
                Err(MonitorError::Event(e)) => format!("rejected: {e}\n"),
                Err(e) => failure(&e),
            }
        }
        Command::Help => command::HELP.to_owned(),
        Command::Quit => String::new(),
    }
}

fn failure(err: &MonitorError) -> String {
    warn!("Command failed: {err}");
    format!("error: {err}\n")
}
