//! Plain-text rendering of events for the console.

use opswatch_core::event::Event;

/// Timestamp layout used in tables.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render events as an aligned table, one row per event, in the order
/// given.
pub fn event_table(events: &[Event]) -> String {
    if events.is_empty() {
        return "(no events)\n".to_owned();
    }

    let source_width = events
        .iter()
        .map(|event| event.source().chars().count())
        .max()
        .unwrap_or(0)
        .max("SOURCE".len());

    let header = format!(
        "{:>6}  {:<7}  {:<12}  {:<19}  {:<source_width$}  METADATA",
        "ID", "LEVEL", "STATUS", "TIMESTAMP (UTC)", "SOURCE"
    );
    let rows = events.iter().map(|event| {
        format!(
            "{:>6}  {:<7}  {:<12}  {:<19}  {:<source_width$}  {}",
            event.id().to_string(),
            event.level().as_str(),
            event.status().as_str(),
            event.timestamp().format(TIMESTAMP_FORMAT).to_string(),
            event.source(),
            metadata_cell(event),
        )
    });
    let lines: Vec<String> = std::iter::once(header).chain(rows).collect();

    let mut table = lines.join("\n");
    table.push('\n');
    table
}

/// One-line summary of a freshly recorded event.
pub fn recorded(event: &Event) -> String {
    let alerting = if event.needs_alert() {
        ", alerting until acknowledged"
    } else {
        ""
    };
    format!(
        "recorded event {} ({} from {}){alerting}\n",
        event.id(),
        event.level(),
        event.source()
    )
}

fn metadata_cell(event: &Event) -> String {
    if event.metadata().is_empty() {
        return "-".to_owned();
    }
    serde_json::to_string(event.metadata()).unwrap_or_else(|_err| "<unprintable>".to_owned())
}
