//! Operator command parsing.
//!
//! One command per input line. Parsing is pure: it never touches the
//! monitor, so every grammar rule is unit-tested here.

use opswatch_types::{EventId, ParseEventIdError};

/// Help text printed by the `help` command.
pub const HELP: &str = "\
commands:
  list | ls            show all events, highest priority first
  pending              show events awaiting acknowledgment
  ack <event_id>       acknowledge an event and stop its alert
  emit <json>          record an event, e.g.
                       emit {\"source\":\"db\",\"level\":\"error\"}
  help                 show this text
  quit | exit          stop alerts and leave
";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show every event in display order.
    List,
    /// Show events still alerting.
    Pending,
    /// Acknowledge an event.
    Ack(EventId),
    /// Ingest a JSON event payload.
    Emit(String),
    /// Print usage.
    Help,
    /// Leave the console.
    Quit,
}

/// Malformed operator input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line held no command.
    #[error("empty command")]
    Empty,

    /// The verb is not a known command.
    #[error("unknown command {verb:?} (try `help`)")]
    Unknown {
        /// The unrecognized verb.
        verb: String,
    },

    /// A required argument is missing.
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        /// The command missing its argument.
        command: &'static str,
        /// Description of the missing argument.
        argument: &'static str,
    },

    /// The command takes no argument but one was given.
    #[error("`{command}` takes no argument")]
    UnexpectedArgument {
        /// The command that was over-supplied.
        command: &'static str,
    },

    /// The event id is not a number.
    #[error(transparent)]
    InvalidId(#[from] ParseEventIdError),
}

/// Parse one line of operator input.
///
/// Verbs are case-insensitive. Surrounding whitespace is ignored.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandError::Empty);
    }

    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => bare(Command::List, "list", rest),
        "pending" => bare(Command::Pending, "pending", rest),
        "help" | "?" => bare(Command::Help, "help", rest),
        "quit" | "exit" => bare(Command::Quit, "quit", rest),
        "ack" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "ack",
                    argument: "an event id",
                });
            }
            Ok(Command::Ack(rest.parse()?))
        }
        "emit" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "emit",
                    argument: "a JSON event payload",
                });
            }
            Ok(Command::Emit(rest.to_owned()))
        }
        _ => Err(CommandError::Unknown {
            verb: verb.to_owned(),
        }),
    }
}

fn bare(command: Command, name: &'static str, rest: &str) -> Result<Command, CommandError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::UnexpectedArgument { command: name })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse("list"), Ok(Command::List));
        assert_eq!(parse("  LS "), Ok(Command::List));
        assert_eq!(parse("pending"), Ok(Command::Pending));
        assert_eq!(parse("help"), Ok(Command::Help));
        assert_eq!(parse("quit"), Ok(Command::Quit));
        assert_eq!(parse("Exit"), Ok(Command::Quit));
    }

    #[test]
    fn parses_ack_with_id() {
        assert_eq!(parse("ack 17"), Ok(Command::Ack(EventId::new(17))));
        assert_eq!(parse("ACK    3"), Ok(Command::Ack(EventId::new(3))));
    }

    #[test]
    fn ack_requires_numeric_id() {
        assert!(matches!(
            parse("ack"),
            Err(CommandError::MissingArgument { command: "ack", .. })
        ));
        assert!(matches!(parse("ack db"), Err(CommandError::InvalidId(_))));
        assert!(matches!(parse("ack -1"), Err(CommandError::InvalidId(_))));
    }

    #[test]
    fn emit_keeps_payload_verbatim() {
        let cmd = parse(r#"emit {"source": "db", "level": "error"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Emit(r#"{"source": "db", "level": "error"}"#.to_owned())
        );
        assert!(matches!(
            parse("emit   "),
            Err(CommandError::MissingArgument { command: "emit", .. })
        ));
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(
            parse("delete 4"),
            Err(CommandError::Unknown {
                verb: "delete".to_owned()
            })
        );
    }

    #[test]
    fn bare_commands_reject_arguments() {
        assert_eq!(
            parse("list all"),
            Err(CommandError::UnexpectedArgument { command: "list" })
        );
    }
}
