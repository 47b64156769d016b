//! Error types for protocol operations.

use thiserror::Error;

use crate::command::CommandKind;

/// Errors that can occur while validating, mutating, or serializing a
/// command protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Wrong number of arguments for a command.
    #[error("{command} expects {expected} argument(s), got {got}")]
    BadArity {
        command: CommandKind,
        expected: usize,
        got: usize,
    },

    /// A command that addresses a chart was given no target id.
    #[error("{command} requires a target chart id")]
    MissingTarget { command: CommandKind },

    /// A command that takes no target was given one.
    #[error("{command} does not take a target chart id (got {target})")]
    UnexpectedTarget { command: CommandKind, target: String },

    /// Bookmark names a command kind this build does not know.
    #[error("unknown command kind in bookmark: {0}")]
    UnknownCommand(String),

    /// Record index out of bounds.
    #[error("no protocol record at index {0}")]
    NoSuchRecord(usize),

    /// Bookmark (de)serialization failed.
    #[error("bookmark serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bookmark file could not be read or written.
    #[error("bookmark io: {0}")]
    Io(#[from] std::io::Error),
}
