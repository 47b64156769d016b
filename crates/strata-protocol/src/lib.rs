//! Command protocol and compaction core for Strata.
//!
//! Every mutating action against the stacked chart view is recorded as a
//! [`ProtocolRecord`] in an ordered, append-only [`CommandProtocol`]. The
//! [`ProtocolManager`] compacts the log before each append by invalidating
//! records a newer command makes obsolete, so the persisted form (a
//! "bookmark", see [`bookmark`]) stays minimal while replaying to an
//! equivalent view state.
//!
//! This crate is synchronous and collaborator-free; execution and replay
//! live in `strata-engine`.

mod command;
mod error;
mod manager;
mod protocol;
mod record;

pub mod bookmark;
pub mod validate;

pub use command::{ChartId, CommandKind, CommandSpec, CompactionClass};
pub use error::ProtocolError;
pub use manager::{Counters, ProtocolManager};
pub use protocol::CommandProtocol;
pub use record::ProtocolRecord;

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
