//! Stateless argument-shape validation.

use crate::command::{ChartId, CommandKind};
use crate::error::ProtocolError;
use crate::Result;

/// Check a command against its static contract before any effect runs.
///
/// Pure: no state, no partial effects. A violation names the command and
/// the expected shape so the caller can fix the call site rather than
/// retry.
pub fn validate(command: CommandKind, target: Option<&ChartId>, args: &[String]) -> Result<()> {
    let spec = command.spec();

    if args.len() != spec.arity {
        return Err(ProtocolError::BadArity {
            command,
            expected: spec.arity,
            got: args.len(),
        });
    }

    match (spec.requires_target, target) {
        (true, None) => Err(ProtocolError::MissingTarget { command }),
        (false, Some(t)) => Err(ProtocolError::UnexpectedTarget {
            command,
            target: t.to_string(),
        }),
        _ => Ok(()),
    }
}
