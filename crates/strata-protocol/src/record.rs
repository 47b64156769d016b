//! A single logged chart command.

use serde::{Deserialize, Serialize};

use crate::command::{ChartId, CommandKind};

/// One logged action against the stacked chart view.
///
/// Records are immutable once created except for the `invalidated` flag,
/// which moves false → true exactly once when compaction decides a later
/// command made this one obsolete. Records are never physically removed
/// except by a full protocol reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRecord {
    /// The command kind.
    pub command: CommandKind,
    /// Chart this command addresses, if any.
    pub target: Option<ChartId>,
    /// Ordered string-encoded arguments.
    pub args: Vec<String>,
    /// Whether a later command obsoleted this record.
    #[serde(default)]
    invalidated: bool,
}

impl ProtocolRecord {
    /// Create a fresh (effective) record.
    pub fn new(command: CommandKind, target: Option<ChartId>, args: Vec<String>) -> Self {
        Self {
            command,
            target,
            args,
            invalidated: false,
        }
    }

    /// Mark this record obsolete. Monotonic; calling twice is harmless.
    pub(crate) fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Whether this record still contributes to the replayed view state.
    pub fn is_effective(&self) -> bool {
        !self.invalidated
    }

    /// Whether this record addresses the base chart: either untargeted or
    /// targeting `base` explicitly.
    pub fn targets_base(&self, base: &ChartId) -> bool {
        match &self.target {
            None => true,
            Some(t) => t == base,
        }
    }

    /// Whether this record targets the given chart.
    pub fn targets(&self, id: &ChartId) -> bool {
        self.target.as_ref() == Some(id)
    }
}
