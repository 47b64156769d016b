//! The ordered, append-only command log.

use crate::command::{ChartId, CommandKind};
use crate::error::ProtocolError;
use crate::record::ProtocolRecord;
use crate::Result;

/// An ordered sequence of [`ProtocolRecord`]s.
///
/// Insertion order is causal order is replay order. Invariant: replaying the
/// effective subsequence (non-invalidated records, in order) from an empty
/// chart state produces a view equivalent to replaying the full original
/// action sequence. Compaction (in the manager) maintains that invariant as
/// it invalidates records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandProtocol {
    records: Vec<ProtocolRecord>,
}

impl CommandProtocol {
    /// Create an empty protocol (new view session or fresh bookmark).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the end of the log.
    pub fn append(&mut self, record: ProtocolRecord) {
        self.records.push(record);
    }

    /// Convenience append from parts.
    pub fn append_command(
        &mut self,
        command: CommandKind,
        target: Option<ChartId>,
        args: Vec<String>,
    ) {
        self.append(ProtocolRecord::new(command, target, args));
    }

    /// Drop every record. Used by ClearAll and by a base reload with no
    /// background charts.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Number of records, invalidated ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&ProtocolRecord> {
        self.records.get(index)
    }

    /// Invalidate the record at `index`.
    pub fn invalidate(&mut self, index: usize) -> Result<()> {
        match self.records.get_mut(index) {
            Some(rec) => {
                rec.invalidate();
                Ok(())
            }
            None => Err(ProtocolError::NoSuchRecord(index)),
        }
    }

    /// All records in order, invalidated ones included.
    pub fn records(&self) -> &[ProtocolRecord] {
        &self.records
    }

    /// The effective (non-invalidated) subsequence, in order.
    pub fn effective(&self) -> impl Iterator<Item = &ProtocolRecord> {
        self.records.iter().filter(|r| r.is_effective())
    }

    /// Number of effective records.
    pub fn effective_len(&self) -> usize {
        self.effective().count()
    }

    /// Mutable access for the compaction pass. Crate-private: only the
    /// manager may flip `invalidated` flags.
    pub(crate) fn records_mut(&mut self) -> &mut [ProtocolRecord] {
        &mut self.records
    }
}
