//! Protocol ownership and the compaction algorithm.
//!
//! The manager is the only component allowed to flip `invalidated` flags.
//! Before every append it runs a compaction pass that invalidates older
//! records the incoming command makes obsolete, keeping the effective log
//! minimal while preserving the replay-equivalence invariant.

use tracing::{debug, warn};

use crate::command::{ChartId, CommandKind, CompactionClass};
use crate::protocol::CommandProtocol;
use crate::record::ProtocolRecord;

/// Derived counters over the effective log.
///
/// Kept incrementally for O(1) compaction decisions, but never trusted
/// across a load boundary: adopting a deserialized protocol recomputes them
/// from the effective records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Chart slots currently pushed onto the background stack.
    pub background_charts: usize,
    /// Combine operations applied since the last full reset.
    pub combines: usize,
}

impl Counters {
    /// Recompute both counters from the effective records of a log.
    pub fn recompute(protocol: &CommandProtocol) -> Self {
        let mut counters = Self::default();
        for rec in protocol.effective() {
            match rec.command {
                CommandKind::PushBaseToBackground => counters.background_charts += 1,
                CommandKind::RelativeCombineToBase | CommandKind::AbsoluteCombineToBase => {
                    counters.combines += 1
                }
                CommandKind::DeleteAllBackgroundCharts | CommandKind::ClearAll => {
                    counters = Self::default()
                }
                _ => {}
            }
        }
        counters
    }
}

/// Wraps a [`CommandProtocol`] and applies compaction before every append.
///
/// Not internally synchronized: the engine serializes access behind a mutex
/// (all calls for one protocol must be effectively one-at-a-time).
#[derive(Debug)]
pub struct ProtocolManager {
    protocol: CommandProtocol,
    base_chart: ChartId,
    counters: Counters,
}

impl ProtocolManager {
    /// Create a manager with an empty protocol for a fresh view session.
    pub fn new(base_chart: ChartId) -> Self {
        Self {
            protocol: CommandProtocol::new(),
            base_chart,
            counters: Counters::default(),
        }
    }

    /// Adopt an existing protocol (a loaded bookmark), recomputing the
    /// counters from its effective records rather than trusting any
    /// previously persisted values.
    pub fn from_protocol(base_chart: ChartId, protocol: CommandProtocol) -> Self {
        let counters = Counters::recompute(&protocol);
        Self {
            protocol,
            base_chart,
            counters,
        }
    }

    /// The wrapped protocol.
    pub fn protocol(&self) -> &CommandProtocol {
        &self.protocol
    }

    /// The id records resolve against when deciding what "base chart" means.
    pub fn base_chart(&self) -> &ChartId {
        &self.base_chart
    }

    /// Current derived counters.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Empty the protocol and zero the counters. Used when replay adopts a
    /// known-empty starting state.
    pub fn reset(&mut self) {
        self.protocol.reset();
        self.counters = Counters::default();
    }

    /// Log one executed command: run compaction, then append.
    ///
    /// DeleteBackgroundChart is the one kind that is never appended: after
    /// its compaction pass the shortened effective log, replayed, no longer
    /// recreates the deleted chart, so the record itself would be dead
    /// weight.
    pub fn log(&mut self, command: CommandKind, target: Option<ChartId>, args: Vec<String>) {
        self.compact(command, target.as_ref());

        if command.spec().compaction == CompactionClass::DeleteOne {
            debug!(%command, "not appended; compaction already erased its subject");
            return;
        }

        self.protocol.append(ProtocolRecord::new(command, target, args));
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    fn compact(&mut self, command: CommandKind, target: Option<&ChartId>) {
        // Counters still move on an empty protocol (a push into an empty log
        // must count), but there is nothing to invalidate.
        let empty = self.protocol.is_empty();

        match command.spec().compaction {
            CompactionClass::Style => {
                if !empty {
                    self.compact_style(command, target);
                }
            }
            CompactionClass::ForceAlign => {
                if !empty {
                    self.invalidate_latest(CommandKind::FreeAlignYAxis);
                }
            }
            CompactionClass::FreeAlign => {
                if !empty {
                    self.invalidate_latest(CommandKind::ForceAlignYAxis);
                }
            }
            CompactionClass::Load => self.compact_load(),
            CompactionClass::Reset => {
                self.protocol.reset();
                self.counters = Counters::default();
            }
            CompactionClass::Push => self.counters.background_charts += 1,
            CompactionClass::Combine => self.counters.combines += 1,
            CompactionClass::DeleteAll => self.compact_delete_all(),
            CompactionClass::DeleteOne => self.compact_delete_one(target),
        }
    }

    /// Only the latest style setting per (kind, target) matters: invalidate
    /// the previous one.
    fn compact_style(&mut self, command: CommandKind, target: Option<&ChartId>) {
        let Some(target) = target else {
            // Validation upstream requires a target for style commands, so
            // this is only reachable through direct manager misuse.
            warn!(%command, "style command without target; skipping dedup");
            return;
        };
        let found = self
            .protocol
            .records_mut()
            .iter_mut()
            .rev()
            .find(|r| r.is_effective() && r.command == command && r.targets(target));
        if let Some(rec) = found {
            rec.invalidate();
        }
    }

    /// Invalidate the most recent effective record of `kind`, if any.
    fn invalidate_latest(&mut self, kind: CommandKind) {
        let found = self
            .protocol
            .records_mut()
            .iter_mut()
            .rev()
            .find(|r| r.is_effective() && r.command == kind);
        if let Some(rec) = found {
            rec.invalidate();
        }
    }

    /// A fresh base load supersedes every base-chart-only action since the
    /// last structural boundary. With no background charts there is nothing
    /// to preserve at all.
    fn compact_load(&mut self) {
        if self.counters.background_charts == 0 {
            self.protocol.reset();
            self.counters = Counters::default();
            return;
        }

        // Latest structural boundary: push or either combine.
        let boundary = self
            .protocol
            .records()
            .iter()
            .rposition(|r| {
                r.is_effective()
                    && matches!(
                        r.command,
                        CommandKind::PushBaseToBackground
                            | CommandKind::RelativeCombineToBase
                            | CommandKind::AbsoluteCombineToBase
                    )
            });
        let start = boundary.map_or(0, |i| i + 1);

        let base = self.base_chart.clone();
        for rec in &mut self.protocol.records_mut()[start..] {
            if rec.is_effective() && rec.targets_base(&base) {
                rec.invalidate();
            }
        }
    }

    /// Deleting every background chart invalidates the whole prefix through
    /// the most recent push, plus any later record that only made sense for
    /// a background chart.
    fn compact_delete_all(&mut self) {
        self.counters = Counters::default();

        let last_push = self
            .protocol
            .records()
            .iter()
            .rposition(|r| r.is_effective() && r.command == CommandKind::PushBaseToBackground);
        let Some(push_idx) = last_push else {
            // Background charts created only by combines leave no push to
            // anchor on. Known gap in the compaction scheme; the log keeps
            // its records and replay stays correct, just less compact.
            warn!("DeleteAllBackgroundCharts with no push record; nothing invalidated");
            return;
        };

        let base = self.base_chart.clone();
        let records = self.protocol.records_mut();
        for rec in &mut records[..=push_idx] {
            rec.invalidate();
        }
        for rec in &mut records[push_idx + 1..] {
            if rec.is_effective() && !rec.targets_base(&base) {
                rec.invalidate();
            }
        }
    }

    /// Two-phase backward walk for a single background-chart deletion.
    ///
    /// Phase 1 erases the deleted chart's records back to (and including)
    /// its own push. Phase 2 then erases base-targeted records back to the
    /// previous push boundary, which is left standing for the earlier chart
    /// it belongs to.
    fn compact_delete_one(&mut self, target: Option<&ChartId>) {
        let Some(target) = target.cloned() else {
            warn!("DeleteBackgroundChart without target; skipping compaction");
            return;
        };

        if self.counters.combines == 0 && self.counters.background_charts > 0 {
            self.counters.background_charts -= 1;
        }

        let base = self.base_chart.clone();
        let mut matching_push_found = false;
        for rec in self.protocol.records_mut().iter_mut().rev() {
            if !rec.is_effective() {
                continue;
            }
            if !matching_push_found {
                // Phase 1: everything addressed to the deleted chart goes,
                // ending with the push that created it.
                if rec.targets(&target) {
                    let was_push = rec.command == CommandKind::PushBaseToBackground;
                    rec.invalidate();
                    if was_push {
                        matching_push_found = true;
                    }
                }
            } else {
                // Phase 2: base-chart records between the two push
                // boundaries. The earlier push marks an unrelated chart and
                // terminates the walk untouched.
                if rec.command == CommandKind::PushBaseToBackground {
                    break;
                }
                if rec.targets_base(&base) {
                    rec.invalidate();
                }
            }
        }

        if !matching_push_found {
            debug!(chart = %target, "no matching push record for deleted chart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ChartId {
        ChartId::new("base")
    }

    fn manager() -> ProtocolManager {
        ProtocolManager::new(base())
    }

    fn effective_kinds(m: &ProtocolManager) -> Vec<CommandKind> {
        m.protocol().effective().map(|r| r.command).collect()
    }

    #[test]
    fn test_style_append_is_idempotent() {
        let mut m = manager();
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#ff0000".into()],
        );
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#00ff00".into()],
        );

        let effective: Vec<_> = m
            .protocol()
            .effective()
            .filter(|r| r.command == CommandKind::ChangeChartColor && r.targets(&base()))
            .collect();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].args, vec!["#00ff00".to_string()]);
        assert_eq!(m.protocol().len(), 2);
    }

    #[test]
    fn test_style_dedup_is_per_target() {
        let mut m = manager();
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-1".into()),
            vec!["#111111".into()],
        );
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-2".into()),
            vec!["#222222".into()],
        );

        assert_eq!(m.protocol().effective_len(), 2);
    }

    #[test]
    fn test_style_dedup_is_per_kind() {
        let mut m = manager();
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#111111".into()],
        );
        m.log(
            CommandKind::SetChartVisible,
            Some(base()),
            vec!["false".into()],
        );

        assert_eq!(m.protocol().effective_len(), 2);
    }

    #[test]
    fn test_align_mutual_exclusion() {
        let mut m = manager();
        m.log(CommandKind::ForceAlignYAxis, None, vec![]);
        m.log(CommandKind::FreeAlignYAxis, None, vec![]);

        let kinds = effective_kinds(&m);
        assert!(!kinds.contains(&CommandKind::ForceAlignYAxis));
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == CommandKind::FreeAlignYAxis)
                .count(),
            1
        );
    }

    #[test]
    fn test_load_with_empty_stack_resets_protocol() {
        let mut m = manager();
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#abcdef".into()],
        );
        m.log(
            CommandKind::LoadBaseChartData,
            Some(base()),
            vec!["f".into(), "c".into()],
        );

        assert_eq!(effective_kinds(&m), vec![CommandKind::LoadBaseChartData]);
        assert_eq!(m.protocol().len(), 1);
    }

    #[test]
    fn test_load_after_push_preserves_background_history() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-a".into()),
            vec!["#abcdef".into()],
        );
        m.log(
            CommandKind::LoadBaseChartData,
            Some(base()),
            vec!["f".into(), "c".into()],
        );

        assert_eq!(
            effective_kinds(&m),
            vec![
                CommandKind::PushBaseToBackground,
                CommandKind::ChangeChartColor,
                CommandKind::LoadBaseChartData,
            ]
        );
    }

    #[test]
    fn test_load_invalidates_base_records_after_boundary() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#abcdef".into()],
        );
        m.log(CommandKind::ForceAlignYAxis, None, vec![]);
        m.log(
            CommandKind::LoadBaseChartData,
            Some(base()),
            vec!["f".into(), "c".into()],
        );

        // The base-targeted color and the untargeted align are superseded by
        // the reload; the push survives.
        assert_eq!(
            effective_kinds(&m),
            vec![
                CommandKind::PushBaseToBackground,
                CommandKind::LoadBaseChartData,
            ]
        );
    }

    #[test]
    fn test_clear_all_resets_everything() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(CommandKind::RelativeCombineToBase, None, vec!["true".into()]);
        m.log(CommandKind::ClearAll, None, vec![]);

        assert_eq!(effective_kinds(&m), vec![CommandKind::ClearAll]);
        assert_eq!(m.counters(), Counters::default());
    }

    #[test]
    fn test_push_and_combine_counters() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(CommandKind::PushBaseToBackground, Some("bg-b".into()), vec![]);
        m.log(CommandKind::AbsoluteCombineToBase, None, vec![]);

        assert_eq!(
            m.counters(),
            Counters {
                background_charts: 2,
                combines: 1
            }
        );
    }

    #[test]
    fn test_delete_one_self_erasure() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-a".into()),
            vec!["#abcdef".into()],
        );
        m.log(CommandKind::DeleteBackgroundChart, Some("bg-a".into()), vec![]);

        // Nothing effective references bg-a, and the delete itself was
        // never appended.
        assert_eq!(m.protocol().effective_len(), 0);
        assert!(m
            .protocol()
            .records()
            .iter()
            .all(|r| r.command != CommandKind::DeleteBackgroundChart));
        assert_eq!(m.counters().background_charts, 0);
    }

    #[test]
    fn test_delete_one_phase_two_stops_at_earlier_push() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#111111".into()],
        );
        m.log(CommandKind::PushBaseToBackground, Some("bg-b".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#222222".into()],
        );
        m.log(CommandKind::DeleteBackgroundChart, Some("bg-b".into()), vec![]);

        // Phase 1 erases bg-b's push; phase 2 then erases the base record
        // between the two push boundaries (#111111) and stops at bg-a's
        // push. The trailing base record was skipped by phase 1 and
        // survives.
        assert_eq!(
            effective_kinds(&m),
            vec![
                CommandKind::PushBaseToBackground,
                CommandKind::ChangeChartColor,
            ]
        );
        assert!(m.protocol().effective().any(|r| r.targets(&"bg-a".into())));
        let surviving_color: Vec<_> = m
            .protocol()
            .effective()
            .filter(|r| r.command == CommandKind::ChangeChartColor)
            .collect();
        assert_eq!(surviving_color.len(), 1);
        assert_eq!(surviving_color[0].args, vec!["#222222".to_string()]);
    }

    #[test]
    fn test_delete_one_skips_other_background_records() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(CommandKind::PushBaseToBackground, Some("bg-b".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-a".into()),
            vec!["#aaaaaa".into()],
        );
        m.log(CommandKind::DeleteBackgroundChart, Some("bg-b".into()), vec![]);

        // bg-a's push and style record are untouched.
        let effective: Vec<_> = m.protocol().effective().collect();
        assert_eq!(effective.len(), 2);
        assert!(effective.iter().all(|r| r.targets(&"bg-a".into())));
    }

    #[test]
    fn test_delete_one_no_decrement_after_combine() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(CommandKind::RelativeCombineToBase, None, vec!["false".into()]);
        m.log(CommandKind::DeleteBackgroundChart, Some("bg-a".into()), vec![]);

        // With combines in play the stack size is no longer push-derived.
        assert_eq!(m.counters().background_charts, 1);
    }

    #[test]
    fn test_delete_all_invalidates_through_last_push() {
        let mut m = manager();
        m.log(
            CommandKind::LoadBaseChartData,
            Some(base()),
            vec!["f".into(), "c".into()],
        );
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(
            CommandKind::ChangeChartColor,
            Some("bg-a".into()),
            vec!["#333333".into()],
        );
        m.log(
            CommandKind::ChangeChartColor,
            Some(base()),
            vec!["#444444".into()],
        );
        m.log(CommandKind::DeleteAllBackgroundCharts, None, vec!["false".into()]);

        // Prefix through the push is gone; the orphaned bg-a style record
        // after it is gone; the base style record survives.
        assert_eq!(
            effective_kinds(&m),
            vec![
                CommandKind::ChangeChartColor,
                CommandKind::DeleteAllBackgroundCharts,
            ]
        );
        assert!(m.protocol().effective().any(|r| r.targets(&base())));
        assert_eq!(m.counters(), Counters::default());
    }

    #[test]
    fn test_delete_all_without_push_is_a_noop() {
        let mut m = manager();
        m.log(CommandKind::AbsoluteCombineToBase, None, vec![]);
        m.log(CommandKind::DeleteAllBackgroundCharts, None, vec!["true".into()]);

        assert_eq!(
            effective_kinds(&m),
            vec![
                CommandKind::AbsoluteCombineToBase,
                CommandKind::DeleteAllBackgroundCharts,
            ]
        );
        assert_eq!(m.counters(), Counters::default());
    }

    #[test]
    fn test_counters_recompute_on_adoption() {
        let mut m = manager();
        m.log(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        m.log(CommandKind::PushBaseToBackground, Some("bg-b".into()), vec![]);
        m.log(CommandKind::RelativeCombineToBase, None, vec!["true".into()]);

        let adopted = ProtocolManager::from_protocol(base(), m.protocol().clone());
        assert_eq!(
            adopted.counters(),
            Counters {
                background_charts: 2,
                combines: 1
            }
        );
    }

    #[test]
    fn test_counters_recompute_sees_delete_all() {
        let mut protocol = CommandProtocol::new();
        protocol.append_command(CommandKind::PushBaseToBackground, Some("bg-a".into()), vec![]);
        protocol.append_command(CommandKind::DeleteAllBackgroundCharts, None, vec!["false".into()]);
        protocol.append_command(CommandKind::PushBaseToBackground, Some("bg-b".into()), vec![]);

        let adopted = ProtocolManager::from_protocol(base(), protocol);
        assert_eq!(
            adopted.counters(),
            Counters {
                background_charts: 1,
                combines: 0
            }
        );
    }

    #[test]
    fn test_compaction_noop_on_empty_protocol() {
        let mut m = manager();
        // Must not panic or misbehave on an empty log.
        m.log(CommandKind::FreeAlignYAxis, None, vec![]);
        assert_eq!(effective_kinds(&m), vec![CommandKind::FreeAlignYAxis]);
    }
}
