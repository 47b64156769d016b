//! Command vocabulary: kinds, chart identifiers, and per-kind contracts.
//!
//! Every mutating action against the stacked chart view is one of a closed
//! set of command kinds. Each kind carries a fixed contract (argument count,
//! whether a target chart is required) and a compaction class that tells the
//! protocol manager how an incoming command obsoletes older records.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Identifier of a chart slot in the stacked view.
///
/// The base chart and every background chart have one. Ids are supplied by
/// the caller (the view layer) and treated as opaque here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartId(String);

impl ChartId {
    /// Create a chart id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChartId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed set of loggable chart commands.
///
/// Serialized names are the wire names used in bookmarks; an unknown name
/// fails deserialization rather than being silently dropped.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum CommandKind {
    /// (Re)load time-series data into the base chart via the async loader.
    LoadBaseChartData,
    /// Freeze the current base chart into a new background chart slot.
    PushBaseToBackground,
    /// Change the whole-chart color of one chart.
    ChangeChartColor,
    /// Change the color of one named series within a chart.
    ChangeSeriesColor,
    /// Wipe the entire view (base and background charts).
    ClearAll,
    /// Show or hide one chart.
    SetChartVisible,
    /// Delete a single background chart.
    DeleteBackgroundChart,
    /// Delete every background chart.
    DeleteAllBackgroundCharts,
    /// Combine background charts into the base, relative scaling.
    RelativeCombineToBase,
    /// Combine background charts into the base, absolute scaling.
    AbsoluteCombineToBase,
    /// Change a chart's render type (line, bar, ...).
    ChangeChartType,
    /// Force all charts onto one shared Y axis.
    ForceAlignYAxis,
    /// Release the shared Y axis back to per-chart axes.
    FreeAlignYAxis,
}

/// How an incoming command interacts with older protocol records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactionClass {
    /// Only the latest setting per (kind, target) matters.
    Style,
    /// Invalidates the most recent FreeAlignYAxis.
    ForceAlign,
    /// Invalidates the most recent ForceAlignYAxis.
    FreeAlign,
    /// Supersedes base-chart history; full reset when no background charts.
    Load,
    /// Resets the whole protocol and counters.
    Reset,
    /// No invalidation; grows the background stack.
    Push,
    /// No invalidation; counts a combine operation.
    Combine,
    /// Invalidates through the latest push and orphaned background records.
    DeleteAll,
    /// Two-phase backward walk; the command itself is never appended.
    DeleteOne,
}

/// Static contract for one command kind.
#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    /// Exact number of string arguments.
    pub arity: usize,
    /// Whether a target chart id must be supplied.
    pub requires_target: bool,
    /// Compaction behavior of this kind.
    pub compaction: CompactionClass,
}

const fn spec(arity: usize, requires_target: bool, compaction: CompactionClass) -> CommandSpec {
    CommandSpec {
        arity,
        requires_target,
        compaction,
    }
}

impl CommandKind {
    /// Contract table for all kinds.
    ///
    /// Validation and compaction both key off this, so adding a kind is a
    /// single-row change.
    pub fn spec(self) -> CommandSpec {
        use CompactionClass::*;
        match self {
            // target = base chart, args = serialized filter + compute params
            CommandKind::LoadBaseChartData => spec(2, true, Load),
            // target = id of the new background slot
            CommandKind::PushBaseToBackground => spec(0, true, Push),
            // args = [web-hex color]
            CommandKind::ChangeChartColor => spec(1, true, Style),
            // args = [series name, web-hex color]
            CommandKind::ChangeSeriesColor => spec(2, true, Style),
            CommandKind::ClearAll => spec(0, false, Reset),
            // args = ["true" | "false"]
            CommandKind::SetChartVisible => spec(1, true, Style),
            CommandKind::DeleteBackgroundChart => spec(0, true, DeleteOne),
            // args = ["true" | "false"] keep computed charts
            CommandKind::DeleteAllBackgroundCharts => spec(1, false, DeleteAll),
            // args = ["true" | "false"] interpolate
            CommandKind::RelativeCombineToBase => spec(1, false, Combine),
            CommandKind::AbsoluteCombineToBase => spec(0, false, Combine),
            // args = [chart type tag]
            CommandKind::ChangeChartType => spec(1, true, Style),
            CommandKind::ForceAlignYAxis => spec(0, false, ForceAlign),
            CommandKind::FreeAlignYAxis => spec(0, false, FreeAlign),
        }
    }
}
