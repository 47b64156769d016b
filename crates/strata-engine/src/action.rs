//! The richly-typed calling convention.
//!
//! [`ChartAction`] is the typed twin of the string-encoded `(command,
//! target, args)` triple. Both conventions must produce byte-identical
//! protocol logs, so every typed value defines exactly one canonical string
//! encoding (`Color` → lowercase web hex, booleans → `true`/`false`) and
//! the processor lowers actions through [`ChartAction::into_parts`] before
//! logging.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumString};

use strata_protocol::{ChartId, CommandKind};

use crate::error::EngineError;

/// An RGB color with a canonical `#rrggbb` encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase web-hex form, the encoding stored in protocols.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("color must start with '#': {s}"))?;
        if hex.len() != 6 {
            return Err(format!("color must be #rrggbb: {s}"));
        }
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| format!("bad hex digits: {s}"))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }
}

/// Render type of a chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChartTypeTag {
    Line,
    Bar,
    Area,
    Scatter,
}

/// A chart command with typed arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartAction {
    LoadBaseChartData {
        chart: ChartId,
        filter_params: String,
        compute_params: String,
    },
    PushBaseToBackground {
        new_id: ChartId,
    },
    ChangeChartColor {
        chart: ChartId,
        color: Color,
    },
    ChangeSeriesColor {
        chart: ChartId,
        series: String,
        color: Color,
    },
    ClearAll,
    SetChartVisible {
        chart: ChartId,
        visible: bool,
    },
    DeleteBackgroundChart {
        chart: ChartId,
    },
    DeleteAllBackgroundCharts {
        keep_computed: bool,
    },
    RelativeCombineToBase {
        interpolate: bool,
    },
    AbsoluteCombineToBase,
    ChangeChartType {
        chart: ChartId,
        chart_type: ChartTypeTag,
    },
    ForceAlignYAxis,
    FreeAlignYAxis,
}

impl ChartAction {
    /// The command kind this action logs as.
    pub fn kind(&self) -> CommandKind {
        match self {
            ChartAction::LoadBaseChartData { .. } => CommandKind::LoadBaseChartData,
            ChartAction::PushBaseToBackground { .. } => CommandKind::PushBaseToBackground,
            ChartAction::ChangeChartColor { .. } => CommandKind::ChangeChartColor,
            ChartAction::ChangeSeriesColor { .. } => CommandKind::ChangeSeriesColor,
            ChartAction::ClearAll => CommandKind::ClearAll,
            ChartAction::SetChartVisible { .. } => CommandKind::SetChartVisible,
            ChartAction::DeleteBackgroundChart { .. } => CommandKind::DeleteBackgroundChart,
            ChartAction::DeleteAllBackgroundCharts { .. } => {
                CommandKind::DeleteAllBackgroundCharts
            }
            ChartAction::RelativeCombineToBase { .. } => CommandKind::RelativeCombineToBase,
            ChartAction::AbsoluteCombineToBase => CommandKind::AbsoluteCombineToBase,
            ChartAction::ChangeChartType { .. } => CommandKind::ChangeChartType,
            ChartAction::ForceAlignYAxis => CommandKind::ForceAlignYAxis,
            ChartAction::FreeAlignYAxis => CommandKind::FreeAlignYAxis,
        }
    }

    /// Lower to the string convention's `(command, target, args)` triple
    /// using the canonical encodings.
    pub fn into_parts(self) -> (CommandKind, Option<ChartId>, Vec<String>) {
        let kind = self.kind();
        match self {
            ChartAction::LoadBaseChartData {
                chart,
                filter_params,
                compute_params,
            } => (kind, Some(chart), vec![filter_params, compute_params]),
            ChartAction::PushBaseToBackground { new_id } => (kind, Some(new_id), vec![]),
            ChartAction::ChangeChartColor { chart, color } => {
                (kind, Some(chart), vec![color.to_hex()])
            }
            ChartAction::ChangeSeriesColor {
                chart,
                series,
                color,
            } => (kind, Some(chart), vec![series, color.to_hex()]),
            ChartAction::ClearAll => (kind, None, vec![]),
            ChartAction::SetChartVisible { chart, visible } => {
                (kind, Some(chart), vec![visible.to_string()])
            }
            ChartAction::DeleteBackgroundChart { chart } => (kind, Some(chart), vec![]),
            ChartAction::DeleteAllBackgroundCharts { keep_computed } => {
                (kind, None, vec![keep_computed.to_string()])
            }
            ChartAction::RelativeCombineToBase { interpolate } => {
                (kind, None, vec![interpolate.to_string()])
            }
            ChartAction::AbsoluteCombineToBase => (kind, None, vec![]),
            ChartAction::ChangeChartType { chart, chart_type } => {
                (kind, Some(chart), vec![chart_type.to_string()])
            }
            ChartAction::ForceAlignYAxis => (kind, None, vec![]),
            ChartAction::FreeAlignYAxis => (kind, None, vec![]),
        }
    }

    /// Decode the string convention into a typed action.
    ///
    /// Assumes arity and target presence already passed validation; what is
    /// checked here is that each argument actually decodes (a color is a
    /// color, a flag is a boolean).
    pub fn from_parts(
        command: CommandKind,
        target: Option<&ChartId>,
        args: &[String],
    ) -> Result<Self, EngineError> {
        let bad = |detail: String| EngineError::BadArgument { command, detail };
        let chart = || {
            target.cloned().ok_or_else(|| EngineError::BadArgument {
                command,
                detail: "missing target chart id".to_string(),
            })
        };
        let arg = |i: usize| {
            args.get(i)
                .cloned()
                .ok_or_else(|| bad(format!("missing argument {i}")))
        };
        let color = |s: String| s.parse::<Color>().map_err(bad);
        let flag = |s: String| {
            s.parse::<bool>()
                .map_err(|_| bad(format!("not a boolean: {s}")))
        };

        Ok(match command {
            CommandKind::LoadBaseChartData => ChartAction::LoadBaseChartData {
                chart: chart()?,
                filter_params: arg(0)?,
                compute_params: arg(1)?,
            },
            CommandKind::PushBaseToBackground => ChartAction::PushBaseToBackground {
                new_id: chart()?,
            },
            CommandKind::ChangeChartColor => ChartAction::ChangeChartColor {
                chart: chart()?,
                color: color(arg(0)?)?,
            },
            CommandKind::ChangeSeriesColor => ChartAction::ChangeSeriesColor {
                chart: chart()?,
                series: arg(0)?,
                color: color(arg(1)?)?,
            },
            CommandKind::ClearAll => ChartAction::ClearAll,
            CommandKind::SetChartVisible => ChartAction::SetChartVisible {
                chart: chart()?,
                visible: flag(arg(0)?)?,
            },
            CommandKind::DeleteBackgroundChart => ChartAction::DeleteBackgroundChart {
                chart: chart()?,
            },
            CommandKind::DeleteAllBackgroundCharts => ChartAction::DeleteAllBackgroundCharts {
                keep_computed: flag(arg(0)?)?,
            },
            CommandKind::RelativeCombineToBase => ChartAction::RelativeCombineToBase {
                interpolate: flag(arg(0)?)?,
            },
            CommandKind::AbsoluteCombineToBase => ChartAction::AbsoluteCombineToBase,
            CommandKind::ChangeChartType => {
                let tag = arg(0)?;
                ChartAction::ChangeChartType {
                    chart: chart()?,
                    chart_type: tag
                        .parse::<ChartTypeTag>()
                        .map_err(|_| bad(format!("unknown chart type: {tag}")))?,
                }
            }
            CommandKind::ForceAlignYAxis => ChartAction::ForceAlignYAxis,
            CommandKind::FreeAlignYAxis => ChartAction::FreeAlignYAxis,
        })
    }
}
