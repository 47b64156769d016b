//! The chart-model collaborator: the live view state commands mutate.
//!
//! The actual model belongs to the view layer; the engine only needs this
//! trait. All methods run on the render thread (see [`crate::render`]), so
//! implementations can be plain `&mut self` with no internal locking.

use thiserror::Error;

use strata_protocol::ChartId;

/// Errors a chart model may raise while applying an effect.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The addressed chart does not exist in the view.
    #[error("unknown chart: {0}")]
    UnknownChart(ChartId),

    /// The model refused the mutation for its own reasons.
    #[error("chart model rejected the operation: {0}")]
    Rejected(String),
}

/// Result alias for model effects.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// The composite stacked chart view.
///
/// One base chart receives new data; background charts are frozen copies
/// rendered behind it.
pub trait ChartModel: Send {
    /// Freeze the current base chart into a new background slot.
    fn push_base_to_background(&mut self, new_id: &ChartId) -> ModelResult<ChartId>;

    /// Remove one background chart.
    fn delete_background(&mut self, id: &ChartId) -> ModelResult<()>;

    /// Remove every background chart. `keep_computed` retains charts that
    /// were produced by combine operations rather than pushes.
    fn delete_all_background(&mut self, keep_computed: bool) -> ModelResult<()>;

    /// Wipe the whole view back to its initial state.
    fn clear_all(&mut self) -> ModelResult<()>;

    /// Show or hide one chart.
    fn set_visible(&mut self, id: &ChartId, visible: bool) -> ModelResult<()>;

    /// Set the whole-chart color, web-hex encoded.
    fn set_chart_color(&mut self, id: &ChartId, color_hex: &str) -> ModelResult<()>;

    /// Set the color of one named series within a chart.
    fn set_series_color(&mut self, id: &ChartId, series: &str, color_hex: &str)
    -> ModelResult<()>;

    /// Switch a chart's render type (line, bar, ...).
    fn change_chart_type(&mut self, id: &ChartId, type_tag: &str) -> ModelResult<()>;

    /// Force (`true`) or free (`false`) the shared Y axis.
    fn align_y_axis(&mut self, forced: bool) -> ModelResult<()>;

    /// Combine background charts into the base with relative scaling.
    fn combine_relative(&mut self, interpolate: bool) -> ModelResult<()>;

    /// Combine background charts into the base with absolute scaling.
    fn combine_absolute(&mut self) -> ModelResult<()>;
}
