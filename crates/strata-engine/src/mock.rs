//! In-memory mock collaborators for tests.
//!
//! These back the engine's own tests and are public so downstream view
//! layers can drive the processor in their tests without a real renderer
//! or data source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use strata_protocol::ChartId;

use crate::loader::{DataLoader, LoaderError};
use crate::model::{ChartModel, ModelError, ModelResult};
use crate::progress::ProgressSink;

// ============================================================================
// Chart model
// ============================================================================

/// Observable per-chart state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChartState {
    pub color: Option<String>,
    pub chart_type: Option<String>,
    pub series_colors: BTreeMap<String, String>,
    pub hidden: bool,
}

/// Observable whole-view state, comparable across models for the replay
/// equivalence property.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub base: ChartState,
    /// Background charts in push order.
    pub background: Vec<(ChartId, ChartState)>,
    pub y_axis_forced: bool,
    /// Combine operations applied, in order, as observable tags.
    pub combines: Vec<String>,
}

/// Mock [`ChartModel`] exposing its state through a shared handle.
///
/// The model itself moves onto the render thread; the returned state handle
/// stays with the test for inspection.
#[derive(Debug)]
pub struct MockChartModel {
    base_id: ChartId,
    state: Arc<Mutex<ViewState>>,
}

impl MockChartModel {
    /// Create a model and the shared handle onto its view state.
    pub fn new(base_id: ChartId) -> (Self, Arc<Mutex<ViewState>>) {
        let state = Arc::new(Mutex::new(ViewState::default()));
        (
            Self {
                base_id,
                state: state.clone(),
            },
            state,
        )
    }

    fn with_chart<R>(
        &mut self,
        id: &ChartId,
        f: impl FnOnce(&mut ChartState) -> R,
    ) -> ModelResult<R> {
        let mut state = self.state.lock();
        if *id == self.base_id {
            return Ok(f(&mut state.base));
        }
        match state.background.iter_mut().find(|(bg, _)| bg == id) {
            Some((_, chart)) => Ok(f(chart)),
            None => Err(ModelError::UnknownChart(id.clone())),
        }
    }
}

impl ChartModel for MockChartModel {
    fn push_base_to_background(&mut self, new_id: &ChartId) -> ModelResult<ChartId> {
        let mut state = self.state.lock();
        let frozen = state.base.clone();
        state.background.push((new_id.clone(), frozen));
        Ok(new_id.clone())
    }

    fn delete_background(&mut self, id: &ChartId) -> ModelResult<()> {
        let mut state = self.state.lock();
        let before = state.background.len();
        state.background.retain(|(bg, _)| bg != id);
        if state.background.len() == before {
            return Err(ModelError::UnknownChart(id.clone()));
        }
        Ok(())
    }

    fn delete_all_background(&mut self, _keep_computed: bool) -> ModelResult<()> {
        self.state.lock().background.clear();
        Ok(())
    }

    fn clear_all(&mut self) -> ModelResult<()> {
        *self.state.lock() = ViewState::default();
        Ok(())
    }

    fn set_visible(&mut self, id: &ChartId, visible: bool) -> ModelResult<()> {
        self.with_chart(id, |chart| chart.hidden = !visible)
    }

    fn set_chart_color(&mut self, id: &ChartId, color_hex: &str) -> ModelResult<()> {
        let color = color_hex.to_string();
        self.with_chart(id, |chart| chart.color = Some(color))
    }

    fn set_series_color(
        &mut self,
        id: &ChartId,
        series: &str,
        color_hex: &str,
    ) -> ModelResult<()> {
        let (series, color) = (series.to_string(), color_hex.to_string());
        self.with_chart(id, |chart| {
            chart.series_colors.insert(series, color);
        })
    }

    fn change_chart_type(&mut self, id: &ChartId, type_tag: &str) -> ModelResult<()> {
        let tag = type_tag.to_string();
        self.with_chart(id, |chart| chart.chart_type = Some(tag))
    }

    fn align_y_axis(&mut self, forced: bool) -> ModelResult<()> {
        self.state.lock().y_axis_forced = forced;
        Ok(())
    }

    fn combine_relative(&mut self, interpolate: bool) -> ModelResult<()> {
        self.state
            .lock()
            .combines
            .push(format!("relative:{interpolate}"));
        Ok(())
    }

    fn combine_absolute(&mut self) -> ModelResult<()> {
        self.state.lock().combines.push("absolute".to_string());
        Ok(())
    }
}

// ============================================================================
// Data loader
// ============================================================================

/// Mock [`DataLoader`] with a configurable in-flight duration.
#[derive(Debug)]
pub struct MockLoader {
    filter: Mutex<Option<String>>,
    compute: Mutex<Option<String>>,
    running_tx: watch::Sender<bool>,
    load_time: Duration,
    restarts: Mutex<u32>,
    fail_next: Mutex<bool>,
}

impl MockLoader {
    /// Loader whose loads complete after `load_time`.
    pub fn new(load_time: Duration) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            filter: Mutex::new(None),
            compute: Mutex::new(None),
            running_tx,
            load_time,
            restarts: Mutex::new(0),
            fail_next: Mutex::new(false),
        }
    }

    /// Make the next `restart` fail.
    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }

    /// Parameters from the most recent load, `(filter, compute)`.
    pub fn last_params(&self) -> (Option<String>, Option<String>) {
        (self.filter.lock().clone(), self.compute.lock().clone())
    }

    /// Number of restarts dispatched.
    pub fn restart_count(&self) -> u32 {
        *self.restarts.lock()
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

#[async_trait]
impl DataLoader for MockLoader {
    fn set_filter_params(&self, params: &str) {
        *self.filter.lock() = Some(params.to_string());
    }

    fn set_compute_params(&self, params: &str) {
        *self.compute.lock() = Some(params.to_string());
    }

    async fn restart(&self) -> Result<(), LoaderError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(LoaderError("simulated load failure".to_string()));
        }
        *self.restarts.lock() += 1;
        self.running_tx.send_replace(true);

        let tx = self.running_tx.clone();
        let load_time = self.load_time;
        tokio::spawn(async move {
            tokio::time::sleep(load_time).await;
            tx.send_replace(false);
        });
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running_tx.borrow()
    }

    async fn wait_until_idle(&self) {
        let mut rx = self.running_tx.subscribe();
        // wait_for resolves immediately if already idle.
        let _ = rx.wait_for(|running| !running).await;
    }

    fn cancel(&self) {
        self.running_tx.send_replace(false);
    }
}

// ============================================================================
// Progress sink
// ============================================================================

/// Progress sink that keeps every notification for assertions.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<(String, f32)>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far.
    pub fn events(&self) -> Vec<(String, f32)> {
        self.events.lock().clone()
    }
}

impl ProgressSink for CollectingProgress {
    fn progress(&self, message: &str, fraction: f32) {
        self.events.lock().push((message.to_string(), fraction));
    }
}
