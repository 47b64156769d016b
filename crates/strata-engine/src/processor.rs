//! The command façade: validate, dispatch, log.
//!
//! `ChartCommandProcessor` is the one entry point for mutating the stacked
//! chart view. Every call validates first, applies the effect through the
//! render queue (or starts the async loader), and only then logs the
//! command into the protocol — a failed effect never pollutes the log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use strata_protocol::{
    ChartId, CommandKind, CommandProtocol, ProtocolManager, bookmark, validate,
};

use crate::action::ChartAction;
use crate::error::EngineError;
use crate::loader::DataLoader;
use crate::model::ChartModel;
use crate::progress::ProgressSink;
use crate::render::{RenderHandle, RenderJob, job_depth};
use crate::replay::ReplayState;

/// Dispatches chart commands to their collaborators and records them.
pub struct ChartCommandProcessor {
    pub(crate) manager: Mutex<ProtocolManager>,
    pub(crate) render: RenderHandle,
    pub(crate) loader: Arc<dyn DataLoader>,
    pub(crate) progress: Arc<dyn ProgressSink>,
    /// Set before a load dispatch, cleared when the loader goes idle.
    load_running: AtomicBool,
    pub(crate) replay_state: watch::Sender<ReplayState>,
}

impl ChartCommandProcessor {
    /// Create a processor for a fresh view session.
    ///
    /// `model` moves onto the render thread; `base_chart` is the id base
    /// chart records resolve against during compaction.
    pub fn new(
        model: Box<dyn ChartModel>,
        loader: Arc<dyn DataLoader>,
        progress: Arc<dyn ProgressSink>,
        base_chart: ChartId,
    ) -> std::io::Result<Self> {
        Self::with_protocol(model, loader, progress, base_chart, CommandProtocol::new())
    }

    /// Create a processor that adopts an existing protocol (a loaded
    /// bookmark). Counters are recomputed from the effective log.
    pub fn with_protocol(
        model: Box<dyn ChartModel>,
        loader: Arc<dyn DataLoader>,
        progress: Arc<dyn ProgressSink>,
        base_chart: ChartId,
        protocol: CommandProtocol,
    ) -> std::io::Result<Self> {
        let render = RenderHandle::spawn(model)?;
        let (replay_state, _) = watch::channel(ReplayState::Idle);
        Ok(Self {
            manager: Mutex::new(ProtocolManager::from_protocol(base_chart, protocol)),
            render,
            loader,
            progress,
            load_running: AtomicBool::new(false),
            replay_state,
        })
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a command given string-encoded arguments.
    ///
    /// Order is validate → effect → log; a failure at any step leaves the
    /// protocol untouched.
    pub async fn execute(
        &self,
        command: CommandKind,
        target: Option<ChartId>,
        args: Vec<String>,
    ) -> Result<(), EngineError> {
        // A command effect must not trigger further commands while it is
        // itself executing on the render thread; that chain has no bound.
        if job_depth() > 0 {
            warn!(%command, "re-entrant execute on render thread; ignoring");
            return Ok(());
        }

        validate::validate(command, target.as_ref(), &args)?;
        let action = ChartAction::from_parts(command, target.as_ref(), &args)?;

        self.apply_effect(&action).await?;
        self.manager.lock().log(command, target, args);
        Ok(())
    }

    /// Execute a command given richly-typed arguments.
    ///
    /// Semantically identical to [`execute`](Self::execute): the action is
    /// lowered to its canonical string encoding first, so a protocol saved
    /// via either path replays identically.
    pub async fn execute_action(&self, action: ChartAction) -> Result<(), EngineError> {
        let (command, target, args) = action.into_parts();
        self.execute(command, target, args).await
    }

    /// Execute and, if the command started a load, wait for it to land.
    pub async fn execute_and_wait(
        &self,
        command: CommandKind,
        target: Option<ChartId>,
        args: Vec<String>,
    ) -> Result<(), EngineError> {
        self.execute(command, target, args).await?;
        if self.is_load_running() {
            self.wait_for_load().await;
        }
        Ok(())
    }

    /// Whether a base-chart load is in flight.
    pub fn is_load_running(&self) -> bool {
        self.load_running.load(Ordering::SeqCst) || self.loader.is_running()
    }

    /// Wait until no load is in flight.
    pub async fn wait_for_load(&self) {
        self.loader.wait_until_idle().await;
        self.load_running.store(false, Ordering::SeqCst);
    }

    /// Apply an action's effect without logging. Shared by live execution
    /// and replay.
    pub(crate) async fn apply_effect(&self, action: &ChartAction) -> Result<(), EngineError> {
        match action {
            ChartAction::LoadBaseChartData {
                filter_params,
                compute_params,
                ..
            } => {
                self.loader.set_filter_params(filter_params);
                self.loader.set_compute_params(compute_params);
                self.load_running.store(true, Ordering::SeqCst);
                if let Err(err) = self.loader.restart().await {
                    self.load_running.store(false, Ordering::SeqCst);
                    return Err(err.into());
                }
                debug!("base chart load dispatched");
                Ok(())
            }
            _ => self.render.submit(Self::render_job(action)).await,
        }
    }

    /// Build the render-thread job for a non-load action.
    fn render_job(action: &ChartAction) -> RenderJob {
        match action.clone() {
            ChartAction::PushBaseToBackground { new_id } => {
                Box::new(move |m| m.push_base_to_background(&new_id).map(|_| ()))
            }
            ChartAction::ChangeChartColor { chart, color } => {
                Box::new(move |m| m.set_chart_color(&chart, &color.to_hex()))
            }
            ChartAction::ChangeSeriesColor {
                chart,
                series,
                color,
            } => Box::new(move |m| m.set_series_color(&chart, &series, &color.to_hex())),
            ChartAction::ClearAll => Box::new(|m| m.clear_all()),
            ChartAction::SetChartVisible { chart, visible } => {
                Box::new(move |m| m.set_visible(&chart, visible))
            }
            ChartAction::DeleteBackgroundChart { chart } => {
                Box::new(move |m| m.delete_background(&chart))
            }
            ChartAction::DeleteAllBackgroundCharts { keep_computed } => {
                Box::new(move |m| m.delete_all_background(keep_computed))
            }
            ChartAction::RelativeCombineToBase { interpolate } => {
                Box::new(move |m| m.combine_relative(interpolate))
            }
            ChartAction::AbsoluteCombineToBase => Box::new(|m| m.combine_absolute()),
            ChartAction::ChangeChartType { chart, chart_type } => {
                Box::new(move |m| m.change_chart_type(&chart, &chart_type.to_string()))
            }
            ChartAction::ForceAlignYAxis => Box::new(|m| m.align_y_axis(true)),
            ChartAction::FreeAlignYAxis => Box::new(|m| m.align_y_axis(false)),
            // Handled in apply_effect; unreachable here.
            ChartAction::LoadBaseChartData { .. } => Box::new(|_| Ok(())),
        }
    }

    // ========================================================================
    // Protocol access
    // ========================================================================

    /// Clone the current protocol (for bookmarking or inspection).
    pub fn snapshot_protocol(&self) -> CommandProtocol {
        self.manager.lock().protocol().clone()
    }

    /// Number of effective records in the current protocol.
    pub fn effective_len(&self) -> usize {
        self.manager.lock().protocol().effective_len()
    }

    /// Serialize the current effective log as bookmark JSON.
    pub fn bookmark_json(&self) -> Result<String, EngineError> {
        Ok(bookmark::to_json(self.manager.lock().protocol())?)
    }

    /// Write the current effective log to a bookmark file.
    pub fn save_bookmark(&self, path: impl AsRef<std::path::Path>) -> Result<(), EngineError> {
        Ok(bookmark::save(self.manager.lock().protocol(), path)?)
    }
}

impl std::fmt::Debug for ChartCommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartCommandProcessor")
            .field("effective_records", &self.effective_len())
            .field("load_running", &self.is_load_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ChartAction, Color};
    use crate::mock::{CollectingProgress, MockChartModel, MockLoader, ViewState};
    use crate::model::ModelError;
    use std::time::Duration;

    fn processor() -> (ChartCommandProcessor, Arc<Mutex<ViewState>>, Arc<MockLoader>) {
        let (model, state) = MockChartModel::new(ChartId::new("base"));
        let loader = Arc::new(MockLoader::new(Duration::from_millis(2)));
        let progress = Arc::new(CollectingProgress::new());
        let proc = ChartCommandProcessor::new(
            Box::new(model),
            loader.clone(),
            progress,
            ChartId::new("base"),
        )
        .unwrap();
        (proc, state, loader)
    }

    #[tokio::test]
    async fn test_execute_applies_effect_and_logs() {
        let (proc, state, _) = processor();
        proc.execute(
            CommandKind::ChangeChartColor,
            Some(ChartId::new("base")),
            vec!["#0a0b0c".into()],
        )
        .await
        .unwrap();

        assert_eq!(state.lock().base.color.as_deref(), Some("#0a0b0c"));
        assert_eq!(proc.effective_len(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_logs_nothing() {
        let (proc, state, _) = processor();
        let err = proc
            .execute(CommandKind::ChangeChartColor, None, vec!["#0a0b0c".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Protocol(_)));
        assert_eq!(proc.effective_len(), 0);
        assert_eq!(*state.lock(), ViewState::default());
    }

    #[tokio::test]
    async fn test_effect_failure_logs_nothing() {
        let (proc, _, _) = processor();
        let err = proc
            .execute(
                CommandKind::SetChartVisible,
                Some(ChartId::new("ghost")),
                vec!["true".into()],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Model(ModelError::UnknownChart(_))
        ));
        assert_eq!(proc.effective_len(), 0);
    }

    #[tokio::test]
    async fn test_loader_failure_logs_nothing_and_clears_flag() {
        let (proc, _, loader) = processor();
        loader.fail_next();

        let err = proc
            .execute(
                CommandKind::LoadBaseChartData,
                Some(ChartId::new("base")),
                vec!["f".into(), "c".into()],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Loader(_)));
        assert_eq!(proc.effective_len(), 0);
        assert!(!proc.is_load_running());
    }

    #[tokio::test]
    async fn test_load_dispatch_and_blocking_wait() {
        let (proc, _, loader) = processor();
        proc.execute_and_wait(
            CommandKind::LoadBaseChartData,
            Some(ChartId::new("base")),
            vec!["filter:mem".into(), "compute:avg".into()],
        )
        .await
        .unwrap();

        assert!(!proc.is_load_running());
        assert_eq!(loader.restart_count(), 1);
        assert_eq!(
            loader.last_params(),
            (Some("filter:mem".into()), Some("compute:avg".into()))
        );
        assert_eq!(proc.effective_len(), 1);
    }

    #[tokio::test]
    async fn test_typed_and_string_paths_log_identically() {
        let (string_proc, _, _) = processor();
        let (typed_proc, _, _) = processor();

        string_proc
            .execute(
                CommandKind::ChangeSeriesColor,
                Some(ChartId::new("base")),
                vec!["cpu".into(), "#a1b2c3".into()],
            )
            .await
            .unwrap();
        string_proc
            .execute(
                CommandKind::SetChartVisible,
                Some(ChartId::new("base")),
                vec!["false".into()],
            )
            .await
            .unwrap();

        typed_proc
            .execute_action(ChartAction::ChangeSeriesColor {
                chart: ChartId::new("base"),
                series: "cpu".to_string(),
                color: Color::new(0xA1, 0xB2, 0xC3),
            })
            .await
            .unwrap();
        typed_proc
            .execute_action(ChartAction::SetChartVisible {
                chart: ChartId::new("base"),
                visible: false,
            })
            .await
            .unwrap();

        assert_eq!(
            string_proc.bookmark_json().unwrap(),
            typed_proc.bookmark_json().unwrap()
        );
    }

    #[tokio::test]
    async fn test_delete_background_chart_erases_itself_from_bookmark() {
        let (proc, state, _) = processor();
        proc.execute(
            CommandKind::PushBaseToBackground,
            Some(ChartId::new("bg-1")),
            vec![],
        )
        .await
        .unwrap();
        proc.execute(
            CommandKind::ChangeChartColor,
            Some(ChartId::new("bg-1")),
            vec!["#111111".into()],
        )
        .await
        .unwrap();
        proc.execute(
            CommandKind::DeleteBackgroundChart,
            Some(ChartId::new("bg-1")),
            vec![],
        )
        .await
        .unwrap();

        // The live model applied the delete...
        assert!(state.lock().background.is_empty());
        // ...and the bookmark no longer mentions the chart at all.
        let json = proc.bookmark_json().unwrap();
        assert!(!json.contains("bg-1"));
        assert!(!json.contains("DeleteBackgroundChart"));
        assert_eq!(proc.effective_len(), 0);
    }
}
