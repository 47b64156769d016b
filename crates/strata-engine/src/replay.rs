//! Asynchronous protocol replay.
//!
//! Replay reconstructs a view from a bookmark: it clears the live state,
//! then re-dispatches every effective record in order on a dedicated worker
//! task, lining up behind the render queue for each record so record *n+1*
//! never starts before record *n*'s effect has landed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use strata_protocol::{CommandProtocol, ProtocolManager, ProtocolRecord, validate};

use crate::action::ChartAction;
use crate::error::EngineError;
use crate::processor::ChartCommandProcessor;

/// Pause between replayed records. The underlying renderer misbehaves when
/// structural commands arrive back-to-back; this is a mitigation, not a
/// correctness requirement.
const REPLAY_STEP_DELAY: Duration = Duration::from_millis(50);

/// Lifecycle of a replay run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayState {
    /// No replay has run or the last one is long finished.
    #[default]
    Idle,
    /// Clearing live chart state and the session protocol.
    Resetting,
    /// Re-dispatching effective records.
    Replaying,
    /// The last replay finished and its callback ran.
    Done,
    /// The last replay aborted on an error. Terminal for that run.
    Failed,
}

impl ChartCommandProcessor {
    /// Observe replay state transitions.
    pub fn replay_state(&self) -> watch::Receiver<ReplayState> {
        self.replay_state.subscribe()
    }

    /// Replay `protocol` against the live collaborators on a worker task.
    ///
    /// On success the session adopts `protocol` (so a later bookmark save
    /// round-trips) and `on_done` runs. On error the replay aborts where it
    /// is: already-applied records are not rolled back, the state becomes
    /// [`ReplayState::Failed`], and `on_done` is not invoked.
    ///
    /// Replayed records are not logged back into the protocol.
    pub fn replay<F>(self: &Arc<Self>, protocol: CommandProtocol, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            {
                let state = *this.replay_state.borrow();
                if matches!(state, ReplayState::Resetting | ReplayState::Replaying) {
                    warn!(?state, "replay already in progress; request dropped");
                    return;
                }
            }

            match this.run_replay(&protocol).await {
                Ok(()) => {
                    this.replay_state.send_replace(ReplayState::Done);
                    on_done();
                }
                Err(err) => {
                    error!(%err, "replay aborted");
                    this.replay_state.send_replace(ReplayState::Failed);
                }
            }
        })
    }

    async fn run_replay(&self, protocol: &CommandProtocol) -> Result<(), EngineError> {
        self.replay_state.send_replace(ReplayState::Resetting);

        // Known empty starting state: wipe the model and the session log.
        self.render.submit(Box::new(|m| m.clear_all())).await?;
        self.manager.lock().reset();

        self.replay_state.send_replace(ReplayState::Replaying);

        let records: Vec<ProtocolRecord> = protocol.effective().cloned().collect();
        let total = records.len();
        info!(records = total, "replay started");

        for (index, record) in records.iter().enumerate() {
            self.progress.progress(
                &format!("replaying {}", record.command),
                index as f32 / total.max(1) as f32,
            );
            self.replay_record(record)
                .await
                .map_err(|err| EngineError::ReplayAborted {
                    index,
                    source: Box::new(err),
                })?;
            // See REPLAY_STEP_DELAY.
            tokio::time::sleep(REPLAY_STEP_DELAY).await;
        }

        // The replayed protocol becomes the session protocol, counters
        // recomputed from its effective records.
        {
            let mut manager = self.manager.lock();
            let base = manager.base_chart().clone();
            *manager = ProtocolManager::from_protocol(base, protocol.clone());
        }

        self.progress.progress("replay complete", 1.0);
        info!(records = total, "replay finished");
        Ok(())
    }

    /// Re-dispatch one record without logging it.
    async fn replay_record(&self, record: &ProtocolRecord) -> Result<(), EngineError> {
        validate::validate(record.command, record.target.as_ref(), &record.args)?;
        let action = ChartAction::from_parts(record.command, record.target.as_ref(), &record.args)?;

        self.apply_effect(&action).await?;

        // Data must land before later structural commands reference it.
        if matches!(action, ChartAction::LoadBaseChartData { .. }) {
            self.wait_for_load().await;
        }
        Ok(())
    }
}
