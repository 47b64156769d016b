//! The single cooperative rendering thread, modeled as a task queue with
//! one consumer.
//!
//! All chart-model mutation is serialized through one dedicated OS thread
//! that owns the model. Callers submit boxed jobs over an unbounded channel
//! and await a per-job ack, which is the "blocking submission" the replay
//! path relies on for total ordering of effects.

use std::cell::Cell;

use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;
use crate::model::{ChartModel, ModelResult};

/// A unit of work executed on the render thread with exclusive model access.
pub type RenderJob = Box<dyn FnOnce(&mut dyn ChartModel) -> ModelResult<()> + Send>;

struct Envelope {
    job: RenderJob,
    ack: oneshot::Sender<ModelResult<()>>,
}

thread_local! {
    // Nesting depth of render jobs on the current thread. Non-zero only on
    // the render thread while a job runs; the processor's recursion guard
    // reads it to refuse re-entrant dispatch.
    static JOB_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Render-job nesting depth on the calling thread.
pub(crate) fn job_depth() -> u32 {
    JOB_DEPTH.get()
}

/// Handle for submitting jobs to the render thread.
///
/// Cloneable; the thread exits when every handle is dropped.
#[derive(Clone)]
pub struct RenderHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl RenderHandle {
    /// Start the render thread, moving `model` onto it.
    pub fn spawn(mut model: Box<dyn ChartModel>) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

        std::thread::Builder::new()
            .name("strata-render".to_string())
            .spawn(move || {
                while let Some(Envelope { job, ack }) = rx.blocking_recv() {
                    JOB_DEPTH.set(JOB_DEPTH.get() + 1);
                    let result = job(model.as_mut());
                    JOB_DEPTH.set(JOB_DEPTH.get() - 1);
                    // A dropped ack just means the caller gave up waiting.
                    let _ = ack.send(result);
                }
                tracing::debug!("render queue closed; render thread exiting");
            })?;

        Ok(Self { tx })
    }

    /// Submit a job and wait until the render thread has applied it.
    ///
    /// Completion of this future is the ordering guarantee: once it
    /// resolves, the job's effect is visible to every later job.
    pub async fn submit(&self, job: RenderJob) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Envelope { job, ack: ack_tx })
            .map_err(|_| EngineError::RenderQueueClosed)?;
        let result = ack_rx.await.map_err(|_| EngineError::RenderQueueClosed)?;
        result.map_err(EngineError::Model)
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle").finish_non_exhaustive()
    }
}
