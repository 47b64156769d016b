//! Error types for command execution and replay.

use thiserror::Error;

use strata_protocol::{CommandKind, ProtocolError};

use crate::loader::LoaderError;
use crate::model::ModelError;

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Validation or protocol bookkeeping failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The chart model rejected an effect.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The data loader failed to start or complete a load.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// An argument passed arity checks but could not be decoded.
    #[error("{command}: bad argument: {detail}")]
    BadArgument { command: CommandKind, detail: String },

    /// The render thread is gone; no further effects can run.
    #[error("render queue closed")]
    RenderQueueClosed,

    /// Replay stopped at the given effective-record index.
    #[error("replay aborted at record {index}: {source}")]
    ReplayAborted {
        index: usize,
        #[source]
        source: Box<EngineError>,
    },
}
