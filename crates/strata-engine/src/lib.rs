//! Command execution and replay engine for Strata.
//!
//! Sits between the view layer and its collaborators: every mutating user
//! action enters through [`ChartCommandProcessor`], which validates it,
//! applies its effect on the single render thread (or starts the async
//! data loader), and records it in the compacting command protocol from
//! `strata-protocol`. A recorded protocol — a bookmark — can be replayed
//! asynchronously to reconstruct an equivalent view state.
//!
//! Collaborators ([`ChartModel`], [`DataLoader`], [`ProgressSink`]) are
//! traits; their real implementations live with the view layer. In-memory
//! mocks for all three are in [`mock`].

mod action;
mod error;
mod loader;
mod model;
mod processor;
mod progress;
mod render;
mod replay;

pub mod mock;

pub use action::{ChartAction, ChartTypeTag, Color};
pub use error::EngineError;
pub use loader::{DataLoader, LoaderError};
pub use model::{ChartModel, ModelError, ModelResult};
pub use processor::ChartCommandProcessor;
pub use progress::{NullProgress, ProgressSink};
pub use render::{RenderHandle, RenderJob};
pub use replay::ReplayState;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
