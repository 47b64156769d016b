//! The asynchronous data-loader collaborator.
//!
//! Loading base-chart data is the one asynchronous command effect: the
//! dispatch only starts the load, and completion arrives later through the
//! loader's own signal. Callers that need to line up behind a load (blocking
//! loads, replay) await [`DataLoader::wait_until_idle`] instead of polling a
//! running flag.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the data loader.
#[derive(Error, Debug)]
#[error("data loader: {0}")]
pub struct LoaderError(pub String);

/// Asynchronous time-series loader for the base chart.
///
/// Parameter setters take the opaque serialized strings carried in the
/// protocol; the loader owns their interpretation.
#[async_trait]
pub trait DataLoader: Send + Sync {
    /// Install the filter parameters for the next load.
    fn set_filter_params(&self, params: &str);

    /// Install the compute parameters for the next load.
    fn set_compute_params(&self, params: &str);

    /// Start (or restart) the load with the current parameters. Returns as
    /// soon as the load is underway.
    async fn restart(&self) -> Result<(), LoaderError>;

    /// Whether a load is currently in flight.
    fn is_running(&self) -> bool;

    /// Resolve once no load is in flight (immediately if idle). Covers
    /// completion, failure, and cancellation alike.
    async fn wait_until_idle(&self);

    /// Cancel an in-flight load, if any. Default: not supported, no-op.
    fn cancel(&self) {}
}
