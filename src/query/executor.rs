//! Execution backend contract.
//!
//! This crate never runs queries. A backend implements [`QueryExecutor`],
//! receives the validated config plus the `flatten` flag, and answers with
//! a JSON payload that [`run_query`] hands to the result shaper.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::Result;
use crate::query::model::QueryConfig;
use crate::result::{shape_payload, ResultView, ShapeOptions};

/// Failures reported by an execution backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The backend refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The backend could not be reached.
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    /// Any other backend failure.
    #[error("executor failed: {0}")]
    Other(String),
}

impl ExecutorError {
    /// Builds [`ExecutorError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        ExecutorError::Rejected(reason.into())
    }

    /// Builds [`ExecutorError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ExecutorError::Unavailable(reason.into())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::Rejected(_) => "ExecutorRejected",
            ExecutorError::Unavailable(_) => "ExecutorUnavailable",
            ExecutorError::Other(_) => "ExecutorFailed",
        }
    }
}

/// Request body sent to the backend: the config fields plus `flatten`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ExecutionRequest<'a> {
    /// Validated query definition.
    #[serde(flatten)]
    pub config: &'a QueryConfig,
    /// Ask for a single-level dot-path payload instead of a nested tree.
    pub flatten: bool,
}

impl<'a> ExecutionRequest<'a> {
    /// Creates a request.
    pub fn new(config: &'a QueryConfig, flatten: bool) -> Self {
        Self { config, flatten }
    }
}

/// Backend collaborator that runs a query definition.
pub trait QueryExecutor {
    /// Executes `request` and returns the raw payload.
    fn execute(&self, request: &ExecutionRequest<'_>) -> std::result::Result<Value, ExecutorError>;
}

impl<F> QueryExecutor for F
where
    F: Fn(&ExecutionRequest<'_>) -> std::result::Result<Value, ExecutorError>,
{
    fn execute(&self, request: &ExecutionRequest<'_>) -> std::result::Result<Value, ExecutorError> {
        self(request)
    }
}

/// Raw payload returned by [`run_query`], shaped on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOutcome {
    /// Payload exactly as the backend returned it.
    pub payload: Value,
    /// Flag the payload was requested with.
    pub flatten: bool,
}

impl QueryOutcome {
    /// Shapes the payload for display.
    pub fn view<'a>(&'a self, options: &'a ShapeOptions) -> ResultView<'a> {
        shape_payload(&self.payload, self.flatten, options)
    }
}

/// Sends `config` to `executor`.
pub fn run_query<E>(executor: &E, config: &QueryConfig, flatten: bool) -> Result<QueryOutcome>
where
    E: QueryExecutor + ?Sized,
{
    let request = ExecutionRequest::new(config, flatten);
    debug!(
        hops = config.patterns().len(),
        columns = config.columns().len(),
        flatten,
        "executor.request"
    );
    let payload = executor.execute(&request)?;
    Ok(QueryOutcome { payload, flatten })
}
