//! Crate-level error type for the compliance agent orchestrator.

use ruleiq_foundation::circuit_breaker::CircuitBreakerError;
use ruleiq_foundation::persistence::PersistenceError;
use ruleiq_kernel::agent::error::AgentError;
use thiserror::Error;

/// Errors surfaced by the orchestrator's public API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// The caller supplied a malformed or missing required input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller is not authorized to act on the given tenant/run.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A model provider call failed after exhausting retries and fallbacks.
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// The circuit breaker for a model/provider is open.
    #[error("circuit open for {0}")]
    CircuitOpen(String),

    /// Every model in the fallback chain has an OPEN circuit; no candidate
    /// was available to dispatch the call to.
    #[error("no models available: all candidates have an open circuit ({0})")]
    ModelsUnavailable(String),

    /// A budget (session, daily, or monthly) was exceeded.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// The requested run does not exist.
    #[error("run not found: {0}")]
    RunNotFound(uuid::Uuid),

    /// Attempted to resume a run that is not in an interrupted/paused state.
    #[error("run {0} is not resumable (status: {1})")]
    NotResumable(uuid::Uuid, String),

    /// A checkpoint write raced with a newer checkpoint for the same run.
    #[error("checkpoint version conflict for run {0}: expected {1}, found {2}")]
    VersionConflict(uuid::Uuid, u64, u64),

    /// Graph exceeded its configured step budget without reaching END.
    #[error("run {0} exceeded max steps ({1})")]
    StepBudgetExceeded(uuid::Uuid, u32),

    /// A run's turn counter exceeded `max_turns` without an explicit
    /// loop-progress signal from a node.
    #[error("run {0} exceeded max turns ({1})")]
    MaxTurnsExceeded(uuid::Uuid, u32),

    /// A node failed to release its resources within `drain_timeout` after
    /// a cancellation request.
    #[error("node {1} for run {0} did not drain within the timeout")]
    NodeDrainTimeout(uuid::Uuid, String),

    /// A streamed or concatenated model response failed schema validation.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A node or retrieval-level error that propagated from the kernel layer.
    #[error("node error: {0}")]
    Node(#[from] AgentError),

    /// A persistence-layer error (checkpoint store, evidence store).
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Evidence collection failed for one or more sources.
    #[error("evidence collection failed: {0}")]
    EvidenceCollection(String),

    /// Every registered collector ran and none produced a single item.
    #[error("no evidence collected for request {0}")]
    NoEvidenceCollected(uuid::Uuid),

    /// A configuration load/parse error.
    #[error("config error: {0}")]
    Config(#[from] ruleiq_kernel::config::ConfigError),

    /// A serialization error (checkpoint blob, cache entry, wire event).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Run was cancelled by the caller.
    #[error("run {0} was cancelled")]
    Cancelled(uuid::Uuid),

    /// An unexpected internal error that doesn't fit a named variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl<E: std::error::Error + 'static> From<CircuitBreakerError<E>> for OrchestratorError {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen { name, .. } => OrchestratorError::CircuitOpen(name),
            CircuitBreakerError::OperationError { error, .. } => {
                OrchestratorError::Llm(error.to_string())
            }
        }
    }
}

/// Convenience alias.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
