//! Graph Executor (C7).
//!
//! `ruleiq_foundation::workflow::StateGraphImpl`/`CompiledGraphImpl` already
//! implement the kernel's `StateGraph`/`CompiledGraph` traits end to end
//! (topological execution, parallel fan-out, reducer-based state merge,
//! streaming). What's missing for the orchestrator is per-node retry:
//! `ResilientNode` wraps any `NodeFunc` with the retry-with-backoff pattern
//! from `llm::retry::RetryExecutor`, so a node backed by a flaky call retries
//! transient failures before surfacing a `NodeError`.
//!
//! Circuit breaking is deliberately NOT done here: §3.1 makes `CircuitState`
//! a per-model property, not a per-node one, so the breaker for LLM-backed
//! nodes lives on the model itself (`model_registry::RegisteredModel`), where
//! PLAN and ACT both call through regardless of which node issued the call.

use async_trait::async_trait;
use ruleiq_kernel::agent::error::{AgentError, AgentResult};
use ruleiq_kernel::workflow::{Command, GraphState, NodeFunc, RuntimeContext};
use std::time::Duration;
use tracing::warn;

/// Backoff policy for a resilient node's retry loop. Mirrors
/// `RetryConfig` (base/factor/jitter/max_attempts).
#[derive(Debug, Clone)]
pub struct NodeRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_ratio: f64,
}

impl Default for NodeRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            backoff_factor: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

impl NodeRetryPolicy {
    /// A retry policy appropriate for a stateful/side-effecting node (§6.3:
    /// `max_attempts` default 1 for these — i.e. no retry).
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(0),
            backoff_factor: 1.0,
            jitter_ratio: 0.0,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let jitter = base * self.jitter_ratio * (rand::random::<f64>() * 2.0 - 1.0);
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }
}

/// Decorates a `NodeFunc` with retry-with-backoff. A node that exhausts its
/// attempt budget surfaces `AgentError::ExecutionFailed` so the graph's own
/// error path handles it; callers that need a fallback node wire it as the
/// next edge and route to it from a conditional edge keyed on the failure.
pub struct ResilientNode<S: GraphState> {
    inner: Box<dyn NodeFunc<S>>,
    retry: NodeRetryPolicy,
}

impl<S: GraphState> ResilientNode<S> {
    pub fn new(inner: Box<dyn NodeFunc<S>>, retry: NodeRetryPolicy) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl<S: GraphState> NodeFunc<S> for ResilientNode<S> {
    async fn call(&self, state: &mut S, ctx: &RuntimeContext) -> AgentResult<Command> {
        let mut attempt = 0;
        loop {
            match self.inner.call(state, ctx).await {
                Ok(command) => return Ok(command),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(AgentError::ExecutionFailed(format!(
                            "node '{}' failed after {attempt} attempt(s): {error}",
                            self.inner.name()
                        )));
                    }
                    let delay = self.retry.delay(attempt - 1);
                    warn!(
                        node = self.inner.name(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "node failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> Option<&str> {
        self.inner.description()
    }
}
