//! Explicit configuration value for the orchestrator.
//!
//! Replaces ambient globals/singletons: every component that needs
//! configuration (model pricing, budgets, retry policy, cache TTL,
//! persistence DSN) reads it from a `Config` value threaded through at
//! construction time, loaded layered file -> env via `ruleiq_kernel::config`.

use ruleiq_kernel::config::ConfigResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub models: ModelConfig,
    pub budget: BudgetConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub circuit: CircuitConfig,
    pub graph: GraphRunConfig,
    pub evidence: EvidenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            models: ModelConfig::default(),
            budget: BudgetConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
            graph: GraphRunConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file, then overlay `RULEIQ_*` environment
    /// variables (e.g. `RULEIQ_DATABASE__URL`).
    pub fn load(path: &str) -> ConfigResult<Self> {
        ruleiq_kernel::config::load_with_env(path, "RULEIQ")
    }

    /// Load from several layered sources, later sources winning.
    pub fn load_merged(paths: &[&str]) -> ConfigResult<Self> {
        ruleiq_kernel::config::load_merged(paths)
    }

    /// Project `graph` settings onto the kernel's generic graph-run config.
    pub fn graph_config(&self) -> ruleiq_kernel::workflow::GraphConfig {
        ruleiq_kernel::workflow::GraphConfig::new()
            .with_max_steps(self.graph.max_steps)
            .with_checkpoints(true, self.graph.checkpoint_every_n_steps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://./ruleiq.db` or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ordered fallback chain: primary model first, degraded alternatives after.
    /// Illustrative default; deployments override via config file/env.
    pub fallback_chain: Vec<String>,
    pub default_provider: String,
    pub request_timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fallback_chain: vec![
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
                "claude-3-haiku".to_string(),
            ],
            default_provider: "openai".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub max_cost_per_tenant_daily: Option<f64>,
    pub max_cost_per_tenant_monthly: Option<f64>,
    pub soft_limit_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_cost_per_tenant_daily: Some(50.0),
            max_cost_per_tenant_monthly: Some(1000.0),
            soft_limit_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// Responses generated at a temperature above this are never cached,
    /// since a re-run at the same fingerprint is expected to vary.
    pub temperature_cutoff: f64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 900,
            max_entries: 10_000,
            temperature_cutoff: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl CircuitConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            backoff_factor: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRunConfig {
    /// PLAN-loop confidence threshold; below this the graph re-enters PLAN.
    pub plan_confidence_threshold: f64,
    pub max_steps: u32,
    pub checkpoint_every_n_steps: u32,
    /// How long a single node's future may run before the Executor treats it
    /// as stuck and fails the run with `NodeDrainTimeout`.
    pub node_timeout_ms: u64,
    /// On cancellation, how long a node gets to return before the Executor
    /// force-fails the run with `NodeDrainTimeout`, still writing a final
    /// checkpoint.
    pub drain_timeout_ms: u64,
}

impl GraphRunConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for GraphRunConfig {
    fn default() -> Self {
        Self {
            plan_confidence_threshold: 0.6,
            max_steps: 50,
            checkpoint_every_n_steps: 1,
            node_timeout_ms: 30_000,
            drain_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    pub max_concurrent_per_source: usize,
    pub buffer_size: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_source: 4,
            buffer_size: 256,
        }
    }
}
