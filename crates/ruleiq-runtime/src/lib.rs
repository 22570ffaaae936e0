// =============================================================================
// ruleIQ Orchestrator Runtime
// =============================================================================
//
// Wires the Compliance Agent Orchestrator together on top of `ruleiq-kernel`'s
// graph-execution primitives and `ruleiq-foundation`'s LLM/circuit-breaker/
// persistence stack:
//
// - `config`: layered `Config` (env + file), passed explicitly, never global
// - `error`: `OrchestratorError`, the embedding API's single error type
// - `model_registry`: C1 model registry + selection/fallback
// - `cost_governor`: C3 per-tenant token/cost budget enforcement
// - `response_cache`: C4 semantic response cache
// - `knowledge_graph`: C5 hybrid (dense + sparse) retrieval client
// - `checkpoint`: C6 checkpoint store (SQLite-backed, feature-gated)
// - `graph_exec`: C7 `ResilientNode` retry/circuit-breaker node wrapper
// - `compliance_graph`: C8 the six-node PERCEIVE..RESPOND graph
// - `evidence`: C9 evidence collection fan-out
// - `orchestrator`: the embedding-facing `ComplianceOrchestrator`
//
// =============================================================================

pub mod checkpoint;
pub mod compliance_graph;
pub mod config;
pub mod cost_governor;
pub mod error;
pub mod evidence;
pub mod graph_exec;
pub mod knowledge_graph;
pub mod model_registry;
pub mod orchestrator;
pub mod response_cache;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use compliance_graph::{build_compliance_graph, ComplianceState, Conclusion, PlanStep, RetrievalItem};
pub use config::{CircuitConfig, Config};
pub use cost_governor::CostGovernor;
pub use error::{OrchestratorError, OrchestratorResult};
pub use evidence::{Collector, CollectionRequest, CollectionResult, EvidenceOrchestrator};
pub use graph_exec::{NodeRetryPolicy, ResilientNode};
pub use knowledge_graph::{Control, ControlChunk, Framework, FusedResult, KnowledgeGraphClient, Obligation, Penalty, Theme};
pub use model_registry::{ModelClient, ModelDescriptor, ModelSelector, RegisteredModel};
pub use orchestrator::{ComplianceOrchestrator, RunStatus, RunRecord, WireStreamEvent};
pub use response_cache::ResponseCache;
