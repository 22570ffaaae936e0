//! Compliance Orchestrator — the embedding-facing API (§6.1).
//!
//! Wires C1-C9 behind six async operations (`submit`/`get`/`resume`/`cancel`/
//! `collect`/`get_collection`). No HTTP surface lives here; a caller embeds
//! this crate directly and adapts to whatever transport it needs, mirroring
//! `ruleiq_foundation::workflow::executor::WorkflowExecutor`'s pattern of
//! taking a compiled graph and an explicit `Config`/`RuntimeContext` rather
//! than owning a transport of its own.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::compliance_graph::{build_compliance_graph, next_node_after, ComplianceState};
use crate::config::Config;
use crate::cost_governor::{CostGovernor, Scope};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::evidence::{CollectionRequest, CollectionResult, Collector, EvidenceOrchestrator};
use crate::knowledge_graph::KnowledgeGraphClient;
use crate::model_registry::ModelSelector;
use futures::StreamExt;
use ruleiq_foundation::workflow::CompiledGraphImpl;
use ruleiq_kernel::workflow::{CompiledGraph, GraphState, RuntimeContext, StreamEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cost estimate held against a tenant's budget for the lifetime of a run.
/// A flat per-run hold rather than a per-token estimate: actual LLM spend
/// is committed once the run finishes, but admission control needs a number
/// up front and individual node calls aren't wired through the governor yet
/// (recorded as an open gap, not silently skipped).
const ESTIMATED_RUN_COST_USD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// A node (currently only ACT, via the `"ask_human"` tool) requested
    /// human input; the run is checkpointed and waiting on `resume`.
    AwaitingHuman,
    Completed,
    Interrupted,
    Failed,
    Cancelled,
}

/// Outcome of driving the graph to its next stopping point: either it ran
/// to completion, or it suspended waiting on a human.
enum DriveOutcome {
    Completed(ComplianceState, String),
    AwaitingHuman(ComplianceState, String),
}

/// Everything the orchestrator knows about one submitted run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub status: RunStatus,
    pub last_node: Option<String>,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    fn new(run_id: Uuid, tenant_id: String) -> Self {
        Self {
            run_id,
            tenant_id,
            status: RunStatus::Running,
            last_node: None,
            answer: None,
            error: None,
        }
    }
}

pub struct ComplianceOrchestrator {
    config: Config,
    selector: Arc<ModelSelector>,
    knowledge_graph: Arc<RwLock<KnowledgeGraphClient>>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    cost_governor: Arc<CostGovernor>,
    evidence: Arc<EvidenceOrchestrator>,
    runs: RwLock<HashMap<Uuid, RunRecord>>,
}

impl ComplianceOrchestrator {
    pub fn new(
        config: Config,
        selector: Arc<ModelSelector>,
        knowledge_graph: Arc<RwLock<KnowledgeGraphClient>>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        cost_governor: Arc<CostGovernor>,
        collectors: Vec<Arc<dyn Collector>>,
    ) -> Self {
        let evidence = Arc::new(EvidenceOrchestrator::new(collectors));
        Self {
            config,
            selector,
            knowledge_graph,
            checkpoint_store,
            cost_governor,
            evidence,
            runs: RwLock::new(HashMap::new()),
        }
    }

    fn build_graph(&self) -> OrchestratorResult<CompiledGraphImpl<ComplianceState>> {
        Ok(build_compliance_graph(
            self.selector.clone(),
            self.knowledge_graph.clone(),
            self.config.graph.max_steps,
            self.config.graph.plan_confidence_threshold,
        )?)
    }

    /// Submit a new compliance question for `tenant_id`. Returns immediately
    /// once the run is registered; callers poll `get` for the outcome.
    /// Per-model-call caching (§4.4) happens inside the `ModelSelector` this
    /// orchestrator was constructed with, not at this whole-run level — two
    /// different runs asking similar questions share cached model calls only
    /// to the extent their individual PLAN/ACT prompts fingerprint alike.
    pub async fn submit(&self, tenant_id: impl Into<String>, query: impl Into<String>) -> OrchestratorResult<Uuid> {
        let tenant_id = tenant_id.into();
        let query = query.into();
        let run_id = Uuid::new_v4();

        self.runs
            .write()
            .await
            .insert(run_id, RunRecord::new(run_id, tenant_id.clone()));

        let reservation = self
            .cost_governor
            .reserve(Scope::Tenant(tenant_id.clone()), ESTIMATED_RUN_COST_USD)
            .await
            .map_err(|e| OrchestratorError::BudgetExceeded(e.to_string()))?;

        let graph = match self.build_graph() {
            Ok(graph) => graph,
            Err(e) => {
                self.cost_governor.cancel(reservation).await.ok();
                return Err(e);
            }
        };

        let initial_state = ComplianceState::new(run_id, tenant_id, query);
        let ctx = RuntimeContext::with_config(graph.id(), self.config.graph_config());

        match self.drive_to_completion(&graph, initial_state, &ctx, 0).await {
            Ok(DriveOutcome::Completed(_, answer)) => {
                self.cost_governor.commit(reservation, ESTIMATED_RUN_COST_USD).await.ok();
                self.finish(run_id, RunStatus::Completed, Some(answer), None, Some("respond")).await;
            }
            Ok(DriveOutcome::AwaitingHuman(_, node_id)) => {
                self.cost_governor.commit(reservation, ESTIMATED_RUN_COST_USD).await.ok();
                self.finish(run_id, RunStatus::AwaitingHuman, None, None, Some(&node_id)).await;
            }
            Err(OrchestratorError::StepBudgetExceeded(_, _)) => {
                self.cost_governor.cancel(reservation).await.ok();
                self.finish(run_id, RunStatus::Interrupted, None, Some("step budget exceeded".into()), None)
                    .await;
            }
            Err(e) => {
                self.cost_governor.cancel(reservation).await.ok();
                self.finish(run_id, RunStatus::Failed, None, Some(e.to_string()), None).await;
            }
        }

        Ok(run_id)
    }

    async fn finish(
        &self,
        run_id: Uuid,
        status: RunStatus,
        answer: Option<String>,
        error: Option<String>,
        last_node: Option<&str>,
    ) {
        if let Some(record) = self.runs.write().await.get_mut(&run_id) {
            record.status = status;
            record.answer = answer;
            record.error = error;
            record.last_node = last_node.map(str::to_string);
        }
    }

    /// Drive the graph one node at a time via `step`, capping at
    /// `max_steps` so a refinement loop that never converges surfaces as
    /// `StepBudgetExceeded` instead of running forever. Persists a
    /// checkpoint after *every* transition (not just REMEMBER's), so a run
    /// interrupted at any point — budget exhaustion, a node requesting human
    /// input — has a checkpoint for `resume` to continue from.
    /// `starting_version` lets `resume` continue the checkpoint store's
    /// strictly-monotonic version sequence rather than restarting at 0.
    async fn drive_to_completion(
        &self,
        graph: &CompiledGraphImpl<ComplianceState>,
        mut state: ComplianceState,
        ctx: &RuntimeContext,
        starting_version: u64,
    ) -> OrchestratorResult<DriveOutcome> {
        let max_steps = self.config.graph.max_steps;
        let run_id = state.run_id();
        let mut version = starting_version;

        let node_timeout = self.config.graph.node_timeout();
        for _ in 0..max_steps {
            let stalled_node = ctx.current_node().await;
            let step = tokio::time::timeout(node_timeout, graph.step(state, Some(ctx.clone())))
                .await
                .map_err(|_| OrchestratorError::NodeDrainTimeout(run_id, stalled_node))??;
            state = step.state;

            let snapshot = state.to_json()?;
            self.checkpoint_store
                .put(Checkpoint {
                    run_id,
                    version,
                    node_id: step.node_id.clone(),
                    state: snapshot,
                    created_at: chrono::Utc::now(),
                })
                .await?;
            version += 1;

            if step.is_complete {
                let answer = state.answer().unwrap_or_default();
                return Ok(DriveOutcome::Completed(state, answer));
            }
            if state.awaiting_human() {
                return Ok(DriveOutcome::AwaitingHuman(state, step.node_id));
            }
            if let Some(next) = step.next_node {
                ctx.set_current_node(next).await;
            }
        }
        Err(OrchestratorError::StepBudgetExceeded(run_id, max_steps))
    }

    pub async fn get(&self, run_id: Uuid) -> OrchestratorResult<RunRecord> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(OrchestratorError::RunNotFound(run_id))
    }

    /// Resume an `Interrupted` or `AwaitingHuman` run from its last
    /// checkpoint, continuing the graph via `step` from the node *after* the
    /// one checkpointed (§4.7) rather than re-running it. `extra_input`, if
    /// given, is recorded as the resumed state's metadata — the mechanism an
    /// `AwaitingHuman` run's caller uses to supply the human's answer.
    pub async fn resume(&self, run_id: Uuid, extra_input: Option<serde_json::Value>) -> OrchestratorResult<RunRecord> {
        let status = self.get(run_id).await?.status;
        if !matches!(status, RunStatus::Interrupted | RunStatus::AwaitingHuman) {
            return Err(OrchestratorError::NotResumable(run_id, format!("{status:?}")));
        }

        let checkpoint = self
            .checkpoint_store
            .latest(run_id)
            .await?
            .ok_or(OrchestratorError::RunNotFound(run_id))?;
        let mut state = ComplianceState::from_json(checkpoint.state)?;
        state.resolve_human_input(extra_input).await?;

        self.finish(run_id, RunStatus::Running, None, None, Some(&checkpoint.node_id))
            .await;

        let graph = self.build_graph()?;
        let ctx = RuntimeContext::with_config(graph.id(), self.config.graph_config());
        let resume_node = next_node_after(&checkpoint.node_id).unwrap_or(checkpoint.node_id.as_str());
        ctx.set_current_node(resume_node).await;

        match self.drive_to_completion(&graph, state, &ctx, checkpoint.version + 1).await {
            Ok(DriveOutcome::Completed(_, answer)) => {
                self.finish(run_id, RunStatus::Completed, Some(answer), None, Some("respond")).await;
            }
            Ok(DriveOutcome::AwaitingHuman(_, node_id)) => {
                self.finish(run_id, RunStatus::AwaitingHuman, None, None, Some(&node_id)).await;
            }
            Err(OrchestratorError::StepBudgetExceeded(_, _)) => {
                self.finish(run_id, RunStatus::Interrupted, None, Some("step budget exceeded".into()), None)
                    .await;
            }
            Err(e) => {
                self.finish(run_id, RunStatus::Failed, None, Some(e.to_string()), None).await;
            }
        }

        self.get(run_id).await
    }

    /// Mark a run cancelled. A run still executing inline (no background
    /// task backs `submit` in this implementation) can't be interrupted
    /// mid-flight; cancel only takes effect on runs not yet `Completed`.
    pub async fn cancel(&self, run_id: Uuid) -> OrchestratorResult<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(&run_id).ok_or(OrchestratorError::RunNotFound(run_id))?;
        if record.status == RunStatus::Completed {
            return Err(OrchestratorError::NotResumable(run_id, "Completed".to_string()));
        }
        record.status = RunStatus::Cancelled;
        record.error = Some(format!("run {run_id} was cancelled"));
        Ok(())
    }

    /// Fan out an evidence collection request (C9).
    pub async fn collect(&self, request: CollectionRequest) -> OrchestratorResult<CollectionResult> {
        self.evidence
            .collect(request)
            .await
            .map_err(|e| OrchestratorError::EvidenceCollection(e.to_string()))
    }

    /// Streaming variant of `collect`; progress updates arrive on the
    /// returned broadcast receiver at most every 250ms.
    pub async fn get_collection(
        &self,
        request: CollectionRequest,
    ) -> (
        OrchestratorResult<CollectionResult>,
        tokio::sync::broadcast::Receiver<crate::evidence::CollectionProgress>,
    ) {
        let (result, progress) = self.evidence.collect_streaming(request).await;
        (result.map_err(|e| OrchestratorError::EvidenceCollection(e.to_string())), progress)
    }

    /// Run a query and stream per-node progress instead of waiting for
    /// `submit`/`get`. The graph executes on a spawned task; events arrive
    /// on the returned channel as they happen, tagged with a monotonic `seq`
    /// so a transport can detect gaps or reordering.
    pub async fn stream(
        &self,
        tenant_id: impl Into<String>,
        query: impl Into<String>,
    ) -> OrchestratorResult<(Uuid, tokio::sync::mpsc::Receiver<WireStreamEvent>)> {
        let run_id = Uuid::new_v4();
        let state = ComplianceState::new(run_id, tenant_id.into(), query.into());
        let graph = self.build_graph()?;
        let ctx = RuntimeContext::with_config(graph.id(), self.config.graph_config());

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let mut events = graph.stream(state, Some(ctx));
            let mut seq = 0u64;
            while let Some(event) = events.next().await {
                seq += 1;
                let wire = match event {
                    Ok(StreamEvent::NodeStart { node_id, .. }) => {
                        WireStreamEvent::node_start(run_id, node_id, seq)
                    }
                    Ok(StreamEvent::NodeEnd { node_id, .. }) => WireStreamEvent::node_end(run_id, node_id, seq),
                    Ok(StreamEvent::End { .. }) => WireStreamEvent::end(run_id, seq),
                    Ok(StreamEvent::Error { node_id, error }) => {
                        WireStreamEvent::error(run_id, node_id, error, seq)
                    }
                    Ok(StreamEvent::NodeRetry { node_id, attempt, error }) => {
                        WireStreamEvent::retry(run_id, node_id, attempt, error, seq)
                    }
                    Ok(StreamEvent::NodeFallback { from_node, to_node, reason }) => {
                        WireStreamEvent::fallback(run_id, from_node, to_node, reason, seq)
                    }
                    Ok(StreamEvent::CircuitOpen { node_id }) => WireStreamEvent::circuit_open(run_id, node_id, seq),
                    Ok(_) => continue,
                    Err(e) => WireStreamEvent::error(run_id, None, e.to_string(), seq),
                };
                if tx.send(wire).await.is_err() {
                    break;
                }
            }
        });

        Ok((run_id, rx))
    }
}

/// External wire format for streamed graph execution (§6.4): a `serde`
/// internally-tagged enum so every event carries `run_id`/`seq` alongside a
/// `type` discriminant, independent of the kernel's own in-process
/// `StreamEvent<S, V>` (which carries typed state, not a wire string).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireStreamEvent {
    NodeStart { run_id: Uuid, node: String, seq: u64 },
    NodeEnd { run_id: Uuid, node: String, seq: u64 },
    Delta { run_id: Uuid, node: String, delta: String, seq: u64 },
    End { run_id: Uuid, seq: u64 },
    Error { run_id: Uuid, node: Option<String>, error: String, seq: u64 },
    Retry { run_id: Uuid, node: String, attempt: u32, error: String, seq: u64 },
    Fallback { run_id: Uuid, from_node: String, to_node: String, reason: String, seq: u64 },
    CircuitOpen { run_id: Uuid, node: String, seq: u64 },
}

impl WireStreamEvent {
    fn node_start(run_id: Uuid, node: String, seq: u64) -> Self {
        Self::NodeStart { run_id, node, seq }
    }

    fn node_end(run_id: Uuid, node: String, seq: u64) -> Self {
        Self::NodeEnd { run_id, node, seq }
    }

    fn end(run_id: Uuid, seq: u64) -> Self {
        Self::End { run_id, seq }
    }

    fn error(run_id: Uuid, node: Option<String>, error: String, seq: u64) -> Self {
        Self::Error { run_id, node, error, seq }
    }

    fn retry(run_id: Uuid, node: String, attempt: u32, error: String, seq: u64) -> Self {
        Self::Retry { run_id, node, attempt, error, seq }
    }

    fn fallback(run_id: Uuid, from_node: String, to_node: String, reason: String, seq: u64) -> Self {
        Self::Fallback { run_id, from_node, to_node, reason, seq }
    }

    fn circuit_open(run_id: Uuid, node: String, seq: u64) -> Self {
        Self::CircuitOpen { run_id, node, seq }
    }
}
