//! Compliance Agent Graph (C8).
//!
//! The concrete six-node graph PERCEIVE → PLAN → ACT → LEARN → REMEMBER →
//! RESPOND, built on the C7 `StateGraphImpl<ComplianceState>`. `ComplianceState`
//! is a thin typed wrapper over `JsonState` — the graph runtime only ever
//! merges raw JSON keys through reducers, so the typed accessors just
//! delegate to `GraphState::apply_update`/`get_value` under named keys rather
//! than re-deriving the merge logic the kernel already owns.

use crate::graph_exec::{NodeRetryPolicy, ResilientNode};
use crate::knowledge_graph::KnowledgeGraphClient;
use crate::model_registry::ModelSelector;
use async_trait::async_trait;
use ruleiq_foundation::llm::ChatCompletionRequest;
use ruleiq_foundation::prompt::PromptTemplate;
use ruleiq_foundation::workflow::{CompiledGraphImpl, ExtendReducer, LastNReducer, StateGraphImpl};
use ruleiq_kernel::agent::error::{AgentError, AgentResult};
use ruleiq_kernel::workflow::{Command, GraphState, JsonState, NodeFunc, RuntimeContext, StateGraph, END, START};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const RUN_ID: &str = "run_id";
const QUERY: &str = "query";
const TENANT_ID: &str = "tenant_id";
const FRAMEWORK_HINTS: &str = "framework_hints";
const CONTROL_HINTS: &str = "control_hints";
const PLAN: &str = "plan";
const RETRIEVAL: &str = "retrieval";
const MEMORY: &str = "memory";
const CONCLUSION: &str = "conclusion";
const TURN_COUNT: &str = "turn_count";
const ANSWER: &str = "answer";
const AWAITING_HUMAN: &str = "awaiting_human";
const METADATA: &str = "metadata";

/// Static successor map for the six-node graph, used by
/// `ComplianceOrchestrator::resume` to continue "from the node after the
/// last `Checkpointed`" (§4.7) rather than re-running the checkpointed node.
pub fn next_node_after(node_id: &str) -> Option<&'static str> {
    match node_id {
        "perceive" => Some("plan"),
        "plan" => Some("act"),
        "act" => Some("learn"),
        "learn" => Some("remember"),
        "remember" => Some("respond"),
        "respond" => None,
        _ => None,
    }
}

/// Bounded memory size REMEMBER prunes to (§4.8: "LRU by most-recent use,
/// default 50 entries").
pub const MEMORY_CAPACITY: usize = 50;

/// One planned sub-task: a `(goal, tool)` pair where `tool` names the
/// capability ACT should dispatch to (`"kg_search"` or `"llm"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub goal: String,
    pub tool: String,
}

/// A single retrieved or generated fact, written into `RunState.retrieval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalItem {
    pub goal: String,
    pub text: String,
    pub control_id: Option<String>,
    pub score: f64,
}

/// LEARN's structured summary of a turn's findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conclusion {
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub risks: Vec<String>,
    pub confidence: f64,
}

/// `JsonState`-backed state for the compliance graph. Typed accessors are a
/// convenience layer; the canonical representation is still the underlying
/// JSON map, so every node communicates through `Command` updates exactly
/// like a plain `JsonState` workflow would.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceState(JsonState);

impl ComplianceState {
    /// `run_id` is the orchestrator's own run identifier (not derived from
    /// tenant/query), so REMEMBER's checkpoints key under the same id
    /// `resume` looks up by.
    pub fn new(run_id: uuid::Uuid, tenant_id: impl Into<String>, query: impl Into<String>) -> Self {
        let mut state = JsonState::new();
        let map = state.as_map_mut();
        map.insert(RUN_ID.to_string(), Value::String(run_id.to_string()));
        map.insert(TENANT_ID.to_string(), Value::String(tenant_id.into()));
        map.insert(QUERY.to_string(), Value::String(query.into()));
        map.insert(TURN_COUNT.to_string(), Value::from(0u32));
        Self(state)
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.0
            .get_value::<String>(RUN_ID)
            .and_then(|s| uuid::Uuid::parse_str(&s).ok())
            .unwrap_or_else(uuid::Uuid::nil)
    }

    pub fn query(&self) -> String {
        self.0.get_value(QUERY).unwrap_or_default()
    }

    pub fn tenant_id(&self) -> String {
        self.0.get_value(TENANT_ID).unwrap_or_default()
    }

    pub fn framework_hints(&self) -> Vec<String> {
        self.0.get_value(FRAMEWORK_HINTS).unwrap_or_default()
    }

    pub fn control_hints(&self) -> Vec<String> {
        self.0.get_value(CONTROL_HINTS).unwrap_or_default()
    }

    pub fn plan(&self) -> Vec<PlanStep> {
        self.0.get_value(PLAN).unwrap_or_default()
    }

    pub fn retrieval(&self) -> Vec<RetrievalItem> {
        self.0.get_value(RETRIEVAL).unwrap_or_default()
    }

    pub fn memory(&self) -> Vec<Value> {
        self.0.get_value(MEMORY).unwrap_or_default()
    }

    pub fn conclusion(&self) -> Option<Conclusion> {
        self.0.get_value(CONCLUSION)
    }

    pub fn turn_count(&self) -> u32 {
        self.0.get_value(TURN_COUNT).unwrap_or(0)
    }

    pub fn answer(&self) -> Option<String> {
        self.0.get_value(ANSWER)
    }

    /// True once a node (currently only ACT, via the `"ask_human"` tool) has
    /// requested human input. `ComplianceOrchestrator::drive_to_completion`
    /// checks this after every step and suspends the run into
    /// `RunStatus::AwaitingHuman` instead of continuing to the next node.
    pub fn awaiting_human(&self) -> bool {
        self.0.get_value(AWAITING_HUMAN).unwrap_or(false)
    }

    /// Free-form metadata injected by `resume`'s `extra_input` parameter
    /// (§4.7), e.g. the human's answer to an `"ask_human"` step.
    pub fn metadata(&self) -> Option<Value> {
        self.0.get_value(METADATA)
    }

    /// Applied by `ComplianceOrchestrator::resume` when continuing a run
    /// that was suspended in `AwaitingHuman`: records the supplied answer
    /// (if any) and clears the pause flag so the graph doesn't immediately
    /// re-suspend on the very next step.
    pub async fn resolve_human_input(&mut self, extra_input: Option<Value>) -> AgentResult<()> {
        if let Some(extra) = extra_input {
            self.apply_update(METADATA, extra).await?;
        }
        self.apply_update(AWAITING_HUMAN, false).await
    }
}

#[async_trait]
impl GraphState for ComplianceState {
    async fn apply_update<V: serde::Serialize + Send + Sync + 'static>(
        &mut self,
        key: &str,
        value: V,
    ) -> AgentResult<()> {
        self.0.apply_update(key, value).await
    }

    fn get_value<V: serde::de::DeserializeOwned + Send + Sync + 'static>(&self, key: &str) -> Option<V> {
        self.0.get_value(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys()
    }

    fn to_json(&self) -> AgentResult<Value> {
        self.0.to_json()
    }

    fn from_json(value: Value) -> AgentResult<Self> {
        Ok(Self(JsonState::from_json(value)?))
    }
}

/// PERCEIVE: regex/keyword extraction only, never calls a model. Fail-fast
/// (no retry wrapping) per §4.8.
pub struct PerceiveNode {
    framework_keywords: Vec<(&'static str, &'static str)>,
    control_pattern: regex::Regex,
}

impl PerceiveNode {
    pub fn new() -> Self {
        Self {
            framework_keywords: vec![
                ("gdpr", "UK-GDPR"),
                ("uk gdpr", "UK-GDPR"),
                ("dpa 2018", "DPA-2018"),
                ("pci", "PCI-DSS"),
                ("pci-dss", "PCI-DSS"),
                ("iso 27001", "ISO-27001"),
                ("iso27001", "ISO-27001"),
                ("fca", "FCA-HANDBOOK"),
            ],
            // Control references like "A.1" or "Art. 33".
            control_pattern: regex::Regex::new(r"\b([A-Z]{1,4}\.\d{1,3})\b").expect("valid pattern"),
        }
    }
}

impl Default for PerceiveNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeFunc<ComplianceState> for PerceiveNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let query = state.query();
        let lowered = query.to_lowercase();

        let frameworks: Vec<String> = self
            .framework_keywords
            .iter()
            .filter(|(kw, _)| lowered.contains(kw))
            .map(|(_, canonical)| canonical.to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let controls: Vec<String> = self
            .control_pattern
            .captures_iter(&query)
            .map(|c| c[1].to_string())
            .collect();

        Ok(Command::new()
            .update(FRAMEWORK_HINTS, serde_json::to_value(frameworks)?)
            .update(CONTROL_HINTS, serde_json::to_value(controls)?)
            .continue_())
    }

    fn name(&self) -> &str {
        "perceive"
    }
}

/// PLAN: asks the model for an ordered sub-task list rendered from a prompt
/// template; falls back to a single retrieval task if the model is
/// unavailable or returns something unparsable, rather than failing the run.
pub struct PlanNode {
    selector: Arc<ModelSelector>,
    template: PromptTemplate,
}

impl PlanNode {
    pub fn new(selector: Arc<ModelSelector>) -> Self {
        let template = PromptTemplate::new("compliance_plan")
            .with_content(
                "You are a UK compliance analyst. Given the question: \"{query}\" \
                 (frameworks: {frameworks}, controls: {controls}), respond with a JSON \
                 array of sub-tasks, each {{\"goal\": str, \"tool\": \"kg_search\"|\"llm\"}}.",
            )
            .with_name("Compliance sub-task planner");
        Self { selector, template }
    }

    fn fallback_plan(state: &ComplianceState) -> Vec<PlanStep> {
        vec![PlanStep {
            goal: state.query(),
            tool: "kg_search".to_string(),
        }]
    }
}

#[async_trait]
impl NodeFunc<ComplianceState> for PlanNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let query = state.query();
        let frameworks = state.framework_hints().join(", ");
        let controls = state.control_hints().join(", ");

        let rendered = self
            .template
            .render(&[
                ("query", query.as_str()),
                ("frameworks", frameworks.as_str()),
                ("controls", controls.as_str()),
            ])
            .map_err(|e| AgentError::ExecutionFailed(format!("plan prompt render failed: {e}")))?;

        let plan = match self
            .selector
            .chat(ChatCompletionRequest::new("planner").system(rendered.as_str()).user(query.as_str()))
            .await
        {
            Ok((_, response)) => response
                .content()
                .and_then(|text| serde_json::from_str::<Vec<PlanStep>>(text).ok())
                .filter(|steps| !steps.is_empty())
                .unwrap_or_else(|| Self::fallback_plan(state)),
            Err(_) => Self::fallback_plan(state),
        };

        Ok(Command::new().update(PLAN, serde_json::to_value(plan)?).continue_())
    }

    fn name(&self) -> &str {
        "plan"
    }
}

/// ACT: dispatches each plan step to C5 (`kg_search`) or C1 (`llm`), writing
/// results into `retrieval` (extended across turns) and `memory` (pruned to
/// `MEMORY_CAPACITY` by REMEMBER's reducer). LLM sub-calls go through the
/// caller-supplied `ModelSelector`, which is wrapped in a `ResilientNode` at
/// graph-build time for the retry/circuit-breaker behaviour §4.8 requires.
pub struct ActNode {
    knowledge_graph: Arc<tokio::sync::RwLock<KnowledgeGraphClient>>,
    selector: Arc<ModelSelector>,
    embed: fn(&str) -> Vec<f32>,
}

impl ActNode {
    pub fn new(knowledge_graph: Arc<tokio::sync::RwLock<KnowledgeGraphClient>>, selector: Arc<ModelSelector>) -> Self {
        Self {
            knowledge_graph,
            selector,
            embed: bag_of_words_embedding,
        }
    }
}

/// Deterministic stand-in embedding (word-length histogram) used where no
/// real embedding model is wired in; keeps hybrid search's dense pass
/// exercised without requiring network access.
fn bag_of_words_embedding(text: &str) -> Vec<f32> {
    let mut buckets = vec![0.0f32; 16];
    for word in text.split_whitespace() {
        let idx = word.len().min(15);
        buckets[idx] += 1.0;
    }
    buckets
}

#[async_trait]
impl NodeFunc<ComplianceState> for ActNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let plan = state.plan();
        let mut new_items = Vec::with_capacity(plan.len());
        let mut memory_entries = Vec::with_capacity(plan.len());
        let mut awaiting_human = false;

        for step in &plan {
            match step.tool.as_str() {
                "ask_human" => {
                    memory_entries.push(serde_json::json!({"goal": step.goal, "question": step.goal}));
                    awaiting_human = true;
                }
                "llm" => {
                    let request = ChatCompletionRequest::new("actor").user(step.goal.as_str());
                    if let Ok((_, response)) = self.selector.chat(request).await {
                        let text = response.content().unwrap_or_default().to_string();
                        memory_entries.push(serde_json::json!({"goal": step.goal, "text": text}));
                        new_items.push(RetrievalItem {
                            goal: step.goal.clone(),
                            text,
                            control_id: None,
                            score: 1.0,
                        });
                    }
                }
                _ => {
                    let embedding = (self.embed)(&step.goal);
                    let kg = self.knowledge_graph.read().await;
                    let hits = kg.hybrid_search(&step.goal, &embedding, 3).await;
                    for hit in hits {
                        memory_entries.push(serde_json::json!({"goal": step.goal, "text": hit.text}));
                        new_items.push(RetrievalItem {
                            goal: step.goal.clone(),
                            text: hit.text,
                            control_id: hit.control_id,
                            score: hit.score,
                        });
                    }
                }
            }
        }

        let turn_count = state.turn_count() + 1;

        Ok(Command::new()
            .update(RETRIEVAL, serde_json::to_value(new_items)?)
            .update(MEMORY, serde_json::to_value(memory_entries)?)
            .update(TURN_COUNT, serde_json::to_value(turn_count)?)
            .update(AWAITING_HUMAN, serde_json::to_value(awaiting_human)?)
            .continue_())
    }

    fn name(&self) -> &str {
        "act"
    }
}

/// LEARN: summarises `retrieval` into a `Conclusion`, fail-fast (§4.8). The
/// refinement-loop decision (§4.8's "after ACT" routing, which only makes
/// sense once `Conclusion.confidence` exists) is made here via `goto("plan")`
/// rather than a static conditional edge, since this graph's edge map can't
/// express "loop while a runtime threshold holds" — `Command::goto` can.
pub struct LearnNode {
    max_turns: u32,
    confidence_threshold: f64,
}

impl LearnNode {
    pub fn new(max_turns: u32, confidence_threshold: f64) -> Self {
        Self {
            max_turns,
            confidence_threshold,
        }
    }
}

#[async_trait]
impl NodeFunc<ComplianceState> for LearnNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let retrieval = state.retrieval();
        if retrieval.is_empty() && state.plan().is_empty() {
            return Err(AgentError::ExecutionFailed("LEARN: no plan was ever produced to act on".into()));
        }
        if retrieval.is_empty() {
            let conclusion = Conclusion {
                gaps: vec![format!("no evidence found for: {}", state.query())],
                recommendations: Vec::new(),
                risks: Vec::new(),
                confidence: 0.0,
            };
            return Ok(Command::new().update(CONCLUSION, serde_json::to_value(&conclusion)?).continue_());
        }

        let confidence = (retrieval.iter().map(|r| r.score).sum::<f64>() / retrieval.len() as f64).clamp(0.0, 1.0);
        let gaps: Vec<String> = retrieval
            .iter()
            .filter(|r| r.control_id.is_none())
            .map(|r| format!("no mapped control for: {}", r.goal))
            .collect();
        let recommendations: Vec<String> = retrieval
            .iter()
            .filter_map(|r| r.control_id.as_ref().map(|c| format!("review control {c} against: {}", r.goal)))
            .collect();

        let conclusion = Conclusion {
            gaps,
            recommendations,
            risks: Vec::new(),
            confidence,
        };

        let command = Command::new().update(CONCLUSION, serde_json::to_value(&conclusion)?);

        if confidence < self.confidence_threshold && state.turn_count() < self.max_turns / 2 {
            Ok(command.goto("plan"))
        } else {
            Ok(command.continue_())
        }
    }

    fn name(&self) -> &str {
        "learn"
    }
}

/// REMEMBER: prunes `memory` via the graph's registered `LastN(50)` reducer
/// (this node just re-submits the current memory list as an update so the
/// reducer runs). Fail-fast (§4.8). Durable checkpointing is not this node's
/// concern: `ComplianceOrchestrator::drive_to_completion` persists a
/// checkpoint after every node transition, not just this one.
pub struct RememberNode;

#[async_trait]
impl NodeFunc<ComplianceState> for RememberNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let memory = state.memory();
        Ok(Command::new().update(MEMORY, serde_json::to_value(memory)?).continue_())
    }

    fn name(&self) -> &str {
        "remember"
    }
}

/// RESPOND: produces the user-facing summary. Streaming chunk-by-chunk is
/// the Executor's concern (it drives this node's `Command` through the same
/// `StreamEvent::NodeEnd` path as every other node); this node just composes
/// the final text.
pub struct RespondNode;

#[async_trait]
impl NodeFunc<ComplianceState> for RespondNode {
    async fn call(&self, state: &mut ComplianceState, _ctx: &RuntimeContext) -> AgentResult<Command> {
        let conclusion = state.conclusion().unwrap_or_default();
        let mut answer = String::new();
        if conclusion.recommendations.is_empty() {
            answer.push_str("No specific recommendations could be derived from the available evidence.\n");
        } else {
            answer.push_str("Recommendations:\n");
            for rec in &conclusion.recommendations {
                answer.push_str("- ");
                answer.push_str(rec);
                answer.push('\n');
            }
        }
        if !conclusion.gaps.is_empty() {
            answer.push_str("\nGaps:\n");
            for gap in &conclusion.gaps {
                answer.push_str("- ");
                answer.push_str(gap);
                answer.push('\n');
            }
        }
        answer.push_str(&format!("\nConfidence: {:.2}", conclusion.confidence));

        Ok(Command::new().update(ANSWER, serde_json::to_value(answer)?).return_())
    }

    fn name(&self) -> &str {
        "respond"
    }
}

/// Assembles the six-node graph. PERCEIVE/LEARN/REMEMBER run unwrapped
/// (fail-fast, §4.8); PLAN and ACT both issue model calls, so both are
/// wrapped in `ResilientNode` with the same retry/circuit-breaker policy —
/// §4.8 names ACT's sub-calls explicitly but is silent on PLAN's single call,
/// and giving PLAN the same resilience is the more conservative reading.
///
/// `retrieval` accumulates across turns via `ExtendReducer` (ACT may run more
/// than once through the PLAN refinement loop); `memory` is capped to
/// `MEMORY_CAPACITY` via `LastNReducer`. Every other key overwrites, which is
/// the graph's default for keys with no registered reducer.
pub fn build_compliance_graph(
    selector: Arc<ModelSelector>,
    knowledge_graph: Arc<tokio::sync::RwLock<KnowledgeGraphClient>>,
    max_turns: u32,
    confidence_threshold: f64,
) -> AgentResult<CompiledGraphImpl<ComplianceState>> {
    let retry = NodeRetryPolicy::default();

    let plan_node: Box<dyn NodeFunc<ComplianceState>> =
        Box::new(ResilientNode::new(Box::new(PlanNode::new(selector.clone())), retry.clone()));
    let act_node: Box<dyn NodeFunc<ComplianceState>> =
        Box::new(ResilientNode::new(Box::new(ActNode::new(knowledge_graph, selector)), retry));

    let mut graph = StateGraphImpl::<ComplianceState>::new("compliance_agent");
    graph
        .add_node("perceive", Box::new(PerceiveNode::new()))
        .add_node("plan", plan_node)
        .add_node("act", act_node)
        .add_node("learn", Box::new(LearnNode::new(max_turns, confidence_threshold)))
        .add_node("remember", Box::new(RememberNode))
        .add_node("respond", Box::new(RespondNode))
        .add_edge(START, "perceive")
        .add_edge("perceive", "plan")
        .add_edge("plan", "act")
        .add_edge("act", "learn")
        .add_edge("learn", "remember")
        .add_edge("remember", "respond")
        .add_edge("respond", END)
        .add_reducer(RETRIEVAL, Box::new(ExtendReducer))
        .add_reducer(MEMORY, Box::new(LastNReducer::new(MEMORY_CAPACITY)))
        .set_entry_point("perceive")
        .set_finish_point("respond");

    graph.compile()
}
