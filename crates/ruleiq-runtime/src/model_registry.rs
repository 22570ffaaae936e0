//! Model Registry & Client (C1).
//!
//! Wraps `ruleiq_foundation::llm::LLMProvider` behind `ModelClient`, the
//! capability interface §4.1 names (`Generate`/`GenerateStream`/`CountTokens`),
//! and `ModelSelector`, which orders registered models into a fallback chain
//! and scores candidates by capability, cost, and per-model `CircuitState`
//! before dispatching — each registered model owns its own
//! `AsyncCircuitBreaker`, so one model tripping never affects another's
//! eligibility. Response caching (C4) is wired in here too: the cache
//! fingerprints a single model call, not a whole orchestrator run, so a hit
//! on one fallback candidate never masks a different candidate's result.

use crate::config::CircuitConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::response_cache::{CacheKey, CacheLookup, ResponseCache};
use async_trait::async_trait;
use ruleiq_foundation::circuit_breaker::{AsyncCircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use ruleiq_foundation::llm::token_budget::{CharBasedEstimator, TokenEstimator};
use ruleiq_foundation::llm::types::{ChatMessage, Role};
use ruleiq_foundation::llm::{ChatCompletionRequest, ChatCompletionResponse, ChatStream, LLMProvider};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A registered model's static properties (§3.1 `ModelDescriptor`).
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Canonical id used as the cache/circuit key: `"{provider_name}/{model}"`.
    pub id: String,
    pub provider_name: String,
    pub model: String,
    /// Relative quality score in `[0, 1]`; higher wins ties after cost.
    pub capability_score: f64,
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
    pub max_context: u32,
    pub timeout: Duration,
    pub supports_streaming: bool,
    pub supports_tools: bool,
}

impl ModelDescriptor {
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        let provider_name = provider_name.into();
        let model = model.into();
        Self {
            id: format!("{provider_name}/{model}"),
            provider_name,
            model,
            capability_score: 0.5,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
            max_context: 8_192,
            timeout: Duration::from_secs(30),
            supports_streaming: true,
            supports_tools: true,
        }
    }

    pub fn with_capability_score(mut self, score: f64) -> Self {
        self.capability_score = score;
        self
    }

    pub fn with_cost_per_1k(mut self, input: f64, output: f64) -> Self {
        self.cost_per_1k_input = input;
        self.cost_per_1k_output = output;
        self
    }

    pub fn with_max_context(mut self, max_context: u32) -> Self {
        self.max_context = max_context;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_streaming(mut self, supported: bool) -> Self {
        self.supports_streaming = supported;
        self
    }

    pub fn with_tools(mut self, supported: bool) -> Self {
        self.supports_tools = supported;
        self
    }
}

/// Capability interface a registered model exposes, independent of which
/// provider backs it (§4.1: `Generate`/`GenerateStream`/`CountTokens`).
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn descriptor(&self) -> &ModelDescriptor;

    async fn generate(&self, request: ChatCompletionRequest) -> OrchestratorResult<ChatCompletionResponse>;

    async fn generate_stream(&self, request: ChatCompletionRequest) -> OrchestratorResult<ChatStream>;

    /// Approximate token count for `text` under this model. No real
    /// tokenizer crate is in the dependency stack, so this delegates to
    /// `ruleiq_foundation`'s own `CharBasedEstimator` — the same
    /// deterministic-estimate pattern the foundation crate uses for context
    /// trimming when no provider-specific tokenizer is wired in.
    fn count_tokens(&self, text: &str) -> usize;
}

/// One provider-backed model plus its own circuit breaker and token
/// estimator. `CircuitState` lives here, one breaker per model id, so a
/// fallback chain's candidates are independently eligible (§3.1: "CircuitState
/// is per model").
pub struct RegisteredModel {
    descriptor: ModelDescriptor,
    provider: Arc<dyn LLMProvider>,
    breaker: Arc<AsyncCircuitBreaker>,
    estimator: CharBasedEstimator,
}

impl RegisteredModel {
    fn new(descriptor: ModelDescriptor, provider: Arc<dyn LLMProvider>, breaker_config: CircuitBreakerConfig) -> Self {
        let breaker = AsyncCircuitBreaker::new(descriptor.id.clone(), breaker_config);
        Self {
            descriptor,
            provider,
            breaker,
            estimator: CharBasedEstimator::default(),
        }
    }

    async fn can_execute(&self) -> bool {
        self.breaker.can_execute().await
    }
}

#[async_trait]
impl ModelClient for RegisteredModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    async fn generate(&self, mut request: ChatCompletionRequest) -> OrchestratorResult<ChatCompletionResponse> {
        request.model = self.descriptor.model.clone();
        self.breaker.execute(self.provider.chat(request)).await.map_err(OrchestratorError::from)
    }

    async fn generate_stream(&self, mut request: ChatCompletionRequest) -> OrchestratorResult<ChatStream> {
        request.model = self.descriptor.model.clone();
        self.breaker
            .execute(self.provider.chat_stream(request))
            .await
            .map_err(OrchestratorError::from)
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.estimator.estimate_tokens(&ChatMessage::user(text))
    }
}

/// Computes the §4.4 fingerprint for a single model call: `(model_id,
/// system, prompt, tool_schema_version, truncated_context_hash,
/// temperature_bucket)`. `temperature_bucket` rounds to the nearest 0.1 so
/// near-identical decoding params still coalesce.
fn call_fingerprint(model_id: &str, request: &ChatCompletionRequest) -> CacheKey {
    let system = request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .and_then(|m| m.text_content())
        .unwrap_or("");
    let prompt = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.text_content())
        .unwrap_or("");
    let tool_schema_version = if request.tools.is_some() { "v1" } else { "none" };

    let mut hasher = Sha256::new();
    for message in &request.messages {
        hasher.update(message.text_content().unwrap_or("").as_bytes());
        hasher.update(b"\0");
    }
    let context_hash = format!("{:x}", hasher.finalize());

    let temperature_bucket = ((request.temperature.unwrap_or(1.0) as f64 * 10.0).round() / 10.0).to_string();

    CacheKey::fingerprint(&[model_id, system, prompt, tool_schema_version, &context_hash, &temperature_bucket])
}

/// §4.4: never cache tool calls, non-`stop` completions, or anything
/// generated above the temperature cutoff (re-running those is expected to
/// vary, so caching them would return stale, misleadingly-deterministic
/// answers).
fn is_cacheable(request: &ChatCompletionRequest, response: &ChatCompletionResponse, temperature_cutoff: f64) -> bool {
    if response.has_tool_calls() {
        return false;
    }
    if !matches!(response.finish_reason(), Some(ruleiq_foundation::llm::FinishReason::Stop)) {
        return false;
    }
    if request.temperature.unwrap_or(1.0) as f64 > temperature_cutoff {
        return false;
    }
    true
}

/// Selects among registered models by capability/cost/circuit-health,
/// falling through to the next candidate when a call errors or its circuit
/// is open.
pub struct ModelSelector {
    models: Vec<Arc<RegisteredModel>>,
    cache: Option<Arc<ResponseCache<(ModelDescriptor, ChatCompletionResponse)>>>,
    temperature_cutoff: f64,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            cache: None,
            temperature_cutoff: 0.7,
        }
    }

    /// Append a descriptor/provider pair to the fallback chain with a
    /// default circuit breaker configuration.
    pub fn with_fallback(mut self, descriptor: ModelDescriptor, provider: Arc<dyn LLMProvider>) -> Self {
        let config = CircuitBreakerConfig::new(descriptor.id.clone());
        self.models.push(Arc::new(RegisteredModel::new(descriptor, provider, config)));
        self
    }

    /// Same as `with_fallback`, but with an explicit, deployment-tunable
    /// circuit breaker configuration (§6.3 `circuit.*`).
    pub fn with_fallback_configured(
        mut self,
        descriptor: ModelDescriptor,
        provider: Arc<dyn LLMProvider>,
        circuit: &CircuitConfig,
    ) -> Self {
        let config = CircuitBreakerConfig::new(descriptor.id.clone())
            .with_failure_threshold(circuit.failure_threshold)
            .with_success_threshold(circuit.success_threshold)
            .with_timeout(circuit.recovery_timeout());
        self.models.push(Arc::new(RegisteredModel::new(descriptor, provider, config)));
        self
    }

    /// Attach the response cache (C4). Without this the selector always
    /// dispatches, never checking or populating a cache.
    pub fn with_cache(mut self, cache: Arc<ResponseCache<(ModelDescriptor, ChatCompletionResponse)>>, temperature_cutoff: f64) -> Self {
        self.cache = Some(cache);
        self.temperature_cutoff = temperature_cutoff;
        self
    }

    pub fn chain(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().map(|m| &m.descriptor)
    }

    pub fn model(&self, model_id: &str) -> Option<Arc<RegisteredModel>> {
        self.models.iter().find(|m| m.descriptor.id == model_id).cloned()
    }

    pub fn count_tokens(&self, model_id: &str, text: &str) -> OrchestratorResult<usize> {
        self.model(model_id)
            .map(|m| m.count_tokens(text))
            .ok_or_else(|| OrchestratorError::InvalidInput(format!("unknown model id: {model_id}")))
    }

    /// Candidates whose circuit is CLOSED or HALF_OPEN and whose cost per
    /// 1k tokens fits `budget_headroom` (when given), ordered by lower cost
    /// then higher capability (§4.1 tie-break rule).
    async fn candidates(&self, budget_headroom: Option<f64>) -> Vec<Arc<RegisteredModel>> {
        let mut eligible = Vec::with_capacity(self.models.len());
        for model in &self.models {
            if !model.can_execute().await {
                continue;
            }
            if let Some(headroom) = budget_headroom {
                let worst_case = model.descriptor.cost_per_1k_input.max(model.descriptor.cost_per_1k_output);
                if worst_case > headroom {
                    continue;
                }
            }
            eligible.push(model.clone());
        }
        eligible.sort_by(|a, b| {
            a.descriptor
                .cost_per_1k_input
                .partial_cmp(&b.descriptor.cost_per_1k_input)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.descriptor
                        .capability_score
                        .partial_cmp(&a.descriptor.capability_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        eligible
    }

    /// Non-streaming `Generate`: selects a candidate by capability/cost,
    /// skipping open circuits, consulting the response cache per-candidate
    /// before dispatching. All candidates OPEN (or none registered) fails
    /// `ModelsUnavailable` immediately, without retrying.
    pub async fn chat(&self, request: ChatCompletionRequest) -> OrchestratorResult<(ModelDescriptor, ChatCompletionResponse)> {
        self.chat_with_headroom(request, None).await
    }

    pub async fn chat_with_headroom(
        &self,
        request: ChatCompletionRequest,
        budget_headroom: Option<f64>,
    ) -> OrchestratorResult<(ModelDescriptor, ChatCompletionResponse)> {
        let candidates = self.candidates(budget_headroom).await;
        if candidates.is_empty() {
            return Err(OrchestratorError::ModelsUnavailable(self.chain_description()));
        }

        let mut last_err = None;
        for model in candidates {
            let mut call_request = request.clone();
            call_request.model = model.descriptor.model.clone();

            let cache_key = self.cache.as_ref().map(|_| call_fingerprint(&model.descriptor.id, &call_request));
            if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                if let CacheLookup::Hit((descriptor, response)) = cache.get_or_wait(key).await {
                    return Ok((descriptor, response));
                }
            }

            match model.breaker.execute(model.provider.chat(call_request.clone())).await {
                Ok(response) => {
                    if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                        if is_cacheable(&call_request, &response, self.temperature_cutoff) {
                            cache.put(key.clone(), (model.descriptor.clone(), response.clone()));
                        } else {
                            cache.abandon(key);
                        }
                    }
                    return Ok((model.descriptor.clone(), response));
                }
                Err(CircuitBreakerError::CircuitOpen { .. }) => {
                    if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                        cache.abandon(key);
                    }
                    continue;
                }
                Err(CircuitBreakerError::OperationError { error, .. }) => {
                    if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                        cache.abandon(key);
                    }
                    warn!(
                        provider = %model.descriptor.provider_name,
                        model = %model.descriptor.model,
                        error = %error,
                        "model in fallback chain failed, trying next"
                    );
                    last_err = Some(error);
                }
            }
        }

        match last_err {
            Some(err) => Err(OrchestratorError::Llm(err.to_string())),
            None => Err(OrchestratorError::ModelsUnavailable(self.chain_description())),
        }
    }

    /// Streaming `GenerateStream`: same candidate ordering as `chat`, but
    /// never consults the cache (a cached reply has no chunk sequence to
    /// replay).
    pub async fn chat_stream(&self, request: ChatCompletionRequest) -> OrchestratorResult<(ModelDescriptor, ChatStream)> {
        let candidates = self.candidates(None).await;
        if candidates.is_empty() {
            return Err(OrchestratorError::ModelsUnavailable(self.chain_description()));
        }

        let mut last_err = None;
        for model in candidates {
            match model.generate_stream(request.clone()).await {
                Ok(stream) => return Ok((model.descriptor.clone(), stream)),
                Err(OrchestratorError::CircuitOpen(_)) => continue,
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| OrchestratorError::ModelsUnavailable(self.chain_description())))
    }

    fn chain_description(&self) -> String {
        self.models.iter().map(|m| m.descriptor.id.clone()).collect::<Vec<_>>().join(", ")
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ruleiq_foundation::llm::types::ChatMessage;
    use ruleiq_foundation::llm::{ChatCompletionResponse, Choice, FinishReason, LLMError};

    struct AlwaysFails;

    #[async_trait]
    impl LLMProvider for AlwaysFails {
        fn name(&self) -> &str {
            "fails"
        }
        async fn chat(&self, _req: ChatCompletionRequest) -> Result<ChatCompletionResponse, LLMError> {
            Err(LLMError::ProviderNotSupported("fails".into()))
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl LLMProvider for AlwaysSucceeds {
        fn name(&self) -> &str {
            "succeeds"
        }
        async fn chat(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse, LLMError> {
            Ok(ChatCompletionResponse {
                id: "resp-1".into(),
                object: "chat.completion".into(),
                created: 0,
                model: req.model,
                choices: vec![Choice {
                    index: 0,
                    message: ChatMessage::assistant("ok"),
                    finish_reason: Some(FinishReason::Stop),
                    logprobs: None,
                }],
                usage: None,
                system_fingerprint: None,
            })
        }
    }

    #[tokio::test]
    async fn falls_through_to_second_provider_on_failure() {
        let selector = ModelSelector::new()
            .with_fallback(ModelDescriptor::new("primary", "gpt-4o"), Arc::new(AlwaysFails))
            .with_fallback(ModelDescriptor::new("backup", "gpt-4o-mini"), Arc::new(AlwaysSucceeds));

        let (used, response) = selector
            .chat(ChatCompletionRequest::new("gpt-4o").user("hello"))
            .await
            .expect("fallback should succeed");

        assert_eq!(used.provider_name, "backup");
        assert_eq!(response.content(), Some("ok"));
    }

    #[tokio::test]
    async fn errors_when_every_descriptor_fails() {
        let selector = ModelSelector::new()
            .with_fallback(ModelDescriptor::new("primary", "gpt-4o"), Arc::new(AlwaysFails));

        let result = selector.chat(ChatCompletionRequest::new("gpt-4o").user("hello")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_chain_fails_with_models_unavailable() {
        let selector = ModelSelector::new();
        let result = selector.chat(ChatCompletionRequest::new("gpt-4o").user("hello")).await;
        assert!(matches!(result, Err(OrchestratorError::ModelsUnavailable(_))));
    }

    #[tokio::test]
    async fn all_circuits_open_fails_with_models_unavailable_without_retrying() {
        let circuit = CircuitConfig {
            failure_threshold: 1,
            success_threshold: 2,
            recovery_timeout_ms: 60_000,
        };
        let selector = ModelSelector::new().with_fallback_configured(
            ModelDescriptor::new("primary", "gpt-4o"),
            Arc::new(AlwaysFails),
            &circuit,
        );

        // first call trips the breaker (fails, then circuit opens)
        let _ = selector.chat(ChatCompletionRequest::new("gpt-4o").user("hello")).await;
        let result = selector.chat(ChatCompletionRequest::new("gpt-4o").user("hello again")).await;
        assert!(matches!(result, Err(OrchestratorError::ModelsUnavailable(_))));
    }

    #[tokio::test]
    async fn lower_cost_candidate_is_preferred_over_higher_capability() {
        let cheap = ModelDescriptor::new("backup", "cheap-model").with_cost_per_1k(0.001, 0.002).with_capability_score(0.4);
        let expensive = ModelDescriptor::new("primary", "expensive-model")
            .with_cost_per_1k(0.05, 0.08)
            .with_capability_score(0.95);

        let selector = ModelSelector::new()
            .with_fallback(expensive, Arc::new(AlwaysSucceeds))
            .with_fallback(cheap, Arc::new(AlwaysSucceeds));

        let (used, _) = selector
            .chat(ChatCompletionRequest::new("any").user("hello"))
            .await
            .expect("one candidate should succeed");
        assert_eq!(used.model, "cheap-model");
    }

    #[tokio::test]
    async fn count_tokens_scales_with_text_length() {
        let selector = ModelSelector::new().with_fallback(ModelDescriptor::new("primary", "gpt-4o"), Arc::new(AlwaysSucceeds));
        let short = selector.count_tokens("primary/gpt-4o", "hi").unwrap();
        let long = selector.count_tokens("primary/gpt-4o", &"word ".repeat(50)).unwrap();
        assert!(long > short);
    }

    #[tokio::test]
    async fn count_tokens_for_unknown_model_is_invalid_input() {
        let selector = ModelSelector::new();
        assert!(matches!(
            selector.count_tokens("nope", "hi"),
            Err(OrchestratorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_underlying_provider() {
        use crate::response_cache::ResponseCache;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::time::Duration as StdDuration;

        struct CountingProvider(Arc<AtomicU32>);

        #[async_trait]
        impl LLMProvider for CountingProvider {
            fn name(&self) -> &str {
                "counting"
            }
            async fn chat(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse, LLMError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(ChatCompletionResponse {
                    id: "resp-1".into(),
                    object: "chat.completion".into(),
                    created: 0,
                    model: req.model,
                    choices: vec![Choice {
                        index: 0,
                        message: ChatMessage::assistant("cached answer"),
                        finish_reason: Some(FinishReason::Stop),
                        logprobs: None,
                    }],
                    usage: None,
                    system_fingerprint: None,
                })
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let cache = Arc::new(ResponseCache::new(StdDuration::from_secs(60), 16));
        let selector = ModelSelector::new()
            .with_fallback(ModelDescriptor::new("primary", "gpt-4o"), Arc::new(CountingProvider(calls.clone())))
            .with_cache(cache, 0.7);

        let request = ChatCompletionRequest::new("gpt-4o").user("hello");
        selector.chat(request.clone()).await.unwrap();
        selector.chat(request).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1, "second call should be served from cache");
    }

    #[tokio::test]
    async fn high_temperature_responses_are_never_cached() {
        use crate::response_cache::ResponseCache;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::time::Duration as StdDuration;

        struct CountingProvider(Arc<AtomicU32>);

        #[async_trait]
        impl LLMProvider for CountingProvider {
            fn name(&self) -> &str {
                "counting"
            }
            async fn chat(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse, LLMError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(ChatCompletionResponse {
                    id: "resp-1".into(),
                    object: "chat.completion".into(),
                    created: 0,
                    model: req.model,
                    choices: vec![Choice {
                        index: 0,
                        message: ChatMessage::assistant("varies"),
                        finish_reason: Some(FinishReason::Stop),
                        logprobs: None,
                    }],
                    usage: None,
                    system_fingerprint: None,
                })
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let cache = Arc::new(ResponseCache::new(StdDuration::from_secs(60), 16));
        let selector = ModelSelector::new()
            .with_fallback(ModelDescriptor::new("primary", "gpt-4o"), Arc::new(CountingProvider(calls.clone())))
            .with_cache(cache, 0.7);

        let mut request = ChatCompletionRequest::new("gpt-4o").user("hello");
        request.temperature = Some(0.9);
        selector.chat(request.clone()).await.unwrap();
        selector.chat(request).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2, "responses above the temperature cutoff must never be cached");
    }
}
