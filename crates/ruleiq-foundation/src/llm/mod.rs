//! LLM provider adapters backing the Model Registry & Client.
//!
//! `provider` defines the runtime registry (`LLMRegistry`) and config type
//! over the `LLMProvider` trait re-exported from `ruleiq-kernel`; the
//! per-provider modules (`openai`, `anthropic`, `google`, `ollama`) adapt
//! each vendor's wire format onto it. `retry` wraps a provider with the
//! exponential-backoff executor; `client` offers a thin ergonomic wrapper
//! for one-off calls; `token_budget` estimates/trims context windows so
//! requests stay under a model's context length.

pub mod anthropic;
pub mod client;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod stream_adapter;
pub mod stream_bridge;
pub mod token_budget;
pub mod types;

pub use client::{ChatRequestBuilder, ChatSession, LLMClient, function_tool};
pub use provider::{
    ChatStream, LLMConfig, LLMProvider, LLMRegistry, ModelCapabilities, ModelInfo, global_registry,
};
pub use retry::RetryExecutor;
pub use types::*;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use google::{GeminiConfig, GeminiProvider};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};

pub use token_budget::{
    CharBasedEstimator, ContextWindowManager, ContextWindowPolicy, TokenEstimator, TrimResult,
};
