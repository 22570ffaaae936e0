#![allow(
    dead_code,
    unused_imports,
    non_camel_case_types,
    ambiguous_glob_reexports
)]

// Circuit breaker / retry / fallback (C2).
pub mod circuit_breaker;

// LLM provider adapters and model registry (C1).
pub mod llm;

// Prompt template management used by graph nodes.
pub mod prompt;

// Checkpoint / evidence / budget persistence (C6).
pub mod persistence;

// RAG: vector store, chunking, hybrid retrieval (C5).
pub mod rag;

// Graph-based workflow execution (C7/C8).
pub mod workflow;

pub use circuit_breaker::{
    AgentCircuitBreakerConfig, AsyncCircuitBreaker, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerError, CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot,
    FallbackBuilder, FallbackContext, FallbackError, FallbackHandler, FallbackStrategy,
    GlobalCircuitBreakerConfig, State, StateTransition,
};

pub use prompt::{
    ConversationBuilder, GlobalPromptRegistry, PromptBuilder, PromptComposition, PromptError,
    PromptRegistry, PromptResult, PromptTemplate, PromptVariable, VariableType,
};
