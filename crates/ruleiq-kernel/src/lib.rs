//! Capability traits and shared value types for the compliance agent
//! orchestrator.
//!
//! This crate defines the trait-level contracts only; concrete
//! implementations live in `ruleiq-foundation` and are wired together in
//! `ruleiq-runtime`.

// Shared operation-result types (AgentError/AgentResult).
pub mod agent;

// Crate-level error type composing every sub-module's error.
pub mod error;

// Unified multi-format configuration loading.
pub mod config;

// LLM provider trait, chat/embedding request-response types, streaming.
pub mod llm;

// RAG abstractions: vector store trait, retriever/reranker/generator pipeline.
pub mod rag;

// Graph/workflow abstractions (StateGraph, CompiledGraph, Command, Reducer).
pub mod workflow;

// Cost governance: pricing registry and budget enforcement.
pub mod budget;
pub mod pricing;

// Misc small helpers.
pub mod structured_output;
pub mod utils;
