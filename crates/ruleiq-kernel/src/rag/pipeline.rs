//! RAG Pipeline traits
//!
//! Defines the Generator trait for LLM-powered RAG pipelines with streaming support.

use crate::rag::GeneratorChunk;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Error type for RAG pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Retrieval error: {0}")]
    Retrieval(String),
    #[error("Streaming error: {0}")]
    Stream(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Stream type for generator output
pub type GeneratorStream = Pin<Box<dyn Stream<Item = PipelineResult<GeneratorChunk>> + Send>>;

/// Generator trait for RAG pipelines
///
/// This trait defines the interface for generating responses using LLMs
/// in a Retrieval-Augmented Generation pipeline. It supports both blocking
/// generation and streaming generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a response from the given context and query.
    ///
    /// This is a blocking call that returns the complete generated response.
    ///
    /// # Arguments
    /// * `context` - The retrieved context from the vector store
    /// * `query` - The user's query
    ///
    /// # Returns
    /// The generated text response
    async fn generate(&self, context: &str, query: &str) -> PipelineResult<String>;

    /// Stream a response from the given context and query.
    ///
    /// This returns a stream of GeneratorChunk items that can be processed
    /// as they become available, enabling real-time token-by-token processing.
    ///
    /// # Arguments
    /// * `context` - The retrieved context from the vector store
    /// * `query` - The user's query
    ///
    /// # Returns
    /// A stream of GeneratorChunk items
    async fn stream(
        &self,
        context: &str,
        query: &str,
    ) -> PipelineResult<GeneratorStream>;

    /// Check if this generator supports streaming.
    ///
    /// Returns true if the stream method is implemented and can produce
    /// incremental output. If false, callers should fall back to generate.
    fn supports_streaming(&self) -> bool {
        false
    }
}
