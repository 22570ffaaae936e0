//! In-memory RAG pipeline adapters
//!
//! Concrete foundation-level implementations of kernel RAG contracts:
//! - InMemoryRetriever
//! - IdentityReranker
//! - SimpleGenerator

use async_trait::async_trait;
use ruleiq_kernel::agent::error::{AgentError, AgentResult};
use ruleiq_kernel::rag::{Document, GenerateInput, Generator, Reranker, Retriever, ScoredDocument};

/// Simple in-memory retriever over a static corpus of search results.
///
/// Retrieval score is computed from token overlap with query text,
/// then combined with the base score in each corpus item.
pub struct InMemoryRetriever {
    corpus: Vec<ScoredDocument>,
}

impl InMemoryRetriever {
    /// Create a retriever from pre-indexed in-memory entries.
    pub fn new(corpus: Vec<ScoredDocument>) -> Self {
        Self { corpus }
    }

    /// Return current corpus size.
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    /// Whether corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> AgentResult<Vec<ScoredDocument>> {
        if top_k == 0 {
            return Err(AgentError::InvalidInput(
                "top_k must be greater than 0".to_string(),
            ));
        }

        let query_terms = tokenize(query);

        let mut scored = self
            .corpus
            .iter()
            .map(|item| {
                let text_terms = tokenize(&item.document.text);
                let overlap = text_terms.intersection(&query_terms).count() as f32;
                let lexical = if query_terms.is_empty() {
                    0.0
                } else {
                    overlap / query_terms.len() as f32
                };

                let mut ranked = item.clone();
                ranked.score = ranked.score + lexical;
                ranked
            })
            .collect::<Vec<_>>();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }
}

/// Reranker that preserves incoming order and scores.
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(
        &self,
        _query: &str,
        docs: Vec<ScoredDocument>,
    ) -> AgentResult<Vec<ScoredDocument>> {
        Ok(docs)
    }
}

/// Deterministic generator for local development/testing.
///
/// Builds an answer by concatenating up to `max_contexts` snippets.
pub struct SimpleGenerator {
    max_contexts: usize,
}

impl SimpleGenerator {
    /// Create generator with default max context count.
    pub fn new() -> Self {
        Self { max_contexts: 3 }
    }

    /// Configure max number of context chunks included in final answer.
    pub fn with_max_contexts(max_contexts: usize) -> Self {
        Self { max_contexts }
    }
}

impl Default for SimpleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for SimpleGenerator {
    async fn generate(&self, input: &GenerateInput) -> AgentResult<String> {
        if input.context.is_empty() {
            return Ok(format!(
                "No relevant context found. Question: {}",
                input.query
            ));
        }

        let snippets = input
            .context
            .iter()
            .take(self.max_contexts)
            .map(|document| format!("[{}] {}", document.id, document.text))
            .collect::<Vec<_>>()
            .join(" | ");

        Ok(format!("Answer for '{}': {}", input.query, snippets))
    }
}

fn tokenize(input: &str) -> std::collections::HashSet<String> {
    input
        .split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect::<std::collections::HashSet<_>>()
}
