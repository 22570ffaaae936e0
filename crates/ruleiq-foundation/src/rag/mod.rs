//! RAG (Retrieval-Augmented Generation) implementations
//!
//! Provides concrete implementations of the vector store / retriever /
//! reranker / generator traits defined in `ruleiq-kernel`, plus document
//! chunking and hybrid lexical+vector fusion used by the knowledge graph
//! client.

pub mod adapter;
pub mod advanced;
pub mod chunker;
pub mod loaders;
pub mod pipeline_adapters;
pub mod recursive_chunker;
pub mod score_reranker;
pub mod similarity;
pub mod vector_store;

#[cfg(feature = "qdrant")]
pub mod qdrant_store;

pub use adapter::{GeneratorExt, PassthroughStreamingGenerator};
pub use advanced::{AdvancedRagConfig, FusionMethod, HybridSearchConfig, RerankConfig};
pub use chunker::{ChunkConfig, TextChunker};
pub use loaders::{DocumentLoader, LoaderError, MarkdownLoader, TextLoader};
pub use pipeline_adapters::{IdentityReranker, InMemoryRetriever, SimpleGenerator};
pub use recursive_chunker::{RecursiveChunkConfig, RecursiveChunker};
pub use score_reranker::ScoreReranker;
pub use similarity::compute_similarity;
pub use vector_store::InMemoryVectorStore;

#[cfg(feature = "qdrant")]
pub use qdrant_store::{QdrantConfig, QdrantVectorStore};

// Re-export kernel types for convenience
pub use ruleiq_kernel::rag::{DocumentChunk, SearchResult, SimilarityMetric, VectorStore};
