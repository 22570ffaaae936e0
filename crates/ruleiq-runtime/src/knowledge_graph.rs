//! Knowledge Graph Client (C5).
//!
//! Hybrid retrieval over the compliance knowledge base: a dense pass through
//! `ruleiq_foundation::rag::InMemoryVectorStore` and a sparse lexical pass
//! (token-overlap scoring), fused with Reciprocal Rank Fusion per
//! `rag::advanced::FusionMethod::RRF`. Each result is tagged with the
//! compliance-control metadata (`control_id`, `framework`) carried on its
//! `DocumentChunk`.
//!
//! Alongside `search_obligations` (the hybrid pass above), the graph carries
//! typed `Framework`/`Obligation`/`Control`/`Penalty`/`Theme` nodes in
//! adjacency maps so `obligations_by_framework`, `controls_for_obligation`,
//! and `cross_referenced` (transitive, depth <= 2) can be answered without
//! going back through the vector/lexical pipeline.

use ruleiq_foundation::rag::InMemoryVectorStore;
use ruleiq_kernel::rag::{DocumentChunk, SearchResult, SimilarityMetric, VectorStore};
use std::collections::{HashMap, HashSet};

/// RRF's rank-damping constant; 60 is the value from the original paper and
/// the one most hybrid-search implementations default to.
const RRF_K: f64 = 60.0;

/// Maximum traversal depth for `cross_referenced`'s transitive walk.
const MAX_CROSS_REFERENCE_DEPTH: u32 = 2;

#[derive(Debug, Clone)]
pub struct ControlChunk {
    pub chunk: DocumentChunk,
    pub control_id: String,
    pub framework: String,
}

impl ControlChunk {
    pub fn new(chunk: DocumentChunk, control_id: impl Into<String>, framework: impl Into<String>) -> Self {
        Self {
            chunk,
            control_id: control_id.into(),
            framework: framework.into(),
        }
    }
}

/// A regulatory framework (e.g. "UK-GDPR", "PCI-DSS") that obligations are
/// grouped under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framework {
    pub id: String,
    pub name: String,
}

/// A single duty imposed by a framework (e.g. "notify the ICO of a breach
/// within 72 hours"). `related_obligation_ids` is the edge set walked by
/// `cross_referenced`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub id: String,
    pub framework_id: String,
    pub text: String,
    pub theme_ids: Vec<String>,
    pub related_obligation_ids: Vec<String>,
}

/// A control that satisfies one or more obligations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub id: String,
    pub name: String,
    pub obligation_ids: Vec<String>,
}

/// A penalty attached to an obligation's non-compliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub id: String,
    pub obligation_id: String,
    pub description: String,
}

/// A cross-cutting theme (e.g. "data subject rights") obligations are tagged
/// with, independent of which framework they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub id: String,
    pub name: String,
}

/// Result of a hybrid retrieval: the chunk, its fused RRF score, and which
/// retrieval passes surfaced it.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: String,
    pub text: String,
    pub control_id: Option<String>,
    pub framework: Option<String>,
    pub score: f64,
    pub matched_dense: bool,
    pub matched_sparse: bool,
}

pub struct KnowledgeGraphClient {
    vector_store: InMemoryVectorStore,
    control_index: HashMap<String, (String, String)>,
    corpus: HashMap<String, String>,
    frameworks: HashMap<String, Framework>,
    obligations: HashMap<String, Obligation>,
    controls: HashMap<String, Control>,
    penalties: HashMap<String, Vec<Penalty>>,
    themes: HashMap<String, Theme>,
}

impl KnowledgeGraphClient {
    pub fn new() -> Self {
        Self {
            vector_store: InMemoryVectorStore::new(SimilarityMetric::Cosine),
            control_index: HashMap::new(),
            corpus: HashMap::new(),
            frameworks: HashMap::new(),
            obligations: HashMap::new(),
            controls: HashMap::new(),
            penalties: HashMap::new(),
            themes: HashMap::new(),
        }
    }

    pub async fn index(&mut self, control: ControlChunk) {
        self.control_index.insert(
            control.chunk.id.clone(),
            (control.control_id, control.framework),
        );
        self.corpus.insert(control.chunk.id.clone(), control.chunk.text.clone());
        let _ = self.vector_store.upsert(control.chunk).await;
    }

    pub fn add_framework(&mut self, framework: Framework) {
        self.frameworks.insert(framework.id.clone(), framework);
    }

    pub fn add_theme(&mut self, theme: Theme) {
        self.themes.insert(theme.id.clone(), theme);
    }

    pub fn add_obligation(&mut self, obligation: Obligation) {
        self.obligations.insert(obligation.id.clone(), obligation);
    }

    pub fn add_control(&mut self, control: Control) {
        self.controls.insert(control.id.clone(), control);
    }

    pub fn add_penalty(&mut self, penalty: Penalty) {
        self.penalties.entry(penalty.obligation_id.clone()).or_default().push(penalty);
    }

    /// All obligations registered under a given framework, in insertion-stable
    /// (sorted by id) order so callers get deterministic output.
    pub fn obligations_by_framework(&self, framework_id: &str) -> Vec<Obligation> {
        let mut matches: Vec<Obligation> = self
            .obligations
            .values()
            .filter(|o| o.framework_id == framework_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Every control that satisfies the given obligation.
    pub fn controls_for_obligation(&self, obligation_id: &str) -> Vec<Control> {
        let mut matches: Vec<Control> = self
            .controls
            .values()
            .filter(|c| c.obligation_ids.iter().any(|id| id == obligation_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Obligations transitively related to `obligation_id` via
    /// `related_obligation_ids`, up to `MAX_CROSS_REFERENCE_DEPTH` hops. The
    /// starting obligation itself is excluded from the result.
    pub fn cross_referenced(&self, obligation_id: &str) -> Vec<Obligation> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(obligation_id.to_string());

        let mut frontier = vec![obligation_id.to_string()];
        let mut found: Vec<Obligation> = Vec::new();

        for _ in 0..MAX_CROSS_REFERENCE_DEPTH {
            let mut next_frontier = Vec::new();
            for id in &frontier {
                let Some(obligation) = self.obligations.get(id) else { continue };
                for related_id in &obligation.related_obligation_ids {
                    if visited.insert(related_id.clone()) {
                        if let Some(related) = self.obligations.get(related_id) {
                            found.push(related.clone());
                        }
                        next_frontier.push(related_id.clone());
                    }
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Dense-only search against embedded control text.
    async fn dense_search(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        self.vector_store
            .search(query_embedding, top_k, None)
            .await
            .unwrap_or_default()
    }

    /// Sparse lexical search: normalized token-overlap (Jaccard-like) scoring
    /// over the indexed text. Stands in for a real BM25/inverted index while
    /// keeping the hybrid-fusion contract identical.
    fn sparse_search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_tokens: HashSet<String> = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f32)> = self
            .corpus
            .iter()
            .filter_map(|(id, text)| {
                let doc_tokens = tokenize(text);
                if doc_tokens.is_empty() {
                    return None;
                }
                let overlap = query_tokens.intersection(&doc_tokens).count();
                if overlap == 0 {
                    return None;
                }
                let union = query_tokens.union(&doc_tokens).count();
                Some((id.clone(), overlap as f32 / union as f32))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Hybrid retrieval: run both passes, fuse with RRF, return the top_k
    /// by fused score.
    pub async fn hybrid_search(&self, query: &str, query_embedding: &[f32], top_k: usize) -> Vec<FusedResult> {
        let pool = top_k.max(1) * 4;
        let dense = self.dense_search(query_embedding, pool).await;
        let sparse = self.sparse_search(query, pool);

        let mut rrf_scores: HashMap<String, f64> = HashMap::new();
        let mut matched_dense: HashSet<String> = HashSet::new();
        let mut matched_sparse: HashSet<String> = HashSet::new();

        for (rank, result) in dense.iter().enumerate() {
            *rrf_scores.entry(result.id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
            matched_dense.insert(result.id.clone());
        }
        for (rank, (id, _score)) in sparse.iter().enumerate() {
            *rrf_scores.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
            matched_sparse.insert(id.clone());
        }

        let mut fused: Vec<FusedResult> = rrf_scores
            .into_iter()
            .map(|(id, score)| {
                let (control_id, framework) = self
                    .control_index
                    .get(&id)
                    .map(|(c, f)| (Some(c.clone()), Some(f.clone())))
                    .unwrap_or((None, None));
                let text = self.corpus.get(&id).cloned().unwrap_or_default();
                FusedResult {
                    matched_dense: matched_dense.contains(&id),
                    matched_sparse: matched_sparse.contains(&id),
                    id,
                    text,
                    control_id,
                    framework,
                    score,
                }
            })
            .collect();

        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);
        fused
    }
}

impl Default for KnowledgeGraphClient {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>, control_id: &str) -> ControlChunk {
        ControlChunk::new(DocumentChunk::new(id, text, embedding), control_id, "UK-GDPR")
    }

    #[tokio::test]
    async fn hybrid_search_ranks_dense_and_sparse_matches_above_unrelated() {
        let mut kg = KnowledgeGraphClient::new();
        kg.index(chunk("c1", "data subject access request timelines", vec![1.0, 0.0, 0.0], "A.1"))
            .await;
        kg.index(chunk("c2", "encryption at rest for personal data", vec![0.0, 1.0, 0.0], "A.2"))
            .await;
        kg.index(chunk("c3", "unrelated catering invoice policy", vec![0.0, 0.0, 1.0], "Z.9"))
            .await;

        let results = kg.hybrid_search("data subject access request", &[1.0, 0.0, 0.0], 2).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "c1");
        assert!(results[0].matched_dense || results[0].matched_sparse);
        assert!(results.iter().all(|r| r.id != "c3"));
    }

    #[tokio::test]
    async fn empty_corpus_returns_no_results() {
        let kg = KnowledgeGraphClient::new();
        let results = kg.hybrid_search("anything", &[0.0], 5).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fused_result_carries_control_metadata() {
        let mut kg = KnowledgeGraphClient::new();
        kg.index(chunk("c1", "breach notification within 72 hours", vec![1.0], "A.33"))
            .await;

        let results = kg.hybrid_search("breach notification", &[1.0], 1).await;
        assert_eq!(results[0].control_id.as_deref(), Some("A.33"));
        assert_eq!(results[0].framework.as_deref(), Some("UK-GDPR"));
    }

    fn graph_with_gdpr_fixture() -> KnowledgeGraphClient {
        let mut kg = KnowledgeGraphClient::new();
        kg.add_framework(Framework { id: "UK-GDPR".into(), name: "UK General Data Protection Regulation".into() });
        kg.add_framework(Framework { id: "PCI-DSS".into(), name: "Payment Card Industry Data Security Standard".into() });
        kg.add_theme(Theme { id: "breach-notification".into(), name: "Breach notification".into() });

        kg.add_obligation(Obligation {
            id: "A.33".into(),
            framework_id: "UK-GDPR".into(),
            text: "Notify the supervisory authority of a breach within 72 hours".into(),
            theme_ids: vec!["breach-notification".into()],
            related_obligation_ids: vec!["A.34".into()],
        });
        kg.add_obligation(Obligation {
            id: "A.34".into(),
            framework_id: "UK-GDPR".into(),
            text: "Notify affected data subjects when the breach is high risk".into(),
            theme_ids: vec!["breach-notification".into()],
            related_obligation_ids: vec!["A.35".into()],
        });
        kg.add_obligation(Obligation {
            id: "A.35".into(),
            framework_id: "UK-GDPR".into(),
            text: "Keep an internal record of all breaches regardless of notification duty".into(),
            theme_ids: vec!["breach-notification".into()],
            related_obligation_ids: vec![],
        });
        kg.add_obligation(Obligation {
            id: "PCI.10".into(),
            framework_id: "PCI-DSS".into(),
            text: "Track and monitor all access to cardholder data".into(),
            theme_ids: vec![],
            related_obligation_ids: vec![],
        });

        kg.add_control(Control {
            id: "CTRL-1".into(),
            name: "72-hour breach notification runbook".into(),
            obligation_ids: vec!["A.33".into()],
        });
        kg.add_control(Control {
            id: "CTRL-2".into(),
            name: "Data subject notification template".into(),
            obligation_ids: vec!["A.33".into(), "A.34".into()],
        });

        kg.add_penalty(Penalty {
            id: "PEN-1".into(),
            obligation_id: "A.33".into(),
            description: "Up to 4% of global annual turnover".into(),
        });

        kg
    }

    #[test]
    fn obligations_by_framework_filters_to_the_requested_framework() {
        let kg = graph_with_gdpr_fixture();
        let gdpr = kg.obligations_by_framework("UK-GDPR");
        assert_eq!(gdpr.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["A.33", "A.34", "A.35"]);

        let pci = kg.obligations_by_framework("PCI-DSS");
        assert_eq!(pci.len(), 1);
        assert_eq!(pci[0].id, "PCI.10");
    }

    #[test]
    fn obligations_by_framework_is_empty_for_an_unknown_framework() {
        let kg = graph_with_gdpr_fixture();
        assert!(kg.obligations_by_framework("NIST-CSF").is_empty());
    }

    #[test]
    fn controls_for_obligation_returns_every_satisfying_control() {
        let kg = graph_with_gdpr_fixture();
        let controls = kg.controls_for_obligation("A.33");
        assert_eq!(controls.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["CTRL-1", "CTRL-2"]);

        let controls = kg.controls_for_obligation("A.35");
        assert!(controls.is_empty());
    }

    #[test]
    fn cross_referenced_walks_two_hops_and_excludes_the_root() {
        let kg = graph_with_gdpr_fixture();
        let related = kg.cross_referenced("A.33");
        assert_eq!(related.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["A.34", "A.35"]);
        assert!(related.iter().all(|o| o.id != "A.33"));
    }

    #[test]
    fn cross_referenced_does_not_loop_forever_on_a_cycle() {
        let mut kg = KnowledgeGraphClient::new();
        kg.add_obligation(Obligation {
            id: "X".into(),
            framework_id: "F".into(),
            text: "x".into(),
            theme_ids: vec![],
            related_obligation_ids: vec!["Y".into()],
        });
        kg.add_obligation(Obligation {
            id: "Y".into(),
            framework_id: "F".into(),
            text: "y".into(),
            theme_ids: vec![],
            related_obligation_ids: vec!["X".into()],
        });

        let related = kg.cross_referenced("X");
        assert_eq!(related.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["Y"]);
    }

    #[test]
    fn cross_referenced_is_empty_for_an_obligation_with_no_relations() {
        let kg = graph_with_gdpr_fixture();
        assert!(kg.cross_referenced("PCI.10").is_empty());
    }
}
