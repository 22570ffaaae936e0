//! Evidence Orchestrator (C9).
//!
//! Fans a collection request out across per-source collector tasks under a
//! `tokio::task::JoinSet`, gated by a per-source `Semaphore` the way
//! `workflow::executor::WorkflowExecutor` gates parallel node fan-out. No
//! teacher file collects evidence specifically — the bounded persist queue
//! and streaming progress channel are original to this module, shaped after
//! the same bounded-channel-plus-progress-notification idiom the rest of the
//! codebase's `mpsc`-based graph streaming (`workflow::state_graph`) uses.

use async_trait::async_trait;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::JoinSet;
use uuid::Uuid;

/// A single collected piece of evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: Uuid,
    pub source: String,
    pub control_id: String,
    pub collected_at: chrono::DateTime<chrono::Utc>,
    pub quality_score: f64,
    pub raw_ref: String,
    pub fingerprint: String,
}

impl EvidenceItem {
    /// Deterministic fingerprint over `(source, type, natural_key)`, used for
    /// at-most-once dedup, independent of `id` (which is per-attempt).
    pub fn fingerprint_of(source: &str, evidence_type: &str, natural_key: &str) -> String {
        format!("{source}:{evidence_type}:{natural_key}")
    }
}

/// Per-source collector: discovers candidate control ids, fetches raw
/// evidence for one, and scores its own confidence in the result.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source_name(&self) -> &str;

    async fn discover(&self, control_ids: &[String]) -> Result<Vec<String>, EvidenceError>;

    async fn fetch(&self, control_id: &str) -> Result<RawEvidence, EvidenceError>;

    /// Collector's own confidence in the item it fetched, in `[0, 1]`.
    fn quality_score(&self, item: &RawEvidence) -> f64;
}

#[derive(Debug, Clone)]
pub struct RawEvidence {
    pub control_id: String,
    pub evidence_type: String,
    pub natural_key: String,
    pub raw_ref: String,
    pub collected_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvidenceError {
    #[error("collector '{source}' failed for control '{control_id}': {reason}")]
    CollectorFailed {
        source: String,
        control_id: String,
        reason: String,
    },

    #[error("no evidence collected across {sources_tried} source(s)")]
    NoEvidenceCollected { sources_tried: usize },
}

/// One collector's recorded failure, kept alongside successes so a partial
/// collection can still report what went wrong per §4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFailure {
    pub source: String,
    pub control_id: String,
    pub reason: String,
}

/// `{collected, failed, duplicates, progress_percent}`, emitted over the
/// handle's broadcast channel at most every `PROGRESS_INTERVAL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionProgress {
    pub collected: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub progress_percent: f64,
}

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

pub struct CollectionRequest {
    pub tenant_id: String,
    pub control_ids: Vec<String>,
    pub max_concurrent_per_source: usize,
    pub persist_queue_capacity: usize,
}

/// Outcome of a completed (non-streaming) collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub items: Vec<EvidenceItem>,
    pub failures: Vec<CollectionFailure>,
    pub duplicates: usize,
}

/// Handle for an in-flight or completed collection; `progress` is populated
/// only when the caller asked for streaming updates.
pub struct CollectionHandle {
    pub progress: Option<broadcast::Receiver<CollectionProgress>>,
    pub result: tokio::sync::oneshot::Receiver<CollectionResult>,
}

/// Per-tenant dedup registry plus the collector fan-out engine.
pub struct EvidenceOrchestrator {
    collectors: Vec<Arc<dyn Collector>>,
    seen_fingerprints: Arc<DashSet<(String, String)>>,
}

impl EvidenceOrchestrator {
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self {
            collectors,
            seen_fingerprints: Arc::new(DashSet::new()),
        }
    }

    fn quality_of(collector_score: f64, freshness_score: f64) -> f64 {
        (0.7 * collector_score + 0.3 * freshness_score).clamp(0.0, 1.0)
    }

    fn freshness_score(collected_at: chrono::DateTime<chrono::Utc>) -> f64 {
        let age_days = (chrono::Utc::now() - collected_at).num_seconds() as f64 / 86_400.0;
        (1.0 - (age_days / 30.0)).clamp(0.0, 1.0)
    }

    /// Run the collection to completion and return the aggregated result
    /// directly, without the streaming progress channel. `collect_streaming`
    /// is the same engine with a progress channel attached.
    pub async fn collect(&self, request: CollectionRequest) -> Result<CollectionResult, EvidenceError> {
        let (result, _progress_rx) = self.run(request, false).await;
        result
    }

    /// Same as `collect`, but also returns a `broadcast::Receiver` of
    /// `CollectionProgress` updates, throttled to `PROGRESS_INTERVAL`.
    pub async fn collect_streaming(
        &self,
        request: CollectionRequest,
    ) -> (Result<CollectionResult, EvidenceError>, broadcast::Receiver<CollectionProgress>) {
        let (result, progress_rx) = self.run(request, true).await;
        (result, progress_rx.expect("streaming mode always returns a receiver"))
    }

    async fn run(
        &self,
        request: CollectionRequest,
        streaming: bool,
    ) -> (Result<CollectionResult, EvidenceError>, Option<broadcast::Receiver<CollectionProgress>>) {
        let (progress_tx, progress_rx) = broadcast::channel(32);
        let (persist_tx, mut persist_rx) = mpsc::channel::<PersistMsg>(request.persist_queue_capacity.max(1));

        let sources_tried = self.collectors.len();
        // Upper-bound estimate of how many (collector, control) fetches this
        // run will attempt; a collector's `discover` can return fewer ids
        // than requested, so this is a ceiling, not an exact total — it only
        // feeds the streamed `progress_percent`, never the final counts.
        let expected_total = (request.control_ids.len() * sources_tried).max(1);
        let mut join_set: JoinSet<()> = JoinSet::new();
        for collector in &self.collectors {
            let collector = collector.clone();
            let control_ids = request.control_ids.clone();
            let permits = Arc::new(Semaphore::new(request.max_concurrent_per_source.max(1)));
            let persist_tx = persist_tx.clone();

            join_set.spawn(async move {
                let discovered = match collector.discover(&control_ids).await {
                    Ok(ids) if !ids.is_empty() => ids,
                    Ok(_) => control_ids.clone(),
                    Err(_) => control_ids.clone(),
                };

                let mut tasks = JoinSet::new();
                for control_id in discovered {
                    let collector = collector.clone();
                    let permits = permits.clone();
                    let persist_tx = persist_tx.clone();
                    tasks.spawn(async move {
                        let _permit = permits.acquire_owned().await.ok();
                        let outcome = collector.fetch(&control_id).await;
                        match outcome {
                            Ok(raw) => {
                                let score = collector.quality_score(&raw);
                                let _ = persist_tx
                                    .send(PersistMsg::Item {
                                        source: collector.source_name().to_string(),
                                        raw,
                                        collector_score: score,
                                    })
                                    .await;
                            }
                            Err(e) => {
                                let _ = persist_tx
                                    .send(PersistMsg::Failure(CollectionFailure {
                                        source: collector.source_name().to_string(),
                                        control_id,
                                        reason: e.to_string(),
                                    }))
                                    .await;
                            }
                        }
                    });
                }
                while tasks.join_next().await.is_some() {}
            });
        }
        drop(persist_tx);

        let progress_tx_for_task = progress_tx.clone();
        let seen_fingerprints = self.seen_fingerprints.clone();
        let tenant_id = request.tenant_id.clone();
        let persist_task = tokio::spawn(async move {
            let mut items = Vec::new();
            let mut failures = Vec::new();
            let mut duplicates = 0usize;
            let mut last_emit = Instant::now();

            while let Some(msg) = persist_rx.recv().await {
                match msg {
                    PersistMsg::Item {
                        source,
                        raw,
                        collector_score,
                    } => {
                        let fingerprint = EvidenceItem::fingerprint_of(&source, &raw.evidence_type, &raw.natural_key);
                        let key = (tenant_id.clone(), fingerprint.clone());
                        if !seen_fingerprints.insert(key) {
                            duplicates += 1;
                        } else {
                            let freshness = Self::freshness_score(raw.collected_at);
                            let quality_score = Self::quality_of(collector_score, freshness);
                            items.push(EvidenceItem {
                                id: Uuid::new_v4(),
                                source,
                                control_id: raw.control_id,
                                collected_at: raw.collected_at,
                                quality_score,
                                raw_ref: raw.raw_ref,
                                fingerprint,
                            });
                        }
                    }
                    PersistMsg::Failure(f) => failures.push(f),
                }

                if streaming && last_emit.elapsed() >= PROGRESS_INTERVAL {
                    let processed = items.len() + failures.len() + duplicates;
                    let progress_percent = (processed as f64 / expected_total as f64 * 100.0).min(100.0);
                    let _ = progress_tx_for_task.send(CollectionProgress {
                        collected: items.len(),
                        failed: failures.len(),
                        duplicates,
                        progress_percent,
                    });
                    last_emit = Instant::now();
                }
            }

            (items, failures, duplicates)
        });

        while join_set.join_next().await.is_some() {}
        let (items, failures, duplicates) = persist_task.await.unwrap_or_default();

        if streaming {
            let _ = progress_tx.send(CollectionProgress {
                collected: items.len(),
                failed: failures.len(),
                duplicates,
                progress_percent: 100.0,
            });
        }

        let result = if items.is_empty() {
            Err(EvidenceError::NoEvidenceCollected { sources_tried })
        } else {
            Ok(CollectionResult {
                items,
                failures,
                duplicates,
            })
        };

        (result, streaming.then_some(progress_rx))
    }
}

enum PersistMsg {
    Item {
        source: String,
        raw: RawEvidence,
        collector_score: f64,
    },
    Failure(CollectionFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCollector {
        name: &'static str,
        fails: bool,
    }

    #[async_trait]
    impl Collector for StubCollector {
        fn source_name(&self) -> &str {
            self.name
        }

        async fn discover(&self, control_ids: &[String]) -> Result<Vec<String>, EvidenceError> {
            Ok(control_ids.to_vec())
        }

        async fn fetch(&self, control_id: &str) -> Result<RawEvidence, EvidenceError> {
            if self.fails {
                return Err(EvidenceError::CollectorFailed {
                    source: self.name.to_string(),
                    control_id: control_id.to_string(),
                    reason: "simulated failure".into(),
                });
            }
            Ok(RawEvidence {
                control_id: control_id.to_string(),
                evidence_type: "policy_doc".into(),
                natural_key: control_id.to_string(),
                raw_ref: format!("s3://evidence/{control_id}"),
                collected_at: chrono::Utc::now(),
            })
        }

        fn quality_score(&self, _item: &RawEvidence) -> f64 {
            0.9
        }
    }

    fn request(control_ids: &[&str]) -> CollectionRequest {
        CollectionRequest {
            tenant_id: "tenant-1".into(),
            control_ids: control_ids.iter().map(|s| s.to_string()).collect(),
            max_concurrent_per_source: 4,
            persist_queue_capacity: 200,
        }
    }

    #[tokio::test]
    async fn collects_from_multiple_sources() {
        let orchestrator = EvidenceOrchestrator::new(vec![
            Arc::new(StubCollector { name: "s3", fails: false }),
            Arc::new(StubCollector { name: "sharepoint", fails: false }),
        ]);

        let result = orchestrator.collect(request(&["A.1", "A.2"])).await.unwrap();
        assert_eq!(result.items.len(), 4);
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn one_failing_collector_does_not_fail_the_whole_collection() {
        let orchestrator = EvidenceOrchestrator::new(vec![
            Arc::new(StubCollector { name: "ok", fails: false }),
            Arc::new(StubCollector { name: "broken", fails: true }),
        ]);

        let result = orchestrator.collect(request(&["A.1"])).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].source, "broken");
    }

    #[tokio::test]
    async fn zero_items_across_all_sources_fails_no_evidence_collected() {
        let orchestrator = EvidenceOrchestrator::new(vec![Arc::new(StubCollector { name: "broken", fails: true })]);

        let result = orchestrator.collect(request(&["A.1"])).await;
        assert!(matches!(result, Err(EvidenceError::NoEvidenceCollected { .. })));
    }

    #[tokio::test]
    async fn duplicate_fingerprints_within_a_tenant_are_deduped() {
        let orchestrator = EvidenceOrchestrator::new(vec![Arc::new(StubCollector { name: "s3", fails: false })]);

        let first = orchestrator.collect(request(&["A.1"])).await.unwrap();
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.duplicates, 0);

        let second = orchestrator.collect(request(&["A.1"])).await;
        // Second run of the same (tenant, control) fingerprint collects
        // nothing new: every candidate item is a duplicate.
        assert!(matches!(second, Err(EvidenceError::NoEvidenceCollected { .. })));
    }

    #[test]
    fn quality_score_blends_collector_and_freshness_and_clamps() {
        assert!((EvidenceOrchestrator::quality_of(1.0, 1.0) - 1.0).abs() < 1e-9);
        assert!((EvidenceOrchestrator::quality_of(0.0, 0.0)).abs() < 1e-9);
        let blended = EvidenceOrchestrator::quality_of(0.9, 0.0);
        assert!((blended - 0.63).abs() < 1e-9);
    }

    #[test]
    fn freshness_score_decays_with_age() {
        let fresh = EvidenceOrchestrator::freshness_score(chrono::Utc::now());
        let stale = EvidenceOrchestrator::freshness_score(chrono::Utc::now() - chrono::Duration::days(60));
        assert!(fresh > stale);
        assert_eq!(stale, 0.0);
    }

    #[allow(dead_code)]
    fn unused_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }

    #[tokio::test]
    async fn streaming_progress_reaches_100_percent_and_reports_final_counts() {
        let orchestrator = EvidenceOrchestrator::new(vec![
            Arc::new(StubCollector { name: "ok", fails: false }),
            Arc::new(StubCollector { name: "broken", fails: true }),
        ]);

        let (result, mut progress) = orchestrator.collect_streaming(request(&["A.1", "A.2"])).await;
        let result = result.unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.failures.len(), 2);

        let mut last = None;
        while let Ok(update) = progress.try_recv() {
            last = Some(update);
        }
        let last = last.expect("at least the final 100% update should have been broadcast");
        assert_eq!(last.progress_percent, 100.0);
        assert_eq!(last.collected, 2);
        assert_eq!(last.failed, 2);
    }

    #[tokio::test]
    async fn streaming_progress_reports_live_duplicate_count() {
        let orchestrator = EvidenceOrchestrator::new(vec![Arc::new(StubCollector { name: "s3", fails: false })]);

        orchestrator.collect(request(&["A.1"])).await.unwrap();

        let (result, mut progress) = orchestrator.collect_streaming(request(&["A.1"])).await;
        assert!(matches!(result, Err(EvidenceError::NoEvidenceCollected { .. })));

        let mut last = None;
        while let Ok(update) = progress.try_recv() {
            last = Some(update);
        }
        let last = last.expect("a final progress update should have been broadcast");
        assert_eq!(last.duplicates, 1);
        assert_eq!(last.collected, 0);
    }
}
