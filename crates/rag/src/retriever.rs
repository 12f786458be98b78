use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use asklegal_core::{ContextWindow, PassageCandidate, Query};
use asklegal_index::{Corpus, KeywordIndex, MetadataCache, ScoredPassage};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingClient;
use crate::fusion::{assemble_window, min_max_normalize, rank, select, FusionWeights};
use crate::privacy::SensitivityVerdict;
use crate::signals::{EmbeddingProvider, KeywordSearch, MetadataFilter, VectorSearch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Ok,
    /// Not called because it could not change the outcome.
    Skipped,
    /// No backend configured.
    Disabled,
    Timeout,
    Error,
}

impl SignalStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SignalStatus::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Ok => "ok",
            SignalStatus::Skipped => "skipped",
            SignalStatus::Disabled => "disabled",
            SignalStatus::Timeout => "timeout",
            SignalStatus::Error => "error",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Complete,
    Degraded,
    /// Both ranking signals failed; the window is empty.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub window: ContextWindow,
    pub candidates: usize,
    pub vector: SignalStatus,
    pub keyword: SignalStatus,
    pub metadata: SignalStatus,
}

impl Retrieval {
    pub fn status(&self) -> RetrievalStatus {
        if !self.vector.is_ok() && !self.keyword.is_ok() {
            return RetrievalStatus::Unavailable;
        }
        let metadata_ok = matches!(self.metadata, SignalStatus::Ok | SignalStatus::Skipped);
        if self.vector.is_ok() && self.keyword.is_ok() && metadata_ok {
            RetrievalStatus::Complete
        } else {
            RetrievalStatus::Degraded
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.status() == RetrievalStatus::Unavailable
    }
}

struct SignalOutcome<T> {
    status: SignalStatus,
    value: Option<T>,
}

impl<T> SignalOutcome<T> {
    fn absent(status: SignalStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }
}

async fn run_signal<T, F>(signal: &'static str, limit: Duration, fut: F) -> SignalOutcome<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let outcome = timeout(limit, fut).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(Ok(value)) => {
            debug!(signal, latency_ms, outcome = "ok", "retrieval signal");
            SignalOutcome {
                status: SignalStatus::Ok,
                value: Some(value),
            }
        }
        Ok(Err(err)) => {
            warn!(signal, latency_ms, outcome = "error", error = %err, "retrieval signal failed");
            SignalOutcome::absent(SignalStatus::Error)
        }
        Err(_) => {
            warn!(signal, latency_ms, outcome = "timeout", "retrieval signal timed out");
            SignalOutcome::absent(SignalStatus::Timeout)
        }
    }
}

/// Fans a query out to the vector, keyword and metadata signals, fuses what
/// comes back and assembles a bounded [`ContextWindow`]. Holds only shared
/// read-only handles, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct HybridRetriever {
    corpus: Arc<Corpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector: Option<Arc<dyn VectorSearch>>,
    keyword: Option<Arc<dyn KeywordSearch>>,
    metadata: Option<Arc<dyn MetadataFilter>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            corpus,
            embedder,
            vector: None,
            keyword: None,
            metadata: None,
            config,
        }
    }

    /// Builds all three signals over the corpus in process.
    pub async fn in_process(
        corpus: Arc<Corpus>,
        embedding: EmbeddingClient,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let vectors = embedding.build_index(&corpus).await?;
        let keywords = KeywordIndex::build(&corpus);
        let metadata = MetadataCache::build(&corpus);
        info!(
            passages = corpus.len(),
            embedding = embedding.backend_name(),
            "built in-process retrieval indices"
        );
        Ok(Self::new(corpus, Arc::new(embedding), config)
            .with_vector(Arc::new(vectors))
            .with_keyword(Arc::new(keywords))
            .with_metadata(Arc::new(metadata)))
    }

    pub fn with_vector(mut self, vector: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_keyword(mut self, keyword: Arc<dyn KeywordSearch>) -> Self {
        self.keyword = Some(keyword);
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataFilter>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(
        &self,
        query: &Query,
        verdict: &SensitivityVerdict,
        top_k: usize,
    ) -> Retrieval {
        let budget = self.config.context_budget_chars;
        let k = self.config.candidate_count(top_k);
        let limit = self.config.signal_timeout();
        // A remote embedder only ever sees the privacy-adjusted text.
        let embed_text = if self.embedder.is_remote() {
            verdict.outbound_text()
        } else {
            query.text()
        };
        let filter = &self.config.filter;

        let vector_fut = async {
            match &self.vector {
                Some(index) => {
                    run_signal("vector", limit, async {
                        let embedding = self.embedder.embed(embed_text).await?;
                        index.search(&embedding, k).await
                    })
                    .await
                }
                None => SignalOutcome::absent(SignalStatus::Disabled),
            }
        };
        let keyword_fut = async {
            match &self.keyword {
                Some(index) => run_signal("keyword", limit, index.search(query.text(), k)).await,
                None => SignalOutcome::absent(SignalStatus::Disabled),
            }
        };
        let metadata_fut = async {
            match &self.metadata {
                _ if filter.is_empty() => SignalOutcome::absent(SignalStatus::Skipped),
                Some(cache) => run_signal("metadata", limit, cache.eligible(filter)).await,
                None => SignalOutcome::absent(SignalStatus::Disabled),
            }
        };
        let (vector, keyword, metadata) = tokio::join!(vector_fut, keyword_fut, metadata_fut);

        let weights = FusionWeights::new(self.config.vector_weight, self.config.keyword_weight)
            .redistribute(vector.status.is_ok(), keyword.status.is_ok());
        let Some(weights) = weights else {
            warn!(
                vector = %vector.status,
                keyword = %keyword.status,
                "retrieval unavailable, continuing without context"
            );
            return Retrieval {
                window: ContextWindow::empty(budget),
                candidates: 0,
                vector: vector.status,
                keyword: keyword.status,
                metadata: metadata.status,
            };
        };

        let mut candidates = self.candidates(
            vector.value.as_deref(),
            keyword.value.as_deref(),
            metadata.value.as_ref(),
        );
        let candidate_count = candidates.len();
        rank(&mut candidates, weights);
        let window = assemble_window(select(&candidates, top_k), budget);

        info!(
            vector = %vector.status,
            keyword = %keyword.status,
            metadata = %metadata.status,
            candidates = candidate_count,
            window_passages = window.len(),
            window_chars = window.total_size(),
            "retrieval complete"
        );
        Retrieval {
            window,
            candidates: candidate_count,
            vector: vector.status,
            keyword: keyword.status,
            metadata: metadata.status,
        }
    }

    fn candidates(
        &self,
        vector: Option<&[ScoredPassage]>,
        keyword: Option<&[ScoredPassage]>,
        eligible: Option<&FxHashSet<String>>,
    ) -> Vec<PassageCandidate> {
        let vector_norm = vector.map(min_max_normalize).unwrap_or_default();
        let keyword_norm = keyword.map(min_max_normalize).unwrap_or_default();
        let ids: BTreeSet<&String> = vector_norm.keys().chain(keyword_norm.keys()).collect();

        ids.into_iter()
            .filter_map(|id| {
                let record = self.corpus.get(id)?;
                let mut candidate =
                    PassageCandidate::new(id.clone(), record.document_id.clone(), record.text.clone());
                candidate.vector_score = lookup(&vector_norm, id);
                candidate.keyword_score = lookup(&keyword_norm, id);
                // Without an eligible set a configured filter admits nothing.
                candidate.metadata_pass = match eligible {
                    Some(set) => set.contains(id),
                    None => self.config.filter.is_empty(),
                };
                Some(candidate)
            })
            .collect()
    }
}

fn lookup(scores: &FxHashMap<String, f32>, id: &str) -> Option<f32> {
    scores.get(id).copied()
}
