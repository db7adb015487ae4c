//! End-to-end ranking: embed, search, assemble, sort, truncate.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ranking::core::config::{RankingConfig, RetrievalConfig};
use crate::ranking::core::errors::{RankingError, RankingResult};
use crate::ranking::core::types::{RankOutcome, RankQuery, RankedResult};
use crate::ranking::embedding::embedder::{Embedder, build_embedder, embed_one};
use crate::ranking::retrieval::assembler::CandidateAssembler;
use crate::ranking::storage::vector_index::{SqliteVectorIndex, VectorIndex};

/// External collaborators used by the pipeline.
#[derive(Clone)]
pub struct RankingBackends {
    /// Text embedding provider.
    pub embedder: Arc<dyn Embedder>,
    /// Nearest-neighbour index holding spot vectors.
    pub index: Arc<dyn VectorIndex>,
}

impl RankingBackends {
    /// Build the production backends and make sure the collection exists.
    ///
    /// # Errors
    /// Returns an error if the embedder cannot be built or the index cannot be opened.
    pub async fn sqlite(config: &RankingConfig) -> RankingResult<Self> {
        let embedder = build_embedder(&config.embedding)?;
        let index = SqliteVectorIndex::open(&config.index).await?;
        index
            .ensure_collection(&config.index.collection, config.index.dimension)
            .await?;
        Ok(Self {
            embedder,
            index: Arc::new(index),
        })
    }
}

/// Ranks spots for a free-text query and an optional user location.
pub struct RankingPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    assembler: CandidateAssembler,
    retrieval: RetrievalConfig,
}

impl RankingPipeline {
    /// Create a pipeline from scoring settings and backends.
    ///
    /// # Errors
    /// Returns an error if the scoring or retrieval settings are invalid, or
    /// if the embedder and the index disagree on vector dimension.
    pub fn new(config: &RankingConfig, backends: RankingBackends) -> RankingResult<Self> {
        config.scoring.validate()?;
        config.retrieval.validate()?;

        let expected = backends.index.dimension();
        let actual = backends.embedder.ndims();
        if expected != actual {
            return Err(RankingError::DimensionMismatch { expected, actual });
        }

        Ok(Self {
            embedder: backends.embedder,
            index: backends.index,
            assembler: CandidateAssembler::new(&config.scoring),
            retrieval: config.retrieval.clone(),
        })
    }

    /// Rank spots for `query`.
    ///
    /// Always fetches `candidate_pool` hits, scores all of them, then returns
    /// the best `top_k` in descending `final_score` order. Equal scores keep
    /// the order the index returned them in. Hits with a malformed payload
    /// are dropped and counted.
    ///
    /// # Errors
    /// Returns an error if the query is blank, a collaborator fails, or
    /// `cancel` fires before the work completes.
    pub async fn rank(
        &self,
        query: &RankQuery,
        cancel: &CancellationToken,
    ) -> RankingResult<RankOutcome> {
        let started = Instant::now();
        let text = query.text.trim();
        if text.is_empty() {
            return Err(RankingError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }

        let top_k = self.retrieval.resolve_top_k(query.top_k);
        info!(
            query_chars = text.chars().count(),
            top_k,
            has_location = query.location.is_some(),
            "ranking started"
        );

        ensure_live(cancel)?;
        let vector = until_cancelled(cancel, embed_one(self.embedder.as_ref(), text)).await?;
        if vector.dims() != self.index.dimension() {
            return Err(RankingError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.dims(),
            });
        }

        ensure_live(cancel)?;
        let hits = until_cancelled(
            cancel,
            self.index.search(&vector, self.retrieval.candidate_pool),
        )
        .await?;
        ensure_live(cancel)?;

        let candidates = hits.len();
        let mut dropped = 0;
        let mut results = Vec::with_capacity(candidates);
        for hit in hits {
            let candidate_id = hit.id.clone();
            match self.assembler.assemble(hit, query.location) {
                Ok(result) => results.push(result),
                Err(err) => {
                    dropped += 1;
                    warn!(%candidate_id, error = %err, "dropping candidate");
                }
            }
        }

        sort_by_final_score(&mut results);
        results.truncate(top_k);

        info!(
            returned = results.len(),
            candidates,
            dropped,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "ranking finished"
        );

        Ok(RankOutcome {
            results,
            candidates,
            dropped,
        })
    }
}

/// Stable descending sort; ties keep their incoming order.
fn sort_by_final_score(results: &mut [RankedResult]) {
    results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
}

fn ensure_live(cancel: &CancellationToken) -> RankingResult<()> {
    if cancel.is_cancelled() {
        Err(RankingError::Cancelled)
    } else {
        Ok(())
    }
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, work: F) -> RankingResult<T>
where
    F: Future<Output = RankingResult<T>> + Send,
    T: Send,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RankingError::Cancelled),
        result = work => result,
    }
}
