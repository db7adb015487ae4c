//! In-crate stand-ins for the embedding provider and the vector index.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ranking::core::errors::{RankingError, RankingResult};
use crate::ranking::core::types::{EmbeddingVector, VectorHit};
use crate::ranking::embedding::embedder::{EmbedFuture, Embedder};
use crate::ranking::storage::vector_index::{StoreFuture, VectorIndex};

/// Build a raw hit.
pub fn hit(id: &str, score: f64, payload: Value) -> VectorHit {
    VectorHit {
        id: id.to_string(),
        score,
        payload,
    }
}

/// Embedder returning constant vectors.
pub struct StubEmbedder {
    ndims: usize,
    vector_dims: usize,
    extra_vector: bool,
    fail: bool,
    cancel_on_call: Option<CancellationToken>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    /// Embedder advertising and producing `ndims` components.
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims,
            vector_dims: ndims,
            extra_vector: false,
            fail: false,
            cancel_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with one more vector than requested.
    pub fn with_extra_vector(mut self) -> Self {
        self.extra_vector = true;
        self
    }

    /// Fail every call like an exhausted quota would.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Produce vectors of a different length than advertised.
    pub fn with_vector_dims(mut self, dims: usize) -> Self {
        self.vector_dims = dims;
        self
    }

    /// Fire `token` while serving the call.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    /// Number of `embed_texts` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for StubEmbedder {
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RankingResult<Vec<EmbeddingVector>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            if self.fail {
                return Err(RankingError::EmbeddingResponse(
                    "provider quota exceeded".to_string(),
                ));
            }
            let count = texts.len() + usize::from(self.extra_vector);
            Ok((0..count)
                .map(|_| EmbeddingVector::new(vec![1.0; self.vector_dims]))
                .collect())
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }

    fn model_name(&self) -> &str {
        "stub-embedding"
    }
}

/// Index replaying a fixed hit list in its stored order.
pub struct StubIndex {
    hits: Vec<VectorHit>,
    dimension: usize,
    fail: bool,
    searches: AtomicUsize,
    last_top_k: Mutex<Option<usize>>,
}

impl StubIndex {
    /// Index of `dimension` returning `hits` for every search.
    pub fn new(dimension: usize, hits: Vec<VectorHit>) -> Self {
        Self {
            hits,
            dimension,
            fail: false,
            searches: AtomicUsize::new(0),
            last_top_k: Mutex::new(None),
        }
    }

    /// Fail every search like an unreachable service would.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of searches served.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// `top_k` of the most recent search.
    pub fn last_top_k(&self) -> Option<usize> {
        self.last_top_k.lock().ok().and_then(|guard| *guard)
    }
}

impl VectorIndex for StubIndex {
    fn ensure_collection(&self, _name: &str, dimension: usize) -> StoreFuture<'_, RankingResult<()>> {
        Box::pin(async move {
            if dimension == self.dimension {
                Ok(())
            } else {
                Err(RankingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: dimension,
                })
            }
        })
    }

    fn upsert(
        &self,
        _id: &str,
        _vector: EmbeddingVector,
        _metadata: Value,
    ) -> StoreFuture<'_, RankingResult<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn search(
        &self,
        _vector: &EmbeddingVector,
        top_k: usize,
    ) -> StoreFuture<'_, RankingResult<Vec<VectorHit>>> {
        Box::pin(async move {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut guard) = self.last_top_k.lock() {
                *guard = Some(top_k);
            }
            if self.fail {
                return Err(RankingError::VectorIndex("index unavailable".to_string()));
            }
            Ok(self.hits.iter().take(top_k).cloned().collect())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
