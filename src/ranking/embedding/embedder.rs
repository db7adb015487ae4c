//! Embedding provider wrapper for Rig.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::{ollama, openai};
use tracing::debug;

use crate::ranking::core::config::{EmbeddingConfig, EmbeddingProvider};
use crate::ranking::core::errors::{RankingError, RankingResult};
use crate::ranking::core::types::EmbeddingVector;

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding providers.
pub trait Embedder: Send + Sync {
    /// Embed several texts, one vector per input, in input order.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RankingResult<Vec<EmbeddingVector>>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
    /// Model identifier used for every call.
    fn model_name(&self) -> &str;
}

/// Embed a single text.
///
/// # Errors
/// Returns an error if the provider fails or does not answer with exactly one vector.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> RankingResult<EmbeddingVector> {
    let mut vectors = embedder.embed_texts(vec![text.to_string()]).await?;
    if vectors.len() != 1 {
        return Err(RankingError::EmbeddingResponse(format!(
            "expected 1 vector, got {}",
            vectors.len()
        )));
    }
    vectors
        .pop()
        .ok_or_else(|| RankingError::EmbeddingResponse("empty response".to_string()))
}

/// Embedder backed by any Rig embedding model.
#[derive(Clone)]
pub struct RigEmbedder<M> {
    model: M,
    model_name: String,
    ndims: usize,
}

impl<M> RigEmbedder<M> {
    /// Wrap an already configured Rig model.
    #[must_use]
    pub const fn new(model: M, model_name: String, ndims: usize) -> Self {
        Self {
            model,
            model_name,
            ndims,
        }
    }
}

impl<M> Embedder for RigEmbedder<M>
where
    M: EmbeddingModel + Send + Sync,
{
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RankingResult<Vec<EmbeddingVector>>> {
        Box::pin(async move {
            let expected = texts.len();
            let embeddings = self.model.embed_texts(texts).await?;
            if embeddings.len() != expected {
                return Err(RankingError::EmbeddingResponse(format!(
                    "expected {expected} vectors, got {}",
                    embeddings.len()
                )));
            }
            debug!(count = expected, model = %self.model_name, "embedded texts");
            Ok(embeddings
                .iter()
                .map(|embedding| EmbeddingVector::from_f64(&embedding.vec))
                .collect())
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Build the embedder selected by `config.provider`.
///
/// # Errors
/// Returns an error if a required key is missing, the base URL is invalid or
/// the client cannot be built.
pub fn build_embedder(config: &EmbeddingConfig) -> RankingResult<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::OpenAi => openai_embedder(config),
        EmbeddingProvider::Ollama => ollama_embedder(config),
    }
}

fn openai_embedder(config: &EmbeddingConfig) -> RankingResult<Arc<dyn Embedder>> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        RankingError::InvalidConfig("OPENAI_API_KEY is required for openai embeddings".to_string())
    })?;
    let builder = openai::Client::<ReqwestClient>::builder().api_key(api_key);
    let builder = if let Some(base_url) = &config.base_url {
        builder.base_url(base_url)
    } else {
        builder
    };
    let client = builder.build().map_err(RankingError::from)?;
    let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
    Ok(Arc::new(RigEmbedder::new(
        model,
        config.model.clone(),
        config.ndims,
    )))
}

fn ollama_embedder(config: &EmbeddingConfig) -> RankingResult<Arc<dyn Embedder>> {
    let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
    let builder = if let Some(base_url) = &config.base_url {
        builder.base_url(base_url)
    } else {
        builder
    };
    let client = builder.build().map_err(RankingError::from)?;
    let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
    Ok(Arc::new(RigEmbedder::new(
        model,
        config.model.clone(),
        config.ndims,
    )))
}
