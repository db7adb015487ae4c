//! Error types for the ranking subsystem.

use thiserror::Error;

/// Broad class of a [`RankingError`], used to decide how a failure is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misconfiguration; the service must not serve traffic.
    Configuration,
    /// The embedding provider or the vector index failed.
    Collaborator,
    /// The caller sent an unusable request.
    Request,
    /// The caller's cancellation signal fired.
    Cancelled,
}

/// Ranking subsystem error type.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Invalid or missing configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Embedding and index dimensionality disagree.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was provisioned with.
        expected: usize,
        /// Dimension that was offered.
        actual: usize,
    },
    /// Query cannot be ranked.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Embedding provider answered with an unexpected shape.
    #[error("unexpected embedding response: {0}")]
    EmbeddingResponse(String),
    /// Vector index failure not covered by the storage variants.
    #[error("vector index error: {0}")]
    VectorIndex(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Caller aborted the ranking call.
    #[error("ranking cancelled")]
    Cancelled,
}

impl RankingError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::DimensionMismatch { .. } | Self::Url(_) => {
                ErrorKind::Configuration
            }
            Self::InvalidQuery(_) => ErrorKind::Request,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Embedding(_)
            | Self::HttpClient(_)
            | Self::EmbeddingResponse(_)
            | Self::VectorIndex(_)
            | Self::Sqlite(_)
            | Self::TokioSqlite(_)
            | Self::Serialization(_) => ErrorKind::Collaborator,
        }
    }
}

/// Convenience result alias for ranking operations.
pub type RankingResult<T> = Result<T, RankingError>;
