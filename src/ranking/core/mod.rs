//! Core ranking types: configuration, errors and request records.

pub mod config;
pub mod errors;
pub mod types;

pub use config::{
    EmbeddingConfig, EmbeddingProvider, IndexConfig, RankingConfig, RetrievalConfig,
    ScoringConfig, ServerConfig, validate_collection_name,
};
pub use errors::{ErrorKind, RankingError, RankingResult};
pub use types::{EmbeddingVector, RankOutcome, RankQuery, RankedResult, SpotMetadata, VectorHit};
