//! Spot ranking: embeddings, vector search and score blending.

pub mod core;
pub mod embedding;
pub mod retrieval;
pub mod scoring;
pub mod storage;

#[cfg(test)]
#[allow(clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub(crate) mod testing;

pub use core::{
    ErrorKind, RankOutcome, RankQuery, RankedResult, RankingConfig, RankingError, RankingResult,
};
pub use retrieval::{RankingBackends, RankingPipeline};
pub use scoring::Coordinate;
