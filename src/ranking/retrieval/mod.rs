//! Candidate assembly and the ranking pipeline.

pub mod assembler;
pub mod pipeline;

pub use assembler::{AssemblyError, CandidateAssembler};
pub use pipeline::{RankingBackends, RankingPipeline};
