//! Embedding provider modules.

pub mod embedder;

pub use embedder::{EmbedFuture, Embedder, RigEmbedder, build_embedder, embed_one};
