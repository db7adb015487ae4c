//! Vector index storage.

pub mod sqlite_vec_loader;
pub mod vector_index;

pub use sqlite_vec_loader::init_sqlite_vec_extension;
pub use vector_index::{SqliteVectorIndex, StoreFuture, VectorIndex};
