//! Vector index integration using `SQLite` + sqlite-vec.

use std::future::Future;
use std::pin::Pin;

use rusqlite::OptionalExtension;
use serde_json::Value;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::ranking::core::config::{IndexConfig, validate_collection_name};
use crate::ranking::core::errors::{RankingError, RankingResult};
use crate::ranking::core::types::{EmbeddingVector, VectorHit};
use crate::ranking::storage::sqlite_vec_loader::init_sqlite_vec_extension;

/// Boxed future type for vector index operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Table recording the dimension each collection was provisioned with.
const REGISTRY_TABLE: &str = "spotrank_collections";

/// Nearest-neighbor index over spot vectors.
pub trait VectorIndex: Send + Sync {
    /// Provision a collection if it does not exist yet.
    ///
    /// # Errors
    /// Returns [`RankingError::DimensionMismatch`] if the collection already
    /// exists with another dimension, or an error if storage access fails.
    fn ensure_collection(&self, name: &str, dimension: usize) -> StoreFuture<'_, RankingResult<()>>;
    /// Insert or overwrite one entry.
    ///
    /// # Errors
    /// Returns an error if the vector has the wrong length or storage fails.
    fn upsert(
        &self,
        id: &str,
        vector: EmbeddingVector,
        metadata: Value,
    ) -> StoreFuture<'_, RankingResult<()>>;
    /// Return up to `top_k` nearest entries, most similar first.
    ///
    /// # Errors
    /// Returns an error if the vector has the wrong length or the query fails.
    fn search(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> StoreFuture<'_, RankingResult<Vec<VectorHit>>>;
    /// Dimensionality of the searched collection.
    fn dimension(&self) -> usize;
}

/// SQLite-backed vector index scoring by cosine similarity.
pub struct SqliteVectorIndex {
    conn: Connection,
    collection: String,
    dimension: usize,
}

impl SqliteVectorIndex {
    /// Open the database file named in `config`.
    ///
    /// The collection is not created here; call
    /// [`VectorIndex::ensure_collection`] before serving.
    ///
    /// # Errors
    /// Returns an error if the collection name is invalid or the database
    /// cannot be opened.
    pub async fn open(config: &IndexConfig) -> RankingResult<Self> {
        validate_collection_name(&config.collection)?;
        init_sqlite_vec_extension();
        let conn = Connection::open(&config.sqlite_path).await?;
        Ok(Self {
            conn,
            collection: config.collection.clone(),
            dimension: config.dimension,
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the collection name is invalid or the database
    /// cannot be opened.
    pub async fn open_in_memory(collection: &str, dimension: usize) -> RankingResult<Self> {
        validate_collection_name(collection)?;
        init_sqlite_vec_extension();
        let conn = Connection::open_in_memory().await?;
        Ok(Self {
            conn,
            collection: collection.to_string(),
            dimension,
        })
    }

    const fn check_dims(&self, actual: usize) -> RankingResult<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(RankingError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }
}

fn parse_payload(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

impl VectorIndex for SqliteVectorIndex {
    fn ensure_collection(&self, name: &str, dimension: usize) -> StoreFuture<'_, RankingResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            validate_collection_name(&name)?;
            if name != self.collection {
                return Err(RankingError::InvalidConfig(format!(
                    "collection `{name}` is not the searched collection `{}`",
                    self.collection
                )));
            }
            self.check_dims(dimension)?;
            let dim = i64::try_from(dimension).map_err(|_| {
                RankingError::InvalidConfig(format!("dimension {dimension} is too large"))
            })?;

            let table = name.clone();
            let existing = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute_batch(&format!(
                        "CREATE TABLE IF NOT EXISTS {REGISTRY_TABLE} (
                            name TEXT PRIMARY KEY,
                            dimension INTEGER NOT NULL
                        )"
                    ))?;
                    let existing: Option<i64> = tx
                        .query_row(
                            &format!("SELECT dimension FROM {REGISTRY_TABLE} WHERE name = ?1"),
                            rusqlite::params![table],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if existing.is_none() {
                        tx.execute(
                            &format!(
                                "INSERT INTO {REGISTRY_TABLE} (name, dimension) VALUES (?1, ?2)"
                            ),
                            rusqlite::params![table, dim],
                        )?;
                        tx.execute_batch(&format!(
                            "CREATE TABLE IF NOT EXISTS {table} (
                                id TEXT PRIMARY KEY,
                                payload_json TEXT NOT NULL,
                                embedding BLOB NOT NULL
                            )"
                        ))?;
                    }
                    tx.commit()?;
                    Ok(existing)
                })
                .await?;

            match existing {
                Some(stored) if stored != dim => Err(RankingError::DimensionMismatch {
                    expected: usize::try_from(stored).unwrap_or_default(),
                    actual: dimension,
                }),
                Some(_) => {
                    debug!(collection = %name, dimension, "collection already provisioned");
                    Ok(())
                }
                None => {
                    info!(collection = %name, dimension, "created vector collection");
                    Ok(())
                }
            }
        })
    }

    fn upsert(
        &self,
        id: &str,
        vector: EmbeddingVector,
        metadata: Value,
    ) -> StoreFuture<'_, RankingResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            self.check_dims(vector.dims())?;
            let payload_json = serde_json::to_string(&metadata)?;
            let blob = vector.to_le_bytes();
            let table = self.collection.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, payload_json, embedding) VALUES (?1, ?2, ?3)
                             ON CONFLICT(id) DO UPDATE SET
                                payload_json = excluded.payload_json,
                                embedding = excluded.embedding"
                        ),
                        rusqlite::params![id, payload_json, blob],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn search(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> StoreFuture<'_, RankingResult<Vec<VectorHit>>> {
        let dims = vector.dims();
        let blob = vector.to_le_bytes();
        Box::pin(async move {
            self.check_dims(dims)?;
            if top_k == 0 {
                return Ok(Vec::new());
            }

            let limit = i64::try_from(top_k).unwrap_or(i64::MAX);
            let table = self.collection.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, payload_json, vec_distance_cosine(embedding, ?1) AS distance
                         FROM {table}
                         ORDER BY distance IS NULL, distance ASC, rowid ASC
                         LIMIT ?2"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![blob, limit], |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, Option<f64>>(2)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            Ok(rows
                .into_iter()
                .map(|(id, raw, distance)| VectorHit {
                    id,
                    // Degenerate vectors have no cosine distance.
                    score: distance.map_or(f64::NAN, |d| 1.0 - d),
                    payload: parse_payload(raw),
                })
                .collect())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn provisioned() -> SqliteVectorIndex {
        let index = SqliteVectorIndex::open_in_memory("spots", 3).await.unwrap();
        index.ensure_collection("spots", 3).await.unwrap();
        index
    }

    fn vector(values: [f32; 3]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec())
    }

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let index = provisioned().await;
        assert!(index.ensure_collection("spots", 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_collection_dimension_mismatch() {
        let index = provisioned().await;
        let err = index.ensure_collection("spots", 1536).await.unwrap_err();
        assert!(matches!(
            err,
            RankingError::DimensionMismatch {
                expected: 3,
                actual: 1536
            }
        ));
    }

    #[tokio::test]
    async fn test_ensure_collection_rejects_bad_name() {
        let index = provisioned().await;
        assert!(index.ensure_collection("bad name", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_collection_rejects_other_collection() {
        let index = provisioned().await;
        assert!(matches!(
            index.ensure_collection("other_spots", 3).await,
            Err(RankingError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_dimension_survives_reopen() {
        let path = std::env::temp_dir().join(format!("spotrank-{}.sqlite", uuid::Uuid::new_v4()));
        let config = IndexConfig {
            sqlite_path: path.clone(),
            collection: "spots".to_string(),
            dimension: 3,
        };
        let first = SqliteVectorIndex::open(&config).await.unwrap();
        first.ensure_collection("spots", 3).await.unwrap();
        drop(first);

        let reopened = SqliteVectorIndex::open(&IndexConfig {
            dimension: 4,
            ..config
        })
        .await
        .unwrap();
        let err = reopened.ensure_collection("spots", 4).await.unwrap_err();
        assert!(matches!(
            err,
            RankingError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));
        drop(reopened);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = provisioned().await;
        index
            .upsert("east", vector([1.0, 0.0, 0.0]), json!({ "title": "East" }))
            .await
            .unwrap();
        index
            .upsert("north", vector([0.0, 1.0, 0.0]), json!({ "title": "North" }))
            .await
            .unwrap();
        index
            .upsert("diagonal", vector([0.7, 0.7, 0.0]), json!({ "title": "Diagonal" }))
            .await
            .unwrap();

        let hits = index.search(&vector([1.0, 0.0, 0.0]), 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "diagonal", "north"]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!((hits[1].score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!(hits[2].score.abs() < 1e-5);
        assert_eq!(hits[0].payload, json!({ "title": "East" }));
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let index = provisioned().await;
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f32 + 1.0;
            index
                .upsert(id, vector([x, 1.0, 0.0]), json!({}))
                .await
                .unwrap();
        }
        assert_eq!(index.search(&vector([1.0, 1.0, 0.0]), 2).await.unwrap().len(), 2);
        assert_eq!(index.search(&vector([1.0, 1.0, 0.0]), 10).await.unwrap().len(), 4);
        assert!(index.search(&vector([1.0, 1.0, 0.0]), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = provisioned().await;
        index
            .upsert("spot", vector([1.0, 0.0, 0.0]), json!({ "title": "Old" }))
            .await
            .unwrap();
        index
            .upsert("spot", vector([0.0, 1.0, 0.0]), json!({ "title": "New" }))
            .await
            .unwrap();

        let hits = index.search(&vector([0.0, 1.0, 0.0]), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, json!({ "title": "New" }));
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let index = provisioned().await;
        let short = EmbeddingVector::new(vec![1.0, 0.0]);
        assert!(matches!(
            index.upsert("x", short.clone(), json!({})).await,
            Err(RankingError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&short, 5).await,
            Err(RankingError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unparsable_payload_surfaces_as_string() {
        let index = provisioned().await;
        let blob = vector([1.0, 0.0, 0.0]).to_le_bytes();
        index
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO spots (id, payload_json, embedding) VALUES (?1, ?2, ?3)",
                    rusqlite::params!["broken", "{not json", blob],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let hits = index.search(&vector([1.0, 0.0, 0.0]), 1).await.unwrap();
        assert_eq!(hits[0].payload, Value::String("{not json".to_string()));
    }

    #[tokio::test]
    async fn test_zero_vector_row_does_not_fail_search() {
        let index = provisioned().await;
        index
            .upsert("zero", vector([0.0, 0.0, 0.0]), json!({ "title": "Zero" }))
            .await
            .unwrap();
        index
            .upsert("good", vector([1.0, 0.0, 0.0]), json!({ "title": "Good" }))
            .await
            .unwrap();

        let hits = index.search(&vector([1.0, 0.0, 0.0]), 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "zero"]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits[1].score.is_nan());
    }
}
