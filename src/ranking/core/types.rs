//! Request-scoped records flowing through the ranking pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ranking::scoring::geo::Coordinate;

/// Fixed-length embedding produced by the embedding provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Wrap raw components.
    #[must_use]
    pub const fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Narrow a provider's `f64` components to `f32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(values: &[f64]) -> Self {
        Self(values.iter().map(|v| *v as f32).collect())
    }

    /// Number of components.
    #[must_use]
    pub const fn dims(&self) -> usize {
        self.0.len()
    }

    /// Borrow the components.
    #[must_use]
    pub const fn as_slice(&self) -> &[f32] {
        self.0.as_slice()
    }

    /// Little-endian `f32` blob, the layout sqlite-vec reads.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Raw nearest-neighbor hit returned by the vector index.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
    /// Opaque spot identifier.
    pub id: String,
    /// Similarity to the query, higher is closer.
    pub score: f64,
    /// Untyped metadata stored alongside the vector.
    pub payload: Value,
}

/// Typed view of a spot's metadata payload.
///
/// Every field is optional; unknown keys are ignored, wrongly typed keys
/// are an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotMetadata {
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category tags.
    #[serde(default)]
    pub category_tags: Option<Vec<String>>,
    /// Spot latitude in degrees.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Spot longitude in degrees.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Precomputed traffic estimate (impressions/day).
    #[serde(default, rename = "precomputed_traffic")]
    pub traffic_estimate: Option<f64>,
    /// Free-form confidence label for the traffic estimate.
    #[serde(default)]
    pub traffic_confidence: Option<String>,
}

impl SpotMetadata {
    /// Spot coordinate, when both halves are present.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.lat, self.lon)
    }
}

/// A scored spot ready to be returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedResult {
    /// Spot identifier.
    pub id: String,
    /// Display title.
    pub title: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Category tags.
    pub category_tags: Vec<String>,
    /// Spot coordinate.
    pub coordinate: Option<Coordinate>,
    /// Distance from the user; absent if either location is unknown.
    pub distance_km: Option<f64>,
    /// Raw similarity from the vector index.
    pub semantic_score: f64,
    /// Precomputed traffic estimate.
    pub traffic_estimate: Option<f64>,
    /// Traffic confidence label.
    pub traffic_confidence: Option<String>,
    /// Proximity decay term, 0 when distance is absent.
    pub geo_score: f64,
    /// Traffic normalized into `[0, 1]`.
    pub traffic_score: f64,
    /// Blended ranking score.
    pub final_score: f64,
}

/// A ranking request.
#[derive(Clone, Debug, PartialEq)]
pub struct RankQuery {
    /// Free-text query.
    pub text: String,
    /// Optional user location.
    pub location: Option<Coordinate>,
    /// Requested result count; absent or non-positive means "use the default".
    pub top_k: Option<i64>,
}

impl RankQuery {
    /// Create a query with no location and the default result count.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
            top_k: None,
        }
    }

    /// Set the user location.
    #[must_use]
    pub const fn with_location(mut self, location: Coordinate) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the requested result count.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Result of one ranking call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankOutcome {
    /// Results ordered by final score, descending.
    pub results: Vec<RankedResult>,
    /// Number of hits the vector index returned.
    pub candidates: usize,
    /// Hits dropped because their metadata was malformed.
    pub dropped: usize,
}
