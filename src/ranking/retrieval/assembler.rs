//! Turns raw index hits into scored results.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::ranking::core::config::ScoringConfig;
use crate::ranking::core::types::{RankedResult, SpotMetadata, VectorHit};
use crate::ranking::scoring::blend::{BlendWeights, final_score, geo_decay, normalize};
use crate::ranking::scoring::geo::Coordinate;

/// Why a single hit could not be assembled.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Payload is not an object or a field has the wrong type.
    #[error("malformed metadata payload: {0}")]
    MalformedPayload(String),
    /// Index returned NaN or an infinite similarity.
    #[error("non-finite similarity score: {0}")]
    NonFiniteScore(f64),
}

/// Scores hits against an optional user location.
#[derive(Clone, Debug)]
pub struct CandidateAssembler {
    weights: BlendWeights,
    geo_sigma_km: f64,
    traffic_min: f64,
    traffic_max: f64,
}

impl Default for CandidateAssembler {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl CandidateAssembler {
    /// Create an assembler from scoring settings.
    #[must_use]
    pub const fn new(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights,
            geo_sigma_km: config.geo_sigma_km,
            traffic_min: config.traffic_min,
            traffic_max: config.traffic_max,
        }
    }

    /// Assemble one hit.
    ///
    /// Missing metadata fields become absent values. Distance is only
    /// computed when both the user and the spot have a coordinate.
    ///
    /// # Errors
    /// Returns an error if the payload is malformed or the score is not finite.
    pub fn assemble(
        &self,
        hit: VectorHit,
        user: Option<Coordinate>,
    ) -> Result<RankedResult, AssemblyError> {
        if !hit.score.is_finite() {
            return Err(AssemblyError::NonFiniteScore(hit.score));
        }

        let metadata = parse_metadata(hit.payload)?;
        let coordinate = metadata.coordinate();
        if coordinate.is_none() && metadata.lat.is_some() != metadata.lon.is_some() {
            debug!(candidate_id = %hit.id, "spot has half a coordinate, treating location as unknown");
        }

        let distance_km = match (user, coordinate) {
            (Some(origin), Some(spot)) => Some(origin.distance_km(&spot)),
            _ => None,
        };
        let geo_score = distance_km.map_or(0.0, |km| geo_decay(km, self.geo_sigma_km));
        let traffic_score = normalize(metadata.traffic_estimate, self.traffic_min, self.traffic_max);
        let score = final_score(hit.score, geo_score, traffic_score, &self.weights);

        Ok(RankedResult {
            id: hit.id,
            title: metadata.title,
            description: metadata.description,
            category_tags: metadata.category_tags.unwrap_or_default(),
            coordinate,
            distance_km,
            semantic_score: hit.score,
            traffic_estimate: metadata.traffic_estimate,
            traffic_confidence: metadata.traffic_confidence,
            geo_score,
            traffic_score,
            final_score: score,
        })
    }
}

fn parse_metadata(payload: Value) -> Result<SpotMetadata, AssemblyError> {
    match payload {
        Value::Null => Ok(SpotMetadata::default()),
        Value::Object(map) => serde_json::from_value(Value::Object(map))
            .map_err(|err| AssemblyError::MalformedPayload(err.to_string())),
        Value::Bool(_) => Err(AssemblyError::MalformedPayload("expected an object, got a boolean".to_string())),
        Value::Number(_) => Err(AssemblyError::MalformedPayload("expected an object, got a number".to_string())),
        Value::String(_) => Err(AssemblyError::MalformedPayload("expected an object, got a string".to_string())),
        Value::Array(_) => Err(AssemblyError::MalformedPayload("expected an object, got an array".to_string())),
    }
}
