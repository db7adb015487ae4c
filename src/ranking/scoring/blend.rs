//! Normalization and weighted blending of the ranking signals.
//!
//! The final score is `w_sem * semantic + w_geo * geo + w_traffic * traffic`.
//! When a spot's distance is unknown its geo term is 0 and the remaining
//! weights are left as they are, so such a spot scores as if it were
//! infinitely far away.

use serde::{Deserialize, Serialize};

/// Weight of the semantic similarity signal.
pub const SEMANTIC_WEIGHT: f64 = 0.5;
/// Weight of the geographic proximity signal.
pub const GEO_WEIGHT: f64 = 0.25;
/// Weight of the normalized traffic signal.
pub const TRAFFIC_WEIGHT: f64 = 0.25;
/// Distance in kilometers over which proximity decays by a factor of `e`.
pub const GEO_DECAY_SIGMA_KM: f64 = 5.0;
/// Lower bound of the traffic domain (impressions/day).
pub const TRAFFIC_MIN: f64 = 0.0;
/// Upper bound of the traffic domain (impressions/day).
pub const TRAFFIC_MAX: f64 = 10_000.0;

/// Blend weights for the three signals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Semantic similarity weight.
    pub semantic: f64,
    /// Geographic proximity weight.
    pub geo: f64,
    /// Traffic weight.
    pub traffic: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self::new(SEMANTIC_WEIGHT, GEO_WEIGHT, TRAFFIC_WEIGHT)
    }
}

impl BlendWeights {
    /// Create a weight set.
    #[must_use]
    pub const fn new(semantic: f64, geo: f64, traffic: f64) -> Self {
        Self {
            semantic,
            geo,
            traffic,
        }
    }

    /// Sum of all weights.
    #[must_use]
    pub const fn total(&self) -> f64 {
        self.semantic + self.geo + self.traffic
    }
}

/// Clamp `value` into `[min, max]` and rescale it to `[0, 1]`.
///
/// Absent values and empty or non-finite ranges yield 0.
#[must_use]
pub const fn normalize(value: Option<f64>, min: f64, max: f64) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return 0.0;
    }
    (value.clamp(min, max) - min) / range
}

/// Exponential proximity decay `exp(-distance / sigma)`.
///
/// Distance 0 gives exactly 1.0. The result stays inside `(0, 1]`: very
/// large distances bottom out at the smallest positive `f64` instead of
/// underflowing to zero.
#[must_use]
pub fn geo_decay(distance_km: f64, sigma_km: f64) -> f64 {
    (-(distance_km / sigma_km))
        .exp()
        .clamp(f64::MIN_POSITIVE, 1.0)
}

/// Weighted sum of the three signals.
#[must_use]
pub fn final_score(semantic: f64, geo: f64, traffic_norm: f64, weights: &BlendWeights) -> f64 {
    weights.traffic.mul_add(
        traffic_norm,
        weights.geo.mul_add(geo, weights.semantic * semantic),
    )
}
