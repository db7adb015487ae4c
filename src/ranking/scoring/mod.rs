//! Pure scoring primitives: distance and signal blending.

pub mod blend;
pub mod geo;

pub use blend::{
    BlendWeights, GEO_DECAY_SIGMA_KM, GEO_WEIGHT, SEMANTIC_WEIGHT, TRAFFIC_MAX, TRAFFIC_MIN,
    TRAFFIC_WEIGHT, final_score, geo_decay, normalize,
};
pub use geo::{Coordinate, EARTH_RADIUS_KM, haversine_km};
