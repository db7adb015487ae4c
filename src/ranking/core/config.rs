//! Configuration for the ranking service.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ranking::core::errors::{RankingError, RankingResult};
use crate::ranking::scoring::blend::{BlendWeights, GEO_DECAY_SIGMA_KM, TRAFFIC_MAX, TRAFFIC_MIN};

/// Tolerance when checking that the blend weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Bare SQL identifier, at most 63 bytes.
static COLLECTION_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$"));

/// Top-level configuration for the ranking service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RankingConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Vector index settings.
    pub index: IndexConfig,
    /// Blend weights and signal ranges.
    pub scoring: ScoringConfig,
    /// Candidate fetch and result count settings.
    pub retrieval: RetrievalConfig,
}

impl RankingConfig {
    /// Build a configuration from defaults overridden by environment variables.
    ///
    /// # Errors
    /// Returns an error if a numeric variable cannot be parsed or the
    /// embedding provider is unknown.
    pub fn from_env() -> RankingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a numeric variable cannot be parsed or the
    /// embedding provider is unknown.
    pub fn from_lookup<F>(lookup: F) -> RankingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.server.port = port;
        }
        if let Some(secs) = parse_var(&lookup, "SPOTRANK_REQUEST_TIMEOUT_SECS")? {
            config.server.request_timeout_secs = secs;
        }

        if let Some(provider) = lookup("SPOTRANK_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(ndims) = parse_var(&lookup, "SPOTRANK_EMBEDDING_DIMENSIONS")? {
            config.embedding.ndims = ndims;
        }
        config.embedding.api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        config.embedding.base_url = lookup("SPOTRANK_EMBEDDING_BASE_URL");

        if let Some(path) = lookup("SPOTRANK_SQLITE_PATH") {
            config.index.sqlite_path = PathBuf::from(path);
        }
        if let Some(collection) = lookup("SPOTRANK_COLLECTION") {
            config.index.collection = collection;
        }
        if let Some(dimension) = parse_var(&lookup, "SPOTRANK_INDEX_DIMENSIONS")? {
            config.index.dimension = dimension;
        }

        if let Some(top_k) = parse_var(&lookup, "SPOTRANK_DEFAULT_TOP_K")? {
            config.retrieval.default_top_k = top_k;
        }
        if let Some(pool) = parse_var(&lookup, "SPOTRANK_CANDIDATE_POOL")? {
            config.retrieval.candidate_pool = pool;
        }

        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range, missing or inconsistent.
    pub fn validate(&self) -> RankingResult<()> {
        if self.server.request_timeout_secs == 0 {
            return Err(RankingError::InvalidConfig(
                "server.request_timeout_secs must be > 0".to_string(),
            ));
        }

        self.embedding.validate()?;
        self.index.validate()?;
        self.scoring.validate()?;
        self.retrieval.validate()?;

        if self.embedding.ndims != self.index.dimension {
            return Err(RankingError::DimensionMismatch {
                expected: self.index.dimension,
                actual: self.embedding.ndims,
            });
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> RankingResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| RankingError::InvalidConfig(format!("{key} is not a valid number: {raw}")))
        })
        .transpose()
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 20,
        }
    }
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// `OpenAI` embeddings API.
    OpenAi,
    /// Local or remote Ollama runtime.
    Ollama,
}

impl FromStr for EmbeddingProvider {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(RankingError::InvalidConfig(format!(
                "unknown embedding provider: {other}"
            ))),
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider serves embeddings.
    pub provider: EmbeddingProvider,
    /// Embedding model name.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// API key, required for `OpenAI`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("ndims", &self.ndims)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            model: "text-embedding-3-small".to_string(),
            ndims: 1536,
            api_key: None,
            base_url: None,
        }
    }
}

impl EmbeddingConfig {
    fn validate(&self) -> RankingResult<()> {
        if self.model.trim().is_empty() {
            return Err(RankingError::InvalidConfig(
                "embedding.model must not be empty".to_string(),
            ));
        }

        if self.ndims == 0 {
            return Err(RankingError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if self.provider == EmbeddingProvider::OpenAi && self.api_key.is_none() {
            return Err(RankingError::InvalidConfig(
                "OPENAI_API_KEY is required for the openai embedding provider".to_string(),
            ));
        }

        if let Some(base_url) = &self.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Vector index settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Collection (table) holding spot vectors.
    pub collection: String,
    /// Dimensionality the collection is provisioned with.
    pub dimension: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("spots.sqlite"),
            collection: "semantic_spots".to_string(),
            dimension: 1536,
        }
    }
}

impl IndexConfig {
    fn validate(&self) -> RankingResult<()> {
        if self.dimension == 0 {
            return Err(RankingError::InvalidConfig(
                "index.dimension must be > 0".to_string(),
            ));
        }

        validate_collection_name(&self.collection)
    }
}

/// Check that a collection name is usable as a bare SQL identifier.
///
/// # Errors
/// Returns an error if the name contains anything besides ASCII letters,
/// digits and underscores, or starts with a digit.
pub fn validate_collection_name(name: &str) -> RankingResult<()> {
    let pattern = COLLECTION_NAME
        .as_ref()
        .map_err(|err| RankingError::InvalidConfig(format!("invalid regex: {err}")))?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(RankingError::InvalidConfig(format!(
            "collection name {name:?} must be a plain identifier"
        )))
    }
}

/// Blend weights and signal ranges.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Signal weights.
    pub weights: BlendWeights,
    /// Proximity decay constant in kilometers.
    pub geo_sigma_km: f64,
    /// Traffic value mapped to 0.
    pub traffic_min: f64,
    /// Traffic value mapped to 1.
    pub traffic_max: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: BlendWeights::default(),
            geo_sigma_km: GEO_DECAY_SIGMA_KM,
            traffic_min: TRAFFIC_MIN,
            traffic_max: TRAFFIC_MAX,
        }
    }
}

impl ScoringConfig {
    pub(crate) fn validate(&self) -> RankingResult<()> {
        let weights = [
            ("semantic", self.weights.semantic),
            ("geo", self.weights.geo),
            ("traffic", self.weights.traffic),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RankingError::InvalidConfig(format!(
                    "scoring.weights.{name} must be a finite non-negative number"
                )));
            }
        }

        if (self.weights.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RankingError::InvalidConfig(format!(
                "scoring.weights must sum to 1.0 (got {})",
                self.weights.total()
            )));
        }

        if !self.geo_sigma_km.is_finite() || self.geo_sigma_km <= 0.0 {
            return Err(RankingError::InvalidConfig(
                "scoring.geo_sigma_km must be > 0".to_string(),
            ));
        }

        if !self.traffic_min.is_finite()
            || !self.traffic_max.is_finite()
            || self.traffic_max <= self.traffic_min
        {
            return Err(RankingError::InvalidConfig(
                "scoring.traffic_max must be greater than scoring.traffic_min".to_string(),
            ));
        }

        Ok(())
    }
}

/// Candidate fetch and result count settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result count used when a request asks for fewer than one result.
    pub default_top_k: usize,
    /// Number of candidates fetched from the index for every query.
    pub candidate_pool: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 20,
            candidate_pool: 50,
        }
    }
}

impl RetrievalConfig {
    /// Resolve a caller-requested count to the number of results to return.
    ///
    /// Absent or non-positive requests fall back to `default_top_k`; larger
    /// requests are capped at `candidate_pool`.
    #[must_use]
    pub fn resolve_top_k(&self, requested: Option<i64>) -> usize {
        let resolved = match requested {
            Some(k) if k >= 1 => usize::try_from(k).unwrap_or(usize::MAX),
            _ => self.default_top_k,
        };
        resolved.min(self.candidate_pool)
    }

    pub(crate) fn validate(&self) -> RankingResult<()> {
        if self.default_top_k == 0 {
            return Err(RankingError::InvalidConfig(
                "retrieval.default_top_k must be > 0".to_string(),
            ));
        }

        if self.candidate_pool == 0 {
            return Err(RankingError::InvalidConfig(
                "retrieval.candidate_pool must be > 0".to_string(),
            ));
        }

        if self.default_top_k > self.candidate_pool {
            return Err(RankingError::InvalidConfig(
                "retrieval.default_top_k must not exceed retrieval.candidate_pool".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid_config() -> RankingConfig {
        let mut config = RankingConfig::default();
        config.embedding.api_key = Some("sk-test".to_string());
        config
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_validate_with_key() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = RankingConfig::default().validate().unwrap_err();
        assert!(matches!(err, RankingError::InvalidConfig(_)));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = RankingConfig::default();
        config.embedding.provider = EmbeddingProvider::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let mut config = valid_config();
        config.embedding.ndims = 768;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            RankingError::DimensionMismatch {
                expected: 1536,
                actual: 768
            }
        ));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = valid_config();
        config.scoring.weights = BlendWeights::new(0.5, 0.5, 0.5);
        assert!(config.validate().is_err());

        config.scoring.weights = BlendWeights::new(1.2, -0.1, -0.1);
        assert!(config.validate().is_err());

        config.scoring.weights = BlendWeights::new(0.6, 0.2, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_sigma_and_traffic_range() {
        let mut config = valid_config();
        config.scoring.geo_sigma_km = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.scoring.traffic_max = config.scoring.traffic_min;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_name_rules() {
        assert!(validate_collection_name("semantic_spots").is_ok());
        assert!(validate_collection_name("_spots2").is_ok());
        assert!(validate_collection_name("2spots").is_err());
        assert!(validate_collection_name("spots; DROP TABLE x").is_err());
        assert!(validate_collection_name("").is_err());
    }

    #[test]
    fn test_collection_pattern_compiles_once() {
        assert!(COLLECTION_NAME.as_ref().is_ok());
        let first: *const Regex = COLLECTION_NAME.as_ref().unwrap();
        assert!(validate_collection_name(&"a".repeat(63)).is_ok());
        assert!(validate_collection_name(&"a".repeat(64)).is_err());
        let second: *const Regex = COLLECTION_NAME.as_ref().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_retrieval_limits() {
        let mut config = valid_config();
        config.retrieval.default_top_k = 80;
        assert!(config.validate().is_err());

        config.retrieval.default_top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_top_k() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.resolve_top_k(None), 20);
        assert_eq!(retrieval.resolve_top_k(Some(0)), 20);
        assert_eq!(retrieval.resolve_top_k(Some(-3)), 20);
        assert_eq!(retrieval.resolve_top_k(Some(6)), 6);
        assert_eq!(retrieval.resolve_top_k(Some(500)), 50);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let lookup = lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("EMBEDDING_MODEL", "text-embedding-3-large"),
            ("SPOTRANK_EMBEDDING_DIMENSIONS", "3072"),
            ("SPOTRANK_INDEX_DIMENSIONS", "3072"),
            ("SPOTRANK_COLLECTION", "ads"),
            ("PORT", "9000"),
        ]);
        let config = RankingConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.embedding.ndims, 3072);
        assert_eq!(config.index.collection, "ads");
        assert_eq!(config.server.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let lookup = lookup_from(&[("PORT", "eighty")]);
        assert!(RankingConfig::from_lookup(lookup).is_err());

        let lookup = lookup_from(&[("SPOTRANK_EMBEDDING_PROVIDER", "cohere")]);
        assert!(RankingConfig::from_lookup(lookup).is_err());
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let lookup = lookup_from(&[("OPENAI_API_KEY", "   ")]);
        let config = RankingConfig::from_lookup(lookup).unwrap();
        assert!(config.embedding.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = valid_config();
        let rendered = format!("{:?}", config.embedding);
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("<redacted>"));
    }
}
