//! Engine configuration.
//!
//! Every heuristic constant used by the resolver and scorer lives here so it
//! can be tuned without touching the algorithms. Everything has a default
//! matching the behaviour the platform shipped with.

use crate::error::{Result, SearchError};
use crate::model::SourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ============================================================================
// Default Values
// ============================================================================

/// Default per-source timeout in milliseconds
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 30_000;

/// Default duplicate threshold for the weighted similarity
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.85;

/// Default relative tolerance for price and area comparison
pub const DEFAULT_TOLERANCE: f64 = 0.10;

/// Default page size
pub const DEFAULT_PER_PAGE: usize = 20;

/// Score at or above which a result is highlighted
pub const DEFAULT_HIGHLIGHT_THRESHOLD: f64 = 80.0;

// ============================================================================
// Aggregator
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Per-source timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Run the entity resolver over combined results (default: true)
    #[serde(default = "default_true")]
    pub deduplicate: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            deduplicate: true,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Relative weight of each similarity signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub location: f64,
    pub price: f64,
    pub area: f64,
    pub characteristics: f64,
    pub images: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            location: 0.35,
            price: 0.30,
            area: 0.15,
            characteristics: 0.15,
            images: 0.05,
        }
    }
}

impl SimilarityWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.location,
            self.price,
            self.area,
            self.characteristics,
            self.images,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Weighted similarity at or above which two records are duplicates
    pub threshold: f64,
    /// Relative price difference at which the price signal reaches zero
    pub price_tolerance: f64,
    /// Relative area difference at which the area signal reaches zero
    pub area_tolerance: f64,
    pub weights: SimilarityWeights,
    /// Compare perceptual image hashes (off by default)
    pub use_image_hashes: bool,
    /// Geohash prefix length that counts as the same spot
    pub geohash_precision: usize,
    /// Distance in metres treated as the same building
    pub near_distance_m: f64,
    /// Distance in metres that still earns partial location credit
    pub partial_distance_m: f64,
    /// Location credit for a pair inside `partial_distance_m`
    pub partial_distance_score: f64,
    /// Characteristic agreement a same-address pair needs before price and
    /// area alone can mark it a duplicate (units in one building differ here)
    pub same_address_min_characteristics: f64,
    /// Duplicate count at which group confidence saturates
    pub max_group_duplicates: usize,
    /// Distinct portal count at which group confidence saturates
    pub max_group_portals: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
            price_tolerance: DEFAULT_TOLERANCE,
            area_tolerance: DEFAULT_TOLERANCE,
            weights: SimilarityWeights::default(),
            use_image_hashes: false,
            geohash_precision: 7,
            near_distance_m: 100.0,
            partial_distance_m: 500.0,
            partial_distance_score: 0.6,
            same_address_min_characteristics: 0.7,
            max_group_duplicates: 5,
            max_group_portals: 4,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SearchError::Config(
                "resolver.threshold must be in (0, 1]".into(),
            ));
        }
        if self.price_tolerance <= 0.0 || self.area_tolerance <= 0.0 {
            return Err(SearchError::Config(
                "resolver tolerances must be greater than 0".into(),
            ));
        }
        let weights = self.weights.as_array();
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(SearchError::Config(
                "resolver weights must be non-negative and not all zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.same_address_min_characteristics) {
            return Err(SearchError::Config(
                "resolver.same_address_min_characteristics must be in [0, 1]".into(),
            ));
        }
        if self.near_distance_m > self.partial_distance_m {
            return Err(SearchError::Config(
                "resolver.near_distance_m must be <= partial_distance_m".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Scoring
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub compatibility_weight: f64,
    pub behavior_weight: f64,
    pub temporal_weight: f64,
    /// Points per compatibility criterion (type, location, price, area)
    pub criterion_points: f64,
    /// Multiplier on the relative distance outside a price/area range
    pub range_penalty_factor: f64,
    /// Fraction of a criterion's maximum needed to be listed as a reason
    pub reason_threshold: f64,
    /// Listings first seen within this many days get full recency
    pub fresh_days: i64,
    /// Listings first seen within this many days get half recency
    pub recent_days: i64,
    /// Price cuts within this many days count as urgent
    pub price_cut_days: i64,
    /// District → months (1-12) of regional high season
    pub high_season: HashMap<String, Vec<u32>>,
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut high_season = HashMap::new();
        high_season.insert("faro".to_string(), vec![5, 6, 7, 8, 9]);
        high_season.insert("madeira".to_string(), vec![6, 7, 8, 12]);
        high_season.insert("açores".to_string(), vec![6, 7, 8]);
        high_season.insert("setúbal".to_string(), vec![6, 7, 8]);
        high_season.insert("lisboa".to_string(), vec![4, 5, 6, 9, 10]);
        high_season.insert("porto".to_string(), vec![4, 5, 6, 9, 10]);

        Self {
            compatibility_weight: 0.4,
            behavior_weight: 0.3,
            temporal_weight: 0.3,
            criterion_points: 25.0,
            range_penalty_factor: 1.0,
            reason_threshold: 0.8,
            fresh_days: 7,
            recent_days: 30,
            price_cut_days: 30,
            high_season,
            cache_capacity: 10_000,
            cache_ttl_secs: 300,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.compatibility_weight,
            self.behavior_weight,
            self.temporal_weight,
        ];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(SearchError::Config(
                "scoring weights must be non-negative and not all zero".into(),
            ));
        }
        if self.criterion_points <= 0.0 {
            return Err(SearchError::Config(
                "scoring.criterion_points must be greater than 0".into(),
            ));
        }
        if self.fresh_days > self.recent_days {
            return Err(SearchError::Config(
                "scoring.fresh_days must be <= recent_days".into(),
            ));
        }
        Ok(())
    }

    /// Whether `month` is high season for the district (case-insensitive).
    pub fn is_high_season(&self, district: &str, month: u32) -> bool {
        let key = district.trim().to_lowercase();
        self.high_season
            .get(&key)
            .map(|months| months.contains(&month))
            .unwrap_or(false)
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub per_page: usize,
    pub highlight_threshold: f64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            highlight_threshold: DEFAULT_HIGHLIGHT_THRESHOLD,
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

/// One upstream feed reachable over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    #[serde(default)]
    pub source_type: SourceType,

    /// Search endpoint; the translated filters are POSTed here as JSON
    pub endpoint: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Generic filter key → this source's key (e.g. `min_price` → `precoMin`)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vocabulary: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Environment variable holding a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, source_type: SourceType, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type,
            endpoint: endpoint.into(),
            enabled: true,
            vocabulary: HashMap::new(),
            headers: HashMap::new(),
            api_key_env: None,
        }
    }
}

// ============================================================================
// EngineConfig
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub search: SearchDefaults,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.aggregator.timeout_ms == 0 {
            return Err(SearchError::Config(
                "aggregator.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.search.per_page == 0 {
            return Err(SearchError::Config(
                "search.per_page must be greater than 0".into(),
            ));
        }
        self.resolver.validate()?;
        self.scoring.validate()?;

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(SearchError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            url::Url::parse(&source.endpoint).map_err(|e| {
                SearchError::Config(format!("source '{}' endpoint: {}", source.name, e))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// ConfigStore
// ============================================================================

/// YAML-backed configuration file at `~/.config/propmatch/config.yaml`.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new_default() -> Self {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("propmatch").join("config.yaml"),
        }
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the config, falling back to defaults when the file is missing.
    ///
    /// A file that exists but does not parse or validate is an error.
    pub fn load(&self) -> Result<EngineConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(EngineConfig::default())
            }
            Err(e) => return Err(e.into()),
        };
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(config)?)?;
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new_default()
    }
}
