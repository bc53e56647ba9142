//! Relevance scoring for property records.
//!
//! `final = 0.4 × compatibility + 0.3 × behavior + 0.3 × temporal`, each
//! sub-score clamped to [0, 100] before weighting. Mode-specific extras
//! (prospecting vs. sale matching) are reported separately as
//! `mode_score` and never enter the final score.
//!
//! Scoring is a pure function of the record and the context. The optional
//! [`ScoreCache`] only ever saves recomputation.

mod behavior;
mod cache;
mod compatibility;
mod mode;
mod temporal;

pub use cache::{ScoreCache, ScoreKey};

use crate::config::ScoringConfig;
use crate::model::{DataQuality, PropertyRecord, PropertyType};
use crate::utils::{clamp_score, normalize_text};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Caller intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Acquisition: fresh, multi-portal, under-priced listings
    #[default]
    Prospecting,
    /// Matching a buyer: listings that are likely still available
    SaleMatching,
}

impl ScoringMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "prospecting" | "acquisition" => Some(ScoringMode::Prospecting),
            "sale_matching" | "sale" | "matching" => Some(ScoringMode::SaleMatching),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Prospecting => "prospecting",
            ScoringMode::SaleMatching => "sale_matching",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter hints the compatibility sub-score is measured against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringHints {
    pub property_types: Vec<PropertyType>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub parish: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
}

impl ScoringHints {
    pub fn has_location(&self) -> bool {
        self.district.is_some() || self.municipality.is_some() || self.parish.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Favorite,
    Contact,
    Dismiss,
}

impl InteractionKind {
    fn weight(&self) -> f64 {
        match self {
            InteractionKind::View => 1.0,
            InteractionKind::Favorite => 3.0,
            InteractionKind::Contact => 4.0,
            InteractionKind::Dismiss => -3.0,
        }
    }
}

/// One past interaction of the user with a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub property_id: String,
    pub kind: InteractionKind,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub district: Option<String>,
}

/// A search the user ran recently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentSearch {
    pub district: Option<String>,
    pub property_type: Option<PropertyType>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSignals {
    pub interactions: Vec<Interaction>,
    pub recent_searches: Vec<RecentSearch>,
    /// District, municipality or parish names
    pub favorite_locations: Vec<String>,
    pub favorite_types: Vec<PropertyType>,
}

impl UserSignals {
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
            && self.recent_searches.is_empty()
            && self.favorite_locations.is_empty()
            && self.favorite_types.is_empty()
    }
}

/// Median price per m² by district, the reference for the below-market bonus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    median_price_per_m2: BTreeMap<String, f64>,
}

impl MarketSnapshot {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PropertyRecord>) -> Self {
        let mut by_district: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for record in records {
            if let (Some(district), Some(ppm2)) =
                (record.location.district.as_deref(), record.price_per_m2())
            {
                let key = normalize_text(district);
                if !key.is_empty() {
                    by_district.entry(key).or_default().push(ppm2);
                }
            }
        }

        let median_price_per_m2 = by_district
            .into_iter()
            .map(|(district, mut values)| {
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                let median = if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                };
                (district, median)
            })
            .collect();
        Self { median_price_per_m2 }
    }

    pub fn insert(&mut self, district: &str, median: f64) {
        self.median_price_per_m2
            .insert(normalize_text(district), median);
    }

    pub fn median_for(&self, district: &str) -> Option<f64> {
        self.median_price_per_m2
            .get(&normalize_text(district))
            .copied()
            .filter(|m| *m > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.median_price_per_m2.is_empty()
    }
}

/// Everything a score depends on besides the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringContext {
    #[serde(default)]
    pub mode: ScoringMode,
    #[serde(default)]
    pub hints: ScoringHints,
    #[serde(default)]
    pub signals: UserSignals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub market: MarketSnapshot,
    /// Reference instant for every age computation
    #[serde(skip, default = "Utc::now")]
    pub now: DateTime<Utc>,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self::new(ScoringMode::default())
    }
}

impl ScoringContext {
    pub fn new(mode: ScoringMode) -> Self {
        Self {
            mode,
            hints: ScoringHints::default(),
            signals: UserSignals::default(),
            user_id: None,
            market: MarketSnapshot::default(),
            now: Utc::now(),
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_hints(mut self, hints: ScoringHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_signals(mut self, signals: UserSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_market(mut self, market: MarketSnapshot) -> Self {
        self.market = market;
        self
    }
}

/// Explanation label for a score. Declaration order is the display
/// priority: compatibility, then behavior, temporal and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    TypeMatch,
    LocationMatch,
    PriceInRange,
    AreaInRange,
    InteractionHistory,
    SearchPattern,
    PreferenceMatch,
    NewListing,
    RecentPriceCut,
    HighSeason,
    MultiPortal,
    BelowMarket,
    LikelyAvailable,
    RecentlyUpdated,
}

impl ScoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreReason::TypeMatch => "type_match",
            ScoreReason::LocationMatch => "location_match",
            ScoreReason::PriceInRange => "price_in_range",
            ScoreReason::AreaInRange => "area_in_range",
            ScoreReason::InteractionHistory => "interaction_history",
            ScoreReason::SearchPattern => "search_pattern",
            ScoreReason::PreferenceMatch => "preference_match",
            ScoreReason::NewListing => "new_listing",
            ScoreReason::RecentPriceCut => "recent_price_cut",
            ScoreReason::HighSeason => "high_season",
            ScoreReason::MultiPortal => "multi_portal",
            ScoreReason::BelowMarket => "below_market",
            ScoreReason::LikelyAvailable => "likely_available",
            ScoreReason::RecentlyUpdated => "recently_updated",
        }
    }

    /// 0 compatibility, 1 behavior, 2 temporal, 3 mode
    pub fn category(&self) -> u8 {
        match self {
            ScoreReason::TypeMatch
            | ScoreReason::LocationMatch
            | ScoreReason::PriceInRange
            | ScoreReason::AreaInRange => 0,
            ScoreReason::InteractionHistory
            | ScoreReason::SearchPattern
            | ScoreReason::PreferenceMatch => 1,
            ScoreReason::NewListing | ScoreReason::RecentPriceCut | ScoreReason::HighSeason => 2,
            ScoreReason::MultiPortal
            | ScoreReason::BelowMarket
            | ScoreReason::LikelyAvailable
            | ScoreReason::RecentlyUpdated => 3,
        }
    }
}

impl fmt::Display for ScoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyScore {
    pub final_score: f64,
    pub compatibility: f64,
    pub behavior: f64,
    pub temporal: f64,
    /// Prospecting or sale-matching extras, 0-100, outside `final_score`
    pub mode_score: f64,
    /// At most three, most material first
    pub reasons: Vec<ScoreReason>,
    pub confidence: f64,
}

impl PropertyScore {
    /// Score used when scoring is disabled: every component at midpoint.
    pub fn neutral() -> Self {
        Self {
            final_score: 50.0,
            compatibility: 50.0,
            behavior: 50.0,
            temporal: 50.0,
            mode_score: 50.0,
            reasons: Vec::new(),
            confidence: 0.5,
        }
    }
}

/// A criterion that earned enough of its points to explain the score.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReasonCandidate {
    pub reason: ScoreReason,
    /// Fraction of the criterion's maximum that was earned
    pub ratio: f64,
}

/// Points earned by one sub-score plus its reason candidates.
#[derive(Debug, Clone, Default)]
pub(crate) struct Component {
    pub points: f64,
    pub candidates: Vec<ReasonCandidate>,
}

impl Component {
    /// Record a criterion, nominating it as a reason when it was actually
    /// constrained and earned at least `threshold` of `max`.
    pub fn add(&mut self, points: f64, max: f64, reason: ScoreReason, material: bool, threshold: f64) {
        self.points += points;
        if material && max > 0.0 && points >= threshold * max {
            self.candidates.push(ReasonCandidate {
                reason,
                ratio: points / max,
            });
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: ScoringConfig,
    cache: Option<ScoreCache>,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Scorer with a cache sized from the config.
    pub fn with_cache(config: ScoringConfig) -> Self {
        let cache = ScoreCache::new(config.cache_capacity, config.cache_ttl_secs);
        Self {
            config,
            cache: Some(cache),
        }
    }

    /// Scorer sharing an existing cache, e.g. one owned by a test.
    pub fn with_cache_instance(config: ScoringConfig, cache: ScoreCache) -> Self {
        Self {
            config,
            cache: Some(cache),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ScoreCache> {
        self.cache.as_ref()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    pub fn score(&self, record: &PropertyRecord, ctx: &ScoringContext) -> PropertyScore {
        let Some(cache) = &self.cache else {
            return self.compute(record, ctx);
        };
        let Some(key) = ScoreKey::new(record, ctx) else {
            return self.compute(record, ctx);
        };
        if let Some(hit) = cache.get(&key) {
            trace!(record = %record.id, "score cache hit");
            return hit;
        }
        let score = self.compute(record, ctx);
        cache.insert(key, score.clone());
        score
    }

    /// Score every record in parallel, preserving input order.
    pub fn score_all(&self, records: &[PropertyRecord], ctx: &ScoringContext) -> Vec<PropertyScore> {
        records.par_iter().map(|r| self.score(r, ctx)).collect()
    }

    fn compute(&self, record: &PropertyRecord, ctx: &ScoringContext) -> PropertyScore {
        let config = &self.config;
        let compat = compatibility::score(record, &ctx.hints, config);
        let behave = behavior::score(record, &ctx.signals, config);
        let time = temporal::score(record, ctx.now, config);
        let extra = mode::score(record, ctx, config);

        let compatibility = clamp_score(compat.points);
        let behavior = clamp_score(behave.points);
        let temporal = clamp_score(time.points);
        let mode_score = clamp_score(extra.points);

        let weights = [
            config.compatibility_weight,
            config.behavior_weight,
            config.temporal_weight,
        ];
        let total: f64 = weights.iter().sum();
        let final_score = if total > 0.0 {
            clamp_score(
                (weights[0] * compatibility + weights[1] * behavior + weights[2] * temporal)
                    / total,
            )
        } else {
            0.0
        };

        let mut candidates: Vec<ReasonCandidate> = [compat, behave, time, extra]
            .into_iter()
            .flat_map(|c| c.candidates)
            .collect();
        candidates.sort_by(|a, b| {
            a.reason
                .category()
                .cmp(&b.reason.category())
                .then_with(|| b.ratio.total_cmp(&a.ratio))
                .then_with(|| a.reason.cmp(&b.reason))
        });
        let mut reasons = Vec::with_capacity(3);
        for candidate in candidates {
            if !reasons.contains(&candidate.reason) {
                reasons.push(candidate.reason);
            }
            if reasons.len() == 3 {
                break;
            }
        }

        PropertyScore {
            final_score,
            compatibility,
            behavior,
            temporal,
            mode_score,
            reasons,
            confidence: confidence(record),
        }
    }
}

/// 0.5 base plus 0.1 for each of: coordinates, several portals, an image,
/// a known area, a high data-quality flag.
pub fn confidence(record: &PropertyRecord) -> f64 {
    let signals = [
        record.location.coordinates().is_some(),
        record.portal_count() > 1,
        !record.images.is_empty(),
        record.known_area().is_some(),
        record.data_quality == Some(DataQuality::High),
    ];
    let present = signals.iter().filter(|s| **s).count();
    (0.5 + 0.1 * present as f64).min(1.0)
}
