//! Query, options and result types for the search orchestrator.

use super::stats::{SearchFacets, SearchStats};
use crate::aggregator::SourceFailure;
use crate::error::{Result, SearchError};
use crate::model::{Condition, PropertyRecord, PropertyType, TransactionType};
use crate::scoring::{PropertyScore, ScoringHints, ScoringMode, UserSignals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declarative AND-filters. Every absent field is "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_types: Vec<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_area: Option<f64>,

    /// Exact bedroom count; takes precedence over the range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bathrooms: Option<u32>,

    /// Accepted typologies (`T0`, `T1`, ...)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub typologies: Vec<String>,
    /// Features every result must have
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Keep records listed on at least one of these portals
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub portals: Vec<String>,
    /// Minimum mode-specific score (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_mode_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_before: Option<DateTime<Utc>>,

    /// Opaque tenant/team id passed through to sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

fn check_range<T: PartialOrd + fmt::Display>(name: &str, min: Option<T>, max: Option<T>) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(SearchError::invalid(format!(
                "min_{name} ({min}) must not exceed max_{name} ({max})"
            )));
        }
    }
    Ok(())
}

impl SearchQuery {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("min_area", self.min_area),
            ("max_area", self.max_area),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(SearchError::invalid(format!(
                        "{name} must be a non-negative number"
                    )));
                }
            }
        }
        check_range("price", self.min_price, self.max_price)?;
        check_range("area", self.min_area, self.max_area)?;
        check_range("bedrooms", self.min_bedrooms, self.max_bedrooms)?;
        check_range("bathrooms", self.min_bathrooms, self.max_bathrooms)?;
        if let (Some(after), Some(before)) = (self.published_after, self.published_before) {
            if after > before {
                return Err(SearchError::invalid(
                    "published_after must not be later than published_before",
                ));
            }
        }
        if let Some(score) = self.min_mode_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(SearchError::invalid("min_mode_score must be within 0-100"));
            }
        }
        Ok(())
    }

    /// The subset of filters the compatibility score is measured against.
    pub fn hints(&self) -> ScoringHints {
        ScoringHints {
            property_types: self.property_types.clone(),
            district: self.district.clone(),
            municipality: self.municipality.clone(),
            parish: self.parish.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_area: self.min_area,
            max_area: self.max_area,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Final score, highest first
    #[default]
    Score,
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
    /// Most recently published (or first seen) first
    Recent,
    /// Listed on the most portals first
    PortalCount,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "score" | "relevance" => Some(SortOrder::Score),
            "price_asc" | "price" => Some(SortOrder::PriceAsc),
            "price_desc" => Some(SortOrder::PriceDesc),
            "area_asc" | "area" => Some(SortOrder::AreaAsc),
            "area_desc" => Some(SortOrder::AreaDesc),
            "recent" | "newest" => Some(SortOrder::Recent),
            "portal_count" | "portals" => Some(SortOrder::PortalCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// 1-indexed
    pub page: usize,
    /// Configured default when `None`
    pub per_page: Option<usize>,
    pub sort: SortOrder,
    pub mode: ScoringMode,
    pub enable_scoring: bool,
    pub enable_geocoding: bool,
    pub signals: UserSignals,
    pub user_id: Option<String>,
    /// Restrict to these sources (empty = all)
    pub sources: Vec<String>,
    /// Per-source timeout override
    pub timeout_ms: Option<u64>,
    /// Entity-resolution override
    pub deduplicate: Option<bool>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
            sort: SortOrder::default(),
            mode: ScoringMode::default(),
            enable_scoring: true,
            enable_geocoding: false,
            signals: UserSignals::default(),
            user_id: None,
            sources: Vec::new(),
            timeout_ms: None,
            deduplicate: None,
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(SearchError::invalid("page must be >= 1"));
        }
        if self.per_page == Some(0) {
            return Err(SearchError::invalid("per_page must be >= 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(SearchError::invalid("timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// One record of the result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Record with its display fields filled in
    pub record: PropertyRecord,
    pub score: PropertyScore,
    pub match_reasons: Vec<String>,
    /// Distinct portal names that list this property
    pub portals: Vec<String>,
    /// Attributions beyond the first
    pub duplicate_count: usize,
    pub highlighted: bool,
}

impl SearchResultItem {
    pub fn new(mut record: PropertyRecord, score: PropertyScore, highlight_threshold: f64) -> Self {
        let match_reasons: Vec<String> = score.reasons.iter().map(|r| r.to_string()).collect();
        record.display_score = Some(score.final_score);
        record.display_reasons = match_reasons.clone();
        Self {
            portals: record.portal_names(),
            duplicate_count: record.sources.len().saturating_sub(1),
            highlighted: score.final_score >= highlight_threshold,
            match_reasons,
            record,
            score,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesSummary {
    pub queried: usize,
    pub succeeded: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<SourceFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchResultItem>,
    /// Matches before pagination
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub stats: SearchStats,
    pub facets: SearchFacets,
    pub sources: SourcesSummary,
    /// Records received from sources, before resolution and filtering
    pub total_raw: usize,
    pub duplicates_merged: usize,
    pub mode: ScoringMode,
    pub duration_ms: u64,
}

impl SearchResults {
    /// Every queried source failed: the empty result is an outage, not
    /// an absence of matches.
    pub fn all_sources_failed(&self) -> bool {
        self.sources.queried > 0 && self.sources.failed.len() == self.sources.queried
    }
}

pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ranges() {
        let query = SearchQuery {
            min_price: Some(300_000.0),
            max_price: Some(200_000.0),
            ..SearchQuery::default()
        };
        let err = query.validate().unwrap_err();
        assert!(err.is_validation());

        let query = SearchQuery {
            min_price: Some(-1.0),
            ..SearchQuery::default()
        };
        assert!(query.validate().is_err());

        let query = SearchQuery {
            min_price: Some(200_000.0),
            max_price: Some(200_000.0),
            ..SearchQuery::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_validate_options() {
        assert!(SearchOptions::default().validate().is_ok());
        let zero_page = SearchOptions {
            page: 0,
            ..SearchOptions::default()
        };
        assert!(zero_page.validate().is_err());
        let zero_per_page = SearchOptions {
            per_page: Some(0),
            ..SearchOptions::default()
        };
        assert!(zero_per_page.validate().is_err());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(SortOrder::parse("price-desc"), Some(SortOrder::PriceDesc));
        assert_eq!(SortOrder::parse("newest"), Some(SortOrder::Recent));
        assert_eq!(SortOrder::parse("random"), None);
    }
}
