//! Result containers for one aggregation pass.

use crate::model::{PropertyRecord, SourceType};
use crate::resolver::DuplicateGroup;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller overrides for one aggregation.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Restrict the fan-out to these source names (empty = all registered)
    pub sources: Vec<String>,
    /// Per-source timeout; the configured default when `None`
    pub timeout: Option<Duration>,
    /// Run entity resolution; the configured default when `None`
    pub deduplicate: Option<bool>,
    /// Opaque tenant/team id passed through to source clients
    pub tenant_id: Option<String>,
}

/// Records returned by one source that answered in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub source_type: SourceType,

    /// Records normalized from this source, before deduplication
    #[serde(skip_serializing, default)]
    pub records: Vec<PropertyRecord>,

    /// Number of normalized records
    pub count: usize,

    /// Raw records dropped for lack of an identity
    #[serde(default)]
    pub skipped: usize,

    /// Time taken to answer (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// A source that failed or timed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Source name
    pub source: String,

    /// Error message
    pub error: String,

    /// Whether this was a timeout
    #[serde(default)]
    pub is_timeout: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Sources that answered, in registry order
    pub sources: Vec<SourceOutcome>,

    /// Sources that failed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<SourceFailure>,

    /// Combined records, deduplicated when resolution ran
    pub records: Vec<PropertyRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<DuplicateGroup>,

    /// Records received across all sources
    pub total_raw: usize,

    /// Records absorbed into another record by the resolver
    pub duplicates_merged: usize,

    pub total_unique: usize,

    pub sources_queried: usize,

    /// Total time taken (ms)
    pub duration_ms: u64,
}

impl AggregationResult {
    pub fn new(sources_queried: usize) -> Self {
        Self {
            sources_queried,
            ..Self::default()
        }
    }

    pub fn add_source(&mut self, outcome: SourceOutcome) {
        self.total_raw += outcome.count;
        self.sources.push(outcome);
    }

    pub fn add_failure(&mut self, source: impl Into<String>, error: impl Into<String>, is_timeout: bool) {
        self.failed.push(SourceFailure {
            source: source.into(),
            error: error.into(),
            is_timeout,
        });
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source.clone()).collect()
    }

    pub fn sources_succeeded(&self) -> usize {
        self.sources.len()
    }

    /// Some but not all sources failed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.sources.is_empty()
    }

    /// Every queried source failed. An empty registry is not a failure.
    pub fn all_failed(&self) -> bool {
        self.sources_queried > 0 && self.failed.len() == self.sources_queried
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(source: &str, count: usize) -> SourceOutcome {
        SourceOutcome {
            source: source.to_string(),
            source_type: SourceType::Portal,
            records: Vec::new(),
            count,
            skipped: 0,
            duration_ms: None,
        }
    }

    #[test]
    fn test_counts_and_flags() {
        let mut result = AggregationResult::new(3);
        result.add_source(outcome("a", 4));
        result.add_source(outcome("b", 2));
        result.add_failure("c", "HTTP 503", false);
        assert_eq!(result.total_raw, 6);
        assert_eq!(result.sources_succeeded(), 2);
        assert!(result.is_partial());
        assert!(!result.all_failed());
        assert_eq!(result.succeeded(), vec!["a", "b"]);
    }

    #[test]
    fn test_all_failed() {
        let mut result = AggregationResult::new(1);
        result.add_failure("a", "timeout after 10ms", true);
        assert!(result.all_failed());
        assert!(!AggregationResult::new(0).all_failed());
    }
}
