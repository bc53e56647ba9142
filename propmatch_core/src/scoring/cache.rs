//! Capacity- and TTL-bounded score cache.
//!
//! Keys carry a fingerprint of the full record and context plus the UTC day
//! of the reference instant, so a cached entry can only be returned for
//! inputs that would compute the same score. Every age is counted in
//! calendar days, which makes the day the finest granularity that matters.

use super::{PropertyScore, ScoringContext, ScoringMode};
use crate::model::PropertyRecord;
use moka::sync::Cache;
use chrono::NaiveDate;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScoreKey {
    record_id: String,
    mode: ScoringMode,
    user: Option<String>,
    day: NaiveDate,
    fingerprint: u64,
}

impl ScoreKey {
    /// `None` if the inputs cannot be fingerprinted; the caller then
    /// computes without caching.
    pub fn new(record: &PropertyRecord, ctx: &ScoringContext) -> Option<Self> {
        let mut hasher = DefaultHasher::new();
        serde_json::to_vec(record).ok()?.hash(&mut hasher);
        serde_json::to_vec(ctx).ok()?.hash(&mut hasher);
        Some(Self {
            record_id: record.id.clone(),
            mode: ctx.mode,
            user: ctx.user_id.clone(),
            day: ctx.now.date_naive(),
            fingerprint: hasher.finish(),
        })
    }
}

/// Shared handle; clones see the same entries.
#[derive(Clone)]
pub struct ScoreCache {
    inner: Cache<ScoreKey, PropertyScore>,
}

impl ScoreCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(Duration::from_secs(ttl_secs.max(1)))
                .build(),
        }
    }

    pub fn get(&self, key: &ScoreKey) -> Option<PropertyScore> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: ScoreKey, score: PropertyScore) {
        self.inner.insert(key, score);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count (moka applies writes lazily).
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ScoreCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceAttribution, SourceType};
    use chrono::TimeZone;

    fn listing(id: &str) -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "crm", id))
    }

    #[test]
    fn test_key_tracks_reference_day() {
        let record = listing("1");
        let morning = chrono::Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
        let a = ScoringContext::default().with_now(morning);
        let same_day = a.clone().with_now(morning + chrono::Duration::hours(10));
        let next_day = a.clone().with_now(morning + chrono::Duration::days(1));
        assert_eq!(ScoreKey::new(&record, &a), ScoreKey::new(&record, &same_day));
        assert_ne!(ScoreKey::new(&record, &a), ScoreKey::new(&record, &next_day));
    }

    #[test]
    fn test_key_changes_with_record_content() {
        let ctx = ScoringContext::default();
        let a = ScoreKey::new(&listing("1"), &ctx);
        let b = ScoreKey::new(&listing("1").with_price(100_000.0), &ctx);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_changes_with_user_and_mode() {
        let record = listing("1");
        let base = ScoringContext::new(ScoringMode::Prospecting);
        let other_mode = ScoringContext::new(ScoringMode::SaleMatching);
        let other_user = ScoringContext::new(ScoringMode::Prospecting).with_user("u2");
        let key = ScoreKey::new(&record, &base);
        assert_ne!(key, ScoreKey::new(&record, &other_mode));
        assert_ne!(key, ScoreKey::new(&record, &other_user));
    }

    #[test]
    fn test_insert_get_clear() {
        let cache = ScoreCache::new(100, 60);
        let key = ScoreKey::new(&listing("1"), &ScoringContext::default()).unwrap();
        cache.insert(key.clone(), PropertyScore::neutral());
        assert_eq!(cache.get(&key), Some(PropertyScore::neutral()));
        cache.clear();
        assert_eq!(cache.get(&key), None);
    }
}
