//! Temporal: recency (50), urgency (30), seasonality (20).

use super::{Component, ScoreReason};
use crate::config::ScoringConfig;
use crate::model::PropertyRecord;
use crate::utils::age_days;
use chrono::{DateTime, Datelike, Utc};

const RECENCY_MAX: f64 = 50.0;
const URGENCY_MAX: f64 = 30.0;
const SEASON_MAX: f64 = 20.0;

pub(crate) fn score(record: &PropertyRecord, now: DateTime<Utc>, config: &ScoringConfig) -> Component {
    let threshold = config.reason_threshold;
    let mut component = Component::default();

    let recency = match record.first_seen {
        Some(seen) => {
            let age = age_days(seen, now);
            if age <= config.fresh_days {
                RECENCY_MAX
            } else if age <= config.recent_days {
                RECENCY_MAX / 2.0
            } else {
                RECENCY_MAX / 4.0
            }
        }
        None => RECENCY_MAX / 4.0,
    };
    component.add(
        recency,
        RECENCY_MAX,
        ScoreReason::NewListing,
        record.first_seen.is_some(),
        threshold,
    );

    let urgency = match last_price_cut(record) {
        Some(at) if age_days(at, now) <= config.price_cut_days => URGENCY_MAX,
        Some(_) => URGENCY_MAX / 2.0,
        None => 0.0,
    };
    component.add(urgency, URGENCY_MAX, ScoreReason::RecentPriceCut, true, threshold);

    let season = match record.location.district.as_deref() {
        Some(district) if config.is_high_season(district, now.month()) => SEASON_MAX,
        _ => 0.0,
    };
    component.add(season, SEASON_MAX, ScoreReason::HighSeason, true, threshold);

    component
}

/// When the asking price last dropped, from the price history.
pub fn last_price_cut(record: &PropertyRecord) -> Option<DateTime<Utc>> {
    let mut history: Vec<_> = record
        .price_history
        .iter()
        .filter(|p| p.price.is_finite() && p.price > 0.0)
        .collect();
    history.sort_by_key(|p| p.at);
    history
        .windows(2)
        .filter(|pair| pair[1].price < pair[0].price)
        .map(|pair| pair[1].at)
        .last()
}
