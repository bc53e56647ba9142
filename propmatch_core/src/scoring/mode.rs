//! Mode-specific extras, reported as `mode_score`.
//!
//! Prospecting: recency (40) + multi-portal bonus (30) + below-market (30).
//! Sale matching: availability (40) + update recency (30) + visibility (30).

use super::{Component, ScoreReason, ScoringContext, ScoringMode};
use crate::config::ScoringConfig;
use crate::model::PropertyRecord;
use crate::utils::age_days;

const PORTAL_BONUS: f64 = 10.0;
const BONUS_CAP: f64 = 30.0;

pub(crate) fn score(record: &PropertyRecord, ctx: &ScoringContext, config: &ScoringConfig) -> Component {
    match ctx.mode {
        ScoringMode::Prospecting => prospecting(record, ctx, config),
        ScoringMode::SaleMatching => sale_matching(record, ctx, config),
    }
}

fn prospecting(record: &PropertyRecord, ctx: &ScoringContext, config: &ScoringConfig) -> Component {
    let threshold = config.reason_threshold;
    let mut component = Component::default();

    let recency = match record.first_seen.map(|seen| age_days(seen, ctx.now)) {
        Some(age) if age <= config.fresh_days => 40.0,
        Some(age) if age <= config.recent_days => 20.0,
        _ => 0.0,
    };
    component.add(recency, 40.0, ScoreReason::NewListing, true, threshold);

    let extra_portals = record.portal_count().saturating_sub(1) as f64;
    let multi_portal = (extra_portals * PORTAL_BONUS).min(BONUS_CAP);
    component.add(multi_portal, BONUS_CAP, ScoreReason::MultiPortal, true, threshold);

    component.add(
        below_market_points(record, ctx),
        BONUS_CAP,
        ScoreReason::BelowMarket,
        true,
        threshold,
    );
    component
}

/// Percent below the district median price/m², capped at 30.
fn below_market_points(record: &PropertyRecord, ctx: &ScoringContext) -> f64 {
    let (Some(district), Some(ppm2)) = (record.location.district.as_deref(), record.price_per_m2())
    else {
        return 0.0;
    };
    let Some(median) = ctx.market.median_for(district) else {
        return 0.0;
    };
    ((median - ppm2) / median * 100.0).clamp(0.0, BONUS_CAP)
}

fn sale_matching(record: &PropertyRecord, ctx: &ScoringContext, config: &ScoringConfig) -> Component {
    let threshold = config.reason_threshold;
    let mut component = Component::default();

    let availability = match record.last_seen.map(|seen| age_days(seen, ctx.now)) {
        Some(age) if age <= 3 => 40.0,
        Some(age) if age <= 14 => 28.0,
        Some(age) if age <= 30 => 16.0,
        Some(_) => 4.0,
        None => 20.0,
    };
    component.add(
        availability,
        40.0,
        ScoreReason::LikelyAvailable,
        record.last_seen.is_some(),
        threshold,
    );

    let update = match record.updated_at.map(|at| age_days(at, ctx.now)) {
        Some(age) if age <= config.fresh_days => 30.0,
        Some(age) if age <= config.recent_days => 15.0,
        Some(_) => 5.0,
        None => 10.0,
    };
    component.add(
        update,
        30.0,
        ScoreReason::RecentlyUpdated,
        record.updated_at.is_some(),
        threshold,
    );

    let visibility = (record.portal_count() as f64 * PORTAL_BONUS).min(BONUS_CAP);
    component.add(visibility, BONUS_CAP, ScoreReason::MultiPortal, true, threshold);
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceAttribution, SourceType};
    use crate::scoring::MarketSnapshot;
    use chrono::{Duration, TimeZone, Utc};

    fn listing() -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "idealista", "1"))
    }

    fn ctx(mode: ScoringMode) -> ScoringContext {
        ScoringContext::new(mode).with_now(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_prospecting_components() {
        let ctx = ctx(ScoringMode::Prospecting);
        let mut market = MarketSnapshot::default();
        market.insert("Lisboa", 5_000.0);
        let ctx = ctx.with_market(market);

        let mut record = listing()
            .with_district("Lisboa")
            .with_price(400_000.0)
            .with_area(100.0)
            .with_first_seen(ctx.now - Duration::days(2));
        record
            .sources
            .push(SourceAttribution::new(SourceType::Portal, "imovirtual", "2"));

        // 40 recency + 10 extra portal + 20% below market
        let c = score(&record, &ctx, &ScoringConfig::default());
        assert!((c.points - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_portal_bonus_capped() {
        let ctx = ctx(ScoringMode::Prospecting);
        let mut record = listing();
        for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            record
                .sources
                .push(SourceAttribution::new(SourceType::Portal, *name, i.to_string()));
        }
        assert_eq!(score(&record, &ctx, &ScoringConfig::default()).points, 30.0);
    }

    #[test]
    fn test_sale_matching_unknown_dates() {
        let ctx = ctx(ScoringMode::SaleMatching);
        // 20 availability + 10 update + 10 visibility
        assert_eq!(score(&listing(), &ctx, &ScoringConfig::default()).points, 40.0);
    }

    #[test]
    fn test_sale_matching_fresh_listing() {
        let ctx = ctx(ScoringMode::SaleMatching);
        let mut record = listing();
        record.last_seen = Some(ctx.now - Duration::days(1));
        record.updated_at = Some(ctx.now - Duration::days(20));
        let c = score(&record, &ctx, &ScoringConfig::default());
        assert_eq!(c.points, 40.0 + 15.0 + 10.0);
        assert!(c
            .candidates
            .iter()
            .any(|r| r.reason == ScoreReason::LikelyAvailable));
    }
}
