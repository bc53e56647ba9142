//! Compatibility: four criteria of `criterion_points` each.
//!
//! An absent constraint earns full points. A constraint the record cannot
//! be checked against (missing field) earns half.

use super::{Component, ScoreReason, ScoringHints};
use crate::config::ScoringConfig;
use crate::model::PropertyRecord;
use crate::utils::text_eq;

pub(crate) fn score(record: &PropertyRecord, hints: &ScoringHints, config: &ScoringConfig) -> Component {
    let max = config.criterion_points;
    let threshold = config.reason_threshold;
    let mut component = Component::default();

    let type_points = if hints.property_types.is_empty() {
        max
    } else {
        match record.property_type {
            Some(t) if hints.property_types.contains(&t) => max,
            Some(_) => 0.0,
            None => max / 2.0,
        }
    };
    component.add(
        type_points,
        max,
        ScoreReason::TypeMatch,
        !hints.property_types.is_empty(),
        threshold,
    );

    component.add(
        location_points(record, hints, max),
        max,
        ScoreReason::LocationMatch,
        hints.has_location(),
        threshold,
    );

    component.add(
        range_points(
            record.known_price(),
            hints.min_price,
            hints.max_price,
            max,
            config.range_penalty_factor,
        ),
        max,
        ScoreReason::PriceInRange,
        hints.min_price.is_some() || hints.max_price.is_some(),
        threshold,
    );

    component.add(
        range_points(
            record.known_area(),
            hints.min_area,
            hints.max_area,
            max,
            config.range_penalty_factor,
        ),
        max,
        ScoreReason::AreaInRange,
        hints.min_area.is_some() || hints.max_area.is_some(),
        threshold,
    );

    component
}

/// District 0.3, municipality 0.3, parish 0.4, normalized over the levels
/// the hints name. A level the record lacks earns half its weight.
fn location_points(record: &PropertyRecord, hints: &ScoringHints, max: f64) -> f64 {
    if !hints.has_location() {
        return max;
    }
    let loc = &record.location;
    let levels = [
        (0.3, &hints.district, &loc.district),
        (0.3, &hints.municipality, &loc.municipality),
        (0.4, &hints.parish, &loc.parish),
    ];

    let mut total: f64 = 0.0;
    let mut earned: f64 = 0.0;
    for (weight, wanted, actual) in levels {
        let Some(wanted) = wanted else { continue };
        total += weight;
        earned += match actual {
            Some(actual) if text_eq(wanted, actual) => weight,
            Some(_) => 0.0,
            None => weight / 2.0,
        };
    }
    max * earned / total
}

/// Full points inside `[min, max]`; outside, points fall linearly with the
/// relative distance to the violated bound.
pub(crate) fn range_points(
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    points: f64,
    penalty_factor: f64,
) -> f64 {
    if min.is_none() && max.is_none() {
        return points;
    }
    let Some(value) = value else {
        return points / 2.0;
    };

    let relative_miss = match (min, max) {
        (Some(lo), _) if value < lo && lo > 0.0 => (lo - value) / lo,
        (_, Some(hi)) if value > hi && hi > 0.0 => (value - hi) / hi,
        _ => 0.0,
    };
    (points * (1.0 - relative_miss * penalty_factor)).clamp(0.0, points)
}
