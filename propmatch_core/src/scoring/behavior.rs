//! Behavior: interaction history (40), search patterns (30) and declared
//! preferences (30). A component with no signal sits at half credit.

use super::{Component, Interaction, RecentSearch, ScoreReason, UserSignals};
use crate::config::ScoringConfig;
use crate::model::PropertyRecord;
use crate::utils::text_eq;

const INTERACTION_MAX: f64 = 40.0;
const SEARCH_MAX: f64 = 30.0;
const PREFERENCE_MAX: f64 = 30.0;
/// Affinity at which the interaction component saturates either way
const AFFINITY_CAP: f64 = 5.0;

pub(crate) fn score(record: &PropertyRecord, signals: &UserSignals, config: &ScoringConfig) -> Component {
    let threshold = config.reason_threshold;
    let mut component = Component::default();

    component.add(
        interaction_points(record, &signals.interactions),
        INTERACTION_MAX,
        ScoreReason::InteractionHistory,
        !signals.interactions.is_empty(),
        threshold,
    );
    component.add(
        search_points(record, &signals.recent_searches),
        SEARCH_MAX,
        ScoreReason::SearchPattern,
        !signals.recent_searches.is_empty(),
        threshold,
    );
    component.add(
        preference_points(record, signals),
        PREFERENCE_MAX,
        ScoreReason::PreferenceMatch,
        !signals.favorite_locations.is_empty() || !signals.favorite_types.is_empty(),
        threshold,
    );
    component
}

fn same_district(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if text_eq(a, b))
}

/// How much an interaction tells about this record: the listing itself
/// counts double, a similar one (same type and district) once, a loosely
/// similar one half.
fn relevance(record: &PropertyRecord, interaction: &Interaction) -> f64 {
    if record.id == interaction.property_id
        || record
            .sources
            .iter()
            .any(|s| format!("{}:{}", s.name, s.external_id) == interaction.property_id)
    {
        return 2.0;
    }
    let same_type = record.property_type.is_some() && record.property_type == interaction.property_type;
    let same_place = same_district(
        record.location.district.as_deref(),
        interaction.district.as_deref(),
    );
    match (same_type, same_place) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.0,
    }
}

fn interaction_points(record: &PropertyRecord, interactions: &[Interaction]) -> f64 {
    if interactions.is_empty() {
        return INTERACTION_MAX / 2.0;
    }
    let affinity: f64 = interactions
        .iter()
        .map(|i| i.kind.weight() * relevance(record, i))
        .sum();
    let affinity = affinity.clamp(-AFFINITY_CAP, AFFINITY_CAP);
    INTERACTION_MAX / 2.0 + affinity / AFFINITY_CAP * INTERACTION_MAX / 2.0
}

fn matches_search(record: &PropertyRecord, search: &RecentSearch) -> bool {
    let district_ok = match &search.district {
        Some(wanted) => same_district(Some(wanted.as_str()), record.location.district.as_deref()),
        None => true,
    };
    let type_ok = search.property_type.is_none() || search.property_type == record.property_type;
    let price_ok = match (search.max_price, record.known_price()) {
        (Some(max), Some(price)) => price <= max,
        _ => true,
    };
    district_ok && type_ok && price_ok
}

fn search_points(record: &PropertyRecord, searches: &[RecentSearch]) -> f64 {
    if searches.is_empty() {
        return SEARCH_MAX / 2.0;
    }
    let matched = searches.iter().filter(|s| matches_search(record, s)).count();
    SEARCH_MAX * matched as f64 / searches.len() as f64
}

fn preference_points(record: &PropertyRecord, signals: &UserSignals) -> f64 {
    let half = PREFERENCE_MAX / 2.0;
    let loc = &record.location;

    let location = if signals.favorite_locations.is_empty() {
        half / 2.0
    } else if signals.favorite_locations.iter().any(|fav| {
        [&loc.district, &loc.municipality, &loc.parish]
            .into_iter()
            .flatten()
            .any(|name| text_eq(fav, name))
    }) {
        half
    } else {
        0.0
    };

    let kind = if signals.favorite_types.is_empty() {
        half / 2.0
    } else if record
        .property_type
        .is_some_and(|t| signals.favorite_types.contains(&t))
    {
        half
    } else {
        0.0
    };

    location + kind
}
