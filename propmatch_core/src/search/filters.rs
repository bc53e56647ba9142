//! Record-level AND-filters.
//!
//! A record that lacks the field a present constraint is about cannot be
//! shown to satisfy it and is excluded. The minimum mode score is applied
//! after scoring, outside this module.

use super::SearchQuery;
use crate::model::PropertyRecord;
use crate::utils::{normalize_typology, text_eq};

fn within<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn exact_or_within(value: Option<u32>, exact: Option<u32>, min: Option<u32>, max: Option<u32>) -> bool {
    match exact {
        Some(exact) => value == Some(exact),
        None => within(value, min, max),
    }
}

fn text_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => text_eq(wanted, actual),
        (Some(_), None) => false,
    }
}

pub fn matches(record: &PropertyRecord, query: &SearchQuery) -> bool {
    if !query.property_types.is_empty()
        && !record
            .property_type
            .is_some_and(|t| query.property_types.contains(&t))
    {
        return false;
    }
    if query.transaction_type.is_some() && record.transaction_type != query.transaction_type {
        return false;
    }

    let loc = &record.location;
    if !text_matches(&query.district, &loc.district)
        || !text_matches(&query.municipality, &loc.municipality)
        || !text_matches(&query.parish, &loc.parish)
    {
        return false;
    }

    if !within(record.known_price(), query.min_price, query.max_price)
        || !within(record.known_area(), query.min_area, query.max_area)
    {
        return false;
    }

    if !exact_or_within(
        record.bedrooms,
        query.bedrooms,
        query.min_bedrooms,
        query.max_bedrooms,
    ) || !exact_or_within(
        record.bathrooms,
        query.bathrooms,
        query.min_bathrooms,
        query.max_bathrooms,
    ) {
        return false;
    }

    if !query.typologies.is_empty() {
        let Some(typology) = record.typology.as_deref().and_then(normalize_typology) else {
            return false;
        };
        if !query
            .typologies
            .iter()
            .filter_map(|t| normalize_typology(t))
            .any(|t| t == typology)
        {
            return false;
        }
    }

    if !query.features.iter().all(|wanted| {
        let wanted = wanted.trim().to_lowercase();
        record.features.iter().any(|f| f.to_lowercase() == wanted)
    }) {
        return false;
    }

    if !query.conditions.is_empty()
        && !record
            .condition
            .is_some_and(|c| query.conditions.contains(&c))
    {
        return false;
    }

    if !query.portals.is_empty()
        && !record
            .sources
            .iter()
            .any(|s| query.portals.iter().any(|p| p.eq_ignore_ascii_case(&s.name)))
    {
        return false;
    }

    let published = record.published_at.or(record.first_seen);
    within(published, query.published_after, query.published_before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, PropertyType, SourceAttribution, SourceType};
    use chrono::{TimeZone, Utc};

    fn listing() -> PropertyRecord {
        let mut record =
            PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "Idealista", "1"))
                .with_type(PropertyType::Apartment)
                .with_district("Lisboa")
                .with_price(250_000.0)
                .with_area(85.0);
        record.bedrooms = Some(2);
        record.typology = Some("T2".into());
        record.features = ["elevador".to_string(), "garagem".to_string()].into();
        record.condition = Some(Condition::Used);
        record
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(matches(&listing(), &SearchQuery::default()));
        let bare = PropertyRecord::new(SourceAttribution::new(SourceType::Crm, "crm", "x"));
        assert!(matches(&bare, &SearchQuery::default()));
    }

    #[test]
    fn test_each_constraint_excludes() {
        let record = listing();
        let cases = [
            SearchQuery {
                property_types: vec![PropertyType::House],
                ..SearchQuery::default()
            },
            SearchQuery {
                district: Some("Porto".into()),
                ..SearchQuery::default()
            },
            SearchQuery {
                min_price: Some(500_000_000.0),
                ..SearchQuery::default()
            },
            SearchQuery {
                max_area: Some(50.0),
                ..SearchQuery::default()
            },
            SearchQuery {
                bedrooms: Some(3),
                ..SearchQuery::default()
            },
            SearchQuery {
                typologies: vec!["T3".into()],
                ..SearchQuery::default()
            },
            SearchQuery {
                features: vec!["piscina".into()],
                ..SearchQuery::default()
            },
            SearchQuery {
                conditions: vec![Condition::New],
                ..SearchQuery::default()
            },
            SearchQuery {
                portals: vec!["imovirtual".into()],
                ..SearchQuery::default()
            },
            SearchQuery {
                published_after: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                ..SearchQuery::default()
            },
        ];
        for (i, query) in cases.iter().enumerate() {
            assert!(!matches(&record, query), "case {i} should exclude");
        }
    }

    #[test]
    fn test_matching_constraints() {
        let query = SearchQuery {
            property_types: vec![PropertyType::Apartment],
            district: Some("LISBOA".into()),
            min_price: Some(200_000.0),
            max_price: Some(300_000.0),
            min_bedrooms: Some(1),
            typologies: vec!["t2".into(), "T3".into()],
            features: vec!["Garagem".into()],
            portals: vec!["idealista".into()],
            ..SearchQuery::default()
        };
        assert!(matches(&listing(), &query));
    }
}
