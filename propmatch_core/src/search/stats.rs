//! Statistics and facets over the filtered, pre-pagination result set.

use crate::model::PropertyRecord;
use crate::scoring::PropertyScore;
use crate::utils::{normalize_typology, text_eq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price histogram edges in euros; the last bucket is open-ended.
const PRICE_BUCKETS: [(f64, Option<f64>, &str); 6] = [
    (0.0, Some(100_000.0), "< 100k"),
    (100_000.0, Some(200_000.0), "100k - 200k"),
    (200_000.0, Some(300_000.0), "200k - 300k"),
    (300_000.0, Some(500_000.0), "300k - 500k"),
    (500_000.0, Some(1_000_000.0), "500k - 1M"),
    (1_000_000.0, None, ">= 1M"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_score: Option<f64>,
    pub by_portal: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_district: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    pub label: String,
    pub min: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFacets {
    pub property_types: BTreeMap<String, usize>,
    pub districts: BTreeMap<String, usize>,
    pub municipalities: BTreeMap<String, usize>,
    pub typologies: BTreeMap<String, usize>,
    pub portals: BTreeMap<String, usize>,
    pub price_buckets: Vec<PriceBucket>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Count `key` under the first spelling seen for it. Keys compare the way
/// the filters do, so "Lisboa" and "lisboa" share one bucket.
fn bump(map: &mut BTreeMap<String, usize>, key: Option<&str>) {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return;
    };
    let existing = map.keys().find(|k| text_eq(k, key)).cloned();
    *map.entry(existing.unwrap_or_else(|| key.to_string()))
        .or_default() += 1;
}

pub fn compute_stats(scored: &[(PropertyRecord, PropertyScore)]) -> SearchStats {
    let prices: Vec<f64> = scored.iter().filter_map(|(r, _)| r.known_price()).collect();
    let areas: Vec<f64> = scored.iter().filter_map(|(r, _)| r.known_area()).collect();
    let scores: Vec<f64> = scored.iter().map(|(_, s)| s.final_score).collect();

    let mut stats = SearchStats {
        count: scored.len(),
        avg_price: mean(&prices),
        min_price: prices.iter().copied().reduce(f64::min),
        max_price: prices.iter().copied().reduce(f64::max),
        avg_area: mean(&areas),
        avg_score: mean(&scores),
        ..SearchStats::default()
    };

    for (record, _) in scored {
        for portal in record.portal_names() {
            bump(&mut stats.by_portal, Some(portal.as_str()));
        }
        bump(
            &mut stats.by_type,
            record.property_type.as_ref().map(|t| t.as_str()),
        );
        bump(&mut stats.by_district, record.location.district.as_deref());
    }
    stats
}

pub fn compute_facets(scored: &[(PropertyRecord, PropertyScore)]) -> SearchFacets {
    let mut facets = SearchFacets {
        price_buckets: PRICE_BUCKETS
            .iter()
            .map(|(min, max, label)| PriceBucket {
                label: label.to_string(),
                min: *min,
                max: *max,
                count: 0,
            })
            .collect(),
        ..SearchFacets::default()
    };

    for (record, _) in scored {
        bump(
            &mut facets.property_types,
            record.property_type.as_ref().map(|t| t.as_str()),
        );
        bump(&mut facets.districts, record.location.district.as_deref());
        bump(
            &mut facets.municipalities,
            record.location.municipality.as_deref(),
        );
        bump(
            &mut facets.typologies,
            record
                .typology
                .as_deref()
                .map(|t| normalize_typology(t).unwrap_or_else(|| t.to_string()))
                .as_deref(),
        );
        for portal in record.portal_names() {
            bump(&mut facets.portals, Some(portal.as_str()));
        }

        if let Some(price) = record.known_price() {
            if let Some(bucket) = facets
                .price_buckets
                .iter_mut()
                .find(|b| price >= b.min && b.max.map_or(true, |max| price < max))
            {
                bucket.count += 1;
            }
        }
    }
    facets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyType, SourceAttribution, SourceType};

    fn scored(id: &str, price: Option<f64>, district: &str) -> (PropertyRecord, PropertyScore) {
        let mut record = PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "idealista", id))
            .with_district(district)
            .with_type(PropertyType::Apartment);
        record.price = price;
        (record, PropertyScore::neutral())
    }

    #[test]
    fn test_stats_over_known_values() {
        let set = vec![
            scored("1", Some(100_000.0), "Lisboa"),
            scored("2", Some(300_000.0), "Lisboa"),
            scored("3", None, "Porto"),
        ];
        let stats = compute_stats(&set);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.avg_price, Some(200_000.0));
        assert_eq!(stats.min_price, Some(100_000.0));
        assert_eq!(stats.max_price, Some(300_000.0));
        assert_eq!(stats.avg_area, None);
        assert_eq!(stats.by_district["Lisboa"], 2);
        assert_eq!(stats.by_portal["idealista"], 3);
    }

    #[test]
    fn test_empty_set() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.avg_price, None);
        let facets = compute_facets(&[]);
        assert_eq!(facets.price_buckets.len(), 6);
        assert!(facets.price_buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_price_buckets_edges() {
        let set = vec![
            scored("1", Some(99_999.0), "Faro"),
            scored("2", Some(100_000.0), "Faro"),
            scored("3", Some(1_000_000.0), "Faro"),
            scored("4", Some(0.0), "Faro"),
        ];
        let facets = compute_facets(&set);
        let counts: Vec<usize> = facets.price_buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 0, 0, 1]);
        assert_eq!(facets.districts["Faro"], 4);
    }

    #[test]
    fn test_buckets_fold_case_and_accents() {
        let mut set = vec![
            scored("1", Some(100_000.0), "Lisboa"),
            scored("2", Some(100_000.0), " lisboa"),
            scored("3", Some(100_000.0), "Setúbal"),
            scored("4", Some(100_000.0), "SETUBAL"),
        ];
        set[0].0.typology = Some("T2".into());
        set[1].0.typology = Some("t2".into());
        let stats = compute_stats(&set);
        assert_eq!(stats.by_district.len(), 2);
        assert_eq!(stats.by_district["Lisboa"], 2);
        assert_eq!(stats.by_district["Setúbal"], 2);
        let facets = compute_facets(&set);
        assert_eq!(facets.districts["Lisboa"], 2);
        assert_eq!(facets.typologies.get("T2"), Some(&2));
    }
}
