//! Pairwise similarity between two property records.
//!
//! Five weighted signals: location, price, area, characteristics and
//! (optionally) image hashes. Location, characteristics and images only
//! count when both records carry something comparable; price and area always
//! count, scoring zero when either side is unknown.

use super::geo;
use crate::config::ResolverConfig;
use crate::model::PropertyRecord;
use crate::utils::{normalize_postal_code, normalize_typology, street_key, text_eq};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Evidence label attached to a duplicate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    SameGeohash,
    SameBuilding,
    Nearby,
    SameAddress,
    SamePostalCode,
    SameParish,
    SimilarPrice,
    SimilarArea,
    SameCharacteristics,
    MatchingImages,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::SameGeohash => "same_geohash",
            MatchReason::SameBuilding => "same_building",
            MatchReason::Nearby => "nearby",
            MatchReason::SameAddress => "same_address",
            MatchReason::SamePostalCode => "same_postal_code",
            MatchReason::SameParish => "same_parish",
            MatchReason::SimilarPrice => "similar_price",
            MatchReason::SimilarArea => "similar_area",
            MatchReason::SameCharacteristics => "same_characteristics",
            MatchReason::MatchingImages => "matching_images",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signal breakdown of one pairwise comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    /// `None` when the records share no comparable location signal
    pub location: Option<f64>,
    pub price: f64,
    pub area: f64,
    pub characteristics: Option<f64>,
    pub images: Option<f64>,
    /// Weighted mean over the signals that were comparable, in [0, 1]
    pub overall: f64,
    /// Same street and door number, no conflicting characteristics, price
    /// and area inside tolerance
    pub same_address_within_tolerance: bool,
    pub reasons: Vec<MatchReason>,
}

impl SimilarityScore {
    pub fn is_duplicate(&self, threshold: f64) -> bool {
        self.overall >= threshold || self.same_address_within_tolerance
    }
}

/// 1.0 for equal values, decaying linearly to 0.0 as the relative difference
/// reaches `tolerance`. Unknown (zero/absent) values score 0.0.
pub fn relative_decay(a: Option<f64>, b: Option<f64>, tolerance: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 && tolerance > 0.0 => {
            let diff = (a - b).abs() / a.max(b);
            (1.0 - diff / tolerance).max(0.0)
        }
        _ => 0.0,
    }
}

/// Relative difference of two known values, `None` if either is unknown.
fn relative_diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => Some((a - b).abs() / a.max(b)),
        _ => None,
    }
}

pub fn compare(a: &PropertyRecord, b: &PropertyRecord, config: &ResolverConfig) -> SimilarityScore {
    let mut reasons = Vec::new();

    let location = location_similarity(a, b, config, &mut reasons);

    let price = relative_decay(a.known_price(), b.known_price(), config.price_tolerance);
    if price > 0.0 {
        reasons.push(MatchReason::SimilarPrice);
    }

    let area = relative_decay(a.known_area(), b.known_area(), config.area_tolerance);
    if area > 0.0 {
        reasons.push(MatchReason::SimilarArea);
    }

    let characteristics = characteristics_similarity(a, b);
    if characteristics.is_some_and(|c| c >= 0.8) {
        reasons.push(MatchReason::SameCharacteristics);
    }

    let images = if config.use_image_hashes {
        image_similarity(a, b)
    } else {
        None
    };
    if images.is_some_and(|i| i > 0.0) {
        reasons.push(MatchReason::MatchingImages);
    }

    let w = &config.weights;
    let mut weighted = w.price * price + w.area * area;
    let mut total_weight = w.price + w.area;
    for (score, weight) in [
        (location, w.location),
        (characteristics, w.characteristics),
        (images, w.images),
    ] {
        if let Some(score) = score {
            weighted += weight * score;
            total_weight += weight;
        }
    }
    let overall = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let same_address_within_tolerance = reasons.contains(&MatchReason::SameAddress)
        && characteristics.map_or(true, |c| c >= config.same_address_min_characteristics)
        && within_tolerance(a, b, config);

    SimilarityScore {
        location,
        price,
        area,
        characteristics,
        images,
        overall,
        same_address_within_tolerance,
        reasons,
    }
}

/// Price and area each within tolerance or unknown on a side, with at least
/// one of them actually known on both sides.
fn within_tolerance(a: &PropertyRecord, b: &PropertyRecord, config: &ResolverConfig) -> bool {
    let price = relative_diff(a.known_price(), b.known_price());
    let area = relative_diff(a.known_area(), b.known_area());
    if price.is_none() && area.is_none() {
        return false;
    }
    price.map_or(true, |d| d <= config.price_tolerance)
        && area.map_or(true, |d| d <= config.area_tolerance)
}

fn location_similarity(
    a: &PropertyRecord,
    b: &PropertyRecord,
    config: &ResolverConfig,
    reasons: &mut Vec<MatchReason>,
) -> Option<f64> {
    let (la, lb) = (&a.location, &b.location);

    if let (Some(ga), Some(gb)) = (&la.geohash, &lb.geohash) {
        if geo::same_cell(ga, gb, config.geohash_precision) {
            reasons.push(MatchReason::SameGeohash);
            return Some(1.0);
        }
    }

    if let (Some(ca), Some(cb)) = (la.coordinates(), lb.coordinates()) {
        let distance = geo::haversine_m(ca, cb);
        if distance <= config.near_distance_m {
            reasons.push(MatchReason::SameBuilding);
            return Some(1.0);
        }
        if distance <= config.partial_distance_m {
            reasons.push(MatchReason::Nearby);
            return Some(config.partial_distance_score);
        }
        return Some(0.0);
    }

    // Administrative strings: (weight, comparable, matched)
    let street = match (
        la.address.as_deref().and_then(street_key),
        lb.address.as_deref().and_then(street_key),
    ) {
        (Some(x), Some(y)) => Some(x == y),
        _ => None,
    };
    let postal = match (
        la.postal_code.as_deref().and_then(normalize_postal_code),
        lb.postal_code.as_deref().and_then(normalize_postal_code),
    ) {
        (Some(x), Some(y)) => Some(x == y),
        _ => None,
    };
    let text = |x: &Option<String>, y: &Option<String>| match (x, y) {
        (Some(x), Some(y)) => Some(text_eq(x, y)),
        _ => None,
    };
    let parish = text(&la.parish, &lb.parish);
    let municipality = text(&la.municipality, &lb.municipality);
    let district = text(&la.district, &lb.district);

    let components = [
        (0.60, street, Some(MatchReason::SameAddress)),
        (0.15, postal, Some(MatchReason::SamePostalCode)),
        (0.12, parish, Some(MatchReason::SameParish)),
        (0.08, municipality, None),
        (0.05, district, None),
    ];

    let mut comparable: f64 = 0.0;
    let mut matched: f64 = 0.0;
    for (weight, outcome, reason) in components {
        if let Some(is_match) = outcome {
            comparable += weight;
            if is_match {
                matched += weight;
                if let Some(reason) = reason {
                    reasons.push(reason);
                }
            }
        }
    }
    if comparable == 0.0 {
        return None;
    }

    let score = matched / comparable;
    // Administrative areas alone cannot place two listings in one building.
    if street.is_none() {
        Some(score.min(0.5))
    } else {
        Some(score)
    }
}

fn characteristics_similarity(a: &PropertyRecord, b: &PropertyRecord) -> Option<f64> {
    fn cmp<T: PartialEq>(x: &Option<T>, y: &Option<T>) -> Option<bool> {
        match (x, y) {
            (Some(x), Some(y)) => Some(x == y),
            _ => None,
        }
    }

    let typology_a = a.typology.as_deref().and_then(normalize_typology);
    let typology_b = b.typology.as_deref().and_then(normalize_typology);

    let checks = [
        (0.25, cmp(&a.property_type, &b.property_type)),
        (0.20, cmp(&a.bedrooms, &b.bedrooms)),
        (0.15, cmp(&a.bathrooms, &b.bathrooms)),
        (0.10, cmp(&a.floor, &b.floor)),
        (0.15, cmp(&typology_a, &typology_b)),
        (0.15, cmp(&a.transaction_type, &b.transaction_type)),
    ];

    let mut compared: f64 = 0.0;
    let mut agreed: f64 = 0.0;
    for (weight, outcome) in checks {
        if let Some(same) = outcome {
            compared += weight;
            if same {
                agreed += weight;
            }
        }
    }
    if compared == 0.0 {
        None
    } else {
        Some(agreed / compared)
    }
}

fn image_similarity(a: &PropertyRecord, b: &PropertyRecord) -> Option<f64> {
    if a.image_hashes.is_empty() || b.image_hashes.is_empty() {
        return None;
    }
    let set_a: HashSet<&str> = a.image_hashes.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.image_hashes.iter().map(String::as_str).collect();
    let shared = set_a.intersection(&set_b).count();
    Some(shared as f64 / set_a.len().min(set_b.len()) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyType, SourceAttribution, SourceType};

    fn listing(portal: &str, id: &str) -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, portal, id))
    }

    #[test]
    fn test_relative_decay() {
        assert_eq!(relative_decay(Some(100.0), Some(100.0), 0.1), 1.0);
        assert!((relative_decay(Some(100.0), Some(95.0), 0.1) - 0.5).abs() < 1e-9);
        assert_eq!(relative_decay(Some(100.0), Some(80.0), 0.1), 0.0);
        assert_eq!(relative_decay(None, Some(80.0), 0.1), 0.0);
        assert_eq!(relative_decay(Some(0.0), Some(0.0), 0.1), 0.0);
    }

    #[test]
    fn test_geohash_match_is_full_location() {
        let config = ResolverConfig::default();
        let mut a = listing("a", "1").with_price(200_000.0);
        let mut b = listing("b", "2").with_price(200_000.0);
        a.location.geohash = Some("eycs2abcd".into());
        b.location.geohash = Some("eycs2abxx".into());
        let score = compare(&a, &b, &config);
        assert_eq!(score.location, Some(1.0));
        assert!(score.reasons.contains(&MatchReason::SameGeohash));
    }

    #[test]
    fn test_coordinates_distance_bands() {
        let config = ResolverConfig::default();
        let a = listing("a", "1").with_coordinates(38.7223, -9.1393);
        let near = listing("b", "2").with_coordinates(38.7228, -9.1393); // ~55 m
        let partial = listing("c", "3").with_coordinates(38.7250, -9.1393); // ~300 m
        let far = listing("d", "4").with_coordinates(38.7400, -9.1393); // ~2 km

        assert_eq!(compare(&a, &near, &config).location, Some(1.0));
        assert_eq!(
            compare(&a, &partial, &config).location,
            Some(config.partial_distance_score)
        );
        assert_eq!(compare(&a, &far, &config).location, Some(0.0));
    }

    #[test]
    fn test_missing_location_carries_no_weight() {
        let config = ResolverConfig::default();
        let a = listing("a", "1").with_price(100_000.0).with_area(50.0);
        let b = listing("b", "2").with_price(100_000.0).with_area(50.0);
        let score = compare(&a, &b, &config);
        assert_eq!(score.location, None);
        assert_eq!(score.characteristics, None);
        // Only price and area participate, both identical.
        assert!((score.overall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_admin_only_location_is_capped() {
        let config = ResolverConfig::default();
        let mut a = listing("a", "1");
        let mut b = listing("b", "2");
        for r in [&mut a, &mut b] {
            r.location.district = Some("Lisboa".into());
            r.location.municipality = Some("Lisboa".into());
            r.location.parish = Some("Arroios".into());
        }
        assert_eq!(compare(&a, &b, &config).location, Some(0.5));
    }

    #[test]
    fn test_characteristics_only_compared_fields() {
        let config = ResolverConfig::default();
        let mut a = listing("a", "1").with_type(PropertyType::Apartment);
        let mut b = listing("b", "2").with_type(PropertyType::Apartment);
        a.bedrooms = Some(2);
        b.bedrooms = Some(3);
        a.floor = Some(4);
        let score = compare(&a, &b, &config);
        let expected = 0.25 / (0.25 + 0.20);
        assert!((score.characteristics.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_image_hashes_off_by_default() {
        let mut config = ResolverConfig::default();
        let mut a = listing("a", "1");
        let mut b = listing("b", "2");
        a.image_hashes = vec!["h1".into(), "h2".into()];
        b.image_hashes = vec!["h2".into(), "h3".into(), "h4".into()];
        assert_eq!(compare(&a, &b, &config).images, None);

        config.use_image_hashes = true;
        assert_eq!(compare(&a, &b, &config).images, Some(0.5));
    }

    #[test]
    fn test_same_address_within_tolerance() {
        let config = ResolverConfig::default();
        let a = listing("a", "1")
            .with_address("Rua das Flores 123")
            .with_price(250_000.0)
            .with_area(85.0);
        let b = listing("b", "2")
            .with_address("R. das Flores, 123")
            .with_price(272_000.0)
            .with_area(92.0);
        let score = compare(&a, &b, &config);
        assert!(score.same_address_within_tolerance);
        assert!(score.is_duplicate(config.threshold));

        let c = b.clone().with_price(420_000.0);
        let score = compare(&a, &c, &config);
        assert!(!score.same_address_within_tolerance);
        assert!(!score.is_duplicate(config.threshold));
    }

    #[test]
    fn test_units_in_one_building_are_not_merged() {
        let config = ResolverConfig::default();
        let mut first = listing("a", "1")
            .with_address("Rua das Flores 123, 1º Dto")
            .with_price(250_000.0)
            .with_area(85.0);
        first.floor = Some(1);
        first.typology = Some("T2".into());
        let mut fourth = listing("b", "2")
            .with_address("Rua das Flores 123, 4º Esq")
            .with_price(270_000.0)
            .with_area(92.0);
        fourth.floor = Some(4);
        fourth.typology = Some("T3".into());

        let score = compare(&first, &fourth, &config);
        assert!(score.reasons.contains(&MatchReason::SameAddress));
        assert_eq!(score.characteristics, Some(0.0));
        assert!(!score.same_address_within_tolerance);
        assert!(!score.is_duplicate(config.threshold));

        // Same unit re-listed with a different floor notation still matches.
        let mut relisted = fourth.clone().with_price(255_000.0).with_area(86.0);
        relisted.floor = Some(1);
        relisted.typology = Some("t2".into());
        assert!(compare(&first, &relisted, &config).same_address_within_tolerance);
    }
}
