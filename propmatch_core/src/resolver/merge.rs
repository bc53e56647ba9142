//! Pure record merge.

use crate::model::PropertyRecord;

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

fn fill_vec<T: Clone>(slot: &mut Vec<T>, other: &[T]) {
    if slot.is_empty() {
        slot.extend_from_slice(other);
    }
}

/// Build a new record from `primary`, filling its missing fields from
/// `duplicate`. Present fields are never overwritten; attributions are
/// unioned (primary's first, exact repeats dropped).
///
/// Neither input is modified, so merging the same pair twice is stable.
pub fn merge(primary: &PropertyRecord, duplicate: &PropertyRecord) -> PropertyRecord {
    let mut merged = primary.clone();

    fill(&mut merged.title, &duplicate.title);
    fill(&mut merged.description, &duplicate.description);
    fill(&mut merged.property_type, &duplicate.property_type);
    fill(&mut merged.transaction_type, &duplicate.transaction_type);

    let (loc, other) = (&mut merged.location, &duplicate.location);
    fill(&mut loc.district, &other.district);
    fill(&mut loc.municipality, &other.municipality);
    fill(&mut loc.parish, &other.parish);
    fill(&mut loc.postal_code, &other.postal_code);
    fill(&mut loc.address, &other.address);
    fill(&mut loc.geohash, &other.geohash);
    if loc.coordinates().is_none() && other.coordinates().is_some() {
        loc.lat = other.lat;
        loc.lon = other.lon;
    }

    if merged.known_price().is_none() && duplicate.known_price().is_some() {
        merged.price = duplicate.price;
    }
    if merged.known_area().is_none() && duplicate.known_area().is_some() {
        merged.area = duplicate.area;
    }
    fill(&mut merged.bedrooms, &duplicate.bedrooms);
    fill(&mut merged.bathrooms, &duplicate.bathrooms);
    fill(&mut merged.floor, &duplicate.floor);
    fill(&mut merged.construction_year, &duplicate.construction_year);
    fill(&mut merged.typology, &duplicate.typology);
    fill(&mut merged.condition, &duplicate.condition);
    if merged.features.is_empty() {
        merged.features.clone_from(&duplicate.features);
    }

    fill_vec(&mut merged.images, &duplicate.images);
    fill_vec(&mut merged.image_hashes, &duplicate.image_hashes);
    fill_vec(&mut merged.price_history, &duplicate.price_history);

    fill(&mut merged.first_seen, &duplicate.first_seen);
    fill(&mut merged.last_seen, &duplicate.last_seen);
    fill(&mut merged.published_at, &duplicate.published_at);
    fill(&mut merged.updated_at, &duplicate.updated_at);
    fill(&mut merged.data_quality, &duplicate.data_quality);

    for attribution in &duplicate.sources {
        if !merged.sources.contains(attribution) {
            merged.sources.push(attribution.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyType, SourceAttribution, SourceType};

    fn listing(portal: &str, id: &str) -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, portal, id))
    }

    #[test]
    fn test_fills_missing_without_overwriting() {
        let primary = listing("idealista", "1").with_price(250_000.0);
        let mut dup = listing("imovirtual", "9")
            .with_price(255_000.0)
            .with_area(85.0)
            .with_type(PropertyType::Apartment);
        dup.images = vec!["https://img/1.jpg".into()];

        let merged = merge(&primary, &dup);
        assert_eq!(merged.price, Some(250_000.0));
        assert_eq!(merged.area, Some(85.0));
        assert_eq!(merged.property_type, Some(PropertyType::Apartment));
        assert_eq!(merged.images.len(), 1);
        assert_eq!(merged.id, "idealista:1");
    }

    #[test]
    fn test_zero_price_is_filled() {
        let primary = listing("crm", "1").with_price(0.0);
        let dup = listing("portal", "2").with_price(180_000.0);
        assert_eq!(merge(&primary, &dup).price, Some(180_000.0));
    }

    #[test]
    fn test_unions_attributions_once() {
        let primary = listing("idealista", "1");
        let dup = listing("imovirtual", "9");
        let merged = merge(&primary, &dup);
        let merged_again = merge(&merged, &dup);
        assert_eq!(merged_again.sources.len(), 2);
        assert_eq!(merged_again.portal_count(), 2);
    }

    #[test]
    fn test_inputs_untouched() {
        let primary = listing("a", "1");
        let dup = listing("b", "2").with_area(40.0);
        let before = primary.clone();
        let _ = merge(&primary, &dup);
        assert_eq!(primary, before);
    }
}
