//! Canonical property record shared by every stage of the pipeline.
//!
//! Records are produced by [`crate::sources::normalize`] from whatever shape an
//! upstream feed returns, then merged by the resolver and ranked by the scorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of upstream feed a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Licensed aggregator API
    Aggregator,
    /// Classified-ad portal
    #[default]
    Portal,
    /// Internal CRM
    Crm,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Aggregator => "aggregator",
            SourceType::Portal => "portal",
            SourceType::Crm => "crm",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Land,
    Commercial,
    Office,
    Warehouse,
    Garage,
    Building,
    Farm,
    Other,
}

impl PropertyType {
    pub const ALL: [PropertyType; 10] = [
        PropertyType::Apartment,
        PropertyType::House,
        PropertyType::Land,
        PropertyType::Commercial,
        PropertyType::Office,
        PropertyType::Warehouse,
        PropertyType::Garage,
        PropertyType::Building,
        PropertyType::Farm,
        PropertyType::Other,
    ];

    /// Parse the labels portals actually send, English or Portuguese.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        let parsed = match value.as_str() {
            "apartment" | "apartamento" | "flat" | "andar" | "duplex" | "penthouse" => {
                PropertyType::Apartment
            }
            "house" | "moradia" | "vivenda" | "villa" | "casa" | "townhouse" => PropertyType::House,
            "land" | "terreno" | "lote" | "plot" => PropertyType::Land,
            "commercial" | "loja" | "shop" | "retail" | "comercial" => PropertyType::Commercial,
            "office" | "escritorio" | "escritório" => PropertyType::Office,
            "warehouse" | "armazem" | "armazém" => PropertyType::Warehouse,
            "garage" | "garagem" | "parking" | "estacionamento" => PropertyType::Garage,
            "building" | "predio" | "prédio" => PropertyType::Building,
            "farm" | "quinta" | "herdade" | "monte" => PropertyType::Farm,
            "other" | "outro" => PropertyType::Other,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Land => "land",
            PropertyType::Commercial => "commercial",
            PropertyType::Office => "office",
            PropertyType::Warehouse => "warehouse",
            PropertyType::Garage => "garage",
            PropertyType::Building => "building",
            PropertyType::Farm => "farm",
            PropertyType::Other => "other",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Rent,
}

impl TransactionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sale" | "sell" | "buy" | "venda" | "comprar" => Some(TransactionType::Sale),
            "rent" | "rental" | "lease" | "arrendamento" | "arrendar" | "aluguer" => {
                Some(TransactionType::Rent)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Rent => "rent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    LikeNew,
    Used,
    Renovated,
    ToRenovate,
    UnderConstruction,
}

impl Condition {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "new" | "novo" => Some(Condition::New),
            "like_new" | "como_novo" => Some(Condition::LikeNew),
            "used" | "usado" | "good" => Some(Condition::Used),
            "renovated" | "renovado" | "remodelado" => Some(Condition::Renovated),
            "to_renovate" | "para_recuperar" | "needs_renovation" | "ruina" | "ruína" => {
                Some(Condition::ToRenovate)
            }
            "under_construction" | "em_construcao" | "em_construção" | "off_plan" => {
                Some(Condition::UnderConstruction)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

/// Which upstream feed contributed to a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source_type: SourceType,
    pub name: String,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceAttribution {
    pub fn new(
        source_type: SourceType,
        name: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            source_type,
            name: name.into(),
            external_id: external_id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,
}

impl Location {
    /// Both coordinates present and inside the valid WGS84 range.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon))
                if lat.is_finite()
                    && lon.is_finite()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lon) =>
            {
                Some((lat, lon))
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.district.is_none()
            && self.municipality.is_none()
            && self.parish.is_none()
            && self.postal_code.is_none()
            && self.address.is_none()
            && self.coordinates().is_none()
            && self.geohash.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub at: DateTime<Utc>,
}

/// Normalized listing, independent of any source schema.
///
/// Invariant: `sources` is never empty. Constructors take the first
/// attribution up front and [`crate::resolver::merge`] only ever adds more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Canonical id, `"<source name>:<source id>"` of the first attribution.
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,

    #[serde(default)]
    pub location: Location,

    /// Asking price; `None` or zero means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Usable area in m²
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_year: Option<i32>,
    /// Portuguese typology label, e.g. `T2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub features: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_hashes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_history: Vec<PricePoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,

    pub sources: Vec<SourceAttribution>,

    // Display-only copies written by the search orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display_reasons: Vec<String>,
}

impl PropertyRecord {
    pub fn new(attribution: SourceAttribution) -> Self {
        Self {
            id: format!("{}:{}", attribution.name, attribution.external_id),
            source_id: attribution.external_id.clone(),
            source_name: attribution.name.clone(),
            source_type: attribution.source_type,
            title: None,
            description: None,
            property_type: None,
            transaction_type: None,
            location: Location::default(),
            price: None,
            area: None,
            bedrooms: None,
            bathrooms: None,
            floor: None,
            construction_year: None,
            typology: None,
            condition: None,
            features: BTreeSet::new(),
            images: Vec::new(),
            image_hashes: Vec::new(),
            price_history: Vec::new(),
            first_seen: None,
            last_seen: None,
            published_at: None,
            updated_at: None,
            data_quality: None,
            sources: vec![attribution],
            display_score: None,
            display_reasons: Vec::new(),
        }
    }

    /// Price if known; zero, negative and non-finite prices count as unknown.
    pub fn known_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn known_area(&self) -> Option<f64> {
        self.area.filter(|a| a.is_finite() && *a > 0.0)
    }

    pub fn price_per_m2(&self) -> Option<f64> {
        match (self.known_price(), self.known_area()) {
            (Some(price), Some(area)) => Some(price / area),
            _ => None,
        }
    }

    /// Distinct portal names across attributions.
    pub fn portal_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn portal_count(&self) -> usize {
        self.sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of populated optional fields, used to pick the merge primary.
    pub fn completeness(&self) -> usize {
        let loc = &self.location;
        [
            self.title.is_some(),
            self.description.is_some(),
            self.property_type.is_some(),
            self.transaction_type.is_some(),
            loc.district.is_some(),
            loc.municipality.is_some(),
            loc.parish.is_some(),
            loc.postal_code.is_some(),
            loc.address.is_some(),
            loc.coordinates().is_some(),
            loc.geohash.is_some(),
            self.known_price().is_some(),
            self.known_area().is_some(),
            self.bedrooms.is_some(),
            self.bathrooms.is_some(),
            self.floor.is_some(),
            self.construction_year.is_some(),
            self.typology.is_some(),
            self.condition.is_some(),
            !self.features.is_empty(),
            !self.images.is_empty(),
            !self.image_hashes.is_empty(),
            self.first_seen.is_some(),
            self.last_seen.is_some(),
            self.published_at.is_some(),
            self.data_quality.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.location.address = Some(address.into());
        self
    }

    pub fn with_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = Some(property_type);
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.location.district = Some(district.into());
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.location.lat = Some(lat);
        self.location.lon = Some(lon);
        self
    }

    pub fn with_first_seen(mut self, at: DateTime<Utc>) -> Self {
        self.first_seen = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, id: &str) -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, name, id))
    }

    #[test]
    fn test_new_record_has_attribution() {
        let r = record("idealista", "123");
        assert_eq!(r.id, "idealista:123");
        assert_eq!(r.sources.len(), 1);
        assert_eq!(r.portal_count(), 1);
    }

    #[test]
    fn test_portal_count_is_distinct_names() {
        let mut r = record("idealista", "1");
        r.sources
            .push(SourceAttribution::new(SourceType::Portal, "idealista", "2"));
        r.sources
            .push(SourceAttribution::new(SourceType::Crm, "crm", "77"));
        assert_eq!(r.portal_count(), 2);
        assert_eq!(r.portal_names(), vec!["crm".to_string(), "idealista".to_string()]);
    }

    #[test]
    fn test_zero_price_is_unknown() {
        let r = record("a", "1").with_price(0.0).with_area(80.0);
        assert_eq!(r.known_price(), None);
        assert_eq!(r.price_per_m2(), None);
        let r = r.with_price(160_000.0);
        assert_eq!(r.price_per_m2(), Some(2000.0));
    }

    #[test]
    fn test_completeness_counts_fields() {
        let bare = record("a", "1");
        let rich = record("a", "2")
            .with_price(100_000.0)
            .with_area(50.0)
            .with_address("Rua X 1");
        assert!(rich.completeness() > bare.completeness());
        assert_eq!(rich.completeness() - bare.completeness(), 3);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(PropertyType::parse("Moradia"), Some(PropertyType::House));
        assert_eq!(PropertyType::parse("apartamento"), Some(PropertyType::Apartment));
        assert_eq!(PropertyType::parse("castle"), None);
        assert_eq!(TransactionType::parse("Venda"), Some(TransactionType::Sale));
        assert_eq!(Condition::parse("to-renovate"), Some(Condition::ToRenovate));
    }

    #[test]
    fn test_invalid_coordinates_ignored() {
        let mut loc = Location {
            lat: Some(95.0),
            lon: Some(10.0),
            ..Location::default()
        };
        assert!(loc.coordinates().is_none());
        loc.lat = Some(38.7);
        assert_eq!(loc.coordinates(), Some((38.7, 10.0)));
    }
}
