//! Raw feed records → [`PropertyRecord`].
//!
//! Feeds disagree on field names (`price` / `preco`, `area` / `area_util`,
//! `municipality` / `concelho`, ...), on number formats (`"250 000 €"`) and
//! on nesting (`location: {..}` vs. flat). Every lookup below tries a list
//! of aliases at the top level and then inside a nested location object.
//! Unparseable values become absent; only a missing identity drops a
//! record.

use crate::model::{
    Condition, DataQuality, PricePoint, PropertyRecord, PropertyType, SourceAttribution,
    SourceType, TransactionType,
};
use crate::resolver::geo;
use crate::utils::{normalize_typology, parse_datetime, parse_number, typology_bedrooms};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

const ID_KEYS: &[&str] = &[
    "source_id",
    "external_id",
    "externalId",
    "listing_id",
    "listingId",
    "propertyCode",
    "reference",
    "referencia",
    "codigo",
    "id",
];
const URL_KEYS: &[&str] = &["url", "link", "permalink"];
const TITLE_KEYS: &[&str] = &["title", "titulo", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "descricao"];
const TYPE_KEYS: &[&str] = &["property_type", "propertyType", "type", "tipo", "tipo_imovel"];
const TRANSACTION_KEYS: &[&str] = &[
    "transaction_type",
    "transactionType",
    "operation",
    "negocio",
    "operacao",
];
const LOCATION_OBJECT_KEYS: &[&str] = &["location", "localizacao", "address_info"];
const DISTRICT_KEYS: &[&str] = &["district", "distrito", "province"];
const MUNICIPALITY_KEYS: &[&str] = &["municipality", "concelho", "city", "cidade"];
const PARISH_KEYS: &[&str] = &["parish", "freguesia", "neighborhood", "bairro"];
const POSTAL_KEYS: &[&str] = &["postal_code", "postalCode", "zip", "codigo_postal", "cp"];
const ADDRESS_KEYS: &[&str] = &["address", "morada", "street", "rua"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LON_KEYS: &[&str] = &["lon", "lng", "longitude"];
const GEOHASH_KEYS: &[&str] = &["geohash"];
const PRICE_KEYS: &[&str] = &["price", "preco", "valor", "asking_price", "askingPrice"];
const AREA_KEYS: &[&str] = &[
    "area",
    "area_util",
    "areaUtil",
    "usable_area",
    "usableArea",
    "size",
    "area_m2",
];
const BEDROOM_KEYS: &[&str] = &["bedrooms", "quartos", "rooms", "num_quartos"];
const BATHROOM_KEYS: &[&str] = &["bathrooms", "casas_banho", "wc"];
const FLOOR_KEYS: &[&str] = &["floor", "andar", "piso"];
const YEAR_KEYS: &[&str] = &[
    "construction_year",
    "constructionYear",
    "year_built",
    "ano_construcao",
];
const TYPOLOGY_KEYS: &[&str] = &["typology", "tipologia"];
const CONDITION_KEYS: &[&str] = &["condition", "estado"];
const FEATURE_KEYS: &[&str] = &["features", "caracteristicas", "amenities"];
const IMAGE_KEYS: &[&str] = &["images", "fotos", "photos"];
const IMAGE_HASH_KEYS: &[&str] = &["image_hashes", "imageHashes"];
const HISTORY_KEYS: &[&str] = &["price_history", "priceHistory"];
const FIRST_SEEN_KEYS: &[&str] = &["first_seen", "firstSeen", "created_at", "createdAt"];
const LAST_SEEN_KEYS: &[&str] = &["last_seen", "lastSeen"];
const PUBLISHED_KEYS: &[&str] = &["published_at", "publishedAt", "data_publicacao"];
const UPDATED_KEYS: &[&str] = &["updated_at", "updatedAt", "modified_at"];
const QUALITY_KEYS: &[&str] = &["data_quality", "dataQuality", "quality"];
const SOURCE_NAME_KEYS: &[&str] = &["source_name", "portal", "source"];

/// Normalized records from one feed, plus how many raw records had no
/// usable identity.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<PropertyRecord>,
    pub skipped: usize,
}

pub fn normalize_records(source: &str, source_type: SourceType, raw: Vec<Value>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for value in &raw {
        match normalize_record(source, source_type, value) {
            Some(record) => batch.records.push(record),
            None => batch.skipped += 1,
        }
    }
    if batch.skipped > 0 {
        debug!(source, skipped = batch.skipped, "records without identity skipped");
    }
    batch
}

/// Normalize a record whose feed is named inside the record itself
/// (`source_name`/`portal`/`source`), falling back to `default_source`.
pub fn normalize_standalone(default_source: &str, raw: &Value) -> Option<PropertyRecord> {
    let obj = raw.as_object()?;
    let source = get_str(obj, SOURCE_NAME_KEYS).unwrap_or_else(|| default_source.to_string());
    let source_type = obj
        .get("source_type")
        .and_then(|v| serde_json::from_value::<SourceType>(v.clone()).ok())
        .unwrap_or_default();
    normalize_record(&source, source_type, raw)
}

/// `None` when the value is not an object or has no identity.
pub fn normalize_record(source: &str, source_type: SourceType, raw: &Value) -> Option<PropertyRecord> {
    let obj = raw.as_object()?;
    let location_obj = LOCATION_OBJECT_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_object));

    let url = get_str(obj, URL_KEYS);
    let external_id = get_str(obj, ID_KEYS)
        .map(|id| strip_source_prefix(&id, source))
        .or_else(|| url.clone())?;

    let mut attribution = SourceAttribution::new(source_type, source, external_id);
    attribution.url = url;
    let mut record = PropertyRecord::new(attribution);

    record.title = get_str(obj, TITLE_KEYS);
    record.description = get_str(obj, DESCRIPTION_KEYS);
    record.property_type = get_str(obj, TYPE_KEYS).and_then(|t| PropertyType::parse(&t));
    record.transaction_type =
        get_str(obj, TRANSACTION_KEYS).and_then(|t| TransactionType::parse(&t));

    let loc_str = |keys: &[&str]| get_str(obj, keys).or_else(|| location_obj.and_then(|l| get_str(l, keys)));
    let loc_num = |keys: &[&str]| get_f64(obj, keys).or_else(|| location_obj.and_then(|l| get_f64(l, keys)));
    record.location.district = loc_str(DISTRICT_KEYS);
    record.location.municipality = loc_str(MUNICIPALITY_KEYS);
    record.location.parish = loc_str(PARISH_KEYS);
    record.location.postal_code = loc_str(POSTAL_KEYS);
    record.location.address = loc_str(ADDRESS_KEYS);
    record.location.geohash = loc_str(GEOHASH_KEYS)
        .map(|hash| hash.trim().to_ascii_lowercase())
        .filter(|hash| geo::is_valid(hash));
    if let (Some(lat), Some(lon)) = (loc_num(LAT_KEYS), loc_num(LON_KEYS)) {
        record.location.lat = Some(lat);
        record.location.lon = Some(lon);
        if record.location.coordinates().is_none() {
            record.location.lat = None;
            record.location.lon = None;
        }
    }

    record.price = get_f64(obj, PRICE_KEYS).filter(|p| *p >= 0.0);
    record.area = get_f64(obj, AREA_KEYS).filter(|a| *a >= 0.0);
    record.bathrooms = get_u32(obj, BATHROOM_KEYS);
    record.floor = get_f64(obj, FLOOR_KEYS).map(|f| f as i32);
    record.construction_year = get_f64(obj, YEAR_KEYS).map(|y| y as i32);
    record.condition = get_str(obj, CONDITION_KEYS).and_then(|c| Condition::parse(&c));

    let typology = get_str(obj, TYPOLOGY_KEYS);
    record.bedrooms = get_u32(obj, BEDROOM_KEYS)
        .or_else(|| typology.as_deref().and_then(typology_bedrooms));
    record.typology = typology
        .as_deref()
        .and_then(normalize_typology)
        .or_else(|| record.bedrooms.map(|n| format!("T{}", n)));

    record.features = get_str_list(obj, FEATURE_KEYS)
        .into_iter()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    record.images = get_str_list(obj, IMAGE_KEYS);
    record.image_hashes = get_str_list(obj, IMAGE_HASH_KEYS);
    record.price_history = get_price_history(obj);

    record.first_seen = get_date(obj, FIRST_SEEN_KEYS);
    record.last_seen = get_date(obj, LAST_SEEN_KEYS);
    record.published_at = get_date(obj, PUBLISHED_KEYS);
    record.updated_at = get_date(obj, UPDATED_KEYS);
    record.data_quality = get_str(obj, QUALITY_KEYS).and_then(|q| match q.to_lowercase().as_str() {
        "high" | "alta" => Some(DataQuality::High),
        "medium" | "media" | "média" => Some(DataQuality::Medium),
        "low" | "baixa" => Some(DataQuality::Low),
        _ => None,
    });

    // Canonical JSON may carry attributions from an earlier merge.
    if let Some(Value::Array(sources)) = obj.get("sources") {
        for value in sources {
            if let Ok(extra) = serde_json::from_value::<SourceAttribution>(value.clone()) {
                if !record.sources.contains(&extra)
                    && !(extra.name == record.source_name && extra.external_id == record.source_id)
                {
                    record.sources.push(extra);
                }
            }
        }
    }

    Some(record)
}

/// Canonical ids look like `"<source>:<id>"`; keep only the id part.
fn strip_source_prefix(id: &str, source: &str) -> String {
    id.strip_prefix(source)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(id)
        .to_string()
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn get_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn get_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    })
}

fn get_u32(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    get_f64(obj, keys)
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

/// Strings, or objects carrying a `url`, from the first array-valued alias.
fn get_str_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(Value::Array(items)) = first(obj, keys) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(o) => get_str(o, &["url", "src", "name"]),
            _ => None,
        })
        .collect()
}

fn value_to_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Epoch milliseconds are at least 1e11 for any date after 1973.
            if n.abs() >= 100_000_000_000 {
                Utc.timestamp_millis_opt(n).single()
            } else {
                Utc.timestamp_opt(n, 0).single()
            }
        }
        _ => None,
    }
}

fn get_date(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(value_to_date))
}

fn get_price_history(obj: &Map<String, Value>) -> Vec<PricePoint> {
    let Some(Value::Array(points)) = first(obj, HISTORY_KEYS) else {
        return Vec::new();
    };
    points
        .iter()
        .filter_map(|point| {
            let point = point.as_object()?;
            let price = get_f64(point, &["price", "preco", "valor"])?;
            let at = get_date(point, &["at", "date", "data"])?;
            Some(PricePoint { price, at })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_portuguese_aliases() {
        let raw = json!({
            "referencia": "IMO-77",
            "tipo": "Apartamento",
            "negocio": "venda",
            "preco": "250 000 €",
            "area_util": "85,5",
            "tipologia": "T2",
            "concelho": "Lisboa",
            "freguesia": "Arroios",
            "distrito": "Lisboa",
            "morada": "Rua das Flores 123",
            "created_at": "2024-03-01"
        });
        let record = normalize_record("imovirtual", SourceType::Portal, &raw).unwrap();
        assert_eq!(record.id, "imovirtual:IMO-77");
        assert_eq!(record.property_type, Some(PropertyType::Apartment));
        assert_eq!(record.transaction_type, Some(TransactionType::Sale));
        assert_eq!(record.price, Some(250_000.0));
        assert_eq!(record.area, Some(85.5));
        assert_eq!(record.bedrooms, Some(2));
        assert_eq!(record.typology.as_deref(), Some("T2"));
        assert_eq!(record.location.municipality.as_deref(), Some("Lisboa"));
        assert_eq!(record.location.parish.as_deref(), Some("Arroios"));
        assert!(record.first_seen.is_some());
    }

    #[test]
    fn test_nested_location_and_numbers() {
        let raw = json!({
            "id": 42,
            "price": 180000,
            "location": {"district": "Porto", "lat": 41.15, "lng": -8.61},
            "images": [{"url": "https://img/1.jpg"}, "https://img/2.jpg"],
            "updatedAt": 1_700_000_000_000i64
        });
        let record = normalize_record("idealista", SourceType::Portal, &raw).unwrap();
        assert_eq!(record.source_id, "42");
        assert_eq!(record.location.district.as_deref(), Some("Porto"));
        assert_eq!(record.location.coordinates(), Some((41.15, -8.61)));
        assert_eq!(record.images.len(), 2);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_bad_values_become_absent() {
        let raw = json!({
            "id": "x1",
            "price": "sob consulta",
            "lat": 123.0,
            "lon": 10.0,
            "first_seen": "not a date",
            "tipo": "castelo"
        });
        let record = normalize_record("crm", SourceType::Crm, &raw).unwrap();
        assert_eq!(record.price, None);
        assert_eq!(record.location.lat, None);
        assert_eq!(record.first_seen, None);
        assert_eq!(record.property_type, None);
    }

    #[test]
    fn test_geohash_outside_alphabet_is_dropped() {
        let bad = json!({"id": "g1", "geohash": "eycs0pé"});
        let good = json!({"id": "g2", "location": {"geohash": " EYCS0P3 "}});
        let bad = normalize_record("portal", SourceType::Portal, &bad).unwrap();
        let good = normalize_record("portal", SourceType::Portal, &good).unwrap();
        assert_eq!(bad.location.geohash, None);
        assert_eq!(good.location.geohash.as_deref(), Some("eycs0p3"));
    }

    #[test]
    fn test_missing_identity_is_skipped() {
        let raw = vec![
            json!({"price": 100000}),
            json!({"url": "https://portal.example/l/9"}),
            json!("not an object"),
        ];
        let batch = normalize_records("portal", SourceType::Portal, raw);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.records[0].source_id, "https://portal.example/l/9");
    }

    #[test]
    fn test_canonical_json_roundtrip_keeps_identity() {
        let mut original =
            PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "idealista", "1"))
                .with_price(200_000.0)
                .with_district("Faro");
        original
            .sources
            .push(SourceAttribution::new(SourceType::Portal, "imovirtual", "9"));
        let value = serde_json::to_value(&original).unwrap();

        let record = normalize_standalone("fixture", &value).unwrap();
        assert_eq!(record.id, "idealista:1");
        assert_eq!(record.price, Some(200_000.0));
        assert_eq!(record.portal_count(), 2);
    }
}
