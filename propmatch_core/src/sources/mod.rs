//! Upstream listing feeds.
//!
//! Every feed (aggregator API, portal, CRM) implements [`SourceClient`].
//! Adding a feed means registering another implementation in the
//! [`SourceRegistry`]; nothing downstream branches on source names.

mod http;
pub mod normalize;
mod static_source;

pub use http::{extract_records, HttpSourceClient};
pub use normalize::{normalize_record, normalize_records, NormalizedBatch};
pub use static_source::StaticSource;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::model::SourceType;
use crate::search::SearchQuery;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Filters in a source's own vocabulary, sent as a JSON object.
pub type SourceFilters = Map<String, Value>;

#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Unique name, also used as the attribution name on every record.
    fn name(&self) -> &str;

    fn source_type(&self) -> SourceType;

    fn description(&self) -> &str {
        ""
    }

    /// Translate the generic query into this source's filter vocabulary.
    fn translate(&self, query: &SearchQuery, tenant_id: Option<&str>) -> SourceFilters {
        generic_filters(query, tenant_id)
    }

    /// Run the filters upstream and return raw records.
    async fn search(&self, filters: &SourceFilters) -> Result<Vec<Value>>;
}

/// The generic filter vocabulary. Absent constraints are left out.
pub fn generic_filters(query: &SearchQuery, tenant_id: Option<&str>) -> SourceFilters {
    let mut filters = Map::new();
    let mut put = |key: &str, value: Value| {
        if !value.is_null() {
            filters.insert(key.to_string(), value);
        }
    };

    if !query.property_types.is_empty() {
        let types: Vec<&str> = query.property_types.iter().map(|t| t.as_str()).collect();
        put("property_types", json!(types));
    }
    put(
        "transaction_type",
        json!(query.transaction_type.map(|t| t.as_str())),
    );
    put("district", json!(query.district));
    put("municipality", json!(query.municipality));
    put("parish", json!(query.parish));
    put("min_price", json!(query.min_price));
    put("max_price", json!(query.max_price));
    put("min_area", json!(query.min_area));
    put("max_area", json!(query.max_area));
    put("bedrooms", json!(query.bedrooms));
    put("min_bedrooms", json!(query.min_bedrooms));
    put("max_bedrooms", json!(query.max_bedrooms));
    if !query.typologies.is_empty() {
        put("typologies", json!(query.typologies));
    }
    put("tenant_id", json!(tenant_id));
    filters
}

/// Rename generic keys to a source's own names; unmapped keys pass through.
pub fn apply_vocabulary(filters: SourceFilters, vocabulary: &HashMap<String, String>) -> SourceFilters {
    if vocabulary.is_empty() {
        return filters;
    }
    filters
        .into_iter()
        .map(|(key, value)| match vocabulary.get(&key) {
            Some(renamed) => (renamed.clone(), value),
            None => (key, value),
        })
        .collect()
}

/// Descriptive row for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub source_type: SourceType,
    pub description: String,
}

/// Name → client, iterated in name order so fan-out and reports are stable.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    clients: BTreeMap<String, Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every enabled configured source.
    pub fn from_config(sources: &[SourceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for source in sources.iter().filter(|s| s.enabled) {
            registry.register(HttpSourceClient::new(source.clone())?);
        }
        Ok(registry)
    }

    /// Register a client, replacing any previous one with the same name.
    pub fn register<C: SourceClient + 'static>(&mut self, client: C) {
        self.register_arc(Arc::new(client));
    }

    pub fn register_arc(&mut self, client: Arc<dyn SourceClient>) {
        self.clients.insert(client.name().to_string(), client);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceClient>> {
        self.clients.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn clients(&self) -> impl Iterator<Item = &Arc<dyn SourceClient>> {
        self.clients.values()
    }

    /// Clients named in `names`, or all of them when `names` is empty.
    /// Unknown names are ignored.
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn SourceClient>> {
        if names.is_empty() {
            return self.clients.values().cloned().collect();
        }
        self.clients
            .iter()
            .filter(|(name, _)| names.iter().any(|n| n == *name))
            .map(|(_, client)| client.clone())
            .collect()
    }

    pub fn list(&self) -> Vec<SourceInfo> {
        self.clients
            .values()
            .map(|c| SourceInfo {
                name: c.name().to_string(),
                source_type: c.source_type(),
                description: c.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyType;

    #[test]
    fn test_generic_filters_skip_absent() {
        let query = SearchQuery {
            property_types: vec![PropertyType::Apartment],
            district: Some("Lisboa".into()),
            max_price: Some(300_000.0),
            ..SearchQuery::default()
        };
        let filters = generic_filters(&query, Some("team-7"));
        assert_eq!(filters["property_types"], json!(["apartment"]));
        assert_eq!(filters["district"], json!("Lisboa"));
        assert_eq!(filters["max_price"], json!(300_000.0));
        assert_eq!(filters["tenant_id"], json!("team-7"));
        assert!(!filters.contains_key("min_price"));
        assert!(!filters.contains_key("municipality"));
    }

    #[test]
    fn test_apply_vocabulary() {
        let query = SearchQuery {
            min_price: Some(100_000.0),
            district: Some("Porto".into()),
            ..SearchQuery::default()
        };
        let mut vocabulary = HashMap::new();
        vocabulary.insert("min_price".to_string(), "precoMin".to_string());
        let filters = apply_vocabulary(generic_filters(&query, None), &vocabulary);
        assert_eq!(filters["precoMin"], json!(100_000.0));
        assert_eq!(filters["district"], json!("Porto"));
        assert!(!filters.contains_key("min_price"));
    }

    #[test]
    fn test_registry_select_and_order() {
        let mut registry = SourceRegistry::new();
        registry.register(StaticSource::new("portal-b", SourceType::Portal, vec![]));
        registry.register(StaticSource::new("crm", SourceType::Crm, vec![]));
        registry.register(StaticSource::new("portal-a", SourceType::Portal, vec![]));

        assert_eq!(registry.names(), vec!["crm", "portal-a", "portal-b"]);
        assert_eq!(registry.select(&[]).len(), 3);
        let picked = registry.select(&["portal-a".to_string(), "nope".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name(), "portal-a");
    }
}
