use async_trait::async_trait;
use propmatch_core::aggregator::{AggregateOptions, Aggregator};
use propmatch_core::sources::{SourceClient, SourceFilters, SourceRegistry, StaticSource};
use propmatch_core::{EngineConfig, Result, SearchError, SearchQuery, SourceType};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

struct ThrowingSource;

#[async_trait]
impl SourceClient for ThrowingSource {
    fn name(&self) -> &str {
        "casasapo"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Portal
    }

    async fn search(&self, _filters: &SourceFilters) -> Result<Vec<Value>> {
        Err(SearchError::from_source("casasapo", "HTTP 503"))
    }
}

struct SlowSource;

#[async_trait]
impl SourceClient for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Aggregator
    }

    async fn search(&self, _filters: &SourceFilters) -> Result<Vec<Value>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![json!({"id": "never"})])
    }
}

fn portal(name: &str, records: Vec<Value>) -> StaticSource {
    StaticSource::new(name, SourceType::Portal, records)
}

#[tokio::test]
async fn test_one_failing_source_of_three() {
    let mut registry = SourceRegistry::new();
    registry.register(portal(
        "idealista",
        vec![json!({"id": "1", "address": "Rua Augusta 10", "price": 300000, "area": 100})],
    ));
    registry.register(portal(
        "imovirtual",
        vec![json!({"id": "7", "address": "Rua do Ouro 55", "price": 180000, "area": 60})],
    ));
    registry.register(ThrowingSource);

    let aggregator = Aggregator::from_config(registry, &EngineConfig::default());
    let result = aggregator
        .aggregate(&SearchQuery::default(), &AggregateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.sources_queried, 3);
    assert_eq!(result.sources_succeeded(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].source, "casasapo");
    assert!(result.failed[0].error.contains("HTTP 503"));
    assert_eq!(result.total_unique, 2);
    assert!(result.is_partial());
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let mut registry = SourceRegistry::new();
    registry.register(SlowSource);
    registry.register(portal("idealista", vec![json!({"id": "1", "price": 100000})]));

    let aggregator = Aggregator::from_config(registry, &EngineConfig::default());
    let options = AggregateOptions {
        timeout: Some(Duration::from_millis(100)),
        ..AggregateOptions::default()
    };

    let start = Instant::now();
    let result = aggregator
        .aggregate(&SearchQuery::default(), &options)
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].source, "slow");
    assert!(result.failed[0].is_timeout);
    assert_eq!(result.records.len(), 1);
}

#[tokio::test]
async fn test_all_sources_failing_is_not_an_error() {
    let mut registry = SourceRegistry::new();
    registry.register(ThrowingSource);

    let aggregator = Aggregator::from_config(registry, &EngineConfig::default());
    let result = aggregator
        .aggregate(&SearchQuery::default(), &AggregateOptions::default())
        .await
        .unwrap();
    assert!(result.all_failed());
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn test_cross_source_duplicates_are_merged() {
    let mut registry = SourceRegistry::new();
    registry.register(portal(
        "idealista",
        vec![json!({
            "propertyCode": "A1",
            "address": "Rua das Flores 123",
            "price": 250000,
            "size": 85,
            "district": "Lisboa"
        })],
    ));
    registry.register(portal(
        "imovirtual",
        vec![json!({
            "id": "B7",
            "morada": "Rua das Flores, 123",
            "preco": "255 000 €",
            "area_util": "85",
            "tipologia": "T2",
            "distrito": "Lisboa"
        })],
    ));

    let aggregator = Aggregator::from_config(registry, &EngineConfig::default());
    let result = aggregator
        .aggregate(&SearchQuery::default(), &AggregateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.total_raw, 2);
    assert_eq!(result.duplicates_merged, 1);
    assert_eq!(result.total_unique, 1);
    assert_eq!(result.records[0].portal_count(), 2);
    assert_eq!(result.records[0].bedrooms, Some(2));

    let options = AggregateOptions {
        deduplicate: Some(false),
        ..AggregateOptions::default()
    };
    let result = aggregator
        .aggregate(&SearchQuery::default(), &options)
        .await
        .unwrap();
    assert_eq!(result.total_unique, 2);
    assert_eq!(result.duplicates_merged, 0);
}

#[tokio::test]
async fn test_source_selection() {
    let mut registry = SourceRegistry::new();
    registry.register(portal("idealista", vec![json!({"id": "1"})]));
    registry.register(portal("imovirtual", vec![json!({"id": "2"})]));

    let aggregator = Aggregator::from_config(registry, &EngineConfig::default());
    let options = AggregateOptions {
        sources: vec!["imovirtual".to_string()],
        ..AggregateOptions::default()
    };
    let result = aggregator
        .aggregate(&SearchQuery::default(), &options)
        .await
        .unwrap();
    assert_eq!(result.sources_queried, 1);
    assert_eq!(result.records[0].id, "imovirtual:2");
}
