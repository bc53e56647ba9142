//! Aggregation engine.
//!
//! Fans one query out to the selected sources concurrently, races each call
//! against the per-source timeout, then resolves duplicates across the
//! combined results.

use super::{AggregateOptions, AggregationResult, SourceOutcome};
use crate::config::{AggregatorConfig, EngineConfig};
use crate::cpu_pool::spawn_cpu;
use crate::error::Result;
use crate::resolver::EntityResolver;
use crate::search::SearchQuery;
use crate::sources::{normalize_records, SourceRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct Aggregator {
    registry: SourceRegistry,
    resolver: EntityResolver,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, resolver: EntityResolver, config: AggregatorConfig) -> Self {
        Self {
            registry,
            resolver,
            config,
        }
    }

    pub fn from_config(registry: SourceRegistry, config: &EngineConfig) -> Self {
        Self::new(
            registry,
            EntityResolver::new(config.resolver.clone()),
            config.aggregator.clone(),
        )
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Query every selected source and combine what comes back.
    ///
    /// A failing or slow source is reported in `failed` and never aborts its
    /// siblings; only an internal resolver failure is returned as `Err`.
    pub async fn aggregate(
        &self,
        query: &SearchQuery,
        options: &AggregateOptions,
    ) -> Result<AggregationResult> {
        let start = Instant::now();
        let clients = self.registry.select(&options.sources);
        let timeout_dur = options
            .timeout
            .unwrap_or_else(|| Duration::from_millis(self.config.timeout_ms));
        let tenant = options.tenant_id.as_deref().or(query.tenant_id.as_deref());

        let mut result = AggregationResult::new(clients.len());

        let futures: Vec<_> = clients
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                let filters = client.translate(query, tenant);
                async move {
                    let name = client.name().to_string();
                    let source_start = Instant::now();
                    debug!(source = %name, "querying source");

                    match timeout(timeout_dur, client.search(&filters)).await {
                        Ok(Ok(raw)) => {
                            let batch = normalize_records(&name, client.source_type(), raw);
                            Ok(SourceOutcome {
                                source: name,
                                source_type: client.source_type(),
                                count: batch.records.len(),
                                records: batch.records,
                                skipped: batch.skipped,
                                duration_ms: Some(source_start.elapsed().as_millis() as u64),
                            })
                        }
                        Ok(Err(e)) => Err((name, e.to_string(), false)),
                        Err(_) => Err((
                            name,
                            format!("timeout after {}ms", timeout_dur.as_millis()),
                            true,
                        )),
                    }
                }
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;

        for outcome in outcomes {
            match outcome {
                Ok(source) => {
                    debug!(
                        source = %source.source,
                        count = source.count,
                        duration_ms = source.duration_ms.unwrap_or(0),
                        "source finished"
                    );
                    result.add_source(source);
                }
                Err((source, error, is_timeout)) => {
                    warn!(source = %source, error = %error, is_timeout, "source failed");
                    result.add_failure(source, error, is_timeout);
                }
            }
        }

        let combined: Vec<_> = result
            .sources
            .iter()
            .flat_map(|s| s.records.iter().cloned())
            .collect();

        let deduplicate = options.deduplicate.unwrap_or(self.config.deduplicate);
        if deduplicate && combined.len() > 1 {
            let resolver = self.resolver.clone();
            let resolution = spawn_cpu(move || Ok(resolver.deduplicate(combined))).await?;
            result.duplicates_merged = resolution.merged_away;
            result.records = resolution.records;
            result.groups = resolution.groups;
        } else {
            result.records = combined;
        }
        result.total_unique = result.records.len();
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            queried = result.sources_queried,
            succeeded = result.sources_succeeded(),
            failed = result.failed.len(),
            raw = result.total_raw,
            unique = result.total_unique,
            duration_ms = result.duration_ms,
            "aggregation finished"
        );
        Ok(result)
    }
}
