//! Search orchestrator.
//!
//! aggregate → geocode (optional) → filter → score → sort → stats/facets →
//! paginate. Validation happens before any source is contacted.

use super::filters;
use super::stats::{compute_facets, compute_stats};
use super::types::{
    total_pages, SearchOptions, SearchQuery, SearchResultItem, SearchResults, SortOrder,
    SourcesSummary,
};
use crate::aggregator::{AggregateOptions, Aggregator};
use crate::config::{EngineConfig, SearchDefaults};
use crate::cpu_pool::spawn_cpu;
use crate::error::Result;
use crate::geocode::{self, Geocoder};
use crate::model::PropertyRecord;
use crate::scoring::{MarketSnapshot, PropertyScore, RelevanceScorer, ScoringContext};
use crate::sources::SourceRegistry;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct SearchEngine {
    aggregator: Aggregator,
    scorer: RelevanceScorer,
    geocoder: Option<Arc<dyn Geocoder>>,
    defaults: SearchDefaults,
}

impl SearchEngine {
    pub fn new(aggregator: Aggregator, scorer: RelevanceScorer, defaults: SearchDefaults) -> Self {
        Self {
            aggregator,
            scorer,
            geocoder: None,
            defaults,
        }
    }

    /// Engine with a cached scorer and the configured defaults.
    pub fn from_config(registry: SourceRegistry, config: &EngineConfig) -> Self {
        Self::new(
            Aggregator::from_config(registry, config),
            RelevanceScorer::with_cache(config.scoring.clone()),
            config.search.clone(),
        )
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    pub fn defaults(&self) -> &SearchDefaults {
        &self.defaults
    }

    pub async fn search(&self, query: &SearchQuery, options: &SearchOptions) -> Result<SearchResults> {
        let start = Instant::now();
        query.validate()?;
        options.validate()?;

        let aggregate_options = AggregateOptions {
            sources: options.sources.clone(),
            timeout: options.timeout_ms.map(Duration::from_millis),
            deduplicate: options.deduplicate,
            tenant_id: query.tenant_id.clone(),
        };
        let aggregation = self.aggregator.aggregate(query, &aggregate_options).await?;

        let summary = SourcesSummary {
            queried: aggregation.sources_queried,
            succeeded: aggregation.succeeded(),
            failed: aggregation.failed.clone(),
        };
        let total_raw = aggregation.total_raw;
        let duplicates_merged = aggregation.duplicates_merged;
        let mut records = aggregation.records;

        if options.enable_geocoding {
            if let Some(geocoder) = &self.geocoder {
                let enriched = geocode::enrich(&mut records, geocoder.as_ref()).await;
                debug!(enriched, "geocoding finished");
            }
        }

        let before_filter = records.len();
        records.retain(|r| filters::matches(r, query));
        debug!(before = before_filter, after = records.len(), "filters applied");

        let scores = if options.enable_scoring && !records.is_empty() {
            let mut ctx = ScoringContext::new(options.mode)
                .with_hints(query.hints())
                .with_signals(options.signals.clone())
                .with_market(MarketSnapshot::from_records(&records));
            if let Some(user) = &options.user_id {
                ctx = ctx.with_user(user.clone());
            }
            let scorer = self.scorer.clone();
            let (records_back, scores) = spawn_cpu(move || {
                let scores = scorer.score_all(&records, &ctx);
                Ok((records, scores))
            })
            .await?;
            records = records_back;
            scores
        } else {
            vec![PropertyScore::neutral(); records.len()]
        };

        let mut scored: Vec<(PropertyRecord, PropertyScore)> = records.into_iter().zip(scores).collect();

        if let Some(min) = query.min_mode_score {
            scored.retain(|(_, s)| s.mode_score >= min);
        }

        sort_results(&mut scored, options.sort);

        let stats = compute_stats(&scored);
        let facets = compute_facets(&scored);

        let total = scored.len();
        let per_page = options.per_page.unwrap_or(self.defaults.per_page).max(1);
        let offset = (options.page - 1).saturating_mul(per_page);
        let threshold = self.defaults.highlight_threshold;
        let items: Vec<SearchResultItem> = scored
            .into_iter()
            .skip(offset)
            .take(per_page)
            .map(|(record, score)| SearchResultItem::new(record, score, threshold))
            .collect();

        let results = SearchResults {
            items,
            total,
            page: options.page,
            per_page,
            total_pages: total_pages(total, per_page),
            stats,
            facets,
            sources: summary,
            total_raw,
            duplicates_merged,
            mode: options.mode,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            total = results.total,
            page = results.page,
            returned = results.items.len(),
            failed_sources = results.sources.failed.len(),
            duration_ms = results.duration_ms,
            "search finished"
        );
        Ok(results)
    }
}

/// Known values first in the requested direction, unknown values last.
fn cmp_known<T: PartialOrd>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_results(scored: &mut [(PropertyRecord, PropertyScore)], order: SortOrder) {
    scored.sort_by(|(ra, sa), (rb, sb)| {
        let primary = match order {
            SortOrder::Score => cmp_known(Some(sa.final_score), Some(sb.final_score), true),
            SortOrder::PriceAsc => cmp_known(ra.known_price(), rb.known_price(), false),
            SortOrder::PriceDesc => cmp_known(ra.known_price(), rb.known_price(), true),
            SortOrder::AreaAsc => cmp_known(ra.known_area(), rb.known_area(), false),
            SortOrder::AreaDesc => cmp_known(ra.known_area(), rb.known_area(), true),
            SortOrder::Recent => cmp_known(
                ra.published_at.or(ra.first_seen),
                rb.published_at.or(rb.first_seen),
                true,
            ),
            SortOrder::PortalCount => ra.portal_count().cmp(&rb.portal_count()).reverse(),
        };
        primary.then_with(|| ra.id.cmp(&rb.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceAttribution, SourceType};

    fn entry(id: &str, price: Option<f64>, score: f64) -> (PropertyRecord, PropertyScore) {
        let mut record = PropertyRecord::new(SourceAttribution::new(SourceType::Portal, "p", id));
        record.price = price;
        let mut s = PropertyScore::neutral();
        s.final_score = score;
        (record, s)
    }

    fn ids(scored: &[(PropertyRecord, PropertyScore)]) -> Vec<&str> {
        scored.iter().map(|(r, _)| r.id.as_str()).collect()
    }

    #[test]
    fn test_sort_by_score_with_id_tiebreak() {
        let mut scored = vec![
            entry("b", None, 60.0),
            entry("c", None, 90.0),
            entry("a", None, 60.0),
        ];
        sort_results(&mut scored, SortOrder::Score);
        assert_eq!(ids(&scored), vec!["p:c", "p:a", "p:b"]);
    }

    #[test]
    fn test_sort_price_unknown_last() {
        let mut scored = vec![
            entry("a", None, 0.0),
            entry("b", Some(300_000.0), 0.0),
            entry("c", Some(100_000.0), 0.0),
        ];
        sort_results(&mut scored, SortOrder::PriceAsc);
        assert_eq!(ids(&scored), vec!["p:c", "p:b", "p:a"]);
        sort_results(&mut scored, SortOrder::PriceDesc);
        assert_eq!(ids(&scored), vec!["p:b", "p:c", "p:a"]);
    }
}
