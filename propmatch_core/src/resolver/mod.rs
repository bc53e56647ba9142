//! Entity resolution across upstream feeds.
//!
//! This module provides:
//! - `EntityResolver`: groups records describing the same physical property
//! - `compare`: the weighted pairwise similarity behind each decision
//! - `merge`: pure primary/duplicate merge
//!
//! Records are visited richest-first so the fullest listing becomes the
//! primary of its group. Each ungrouped record is compared against every
//! later ungrouped one, giving a single deterministic O(n²) pass.
//!
//! # Example
//!
//! ```ignore
//! use propmatch_core::resolver::EntityResolver;
//!
//! let resolver = EntityResolver::default();
//! let groups = resolver.resolve(&records);
//! ```

pub mod geo;
mod merge;
mod similarity;

pub use merge::merge;
pub use similarity::{compare, relative_decay, MatchReason, SimilarityScore};

use crate::config::ResolverConfig;
use crate::model::PropertyRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Records judged to be one real-world property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Primary enriched with every duplicate's missing fields and attributions
    pub primary: PropertyRecord,
    /// The duplicates as they arrived, before merging
    pub duplicates: Vec<PropertyRecord>,
    /// Member ids, primary first
    pub member_ids: Vec<String>,
    /// In [0, 1]; grows with duplicate count and portal diversity
    pub confidence: f64,
    pub match_reasons: Vec<MatchReason>,
    pub sources: BTreeSet<String>,
}

impl DuplicateGroup {
    pub fn size(&self) -> usize {
        self.duplicates.len() + 1
    }
}

/// Output of [`EntityResolver::deduplicate`]: one record per property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Merged primaries and untouched singletons
    pub records: Vec<PropertyRecord>,
    pub groups: Vec<DuplicateGroup>,
    /// Input records absorbed into another record
    pub merged_away: usize,
}

struct Cluster {
    primary: usize,
    duplicates: Vec<usize>,
    reasons: BTreeSet<MatchReason>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    config: ResolverConfig,
}

impl EntityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn similarity(&self, a: &PropertyRecord, b: &PropertyRecord) -> SimilarityScore {
        compare(a, b, &self.config)
    }

    pub fn is_duplicate(&self, a: &PropertyRecord, b: &PropertyRecord) -> bool {
        self.similarity(a, b).is_duplicate(self.config.threshold)
    }

    /// Group duplicates. Records that match nothing produce no group.
    pub fn resolve(&self, records: &[PropertyRecord]) -> Vec<DuplicateGroup> {
        self.cluster(records)
            .iter()
            .filter(|c| !c.duplicates.is_empty())
            .map(|c| self.build_group(records, c))
            .collect()
    }

    /// Collapse duplicates, returning one record per property in input order
    /// of each group's primary.
    pub fn deduplicate(&self, records: Vec<PropertyRecord>) -> Resolution {
        let mut clusters = self.cluster(&records);
        clusters.sort_by_key(|c| c.primary);

        let mut resolution = Resolution::default();
        for cluster in &clusters {
            if cluster.duplicates.is_empty() {
                resolution.records.push(records[cluster.primary].clone());
            } else {
                let group = self.build_group(&records, cluster);
                resolution.merged_away += group.duplicates.len();
                resolution.records.push(group.primary.clone());
                resolution.groups.push(group);
            }
        }

        debug!(
            input = records.len(),
            unique = resolution.records.len(),
            groups = resolution.groups.len(),
            merged = resolution.merged_away,
            "entity resolution finished"
        );
        resolution
    }

    fn cluster(&self, records: &[PropertyRecord]) -> Vec<Cluster> {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            records[b]
                .completeness()
                .cmp(&records[a].completeness())
                .then_with(|| records[a].id.cmp(&records[b].id))
                .then_with(|| a.cmp(&b))
        });

        let mut grouped = vec![false; records.len()];
        let mut clusters = Vec::new();

        for (pos, &i) in order.iter().enumerate() {
            if grouped[i] {
                continue;
            }
            grouped[i] = true;
            let mut cluster = Cluster {
                primary: i,
                duplicates: Vec::new(),
                reasons: BTreeSet::new(),
            };

            for &j in &order[pos + 1..] {
                if grouped[j] {
                    continue;
                }
                let score = self.similarity(&records[i], &records[j]);
                if score.is_duplicate(self.config.threshold) {
                    grouped[j] = true;
                    cluster.duplicates.push(j);
                    cluster.reasons.extend(score.reasons);
                }
            }
            clusters.push(cluster);
        }
        clusters
    }

    fn build_group(&self, records: &[PropertyRecord], cluster: &Cluster) -> DuplicateGroup {
        let primary = cluster
            .duplicates
            .iter()
            .fold(records[cluster.primary].clone(), |acc, &j| {
                merge(&acc, &records[j])
            });
        let duplicates: Vec<PropertyRecord> = cluster
            .duplicates
            .iter()
            .map(|&j| records[j].clone())
            .collect();

        let mut member_ids = vec![records[cluster.primary].id.clone()];
        member_ids.extend(duplicates.iter().map(|d| d.id.clone()));

        let sources: BTreeSet<String> = primary.sources.iter().map(|s| s.name.clone()).collect();
        let confidence = group_confidence(
            duplicates.len(),
            sources.len(),
            self.config.max_group_duplicates,
            self.config.max_group_portals,
        );

        DuplicateGroup {
            primary,
            duplicates,
            member_ids,
            confidence,
            match_reasons: cluster.reasons.iter().copied().collect(),
            sources,
        }
    }
}

/// `0.5 × min(dups / max_dups, 1) + 0.5 × min(portals / max_portals, 1)`
pub fn group_confidence(
    duplicates: usize,
    portals: usize,
    max_duplicates: usize,
    max_portals: usize,
) -> f64 {
    let ratio = |n: usize, max: usize| {
        if max == 0 {
            1.0
        } else {
            (n as f64 / max as f64).min(1.0)
        }
    };
    0.5 * ratio(duplicates, max_duplicates) + 0.5 * ratio(portals, max_portals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceAttribution, SourceType};

    fn listing(portal: &str, id: &str) -> PropertyRecord {
        PropertyRecord::new(SourceAttribution::new(SourceType::Portal, portal, id))
    }

    #[test]
    fn test_empty_and_single() {
        let resolver = EntityResolver::default();
        assert!(resolver.resolve(&[]).is_empty());
        assert!(resolver.resolve(&[listing("a", "1")]).is_empty());
        let resolution = resolver.deduplicate(vec![listing("a", "1")]);
        assert_eq!(resolution.records.len(), 1);
        assert_eq!(resolution.merged_away, 0);
    }

    #[test]
    fn test_group_confidence() {
        assert!((group_confidence(1, 2, 5, 4) - 0.35).abs() < 1e-9);
        assert!((group_confidence(10, 10, 5, 4) - 1.0).abs() < 1e-9);
        assert_eq!(group_confidence(0, 0, 5, 4), 0.0);
    }

    #[test]
    fn test_richest_record_is_primary() {
        let resolver = EntityResolver::default();
        let sparse = listing("crm", "7")
            .with_address("Rua das Flores 123")
            .with_price(250_000.0);
        let mut rich = listing("idealista", "1")
            .with_address("Rua das Flores 123")
            .with_price(250_000.0)
            .with_area(85.0);
        rich.bedrooms = Some(2);

        let groups = resolver.resolve(&[sparse, rich]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids[0], "idealista:1");
        assert_eq!(groups[0].primary.sources.len(), 2);
    }

    #[test]
    fn test_records_without_signal_never_group() {
        let resolver = EntityResolver::default();
        let records = vec![listing("a", "1"), listing("b", "2"), listing("c", "3")];
        assert!(resolver.resolve(&records).is_empty());
        assert_eq!(resolver.deduplicate(records).records.len(), 3);
    }
}
