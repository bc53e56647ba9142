//! Search orchestration over the aggregated, resolved record set.

mod engine;
pub mod filters;
mod stats;
mod types;

pub use engine::{sort_results, SearchEngine};
pub use stats::{compute_facets, compute_stats, PriceBucket, SearchFacets, SearchStats};
pub use types::{
    total_pages, SearchOptions, SearchQuery, SearchResultItem, SearchResults, SortOrder,
    SourcesSummary,
};
