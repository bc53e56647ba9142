// src/lib.rs
pub mod aggregator;
pub mod config;
pub mod cpu_pool;
pub mod error;
pub mod geocode;
pub mod model;
pub mod resolver;
pub mod scoring;
pub mod search;
pub mod sources;
pub mod utils;

pub use crate::aggregator::{AggregateOptions, AggregationResult, Aggregator, SourceFailure};
pub use crate::config::{ConfigStore, EngineConfig};
pub use crate::error::{Result, SearchError};
pub use crate::geocode::{GeocodeResult, Geocoder};
pub use crate::model::{
    Condition, DataQuality, Location, PricePoint, PropertyRecord, PropertyType,
    SourceAttribution, SourceType, TransactionType,
};
pub use crate::resolver::{DuplicateGroup, EntityResolver, Resolution};
pub use crate::scoring::{
    PropertyScore, RelevanceScorer, ScoreReason, ScoringContext, ScoringMode, UserSignals,
};
pub use crate::search::{
    SearchEngine, SearchOptions, SearchQuery, SearchResultItem, SearchResults, SortOrder,
};
pub use crate::sources::{SourceClient, SourceFilters, SourceRegistry};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
