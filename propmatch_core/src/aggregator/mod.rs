//! Concurrent multi-source aggregation.
//!
//! This module provides:
//! - `Aggregator`: fans one query out to every registered source
//! - `AggregationResult`: per-source outcomes, failures and totals
//!
//! # Example
//!
//! ```ignore
//! use propmatch_core::aggregator::{AggregateOptions, Aggregator};
//!
//! let aggregator = Aggregator::from_config(registry, &config);
//! let result = aggregator.aggregate(&query, &AggregateOptions::default()).await?;
//! ```

mod engine;
mod types;

pub use engine::Aggregator;
pub use types::{AggregateOptions, AggregationResult, SourceFailure, SourceOutcome};
