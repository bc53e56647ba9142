//! Optional geocoding of coordinate-less records.
//!
//! The geocoder itself is an external collaborator; this module only
//! defines its seam and the enrichment pass. A failed lookup leaves the
//! record as it was.

use crate::error::Result;
use crate::model::PropertyRecord;
use crate::resolver::geo;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lookups in flight at once during enrichment.
const GEOCODE_CONCURRENCY: usize = 8;

/// Geohash precision stored when the geocoder does not return one.
const GEOHASH_PRECISION: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lon: f64,
    /// Provider-specific accuracy label, e.g. `rooftop` or `locality`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeocodeResult>;
}

/// Free-text address built from the most to least specific location parts.
pub fn geocode_query(record: &PropertyRecord) -> Option<String> {
    let loc = &record.location;
    let parts: Vec<&str> = [
        &loc.address,
        &loc.postal_code,
        &loc.parish,
        &loc.municipality,
        &loc.district,
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Fill coordinates (and geohash) on records that have none. Returns the
/// number of records enriched.
pub async fn enrich(records: &mut [PropertyRecord], geocoder: &dyn Geocoder) -> usize {
    let pending: Vec<(usize, String)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.location.coordinates().is_none())
        .filter_map(|(i, r)| geocode_query(r).map(|q| (i, q)))
        .collect();
    if pending.is_empty() {
        return 0;
    }

    let lookups: Vec<(usize, Result<GeocodeResult>)> = stream::iter(pending)
        .map(|(i, query)| async move { (i, geocoder.geocode(&query).await) })
        .buffer_unordered(GEOCODE_CONCURRENCY)
        .collect()
        .await;

    let mut enriched = 0;
    for (i, lookup) in lookups {
        let found = match lookup {
            Ok(found) => found,
            Err(e) => {
                debug!(record = %records[i].id, error = %e, "geocoding failed");
                continue;
            }
        };
        let loc = &mut records[i].location;
        loc.lat = Some(found.lat);
        loc.lon = Some(found.lon);
        if loc.coordinates().is_none() {
            loc.lat = None;
            loc.lon = None;
            continue;
        }
        if loc.geohash.is_none() {
            loc.geohash = Some(
                found
                    .geohash
                    .unwrap_or_else(|| geo::encode(found.lat, found.lon, GEOHASH_PRECISION)),
            );
        }
        enriched += 1;
    }
    debug!(enriched, "geocoding pass finished");
    enriched
}
