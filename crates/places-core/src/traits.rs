//! Store capabilities.
//!
//! Components that touch the store receive one of these explicitly; there is
//! no global connection state. Tests substitute in-memory implementations.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::filter::FilterSpec;
use crate::ingest::{PlaceUpsert, UpsertOutcome};
use crate::models::{CityCount, DistrictCounts, SearchResult};

/// Read contract of the place store.
///
/// Implementations are stateless apart from their connection source and are
/// safe to call concurrently.
#[async_trait]
pub trait PlaceReader: Send + Sync {
    /// Places matching the filter.
    async fn search(&self, filter: &FilterSpec) -> Result<SearchResult>;

    /// Place counts per city, ordered by city code.
    ///
    /// Only `categories` and `include_outdated` of the filter are applied.
    async fn city_counts(&self, filter: &FilterSpec) -> Result<Vec<CityCount>>;

    /// Place counts per district of one city, ordered by district name.
    ///
    /// Only `categories` and `include_outdated` of the filter are applied in
    /// addition to the city.
    async fn district_counts(&self, city: &str, filter: &FilterSpec) -> Result<DistrictCounts>;
}

/// Write session used by the ingestion pipeline.
///
/// A writer is owned by one ingestion run. `release` must be called when the
/// run ends, on success and on failure alike.
#[async_trait]
pub trait PlaceWriter: Send {
    /// Subset of `ids` already present in the store. Never mutates.
    async fn existing_ids(&mut self, ids: &[String]) -> Result<HashSet<String>>;

    /// Upsert rows in order inside one transaction.
    ///
    /// Either every row is committed or none is. Returns one outcome per row.
    async fn upsert_batch(&mut self, rows: &[PlaceUpsert]) -> Result<Vec<UpsertOutcome>>;

    /// End the session, releasing any lock it holds.
    async fn release(&mut self) -> Result<()>;
}
