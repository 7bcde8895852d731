//! # places-db
//!
//! PostgreSQL + PostGIS storage layer for the places service.
//!
//! This crate provides:
//! - Connection pool management
//! - Filter-to-SQL compilation with fully parameterized operands
//! - City and district aggregations
//! - [`PgPlaceRepository`] (reads) and [`PgPlaceWriter`] (ingestion upserts)
//! - The `places-load` ingestion CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use places_db::{create_pool, FilterSpec, PgPlaceRepository, PlaceReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("postgres://localhost/places").await?;
//!     let repo = PgPlaceRepository::new(pool);
//!
//!     let result = repo
//!         .search(&FilterSpec::new().with_city("taipei").require_parking(true))
//!         .await?;
//!     println!("{} places", result.count);
//!     Ok(())
//! }
//! ```
pub mod aggregate;
pub mod normalize;
pub mod places;
pub mod pool;
pub mod query;
pub mod schema;
pub mod writer;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use places_core::*;

pub use aggregate::AggregationQueries;
pub use normalize::{PlaceRow, ResultNormalizer};
pub use places::{bind_arguments, PgPlaceRepository};
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, PoolConfig, DEFAULT_DATABASE_URL,
};
pub use query::{CompiledQuery, Predicate, QueryCompiler, QueryParam};
pub use schema::{apply_schema, SCHEMA_SQL};
pub use writer::{PgPlaceWriter, INGEST_LOCK_KEY};

#[cfg(test)]
mod tests {
    use places_core::logging::SUBSYSTEMS;

    #[test]
    fn test_logged_subsystems_are_documented() {
        let sources = [
            include_str!("places.rs"),
            include_str!("pool.rs"),
            include_str!("schema.rs"),
            include_str!("writer.rs"),
        ];
        let mut seen = 0;
        for source in sources {
            for rest in source.split("subsystem = \"").skip(1) {
                let value = rest.split('"').next().unwrap_or_default();
                assert!(SUBSYSTEMS.contains(&value), "undocumented subsystem {value:?}");
                seen += 1;
            }
        }
        assert!(seen > 0);
    }
}
