//! Store schema bootstrap.

use sqlx::PgPool;
use tracing::info;

use places_core::Result;

/// DDL for the `places` table and its indexes.
pub const SCHEMA_SQL: &str = include_str!("../schema/places.sql");

/// Apply [`SCHEMA_SQL`] to the pool's database. Safe to run repeatedly.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    info!(
        subsystem = "db",
        component = "schema",
        op = "apply",
        "Schema applied"
    );
    Ok(())
}
