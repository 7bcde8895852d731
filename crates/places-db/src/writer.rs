//! Write side of the place store.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};
use tracing::{debug, info, warn};

use places_core::{Error, PlaceUpsert, PlaceWriter, Result, UpsertOutcome};

/// Advisory lock key serializing ingestion runs ("places" in ASCII).
pub const INGEST_LOCK_KEY: i64 = 0x0000_706c_6163_6573;

const UPSERT_SQL: &str = "\
INSERT INTO places (id, name, address, category, city, location, properties)
VALUES ($1, $2, $3, $4, $5, ST_SetSRID(ST_MakePoint($6, $7), 4326), $8)
ON CONFLICT (id) DO UPDATE SET
    name = EXCLUDED.name,
    address = EXCLUDED.address,
    category = EXCLUDED.category,
    city = EXCLUDED.city,
    location = EXCLUDED.location,
    properties = EXCLUDED.properties,
    updated_at = now()
RETURNING (xmax = 0) AS inserted";

/// PostgreSQL implementation of [`PlaceWriter`].
///
/// Holds one pooled connection for the whole run. In exclusive mode the
/// connection also holds a session advisory lock, so concurrent runs fail
/// fast instead of interleaving. If the writer is dropped while still
/// locked, the connection is closed rather than returned to the pool, which
/// ends the session and frees the lock.
pub struct PgPlaceWriter {
    conn: PoolConnection<Postgres>,
    locked: bool,
}

impl PgPlaceWriter {
    /// Acquire a writer without the ingestion lock. Suitable for dry runs.
    pub async fn acquire(pool: &PgPool) -> Result<Self> {
        let conn = pool.acquire().await?;
        Ok(Self {
            conn,
            locked: false,
        })
    }

    /// Acquire a writer holding the ingestion lock.
    ///
    /// Fails with [`Error::Conflict`] if another run holds it.
    pub async fn acquire_exclusive(pool: &PgPool) -> Result<Self> {
        let mut writer = Self::acquire(pool).await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(INGEST_LOCK_KEY)
            .fetch_one(&mut *writer.conn)
            .await?;
        if !acquired {
            return Err(Error::Conflict(
                "another ingestion run holds the ingestion lock".to_string(),
            ));
        }
        writer.locked = true;
        debug!(
            subsystem = "db",
            component = "writer",
            op = "lock",
            "Ingestion lock acquired"
        );
        Ok(writer)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

#[async_trait]
impl PlaceWriter for PgPlaceWriter {
    async fn existing_ids(&mut self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<String> = sqlx::query_scalar("SELECT id FROM places WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn upsert_batch(&mut self, rows: &[PlaceUpsert]) -> Result<Vec<UpsertOutcome>> {
        let start = Instant::now();
        let mut tx = self.conn.begin().await?;
        let mut outcomes = Vec::with_capacity(rows.len());

        for row in rows {
            let inserted: bool = sqlx::query_scalar(UPSERT_SQL)
                .bind(&row.id)
                .bind(&row.name)
                .bind(&row.address)
                .bind(&row.category)
                .bind(&row.city)
                .bind(row.lng)
                .bind(row.lat)
                .bind(sqlx::types::Json(&row.properties))
                .fetch_one(&mut *tx)
                .await?;
            outcomes.push(if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            });
        }

        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "writer",
            op = "upsert_batch",
            batch_size = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch committed"
        );
        Ok(outcomes)
    }

    async fn release(&mut self) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(INGEST_LOCK_KEY)
            .fetch_one(&mut *self.conn)
            .await?;
        self.locked = false;
        if !released {
            warn!(
                subsystem = "db",
                component = "writer",
                op = "unlock",
                "Ingestion lock was not held at release"
            );
        }
        Ok(())
    }
}

impl Drop for PgPlaceWriter {
    fn drop(&mut self) {
        if self.locked {
            self.conn.close_on_drop();
        }
    }
}
