//! Ingestion against a live PostGIS database.

use std::collections::HashSet;
use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use places_db::test_fixtures::TestDatabase;
use places_db::{
    Error, IngestMode, IngestionPipeline, InputFormat, PgPlaceWriter, PlaceIdentity, PlaceUpsert,
    PlaceWriter, RawRecord, Result, UpsertOutcome,
};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

fn record(name: &str, address: &str) -> Value {
    json!({
        "name": name,
        "address": address,
        "category": "toilet",
        "city": "taipei",
        "lat": 25.04,
        "lng": 121.51,
        "properties": {"district": "Zhongzheng", "diaper_table_count": 1}
    })
}

fn batch() -> Vec<Value> {
    vec![
        record("Taipei Main Station", "No. 3, Beiping W. Rd."),
        record("NTU Hospital", "No. 7, Zhongshan S. Rd."),
        json!({"name": "no coordinates", "category": "toilet", "city": "taipei"}),
    ]
}

/// id, name, address, category, city, lat, lng, properties, created_at
type StoredRow = (String, String, String, String, String, f64, f64, Value, DateTime<Utc>);

/// Everything but `updated_at`, in id order.
async fn snapshot(test_db: &TestDatabase) -> Vec<StoredRow> {
    sqlx::query(
        "SELECT id, name, address, category, city, ST_Y(location) AS lat, ST_X(location) AS lng, \
         properties, created_at FROM places ORDER BY id",
    )
    .fetch_all(&test_db.pool)
    .await
    .unwrap()
    .iter()
    .map(|row| {
        (
            row.get("id"),
            row.get("name"),
            row.get("address"),
            row.get("category"),
            row.get("city"),
            row.get("lat"),
            row.get("lng"),
            row.get("properties"),
            row.get("created_at"),
        )
    })
    .collect()
}

async fn updated_at(test_db: &TestDatabase, id: &str) -> DateTime<Utc> {
    sqlx::query_scalar("SELECT updated_at FROM places WHERE id = $1")
        .bind(id)
        .fetch_one(&test_db.pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_ingest_reports_and_rejects() {
    let test_db = TestDatabase::new().await;
    let report = test_db.ingest(batch()).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.committed, 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 2);
    assert_eq!(report.rejected[0].reason.code(), "missing_field");
    assert_eq!(test_db.row_count().await, 2);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_reingest_is_idempotent() {
    let test_db = TestDatabase::new().await;
    test_db.ingest(batch()).await;
    let before = snapshot(&test_db).await;
    let id = PlaceIdentity::compute("Taipei Main Station", "No. 3, Beiping W. Rd.");
    let first_update = updated_at(&test_db, &id).await;

    let report = test_db.ingest(batch()).await;
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 2);

    let after = snapshot(&test_db).await;
    assert_eq!(before, after, "re-ingest changed stored rows");
    assert!(updated_at(&test_db, &id).await > first_update);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_upsert_overwrites_fields_keeps_created_at() {
    let test_db = TestDatabase::new().await;
    test_db.ingest(vec![record("Taipei Main Station", "No. 3")]).await;
    let before = snapshot(&test_db).await;

    let mut changed = record("Taipei Main Station", "No. 3");
    changed["category"] = json!("station");
    changed["properties"] = json!({"has_parking": true});
    let report = test_db.ingest(vec![changed]).await;
    assert_eq!(report.updated, 1);

    let after = snapshot(&test_db).await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].0, before[0].0);
    assert_eq!(after[0].3, "station");
    assert_eq!(after[0].7, json!({"has_parking": true}));
    assert_eq!(after[0].8, before[0].8, "created_at must not change");
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_dry_run_has_no_effect() {
    let test_db = TestDatabase::new().await;
    test_db
        .ingest(vec![record("Taipei Main Station", "No. 3, Beiping W. Rd.")])
        .await;
    let before = snapshot(&test_db).await;

    let report = test_db.ingest_with(batch(), IngestMode::DryRun).await;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.committed, 0);
    assert_eq!(report.rejected.len(), 1);

    assert_eq!(snapshot(&test_db).await, before);
    test_db.cleanup().await;
}

/// Delegates to a real writer but adds a constraint before the second batch
/// that its rows violate, so that batch fails inside Postgres.
struct ConstrainedWriter {
    inner: PgPlaceWriter,
    pool: PgPool,
    batches: usize,
}

#[async_trait]
impl PlaceWriter for ConstrainedWriter {
    async fn existing_ids(&mut self, ids: &[String]) -> Result<HashSet<String>> {
        self.inner.existing_ids(ids).await
    }

    async fn upsert_batch(&mut self, rows: &[PlaceUpsert]) -> Result<Vec<UpsertOutcome>> {
        self.batches += 1;
        if self.batches == 2 {
            sqlx::query(
                "ALTER TABLE places ADD CONSTRAINT only_first_chunk \
                 CHECK (name IN ('a', 'b')) NOT VALID",
            )
            .execute(&self.pool)
            .await?;
        }
        self.inner.upsert_batch(rows).await
    }

    async fn release(&mut self) -> Result<()> {
        self.inner.release().await
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_store_failure_keeps_committed_chunks() {
    let test_db = TestDatabase::new().await;
    let records = vec![
        record("a", "1"),
        record("b", "2"),
        record("c", "3"),
        record("d", "4"),
    ];

    let mut writer = ConstrainedWriter {
        inner: PgPlaceWriter::acquire(&test_db.pool).await.unwrap(),
        pool: test_db.pool.clone(),
        batches: 0,
    };
    let abort = IngestionPipeline::new()
        .with_batch_size(2)
        .run(
            &mut writer,
            records.into_iter().map(RawRecord::from),
            IngestMode::Apply,
        )
        .await
        .unwrap_err();

    assert_eq!(abort.resume_offset, 2);
    assert_eq!(abort.report.committed, 2);
    assert_eq!(abort.report.total, 2);
    assert!(matches!(abort.source, Error::Database(_)));
    assert_eq!(test_db.row_count().await, 2);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_nul_characters_are_rejected_before_the_store() {
    let test_db = TestDatabase::new().await;
    let records = vec![
        record("a", "1"),
        json!({
            "name": "bad\u{0}name", "category": "toilet", "city": "taipei",
            "lat": 25.0, "lng": 121.5
        }),
        json!({
            "name": "c", "category": "toilet", "city": "taipei", "lat": 25.0, "lng": 121.5,
            "properties": {"note": "\u{0}"}
        }),
        record("d", "4"),
    ];

    let mut writer = PgPlaceWriter::acquire(&test_db.pool).await.unwrap();
    let report = IngestionPipeline::new()
        .with_batch_size(1)
        .run(
            &mut writer,
            records.into_iter().map(RawRecord::from),
            IngestMode::Apply,
        )
        .await
        .unwrap();

    assert_eq!(report.committed, 2);
    let rejected: Vec<_> = report
        .rejected
        .iter()
        .map(|r| (r.index, r.reason.code()))
        .collect();
    assert_eq!(rejected, vec![(1, "invalid_field"), (2, "invalid_field")]);
    assert_eq!(test_db.row_count().await, 2);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_ingestion_lock_is_exclusive() {
    let test_db = TestDatabase::new().await;

    let mut first = PgPlaceWriter::acquire_exclusive(&test_db.pool).await.unwrap();
    assert!(first.is_locked());

    let second = PgPlaceWriter::acquire_exclusive(&test_db.pool).await;
    assert!(matches!(second, Err(Error::Conflict(_))));

    first.release().await.unwrap();
    assert!(!first.is_locked());

    let mut third = PgPlaceWriter::acquire_exclusive(&test_db.pool).await.unwrap();
    third.release().await.unwrap();
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with PostGIS
async fn test_jsonl_file_ingest() {
    let test_db = TestDatabase::new().await;

    let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
    writeln!(file, "{}", record("a", "1")).unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "{}", record("b", "2")).unwrap();

    let text = tokio::fs::read_to_string(file.path()).await.unwrap();
    let records = InputFormat::for_path(file.path(), false).parse(&text).unwrap();
    assert_eq!(records.len(), 3);

    let mut writer = PgPlaceWriter::acquire(&test_db.pool).await.unwrap();
    let report = IngestionPipeline::new()
        .run(&mut writer, records, IngestMode::Apply)
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason.code(), "malformed_json");
    assert_eq!(test_db.row_count().await, 2);
    test_db.cleanup().await;
}
