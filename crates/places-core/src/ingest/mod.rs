//! Idempotent place ingestion.
//!
//! Records are validated one by one, given a content-addressed id and
//! upserted in chunks. A bad record is rejected and reported; it never stops
//! the batch. A store failure stops the batch and reports how far it got.
//!
//! Chunks are bounded by [`IngestionPipeline::batch_size`] input records and
//! each chunk is committed in its own transaction, so a failure loses at most
//! the chunk in flight. The report of an aborted run describes exactly the
//! input prefix `[0, resume_offset)`.

mod record;
mod source;

pub use record::{PlaceUpsert, RawRecord, RecordError, RAW_PROPERTIES_KEY};
pub use source::{parse_json_array, parse_json_lines, InputFormat, JsonLines};

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::error::Error;
use crate::traits::PlaceWriter;

/// Whether the run writes to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    Apply,
    /// Validate and predict insert/update without mutating the store.
    DryRun,
}

impl IngestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Apply => "apply",
            IngestMode::DryRun => "dry_run",
        }
    }
}

/// Effect of upserting one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A record rejected by validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Zero-based position in the input.
    pub index: usize,
    pub reason: RecordError,
    pub record: RawRecord,
}

/// Outcome of an ingestion run.
///
/// In apply mode `inserted`/`updated` are what the store did; in dry-run mode
/// they are what it would do. Re-ingesting unchanged data reports updates,
/// since matching rows are rewritten even when nothing changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub mode: IngestMode,
    /// Input records covered by this report.
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Rows durably written. Always zero in dry-run mode.
    pub committed: usize,
}

impl IngestionReport {
    pub fn new(mode: IngestMode) -> Self {
        Self {
            mode,
            total: 0,
            inserted: 0,
            updated: 0,
            rejected: Vec::new(),
            committed: 0,
        }
    }

    fn tally(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// A run stopped by a store failure.
#[derive(Error, Debug)]
#[error("ingestion aborted; resume from record {resume_offset}: {source}")]
pub struct IngestAbort {
    /// Report for the records before `resume_offset`.
    pub report: IngestionReport,
    /// Index of the first input record not known to be processed.
    pub resume_offset: usize,
    #[source]
    pub source: Error,
}

/// Drives validation, identity and upserts for a batch of records.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    batch_size: usize,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}

impl IngestionPipeline {
    /// Default number of input records per transaction.
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ingest `records` through `writer`.
    ///
    /// The writer is released on every exit path.
    pub async fn run<W>(
        &self,
        writer: &mut W,
        records: impl IntoIterator<Item = RawRecord>,
        mode: IngestMode,
    ) -> Result<IngestionReport, IngestAbort>
    where
        W: PlaceWriter + ?Sized,
    {
        let start = Instant::now();
        info!(
            subsystem = "ingest",
            component = "pipeline",
            op = "run",
            mode = mode.as_str(),
            batch_size = self.batch_size,
            "Starting ingestion"
        );

        let mut report = IngestionReport::new(mode);
        let outcome = self.run_chunks(writer, records, &mut report).await;

        if let Err(err) = writer.release().await {
            warn!(
                subsystem = "ingest",
                component = "pipeline",
                error = %err,
                "Failed to release writer"
            );
        }

        match outcome {
            Ok(()) => {
                info!(
                    subsystem = "ingest",
                    component = "pipeline",
                    op = "run",
                    mode = mode.as_str(),
                    total = report.total,
                    inserted = report.inserted,
                    updated = report.updated,
                    rejected = report.rejected.len(),
                    committed = report.committed,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Ingestion complete"
                );
                Ok(report)
            }
            Err(source) => {
                let resume_offset = report.total;
                error!(
                    subsystem = "ingest",
                    component = "pipeline",
                    op = "run",
                    mode = mode.as_str(),
                    committed = report.committed,
                    resume_offset,
                    error_code = source.code(),
                    error = %source,
                    "Ingestion aborted"
                );
                Err(IngestAbort {
                    report,
                    resume_offset,
                    source,
                })
            }
        }
    }

    async fn run_chunks<W>(
        &self,
        writer: &mut W,
        records: impl IntoIterator<Item = RawRecord>,
        report: &mut IngestionReport,
    ) -> Result<(), Error>
    where
        W: PlaceWriter + ?Sized,
    {
        // Ids the store will hold once earlier records are applied; lets
        // dry-run predict repeated ids within one run as updates.
        let mut predicted: HashSet<String> = HashSet::new();
        let mut records = records.into_iter().peekable();
        let mut offset = 0;

        while records.peek().is_some() {
            let chunk: Vec<RawRecord> = records.by_ref().take(self.batch_size).collect();
            let chunk_len = chunk.len();

            let mut rows = Vec::with_capacity(chunk_len);
            let mut rejected = Vec::new();
            for (i, record) in chunk.into_iter().enumerate() {
                let index = offset + i;
                match record.validate() {
                    Ok(row) => {
                        trace!(record_index = index, place_id = %row.id, "Record validated");
                        rows.push(row);
                    }
                    Err(reason) => {
                        warn!(
                            subsystem = "ingest",
                            component = "pipeline",
                            record_index = index,
                            error_code = reason.code(),
                            error = %reason,
                            "Record rejected"
                        );
                        rejected.push(RejectedRecord {
                            index,
                            reason,
                            record,
                        });
                    }
                }
            }

            let outcomes = match report.mode {
                IngestMode::Apply if rows.is_empty() => Vec::new(),
                IngestMode::Apply => writer.upsert_batch(&rows).await?,
                IngestMode::DryRun => predict(writer, &rows, &mut predicted).await?,
            };

            for outcome in outcomes {
                report.tally(outcome);
            }
            if report.mode == IngestMode::Apply {
                report.committed += rows.len();
            }
            report.rejected.extend(rejected);
            report.total += chunk_len;
            offset += chunk_len;

            debug!(
                subsystem = "ingest",
                component = "pipeline",
                op = "chunk",
                batch_size = chunk_len,
                committed = report.committed,
                rejected = report.rejected.len(),
                "Chunk processed"
            );
        }

        Ok(())
    }
}

async fn predict<W>(
    writer: &mut W,
    rows: &[PlaceUpsert],
    predicted: &mut HashSet<String>,
) -> Result<Vec<UpsertOutcome>, Error>
where
    W: PlaceWriter + ?Sized,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let mut lookup: Vec<String> = rows
        .iter()
        .filter(|r| !predicted.contains(&r.id))
        .map(|r| r.id.clone())
        .collect();
    lookup.sort();
    lookup.dedup();
    let existing = writer.existing_ids(&lookup).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let present = predicted.contains(&row.id) || existing.contains(&row.id);
            predicted.insert(row.id.clone());
            if present {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Inserted
            }
        })
        .collect())
}
