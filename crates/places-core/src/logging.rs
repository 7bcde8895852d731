//! Structured logging field name constants.
//!
//! All crates use these constants so log aggregation can query the same
//! field names across the read path, the ingestion pipeline and the API.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Aborted operation (store failure, aborted batch) |
//! | WARN  | Rejected record, recoverable fallback |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Compiled query shape, decision points |
//! | TRACE | Per-record iteration |
//!
//! Parameter values of compiled queries are never logged, only their count.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event. Values: [`SUBSYSTEMS`].
pub const SUBSYSTEM: &str = "subsystem";

/// Every value logged under [`SUBSYSTEM`].
pub const SUBSYSTEMS: &[&str] = &["api", "db", "ingest"];

/// Component within a subsystem.
/// Examples: "pool", "search", "aggregation", "pipeline", "writer"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "city_counts", "district_counts", "upsert_batch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Content-addressed place id.
pub const PLACE_ID: &str = "place_id";

/// City code.
pub const CITY: &str = "city";

/// Zero-based index of a record in the ingestion input.
pub const RECORD_INDEX: &str = "record_index";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of bound parameters in a compiled query.
pub const PARAM_COUNT: &str = "param_count";

/// Number of records in an ingestion chunk.
pub const BATCH_SIZE: &str = "batch_size";

// ─── Ingestion fields ──────────────────────────────────────────────────────

/// Records durably written so far.
pub const COMMITTED: &str = "committed";

/// Records rejected by validation.
pub const REJECTED: &str = "rejected";

/// Ingestion mode ("apply" or "dry_run").
pub const MODE: &str = "mode";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Machine-readable error code.
pub const ERROR_CODE: &str = "error_code";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
