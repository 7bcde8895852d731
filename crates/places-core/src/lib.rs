//! # places-core
//!
//! Core types, traits, and store-agnostic logic for the places service.
//!
//! This crate provides:
//! - The place data model and its open property bag
//! - Content-addressed place ids ([`PlaceIdentity`])
//! - Read request validation ([`FilterSpec`])
//! - Legacy attribute encodings shared by the query compiler
//! - The idempotent [`IngestionPipeline`] and its report types
//! - The [`PlaceReader`] / [`PlaceWriter`] store capabilities

pub mod encoding;
pub mod error;
pub mod filter;
pub mod identity;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use encoding::{EncodingTest, Feature, LegacyEncoding, ValueKind, DIAPER_TABLE, PARKING};
pub use error::{Axis, Error, Result, ValidationError};
pub use filter::{Bbox, FilterSpec, RawFilterParams};
pub use identity::PlaceIdentity;
pub use ingest::{
    IngestAbort, IngestMode, IngestionPipeline, IngestionReport, InputFormat, JsonLines,
    PlaceUpsert, RawRecord, RecordError, RejectedRecord, UpsertOutcome,
};
pub use models::{keys, CityCount, DistrictCount, DistrictCounts, Place, Properties, SearchResult};
pub use traits::{PlaceReader, PlaceWriter};
