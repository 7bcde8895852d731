//! Error types for the places service.

use thiserror::Error;

/// Result type alias using the places Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for places operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Store connectivity or transaction failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed read request
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation refused because a conflicting operation holds the resource
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "store_error",
            Error::Validation(err) => err.code(),
            Error::Conflict(_) => "conflict",
            Error::Serialization(_) => "bad_json",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Which axis of a bounding box failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Longitude,
    Latitude,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Longitude => write!(f, "longitude"),
            Axis::Latitude => write!(f, "latitude"),
        }
    }
}

/// A read request that cannot be turned into a query.
///
/// Raised before any query text is built; no partial query is ever run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("bbox must have 4 comma-separated values (minLng,minLat,maxLng,maxLat), got {found}")]
    BboxArity { found: usize },

    #[error("bbox value {value:?} is not a finite number")]
    BboxNotNumeric { value: String },

    #[error("bbox minimum {min} is greater than maximum {max} on the {axis} axis")]
    BboxInverted { axis: Axis, min: f64, max: f64 },

    #[error("{name} must be '1' or '0', got {value:?}")]
    InvalidFlag { name: &'static str, value: String },

    #[error("{0} parameter is required")]
    MissingParameter(&'static str),
}

impl ValidationError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::BboxArity { .. }
            | ValidationError::BboxNotNumeric { .. }
            | ValidationError::BboxInverted { .. } => "bad_bbox",
            ValidationError::InvalidFlag { .. } => "invalid_flag",
            ValidationError::MissingParameter(_) => "missing_parameter",
        }
    }
}
