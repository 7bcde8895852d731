//! Read request filters.
//!
//! A [`FilterSpec`] is the validated form of a read request. It is built
//! from loosely-typed request parameters by [`FilterSpec::from_params`],
//! which is the only place request strings are interpreted; everything past
//! this point works on typed values.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Axis, ValidationError};

/// Axis-aligned geographic rectangle, inclusive of its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bbox {
    /// Build a bbox, rejecting non-finite values and inverted axes.
    pub fn new(
        min_lng: f64,
        min_lat: f64,
        max_lng: f64,
        max_lat: f64,
    ) -> Result<Self, ValidationError> {
        for value in [min_lng, min_lat, max_lng, max_lat] {
            if !value.is_finite() {
                return Err(ValidationError::BboxNotNumeric {
                    value: value.to_string(),
                });
            }
        }
        if min_lng > max_lng {
            return Err(ValidationError::BboxInverted {
                axis: Axis::Longitude,
                min: min_lng,
                max: max_lng,
            });
        }
        if min_lat > max_lat {
            return Err(ValidationError::BboxInverted {
                axis: Axis::Latitude,
                min: min_lat,
                max: max_lat,
            });
        }
        Ok(Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        })
    }

    /// Whether a point lies inside the rectangle or on its boundary.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Bounds in `minLng, minLat, maxLng, maxLat` order.
    pub fn bounds(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }
}

impl FromStr for Bbox {
    type Err = ValidationError;

    /// Parse `minLng,minLat,maxLng,maxLat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [min_lng, min_lat, max_lng, max_lat] = parts[..] else {
            return Err(ValidationError::BboxArity { found: parts.len() });
        };
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ValidationError::BboxNotNumeric {
                    value: value.to_string(),
                })
        };
        Bbox::new(
            parse(min_lng)?,
            parse(min_lat)?,
            parse(max_lng)?,
            parse(max_lat)?,
        )
    }
}

/// Unvalidated request parameters, as they arrive from a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFilterParams {
    /// Repeated `category` values.
    pub categories: Vec<String>,
    pub city: Option<String>,
    pub bbox: Option<String>,
    /// `"1"` or `"0"`.
    pub has_diaper_table: Option<String>,
    /// `"1"` or `"0"`.
    pub has_parking: Option<String>,
    pub include_outdated: bool,
}

/// Normalized, validated read request.
///
/// Categories are kept in a sorted set so the same request always compiles
/// to the same query text and parameter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Empty means no category restriction; otherwise membership (OR).
    pub categories: BTreeSet<String>,
    pub city: Option<String>,
    pub bbox: Option<Bbox>,
    /// `Some(true)` keeps places with a diaper table, `Some(false)` keeps
    /// places without one.
    pub require_diaper_table: Option<bool>,
    /// `Some(true)` keeps places with parking, `Some(false)` keeps places
    /// without.
    pub require_parking: Option<bool>,
    pub include_outdated: bool,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw request parameters.
    pub fn from_params(params: RawFilterParams) -> Result<Self, ValidationError> {
        let bbox = params.bbox.as_deref().map(str::parse).transpose()?;
        Ok(Self {
            categories: params
                .categories
                .into_iter()
                .filter(|c| !c.is_empty())
                .collect(),
            city: params.city.filter(|c| !c.is_empty()),
            bbox,
            require_diaper_table: parse_flag("has_diaper_table", params.has_diaper_table)?,
            require_parking: parse_flag("has_parking", params.has_parking)?,
            include_outdated: params.include_outdated,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_bbox(mut self, bbox: Bbox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn require_diaper_table(mut self, present: bool) -> Self {
        self.require_diaper_table = Some(present);
        self
    }

    pub fn require_parking(mut self, present: bool) -> Self {
        self.require_parking = Some(present);
        self
    }

    pub fn including_outdated(mut self) -> Self {
        self.include_outdated = true;
        self
    }
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<Option<bool>, ValidationError> {
    match value.as_deref() {
        None => Ok(None),
        Some("1") => Ok(Some(true)),
        Some("0") => Ok(Some(false)),
        Some(other) => Err(ValidationError::InvalidFlag {
            name,
            value: other.to_string(),
        }),
    }
}
