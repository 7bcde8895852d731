//! Place data model and read-side result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open extension bag stored with every place.
///
/// Values are JSON-shaped (string, number, bool, null, array, nested map).
/// Keys the core does not know about are carried through untouched.
pub type Properties = Map<String, Value>;

/// Property keys the core reads. Everything else in the bag is opaque.
pub mod keys {
    /// Soft-delete marker; rows with the value [`OUTDATED`] are hidden by default.
    pub const DATA_STATUS: &str = "data_status";
    /// Value of `data_status` marking a stale row.
    pub const OUTDATED: &str = "outdated";
    /// District name used by district rollups.
    pub const DISTRICT: &str = "district";
    /// Human-readable city name.
    pub const CITY_NAME: &str = "city_name";
    pub const DIAPER_TABLE_COUNT: &str = "diaper_table_count";
    pub const HAS_DIAPER_TABLE: &str = "has_diaper_table";
    pub const HAS_PARKING: &str = "has_parking";
    pub const PARKING: &str = "parking";
    pub const PARKING_COUNT: &str = "parking_count";
}

/// A place as returned by the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub category: String,
    pub city: String,
    pub properties: Properties,
}

impl Place {
    /// Whether the place carries the outdated marker.
    pub fn is_outdated(&self) -> bool {
        self.properties.get(keys::DATA_STATUS).and_then(Value::as_str) == Some(keys::OUTDATED)
    }
}

/// Result of a place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<Place>,
    pub count: usize,
}

impl SearchResult {
    pub fn new(items: Vec<Place>) -> Self {
        let count = items.len();
        Self { items, count }
    }
}

/// Place count for one city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCount {
    /// City code as stored in the `city` column.
    pub code: String,
    /// Display name taken from an arbitrary row's `city_name`, else the code.
    pub name: String,
    pub count: i64,
}

/// Place count for one district of a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCount {
    pub name: String,
    pub count: i64,
}

/// District rollup for one city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCounts {
    pub city: String,
    /// Display name taken from an arbitrary matching row's `city_name`,
    /// falling back to the city code.
    ///
    /// If rows of the same city disagree on `city_name` the chosen value is
    /// unspecified.
    pub city_name: String,
    pub districts: Vec<DistrictCount>,
}
