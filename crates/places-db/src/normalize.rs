//! Mapping stored rows to [`Place`] values.

use serde_json::{Map, Value};

use places_core::ingest::RAW_PROPERTIES_KEY;
use places_core::{Place, Properties};

/// A `places` row as selected by [`crate::QueryCompiler::PLACE_COLUMNS`].
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlaceRow {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub category: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub properties: Option<Value>,
}

/// Turns raw rows into the caller-facing place shape.
///
/// Property keys are passed through untouched, so attributes the service
/// has never heard of still reach the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn normalize(row: PlaceRow) -> Place {
        Place {
            id: row.id,
            name: row.name,
            address: row.address.unwrap_or_default(),
            lat: row.lat,
            lng: row.lng,
            category: row.category,
            city: row.city,
            properties: Self::properties(row.properties),
        }
    }

    pub fn normalize_all(rows: Vec<PlaceRow>) -> Vec<Place> {
        rows.into_iter().map(Self::normalize).collect()
    }

    /// Coerce a stored properties value into a map.
    ///
    /// Rows written by older loaders may hold serialized JSON text or a
    /// non-object value; text is decoded and anything that is still not an
    /// object is wrapped under `_raw`.
    pub fn properties(value: Option<Value>) -> Properties {
        match value {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(Value::Null) => Map::new(),
                Ok(other) => wrap(other),
                Err(_) => wrap(Value::String(text)),
            },
            Some(other) => wrap(other),
        }
    }
}

fn wrap(value: Value) -> Properties {
    let mut map = Map::new();
    map.insert(RAW_PROPERTIES_KEY.to_string(), value);
    map
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        ResultNormalizer::normalize(row)
    }
}
