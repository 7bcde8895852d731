//! Raw ingestion records and their validation.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identity::PlaceIdentity;
use crate::models::Properties;

/// Top-level keys with a fixed meaning. Any other top-level key is folded
/// into `properties`.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "name",
    "address",
    "lat",
    "lng",
    "location",
    "category",
    "city",
    "properties",
];

/// Key used to keep a non-object `properties` value.
pub const RAW_PROPERTIES_KEY: &str = "_raw";

/// One input record as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// A parsed JSON value (not necessarily an object).
    Json(Value),
    /// A JSON Lines entry that failed to parse.
    Malformed {
        line: usize,
        text: String,
        error: String,
    },
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        RawRecord::Json(value)
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawRecord::Json(value) => value.serialize(serializer),
            RawRecord::Malformed { text, .. } => serializer.serialize_str(text),
        }
    }
}

/// Why a single record was rejected. Never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    #[error("line {line} is not valid JSON: {message}")]
    MalformedJson { line: usize, message: String },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("latitude {0} is out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

impl RecordError {
    /// Machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::NotAnObject { .. } => "not_an_object",
            RecordError::MalformedJson { .. } => "malformed_json",
            RecordError::MissingField(_) => "missing_field",
            RecordError::InvalidField { .. } => "invalid_field",
            RecordError::LatitudeOutOfRange(_) => "latitude_out_of_range",
            RecordError::LongitudeOutOfRange(_) => "longitude_out_of_range",
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            RecordError::MissingField(field) | RecordError::InvalidField { field, .. } => {
                Some(*field)
            }
            RecordError::LatitudeOutOfRange(_) => Some("lat"),
            RecordError::LongitudeOutOfRange(_) => Some("lng"),
            _ => None,
        }
    }
}

impl Serialize for RecordError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RecordError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("field", &self.field())?;
        state.end()
    }
}

/// A validated record with its computed id, ready to upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceUpsert {
    pub id: String,
    pub name: String,
    pub address: String,
    pub category: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub properties: Properties,
}

impl RawRecord {
    /// Validate the record and compute its id.
    pub fn validate(&self) -> Result<PlaceUpsert, RecordError> {
        let obj = match self {
            RawRecord::Json(Value::Object(obj)) => obj,
            RawRecord::Json(other) => {
                return Err(RecordError::NotAnObject {
                    found: kind_name(other),
                })
            }
            RawRecord::Malformed { line, error, .. } => {
                return Err(RecordError::MalformedJson {
                    line: *line,
                    message: error.clone(),
                })
            }
        };

        let name = required_str(obj, "name")?;
        let category = required_str(obj, "category")?;
        let city = required_str(obj, "city")?;
        let address = address(obj)?;
        for (field, value) in [
            ("name", &name),
            ("category", &category),
            ("city", &city),
            ("address", &address),
        ] {
            reject_nul(field, value)?;
        }

        let lat = coordinate(obj, "lat")?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(RecordError::LatitudeOutOfRange(lat));
        }
        let lng = coordinate(obj, "lng")?;
        if !(-180.0..=180.0).contains(&lng) {
            return Err(RecordError::LongitudeOutOfRange(lng));
        }

        let properties = properties(obj);
        if properties
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value))
        {
            return Err(RecordError::InvalidField {
                field: "properties",
                reason: "contains a NUL character".to_string(),
            });
        }

        Ok(PlaceUpsert {
            id: PlaceIdentity::compute(&name, &address),
            name,
            address,
            category,
            city,
            lat,
            lng,
            properties,
        })
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(RecordError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RecordError::InvalidField {
            field,
            reason: format!("expected a string, found {}", kind_name(other)),
        }),
    }
}

fn address(obj: &Map<String, Value>) -> Result<String, RecordError> {
    match obj.get("address") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(other) => Err(RecordError::InvalidField {
            field: "address",
            reason: format!("expected a string, found {}", kind_name(other)),
        }),
    }
}

/// Postgres text and jsonb cannot hold U+0000.
fn reject_nul(field: &'static str, value: &str) -> Result<(), RecordError> {
    if value.contains('\0') {
        return Err(RecordError::InvalidField {
            field,
            reason: "contains a NUL character".to_string(),
        });
    }
    Ok(())
}

fn contains_nul(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value)),
        _ => false,
    }
}

/// Find a coordinate at the top level, then under `location`, then under
/// `properties`. The first non-null candidate wins.
fn coordinate(obj: &Map<String, Value>, field: &'static str) -> Result<f64, RecordError> {
    let nested = |container: &str| {
        obj.get(container)
            .and_then(Value::as_object)
            .and_then(|o| o.get(field))
    };
    let candidate = [obj.get(field), nested("location"), nested("properties")]
        .into_iter()
        .flatten()
        .find(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()));

    let Some(value) = candidate else {
        return Err(RecordError::MissingField(field));
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::InvalidField {
            field,
            reason: format!("expected a number, found {}", value),
        }),
    }
}

/// Build the property bag: the record's `properties` object plus any
/// unreserved top-level keys, without overwriting bag entries.
fn properties(obj: &Map<String, Value>) -> Properties {
    let mut props = match obj.get("properties") {
        None | Some(Value::Null) => Properties::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = Properties::new();
            map.insert(RAW_PROPERTIES_KEY.to_string(), other.clone());
            map
        }
    };
    for (key, value) in obj {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        props.entry(key.clone()).or_insert_with(|| value.clone());
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::Json(value)
    }

    #[test]
    fn test_valid_record() {
        let upsert = record(json!({
            "name": "Daan Park",
            "address": "No. 1, Sec. 2, Xinsheng S. Rd.",
            "lat": 25.03,
            "lng": 121.53,
            "category": "park",
            "city": "taipei",
            "properties": {"district": "Daan"}
        }))
        .validate()
        .unwrap();

        assert_eq!(
            upsert.id,
            PlaceIdentity::compute("Daan Park", "No. 1, Sec. 2, Xinsheng S. Rd.")
        );
        assert_eq!(upsert.lat, 25.03);
        assert_eq!(upsert.properties["district"], "Daan");
    }

    #[test]
    fn test_latitude_out_of_range() {
        let err = record(json!({
            "name": "x", "lat": 999, "lng": 121.0, "category": "park", "city": "taipei"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, RecordError::LatitudeOutOfRange(999.0));
        assert_eq!(err.code(), "latitude_out_of_range");
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_longitude_out_of_range() {
        let err = record(json!({
            "name": "x", "lat": 0, "lng": -180.5, "category": "park", "city": "taipei"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.code(), "longitude_out_of_range");
    }

    #[test]
    fn test_boundary_coordinates_are_valid() {
        let upsert = record(json!({
            "name": "Pole", "lat": -90, "lng": 180, "category": "marker", "city": "nowhere"
        }))
        .validate()
        .unwrap();
        assert_eq!((upsert.lat, upsert.lng), (-90.0, 180.0));
    }

    #[test]
    fn test_missing_fields() {
        let base = json!({"name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c"});
        for field in ["name", "category", "city", "lat", "lng"] {
            let mut value = base.clone();
            value.as_object_mut().unwrap().remove(field);
            let err = record(value).validate().unwrap_err();
            assert_eq!(err, RecordError::MissingField(field), "field {field}");
        }
    }

    #[test]
    fn test_blank_name_is_missing() {
        let err = record(json!({
            "name": "  ", "lat": 1, "lng": 1, "category": "park", "city": "c"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, RecordError::MissingField("name"));
    }

    #[test]
    fn test_non_string_category_is_invalid() {
        let err = record(json!({
            "name": "x", "lat": 1, "lng": 1, "category": 7, "city": "c"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.code(), "invalid_field");
    }

    #[test]
    fn test_coordinates_from_location_and_strings() {
        let upsert = record(json!({
            "name": "x", "category": "park", "city": "c",
            "location": {"lat": "25.5", "lng": 121.25}
        }))
        .validate()
        .unwrap();
        assert_eq!((upsert.lat, upsert.lng), (25.5, 121.25));
    }

    #[test]
    fn test_coordinates_fall_back_to_properties() {
        let upsert = record(json!({
            "name": "x", "category": "park", "city": "c",
            "location": {"lat": null},
            "properties": {"lat": 10, "lng": 20}
        }))
        .validate()
        .unwrap();
        assert_eq!((upsert.lat, upsert.lng), (10.0, 20.0));
    }

    #[test]
    fn test_unparsable_coordinate_is_invalid() {
        let err = record(json!({
            "name": "x", "category": "park", "city": "c", "lat": "north", "lng": 1
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.code(), "invalid_field");
    }

    #[test]
    fn test_absent_address_is_empty() {
        let upsert = record(json!({
            "name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c"
        }))
        .validate()
        .unwrap();
        assert_eq!(upsert.address, "");
        assert_eq!(upsert.id, PlaceIdentity::compute("x", ""));
    }

    #[test]
    fn test_numeric_address_is_stringified() {
        let upsert = record(json!({
            "name": "x", "address": 42, "lat": 1, "lng": 1, "category": "park", "city": "c"
        }))
        .validate()
        .unwrap();
        assert_eq!(upsert.address, "42");
    }

    #[test]
    fn test_input_id_is_ignored() {
        let upsert = record(json!({
            "id": "from-source", "name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c"
        }))
        .validate()
        .unwrap();
        assert_eq!(upsert.id, PlaceIdentity::compute("x", ""));
        assert!(!upsert.properties.contains_key("id"));
    }

    #[test]
    fn test_extra_keys_fold_into_properties() {
        let upsert = record(json!({
            "name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c",
            "district": "top-level", "opening_hours": "24/7",
            "properties": {"district": "bag"}
        }))
        .validate()
        .unwrap();
        assert_eq!(upsert.properties["district"], "bag");
        assert_eq!(upsert.properties["opening_hours"], "24/7");
        assert!(!upsert.properties.contains_key("lat"));
    }

    #[test]
    fn test_non_object_properties_are_wrapped() {
        let upsert = record(json!({
            "name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c",
            "properties": [1, 2]
        }))
        .validate()
        .unwrap();
        assert_eq!(upsert.properties[RAW_PROPERTIES_KEY], json!([1, 2]));
    }

    #[test]
    fn test_nul_in_text_field_is_invalid() {
        let base = json!({
            "name": "x", "address": "a", "lat": 1, "lng": 1, "category": "park", "city": "c"
        });
        for field in ["name", "address", "category", "city"] {
            let mut value = base.clone();
            value[field] = json!("bad\u{0}value");
            let err = record(value).validate().unwrap_err();
            assert_eq!(err.code(), "invalid_field", "field {field}");
            assert!(matches!(err, RecordError::InvalidField { field: f, .. } if f == field));
        }
    }

    #[test]
    fn test_nul_anywhere_in_properties_is_invalid() {
        let cases = [
            json!({"properties": {"note": "a\u{0}b"}}),
            json!({"properties": {"k\u{0}ey": 1}}),
            json!({"properties": {"tags": ["ok", {"deep": "x\u{0}"}]}}),
            json!({"opening_hours": "24/7\u{0}"}),
            json!({"properties": "raw\u{0}"}),
        ];
        for extra in cases {
            let mut value = json!({
                "name": "x", "lat": 1, "lng": 1, "category": "park", "city": "c"
            });
            for (key, v) in extra.as_object().unwrap() {
                value[key] = v.clone();
            }
            let err = record(value.clone()).validate().unwrap_err();
            assert_eq!(
                err,
                RecordError::InvalidField {
                    field: "properties",
                    reason: "contains a NUL character".to_string()
                },
                "{value}"
            );
        }
    }

    #[test]
    fn test_not_an_object() {
        let err = record(json!([1, 2])).validate().unwrap_err();
        assert_eq!(err, RecordError::NotAnObject { found: "array" });
    }

    #[test]
    fn test_malformed_line() {
        let err = RawRecord::Malformed {
            line: 3,
            text: "{oops".to_string(),
            error: "key must be a string".to_string(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.code(), "malformed_json");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_record_error_serializes_with_code() {
        let body = serde_json::to_value(RecordError::LatitudeOutOfRange(999.0)).unwrap();
        assert_eq!(body["code"], "latitude_out_of_range");
        assert_eq!(body["field"], "lat");
        assert_eq!(body["message"], "latitude 999 is out of range [-90, 90]");
    }
}
