//! Legacy encodings of logical place features.
//!
//! Source data describes the same feature in several historical shapes
//! (a boolean flag in one dataset, a count in another). A logical filter is
//! satisfied when any one of its encodings matches. Adding an encoding means
//! adding a row to the table; the query compiler walks the table and never
//! names individual keys.

use serde_json::Value;

use crate::models::keys;

/// JSON value kind an encoding is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
}

/// Test applied to the attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingTest {
    /// Value is boolean true.
    IsTrue,
    /// Value is a number strictly greater than zero.
    Positive,
}

/// One historical representation of a logical feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyEncoding {
    pub key: &'static str,
    pub kind: ValueKind,
    pub test: EncodingTest,
}

impl LegacyEncoding {
    pub const fn flag(key: &'static str) -> Self {
        Self {
            key,
            kind: ValueKind::Bool,
            test: EncodingTest::IsTrue,
        }
    }

    pub const fn count(key: &'static str) -> Self {
        Self {
            key,
            kind: ValueKind::Number,
            test: EncodingTest::Positive,
        }
    }

    /// Evaluate the encoding against an in-memory attribute value.
    ///
    /// Mirrors the SQL rendering: the text forms `"true"` and `"3"` count,
    /// anything unparsable does not.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match (self.kind, self.test) {
            (ValueKind::Bool, EncodingTest::IsTrue) => match value {
                Value::Bool(b) => *b,
                Value::String(s) => s == "true",
                _ => false,
            },
            (ValueKind::Number, EncodingTest::Positive) => match value {
                Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
                Value::String(s) => is_decimal(s) && s.parse::<f64>().is_ok_and(|n| n > 0.0),
                _ => false,
            },
            _ => false,
        }
    }
}

/// A logical feature and the encodings that express it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub name: &'static str,
    pub encodings: &'static [LegacyEncoding],
}

impl Feature {
    /// Whether any encoding of the feature matches the given properties.
    pub fn present_in(&self, properties: &crate::Properties) -> bool {
        self.encodings
            .iter()
            .any(|enc| enc.matches(properties.get(enc.key)))
    }
}

/// Diaper-changing table: a positive count or a true flag.
pub const DIAPER_TABLE: Feature = Feature {
    name: "diaper_table",
    encodings: &[
        LegacyEncoding::count(keys::DIAPER_TABLE_COUNT),
        LegacyEncoding::flag(keys::HAS_DIAPER_TABLE),
    ],
};

/// Parking: either of two flags, or a positive count.
pub const PARKING: Feature = Feature {
    name: "parking",
    encodings: &[
        LegacyEncoding::flag(keys::HAS_PARKING),
        LegacyEncoding::flag(keys::PARKING),
        LegacyEncoding::count(keys::PARKING_COUNT),
    ],
};

/// Plain decimal text: optional minus, digits, optional fraction.
///
/// Matches the pattern the SQL renderer guards numeric casts with.
pub fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}
