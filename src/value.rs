// Runtime value representation shared by builders, specs and drivers.
// Every bindable parameter and every hydrated column passes through `Value`,
// so the executor can stay generic over entity shapes.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EntError, EntResult};
use crate::schema::field::FieldType;

/// A dynamically typed field value.
///
/// Storage mapping: `Time` is persisted as millisecond BIGINTs,
/// `Uuid`/`Json`/`Enum` as TEXT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check that this value is admissible for the given field type.
    pub fn check_type(&self, field: &str, ty: &FieldType) -> EntResult<()> {
        let ok = match (self, ty) {
            (Value::Null, _) => true,
            (Value::String(_), FieldType::String) => true,
            (Value::String(s), FieldType::Enum(variants)) => {
                if variants.iter().any(|v| v == s) {
                    true
                } else {
                    return Err(EntError::Validation(format!(
                        "field \"{}\": \"{}\" is not a variant of {:?}",
                        field, s, variants
                    )));
                }
            }
            (Value::I64(_), FieldType::Int | FieldType::Int64) => true,
            (Value::F64(_), FieldType::Float) => true,
            (Value::I64(_), FieldType::Float) => true,
            (Value::Bool(_), FieldType::Bool) => true,
            (Value::Time(_), FieldType::Time) => true,
            (Value::Uuid(_), FieldType::Uuid) => true,
            (Value::Json(_), FieldType::Json) => true,
            (Value::Bytes(_), FieldType::Bytes) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(EntError::Validation(format!(
                "field \"{}\" expects {:?}, got {:?}",
                field, ty, self
            )))
        }
    }

    /// Convert a raw driver value (integers, floats, text, blobs) into the
    /// typed value dictated by the schema. This is the scanner half of
    /// hydration: drivers only see SQL storage classes.
    pub fn hydrate(raw: Value, ty: &FieldType) -> EntResult<Value> {
        match (raw, ty) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::I64(ms), FieldType::Time) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(Value::Time)
                .ok_or_else(|| EntError::Validation(format!("invalid timestamp {}", ms))),
            (Value::I64(b), FieldType::Bool) => Ok(Value::Bool(b != 0)),
            (Value::Bool(b), FieldType::Bool) => Ok(Value::Bool(b)),
            (Value::I64(n), FieldType::Float) => Ok(Value::F64(n as f64)),
            (Value::String(s), FieldType::Uuid) => Uuid::parse_str(&s)
                .map(Value::Uuid)
                .map_err(|e| EntError::Validation(format!("invalid uuid \"{}\": {}", s, e))),
            (Value::String(s), FieldType::Json) => serde_json::from_str(&s)
                .map(Value::Json)
                .map_err(|e| EntError::Validation(format!("invalid json: {}", e))),
            (raw, _) => Ok(raw),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            Value::I64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I64(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_check() {
        assert!(Value::from("abc").check_type("name", &FieldType::String).is_ok());
        assert!(Value::from(1i64).check_type("name", &FieldType::String).is_err());
        assert!(Value::Null.check_type("name", &FieldType::String).is_ok());

        let status = FieldType::Enum(vec!["draft".into(), "published".into()]);
        assert!(Value::from("draft").check_type("status", &status).is_ok());
        assert!(Value::from("archived").check_type("status", &status).is_err());
    }

    #[test]
    fn test_hydrate_time_roundtrip() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap();
        let hydrated = Value::hydrate(Value::I64(now.timestamp_millis()), &FieldType::Time).unwrap();
        assert_eq!(hydrated.as_time(), Some(now));
    }

    #[test]
    fn test_hydrate_bool_from_sqlite_integer() {
        assert_eq!(
            Value::hydrate(Value::I64(1), &FieldType::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::hydrate(Value::I64(0), &FieldType::Bool).unwrap(),
            Value::Bool(false)
        );
    }
}
