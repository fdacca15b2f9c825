// Field definitions - the declarative half of the schema DSL.
// Mirrors the fluent builder style of ent's field package: a schema lists
// FieldDefinitions and the registry resolves them into storage columns.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{EntError, EntResult};
use crate::id::current_time_millis;
use crate::value::Value;

/// Field types supported by the schema DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int,
    Int64,
    Float,
    Bool,
    Time,
    Uuid,
    Json,
    Bytes,
    Enum(Vec<String>),
}

/// Default values injected when a field was not explicitly set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDefault {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Wall-clock time at save(), for created_at/updated_at style fields.
    Now,
}

impl FieldDefault {
    pub fn materialize(&self) -> Value {
        match self {
            FieldDefault::String(s) => Value::String(s.clone()),
            FieldDefault::Int(n) => Value::I64(*n),
            FieldDefault::Float(f) => Value::F64(*f),
            FieldDefault::Bool(b) => Value::Bool(*b),
            FieldDefault::Now => {
                let ms = current_time_millis();
                match chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, ms).single() {
                    Some(t) => Value::Time(t),
                    None => Value::Null,
                }
            }
        }
    }
}

/// Field validators applied before a mutation is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValidator {
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    Range(f64, f64),
    NonEmpty,
}

// Patterns come from static schema definitions, so the compiled cache is
// small and never invalidated.
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn pattern_matches(pattern: &str, input: &str) -> EntResult<bool> {
    let mut cache = PATTERN_CACHE
        .lock()
        .map_err(|_| EntError::Validation("pattern cache poisoned".to_string()))?;
    if !cache.contains_key(pattern) {
        let compiled = Regex::new(pattern)
            .map_err(|e| EntError::Schema(format!("invalid pattern \"{}\": {}", pattern, e)))?;
        cache.insert(pattern.to_string(), compiled);
    }
    Ok(cache[pattern].is_match(input))
}

impl FieldValidator {
    /// Validate a value; Null always passes (optionality is checked
    /// separately via the required-field rules).
    pub fn validate(&self, field: &str, value: &Value) -> EntResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            FieldValidator::MinLength(min) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() < *min {
                        return Err(EntError::Validation(format!(
                            "field \"{}\" must be at least {} characters",
                            field, min
                        )));
                    }
                }
            }
            FieldValidator::MaxLength(max) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() > *max {
                        return Err(EntError::Validation(format!(
                            "field \"{}\" cannot exceed {} characters",
                            field, max
                        )));
                    }
                }
            }
            FieldValidator::Pattern(pattern) => {
                if let Some(s) = value.as_str() {
                    if !pattern_matches(pattern, s)? {
                        return Err(EntError::Validation(format!(
                            "field \"{}\" does not match pattern {}",
                            field, pattern
                        )));
                    }
                }
            }
            FieldValidator::Range(min, max) => {
                if let Some(n) = value.as_f64() {
                    if n < *min || n > *max {
                        return Err(EntError::Validation(format!(
                            "field \"{}\" must be within [{}, {}]",
                            field, min, max
                        )));
                    }
                }
            }
            FieldValidator::NonEmpty => {
                if let Some(s) = value.as_str() {
                    if s.trim().is_empty() {
                        return Err(EntError::Validation(format!(
                            "field \"{}\" cannot be empty",
                            field
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A single field declaration inside an entity schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub optional: bool,
    pub unique: bool,
    pub immutable: bool,
    pub default: Option<FieldDefault>,
    pub validators: Vec<FieldValidator>,
    pub storage_key: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            optional: false,
            unique: false,
            immutable: false,
            default: None,
            validators: Vec::new(),
            storage_key: None,
        }
    }

    /// Mark field as optional (nullable column, no required check).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark field as unique (UNIQUE constraint on the column).
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark field as immutable (rejected by update builders).
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn default_value(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Override the column name used in storage.
    pub fn storage_key(mut self, key: &str) -> Self {
        self.storage_key = Some(key.to_string());
        self
    }

    pub fn column(&self) -> String {
        self.storage_key.clone().unwrap_or_else(|| self.name.clone())
    }

    /// Run type check and all validators against a candidate value.
    pub fn check(&self, value: &Value) -> EntResult<()> {
        value.check_type(&self.name, &self.field_type)?;
        for validator in &self.validators {
            validator.validate(&self.name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators() {
        let field = FieldDefinition::new("username", FieldType::String)
            .validate(FieldValidator::MinLength(3))
            .validate(FieldValidator::MaxLength(30))
            .validate(FieldValidator::Pattern("^[a-zA-Z0-9_]+$".to_string()));

        assert!(field.check(&Value::from("alice_1")).is_ok());
        assert!(field.check(&Value::from("ab")).is_err());
        assert!(field.check(&Value::from("has spaces")).is_err());
        // Null passes validators; required-ness is enforced elsewhere.
        assert!(field.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_range_validator() {
        let field = FieldDefinition::new("score", FieldType::Float)
            .validate(FieldValidator::Range(0.0, 1.0));
        assert!(field.check(&Value::from(0.5)).is_ok());
        assert!(field.check(&Value::from(1.5)).is_err());
    }

    #[test]
    fn test_default_materialize() {
        assert_eq!(
            FieldDefault::Bool(false).materialize(),
            Value::Bool(false)
        );
        match FieldDefault::Now.materialize() {
            Value::Time(_) => {}
            other => panic!("expected Time, got {:?}", other),
        }
    }
}
