// Shared helpers for the code generators: casing, type mapping, file headers.

use crate::schema::FieldType;

/// snake_case -> PascalCase.
pub fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Rust type for a field in a generated model struct.
pub fn rust_type(ty: &FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Enum(_) => "String",
        FieldType::Int | FieldType::Int64 => "i64",
        FieldType::Float => "f64",
        FieldType::Bool => "bool",
        FieldType::Time => "DateTime<Utc>",
        FieldType::Uuid => "Uuid",
        FieldType::Json => "serde_json::Value",
        FieldType::Bytes => "Vec<u8>",
    }
}

/// `Node` accessor method that yields the mapped Rust type.
pub fn node_accessor(ty: &FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Enum(_) => "str",
        FieldType::Int | FieldType::Int64 => "i64",
        FieldType::Float => "f64",
        FieldType::Bool => "bool",
        FieldType::Time => "time",
        FieldType::Uuid => "uuid",
        FieldType::Json => "json",
        FieldType::Bytes => "bytes",
    }
}

/// Parameter type for a generated fluent setter, and the expression that
/// turns the parameter into a `Value`.
pub fn setter_signature(ty: &FieldType) -> (&'static str, &'static str) {
    match ty {
        FieldType::String | FieldType::Enum(_) => ("impl Into<String>", "value.into()"),
        FieldType::Int | FieldType::Int64 => ("i64", "value"),
        FieldType::Float => ("f64", "value"),
        FieldType::Bool => ("bool", "value"),
        FieldType::Time => ("DateTime<Utc>", "value"),
        FieldType::Uuid => ("Uuid", "value"),
        FieldType::Json => ("serde_json::Value", "value"),
        FieldType::Bytes => ("Vec<u8>", "value"),
    }
}

/// Whether the field type needs chrono imports in generated code.
pub fn needs_chrono(ty: &FieldType) -> bool {
    matches!(ty, FieldType::Time)
}

/// Whether the field type needs the uuid import in generated code.
pub fn needs_uuid(ty: &FieldType) -> bool {
    matches!(ty, FieldType::Uuid)
}

/// Standard header for every generated file.
pub fn file_header(kind: &str, entity: &str) -> String {
    format!(
        "// @generated {} for entity \"{}\".\n// DO NOT EDIT - regenerate with `entc generate`.\n\n",
        kind, entity
    )
}
