//! Registry-driven payload validation.
//!
//! Both store bindings run every incoming create/update payload through
//! these checks before touching a record, so validation behaves identically
//! regardless of which store backs the port.

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::{EntitySchema, FieldDef, FieldType};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' cannot be set directly")]
    ServerManaged(String),

    #[error("missing required field '{0}'")]
    MissingRequired(String),

    #[error("field '{0}' must not be null")]
    RequiredNull(String),

    #[error("field '{0}' must be {1}")]
    WrongType(String, &'static str),

    #[error("field '{0}' must be one of: {1}")]
    InvalidVariant(String, String),
}

/// Validate a create payload: all keys known and typed, all required fields
/// present and non-null.
pub fn validate_create(schema: &EntitySchema, payload: &Map<String, Value>) -> Result<(), PayloadError> {
    validate_fields(schema, payload)?;

    for field in schema.writable_fields().filter(|f| f.required) {
        match payload.get(field.name) {
            None | Some(Value::Null) => {
                return Err(PayloadError::MissingRequired(field.name.to_string()))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate a partial update payload: keys present must be known and typed;
/// absent fields stay untouched.
pub fn validate_update(schema: &EntitySchema, payload: &Map<String, Value>) -> Result<(), PayloadError> {
    validate_fields(schema, payload)
}

fn validate_fields(schema: &EntitySchema, payload: &Map<String, Value>) -> Result<(), PayloadError> {
    for (key, value) in payload {
        if let Some(field) = schema.field(key) {
            if field.server_managed {
                return Err(PayloadError::ServerManaged(key.clone()));
            }
            if value.is_null() {
                if field.required {
                    return Err(PayloadError::RequiredNull(key.clone()));
                }
                continue;
            }
            check_type(field, value)?;
        } else if schema.relation_for_payload(key).is_some() {
            if !value.is_null() {
                check_id_array(key, value)?;
            }
        } else {
            return Err(PayloadError::UnknownField(key.clone()));
        }
    }
    Ok(())
}

fn check_type(field: &FieldDef, value: &Value) -> Result<(), PayloadError> {
    let name = field.name.to_string();
    match field.ty {
        FieldType::Str | FieldType::Text => {
            if !value.is_string() {
                return Err(PayloadError::WrongType(name, "a string"));
            }
        }
        FieldType::Enumerated(variants) => {
            let s = value
                .as_str()
                .ok_or_else(|| PayloadError::WrongType(name.clone(), "a string"))?;
            if !variants.contains(&s) {
                return Err(PayloadError::InvalidVariant(name, variants.join(", ")));
            }
        }
        FieldType::Number => {
            if !value.is_number() {
                return Err(PayloadError::WrongType(name, "a number"));
            }
        }
        FieldType::StrArray => {
            let items = value
                .as_array()
                .ok_or_else(|| PayloadError::WrongType(name.clone(), "an array of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(PayloadError::WrongType(name, "an array of strings"));
            }
        }
        FieldType::Reference(_) => {
            parse_id(&name, value)?;
        }
        // Server-managed types are rejected before the type check.
        FieldType::Id | FieldType::Timestamp => {
            return Err(PayloadError::ServerManaged(name));
        }
    }
    Ok(())
}

fn check_id_array(key: &str, value: &Value) -> Result<(), PayloadError> {
    let items = value
        .as_array()
        .ok_or_else(|| PayloadError::WrongType(key.to_string(), "an array of ids"))?;
    for item in items {
        parse_id(key, item)?;
    }
    Ok(())
}

/// Parse a JSON value expected to hold a UUID.
pub fn parse_id(name: &str, value: &Value) -> Result<Uuid, PayloadError> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| PayloadError::WrongType(name.to_string(), "a UUID"))
}
