//! Lax validation of raw JSON against a [`Model`].
//!
//! Coercion rules:
//! - integers and numbers parse from strings
//! - booleans accept `1/true/on/yes/t/y` and `0/false/off/no/f/n` (any case)
//! - UUIDs parse from strings and come out hyphenated lowercase
//! - `null` passes only for nullable fields

use crate::model::{Constraints, Field, FieldType, Model};
use penta_core::{ErrorKind, FieldError, LocPart};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

const TRUE_WORDS: [&str; 6] = ["1", "true", "on", "yes", "t", "y"];
const FALSE_WORDS: [&str; 6] = ["0", "false", "off", "no", "f", "n"];

/// Interprets a string as a boolean using the lax rules.
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    let lowered = text.trim().to_ascii_lowercase();
    if TRUE_WORDS.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

impl Model {
    /// Validates `input`, returning an object keyed by field name.
    ///
    /// All failures are collected; locations use wire names and are relative
    /// to `input`.
    pub fn validate(&self, input: &Value) -> Result<Map<String, Value>, Vec<FieldError>> {
        let Value::Object(object) = input else {
            return Err(vec![FieldError::new(ErrorKind::ModelAttributesType)]);
        };

        let mut output = Map::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            let wire = field.wire_name();
            match object.get(wire) {
                None => {
                    if field.required {
                        errors.push(FieldError::missing().at([wire]));
                    } else {
                        output.insert(
                            field.name.clone(),
                            field.default.clone().unwrap_or(Value::Null),
                        );
                    }
                }
                Some(raw) => match validate_field(field, raw) {
                    Ok(value) => {
                        output.insert(field.name.clone(), value);
                    }
                    Err(field_errors) => {
                        errors.extend(field_errors.into_iter().map(|e| e.under(wire)));
                    }
                },
            }
        }

        if self.forbid_extra {
            let known: HashSet<&str> = self.fields.iter().map(Field::wire_name).collect();
            for key in object.keys() {
                if !known.contains(key.as_str()) {
                    errors.push(FieldError::new(ErrorKind::ExtraForbidden).at([key.as_str()]));
                }
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}

/// Validates one field value (location relative to the field).
pub fn validate_field(field: &Field, raw: &Value) -> Result<Value, Vec<FieldError>> {
    if raw.is_null() && field.nullable {
        return Ok(Value::Null);
    }
    validate_value(&field.ty, &field.constraints, raw)
}

/// Accepts a float with no fractional part inside the `i64` range.
fn whole_i64(f: f64) -> Result<i64, ErrorKind> {
    // 2^63 itself is out of range; `i64::MAX as f64` rounds up to it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() != 0.0 {
        return Err(ErrorKind::IntType);
    }
    if !(-LIMIT..LIMIT).contains(&f) {
        return Err(ErrorKind::IntParsing);
    }
    Ok(f as i64)
}

fn validate_value(
    ty: &FieldType,
    constraints: &Constraints,
    raw: &Value,
) -> Result<Value, Vec<FieldError>> {
    let single = |error: FieldError| Err(vec![error]);
    match ty {
        FieldType::Any => Ok(raw.clone()),
        FieldType::String => match raw {
            Value::String(text) => check_string(text, constraints).map(|()| raw.clone()),
            _ => single(FieldError::new(ErrorKind::StringType)),
        },
        FieldType::Integer => {
            let parsed = match raw {
                Value::Number(n) => match n.as_i64() {
                    Some(n) => Ok(n),
                    None => n.as_f64().map_or(Err(ErrorKind::IntType), whole_i64),
                },
                Value::String(text) => text.trim().parse::<i64>().map_err(|_| ErrorKind::IntParsing),
                _ => Err(ErrorKind::IntType),
            };
            match parsed {
                Ok(n) => check_number(n as f64, constraints).map(|()| Value::from(n)),
                Err(kind) => single(FieldError::new(kind)),
            }
        }
        FieldType::Number => {
            let parsed = match raw {
                Value::Number(n) => n.as_f64().map(|f| (f, raw.clone())).ok_or(ErrorKind::FloatType),
                Value::String(text) => text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(|f| Number::from_f64(f).map(|n| (f, Value::Number(n))))
                    .ok_or(ErrorKind::FloatParsing),
                _ => Err(ErrorKind::FloatType),
            };
            match parsed {
                Ok((f, value)) => check_number(f, constraints).map(|()| value),
                Err(kind) => single(FieldError::new(kind)),
            }
        }
        FieldType::Boolean => match raw {
            Value::Bool(_) => Ok(raw.clone()),
            Value::String(text) => parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| vec![FieldError::new(ErrorKind::BoolParsing)]),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => single(FieldError::new(ErrorKind::BoolParsing)),
            },
            _ => single(FieldError::new(ErrorKind::BoolType)),
        },
        FieldType::Uuid => match raw {
            Value::String(text) => match uuid::Uuid::parse_str(text.trim()) {
                Ok(id) => Ok(Value::String(id.hyphenated().to_string())),
                Err(e) => single(FieldError::with_detail(ErrorKind::UuidParsing, e.to_string())),
            },
            _ => single(FieldError::new(ErrorKind::UuidType)),
        },
        FieldType::List(inner) => match raw {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut errors = Vec::new();
                let inner_constraints = Constraints::default();
                for (index, item) in items.iter().enumerate() {
                    match validate_value(inner, &inner_constraints, item) {
                        Ok(value) => out.push(value),
                        Err(item_errors) => errors.extend(
                            item_errors
                                .into_iter()
                                .map(|e| e.under(LocPart::Index(index))),
                        ),
                    }
                }
                if errors.is_empty() {
                    Ok(Value::Array(out))
                } else {
                    Err(errors)
                }
            }
            _ => single(FieldError::new(ErrorKind::ListType)),
        },
        FieldType::Model(model) => model.validate(raw).map(Value::Object),
    }
}

fn limit_value(limit: f64) -> Value {
    if limit.fract() == 0.0 && limit.abs() < 9.0e15 {
        Value::from(limit as i64)
    } else {
        Number::from_f64(limit).map_or(Value::Null, Value::Number)
    }
}

fn check_number(n: f64, constraints: &Constraints) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if let Some(limit) = constraints.gt.filter(|limit| n <= *limit) {
        errors.push(FieldError::bound(ErrorKind::GreaterThan, "gt", limit_value(limit)));
    }
    if let Some(limit) = constraints.ge.filter(|limit| n < *limit) {
        errors.push(FieldError::bound(ErrorKind::GreaterThanEqual, "ge", limit_value(limit)));
    }
    if let Some(limit) = constraints.lt.filter(|limit| n >= *limit) {
        errors.push(FieldError::bound(ErrorKind::LessThan, "lt", limit_value(limit)));
    }
    if let Some(limit) = constraints.le.filter(|limit| n > *limit) {
        errors.push(FieldError::bound(ErrorKind::LessThanEqual, "le", limit_value(limit)));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_string(text: &str, constraints: &Constraints) -> Result<(), Vec<FieldError>> {
    let len = text.chars().count();
    let mut errors = Vec::new();
    if let Some(min) = constraints.min_length.filter(|min| len < *min) {
        errors.push(FieldError::bound(ErrorKind::StringTooShort, "min_length", Value::from(min)));
    }
    if let Some(max) = constraints.max_length.filter(|max| len > *max) {
        errors.push(FieldError::bound(ErrorKind::StringTooLong, "max_length", Value::from(max)));
    }
    if let Some(pattern) = constraints.pattern.as_ref().filter(|p| !p.is_match(text)) {
        errors.push(FieldError::bound(
            ErrorKind::StringPatternMismatch,
            "pattern",
            Value::String(pattern.as_str().to_string()),
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
