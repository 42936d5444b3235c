//! Structural validation of JSON documents against the shape of a target type.
//!
//! Deserializing with serde silently ignores keys a type does not declare, so a
//! misspelled manifest key would quietly fall back to a default. Validating the
//! untyped document against a [`Shape`] first reports every such key, together
//! with any container mismatch, before the typed decode runs.
//!
//! Only containers and records are checked; scalar types are left to serde.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Display;

use bevy_derive::{Deref, DerefMut};
use itertools::Itertools as _;
use serde_json::Value;
use thiserror::Error;

use crate::json::{self, DecodeError};

/// Guards the shape search against recursive record types.
const MAX_SHAPE_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug)]
pub enum Shape {
    /// Numbers, strings and booleans.
    Scalar,
    /// Any JSON value is accepted.
    Any,
    /// A JSON array of the element shape, or a string encoding the whole sequence.
    Sequence(fn() -> Shape),
    /// A JSON object with arbitrary keys mapping to the value shape.
    Mapping(fn() -> Shape),
    Record(&'static RecordShape),
}

#[derive(Debug)]
pub struct RecordShape {
    pub name: &'static str,
    pub fields: &'static [FieldShape],
}

#[derive(Debug)]
pub struct FieldShape {
    /// Comma separated keys accepted for this field.
    pub tags: &'static str,
    pub shape: fn() -> Shape,
}

impl FieldShape {
    pub fn accepts(&self, key: &str) -> bool {
        self.tags.split(',').any(|tag| tag.trim() == key)
    }
}

impl RecordShape {
    pub fn field(&self, key: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.accepts(key))
    }
}

impl Shape {
    /// The first record reachable from this shape that declares `key`.
    pub fn record_declaring(self, key: &str) -> Option<&'static RecordShape> {
        self.record_declaring_at_depth(key, 0)
    }

    fn record_declaring_at_depth(self, key: &str, depth: usize) -> Option<&'static RecordShape> {
        if depth > MAX_SHAPE_DEPTH {
            return None;
        }
        match self {
            Shape::Sequence(inner) | Shape::Mapping(inner) => {
                inner().record_declaring_at_depth(key, depth + 1)
            }
            Shape::Record(record) => {
                if record.field(key).is_some() {
                    Some(record)
                } else {
                    record
                        .fields
                        .iter()
                        .find_map(|field| (field.shape)().record_declaring_at_depth(key, depth + 1))
                }
            }
            Shape::Scalar | Shape::Any => None,
        }
    }
}

/// Types with a statically known JSON shape.
pub trait Schema {
    fn shape() -> Shape;
}

macro_rules! scalar_schema {
    ($($ty:ty),*) => {
        $(
            impl Schema for $ty {
                fn shape() -> Shape {
                    Shape::Scalar
                }
            }
        )*
    };
}

scalar_schema!(
    bool, char, String, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64
);

impl Schema for Value {
    fn shape() -> Shape {
        Shape::Any
    }
}

impl<T: Schema> Schema for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Schema> Schema for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

macro_rules! sequence_schema {
    ($($ty:ident),*) => {
        $(
            impl<T: Schema> Schema for $ty<T> {
                fn shape() -> Shape {
                    Shape::Sequence(T::shape)
                }
            }
        )*
    };
}

sequence_schema!(Vec, VecDeque, BTreeSet, HashSet);

impl<T: Schema, const N: usize> Schema for [T; N] {
    fn shape() -> Shape {
        Shape::Sequence(T::shape)
    }
}

impl<V: Schema, S> Schema for HashMap<String, V, S> {
    fn shape() -> Shape {
        Shape::Mapping(V::shape)
    }
}

impl<V: Schema> Schema for BTreeMap<String, V> {
    fn shape() -> Shape {
        Shape::Mapping(V::shape)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("{path}: unrecognized field \"{field}\" for {record}, possibly misspelled")]
    UnrecognizedField {
        path: String,
        record: &'static str,
        field: String,
    },
    #[error("{path}: unexpected data format, expected {expected} but found {found}")]
    UnexpectedKind {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct Violations(pub Vec<Violation>);

impl Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join("\n"))
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("errors in JSON:\n{0}")]
    Violations(Violations),
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

fn check_recursive(value: &Value, shape: Shape, path: &mut String, violations: &mut Violations) {
    match (shape, value) {
        (Shape::Scalar | Shape::Any, _) => {}
        (Shape::Sequence(element), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                check_recursive(item, element(), path, violations);
                path.truncate(len);
            }
        }
        // sequences may be encoded as a single string, e.g. "N042.20.55.000 W071.00.22.000"
        (Shape::Sequence(_), Value::String(_)) => {}
        (Shape::Mapping(value_shape), Value::Object(entries)) => {
            for (key, entry) in entries {
                let len = path.len();
                path.push_str(&format!(".{key}"));
                check_recursive(entry, value_shape(), path, violations);
                path.truncate(len);
            }
        }
        (Shape::Record(record), Value::Object(entries)) => {
            for (key, entry) in entries {
                let len = path.len();
                path.push_str(&format!(".{key}"));
                match record.field(key) {
                    Some(field) => check_recursive(entry, (field.shape)(), path, violations),
                    None => violations.push(Violation::UnrecognizedField {
                        path: path.clone(),
                        record: record.name,
                        field: key.clone(),
                    }),
                }
                path.truncate(len);
            }
        }
        (Shape::Sequence(_), _) => violations.push(Violation::UnexpectedKind {
            path: path.clone(),
            expected: "array",
            found: kind_name(value),
        }),
        (Shape::Mapping(_) | Shape::Record(_), _) => violations.push(Violation::UnexpectedKind {
            path: path.clone(),
            expected: "object",
            found: kind_name(value),
        }),
    }
}

/// Every structural mismatch between `value` and `shape`.
///
/// Object members are visited in key order, so violations follow the sorted
/// member paths rather than their position in the source text.
pub fn check(value: &Value, shape: Shape) -> Violations {
    let mut violations = Violations::default();
    check_recursive(value, shape, &mut "$".to_string(), &mut violations);
    violations
}

pub fn validate<T: Schema>(contents: &[u8]) -> Result<(), SchemaError> {
    let value: Value = json::from_slice(contents)?;
    let violations = check(&value, T::shape());
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Violations(violations))
    }
}
