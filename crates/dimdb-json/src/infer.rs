//! JSON shape and type inference.
//!
//! Classifies an arbitrary JSON value into a typed, flattened,
//! shape-annotated payload: the element kinds of all leaves are merged over
//! a small lattice, the shape is checked for rectangularity, and the leaves
//! are emitted depth-first into one dense buffer. The inverse direction
//! materialises a scalar or nested JSON array from a typed payload.

use dimdb_core::error::Error;
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error as ThisError;

/// Maximum tensor rank the inferer accepts.
pub const NDIM_MAX: usize = 8;

///
/// JsonKind
///
/// Coarse classification of one JSON node.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JsonKind {
    Undefined,
    Object,
    Array,
    Integer,
    Real,
    String,
    Bool,
    Null,
    Mixed,
}

impl JsonKind {
    /// One-character code, handy in diagnostics.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Undefined => 'x',
            Self::Object => 'o',
            Self::Array => 'a',
            Self::Integer => 'i',
            Self::Real => 'r',
            Self::String => 's',
            Self::Bool => 'b',
            Self::Null => 'n',
            Self::Mixed => 'm',
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Object => "object",
            Self::Array => "array",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
            Self::Bool => "boolean",
            Self::Null => "null",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify one JSON node.
#[must_use]
pub fn kind_of(value: &Value) -> JsonKind {
    match value {
        Value::Object(_) => JsonKind::Object,
        Value::Array(_) => JsonKind::Array,
        Value::String(_) => JsonKind::String,
        Value::Bool(_) => JsonKind::Bool,
        Value::Null => JsonKind::Null,
        Value::Number(n) => {
            if n.is_i64() {
                JsonKind::Integer
            } else {
                JsonKind::Real
            }
        }
    }
}

/// The commutative merge lattice over element kinds: `Undefined` is bottom,
/// integers widen to reals, anything else that differs is `Mixed`.
#[must_use]
pub fn merge(t1: JsonKind, t2: JsonKind) -> JsonKind {
    match (t1, t2) {
        (JsonKind::Undefined, t) | (t, JsonKind::Undefined) => t,
        (JsonKind::Integer, JsonKind::Real) | (JsonKind::Real, JsonKind::Integer) => JsonKind::Real,
        _ if t1 == t2 => t1,
        _ => JsonKind::Mixed,
    }
}

/// Merged element kind of all leaves of an array, stopping at the first
/// `Mixed`.
#[must_use]
pub fn array_kind(value: &Value) -> JsonKind {
    let Value::Array(items) = value else {
        return JsonKind::Undefined;
    };
    let mut acc = JsonKind::Undefined;
    for item in items {
        let kind = if matches!(item, Value::Array(_)) {
            array_kind(item)
        } else {
            kind_of(item)
        };
        acc = merge(acc, kind);
        if acc == JsonKind::Mixed {
            break;
        }
    }
    acc
}

///
/// InferError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum InferError {
    #[error("array mixes element kinds")]
    Mixed,

    #[error("array is not rectangular")]
    NotRectangular,

    #[error("array rank exceeds {max} dimensions")]
    TooDeep { max: usize },

    #[error("cannot infer a typed value from a {0} node")]
    Unsupported(JsonKind),
}

impl From<InferError> for Error {
    fn from(err: InferError) -> Self {
        Self::Format(err.to_string())
    }
}

///
/// DataKind
///
/// Element kind of a typed payload.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataKind {
    Int,
    Real,
    Bool,
    String,
}

///
/// Payload
///

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Ints(Vec<i64>),
    Reals(Vec<f64>),
    Strings(Vec<String>),
}

impl Payload {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ints(v) => v.len(),
            Self::Reals(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

///
/// TypedJson
///
/// A typed, flattened, shape-annotated value. `dims == None` means scalar,
/// with a payload of exactly one element; otherwise the payload holds
/// `Π dims` elements in C order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct TypedJson {
    pub kind: DataKind,
    pub dims: Option<Vec<usize>>,
    pub payload: Payload,
}

impl TypedJson {
    #[must_use]
    pub fn nmemb(&self) -> usize {
        self.payload.len()
    }
}

/// Infer the typed value of an arbitrary JSON node.
pub fn typed_value(value: &Value) -> Result<TypedJson, InferError> {
    match kind_of(value) {
        JsonKind::Array => {
            let elem = array_kind(value);
            let dims = array_shape(value)?;
            let (kind, payload) = match elem {
                JsonKind::Integer => (DataKind::Int, Payload::Ints(flatten_ints(value))),
                JsonKind::Real => (DataKind::Real, Payload::Reals(flatten_reals(value))),
                JsonKind::Bool => (DataKind::Bool, Payload::Ints(flatten_ints(value))),
                JsonKind::String => (DataKind::String, Payload::Strings(flatten_strings(value))),
                JsonKind::Mixed => return Err(InferError::Mixed),
                other => return Err(InferError::Unsupported(other)),
            };
            let nmemb: usize = dims.iter().product();
            if payload.len() != nmemb {
                return Err(InferError::NotRectangular);
            }
            Ok(TypedJson {
                kind,
                dims: Some(dims),
                payload,
            })
        }
        JsonKind::Integer => Ok(scalar(
            DataKind::Int,
            Payload::Ints(vec![value.as_i64().unwrap_or_default()]),
        )),
        JsonKind::Real => Ok(scalar(
            DataKind::Real,
            Payload::Reals(vec![value.as_f64().unwrap_or_default()]),
        )),
        JsonKind::Bool => Ok(scalar(
            DataKind::Bool,
            Payload::Ints(vec![i64::from(value == &Value::Bool(true))]),
        )),
        JsonKind::String => Ok(scalar(
            DataKind::String,
            Payload::Strings(vec![value.as_str().unwrap_or_default().to_string()]),
        )),
        other => Err(InferError::Unsupported(other)),
    }
}

const fn scalar(kind: DataKind, payload: Payload) -> TypedJson {
    TypedJson {
        kind,
        dims: None,
        payload,
    }
}

/// Rectangular shape of a (possibly nested) array. Sibling arrays at the
/// same depth must agree on their length, and every leaf must sit at the
/// same depth.
fn array_shape(value: &Value) -> Result<Vec<usize>, InferError> {
    fn visit(
        value: &Value,
        depth: usize,
        dims: &mut Vec<usize>,
        leaf_depth: &mut Option<usize>,
    ) -> Result<(), InferError> {
        if let Value::Array(items) = value {
            if depth >= NDIM_MAX {
                return Err(InferError::TooDeep { max: NDIM_MAX });
            }
            if dims.len() == depth {
                dims.push(items.len());
            } else if dims[depth] != items.len() {
                return Err(InferError::NotRectangular);
            }
            for item in items {
                visit(item, depth + 1, dims, leaf_depth)?;
            }
        } else {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => return Err(InferError::NotRectangular),
                Some(_) => {}
            }
        }
        Ok(())
    }

    let mut dims = Vec::new();
    let mut leaf_depth = None;
    visit(value, 0, &mut dims, &mut leaf_depth)?;
    Ok(dims)
}

fn flatten_ints(value: &Value) -> Vec<i64> {
    fn visit(value: &Value, out: &mut Vec<i64>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| visit(item, out)),
            Value::Bool(b) => out.push(i64::from(*b)),
            Value::Number(n) => out.push(n.as_i64().unwrap_or_else(|| {
                n.as_f64().unwrap_or_default() as i64
            })),
            _ => out.push(0),
        }
    }
    let mut out = Vec::new();
    visit(value, &mut out);
    out
}

fn flatten_reals(value: &Value) -> Vec<f64> {
    fn visit(value: &Value, out: &mut Vec<f64>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| visit(item, out)),
            Value::Bool(b) => out.push(f64::from(u8::from(*b))),
            Value::Number(n) => out.push(n.as_f64().unwrap_or_default()),
            _ => out.push(0.0),
        }
    }
    let mut out = Vec::new();
    visit(value, &mut out);
    out
}

fn flatten_strings(value: &Value) -> Vec<String> {
    fn visit(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| visit(item, out)),
            other => out.push(other.as_str().unwrap_or_default().to_string()),
        }
    }
    let mut out = Vec::new();
    visit(value, &mut out);
    out
}

/// Materialise a JSON node from a typed payload and attach it to `object`
/// under `name`: a scalar for `dims == None`, a nested array otherwise.
pub fn attach(
    object: &mut Map<String, Value>,
    name: &str,
    data: &TypedJson,
) -> dimdb_core::Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArg("property name must be non-blank".to_string()).emit());
    }

    let items = materialise_items(data)?;
    let value = match &data.dims {
        None => items.into_iter().next().ok_or_else(|| {
            Error::Format(format!("scalar payload for '{name}' is empty")).emit()
        })?,
        Some(dims) => nest(dims, &items),
    };

    object.insert(name.to_string(), value);
    Ok(())
}

fn materialise_items(data: &TypedJson) -> dimdb_core::Result<Vec<Value>> {
    let items = match (&data.payload, data.kind) {
        (Payload::Ints(values), DataKind::Bool) => {
            values.iter().map(|&v| Value::Bool(v != 0)).collect()
        }
        (Payload::Ints(values), _) => values
            .iter()
            .map(|&v| Value::Number(Number::from(v)))
            .collect(),
        (Payload::Reals(values), _) => values
            .iter()
            .map(|&v| {
                Number::from_f64(v).map(Value::Number).ok_or_else(|| {
                    Error::Format(format!("non-finite real {v} cannot be written as json"))
                        .emit()
                })
            })
            .collect::<dimdb_core::Result<Vec<Value>>>()?,
        (Payload::Strings(values), _) => values
            .iter()
            .map(|v| Value::String(v.clone()))
            .collect(),
    };
    Ok(items)
}

fn nest(dims: &[usize], items: &[Value]) -> Value {
    match dims {
        [] | [_] => Value::Array(items.to_vec()),
        [head, rest @ ..] => {
            if *head == 0 {
                return Value::Array(Vec::new());
            }
            let stride = items.len() / head;
            Value::Array(
                (0..*head)
                    .map(|i| nest(rest, &items[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}
