//! Conversion between typed JSON payloads and the flat property payloads of
//! the instance model, parameterised by the declared element kind and width.

use crate::infer::{DataKind, Payload, TypedJson};
use dimdb_core::{
    error::{Error, Result},
    instance::PropertyValue,
    types::TypeKind,
};

/// Convert an inferred payload into a property payload of the declared kind
/// and element width.
pub(crate) fn to_property_value(
    name: &str,
    data: &TypedJson,
    kind: TypeKind,
    size: usize,
) -> Result<PropertyValue> {
    let mismatch = || {
        Error::TypeMismatch(format!(
            "property '{name}' is declared {}, stored value is {:?}",
            kind.label(),
            data.kind
        ))
        .emit()
    };

    match kind {
        TypeKind::Bool => {
            let Payload::Ints(values) = &data.payload else {
                return Err(mismatch());
            };
            Ok(PropertyValue::Fixed(
                values.iter().map(|&v| u8::from(v != 0)).collect(),
            ))
        }
        TypeKind::Int => {
            let Payload::Ints(values) = &data.payload else {
                return Err(mismatch());
            };
            let mut bytes = Vec::with_capacity(values.len() * size);
            for &v in values {
                encode_int(name, v, size, &mut bytes)?;
            }
            Ok(PropertyValue::Fixed(bytes))
        }
        TypeKind::Uint => {
            let Payload::Ints(values) = &data.payload else {
                return Err(mismatch());
            };
            let mut bytes = Vec::with_capacity(values.len() * size);
            for &v in values {
                let v = u64::try_from(v).map_err(|_| {
                    Error::Format(format!(
                        "property '{name}': negative value {v} in an unsigned property"
                    ))
                    .emit()
                })?;
                encode_uint(name, v, size, &mut bytes)?;
            }
            Ok(PropertyValue::Fixed(bytes))
        }
        TypeKind::Float => {
            let values: Vec<f64> = match &data.payload {
                Payload::Reals(values) => values.clone(),
                // Integers widen when the declared kind is floating.
                Payload::Ints(values) => values.iter().map(|&v| v as f64).collect(),
                Payload::Strings(_) => return Err(mismatch()),
            };
            let mut bytes = Vec::with_capacity(values.len() * size);
            for v in values {
                match size {
                    4 => bytes.extend_from_slice(&(v as f32).to_ne_bytes()),
                    _ => bytes.extend_from_slice(&v.to_ne_bytes()),
                }
            }
            Ok(PropertyValue::Fixed(bytes))
        }
        TypeKind::String => {
            let Payload::Strings(values) = &data.payload else {
                return Err(mismatch());
            };
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            PropertyValue::fixstrings(&refs, size).ok_or_else(|| {
                Error::Format(format!(
                    "property '{name}': a value does not fit a {size}-byte fixed string"
                ))
                .emit()
            })
        }
        TypeKind::StringPtr => {
            let Payload::Strings(values) = &data.payload else {
                return Err(mismatch());
            };
            Ok(PropertyValue::Strings(values.clone()))
        }
        TypeKind::Blob => {
            let Payload::Strings(values) = &data.payload else {
                return Err(mismatch());
            };
            let mut bytes = Vec::with_capacity(values.len() * size);
            for v in values {
                bytes.extend_from_slice(&hex_decode(name, v, size)?);
            }
            Ok(PropertyValue::Fixed(bytes))
        }
    }
}

/// Convert a property payload into a typed JSON payload.
pub(crate) fn from_property_value(
    name: &str,
    value: &PropertyValue,
    kind: TypeKind,
    size: usize,
    dims: &[u64],
) -> Result<TypedJson> {
    let dims = (!dims.is_empty()).then(|| dims.iter().map(|&d| d as usize).collect());

    let expect_fixed = || {
        value.as_fixed().ok_or_else(|| {
            Error::TypeMismatch(format!(
                "property '{name}' is declared {}, payload holds strings",
                kind.label()
            ))
            .emit()
        })
    };

    let (data_kind, payload) = match kind {
        TypeKind::Bool => {
            let bytes = expect_fixed()?;
            (
                DataKind::Bool,
                Payload::Ints(bytes.iter().map(|&b| i64::from(b != 0)).collect()),
            )
        }
        TypeKind::Int => {
            let bytes = expect_fixed()?;
            (
                DataKind::Int,
                Payload::Ints(chunks(bytes, size).map(decode_int).collect()),
            )
        }
        TypeKind::Uint => {
            let bytes = expect_fixed()?;
            let mut values = Vec::new();
            for chunk in chunks(bytes, size) {
                let v = decode_uint(chunk);
                values.push(i64::try_from(v).map_err(|_| {
                    Error::Format(format!(
                        "property '{name}': value {v} exceeds the json integer range"
                    ))
                    .emit()
                })?);
            }
            (DataKind::Int, Payload::Ints(values))
        }
        TypeKind::Float => {
            let bytes = expect_fixed()?;
            let values = chunks(bytes, size)
                .map(|chunk| match size {
                    4 => {
                        let mut raw = [0u8; 4];
                        raw.copy_from_slice(chunk);
                        f64::from(f32::from_ne_bytes(raw))
                    }
                    _ => {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(chunk);
                        f64::from_ne_bytes(raw)
                    }
                })
                .collect();
            (DataKind::Real, Payload::Reals(values))
        }
        TypeKind::String => {
            let bytes = expect_fixed()?;
            let mut values = Vec::new();
            for chunk in chunks(bytes, size) {
                let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                let text = std::str::from_utf8(&chunk[..end]).map_err(|_| {
                    Error::Format(format!(
                        "property '{name}': fixed string holds invalid utf-8"
                    ))
                    .emit()
                })?;
                values.push(text.to_string());
            }
            (DataKind::String, Payload::Strings(values))
        }
        TypeKind::StringPtr => {
            let PropertyValue::Strings(values) = value else {
                return Err(Error::TypeMismatch(format!(
                    "property '{name}' is declared string, payload holds raw bytes"
                ))
                .emit());
            };
            (DataKind::String, Payload::Strings(values.clone()))
        }
        TypeKind::Blob => {
            let bytes = expect_fixed()?;
            (
                DataKind::String,
                Payload::Strings(chunks(bytes, size).map(hex_encode).collect()),
            )
        }
    };

    Ok(TypedJson {
        kind: data_kind,
        dims,
        payload,
    })
}

fn chunks(bytes: &[u8], size: usize) -> impl Iterator<Item = &[u8]> {
    bytes.chunks_exact(size.max(1))
}

fn encode_int(name: &str, v: i64, size: usize, out: &mut Vec<u8>) -> Result<()> {
    let range_error = || {
        Error::Format(format!(
            "property '{name}': integer {v} does not fit in {size} bytes"
        ))
        .emit()
    };
    match size {
        1 => out.extend_from_slice(&i8::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        2 => out.extend_from_slice(&i16::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        4 => out.extend_from_slice(&i32::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        _ => out.extend_from_slice(&v.to_ne_bytes()),
    }
    Ok(())
}

fn encode_uint(name: &str, v: u64, size: usize, out: &mut Vec<u8>) -> Result<()> {
    let range_error = || {
        Error::Format(format!(
            "property '{name}': integer {v} does not fit in {size} bytes"
        ))
        .emit()
    };
    match size {
        1 => out.extend_from_slice(&u8::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        2 => out.extend_from_slice(&u16::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        4 => out.extend_from_slice(&u32::try_from(v).map_err(|_| range_error())?.to_ne_bytes()),
        _ => out.extend_from_slice(&v.to_ne_bytes()),
    }
    Ok(())
}

fn decode_int(chunk: &[u8]) -> i64 {
    match chunk.len() {
        1 => i64::from(chunk[0] as i8),
        2 => {
            let mut raw = [0u8; 2];
            raw.copy_from_slice(chunk);
            i64::from(i16::from_ne_bytes(raw))
        }
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            i64::from(i32::from_ne_bytes(raw))
        }
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            i64::from_ne_bytes(raw)
        }
    }
}

fn decode_uint(chunk: &[u8]) -> u64 {
    match chunk.len() {
        1 => u64::from(chunk[0]),
        2 => {
            let mut raw = [0u8; 2];
            raw.copy_from_slice(chunk);
            u64::from(u16::from_ne_bytes(raw))
        }
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            u64::from(u32::from_ne_bytes(raw))
        }
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            u64::from_ne_bytes(raw)
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn hex_decode(name: &str, text: &str, size: usize) -> Result<Vec<u8>> {
    let fail = || {
        Error::Format(format!(
            "property '{name}': '{text}' is not a {size}-byte hex blob"
        ))
        .emit()
    };
    if text.len() != size * 2 {
        return Err(fail());
    }
    (0..size)
        .map(|i| u8::from_str_radix(&text[2 * i..2 * i + 2], 16).map_err(|_| fail()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimdb_core::obs::{NoopDiagSink, with_diag_sink};

    fn ints(values: &[i64], dims: Option<Vec<usize>>) -> TypedJson {
        TypedJson {
            kind: DataKind::Int,
            dims,
            payload: Payload::Ints(values.to_vec()),
        }
    }

    #[test]
    fn int_widths_round_trip() {
        for size in [1usize, 2, 4, 8] {
            let data = ints(&[-1, 0, 42], Some(vec![3]));
            let value = to_property_value("p", &data, TypeKind::Int, size).unwrap();
            let back = from_property_value("p", &value, TypeKind::Int, size, &[3]).unwrap();
            assert_eq!(back.payload, data.payload);
        }
    }

    #[test]
    fn int_range_is_checked() {
        with_diag_sink(&NoopDiagSink, || {
            let data = ints(&[300], None);
            assert!(to_property_value("p", &data, TypeKind::Int, 1).is_err());
            assert!(to_property_value("p", &data, TypeKind::Uint, 1).is_err());
            let negative = ints(&[-1], None);
            assert!(to_property_value("p", &negative, TypeKind::Uint, 8).is_err());
        });
    }

    #[test]
    fn floats_accept_integer_payloads() {
        let data = ints(&[1, 2], Some(vec![2]));
        let value = to_property_value("p", &data, TypeKind::Float, 8).unwrap();
        assert_eq!(value, PropertyValue::floats(&[1.0, 2.0]));
    }

    #[test]
    fn f32_properties_narrow_and_widen() {
        let data = TypedJson {
            kind: DataKind::Real,
            dims: Some(vec![2]),
            payload: Payload::Reals(vec![0.5, 1.5]),
        };
        let value = to_property_value("p", &data, TypeKind::Float, 4).unwrap();
        let back = from_property_value("p", &value, TypeKind::Float, 4, &[2]).unwrap();
        assert_eq!(back.payload, Payload::Reals(vec![0.5, 1.5]));
    }

    #[test]
    fn fixstrings_and_blobs_round_trip() {
        let strings = TypedJson {
            kind: DataKind::String,
            dims: Some(vec![2]),
            payload: Payload::Strings(vec!["ab".to_string(), "c".to_string()]),
        };
        let value = to_property_value("p", &strings, TypeKind::String, 4).unwrap();
        let back = from_property_value("p", &value, TypeKind::String, 4, &[2]).unwrap();
        assert_eq!(back.payload, strings.payload);

        let blobs = TypedJson {
            kind: DataKind::String,
            dims: None,
            payload: Payload::Strings(vec!["0a0b".to_string()]),
        };
        let value = to_property_value("p", &blobs, TypeKind::Blob, 2).unwrap();
        assert_eq!(value, PropertyValue::Fixed(vec![0x0a, 0x0b]));
        let back = from_property_value("p", &value, TypeKind::Blob, 2, &[]).unwrap();
        assert_eq!(back.payload, blobs.payload);
    }

    #[test]
    fn kind_mismatches_are_rejected() {
        with_diag_sink(&NoopDiagSink, || {
            let data = TypedJson {
                kind: DataKind::String,
                dims: None,
                payload: Payload::Strings(vec!["x".to_string()]),
            };
            let err = to_property_value("p", &data, TypeKind::Int, 8).unwrap_err();
            assert_eq!(err.kind(), dimdb_core::ErrorKind::TypeMismatch);
        });
    }
}
