//! Flat property payloads exchanged between instances and storage backends.

use crate::types::TypeKind;

///
/// PropertyValue
///
/// One property's contents as a flat, C-ordered payload. Fixed-width kinds
/// travel as native-endian bytes (`element size × element count`); owned
/// string elements travel as strings.
///

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Fixed(Vec<u8>),
    Strings(Vec<String>),
}

impl PropertyValue {
    /// 64-bit floats, one element each.
    #[must_use]
    pub fn floats(values: &[f64]) -> Self {
        Self::Fixed(values.iter().flat_map(|v| v.to_ne_bytes()).collect())
    }

    /// 64-bit signed integers, one element each.
    #[must_use]
    pub fn ints(values: &[i64]) -> Self {
        Self::Fixed(values.iter().flat_map(|v| v.to_ne_bytes()).collect())
    }

    /// 64-bit unsigned integers, one element each.
    #[must_use]
    pub fn uints(values: &[u64]) -> Self {
        Self::Fixed(values.iter().flat_map(|v| v.to_ne_bytes()).collect())
    }

    /// One-byte booleans.
    #[must_use]
    pub fn bools(values: &[bool]) -> Self {
        Self::Fixed(values.iter().map(|&v| u8::from(v)).collect())
    }

    /// Owned string elements.
    #[must_use]
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Strings(values.into_iter().map(Into::into).collect())
    }

    /// Inline fixed-width char buffers: each value is NUL-padded to `width`.
    /// Values longer than `width - 1` bytes are not representable and yield
    /// `None`.
    #[must_use]
    pub fn fixstrings(values: &[&str], width: usize) -> Option<Self> {
        let mut bytes = Vec::with_capacity(values.len() * width);
        for value in values {
            if value.len() >= width {
                return None;
            }
            bytes.extend_from_slice(value.as_bytes());
            bytes.resize(bytes.len() + (width - value.len()), 0);
        }
        Some(Self::Fixed(bytes))
    }

    /// Number of elements in this payload given the element width.
    #[must_use]
    pub fn nmemb(&self, elem_size: usize) -> usize {
        match self {
            Self::Fixed(bytes) if elem_size > 0 => bytes.len() / elem_size,
            Self::Fixed(_) => 0,
            Self::Strings(strings) => strings.len(),
        }
    }

    /// Whether this payload shape fits the given kind.
    #[must_use]
    pub const fn fits(&self, kind: TypeKind) -> bool {
        match self {
            Self::Fixed(_) => !matches!(kind, TypeKind::StringPtr),
            Self::Strings(_) => matches!(kind, TypeKind::StringPtr),
        }
    }

    /// The raw bytes of a fixed-width payload.
    #[must_use]
    pub fn as_fixed(&self) -> Option<&[u8]> {
        match self {
            Self::Fixed(bytes) => Some(bytes),
            Self::Strings(_) => None,
        }
    }

    /// The elements of a string payload.
    #[must_use]
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Self::Strings(strings) => Some(strings),
            Self::Fixed(_) => None,
        }
    }
}

///
/// PropertySlice
///
/// Borrowed view of one property inside an instance. String-pointer
/// elements expose their null/assigned state.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertySlice<'a> {
    Fixed(&'a [u8]),
    Strings(&'a [Option<String>]),
}

impl PropertySlice<'_> {
    /// Copy this view into an owned payload. Unassigned string elements
    /// become empty strings.
    #[must_use]
    pub fn to_value(&self) -> PropertyValue {
        match self {
            Self::Fixed(bytes) => PropertyValue::Fixed(bytes.to_vec()),
            Self::Strings(strings) => PropertyValue::Strings(
                strings
                    .iter()
                    .map(|s| s.clone().unwrap_or_default())
                    .collect(),
            ),
        }
    }

    /// The raw bytes of a fixed-width view.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Fixed(bytes) => Some(bytes),
            Self::Strings(_) => None,
        }
    }

    /// The elements of a string-pointer view.
    #[must_use]
    pub const fn as_strings(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Strings(strings) => Some(strings),
            Self::Fixed(_) => None,
        }
    }
}
