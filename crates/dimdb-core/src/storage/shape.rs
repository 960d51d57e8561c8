//! Shape utilities for backends.
//!
//! Converts between a flat C-ordered buffer and a nested per-dimension
//! representation, walking a multi-index in carry order. Backends whose
//! native format nests values per dimension use these to meet the flat
//! contract of [`DataModel`](crate::storage::DataModel).

use crate::error::{Error, Result};

///
/// MultiIndex
///
/// An odometer over a C-ordered index space: the last dimension varies
/// fastest, carries propagate leftwards.
///

#[derive(Debug)]
pub struct MultiIndex<'a> {
    dims: &'a [usize],
    index: Vec<usize>,
}

impl<'a> MultiIndex<'a> {
    #[must_use]
    pub fn new(dims: &'a [usize]) -> Self {
        Self {
            dims,
            index: vec![0; dims.len()],
        }
    }

    /// The current multi-index.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.index
    }

    /// Step to the next index; `false` once the space is exhausted.
    pub fn advance(&mut self) -> bool {
        for axis in (0..self.dims.len()).rev() {
            self.index[axis] += 1;
            if self.index[axis] < self.dims[axis] {
                return true;
            }
            self.index[axis] = 0;
        }
        false
    }
}

///
/// Nested
///
/// A value nested per dimension: lists of lists bottoming out in
/// `size`-byte leaves.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Nested {
    Leaf(Vec<u8>),
    List(Vec<Nested>),
}

impl Nested {
    fn leaf_at(&self, path: &[usize]) -> Option<&[u8]> {
        match (self, path) {
            (Self::Leaf(bytes), []) => Some(bytes),
            (Self::List(items), [head, rest @ ..]) => items.get(*head)?.leaf_at(rest),
            _ => None,
        }
    }
}

/// Total element count of a dims vector.
fn total(dims: &[usize]) -> Result<usize> {
    dims.iter().try_fold(1usize, |acc, &d| {
        acc.checked_mul(d)
            .ok_or(Error::Alloc("sizing a shaped buffer"))
    })
}

/// Nest a flat C-ordered buffer of `size`-byte elements into per-dimension
/// lists. An empty dims vector yields a single leaf.
pub fn flat_to_nested(src: &[u8], size: usize, dims: &[usize]) -> Result<Nested> {
    let nmemb = total(dims)?;
    let expected = nmemb
        .checked_mul(size)
        .ok_or(Error::Alloc("sizing a shaped buffer"))?;
    if src.len() != expected {
        return Err(Error::ShapeMismatch(format!(
            "flat buffer holds {} bytes, shape needs {expected}",
            src.len()
        )));
    }

    fn build(src: &[u8], size: usize, dims: &[usize]) -> Nested {
        match dims {
            [] => Nested::Leaf(src.to_vec()),
            [head, rest @ ..] => {
                let stride = src.len() / head.max(&1);
                Nested::List(
                    (0..*head)
                        .map(|i| build(&src[i * stride..(i + 1) * stride], size, rest))
                        .collect(),
                )
            }
        }
    }

    Ok(build(src, size, dims))
}

/// Flatten a nested representation back into one C-ordered buffer, walking
/// the index space in carry order and copying `size` bytes per leaf.
pub fn nested_to_flat(src: &Nested, size: usize, dims: &[usize]) -> Result<Vec<u8>> {
    let nmemb = total(dims)?;
    let mut flat = Vec::with_capacity(nmemb * size);

    let mut index = MultiIndex::new(dims);
    for _ in 0..nmemb {
        let leaf = src.leaf_at(index.indices()).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "nested value has no leaf at index {:?}",
                index.indices()
            ))
        })?;
        if leaf.len() != size {
            return Err(Error::ShapeMismatch(format!(
                "leaf at {:?} holds {} bytes, expected {size}",
                index.indices(),
                leaf.len()
            )));
        }
        flat.extend_from_slice(leaf);
        index.advance();
    }

    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odometer_walks_in_c_order() {
        let dims = [2, 3];
        let mut index = MultiIndex::new(&dims);
        let mut seen = vec![index.indices().to_vec()];
        while index.advance() {
            seen.push(index.indices().to_vec());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn nested_round_trip() {
        // 2x2 matrix of 2-byte elements.
        let flat: Vec<u8> = vec![1, 1, 2, 2, 3, 3, 4, 4];
        let nested = flat_to_nested(&flat, 2, &[2, 2]).unwrap();
        assert_eq!(
            nested,
            Nested::List(vec![
                Nested::List(vec![Nested::Leaf(vec![1, 1]), Nested::Leaf(vec![2, 2])]),
                Nested::List(vec![Nested::Leaf(vec![3, 3]), Nested::Leaf(vec![4, 4])]),
            ])
        );
        assert_eq!(nested_to_flat(&nested, 2, &[2, 2]).unwrap(), flat);
    }

    #[test]
    fn scalars_are_single_leaves() {
        let nested = flat_to_nested(&[7, 8], 2, &[]).unwrap();
        assert_eq!(nested, Nested::Leaf(vec![7, 8]));
        assert_eq!(nested_to_flat(&nested, 2, &[]).unwrap(), vec![7, 8]);
    }

    #[test]
    fn length_mismatches_are_rejected() {
        assert!(flat_to_nested(&[0u8; 7], 2, &[2, 2]).is_err());
        let ragged = Nested::List(vec![Nested::Leaf(vec![1, 1])]);
        assert!(nested_to_flat(&ragged, 2, &[2, 2]).is_err());
    }
}
