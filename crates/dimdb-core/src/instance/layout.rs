//! The instance layout engine.
//!
//! Given an entity's dimensions and properties, compute where every field of
//! an instance block lives. The walk mirrors a C struct layout: members are
//! placed in declaration order, padding is inserted before each member to
//! satisfy its alignment, and the block is trail-padded to the maximum
//! alignment seen. The same walk serves ordinary records and records that
//! describe records; only the declarations differ.

use crate::{
    error::{Error, Result},
    schema::{Dimension, Property},
    types::{self, POINTER_ALIGN, POINTER_SIZE, TypeKind},
};
use std::mem::size_of;

/// Bytes of one stored dimension size.
pub const DIM_SIZE: usize = size_of::<u64>();

/// Offset of the raw UUID bytes inside an instance block.
pub const UUID_OFFSET: usize = 0;

/// Fixed header footprint: 16 UUID bytes followed by two reserved
/// pointer-shaped slots (identifier and meta handles live outside the
/// block, but their footprint is part of the layout).
pub const HEADER_SIZE: usize = 16 + 2 * POINTER_SIZE;

/// Offset of the last header member (the reserved meta slot).
const HEADER_META_OFFSET: usize = 16 + POINTER_SIZE;

///
/// Layout
///
/// Derived per-entity layout of one instance block, computed once at entity
/// creation.
///

#[derive(Debug)]
pub struct Layout {
    size: usize,
    max_align: usize,
    dim_offset: usize,
    prop_offsets: Vec<usize>,
    rel_offset: usize,
}

impl Layout {
    /// Walk the declarations and place every member.
    pub fn compute(dimensions: &[Dimension], properties: &[Property]) -> Result<Self> {
        let overflow = || Error::Alloc("computing instance layout");

        // The header ends in a pointer-shaped member, so pointer alignment
        // is the floor for the whole block.
        let mut max_align = POINTER_ALIGN;
        let mut offset = HEADER_META_OFFSET;
        let mut prev_size = POINTER_SIZE;

        // Dimension sizes, one u64 per declared dimension.
        let dim_offset = types::member_offset(offset, prev_size, TypeKind::Uint, DIM_SIZE)
            .ok_or_else(overflow)?;
        for _ in dimensions {
            offset = types::member_offset(offset, prev_size, TypeKind::Uint, DIM_SIZE)
                .ok_or_else(overflow)?;
            prev_size = DIM_SIZE;
        }
        if !dimensions.is_empty() {
            max_align = max_align.max(TypeKind::Uint.alignment(DIM_SIZE));
        }

        // Property slots. Scalars are stored inline; dimensional properties
        // get one pointer-shaped slot whatever their element kind is.
        let mut prop_offsets = Vec::with_capacity(properties.len());
        for prop in properties {
            let (slot_size, slot_align) = prop.slot_spec();
            let end = offset.checked_add(prev_size).ok_or_else(overflow)?;
            offset = types::align_up(end, slot_align).ok_or_else(overflow)?;
            prev_size = slot_size;
            prop_offsets.push(offset);
            max_align = max_align.max(slot_align);
        }

        // Reserved relation slot position (collections keep relations in
        // their own store; nothing is placed here yet).
        let end = offset.checked_add(prev_size).ok_or_else(overflow)?;
        let rel_offset = types::align_up(end, POINTER_ALIGN).ok_or_else(overflow)?;

        let size = types::align_up(end, max_align).ok_or_else(overflow)?;

        Ok(Self {
            size,
            max_align,
            dim_offset,
            prop_offsets,
            rel_offset,
        })
    }

    /// Total bytes of one instance block.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Largest member alignment seen during the walk.
    #[must_use]
    pub const fn max_align(&self) -> usize {
        self.max_align
    }

    /// Offset of the first stored dimension size.
    #[must_use]
    pub const fn dim_offset(&self) -> usize {
        self.dim_offset
    }

    /// Offset of the slot of property `i`.
    #[must_use]
    pub fn prop_offset(&self, i: usize) -> Option<usize> {
        self.prop_offsets.get(i).copied()
    }

    #[must_use]
    pub fn prop_offsets(&self) -> &[usize] {
        &self.prop_offsets
    }

    /// Offset of the reserved relation slot.
    #[must_use]
    pub const fn rel_offset(&self) -> usize {
        self.rel_offset
    }
}
