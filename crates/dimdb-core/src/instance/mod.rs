//! Instances: concrete, fully-sized records conforming to an entity.
//!
//! An instance owns one contiguous zero-initialised block whose layout the
//! entity computed at creation, plus the heap buffers behind every
//! dimensional property slot. Scalar values live inline in the block;
//! dimensional slots are pointer-shaped and refer to an owned buffer.

pub mod layout;

mod io;
mod value;

#[cfg(test)]
mod tests;

pub use value::{PropertySlice, PropertyValue};

use crate::{
    error::{Error, Result},
    ident::{UuidVersion, derive_uuid},
    instance::layout::{DIM_SIZE, UUID_OFFSET},
    schema::{Entity, Property},
    types::TypeKind,
};
use std::sync::Arc;
use uuid::Uuid;

///
/// Instance
///

#[derive(Debug)]
pub struct Instance {
    entity: Arc<Entity>,
    uuid: Uuid,
    uri: Option<String>,
    data: Box<[u8]>,
    buffers: Vec<Option<PropBuffer>>,
}

/// Heap storage behind one dimensional (or string-pointer) property slot.
#[derive(Debug)]
enum PropBuffer {
    Raw(Box<[u8]>),
    Str(Box<[Option<String>]>),
}

impl Instance {
    /// Create a zero-initialised instance of `entity` with the given
    /// dimension sizes.
    ///
    /// The `id` argument may be absent (a random UUID is assigned), a valid
    /// UUID, or any unique name; a name is hashed to the UUID and kept as
    /// the instance identifier.
    pub fn new(entity: &Arc<Entity>, dims: &[u64], id: Option<&str>) -> Result<Self> {
        if dims.len() != entity.ndimensions() {
            return Err(Error::InvalidArg(format!(
                "{} declares {} dimensions, got {}",
                entity.ident(),
                entity.ndimensions(),
                dims.len()
            ))
            .emit());
        }

        let layout = entity.layout();
        let mut data = vec![0u8; layout.size()].into_boxed_slice();

        let (uuid, version) = derive_uuid(id);
        data[UUID_OFFSET..UUID_OFFSET + 16].copy_from_slice(uuid.as_bytes());
        let uri = (version == UuidVersion::Hashed)
            .then(|| id.map(str::to_string))
            .flatten();

        for (i, &dim) in dims.iter().enumerate() {
            let offset = layout.dim_offset() + i * DIM_SIZE;
            data[offset..offset + DIM_SIZE].copy_from_slice(&dim.to_ne_bytes());
        }

        // Allocate zeroed heap buffers for every slot that is
        // pointer-shaped; the slot itself records a non-null handle.
        let mut buffers = Vec::with_capacity(entity.nproperties());
        for (i, prop) in entity.properties().iter().enumerate() {
            let buffer = if prop.is_dimensional() || prop.kind == TypeKind::StringPtr {
                let nmemb = elem_count(prop, dims)?;
                let buffer = if prop.kind == TypeKind::StringPtr {
                    PropBuffer::Str(vec![None; nmemb].into_boxed_slice())
                } else {
                    let bytes = nmemb
                        .checked_mul(prop.elem_size())
                        .ok_or(Error::Alloc("sizing a property buffer"))
                        .map_err(Error::emit)?;
                    PropBuffer::Raw(vec![0u8; bytes].into_boxed_slice())
                };
                let offset = layout
                    .prop_offset(i)
                    .ok_or(Error::Alloc("missing property offset"))?;
                let handle = i + 1;
                data[offset..offset + size_of::<usize>()]
                    .copy_from_slice(&handle.to_ne_bytes());
                Some(buffer)
            } else {
                None
            };
            buffers.push(buffer);
        }

        Ok(Self {
            entity: Arc::clone(entity),
            uuid,
            uri,
            data,
            buffers,
        })
    }

    #[must_use]
    pub const fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// The stored dimension sizes, in declaration order.
    #[must_use]
    pub fn dimension_sizes(&self) -> Vec<u64> {
        (0..self.entity.ndimensions())
            .map(|i| self.read_dim(i))
            .collect()
    }

    /// Size of dimension `i`.
    pub fn dimension_size_by_index(&self, i: usize) -> Result<u64> {
        if i >= self.entity.ndimensions() {
            return Err(Error::NotFound(format!(
                "no dimension with index {i} in {}",
                self.entity.ident()
            ))
            .emit());
        }
        Ok(self.read_dim(i))
    }

    /// Size of the dimension named `name`.
    pub fn dimension_size(&self, name: &str) -> Result<u64> {
        let i = self.require_dimension(name)?;
        Ok(self.read_dim(i))
    }

    /// Number of dimensions of property `name`.
    pub fn property_ndims(&self, name: &str) -> Result<usize> {
        let i = self.require_property(name)?;
        Ok(self.entity.properties()[i].ndims())
    }

    /// Size of dimension `j` of property `i`.
    pub fn property_dim_size_by_index(&self, i: usize, j: usize) -> Result<u64> {
        let prop = self.entity.property_by_index(i).ok_or_else(|| {
            Error::NotFound(format!(
                "no property with index {i} in {}",
                self.entity.ident()
            ))
            .emit()
        })?;
        let dim = prop.dims.get(j).copied().ok_or_else(|| {
            Error::NotFound(format!(
                "dimension index {j} is out of range for property '{}'",
                prop.name
            ))
            .emit()
        })?;
        Ok(self.read_dim(dim))
    }

    /// Size of dimension `j` of property `name`.
    pub fn property_dim_size(&self, name: &str, j: usize) -> Result<u64> {
        let i = self.require_property(name)?;
        self.property_dim_size_by_index(i, j)
    }

    /// Borrowed view of property `i`.
    pub fn property_by_index(&self, i: usize) -> Result<PropertySlice<'_>> {
        let prop = self.entity.property_by_index(i).ok_or_else(|| {
            Error::NotFound(format!(
                "no property with index {i} in {}",
                self.entity.ident()
            ))
            .emit()
        })?;

        match self.buffers[i].as_ref() {
            Some(PropBuffer::Str(strings)) => Ok(PropertySlice::Strings(strings)),
            Some(PropBuffer::Raw(bytes)) => Ok(PropertySlice::Fixed(bytes)),
            None => {
                let offset = self.slot_offset(i);
                let len = prop.elem_size();
                Ok(PropertySlice::Fixed(&self.data[offset..offset + len]))
            }
        }
    }

    /// Borrowed view of property `name`.
    pub fn property(&self, name: &str) -> Result<PropertySlice<'_>> {
        let i = self.require_property(name)?;
        self.property_by_index(i)
    }

    /// Owned copy of property `name`.
    pub fn property_value(&self, name: &str) -> Result<PropertyValue> {
        Ok(self.property(name)?.to_value())
    }

    /// Copy a flat payload into property `i`.
    ///
    /// The payload must match the property's kind and hold exactly
    /// `Π dims` elements; string elements are duplicated into the instance.
    pub fn set_property_by_index(&mut self, i: usize, value: &PropertyValue) -> Result<()> {
        let prop = self
            .entity
            .property_by_index(i)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no property with index {i} in {}",
                    self.entity.ident()
                ))
                .emit()
            })?;

        if !value.fits(prop.kind) {
            return Err(Error::TypeMismatch(format!(
                "property '{}' has type {}, payload does not match",
                prop.name,
                prop.kind.label()
            ))
            .emit());
        }

        let dims = self.dimension_sizes();
        let nmemb = elem_count(&prop, &dims)?;

        match value {
            PropertyValue::Strings(src) => {
                if src.len() != nmemb {
                    return Err(shape_error(&prop.name, nmemb, src.len()).emit());
                }
                let Some(PropBuffer::Str(dst)) = self.buffers[i].as_mut() else {
                    unreachable!("string property without a string buffer")
                };
                for (slot, text) in dst.iter_mut().zip(src) {
                    *slot = Some(text.clone());
                }
            }
            PropertyValue::Fixed(src) => {
                let expected = nmemb
                    .checked_mul(prop.elem_size())
                    .ok_or(Error::Alloc("sizing a property payload"))
                    .map_err(Error::emit)?;
                if src.len() != expected {
                    return Err(shape_error(&prop.name, expected, src.len()).emit());
                }
                match self.buffers[i].as_mut() {
                    Some(PropBuffer::Raw(dst)) => dst.copy_from_slice(src),
                    Some(PropBuffer::Str(_)) => {
                        unreachable!("fixed payload cannot fit a string buffer")
                    }
                    None => {
                        let offset = self.slot_offset(i);
                        self.data[offset..offset + expected].copy_from_slice(src);
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy a flat payload into property `name`.
    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()> {
        let i = self.require_property(name)?;
        self.set_property_by_index(i, value)
    }

    fn require_dimension(&self, name: &str) -> Result<usize> {
        self.entity.dimension_index(name).ok_or_else(|| {
            Error::NotFound(format!(
                "{} has no such dimension: '{name}'",
                self.entity.ident()
            ))
            .emit()
        })
    }

    fn require_property(&self, name: &str) -> Result<usize> {
        self.entity.property_index(name).ok_or_else(|| {
            Error::NotFound(format!(
                "{} has no such property: '{name}'",
                self.entity.ident()
            ))
            .emit()
        })
    }

    fn read_dim(&self, i: usize) -> u64 {
        let offset = self.entity.layout().dim_offset() + i * DIM_SIZE;
        let mut raw = [0u8; DIM_SIZE];
        raw.copy_from_slice(&self.data[offset..offset + DIM_SIZE]);
        u64::from_ne_bytes(raw)
    }

    fn slot_offset(&self, i: usize) -> usize {
        self.entity
            .layout()
            .prop_offset(i)
            .unwrap_or_else(|| unreachable!("layout covers every property"))
    }
}

/// `Π dims[p.dims[k]]`, overflow-checked.
fn elem_count(prop: &Property, dims: &[u64]) -> Result<usize> {
    let mut nmemb: usize = 1;
    for &dim in &prop.dims {
        let size = usize::try_from(dims[dim])
            .map_err(|_| Error::Alloc("sizing a property buffer").emit())?;
        nmemb = nmemb
            .checked_mul(size)
            .ok_or(Error::Alloc("sizing a property buffer"))
            .map_err(Error::emit)?;
    }
    Ok(nmemb)
}

fn shape_error(name: &str, expected: usize, actual: usize) -> Error {
    Error::ShapeMismatch(format!(
        "property '{name}': payload holds {actual} bytes/elements, expected {expected}"
    ))
}
