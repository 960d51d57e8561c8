//! Entities: named, versioned schemas describing families of records.
//!
//! An entity declares symbolic dimensions and typed properties, and carries
//! the memory layout derived from them. Entities are themselves records: each
//! one points at its meta-entity, a pinned singleton schema that bottoms out
//! the hierarchy.


use crate::{
    error::{Error, Result},
    ident::{UuidVersion, derive_uuid},
    instance::layout::Layout,
    storage::Storage,
    types::{POINTER_ALIGN, POINTER_SIZE, TypeKind},
};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// URI of the pinned schema describing entities themselves.
pub const SCHEMA_ENTITY_URI: &str = "http://meta.dimdb.org/0.1/schema-entity";

static SCHEMA_ENTITY: OnceLock<Arc<Entity>> = OnceLock::new();

///
/// Dimension
///
/// A named symbolic size that parameterises property shapes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub description: String,
}

impl Dimension {
    #[must_use]
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

///
/// Property
///
/// A named typed field. `dims` holds indices into the owning entity's
/// dimension list; an empty `dims` means the property is scalar.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: TypeKind,
    pub size: usize,
    pub dims: Vec<usize>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Property {
    #[must_use]
    pub fn scalar(name: &str, kind: TypeKind, size: usize) -> Self {
        Self::with_dims(name, kind, size, Vec::new())
    }

    #[must_use]
    pub fn with_dims(name: &str, kind: TypeKind, size: usize, dims: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            size,
            dims,
            unit: None,
            description: None,
        }
    }

    #[must_use]
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    #[must_use]
    pub fn is_dimensional(&self) -> bool {
        !self.dims.is_empty()
    }

    /// Bytes per element of this property.
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.kind.size(self.size)
    }

    /// Size and alignment of the slot this property occupies inside an
    /// instance block. Dimensional properties occupy one pointer-shaped
    /// slot regardless of element kind.
    #[must_use]
    pub fn slot_spec(&self) -> (usize, usize) {
        if self.is_dimensional() || self.kind == TypeKind::StringPtr {
            (POINTER_SIZE, POINTER_ALIGN)
        } else {
            (self.elem_size(), self.kind.alignment(self.size))
        }
    }
}

///
/// Entity
///

#[derive(Debug)]
pub struct Entity {
    uuid: Uuid,
    uri: Option<String>,
    meta: Option<Arc<Entity>>,
    description: String,
    dimensions: Vec<Dimension>,
    properties: Vec<Property>,
    layout: Layout,
}

impl Entity {
    /// Create an entity from its declarative parts.
    ///
    /// Validates names and dimension references, derives the UUID from the
    /// URI (random when no URI is given) and computes the instance layout.
    pub fn new(
        uri: Option<&str>,
        description: &str,
        dimensions: Vec<Dimension>,
        properties: Vec<Property>,
    ) -> Result<Arc<Self>> {
        Self::build(
            uri,
            Some(Arc::clone(Self::schema())),
            description,
            dimensions,
            properties,
        )
    }

    fn build(
        uri: Option<&str>,
        meta: Option<Arc<Self>>,
        description: &str,
        dimensions: Vec<Dimension>,
        properties: Vec<Property>,
    ) -> Result<Arc<Self>> {
        validate(&dimensions, &properties).map_err(Error::emit)?;

        let (uuid, version) = derive_uuid(uri);
        let uri = (version == UuidVersion::Hashed)
            .then(|| uri.map(str::to_string))
            .flatten();

        let layout = Layout::compute(&dimensions, &properties).map_err(Error::emit)?;

        Ok(Arc::new(Self {
            uuid,
            uri,
            meta,
            description: description.to_string(),
            dimensions,
            properties,
            layout,
        }))
    }

    /// The pinned schema-entity singleton: the schema that entities
    /// themselves conform to. Never freed; it is its own hierarchy root and
    /// has no meta.
    pub fn schema() -> &'static Arc<Self> {
        SCHEMA_ENTITY.get_or_init(|| {
            let dimensions = vec![
                Dimension::new("ndimensions", "Number of dimensions."),
                Dimension::new("nproperties", "Number of properties."),
                Dimension::new("nrelations", "Number of relations."),
            ];
            let properties = vec![
                Property::with_dims("dimensions", TypeKind::Blob, 1, vec![0]),
                Property::with_dims("properties", TypeKind::Blob, 1, vec![1]),
            ];
            Self::build(
                Some(SCHEMA_ENTITY_URI),
                None,
                "Schema for entities",
                dimensions,
                properties,
            )
            .expect("schema-entity definition is statically valid")
        })
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    #[must_use]
    pub const fn meta(&self) -> Option<&Arc<Self>> {
        self.meta.as_ref()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn ndimensions(&self) -> usize {
        self.dimensions.len()
    }

    #[must_use]
    pub fn nproperties(&self) -> usize {
        self.properties.len()
    }

    /// Index of the dimension named `name`.
    #[must_use]
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    /// Index of the property named `name`.
    #[must_use]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.property_index(name).map(|i| &self.properties[i])
    }

    #[must_use]
    pub fn property_by_index(&self, i: usize) -> Option<&Property> {
        self.properties.get(i)
    }

    /// An entity viewed as a record of its meta-entity: report the size of
    /// the meta-level dimension named `name` (`ndimensions`, `nproperties`
    /// or `nrelations`).
    pub fn meta_dimension_size(&self, name: &str) -> Result<u64> {
        let meta = self.meta.as_deref().unwrap_or(self);
        let index = meta.dimension_index(name).ok_or_else(|| {
            Error::NotFound(format!("{} has no such dimension: '{name}'", self.ident())).emit()
        })?;
        match index {
            0 => Ok(self.dimensions.len() as u64),
            1 => Ok(self.properties.len() as u64),
            _ => Ok(0),
        }
    }

    /// Load an entity from a storage that supports entity reads.
    pub fn load(storage: &dyn Storage, id: &str) -> Result<Arc<Self>> {
        if id.trim().is_empty() {
            return Err(
                Error::InvalidArg("cannot load an entity without an identifier".to_string()).emit(),
            );
        }
        let (uuid, _) = derive_uuid(Some(id));
        storage.get_entity(&uuid)
    }

    /// Save an entity to a storage that supports entity writes.
    pub fn save(storage: &dyn Storage, entity: &Arc<Self>) -> Result<()> {
        storage.set_entity(entity)
    }

    /// Identifier used in diagnostics: the URI when there is one, the UUID
    /// otherwise.
    #[must_use]
    pub fn ident(&self) -> String {
        self.uri
            .clone()
            .unwrap_or_else(|| self.uuid.to_string())
    }
}

fn validate(dimensions: &[Dimension], properties: &[Property]) -> Result<()> {
    for (i, dim) in dimensions.iter().enumerate() {
        if dim.name.trim().is_empty() {
            return Err(Error::InvalidArg(format!(
                "dimension {i} has a blank name"
            )));
        }
        if dimensions[..i].iter().any(|d| d.name == dim.name) {
            return Err(Error::InvalidArg(format!(
                "duplicate dimension name: '{}'",
                dim.name
            )));
        }
    }

    for (i, prop) in properties.iter().enumerate() {
        if prop.name.trim().is_empty() {
            return Err(Error::InvalidArg(format!("property {i} has a blank name")));
        }
        if properties[..i].iter().any(|p| p.name == prop.name) {
            return Err(Error::InvalidArg(format!(
                "duplicate property name: '{}'",
                prop.name
            )));
        }
        if !prop.kind.valid_size(prop.size) {
            return Err(Error::InvalidArg(format!(
                "property '{}': size {} is invalid for type {}",
                prop.name,
                prop.size,
                prop.kind.label()
            )));
        }
        for &dim in &prop.dims {
            if dim >= dimensions.len() {
                return Err(Error::InvalidArg(format!(
                    "property '{}' refers to undeclared dimension index {dim}",
                    prop.name
                )));
            }
        }
    }

    Ok(())
}
