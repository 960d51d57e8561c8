//! The storage abstraction: a uniform read/write contract between the typed
//! instance model and pluggable backends.
//!
//! A backend sees only `(uuid, dimension name → size, property name + kind +
//! shape → flat payload)` and stays oblivious to entity layout. Required
//! capabilities are trait methods without default bodies; optional ones
//! default to an `unsupported_op` error naming the driver, so a read-only
//! backend simply leaves them out.

pub mod registry;
pub mod shape;

use crate::{
    error::{Error, Result},
    ident::{UuidVersion, derive_uuid},
    instance::PropertyValue,
    schema::Entity,
    types::TypeKind,
};
use std::sync::Arc;
use uuid::Uuid;

///
/// StorageOptions
///
/// Free-form options string passed to `open`: `;`-separated tokens, each
/// either `key=value` or a bare open-mode shorthand (`r`, `w`, `append`).
/// The only universally recognised flag is `writable`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StorageOptions {
    mode: Option<String>,
    writable: Option<bool>,
    extra: Vec<(String, String)>,
}

impl StorageOptions {
    pub fn parse(options: &str) -> Result<Self> {
        let mut parsed = Self::default();
        for token in options.split(';').map(str::trim) {
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                None => parsed.mode = Some(token.to_string()),
                Some(("mode", value)) => parsed.mode = Some(value.to_string()),
                Some(("writable", value)) => match value {
                    "true" | "yes" | "1" => parsed.writable = Some(true),
                    "false" | "no" | "0" => parsed.writable = Some(false),
                    other => {
                        return Err(Error::InvalidArg(format!(
                            "invalid writable flag: '{other}'"
                        ))
                        .emit());
                    }
                },
                Some((key, value)) => parsed
                    .extra
                    .push((key.to_string(), value.to_string())),
            }
        }
        Ok(parsed)
    }

    #[must_use]
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// The `writable` flag; `default` applies when the flag is absent.
    #[must_use]
    pub fn writable(&self, default: bool) -> bool {
        self.writable.unwrap_or(default)
    }

    /// Look up a backend-specific option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

///
/// StorageDriver
///
/// A named backend able to open storages.
///

pub trait StorageDriver: Send + Sync {
    /// Driver name used for registry lookup and diagnostics.
    fn name(&self) -> &str;

    /// One-line description of the backend.
    fn description(&self) -> &str {
        ""
    }

    /// Open the storage addressed by `uri` with the given options.
    fn open(&self, uri: &str, options: &StorageOptions) -> Result<Box<dyn Storage>>;
}

///
/// Storage
///
/// One opened storage. Backends may use interior mutability; callers
/// serialise access (the runtime is single-threaded cooperative).
///

pub trait Storage {
    /// Name of the driver that opened this storage.
    fn driver_name(&self) -> &str;

    /// Whether writes are accepted.
    fn writable(&self) -> bool;

    /// Flush and close. Dropping a storage closes it best-effort.
    fn close(&mut self) -> Result<()>;

    /// A data-model handle for the record with the given UUID.
    fn data_model<'a>(&'a self, uuid: &Uuid) -> Result<Box<dyn DataModel + 'a>>;

    /// UUIDs of all records held by this storage.
    fn uuids(&self) -> Result<Vec<String>> {
        Err(Error::unsupported(self.driver_name(), "uuids").emit())
    }

    /// Read the entity stored under `uuid`.
    fn get_entity(&self, uuid: &Uuid) -> Result<Arc<Entity>> {
        let _ = uuid;
        Err(Error::unsupported(self.driver_name(), "get_entity").emit())
    }

    /// Write an entity document.
    fn set_entity(&self, entity: &Entity) -> Result<()> {
        let _ = entity;
        Err(Error::unsupported(self.driver_name(), "set_entity").emit())
    }
}

///
/// DataModel
///
/// A thin handle on one stored record. Required reads come first; the
/// remaining capabilities are optional and report `unsupported_op` when the
/// backend does not provide them.
///

pub trait DataModel {
    fn driver_name(&self) -> &str;

    fn uuid(&self) -> Uuid;

    /// URI of the metadata (entity) this record conforms to.
    fn meta_uri(&self) -> Result<String>;

    /// Size of the dimension named `name`.
    fn dimension_size(&self, name: &str) -> Result<u64>;

    /// Read one property as a flat C-ordered payload of exactly `Π dims`
    /// elements of the declared kind and element size.
    fn get_property(
        &self,
        name: &str,
        kind: TypeKind,
        size: usize,
        dims: &[u64],
    ) -> Result<PropertyValue>;

    fn set_meta_uri(&mut self, uri: &str) -> Result<()> {
        let _ = uri;
        Err(Error::unsupported(self.driver_name(), "set_meta_uri").emit())
    }

    fn set_dimension_size(&mut self, name: &str, size: u64) -> Result<()> {
        let _ = (name, size);
        Err(Error::unsupported(self.driver_name(), "set_dimension_size").emit())
    }

    fn set_property(
        &mut self,
        name: &str,
        kind: TypeKind,
        size: usize,
        dims: &[u64],
        value: &PropertyValue,
    ) -> Result<()> {
        let _ = (name, kind, size, dims, value);
        Err(Error::unsupported(self.driver_name(), "set_property").emit())
    }

    fn has_dimension(&self, name: &str) -> Result<bool> {
        let _ = name;
        Err(Error::unsupported(self.driver_name(), "has_dimension").emit())
    }

    fn has_property(&self, name: &str) -> Result<bool> {
        let _ = name;
        Err(Error::unsupported(self.driver_name(), "has_property").emit())
    }

    /// The unique name this record's UUID was derived from, when one was
    /// recorded.
    fn data_name(&self) -> Result<Option<String>> {
        Err(Error::unsupported(self.driver_name(), "data_name").emit())
    }

    fn set_data_name(&mut self, name: &str) -> Result<()> {
        let _ = name;
        Err(Error::unsupported(self.driver_name(), "set_data_name").emit())
    }
}

/// Open a data-model handle for `id` within `storage`.
///
/// The identifier is first derived to a UUID. When it was a unique name and
/// the storage accepts writes, the name is recorded with the record so it
/// can be recovered later.
pub fn data_model<'a>(
    storage: &'a dyn Storage,
    id: Option<&str>,
) -> Result<Box<dyn DataModel + 'a>> {
    let (uuid, version) = derive_uuid(id);
    let mut model = storage.data_model(&uuid).map_err(|err| {
        Error::Format(format!(
            "cannot create data model for id '{}' in storage driver '{}': {err}",
            id.unwrap_or("(none)"),
            storage.driver_name()
        ))
        .emit()
    })?;

    if version == UuidVersion::Hashed && storage.writable() {
        if let Some(name) = id {
            // Optional capability; backends without it are fine.
            let _ = model.set_data_name(name);
        }
    }

    Ok(model)
}
