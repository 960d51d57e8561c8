//! The JSON file storage.
//!
//! A storage file is either a *data file* — a root object keyed by UUID,
//! each value one record document — or an *entity file* holding a single
//! entity document. The whole file is parsed at open; writes are collected
//! in memory and flushed on close (best-effort on drop).

use crate::{datamodel::JsonDataModel, entity};
use dimdb_core::{
    error::{Error, Result},
    obs,
    schema::Entity,
    storage::{DataModel, Storage, StorageOptions},
};
use serde_json::{Map, Value};
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use uuid::Uuid;

pub(crate) const DRIVER_NAME: &str = "json";

///
/// Root
///

#[derive(Debug)]
pub(crate) enum Root {
    Data(Map<String, Value>),
    Entity(Map<String, Value>),
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) root: Root,
    pub(crate) dirty: bool,
}

///
/// JsonStorage
///

#[derive(Debug)]
pub struct JsonStorage {
    path: PathBuf,
    writable: bool,
    pub(crate) state: RefCell<State>,
}

impl JsonStorage {
    /// Open the JSON file at `uri`.
    ///
    /// Modes: `r` (must exist, read-only), `w` (start empty, truncate on
    /// close), `append` (read existing content, read-write; the default
    /// when the file exists). The `writable` option overrides the mode's
    /// default writability.
    pub fn open(uri: &str, options: &StorageOptions) -> Result<Self> {
        let path = PathBuf::from(uri);
        let default_mode = if path.is_file() { "append" } else { "w" };
        let mode = options.mode().unwrap_or(default_mode);

        let (root, default_writable) = match mode {
            "r" => (Self::read_root(&path)?, false),
            "w" => (Root::Data(Map::new()), true),
            "a" | "append" | "rw" => {
                let root = if path.is_file() {
                    Self::read_root(&path)?
                } else {
                    Root::Data(Map::new())
                };
                (root, true)
            }
            other => {
                return Err(Error::InvalidArg(format!(
                    "invalid open mode '{other}' for json storage '{uri}'"
                ))
                .emit());
            }
        };

        Ok(Self {
            path,
            writable: options.writable(default_writable),
            state: RefCell::new(State { root, dirty: false }),
        })
    }

    fn read_root(path: &Path) -> Result<Root> {
        let text = fs::read_to_string(path).map_err(Error::Io).map_err(Error::emit)?;
        let value: Value = serde_json::from_str(&text).map_err(|err| {
            Error::Format(format!("{}: {err}", path.display())).emit()
        })?;
        let Value::Object(map) = value else {
            return Err(Error::Format(format!(
                "{}: json storage root must be an object",
                path.display()
            ))
            .emit());
        };

        let is_entity = ["name", "version", "namespace"]
            .iter()
            .all(|key| map.contains_key(*key));
        Ok(if is_entity {
            Root::Entity(map)
        } else {
            Root::Data(map)
        })
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !self.writable || !state.dirty {
            return Ok(());
        }
        let root = match &state.root {
            Root::Data(map) | Root::Entity(map) => Value::Object(map.clone()),
        };
        let text = serde_json::to_string_pretty(&root)
            .map_err(|err| Error::Format(err.to_string()).emit())?;
        fs::write(&self.path, text).map_err(Error::Io).map_err(Error::emit)?;
        state.dirty = false;
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn data_model<'a>(&'a self, uuid: &Uuid) -> Result<Box<dyn DataModel + 'a>> {
        Ok(Box::new(JsonDataModel::new(self, *uuid)))
    }

    fn uuids(&self) -> Result<Vec<String>> {
        let state = self.state.borrow();
        match &state.root {
            Root::Data(map) => Ok(map.keys().cloned().collect()),
            Root::Entity(map) => {
                let parsed = entity::entity_from_document(map)?;
                Ok(vec![parsed.uuid().to_string()])
            }
        }
    }

    fn get_entity(&self, uuid: &Uuid) -> Result<Arc<Entity>> {
        let state = self.state.borrow();
        let doc = match &state.root {
            Root::Entity(map) => map,
            Root::Data(map) => map
                .get(&uuid.to_string())
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "json storage '{}' holds no entity '{uuid}'",
                        self.path.display()
                    ))
                    .emit()
                })?,
        };
        let parsed = entity::entity_from_document(doc)?;
        if parsed.uuid() != *uuid {
            return Err(Error::NotFound(format!(
                "json storage '{}' holds entity {}, not '{uuid}'",
                self.path.display(),
                parsed.ident()
            ))
            .emit());
        }
        Ok(parsed)
    }

    fn set_entity(&self, entity: &Entity) -> Result<()> {
        if !self.writable {
            return Err(Error::InvalidArg(format!(
                "json storage '{}' is read-only",
                self.path.display()
            ))
            .emit());
        }
        let doc = entity::entity_to_document(entity)?;
        let mut state = self.state.borrow_mut();
        state.root = Root::Entity(doc);
        state.dirty = true;
        Ok(())
    }
}

impl Drop for JsonStorage {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            obs::diag(&format!(
                "json storage '{}' failed to flush on drop: {err}",
                self.path.display()
            ));
        }
    }
}

impl JsonStorage {
    pub(crate) fn read_only_error(&self) -> Error {
        Error::InvalidArg(format!(
            "json storage '{}' is read-only",
            self.path.display()
        ))
    }
}
