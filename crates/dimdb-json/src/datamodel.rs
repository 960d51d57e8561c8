//! Data-model handles on records inside a JSON data file.

use crate::{
    codec, infer,
    storage::{DRIVER_NAME, JsonStorage, Root},
};
use dimdb_core::{
    error::{Error, Result},
    instance::PropertyValue,
    storage::{DataModel, Storage},
    types::TypeKind,
};
use serde_json::{Map, Value, json};
use uuid::Uuid;

///
/// JsonDataModel
///

#[derive(Debug)]
pub struct JsonDataModel<'a> {
    storage: &'a JsonStorage,
    uuid: Uuid,
    key: String,
}

impl<'a> JsonDataModel<'a> {
    pub(crate) fn new(storage: &'a JsonStorage, uuid: Uuid) -> Self {
        Self {
            storage,
            uuid,
            key: uuid.to_string(),
        }
    }

    /// Run `f` over this record's document.
    fn with_doc<T>(&self, f: impl FnOnce(&Map<String, Value>) -> Result<T>) -> Result<T> {
        let state = self.storage.state.borrow();
        let Root::Data(map) = &state.root else {
            return Err(Error::Format(
                "json storage holds an entity document, not records".to_string(),
            )
            .emit());
        };
        let doc = map.get(&self.key).and_then(Value::as_object).ok_or_else(|| {
            Error::NotFound(format!("no record '{}' in json storage", self.key)).emit()
        })?;
        f(doc)
    }

    /// Run `f` over this record's document, creating an empty skeleton when
    /// the record does not exist yet.
    fn with_doc_mut<T>(
        &mut self,
        f: impl FnOnce(&mut Map<String, Value>) -> Result<T>,
    ) -> Result<T> {
        if !self.storage.writable() {
            return Err(self.storage.read_only_error().emit());
        }
        let mut state = self.storage.state.borrow_mut();
        let Root::Data(map) = &mut state.root else {
            return Err(Error::Format(
                "json storage holds an entity document, not records".to_string(),
            )
            .emit());
        };
        let doc = map
            .entry(self.key.clone())
            .or_insert_with(|| json!({"dimensions": {}, "properties": {}}));
        let doc = doc.as_object_mut().ok_or_else(|| {
            Error::Format(format!("record '{}' is not a json object", self.key)).emit()
        })?;
        let result = f(doc)?;
        state.dirty = true;
        Ok(result)
    }
}

impl DataModel for JsonDataModel<'_> {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn meta_uri(&self) -> Result<String> {
        self.with_doc(|doc| {
            doc.get("meta")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Format(format!("record '{}' carries no meta uri", self.key)).emit()
                })
        })
    }

    fn dimension_size(&self, name: &str) -> Result<u64> {
        self.with_doc(|doc| {
            doc.get("dimensions")
                .and_then(|dims| dims.get(name))
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "record '{}' has no dimension '{name}'",
                        self.key
                    ))
                    .emit()
                })
        })
    }

    fn get_property(
        &self,
        name: &str,
        kind: TypeKind,
        size: usize,
        dims: &[u64],
    ) -> Result<PropertyValue> {
        self.with_doc(|doc| {
            let node = doc
                .get("properties")
                .and_then(|props| props.get(name))
                .ok_or_else(|| {
                    Error::NotFound(format!("record '{}' has no property '{name}'", self.key))
                        .emit()
                })?;

            let data = infer::typed_value(node)
                .map_err(|err| Error::Format(format!("property '{name}': {err}")).emit())?;

            let stored: Vec<u64> = data
                .dims
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|&d| d as u64)
                .collect();
            if stored != dims {
                return Err(Error::ShapeMismatch(format!(
                    "property '{name}': stored shape {stored:?} does not match declared shape {dims:?}"
                ))
                .emit());
            }

            codec::to_property_value(name, &data, kind, size)
        })
    }

    fn set_meta_uri(&mut self, uri: &str) -> Result<()> {
        let uri = uri.to_string();
        self.with_doc_mut(|doc| {
            doc.insert("meta".to_string(), Value::String(uri));
            Ok(())
        })
    }

    fn set_dimension_size(&mut self, name: &str, size: u64) -> Result<()> {
        self.with_doc_mut(|doc| {
            let dims = doc
                .entry("dimensions".to_string())
                .or_insert_with(|| json!({}));
            let dims = dims.as_object_mut().ok_or_else(|| {
                Error::Format("record 'dimensions' is not a json object".to_string()).emit()
            })?;
            dims.insert(name.to_string(), json!(size));
            Ok(())
        })
    }

    fn set_property(
        &mut self,
        name: &str,
        kind: TypeKind,
        size: usize,
        dims: &[u64],
        value: &PropertyValue,
    ) -> Result<()> {
        let data = codec::from_property_value(name, value, kind, size, dims)?;
        self.with_doc_mut(|doc| {
            let props = doc
                .entry("properties".to_string())
                .or_insert_with(|| json!({}));
            let props = props.as_object_mut().ok_or_else(|| {
                Error::Format("record 'properties' is not a json object".to_string()).emit()
            })?;
            infer::attach(props, name, &data)
        })
    }

    fn has_dimension(&self, name: &str) -> Result<bool> {
        self.with_doc(|doc| {
            Ok(doc
                .get("dimensions")
                .and_then(Value::as_object)
                .is_some_and(|dims| dims.contains_key(name)))
        })
    }

    fn has_property(&self, name: &str) -> Result<bool> {
        self.with_doc(|doc| {
            Ok(doc
                .get("properties")
                .and_then(Value::as_object)
                .is_some_and(|props| props.contains_key(name)))
        })
    }

    fn data_name(&self) -> Result<Option<String>> {
        self.with_doc(|doc| Ok(doc.get("uri").and_then(Value::as_str).map(str::to_string)))
    }

    fn set_data_name(&mut self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_doc_mut(|doc| {
            doc.insert("uri".to_string(), Value::String(name));
            Ok(())
        })
    }
}
