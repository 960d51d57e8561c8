//! Load/save orchestration between instances and storage backends.

use crate::{
    error::{Error, Result},
    instance::Instance,
    schema::Entity,
    storage::{self, Storage},
};
use std::sync::Arc;

impl Instance {
    /// Load the record identified by `id` from `storage` as an instance of
    /// `entity`.
    ///
    /// The backend must report the same metadata URI as the entity; the
    /// dimension sizes are read by name, the instance is allocated, and each
    /// property payload is piped through the typed setter.
    pub fn load(storage: &dyn Storage, id: &str, entity: &Arc<Entity>) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(
                Error::InvalidArg("cannot load an instance without an identifier".to_string())
                    .emit(),
            );
        }

        let model = storage::data_model(storage, Some(id))?;

        let stored_uri = model.meta_uri()?;
        if entity.uri() != Some(stored_uri.as_str()) {
            return Err(Error::Format(format!(
                "metadata ({}) does not correspond to metadata in storage ({stored_uri})",
                entity.ident()
            ))
            .emit());
        }

        let dims = entity
            .dimensions()
            .iter()
            .map(|d| model.dimension_size(&d.name))
            .collect::<Result<Vec<u64>>>()?;

        let mut instance = Self::new(entity, &dims, Some(id))?;

        for (i, prop) in entity.properties().iter().enumerate() {
            let pdims: Vec<u64> = prop.dims.iter().map(|&k| dims[k]).collect();
            let value = model.get_property(&prop.name, prop.kind, prop.size, &pdims)?;
            instance.set_property_by_index(i, &value)?;
        }

        Ok(instance)
    }

    /// Save this instance into `storage`: metadata URI first, then every
    /// dimension size, then every property. The first backend error aborts.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let entity = self.entity();
        let uri = entity.uri().ok_or_else(|| {
            Error::InvalidArg(format!(
                "entity {} has no uri; its instances cannot be saved",
                entity.ident()
            ))
            .emit()
        })?;

        let mut model = storage.data_model(&self.uuid())?;
        if storage.writable() {
            if let Some(name) = self.uri() {
                // Optional capability; backends without it are fine.
                let _ = model.set_data_name(name);
            }
        }

        model.set_meta_uri(uri)?;

        let dims = self.dimension_sizes();
        for (dim, &size) in entity.dimensions().iter().zip(&dims) {
            model.set_dimension_size(&dim.name, size)?;
        }

        for (i, prop) in entity.properties().iter().enumerate() {
            let pdims: Vec<u64> = prop.dims.iter().map(|&k| dims[k]).collect();
            let value = self.property_by_index(i)?.to_value();
            model.set_property(&prop.name, prop.kind, prop.size, &pdims, &value)?;
        }

        Ok(())
    }
}
