//! Collections: labelled sets of record references backed by a triple store.

mod triple;


pub use triple::{Triple, TripleState, TripleStore};

use crate::{
    error::{Error, Result},
    ident::{UuidVersion, derive_uuid},
    instance::Instance,
};
use uuid::Uuid;

/// Predicate asserting what a label is.
pub const REL_IS_A: &str = "_is-a";

/// Predicate linking a label to its record UUID.
pub const REL_HAS_UUID: &str = "_has-uuid";

/// Predicate linking a label to its metadata URI.
pub const REL_HAS_META: &str = "_has-meta";

/// Predicate linking a label to a dimension-mapping triple (by triple id).
pub const REL_HAS_DIMMAP: &str = "_has-dimmap";

///
/// Collection
///
/// A set of labelled relations plus the collection's own dimension
/// symbols. Independent of any particular instance beyond the UUIDs
/// recorded in its triples.
///

#[derive(Debug)]
pub struct Collection {
    uuid: Uuid,
    uri: Option<String>,
    store: TripleStore,
    dimensions: Vec<(String, u64)>,
}

impl Collection {
    /// Create a collection; identifier handling matches instances.
    #[must_use]
    pub fn new(id: Option<&str>) -> Self {
        let (uuid, version) = derive_uuid(id);
        let uri = (version == UuidVersion::Hashed)
            .then(|| id.map(str::to_string))
            .flatten();
        Self {
            uuid,
            uri,
            store: TripleStore::new(),
            dimensions: Vec::new(),
        }
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
    pub const fn store(&self) -> &TripleStore {
        &self.store
    }

    /// Add a subject-predicate-object relation.
    pub fn add_relation(&mut self, subject: &str, predicate: &str, object: &str) {
        self.store.add(subject, predicate, object);
    }

    /// Remove relations matching the given fields; `None` matches anything.
    /// Returns the number of triples removed.
    pub fn remove_relations(
        &mut self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> usize {
        self.store.remove(subject, predicate, object)
    }

    /// Record `instance` in the collection under `label`.
    pub fn add_instance(&mut self, label: &str, instance: &Instance) -> Result<()> {
        let meta_uri = instance.entity().uri().ok_or_else(|| {
            Error::InvalidArg(
                "instance metadata must have a uri to be added to a collection".to_string(),
            )
            .emit()
        })?;
        self.add_relation(label, REL_IS_A, "Instance");
        self.add_relation(label, REL_HAS_UUID, &instance.uuid().to_string());
        self.add_relation(label, REL_HAS_META, meta_uri);
        Ok(())
    }

    /// Remove the instance recorded under `label`, including every triple
    /// that references the label. Dimension-map triples are removed by the
    /// ids their relations carry as objects.
    pub fn remove_instance(&mut self, label: &str) -> Result<()> {
        if self.remove_relations(Some(label), Some(REL_IS_A), Some("Instance")) == 0 {
            return Err(Error::NotFound(format!(
                "collection has no instance labelled '{label}'"
            ))
            .emit());
        }

        let dimmap_ids: Vec<String> = {
            let mut state = self.store.init_state();
            let mut ids = Vec::new();
            while let Some(triple) =
                self.store
                    .find(&mut state, Some(label), Some(REL_HAS_DIMMAP), None)
            {
                ids.push(triple.object.clone());
            }
            ids
        };
        for id in dimmap_ids {
            self.store.remove_by_id(&id);
        }

        self.remove_relations(Some(label), Some(REL_HAS_UUID), None);
        self.remove_relations(Some(label), Some(REL_HAS_META), None);
        self.remove_relations(Some(label), Some(REL_HAS_DIMMAP), None);
        Ok(())
    }

    /// Declare (or resize) one of the collection's own dimension symbols.
    pub fn add_dimension(&mut self, name: &str, size: u64) {
        if let Some(entry) = self.dimensions.iter_mut().find(|(n, _)| n == name) {
            entry.1 = size;
        } else {
            self.dimensions.push((name.to_string(), size));
        }
    }

    /// Size of the collection dimension named `name`.
    #[must_use]
    pub fn dimension_size(&self, name: &str) -> Option<u64> {
        self.dimensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, size)| *size)
    }

    /// Start a search over the collection's relations.
    #[must_use]
    pub fn init_state(&self) -> TripleState {
        self.store.init_state()
    }

    /// Find the next relation matching the given fields; `None` matches
    /// anything. The store must not be mutated while a search is live.
    pub fn find(
        &self,
        state: &mut TripleState,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Option<&Triple> {
        self.store.find(state, subject, predicate, object)
    }

    /// First relation matching the given fields.
    #[must_use]
    pub fn find_first(
        &self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Option<&Triple> {
        self.store.find_first(subject, predicate, object)
    }
}
