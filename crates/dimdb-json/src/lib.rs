//! JSON reference storage backend for DimDB.
//!
//! Stores records as JSON data files (a root object keyed by UUID) and
//! schemas as entity documents. The crate also builds as a shared object
//! exporting the plugin factory, so it can be discovered on the storage
//! plugin search path like any out-of-tree backend.

#![warn(unreachable_pub)]

pub mod entity;
pub mod infer;

mod codec;
mod datamodel;
mod storage;

pub use datamodel::JsonDataModel;
pub use storage::JsonStorage;

use dimdb_core::{
    Result,
    storage::{Storage, StorageDriver, StorageOptions},
};

///
/// JsonDriver
///

#[derive(Debug, Default)]
pub struct JsonDriver;

impl StorageDriver for JsonDriver {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "JSON file storage for records and entity documents"
    }

    fn open(&self, uri: &str, options: &StorageOptions) -> Result<Box<dyn Storage>> {
        Ok(Box::new(JsonStorage::open(uri, options)?))
    }
}

dimdb_core::declare_storage_driver!(JsonDriver);
