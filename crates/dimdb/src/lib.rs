//! # dimdb
//!
//! `dimdb` is the public facade crate for the DimDB runtime: a
//! schema-driven store for typed multidimensional records. It is the
//! recommended dependency for applications.
//!
//! This crate exposes:
//! - the core vocabulary (entities, instances, collections, the storage
//!   contract) re-exported from `dimdb-core`,
//! - the JSON reference backend from `dimdb-json`, pre-registered as a
//!   builtin driver,
//! - and [`open`], the one-call way to reach a storage by driver name.
//!
//! ## Example
//!
//! ```ignore
//! use dimdb::prelude::*;
//!
//! let storage = dimdb::open("json", "Chemistry-0.1.json", "r")?;
//! let entity = Entity::load(storage.as_ref(), "http://www.sintef.no/calm/0.1/Chemistry")?;
//! let inst = Instance::new(&entity, &[3, 2], Some("myinst"))?;
//! ```

pub use dimdb_core::{
    Error, ErrorKind, Result, collection, error, ident, instance, obs, schema, storage, types,
    uri,
};
pub use dimdb_json as json;

use dimdb_core::storage::{Storage, StorageOptions, registry};
use std::sync::Once;

static BUILTIN_DRIVERS: Once = Once::new();

/// Register the compiled-in storage drivers. Called implicitly by [`open`];
/// call it directly when going through the registry by hand.
pub fn register_builtin_drivers() {
    BUILTIN_DRIVERS.call_once(|| {
        registry::register(Box::new(json::JsonDriver));
    });
}

/// Open a storage via the driver registry.
///
/// `options` is the driver's free-form options string; every driver
/// understands `writable=true|false` and the open-mode shorthands
/// (`r`, `w`, `append`).
pub fn open(driver: &str, uri: &str, options: &str) -> Result<Box<dyn Storage>> {
    register_builtin_drivers();
    let options = StorageOptions::parse(options)?;
    let driver = registry::get(driver)?;
    driver.open(uri, &options)
}

///
/// Prelude
///

pub mod prelude {
    pub use dimdb_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_reaches_the_builtin_json_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");

        let mut storage = open("json", path.to_str().unwrap(), "w").unwrap();
        assert!(storage.writable());
        assert_eq!(storage.driver_name(), "json");
        storage.close().unwrap();
    }

    #[test]
    fn unknown_drivers_are_reported() {
        obs::with_diag_sink(&obs::NoopDiagSink, || {
            let err = match open("parquet", "x", "") {
                Err(e) => e,
                Ok(_) => panic!("expected an error"),
            };
            assert_eq!(err.kind(), ErrorKind::PluginMissing);
        });
    }
}
