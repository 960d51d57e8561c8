//! Core runtime for DimDB: entities, typed instances with runtime-computed
//! layouts, the storage abstraction and its plugin registry, and
//! triple-store collections.
//!
//! Schemas are runtime values here: an entity loaded from a storage drives
//! the layout of every record conforming to it. The `dimdb` facade crate is
//! the recommended dependency for applications; this crate carries the
//! engine.

#![warn(unreachable_pub)]

pub mod collection;
pub mod error;
pub mod ident;
pub mod instance;
pub mod obs;
pub mod schema;
pub mod storage;
pub mod types;
pub mod uri;

pub use error::{Error, ErrorKind, Result};

///
/// Prelude
///
/// Domain vocabulary only; helpers and internals stay at their paths.
///

pub mod prelude {
    pub use crate::{
        collection::Collection,
        error::{Error, ErrorKind, Result},
        ident::{UuidVersion, derive_uuid},
        instance::{Instance, PropertySlice, PropertyValue},
        schema::{Dimension, Entity, Property},
        storage::{DataModel, Storage, StorageDriver, StorageOptions},
        types::TypeKind,
        uri::MetaUri,
    };
    pub use uuid::Uuid;
}
