//! The process-wide storage driver registry.
//!
//! Drivers are found by name: registered drivers first, then shared objects
//! on the search path whose file name matches the driver, then any shared
//! object whose exported factory identifies itself by that name. The
//! registry is created lazily on first use and lives for the process.

use crate::{
    error::{Error, Result},
    obs,
    storage::StorageDriver,
};
use derive_more::{Deref, DerefMut};
use libloading::Library;
use std::{
    collections::BTreeMap,
    env,
    fmt,
    ops,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

/// Environment variable holding extra plugin directories, separated by the
/// platform path separator.
pub const PLUGIN_DIRS_ENV: &str = "DIMDB_STORAGE_PLUGIN_DIRS";

/// The factory symbol every storage plugin exports.
pub const DRIVER_ENTRY_SYMBOL: &[u8] = b"dimdb_storage_driver";

/// Signature of the exported factory. Use
/// [`declare_storage_driver!`](crate::declare_storage_driver) to define it.
pub type DriverFactory = unsafe extern "C" fn() -> *mut dyn StorageDriver;

/// Compiled-in fallback directories, searched after the environment.
const DEFAULT_PLUGIN_DIRS: &[&str] = &[
    "/usr/local/lib/dimdb/storage-plugins",
    "/usr/lib/dimdb/storage-plugins",
];

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn with_registry<T>(f: impl FnOnce(&mut Registry) -> T) -> T {
    let registry = REGISTRY.get_or_init(|| Mutex::new(Registry::from_env()));
    let mut guard = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

///
/// Driver
///
/// A shareable handle on a registered driver. Handles obtained from
/// dynamically loaded plugins keep the backing library alive.
///

#[derive(Clone)]
pub struct Driver {
    api: Arc<dyn StorageDriver>,
    _library: Option<Arc<Library>>,
}

impl Driver {
    fn builtin(api: Box<dyn StorageDriver>) -> Self {
        Self {
            api: Arc::from(api),
            _library: None,
        }
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver").field("name", &self.api.name()).finish()
    }
}

impl ops::Deref for Driver {
    type Target = dyn StorageDriver;

    fn deref(&self) -> &Self::Target {
        &*self.api
    }
}

///
/// SearchPaths
///
/// The ordered list of plugin directories, with python-style signed
/// indexing for edits.
///

#[derive(Debug, Default, Deref, DerefMut)]
pub struct SearchPaths(Vec<PathBuf>);

impl SearchPaths {
    fn from_env() -> Self {
        let mut paths = Vec::new();
        if let Some(joined) = env::var_os(PLUGIN_DIRS_ENV) {
            paths.extend(env::split_paths(&joined));
        }
        paths.extend(DEFAULT_PLUGIN_DIRS.iter().map(PathBuf::from));
        Self(paths)
    }

    /// Insert at index `n`; negative `n` counts from the end, out-of-range
    /// indices are clipped.
    fn insert(&mut self, n: isize, path: PathBuf) {
        let len = self.0.len() as isize;
        let at = if n < 0 { (len + n).max(0) } else { n.min(len) };
        self.0.insert(at as usize, path);
    }

    fn remove(&mut self, n: isize) -> Result<PathBuf> {
        let len = self.0.len() as isize;
        let at = if n < 0 { len + n } else { n };
        if at < 0 || at >= len {
            return Err(Error::InvalidArg(format!(
                "search path index {n} is out of range"
            ))
            .emit());
        }
        Ok(self.0.remove(at as usize))
    }
}

///
/// Registry
///

struct Registry {
    drivers: BTreeMap<String, Driver>,
    paths: SearchPaths,
}

impl Registry {
    fn from_env() -> Self {
        Self {
            drivers: BTreeMap::new(),
            paths: SearchPaths::from_env(),
        }
    }

    fn adopt(&mut self, driver: Driver) -> Driver {
        self.drivers.insert(driver.name().to_string(), driver.clone());
        driver
    }

    /// Scan the search path for a plugin providing `name`.
    fn discover(&mut self, name: &str) -> Option<Driver> {
        let extension = env::consts::DLL_EXTENSION;
        let candidates: Vec<PathBuf> = self
            .paths
            .iter()
            .flat_map(|dir| {
                [
                    dir.join(format!("{name}.{extension}")),
                    dir.join(format!("{}{name}{}", env::consts::DLL_PREFIX, env::consts::DLL_SUFFIX)),
                ]
            })
            .collect();

        // Pass one: libraries named after the driver.
        for path in candidates.iter().filter(|p| p.is_file()) {
            match load_library(path) {
                Ok(driver) => {
                    let driver = self.adopt(driver);
                    if driver.name() == name {
                        return Some(driver);
                    }
                }
                Err(err) => obs::diag(&err.to_string()),
            }
        }

        // Pass two: any shared object whose factory identifies itself by
        // the requested name.
        for dir in self.paths.iter().cloned().collect::<Vec<_>>() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                    continue;
                }
                match load_library(&path) {
                    Ok(driver) => {
                        let driver = self.adopt(driver);
                        if driver.name() == name {
                            return Some(driver);
                        }
                    }
                    Err(err) => obs::diag(&err.to_string()),
                }
            }
        }

        None
    }
}

/// Load one plugin library and instantiate its driver.
fn load_library(path: &Path) -> Result<Driver> {
    // SAFETY: loading a shared object runs its initialisers; the plugin
    // contract requires a well-behaved library exporting the factory symbol.
    let library = unsafe { Library::new(path) }.map_err(|err| {
        Error::Format(format!("cannot load plugin '{}': {err}", path.display()))
    })?;

    let raw = {
        // SAFETY: the exported symbol is declared with the fixed
        // DriverFactory signature by declare_storage_driver!.
        let factory = unsafe { library.get::<DriverFactory>(DRIVER_ENTRY_SYMBOL) }.map_err(
            |err| {
                Error::Format(format!(
                    "plugin '{}' lacks the driver factory: {err}",
                    path.display()
                ))
            },
        )?;
        // SAFETY: per the plugin contract the factory hands over a heap
        // allocation created with Box::into_raw.
        unsafe { factory() }
    };
    if raw.is_null() {
        return Err(Error::Format(format!(
            "plugin '{}' returned no driver",
            path.display()
        )));
    }

    // SAFETY: ownership transfer from the factory, see above.
    let api: Box<dyn StorageDriver> = unsafe { Box::from_raw(raw) };
    Ok(Driver {
        api: Arc::from(api),
        _library: Some(Arc::new(library)),
    })
}

/// Return the driver with the given name, loading it from the search path
/// when it is not registered yet.
pub fn get(name: &str) -> Result<Driver> {
    with_registry(|registry| {
        if let Some(driver) = registry.drivers.get(name) {
            return Ok(driver.clone());
        }
        if let Some(driver) = registry.discover(name) {
            return Ok(driver);
        }
        Err(Error::PluginMissing {
            driver: name.to_string(),
            searched: registry.paths.to_vec(),
        }
        .emit())
    })
}

/// Register a driver under its own name, replacing any earlier registration.
pub fn register(driver: Box<dyn StorageDriver>) {
    with_registry(|registry| {
        registry.adopt(Driver::builtin(driver));
    });
}

/// Load every plugin found on the search path. Returns the number of
/// drivers registered; unloadable libraries are diagnosed and skipped.
pub fn load_all() -> usize {
    with_registry(|registry| {
        let extension = env::consts::DLL_EXTENSION;
        let mut loaded = 0;
        for dir in registry.paths.iter().cloned().collect::<Vec<_>>() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                    continue;
                }
                match load_library(&path) {
                    Ok(driver) => {
                        registry.adopt(driver);
                        loaded += 1;
                    }
                    Err(err) => obs::diag(&err.to_string()),
                }
            }
        }
        loaded
    })
}

/// Unload and unregister the driver with the given name.
pub fn unload(name: &str) -> Result<()> {
    with_registry(|registry| {
        registry
            .drivers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("no registered driver '{name}'")).emit())
    })
}

/// Snapshot of the registered drivers. The registry must not be mutated
/// while the snapshot is being consumed if a stable view matters.
#[must_use]
pub fn drivers() -> Vec<Driver> {
    with_registry(|registry| registry.drivers.values().cloned().collect())
}

/// Snapshot of the current search path.
#[must_use]
pub fn paths() -> Vec<PathBuf> {
    with_registry(|registry| registry.paths.to_vec())
}

/// Insert a directory at position `n` (negative counts from the end).
pub fn path_insert(n: isize, path: impl Into<PathBuf>) {
    let path = path.into();
    with_registry(|registry| registry.paths.insert(n, path));
}

/// Append a directory to the search path.
pub fn path_append(path: impl Into<PathBuf>) {
    let path = path.into();
    with_registry(|registry| registry.paths.push(path));
}

/// Remove the directory at position `n`.
pub fn path_remove(n: isize) -> Result<()> {
    with_registry(|registry| registry.paths.remove(n).map(|_| ()))
}

///
/// declare_storage_driver
///
/// Export the plugin factory symbol for an out-of-tree storage driver
/// without writing the unsafe glue by hand.
///

#[macro_export]
macro_rules! declare_storage_driver {
    ($ctor:expr) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn dimdb_storage_driver() -> *mut dyn $crate::storage::StorageDriver {
            let boxed: Box<dyn $crate::storage::StorageDriver> = Box::new($ctor);
            Box::into_raw(boxed)
        }
    };
}
