//! Module loading and plugin module sources.
//!
//! A plugin module exports four entry points under fixed names. Modules are
//! either shared libraries opened with `libloading`, or [`StaticModule`]
//! symbol tables linked into the host. A [`ModuleProvider`] lists the
//! modules available for discovery and opens them by file name.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{Error, Result};
use crate::game::GameContext;
use crate::plugin::Plugin;

/// Symbol name of the init entry point.
pub const PLUGIN_INIT: &str = "plugin_init";
/// Symbol name of the start entry point.
pub const PLUGIN_START: &str = "plugin_start";
/// Symbol name of the stop entry point.
pub const PLUGIN_STOP: &str = "plugin_stop";
/// Symbol name of the deinit entry point.
pub const PLUGIN_DEINIT: &str = "plugin_deinit";

/// Constructs the plugin object. Returning `None` fails the load.
pub type InitFn = fn(&mut GameContext) -> Option<Plugin>;
/// Starts the plugin.
pub type StartFn = fn(&mut GameContext, &mut Plugin) -> Result<()>;
/// Stops the plugin.
pub type StopFn = fn(&mut GameContext, &mut Plugin);
/// Destroys the plugin object.
pub type DeinitFn = fn(&mut GameContext, Plugin);

/// The four resolved entry points of a module.
///
/// Function pointers into a shared library are only valid while the library
/// is open, so these never outlive the [`Module`] they came from.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    /// `plugin_init`.
    pub init: InitFn,
    /// `plugin_start`.
    pub start: StartFn,
    /// `plugin_stop`.
    pub stop: StopFn,
    /// `plugin_deinit`.
    pub deinit: DeinitFn,
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints").finish_non_exhaustive()
    }
}

/// A plugin module linked into the host.
///
/// Each entry point is optional so hosts and tests can describe broken
/// modules as well as working ones.
#[derive(Clone, Default)]
pub struct StaticModule {
    name: String,
    init: Option<InitFn>,
    start: Option<StartFn>,
    stop: Option<StopFn>,
    deinit: Option<DeinitFn>,
}

impl StaticModule {
    /// Create a module exporting nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a module exporting all four entry points.
    pub fn with_entry_points(name: impl Into<String>, entry: EntryPoints) -> Self {
        Self::new(name)
            .init(entry.init)
            .start(entry.start)
            .stop(entry.stop)
            .deinit(entry.deinit)
    }

    /// Export `plugin_init`.
    pub fn init(mut self, f: InitFn) -> Self {
        self.init = Some(f);
        self
    }

    /// Export `plugin_start`.
    pub fn start(mut self, f: StartFn) -> Self {
        self.start = Some(f);
        self
    }

    /// Export `plugin_stop`.
    pub fn stop(mut self, f: StopFn) -> Self {
        self.stop = Some(f);
        self
    }

    /// Export `plugin_deinit`.
    pub fn deinit(mut self, f: DeinitFn) -> Self {
        self.deinit = Some(f);
        self
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve<T: Copy>(&self, symbol: Option<T>, name: &str) -> Result<T> {
        symbol.ok_or_else(|| Error::missing_symbol(&self.name, name))
    }
}

impl fmt::Debug for StaticModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticModule")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("deinit", &self.deinit.is_some())
            .finish()
    }
}

/// An open plugin module.
pub enum Module {
    /// A shared library.
    Dynamic {
        /// Path the library was opened from.
        path: String,
        /// The library handle.
        library: Library,
    },
    /// A module linked into the host.
    Static(StaticModule),
}

impl Module {
    /// Open a shared library.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::module_open(path.display().to_string(), e.to_string()))?;
        Ok(Self::Dynamic {
            path: path.display().to_string(),
            library,
        })
    }

    /// Module name: the library path, or the static module's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Dynamic { path, .. } => path,
            Self::Static(module) => module.name(),
        }
    }

    /// Resolve the four entry points. Fails on the first one missing.
    pub fn entry_points(&self) -> Result<EntryPoints> {
        match self {
            Self::Dynamic { path, library } => Ok(EntryPoints {
                init: lookup(library, path, PLUGIN_INIT)?,
                start: lookup(library, path, PLUGIN_START)?,
                stop: lookup(library, path, PLUGIN_STOP)?,
                deinit: lookup(library, path, PLUGIN_DEINIT)?,
            }),
            Self::Static(module) => Ok(EntryPoints {
                init: module.resolve(module.init, PLUGIN_INIT)?,
                start: module.resolve(module.start, PLUGIN_START)?,
                stop: module.resolve(module.stop, PLUGIN_STOP)?,
                deinit: module.resolve(module.deinit, PLUGIN_DEINIT)?,
            }),
        }
    }

    /// Close the module. Entry points resolved from it become invalid.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Dynamic { path, library } => library
                .close()
                .map_err(|e| Error::module_close(path, e.to_string())),
            Self::Static(_) => Ok(()),
        }
    }
}

fn lookup<T: Copy>(library: &Library, module: &str, name: &str) -> Result<T> {
    let mut symbol_name = Vec::with_capacity(name.len() + 1);
    symbol_name.extend_from_slice(name.as_bytes());
    symbol_name.push(0);

    let symbol: Symbol<T> = unsafe { library.get(&symbol_name) }
        .map_err(|_| Error::missing_symbol(module, name))?;
    Ok(*symbol)
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic { path, .. } => f.debug_struct("Module::Dynamic").field("path", path).finish(),
            Self::Static(module) => f.debug_tuple("Module::Static").field(module).finish(),
        }
    }
}

/// Source of plugin modules for discovery.
pub trait ModuleProvider {
    /// File names available, in the order they are matched.
    fn list(&self) -> Result<Vec<String>>;

    /// Open the module stored under `file`, as returned by [`list`](Self::list).
    fn open(&self, file: &str) -> Result<Module>;
}

/// Shared libraries in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    /// Default plugin directory.
    pub const DEFAULT_DIR: &'static str = "plugins";

    /// Scan `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DirectoryProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}

impl ModuleProvider for DirectoryProvider {
    fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn open(&self, file: &str) -> Result<Module> {
        Module::open(self.dir.join(file))
    }
}

/// Modules linked into the host, keyed by the file name they are
/// discovered under.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    catalog: BTreeMap<String, StaticModule>,
}

impl StaticProvider {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `module` under `file`, replacing any earlier entry.
    pub fn with_module(mut self, file: impl Into<String>, module: StaticModule) -> Self {
        self.insert(file, module);
        self
    }

    /// Add `module` under `file`, replacing any earlier entry.
    pub fn insert(&mut self, file: impl Into<String>, module: StaticModule) {
        self.catalog.insert(file.into(), module);
    }

    /// Number of catalogued modules.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

impl ModuleProvider for StaticProvider {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.catalog.keys().cloned().collect())
    }

    fn open(&self, file: &str) -> Result<Module> {
        self.catalog
            .get(file)
            .cloned()
            .map(Module::Static)
            .ok_or_else(|| Error::module_open(file, "not in the static catalog"))
    }
}
