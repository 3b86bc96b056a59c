//! Plugin discovery and lifecycle sequencing.
//!
//! The manager owns the loaded plugins of one game. Loading a plugin walks
//! through discovery, module open, entry point resolution, `plugin_init`
//! and a version check; any failure releases what was acquired so far and
//! leaves nothing attached. Unloading stops the plugin, runs
//! `plugin_deinit`, sweeps whatever the plugin left in the game's
//! registries and only then closes its module.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::game::GameContext;
use crate::lifecycle::{LifecycleEvent, LifecycleHooks, LifecycleState};
use crate::load_list::LoadList;
use crate::loader::{DirectoryProvider, Module, ModuleProvider};
use crate::plugin::{Language, Plugin, PluginInfo};
use crate::version::{Version, VersionPolicy};

/// Name of the core plugin every manager creates for itself.
pub const CORE_PLUGIN_NAME: &str = "lightship core";

/// Configuration for the plugin manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory scanned for plugin modules.
    pub plugin_dir: PathBuf,
    /// Whether teardown unloads plugins newest first.
    pub reverse_unload: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from(DirectoryProvider::DEFAULT_DIR),
            reverse_unload: true,
        }
    }
}

impl ManagerConfig {
    /// Create a new manager configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the plugin directory.
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = dir.into();
        self
    }

    /// Set the teardown order.
    pub fn with_reverse_unload(mut self, reverse: bool) -> Self {
        self.reverse_unload = reverse;
        self
    }
}

fn core_info() -> PluginInfo {
    PluginInfo::new(CORE_PLUGIN_NAME, Version::new(0, 0, 1))
        .with_category("core")
        .with_author("TheComet")
        .with_description("Provides essential events and services to the game object")
        .with_website("https://github.com/TheComet93/lightship")
        .with_language(Language::Rust)
}

/// Loads, starts, stops and unloads the plugins of one game.
pub struct PluginManager {
    config: ManagerConfig,
    provider: Box<dyn ModuleProvider>,
    plugins: Vec<Plugin>,
    core: Option<Plugin>,
    hooks: LifecycleHooks,
}

impl PluginManager {
    /// Create a manager scanning the configured plugin directory.
    pub fn new(config: ManagerConfig) -> Self {
        let provider = DirectoryProvider::new(config.plugin_dir.clone());
        Self::with_provider(config, provider)
    }

    /// Create a manager discovering modules through `provider`.
    pub fn with_provider(config: ManagerConfig, provider: impl ModuleProvider + 'static) -> Self {
        let mut core = Plugin::new(core_info());
        core.set_state(LifecycleState::Started);

        Self {
            config,
            provider: Box::new(provider),
            plugins: Vec::new(),
            core: Some(core),
            hooks: LifecycleHooks::new(),
        }
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The core plugin, until the manager shuts down.
    pub fn core(&self) -> Option<&Plugin> {
        self.core.as_ref()
    }

    /// Add a lifecycle event handler.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&LifecycleEvent) + 'static,
    {
        self.hooks.on_event(handler);
    }

    /// Find the first module file whose name contains `name` and whose
    /// embedded version satisfies `policy` against `version`.
    pub fn find_plugin(&self, name: &str, version: Version, policy: VersionPolicy) -> Result<String> {
        info!(plugin = name, "looking for plugin, {} version {}", policy, version);

        self.provider
            .list()?
            .into_iter()
            .find(|file| {
                file.contains(name)
                    && Version::from_file_name(file)
                        .is_some_and(|candidate| policy.accepts(&candidate, &version))
            })
            .ok_or_else(|| Error::NoMatchingFile {
                name: name.to_string(),
                policy: policy.to_string(),
                version: version.to_string(),
            })
    }

    /// Load a plugin and attach it to the game.
    ///
    /// The plugin is left in the loaded state; call [`start`](Self::start)
    /// to start it.
    pub fn load(
        &mut self,
        ctx: &mut GameContext,
        name: &str,
        version: Version,
        policy: VersionPolicy,
    ) -> Result<&Plugin> {
        match self.try_load(ctx, name, version, policy) {
            Ok(index) => Ok(&self.plugins[index]),
            Err(e) => {
                error!(plugin = name, error = %e, "failed to load plugin");
                self.hooks.emit_failed(name, &e.to_string());
                Err(e)
            }
        }
    }

    fn try_load(
        &mut self,
        ctx: &mut GameContext,
        name: &str,
        version: Version,
        policy: VersionPolicy,
    ) -> Result<usize> {
        if self.get_by_name(name).is_some() {
            return Err(Error::PluginAlreadyLoaded(name.to_string()));
        }

        let file = self.find_plugin(name, version, policy)?;
        let module = self.provider.open(&file)?;

        let entry = match module.entry_points() {
            Ok(entry) => entry,
            Err(e) => {
                close_module(module);
                return Err(e);
            }
        };

        let Some(mut plugin) = (entry.init)(ctx) else {
            self.release_module(ctx, &[name], module);
            return Err(Error::init_failed(format!(
                "plugin_init of \"{}\" returned nothing",
                file
            )));
        };

        if self.get_by_name(plugin.name()).is_some() {
            let claimed = plugin.name().to_string();
            warn!(
                plugin = name,
                claimed = %claimed,
                file = %file,
                "module reports a plugin that is already loaded"
            );
            self.release_failed(ctx, name, plugin, module);
            return Err(Error::PluginAlreadyLoaded(claimed));
        }

        let file_version = Version::from_file_name(&file);
        let claimed = plugin.version();
        if !file_version.is_some_and(|v| VersionPolicy::Exact.accepts(&claimed, &v)) {
            self.release_failed(ctx, name, plugin, module);
            return Err(Error::VersionMismatch {
                claimed: claimed.to_string(),
                file,
            });
        }

        info!(plugin = plugin.name(), version = %claimed, file = %file, "loaded plugin");
        self.hooks.emit_loaded(plugin.name(), &file);
        plugin.attach(file, module, entry);

        let index = self.plugins.len();
        self.plugins.push(plugin);
        Ok(index)
    }

    /// Drop a plugin object that never got attached, then release its module.
    fn release_failed(
        &self,
        ctx: &mut GameContext,
        requested: &str,
        plugin: Plugin,
        module: Module,
    ) {
        let reported = plugin.name().to_string();
        drop(plugin);
        self.release_module(ctx, &[requested, &reported], module);
    }

    /// Sweep what `plugin_init` may have registered under `names`, then
    /// close the module. Names of loaded plugins are never swept.
    fn release_module(&self, ctx: &mut GameContext, names: &[&str], module: Module) {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) || self.get_by_name(name).is_some() {
                continue;
            }
            // entries registered during init point into the module
            ctx.sweep_plugin(name);
        }
        close_module(module);
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.plugins
            .iter()
            .position(|plugin| plugin.name() == name)
            .ok_or_else(|| Error::plugin_not_found(name))
    }

    /// Start a loaded or stopped plugin.
    pub fn start(&mut self, ctx: &mut GameContext, name: &str) -> Result<()> {
        let index = self.position(name)?;
        let plugin = &mut self.plugins[index];
        if !plugin.state().can_start() {
            return Err(Error::invalid_state("loaded or stopped", plugin.state().to_string()));
        }
        let entry = plugin
            .entry_points()
            .ok_or_else(|| Error::invalid_state("loaded", "detached"))?;

        if let Err(e) = (entry.start)(ctx, plugin) {
            error!(plugin = name, error = %e, "failed to start plugin");
            self.hooks.emit_failed(name, &e.to_string());
            return Err(Error::start_failed(name, e.to_string()));
        }

        plugin.set_state(LifecycleState::Started);
        info!(plugin = name, "started plugin");
        self.hooks.emit_started(name);
        Ok(())
    }

    /// Stop a started plugin.
    pub fn stop(&mut self, ctx: &mut GameContext, name: &str) -> Result<()> {
        let index = self.position(name)?;
        let plugin = &mut self.plugins[index];
        if !plugin.state().can_stop() {
            return Err(Error::invalid_state("started", plugin.state().to_string()));
        }
        stop_plugin(ctx, plugin);
        self.hooks.emit_stopped(name);
        Ok(())
    }

    /// Stop if needed, deinitialize, sweep the plugin's registry entries and
    /// close its module.
    pub fn unload(&mut self, ctx: &mut GameContext, name: &str) -> Result<()> {
        let index = self.position(name)?;
        let mut plugin = self.plugins.remove(index);
        info!(plugin = name, "unloading plugin");

        if plugin.state().can_stop() {
            stop_plugin(ctx, &mut plugin);
            self.hooks.emit_stopped(name);
        }

        // the plugin object is gone after deinit, the module must outlive it
        let module = plugin.take_module();
        match plugin.entry_points() {
            Some(entry) => (entry.deinit)(ctx, plugin),
            None => drop(plugin),
        }

        ctx.sweep_plugin(name);
        if let Some(module) = module {
            close_module(module);
        }

        self.hooks.emit_unloaded(name);
        Ok(())
    }

    /// Load every plugin of `list` in order, then start the newly loaded
    /// ones in the same order.
    ///
    /// A required plugin that fails to load aborts the whole list before
    /// anything is started; optional ones are skipped. The first start
    /// failure aborts the remaining starts. Nothing loaded or started before
    /// a failure is rolled back.
    pub fn load_list(&mut self, ctx: &mut GameContext, list: &LoadList) -> Result<()> {
        let mut loaded = Vec::new();

        for spec in list {
            match self.load(ctx, &spec.name, spec.version, spec.version_policy) {
                Ok(plugin) => loaded.push(plugin.name().to_string()),
                Err(e) if spec.optional => {
                    warn!(plugin = %spec.name, error = %e, "skipping optional plugin");
                }
                Err(_) => {
                    error!(plugin = %spec.name, "required plugin failed to load, aborting");
                    return Err(Error::RequiredPluginFailed(spec.name.clone()));
                }
            }
        }

        for name in &loaded {
            self.start(ctx, name)?;
        }
        Ok(())
    }

    /// Unload every plugin.
    pub fn unload_all(&mut self, ctx: &mut GameContext) {
        while !self.plugins.is_empty() {
            let index = if self.config.reverse_unload {
                self.plugins.len() - 1
            } else {
                0
            };
            let name = self.plugins[index].name().to_string();
            if let Err(e) = self.unload(ctx, &name) {
                error!(plugin = %name, error = %e, "failed to unload plugin");
                break;
            }
        }
    }

    /// Unload every plugin and destroy the core plugin.
    pub fn shutdown(&mut self, ctx: &mut GameContext) {
        self.unload_all(ctx);
        if let Some(core) = self.core.take() {
            debug!(plugin = core.name(), "destroyed core plugin");
        }
    }

    /// Find a loaded plugin by name.
    pub fn get_by_name(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|plugin| plugin.name() == name)
    }

    /// Loaded plugins in load order.
    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> + '_ {
        self.plugins.iter()
    }

    /// Number of loaded plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is loaded.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn stop_plugin(ctx: &mut GameContext, plugin: &mut Plugin) {
    if let Some(entry) = plugin.entry_points() {
        (entry.stop)(ctx, plugin);
    }
    plugin.set_state(LifecycleState::Stopped);
    info!(plugin = plugin.name(), "stopped plugin");
}

fn close_module(module: Module) {
    let name = module.name().to_string();
    if let Err(e) = module.close() {
        warn!(module = %name, error = %e, "failed to close module");
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .field("hooks", &self.hooks)
            .finish()
    }
}
