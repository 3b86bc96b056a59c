//! The game instance: plugins, registries and settings scoped together.

use std::any::Any;
use std::fmt;
#[cfg(feature = "serde")]
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{typed, EventRegistry};
use crate::hash::{hash_str, BUILTIN_NAMESPACE};
use crate::load_list::LoadList;
use crate::loader::ModuleProvider;
use crate::manager::{ManagerConfig, PluginManager, CORE_PLUGIN_NAME};
use crate::map::OrderedMap;
use crate::plugin::Plugin;
use crate::ptree::PropertyTree;
use crate::services::ServiceRegistry;
use crate::version::{Version, VersionPolicy};

/// Built-in log event. Arguments: [`LogRecord`].
pub const EVENT_LOG: &str = "builtin.log";
/// Built-in event raising the log indentation. Arguments: `()`.
pub const EVENT_LOG_INDENT: &str = "builtin.log_indent";
/// Built-in event lowering the log indentation. Arguments: `()`.
pub const EVENT_LOG_UNINDENT: &str = "builtin.log_unindent";
/// Fired when the game starts running. Arguments: `()`.
pub const EVENT_START: &str = "lightship core.start";
/// Fired when the game pauses. Arguments: `()`.
pub const EVENT_PAUSE: &str = "lightship core.pause";
/// Fired when the game exits. Arguments: `()`.
pub const EVENT_STOP: &str = "lightship core.stop";
/// Fired once per simulation tick. Arguments: `()`.
pub const EVENT_TICK: &str = "lightship core.tick";
/// Fired once per rendered frame. Arguments: `()`.
pub const EVENT_RENDER: &str = "lightship core.render";
/// Fired with frame statistics. Arguments: [`Stats`].
pub const EVENT_STATS: &str = "lightship core.stats";

/// Service starting the game. Type: [`GameControl`].
pub const SERVICE_START: &str = "lightship core.start";
/// Service pausing the game. Type: [`GameControl`].
pub const SERVICE_PAUSE: &str = "lightship core.pause";
/// Service exiting the game. Type: [`GameControl`].
pub const SERVICE_EXIT: &str = "lightship core.exit";

/// Signature of the core start/pause/exit services.
pub type GameControl = fn(&mut GameContext);

/// Whether this game instance is a client or the host.
///
/// Only a scope flag; no networking hangs off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkRole {
    /// Connects to a host.
    Client = 1,
    /// Hosts the game.
    #[default]
    Host = 2,
}

/// Run state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    /// Not running.
    #[default]
    Terminated,
    /// Running but paused.
    Paused,
    /// Running.
    Running,
}

/// Arguments of [`EVENT_LOG`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Current indentation level.
    pub indent: usize,
    /// The message.
    pub message: String,
}

/// Arguments of [`EVENT_STATS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Rendered frames per second.
    pub render_fps: u32,
    /// Simulation ticks per second.
    pub tick_fps: u32,
}

/// Everything a plugin can reach from its entry points.
pub struct GameContext {
    name: String,
    network_role: NetworkRole,
    state: GameState,
    services: ServiceRegistry,
    events: EventRegistry,
    settings: PropertyTree<String>,
    context_store: OrderedMap<Box<dyn Any>>,
    log_indent: usize,
}

impl GameContext {
    fn new(name: String, network_role: NetworkRole, settings: PropertyTree<String>) -> Self {
        Self {
            name,
            network_role,
            state: GameState::Terminated,
            services: ServiceRegistry::new(),
            events: EventRegistry::new(),
            settings,
            context_store: OrderedMap::new(),
            log_indent: 0,
        }
    }

    /// Game name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client or host.
    pub fn network_role(&self) -> NetworkRole {
        self.network_role
    }

    /// Run state.
    pub fn state(&self) -> GameState {
        self.state
    }

    /// The service directory.
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The service directory, for registering.
    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    /// The event directory.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// The event directory, for registering.
    pub fn events_mut(&mut self) -> &mut EventRegistry {
        &mut self.events
    }

    /// Settings tree.
    pub fn settings(&self) -> &PropertyTree<String> {
        &self.settings
    }

    /// Settings tree, for editing.
    pub fn settings_mut(&mut self) -> &mut PropertyTree<String> {
        &mut self.settings
    }

    /// Store per-game state for `plugin`.
    ///
    /// Fails if the plugin already stored something.
    pub fn set_context<T: Any>(&mut self, plugin: &str, context: T) -> Result<()> {
        self.context_store.insert(hash_str(plugin), Box::new(context))
    }

    /// State stored for `plugin`, if it is a `T`.
    pub fn context<T: Any>(&self, plugin: &str) -> Option<&T> {
        self.context_store.find(hash_str(plugin))?.downcast_ref()
    }

    /// Mutable state stored for `plugin`, if it is a `T`.
    pub fn context_mut<T: Any>(&mut self, plugin: &str) -> Option<&mut T> {
        self.context_store.find_mut(hash_str(plugin))?.downcast_mut()
    }

    /// Remove and return the state stored for `plugin`.
    pub fn take_context(&mut self, plugin: &str) -> Option<Box<dyn Any>> {
        self.context_store.erase(hash_str(plugin))
    }

    /// Set the game running and fire [`EVENT_START`].
    pub fn start(&mut self) {
        self.state = GameState::Running;
        info!(game = %self.name, "game started");
        self.fire(EVENT_START, &());
    }

    /// Pause the game and fire [`EVENT_PAUSE`].
    pub fn pause(&mut self) {
        self.state = GameState::Paused;
        info!(game = %self.name, "game paused");
        self.fire(EVENT_PAUSE, &());
    }

    /// Terminate the game and fire [`EVENT_STOP`].
    pub fn exit(&mut self) {
        self.state = GameState::Terminated;
        info!(game = %self.name, "game exiting");
        self.fire(EVENT_STOP, &());
    }

    /// Fire [`EVENT_TICK`].
    pub fn dispatch_tick(&self) {
        self.fire(EVENT_TICK, &());
    }

    /// Fire [`EVENT_RENDER`].
    pub fn dispatch_render(&self) {
        self.fire(EVENT_RENDER, &());
    }

    /// Fire [`EVENT_STATS`].
    pub fn dispatch_stats(&self, render_fps: u32, tick_fps: u32) {
        self.fire(
            EVENT_STATS,
            &Stats {
                render_fps,
                tick_fps,
            },
        );
    }

    /// Send a message through [`EVENT_LOG`].
    pub fn log(&self, message: impl Into<String>) {
        let record = LogRecord {
            indent: self.log_indent,
            message: message.into(),
        };
        self.fire(EVENT_LOG, &record);
    }

    /// Indent subsequent log messages one level.
    pub fn log_indent(&mut self) {
        self.log_indent += 1;
        self.fire(EVENT_LOG_INDENT, &());
    }

    /// Undo one [`log_indent`](Self::log_indent).
    pub fn log_unindent(&mut self) {
        self.log_indent = self.log_indent.saturating_sub(1);
        self.fire(EVENT_LOG_UNINDENT, &());
    }

    fn fire(&self, event: &str, args: &dyn Any) {
        if let Err(e) = self.events.dispatch(event, args) {
            debug!(event, error = %e, "event not dispatched");
        }
    }

    /// Remove everything `plugin` registered in this game.
    pub(crate) fn sweep_plugin(&mut self, plugin: &str) {
        let services = self.services.unregister_all(plugin);
        let events = self.events.destroy_all_plugin_events(plugin);
        let listeners = self.events.unregister_all_listeners_of_plugin(plugin);
        let context = self.take_context(plugin).is_some();
        if services + events + listeners > 0 || context {
            debug!(plugin, services, events, listeners, context, "swept plugin registrations");
        }
    }

    fn register_builtins(&mut self) -> Result<()> {
        for name in ["log", "log_indent", "log_unindent"] {
            self.events.create(BUILTIN_NAMESPACE, name)?;
        }
        for name in ["start", "pause", "stop", "tick", "render", "stats"] {
            self.events.create(CORE_PLUGIN_NAME, name)?;
        }

        self.services
            .register(CORE_PLUGIN_NAME, "start", GameContext::start as GameControl)?;
        self.services
            .register(CORE_PLUGIN_NAME, "pause", GameContext::pause as GameControl)?;
        self.services
            .register(CORE_PLUGIN_NAME, "exit", GameContext::exit as GameControl)?;

        self.events.register_listener(
            None,
            EVENT_LOG,
            typed(|record: &LogRecord| {
                info!("{:width$}{}", "", record.message, width = record.indent * 2);
            }),
        )
    }
}

impl fmt::Debug for GameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameContext")
            .field("name", &self.name)
            .field("network_role", &self.network_role)
            .field("state", &self.state)
            .field("services", &self.services)
            .field("events", &self.events)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Configuration for a game instance.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Game name.
    pub name: String,
    /// Client or host.
    pub network_role: NetworkRole,
    /// TOML settings file loaded into the settings tree.
    #[cfg(feature = "serde")]
    pub settings_file: Option<PathBuf>,
    /// Plugin manager configuration.
    pub manager: ManagerConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name: "lightship".to_string(),
            network_role: NetworkRole::default(),
            #[cfg(feature = "serde")]
            settings_file: None,
            manager: ManagerConfig::default(),
        }
    }
}

impl GameConfig {
    /// Create a new game configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the game name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the network role.
    pub fn with_network_role(mut self, role: NetworkRole) -> Self {
        self.network_role = role;
        self
    }

    /// Load settings from a TOML file.
    #[cfg(feature = "serde")]
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// Set the plugin manager configuration.
    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }
}

/// A game instance.
///
/// Dropping the game unloads all of its plugins.
pub struct Game {
    ctx: GameContext,
    manager: PluginManager,
}

impl Game {
    /// Create a game discovering plugins in the configured directory.
    pub fn new(config: GameConfig) -> Result<Self> {
        let manager = PluginManager::new(config.manager.clone());
        Self::build(config, manager)
    }

    /// Create a game discovering plugins through `provider`.
    pub fn with_provider(config: GameConfig, provider: impl ModuleProvider + 'static) -> Result<Self> {
        let manager = PluginManager::with_provider(config.manager.clone(), provider);
        Self::build(config, manager)
    }

    fn build(config: GameConfig, manager: PluginManager) -> Result<Self> {
        let settings = Self::load_settings(&config)?;
        let mut ctx = GameContext::new(config.name, config.network_role, settings);
        ctx.register_builtins()?;

        info!(game = %ctx.name, role = ?ctx.network_role, "created game");
        Ok(Self { ctx, manager })
    }

    #[cfg(feature = "serde")]
    fn load_settings(config: &GameConfig) -> Result<PropertyTree<String>> {
        match &config.settings_file {
            Some(path) => {
                debug!(path = %path.display(), "loading settings");
                crate::settings::from_file(path)
            }
            None => Ok(PropertyTree::new(None)),
        }
    }

    #[cfg(not(feature = "serde"))]
    fn load_settings(_config: &GameConfig) -> Result<PropertyTree<String>> {
        Ok(PropertyTree::new(None))
    }

    /// The game context.
    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    /// The game context, for editing settings or calling services.
    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    /// The plugin manager.
    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Add a lifecycle event handler.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&crate::lifecycle::LifecycleEvent) + 'static,
    {
        self.manager.on_event(handler);
    }

    /// Game name.
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Run state.
    pub fn state(&self) -> GameState {
        self.ctx.state()
    }

    /// Find a loaded plugin by name.
    pub fn plugin(&self, name: &str) -> Option<&Plugin> {
        self.manager.get_by_name(name)
    }

    /// Load a plugin. See [`PluginManager::load`].
    pub fn load_plugin(&mut self, name: &str, version: Version, policy: VersionPolicy) -> Result<()> {
        self.manager
            .load(&mut self.ctx, name, version, policy)
            .map(|_| ())
    }

    /// Start a loaded plugin.
    pub fn start_plugin(&mut self, name: &str) -> Result<()> {
        self.manager.start(&mut self.ctx, name)
    }

    /// Stop a started plugin.
    pub fn stop_plugin(&mut self, name: &str) -> Result<()> {
        self.manager.stop(&mut self.ctx, name)
    }

    /// Unload a plugin.
    pub fn unload_plugin(&mut self, name: &str) -> Result<()> {
        self.manager.unload(&mut self.ctx, name)
    }

    /// Load and start a list of plugins. See [`PluginManager::load_list`].
    pub fn load_plugins(&mut self, list: &LoadList) -> Result<()> {
        self.manager.load_list(&mut self.ctx, list)
    }

    /// Load and start the list under the `plugins` settings key.
    pub fn load_plugins_from_settings(&mut self) -> Result<()> {
        let settings = self.ctx.settings();
        let Some(node) = settings.get_node(settings.root(), "plugins") else {
            warn!(game = %self.ctx.name, "no plugins listed in settings");
            return Ok(());
        };
        let list = LoadList::from_tree(settings, node)?;
        self.load_plugins(&list)
    }

    /// Set the game running.
    pub fn start(&mut self) {
        self.ctx.start();
    }

    /// Pause the game.
    pub fn pause(&mut self) {
        self.ctx.pause();
    }

    /// Terminate the game.
    pub fn exit(&mut self) {
        self.ctx.exit();
    }

    /// Unload every plugin. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.manager.core().is_none() {
            return;
        }
        info!(game = %self.ctx.name, "shutting down game");
        self.manager.shutdown(&mut self.ctx);
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("ctx", &self.ctx)
            .field("manager", &self.manager)
            .finish()
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.shutdown();
    }
}
