//! # lightship-runtime
//!
//! Plugin hosting runtime for the lightship game framework.
//!
//! This crate provides:
//! - **Plugin Discovery** - Pick a module file by name and embedded version,
//!   with exact or minimum version matching
//! - **Lifecycle Management** - Load, start, stop and unload plugins through
//!   their `plugin_init`, `plugin_start`, `plugin_stop` and `plugin_deinit`
//!   entry points
//! - **Bulk Loading** - Bring up an ordered list of plugins with required and
//!   optional entries
//! - **Service Registry** - Named, typed functions published by plugins
//! - **Event Registry** - Named events with per-plugin listeners
//! - **Property Tree** - Hashed, dotted-path settings tree
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lightship_runtime::{Game, GameConfig, LoadList, PluginSpec, Version};
//!
//! let mut game = Game::new(GameConfig::new().with_name("demo"))?;
//!
//! let list = LoadList::new()
//!     .with(PluginSpec::new("main_loop", Version::new(0, 0, 1)))
//!     .with(PluginSpec::new("input", Version::new(0, 1, 0)).optional());
//! game.load_plugins(&list)?;
//!
//! game.start();
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): TOML and JSON load lists, TOML settings files
//! - `fault-injection`: Simulated allocation failures for rollback testing

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod error;
mod events;
mod game;
mod hash;
mod lifecycle;
mod load_list;
mod loader;
mod manager;
mod map;
mod plugin;
mod ptree;
mod services;
mod version;

#[cfg(any(test, feature = "fault-injection"))]
pub mod fault;
#[cfg(not(any(test, feature = "fault-injection")))]
mod fault;

#[cfg(feature = "serde")]
pub mod settings;

pub use error::{Error, ErrorKind, Result};
pub use events::{typed, Event, EventRegistry, Listener};
pub use game::{
    Game, GameConfig, GameContext, GameControl, GameState, LogRecord, NetworkRole, Stats,
    EVENT_LOG, EVENT_LOG_INDENT, EVENT_LOG_UNINDENT, EVENT_PAUSE, EVENT_RENDER, EVENT_START,
    EVENT_STATS, EVENT_STOP, EVENT_TICK, SERVICE_EXIT, SERVICE_PAUSE, SERVICE_START,
};
pub use hash::{hash_str, in_namespace, namespace_of, qualified_name, Hash, BUILTIN_NAMESPACE};
pub use lifecycle::{LifecycleEvent, LifecycleHooks, LifecycleState, Transition};
pub use load_list::{LoadList, PluginSpec};
pub use loader::{
    DeinitFn, DirectoryProvider, EntryPoints, InitFn, Module, ModuleProvider, StartFn,
    StaticModule, StaticProvider, StopFn, PLUGIN_DEINIT, PLUGIN_INIT, PLUGIN_START, PLUGIN_STOP,
};
pub use manager::{ManagerConfig, PluginManager, CORE_PLUGIN_NAME};
pub use map::OrderedMap;
pub use plugin::{Language, Plugin, PluginInfo};
pub use ptree::{Duplicator, NodeId, NodeValue, PropertyTree};
pub use services::{Service, ServiceRegistry};
pub use version::{Version, VersionPolicy};

/// Crate version for compatibility checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
