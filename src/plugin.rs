//! Plugin metadata and the plugin object owned by the game.

use std::fmt;

use crate::lifecycle::LifecycleState;
use crate::loader::{EntryPoints, Module};
use crate::version::Version;

/// Language a plugin was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// Not reported.
    #[default]
    Unset,
    /// C.
    C,
    /// C++.
    Cpp,
    /// Rust.
    Rust,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::C => "c",
            Self::Cpp => "c++",
            Self::Rust => "rust",
        };
        f.write_str(name)
    }
}

/// Descriptive information a plugin reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginInfo {
    /// Plugin name. Unique among the plugins loaded into one game.
    pub name: String,
    /// Free-form category, e.g. `"graphics"`.
    pub category: String,
    /// Author.
    pub author: String,
    /// Short description.
    pub description: String,
    /// Project website.
    pub website: String,
    /// Version the running code reports.
    pub version: Version,
    /// Source language.
    pub language: Language,
}

impl PluginInfo {
    /// Create info with a name and version; everything else is empty.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            ..Self::default()
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the website.
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    /// Set the source language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// A plugin instance.
///
/// Created by the module's `plugin_init` entry point and owned by the plugin
/// manager from then on. The module the code came from is owned here too and
/// is taken out again right before `plugin_deinit` consumes the plugin.
pub struct Plugin {
    info: PluginInfo,
    state: LifecycleState,
    file: Option<String>,
    entry: Option<EntryPoints>,
    module: Option<Module>,
}

impl Plugin {
    /// Create a detached plugin object.
    pub fn new(info: PluginInfo) -> Self {
        Self {
            info,
            state: LifecycleState::Unloaded,
            file: None,
            entry: None,
            module: None,
        }
    }

    /// Plugin information.
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Mutable plugin information.
    pub fn info_mut(&mut self) -> &mut PluginInfo {
        &mut self.info
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Version the plugin reports.
    pub fn version(&self) -> Version {
        self.info.version
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// File the plugin was loaded from, once attached.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub(crate) fn entry_points(&self) -> Option<EntryPoints> {
        self.entry
    }

    pub(crate) fn attach(&mut self, file: String, module: Module, entry: EntryPoints) {
        self.file = Some(file);
        self.module = Some(module);
        self.entry = Some(entry);
        self.state = LifecycleState::Loaded;
    }

    pub(crate) fn take_module(&mut self) -> Option<Module> {
        self.module.take()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.info.name)
            .field("version", &self.info.version)
            .field("state", &self.state)
            .field("file", &self.file)
            .finish()
    }
}
