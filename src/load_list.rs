//! Ordered lists of plugins to bring up together.

use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::ptree::{NodeId, PropertyTree};
use crate::version::{Version, VersionPolicy};

/// One requested plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PluginSpec {
    /// Plugin name, matched as a substring of module file names.
    pub name: String,
    /// Requested version.
    pub version: Version,
    /// How candidate versions are matched against `version`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub version_policy: VersionPolicy,
    /// Whether a load failure is skipped instead of failing the list.
    #[cfg_attr(feature = "serde", serde(default))]
    pub optional: bool,
}

impl PluginSpec {
    /// Request `name` at minimum `version`, required.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            version_policy: VersionPolicy::default(),
            optional: false,
        }
    }

    /// Set the version policy.
    pub fn with_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    /// Mark the plugin optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Plugins in the order they are loaded and started.
///
/// Dependencies are not inferred: a plugin must come after the plugins it
/// uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadList {
    #[cfg_attr(feature = "serde", serde(default))]
    plugins: Vec<PluginSpec>,
}

impl LoadList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin.
    pub fn with(mut self, spec: PluginSpec) -> Self {
        self.plugins.push(spec);
        self
    }

    /// Append a plugin.
    pub fn push(&mut self, spec: PluginSpec) {
        self.plugins.push(spec);
    }

    /// Iterate in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, PluginSpec> {
        self.plugins.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Read a list from a settings node whose children are the list indices
    /// `"0"`, `"1"`, ...
    ///
    /// Each entry needs `name` and `version`; `version_policy` defaults to
    /// `minimum` and `optional` to false. Entries with missing keys or bad
    /// values are logged and skipped. A gap in the indices is an error.
    pub fn from_tree(tree: &PropertyTree<String>, node: NodeId) -> Result<Self> {
        if !tree.contains(node) {
            return Err(Error::NodeNotFound(node.to_string()));
        }

        let mut list = Self::new();
        let count = tree.children(node).count();
        for index in 0..count {
            let key = index.to_string();
            let Some(entry) = tree.get_node(node, &key) else {
                error!(
                    index,
                    "failed to get list entry, are you sure you're using lists correctly?"
                );
                return Err(Error::MissingKey(format!("{}.{}", tree.path(node), key)));
            };
            if let Some(spec) = spec_from_node(tree, entry) {
                list.push(spec);
            }
        }
        Ok(list)
    }

    /// Parse from TOML with a `[[plugins]]` array.
    #[cfg(feature = "serde")]
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Parse from JSON of the form `{"plugins": [...]}`.
    #[cfg(feature = "serde")]
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

impl<'a> IntoIterator for &'a LoadList {
    type Item = &'a PluginSpec;
    type IntoIter = std::slice::Iter<'a, PluginSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<PluginSpec> for LoadList {
    fn from_iter<I: IntoIterator<Item = PluginSpec>>(iter: I) -> Self {
        Self {
            plugins: iter.into_iter().collect(),
        }
    }
}

fn spec_from_node(tree: &PropertyTree<String>, entry: NodeId) -> Option<PluginSpec> {
    let Some(name) = tree.get_value(entry, "name") else {
        error!("key \"name\" isn't defined for plugin");
        return None;
    };
    let Some(version) = tree.get_value(entry, "version") else {
        error!(plugin = %name, "key \"version\" isn't defined for plugin");
        return None;
    };
    let version = match Version::parse(version) {
        Ok(version) => version,
        Err(_) => {
            error!(
                plugin = %name,
                version = %version,
                "version string is invalid, should be major.minor.patch"
            );
            return None;
        }
    };
    let version_policy = match tree.get_value(entry, "version_policy") {
        Some(policy) => match policy.parse() {
            Ok(policy) => policy,
            Err(e) => {
                error!(plugin = %name, "{}", e);
                return None;
            }
        },
        None => {
            warn!(
                plugin = %name,
                "key \"version_policy\" isn't defined for plugin, using default \"minimum\""
            );
            VersionPolicy::Minimum
        }
    };
    let optional = tree
        .get_value(entry, "optional")
        .is_some_and(|value| parse_bool(value));

    Some(PluginSpec {
        name: name.clone(),
        version,
        version_policy,
        optional,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}
