//! Game settings loaded into a property tree.
//!
//! Tables become nodes, arrays become nodes whose children are named
//! `"0"`, `"1"`, ..., and every scalar is stored as its string form.
//!
//! Every key becomes one path segment, so quoted keys that are empty or
//! contain `.` are rejected instead of being split into nested nodes.

use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::SEPARATOR;
use crate::ptree::{NodeId, NodeValue, PropertyTree};

/// Parse a TOML document into a settings tree.
pub fn from_toml(content: &str) -> Result<PropertyTree<String>> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;

    let mut tree = PropertyTree::new(None);
    let root = tree.root();
    for (key, value) in &table {
        insert(&mut tree, root, key, value)?;
    }
    Ok(tree)
}

/// Read and parse a TOML settings file.
pub fn from_file(path: impl AsRef<Path>) -> Result<PropertyTree<String>> {
    let content = std::fs::read_to_string(path)?;
    from_toml(&content)
}

fn insert(
    tree: &mut PropertyTree<String>,
    parent: NodeId,
    key: &str,
    value: &toml::Value,
) -> Result<()> {
    if key.is_empty() || key.contains(SEPARATOR) {
        return Err(Error::ConfigParse(format!(
            "settings key \"{}\" under \"{}\" must be non-empty and must not contain '{}'",
            key,
            tree.path(parent),
            SEPARATOR
        )));
    }

    match value {
        toml::Value::Table(table) => {
            let node = tree.add_node(parent, key, None)?;
            for (child_key, child) in table {
                insert(tree, node, child_key, child)?;
            }
        }
        toml::Value::Array(items) => {
            let node = tree.add_node(parent, key, None)?;
            for (index, item) in items.iter().enumerate() {
                insert(tree, node, &index.to_string(), item)?;
            }
        }
        toml::Value::String(s) => {
            tree.add_node(parent, key, Some(NodeValue::cloneable(s.clone())))?;
        }
        scalar => {
            tree.add_node(parent, key, Some(NodeValue::cloneable(scalar.to_string())))?;
        }
    }
    Ok(())
}
