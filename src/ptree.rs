//! Hierarchical, dot-addressed property tree.
//!
//! Nodes live in an arena owned by the [`PropertyTree`] and are addressed by
//! [`NodeId`]. Each node keeps its children in an [`OrderedMap`] keyed by the
//! hash of the child's name, so resolving `"a.b.c"` costs one binary search
//! per segment.

use std::fmt;

use crate::error::{Error, Result};
use crate::fault;
use crate::hash::{hash_str, SEPARATOR};
use crate::map::OrderedMap;

/// Handle to a node inside a [`PropertyTree`].
///
/// Handles carry a generation, so a handle to a removed node never resolves
/// to whatever reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Clones a node value. Returning `None` reports failure.
pub type Duplicator<V> = fn(&V) -> Option<V>;

/// A value stored in a node, together with the function used to clone it.
pub struct NodeValue<V> {
    value: V,
    duplicator: Option<Duplicator<V>>,
}

impl<V> NodeValue<V> {
    /// Wrap a value that cannot be duplicated.
    pub fn new(value: V) -> Self {
        Self {
            value,
            duplicator: None,
        }
    }

    /// Wrap a value with an explicit duplicator.
    pub fn with_duplicator(value: V, duplicator: Duplicator<V>) -> Self {
        Self {
            value,
            duplicator: Some(duplicator),
        }
    }

    /// Borrow the value.
    pub fn get(&self) -> &V {
        &self.value
    }

    /// Mutably borrow the value.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Unwrap the value.
    pub fn into_inner(self) -> V {
        self.value
    }

    /// Whether [`PropertyTree::duplicate_tree`] can clone this value.
    pub fn is_duplicable(&self) -> bool {
        self.duplicator.is_some()
    }

    fn duplicate(&self) -> Option<Self> {
        let duplicator = self.duplicator?;
        Some(Self {
            value: duplicator(&self.value)?,
            duplicator: Some(duplicator),
        })
    }
}

impl<V: Clone> NodeValue<V> {
    /// Wrap a value that duplicates through [`Clone`].
    pub fn cloneable(value: V) -> Self {
        Self::with_duplicator(value, clone_value::<V>)
    }
}

fn clone_value<V: Clone>(value: &V) -> Option<V> {
    Some(value.clone())
}

impl<V: fmt::Debug> fmt::Debug for NodeValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeValue")
            .field("value", &self.value)
            .field("duplicable", &self.duplicator.is_some())
            .finish()
    }
}

struct Node<V> {
    name: String,
    value: Option<NodeValue<V>>,
    children: OrderedMap<NodeId>,
    parent: Option<NodeId>,
}

struct Slot<V> {
    generation: u32,
    node: Option<Node<V>>,
}

/// Arena-backed hierarchical value store.
pub struct PropertyTree<V> {
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
    root: NodeId,
    len: usize,
}

fn split_path(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split(SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidPath(key.to_string()));
    }
    Ok(segments)
}

impl<V> PropertyTree<V> {
    /// Create a tree whose root node is named `"root"`.
    pub fn new(value: Option<NodeValue<V>>) -> Self {
        Self::named("root", value)
    }

    fn named(name: &str, value: Option<NodeValue<V>>) -> Self {
        let root = Node {
            name: name.to_string(),
            value,
            children: OrderedMap::new(),
            parent: None,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            len: 1,
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether only the root is left and it holds no value.
    pub fn is_empty(&self) -> bool {
        self.len == 1 && self.value(self.root).is_none()
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    fn node(&self, id: NodeId) -> Option<&Node<V>> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<V>> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn node_or_err(&self, id: NodeId) -> Result<&Node<V>> {
        self.node(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut OrderedMap<NodeId>> {
        self.node_mut(id)
            .map(|node| &mut node.children)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn alloc(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        value: Option<NodeValue<V>>,
    ) -> Result<NodeId> {
        fault::check("PropertyTree::alloc")?;

        let node = Node {
            name: name.to_string(),
            value,
            children: OrderedMap::new(),
            parent,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.len += 1;
        Ok(id)
    }

    fn release(&mut self, id: NodeId) -> Option<Node<V>> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    /// Allocate a node and link it under `parent`.
    fn attach_new(
        &mut self,
        parent: NodeId,
        name: &str,
        value: Option<NodeValue<V>>,
    ) -> Result<NodeId> {
        let id = self.alloc(name, Some(parent), value)?;
        let linked = self
            .children_mut(parent)
            .and_then(|children| children.insert(hash_str(name), id));
        if let Err(e) = linked {
            self.release(id);
            return Err(e);
        }
        Ok(id)
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let Some(parent) = node.parent.take() else {
            return;
        };
        let key = hash_str(&node.name);
        if let Some(parent) = self.node_mut(parent) {
            parent.children.erase(key);
        }
    }

    fn destroy_subtree(&mut self, id: NodeId) {
        self.unlink(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.release(next) {
                stack.extend(node.children.values().copied());
            }
        }
    }

    /// Every node of the subtree at `id`, parents before children.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.node(next) {
                order.push(next);
                stack.extend(node.children.values().copied());
            }
        }
        order
    }

    fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        let id = *self.node(parent)?.children.find(hash_str(segment))?;
        (self.node(id)?.name == segment).then_some(id)
    }

    /// Create the node at the dotted `key` below `parent`, creating missing
    /// intermediate nodes on the way.
    ///
    /// Fails if the leaf already exists. On failure every intermediate node
    /// created by this call is removed again.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        key: &str,
        value: Option<NodeValue<V>>,
    ) -> Result<NodeId> {
        self.node_or_err(parent)?;
        let segments = split_path(key)?;
        let Some((leaf, path)) = segments.split_last() else {
            return Err(Error::InvalidPath(key.to_string()));
        };

        let mut current = parent;
        let mut first_created = None;
        for segment in path {
            current = match self.child(current, segment) {
                Some(existing) => existing,
                None => match self.attach_new(current, segment, None) {
                    Ok(id) => {
                        first_created.get_or_insert(id);
                        id
                    }
                    Err(e) => {
                        self.rollback(first_created);
                        return Err(e);
                    }
                },
            };
        }

        let exists = self
            .node(current)
            .is_some_and(|node| node.children.contains(hash_str(leaf)));
        if exists {
            self.rollback(first_created);
            return Err(Error::NodeExists(key.to_string()));
        }

        self.attach_new(current, leaf, value).map_err(|e| {
            self.rollback(first_created);
            e
        })
    }

    fn rollback(&mut self, first_created: Option<NodeId>) {
        if let Some(id) = first_created {
            self.destroy_subtree(id);
        }
    }

    /// Resolve the dotted `key` starting at `from`.
    pub fn get_node(&self, from: NodeId, key: &str) -> Option<NodeId> {
        self.node(from)?;
        let segments = split_path(key).ok()?;
        segments
            .into_iter()
            .try_fold(from, |current, segment| self.child(current, segment))
    }

    /// Resolve the dotted `key` starting at `from` and borrow its value.
    pub fn get_value(&self, from: NodeId, key: &str) -> Option<&V> {
        self.get_node(from, key).and_then(|id| self.value(id))
    }

    /// Borrow the value of `id`.
    pub fn value(&self, id: NodeId) -> Option<&V> {
        self.node(id)?.value.as_ref().map(NodeValue::get)
    }

    /// Mutably borrow the value of `id`.
    pub fn value_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.node_mut(id)?.value.as_mut().map(NodeValue::get_mut)
    }

    /// Replace the value of `id`, returning the previous one.
    pub fn set_value(
        &mut self,
        id: NodeId,
        value: Option<NodeValue<V>>,
    ) -> Result<Option<NodeValue<V>>> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        Ok(std::mem::replace(&mut node.value, value))
    }

    /// Move the value out of `id`.
    pub fn take_value(&mut self, id: NodeId) -> Option<NodeValue<V>> {
        self.node_mut(id)?.value.take()
    }

    /// Name of `id` (its key in the parent).
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|node| node.name.as_str())
    }

    /// Parent of `id`; `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Children of `id`, in hash order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.children.values().copied())
    }

    /// Dotted path from the root to `id`. The root itself yields its name.
    pub fn path(&self, id: NodeId) -> String {
        if id == self.root {
            return self.name(id).unwrap_or_default().to_string();
        }
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            if next == self.root {
                break;
            }
            let Some(node) = self.node(next) else {
                break;
            };
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Whether `ancestor` lies on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.parent(next);
        }
        false
    }

    /// Destroy `id` with its subtree, then prune ancestors left without
    /// children or value.
    ///
    /// Removing the root clears the tree instead; the root itself survives.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node_or_err(id)?.parent;

        if id == self.root {
            let children: Vec<NodeId> = self.children(id).collect();
            for child in children {
                self.destroy_subtree(child);
            }
            if let Some(root) = self.node_mut(id) {
                root.value = None;
            }
            return Ok(());
        }

        self.destroy_subtree(id);
        if let Some(parent) = parent {
            self.prune_upwards(parent);
        }
        Ok(())
    }

    fn prune_upwards(&mut self, mut id: NodeId) {
        while id != self.root {
            let Some(node) = self.node(id) else {
                break;
            };
            if !node.children.is_empty() || node.value.is_some() {
                break;
            }
            let parent = node.parent;
            self.destroy_subtree(id);
            match parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
    }

    /// Move `node` under `new_parent`, naming it `key`.
    ///
    /// Rejected without any change if `new_parent` is `node` or one of its
    /// descendants, or if `new_parent` already has a child called `key`.
    pub fn set_parent(&mut self, node: NodeId, new_parent: NodeId, key: &str) -> Result<()> {
        let current = self.node_or_err(node)?;
        let old_parent = current.parent;
        let old_name = current.name.clone();
        self.node_or_err(new_parent)?;

        if key.is_empty() || key.contains(SEPARATOR) {
            return Err(Error::InvalidPath(key.to_string()));
        }
        if node == new_parent || self.is_ancestor(node, new_parent) {
            return Err(Error::CycleDetected {
                node: self.path(node),
                parent: self.path(new_parent),
            });
        }
        if old_parent == Some(new_parent) && old_name == key {
            return Ok(());
        }

        self.children_mut(new_parent)?
            .insert(hash_str(key), node)
            .map_err(|e| match e {
                Error::DuplicateKey(_) => Error::NodeExists(key.to_string()),
                other => other,
            })?;

        if let Some(old_parent) = old_parent {
            if let Some(parent) = self.node_mut(old_parent) {
                parent.children.erase(hash_str(&old_name));
            }
        }
        if let Some(moved) = self.node_mut(node) {
            moved.parent = Some(new_parent);
            moved.name = key.to_string();
        }
        Ok(())
    }

    fn duplicate_value(&self, id: NodeId) -> Result<Option<NodeValue<V>>> {
        let node = self.node_or_err(id)?;
        node.value
            .as_ref()
            .map(|value| {
                value
                    .duplicate()
                    .ok_or_else(|| Error::DuplicationFailed(self.path(id)))
            })
            .transpose()
    }

    /// Deep-clone the subtree at `source` into a new tree.
    ///
    /// Every valued node needs a duplicator. The source is never modified;
    /// a partially built clone is dropped on failure.
    pub fn duplicate_tree(&self, source: NodeId) -> Result<PropertyTree<V>> {
        let order = self.subtree(source);
        if order.is_empty() {
            return Err(Error::NodeNotFound(source.to_string()));
        }
        for &id in &order {
            let undup = self
                .node(id)
                .and_then(|node| node.value.as_ref())
                .is_some_and(|value| !value.is_duplicable());
            if undup {
                return Err(Error::NotDuplicable(self.path(id)));
            }
        }

        let name = self.node_or_err(source)?.name.clone();
        let mut clone = PropertyTree::named(&name, self.duplicate_value(source)?);
        let mut pending = vec![(source, clone.root)];
        while let Some((from, to)) = pending.pop() {
            for child in self.children(from) {
                let name = self.node_or_err(child)?.name.clone();
                let value = self.duplicate_value(child)?;
                let copy = clone.attach_new(to, &name, value)?;
                pending.push((child, copy));
            }
        }
        Ok(clone)
    }

    /// Move every node of `other` below `parent`; `other`'s root becomes the
    /// child `key`.
    ///
    /// Either the whole tree is attached or nothing is.
    pub fn graft(&mut self, parent: NodeId, key: &str, mut other: PropertyTree<V>) -> Result<NodeId> {
        self.node_or_err(parent)?;
        if key.is_empty() || key.contains(SEPARATOR) {
            return Err(Error::InvalidPath(key.to_string()));
        }
        if self.node_or_err(parent)?.children.contains(hash_str(key)) {
            return Err(Error::NodeExists(key.to_string()));
        }

        let mut created = Vec::new();
        let result = self.graft_nodes(&mut other, parent, key, &mut created);
        if result.is_err() {
            for id in created.into_iter().rev() {
                self.release(id);
            }
        }
        result
    }

    fn graft_nodes(
        &mut self,
        other: &mut PropertyTree<V>,
        parent: NodeId,
        key: &str,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        let other_root = other.root;
        let top = self.alloc(key, Some(parent), other.take_value(other_root))?;
        created.push(top);

        let mut pending = vec![(other_root, top)];
        while let Some((from, to)) = pending.pop() {
            let children: Vec<NodeId> = other.children(from).collect();
            for child in children {
                let Some(node) = other.node_mut(child) else {
                    continue;
                };
                let name = node.name.clone();
                let value = node.value.take();
                let copy = self.alloc(&name, Some(to), value)?;
                created.push(copy);
                self.children_mut(to)?.insert(hash_str(&name), copy)?;
                pending.push((child, copy));
            }
        }

        self.children_mut(parent)?.insert(hash_str(key), top)?;
        Ok(top)
    }

    /// Remove every non-root node that has neither children nor a value.
    ///
    /// Returns the number of nodes removed.
    pub fn cleanup(&mut self) -> usize {
        let order = self.subtree(self.root);
        let mut removed = 0;
        for id in order.into_iter().rev() {
            if id == self.root {
                continue;
            }
            let prunable = self
                .node(id)
                .is_some_and(|node| node.children.is_empty() && node.value.is_none());
            if prunable {
                self.destroy_subtree(id);
                removed += 1;
            }
        }
        removed
    }
}

impl<V> fmt::Debug for PropertyTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyTree")
            .field("root", &self.name(self.root))
            .field("len", &self.len)
            .finish()
    }
}
