use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use eframe::egui::Vec2;

use super::config::EvictionPolicy;
use super::error::{GraphError, GraphResult};
use super::model::{ChildDescriptor, DisplayData, NodeDescriptor};
use super::render::ConnectorHandle;

/// Generation-checked handle to a live node.
///
/// A key outlives the node it names; lookups through a stale key fail instead
/// of aliasing whatever node reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchTicket(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisualState {
    #[default]
    Idle,
    Trailing,
    Selected,
}

impl VisualState {
    #[cfg(test)]
    pub fn is_on_trail(self) -> bool {
        matches!(self, Self::Trailing | Self::Selected)
    }
}

#[derive(Clone, Debug, Default)]
pub enum ChildCache {
    #[default]
    Unfetched,
    Pending(FetchTicket),
    Resolved(Arc<[ChildDescriptor]>),
}

impl ChildCache {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unfetched => "unfetched",
            Self::Pending(_) => "pending",
            Self::Resolved(_) => "resolved",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub kind: Option<String>,
    pub display: DisplayData,
    pub label: String,
    pub line_colour: String,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    pub cache: ChildCache,
    pub angle_from_parent: f64,
    pub resting_distance: f64,
    pub distance_from_parent: f64,
    /// Logical displacement from the parent; the root keeps `Vec2::ZERO`.
    pub offset: Vec2,
    pub half_extent: Vec2,
    pub visual_state: VisualState,
    pub connector: Option<ConnectorHandle>,
    pub depth: usize,
}

impl Node {
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn title(&self) -> &str {
        self.display
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(self.id.as_str())
    }
}

/// Everything the registry needs to create one node.
pub struct NodeSeed<'a> {
    pub id: &'a str,
    pub kind: Option<&'a str>,
    pub display: &'a DisplayData,
    pub label: String,
    pub line_colour: String,
    pub half_extent: Vec2,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Sole owner of the node tree.
#[derive(Default)]
pub struct NodeRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeKey>,
    retained: HashMap<String, Arc<[ChildDescriptor]>>,
    live: usize,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn node(&self, key: NodeKey) -> GraphResult<&Node> {
        self.get(key)
            .ok_or_else(|| GraphError::UnknownNode(key.to_string()))
    }

    pub fn node_mut(&mut self, key: NodeKey) -> GraphResult<&mut Node> {
        self.get_mut(key)
            .ok_or_else(|| GraphError::UnknownNode(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.get(key).and_then(Node::parent)
    }

    /// Keys from the root down to `key`, inclusive.
    pub fn path_from_root(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut path = Vec::new();
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            if !self.contains(current) {
                break;
            }
            path.push(current);
            cursor = self.parent(current);
        }
        path.reverse();
        path
    }

    /// Logical world position, summing offsets up the ancestor chain.
    pub fn absolute_position(&self, key: NodeKey) -> Option<Vec2> {
        let mut node = self.get(key)?;
        let mut position = node.offset;
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            position += node.offset;
        }
        Some(position)
    }

    /// All live descendants of `key`, parents before children.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = self
            .get(key)
            .map(|node| node.children.iter().rev().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    #[cfg(test)]
    pub fn retained(&self, id: &str) -> Option<Arc<[ChildDescriptor]>> {
        self.retained.get(id).cloned()
    }

    fn insert(&mut self, node: Node) -> NodeKey {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeKey {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeKey {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn take(&mut self, key: NodeKey) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.live -= 1;
        Some(node)
    }

    fn build_node(seed: NodeSeed<'_>, parent: Option<NodeKey>, depth: usize) -> Node {
        Node {
            id: seed.id.to_owned(),
            kind: seed.kind.map(str::to_owned),
            display: seed.display.clone(),
            label: seed.label,
            line_colour: seed.line_colour,
            parent,
            children: Vec::new(),
            cache: ChildCache::Unfetched,
            angle_from_parent: 0.0,
            resting_distance: 0.0,
            distance_from_parent: 0.0,
            offset: Vec2::ZERO,
            half_extent: seed.half_extent,
            visual_state: VisualState::Idle,
            connector: None,
            depth,
        }
    }

    /// Create the root from its fetched descriptor. Any previous tree is
    /// dropped and returned so the caller can release its render handles.
    pub fn create_root(
        &mut self,
        seed: NodeSeed<'_>,
        descriptor: &NodeDescriptor,
        eviction: EvictionPolicy,
    ) -> (NodeKey, Vec<(NodeKey, Node)>) {
        let previous = self.clear();
        let mut node = Self::build_node(seed, None, 0);
        let children: Arc<[ChildDescriptor]> = descriptor.children.clone().into();
        if eviction == EvictionPolicy::Retain {
            self.retained.insert(node.id.clone(), Arc::clone(&children));
        }
        node.cache = ChildCache::Resolved(children);
        let key = self.insert(node);
        self.root = Some(key);
        (key, previous)
    }

    /// Create the children of `parent` that do not exist yet.
    ///
    /// Descriptors whose id matches a live child, or an earlier descriptor in
    /// the same batch, are skipped. Returns only the newly created keys, each
    /// paired with the descriptor it came from. Under
    /// [`EvictionPolicy::Retain`] a new node starts out with the children
    /// kept from an earlier fetch of its id.
    pub fn materialize_children<'d>(
        &mut self,
        parent: NodeKey,
        descriptors: &'d [ChildDescriptor],
        eviction: EvictionPolicy,
        mut seed_for: impl FnMut(&'d ChildDescriptor) -> NodeSeed<'d>,
    ) -> GraphResult<Vec<(NodeKey, &'d ChildDescriptor)>> {
        let parent_node = self.node(parent)?;
        let depth = parent_node.depth + 1;
        let mut seen = parent_node
            .children
            .iter()
            .filter_map(|&child| self.get(child).map(|node| node.id.clone()))
            .collect::<HashSet<_>>();

        let mut created = Vec::new();
        for descriptor in descriptors {
            if !seen.insert(descriptor.uid.clone()) {
                continue;
            }

            let mut node = Self::build_node(seed_for(descriptor), Some(parent), depth);
            if eviction == EvictionPolicy::Retain
                && let Some(children) = self.retained.get(&node.id)
            {
                node.cache = ChildCache::Resolved(Arc::clone(children));
            }
            let key = self.insert(node);
            created.push((key, descriptor));
        }

        let parent_node = self.node_mut(parent)?;
        parent_node
            .children
            .extend(created.iter().map(|(key, _)| *key));
        Ok(created)
    }

    /// Store fetched children for `key`.
    pub fn resolve(
        &mut self,
        key: NodeKey,
        children: Vec<ChildDescriptor>,
        eviction: EvictionPolicy,
    ) -> GraphResult<Arc<[ChildDescriptor]>> {
        let children: Arc<[ChildDescriptor]> = children.into();
        let node = self.node_mut(key)?;
        node.cache = ChildCache::Resolved(Arc::clone(&children));
        let id = node.id.clone();
        if eviction == EvictionPolicy::Retain {
            self.retained.insert(id, Arc::clone(&children));
        }
        Ok(children)
    }

    /// Tear down every descendant of `key`; `key` itself stays live.
    ///
    /// Under [`EvictionPolicy::Discard`] the node forgets its resolved
    /// children so the next expansion fetches again.
    pub fn destroy_subtree(
        &mut self,
        key: NodeKey,
        eviction: EvictionPolicy,
    ) -> Vec<(NodeKey, Node)> {
        let doomed = self.descendants(key);
        let Some(node) = self.get_mut(key) else {
            return Vec::new();
        };
        node.children.clear();
        if eviction == EvictionPolicy::Discard && matches!(node.cache, ChildCache::Resolved(_)) {
            node.cache = ChildCache::Unfetched;
        }

        doomed
            .into_iter()
            .filter_map(|child| self.take(child).map(|node| (child, node)))
            .collect()
    }

    /// Remove `key` together with its subtree and unlink it from its parent.
    pub fn remove(&mut self, key: NodeKey) -> Vec<(NodeKey, Node)> {
        if !self.contains(key) {
            return Vec::new();
        }

        let mut removed = self.destroy_subtree(key, EvictionPolicy::Retain);
        if let Some(parent) = self.parent(key)
            && let Some(parent_node) = self.get_mut(parent)
        {
            parent_node.children.retain(|&child| child != key);
        }
        if self.root == Some(key) {
            self.root = None;
        }
        if let Some(node) = self.take(key) {
            removed.insert(0, (key, node));
        }
        removed
    }

    /// Drop the whole tree, keeping nothing but retained child data.
    pub fn clear(&mut self) -> Vec<(NodeKey, Node)> {
        match self.root {
            Some(root) => self.remove(root),
            None => Vec::new(),
        }
    }

    /// Drop every kept child list.
    pub fn forget_retained(&mut self) {
        self.retained.clear();
    }
}
