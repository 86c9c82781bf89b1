//! A ready-made arena forest implementing [`TreeComparer`].
//!
//! Old and new trees live in the same [`Forest`] as separate roots, so a
//! [`NodeId`] identifies a node unambiguously on either side of a diff.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Range;

use indextree::{Arena, NodeId};
use rapidhash::{RapidHashMap as HashMap, RapidHasher};

use crate::comparer::TreeComparer;
use crate::lcs::Lcs;

/// Merkle hash of a subtree: label, value and the hashes of all children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHash(pub u64);

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Data stored for each node of a [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData<L, V> {
    /// Syntactic kind
    pub label: L,
    /// The node's own value (e.g. an identifier or a literal)
    pub value: V,
    /// Source range, for diagnostics
    pub span: Option<Range<usize>>,
}

impl<L, V> NodeData<L, V> {
    /// Node data without a span.
    pub fn new(label: L, value: V) -> Self {
        Self {
            label,
            value,
            span: None,
        }
    }

    /// Attach a source range.
    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }
}

/// Any number of trees sharing one arena.
#[derive(Debug, Clone)]
pub struct Forest<L, V> {
    arena: Arena<NodeData<L, V>>,
    /// Every node in creation order; a child is always created after its parent
    nodes: Vec<NodeId>,
}

impl<L, V> Default for Forest<L, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, V> Forest<L, V> {
    /// An empty forest.
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            nodes: Vec::new(),
        }
    }

    /// Start a new tree.
    pub fn add_root(&mut self, data: NodeData<L, V>) -> NodeId {
        let id = self.arena.new_node(data);
        self.nodes.push(id);
        id
    }

    /// Append a child as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData<L, V>) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        self.nodes.push(id);
        id
    }

    /// Data of a node.
    ///
    /// # Panics
    ///
    /// If `id` does not belong to this forest.
    pub fn get(&self, id: NodeId) -> &NodeData<L, V> {
        self.arena[id].get()
    }

    /// Parent of a node, `None` for roots.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of nodes across all trees.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<L: Hash, V: Hash> Forest<L, V> {
    /// Hash every node and return a comparer over this forest.
    ///
    /// The forest is borrowed immutably for the comparer's lifetime, so the
    /// hashes cannot go stale.
    pub fn comparer(&self) -> ForestComparer<'_, L, V> {
        let mut hashes: HashMap<NodeId, NodeHash> = HashMap::default();
        hashes.reserve(self.nodes.len());

        // Children are created after their parent: reverse creation order
        // hashes every child before its parent.
        for &id in self.nodes.iter().rev() {
            let data = self.get(id);
            let mut hasher = RapidHasher::default();
            data.label.hash(&mut hasher);
            data.value.hash(&mut hasher);
            for child in self.children(id) {
                hashes[&child].0.hash(&mut hasher);
            }
            hashes.insert(id, NodeHash(hasher.finish()));
        }

        ForestComparer {
            forest: self,
            hashes,
        }
    }
}

/// [`TreeComparer`] over a [`Forest`].
///
/// - `trees_equal`: equal Merkle hashes;
/// - `values_equal`: equal label and value;
/// - `distance`: half from the value (0 or 1), half from the LCS distance of
///   the children under `trees_equal`.
pub struct ForestComparer<'f, L, V> {
    forest: &'f Forest<L, V>,
    hashes: HashMap<NodeId, NodeHash>,
}

impl<L, V> ForestComparer<'_, L, V> {
    /// Merkle hash of the subtree under `id`.
    pub fn hash(&self, id: NodeId) -> NodeHash {
        self.hashes[&id]
    }
}

impl<L, V> TreeComparer for ForestComparer<'_, L, V>
where
    L: Eq + Hash + Clone + fmt::Debug,
    V: Eq + Hash,
{
    type Node = NodeId;
    type Label = L;

    fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.forest.children(node)
    }

    fn label(&self, node: NodeId) -> L {
        self.forest.get(node).label.clone()
    }

    fn trees_equal(&self, old: NodeId, new: NodeId) -> bool {
        self.hashes[&old] == self.hashes[&new] && self.values_equal(old, new)
    }

    fn values_equal(&self, old: NodeId, new: NodeId) -> bool {
        let (old, new) = (self.forest.get(old), self.forest.get(new));
        old.label == new.label && old.value == new.value
    }

    fn distance(&self, old: NodeId, new: NodeId) -> f64 {
        if self.trees_equal(old, new) {
            return 0.0;
        }
        let value_distance = if self.values_equal(old, new) { 0.0 } else { 1.0 };
        let old_kids: Vec<NodeId> = self.forest.children(old).collect();
        let new_kids: Vec<NodeId> = self.forest.children(new).collect();
        let children = Lcs::new(old_kids.len(), new_kids.len(), |i, j| {
            self.hashes[&old_kids[i]] == self.hashes[&new_kids[j]]
        });
        0.5 * value_distance + 0.5 * children.distance()
    }

    fn span(&self, node: NodeId) -> Option<Range<usize>> {
        self.forest.get(node).span.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_identical_subtrees_hash_equal() {
        let mut forest: Forest<&'static str, i64> = Forest::new();
        let a = forest.add_root(NodeData::new("block", 0));
        forest.add_child(a, NodeData::new("int", 1));
        let b = forest.add_root(NodeData::new("block", 0));
        forest.add_child(b, NodeData::new("int", 1));

        let comparer = forest.comparer();
        assert_eq!(comparer.hash(a), comparer.hash(b));
        assert!(comparer.trees_equal(a, b));
        assert_eq!(comparer.distance(a, b), 0.0);
    }

    #[test]
    fn test_child_value_changes_parent_hash() {
        let mut forest: Forest<&'static str, i64> = Forest::new();
        let a = forest.add_root(NodeData::new("block", 0));
        forest.add_child(a, NodeData::new("int", 1));
        let b = forest.add_root(NodeData::new("block", 0));
        forest.add_child(b, NodeData::new("int", 2));

        let comparer = forest.comparer();
        assert_ne!(comparer.hash(a), comparer.hash(b));
        assert!(!comparer.trees_equal(a, b));
        assert!(comparer.values_equal(a, b));
        // Same value, no child in common.
        assert_eq!(comparer.distance(a, b), 0.5);
    }

    #[test]
    fn test_leaf_with_new_value_is_half_distant() {
        let mut forest: Forest<&'static str, &'static str> = Forest::new();
        let a = forest.add_root(NodeData::new("decl", "int i = 1;"));
        let b = forest.add_root(NodeData::new("decl", "int i = 2;"));

        let comparer = forest.comparer();
        assert!(!comparer.values_equal(a, b));
        assert_eq!(comparer.distance(a, b), 0.5);
        assert!(comparer.is_same_entity(a, b, 0.5));
        assert!(!comparer.is_same_entity(a, b, 0.4));
    }

    #[test]
    fn test_span_and_structure_accessors() {
        let mut forest: Forest<&'static str, ()> = Forest::new();
        let root = forest.add_root(NodeData::new("file", ()).with_span(0..20));
        let child = forest.add_child(root, NodeData::new("item", ()).with_span(4..9));

        assert_eq!(forest.node_count(), 2);
        assert_eq!(forest.parent(child), Some(root));
        assert_eq!(forest.parent(root), None);

        let comparer = forest.comparer();
        assert_eq!(comparer.span(child), Some(4..9));
        assert_eq!(comparer.label(child), "item");
        assert_eq!(comparer.children(root).collect::<Vec<_>>(), vec![child]);
    }
}
