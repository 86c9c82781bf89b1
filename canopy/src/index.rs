//! Flattened view of one tree: pre-order, parents and children, built
//! without recursion so deep trees cannot overflow the stack.

use core::hash::Hash;
use rapidhash::RapidHashMap as HashMap;

use crate::comparer::TreeComparer;

/// Traversal and parent lookups for the tree under one root.
#[derive(Debug, Clone)]
pub struct TreeIndex<N> {
    root: N,
    pre_order: Vec<N>,
    parent: HashMap<N, N>,
    /// Every reachable node has an entry, leaves included.
    children: HashMap<N, Vec<N>>,
}

impl<N: Copy + Eq + Hash + core::fmt::Debug> TreeIndex<N> {
    /// Walk the tree under `root` once, through the comparer.
    ///
    /// # Panics
    ///
    /// If a node is reached twice: the comparer's `children` must describe a
    /// tree, not a DAG or a cyclic graph.
    pub fn build<C>(comparer: &C, root: N) -> Self
    where
        C: TreeComparer<Node = N>,
    {
        let mut index = Self {
            root,
            pre_order: Vec::new(),
            parent: HashMap::default(),
            children: HashMap::default(),
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            index.pre_order.push(node);
            let kids: Vec<N> = comparer.children(node).collect();
            for &child in &kids {
                let seen = child == root || index.parent.insert(child, node).is_some();
                assert!(
                    !seen,
                    "node {:?} is reachable twice from root {:?}; children must form a tree",
                    child, root
                );
            }
            stack.extend(kids.iter().rev().copied());
            index.children.insert(node, kids);
        }

        index
    }

    /// The root this index was built from.
    pub fn root(&self) -> N {
        self.root
    }

    /// Whether `node` is reachable from the root.
    pub fn contains(&self, node: N) -> bool {
        self.children.contains_key(&node)
    }

    /// Parent of `node`, `None` for the root and for unknown nodes.
    pub fn parent(&self, node: N) -> Option<N> {
        self.parent.get(&node).copied()
    }

    /// Children of `node`, empty for leaves and unknown nodes.
    pub fn children(&self, node: N) -> &[N] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes in pre-order (parents first, siblings left-to-right).
    pub fn pre_order(&self) -> &[N] {
        &self.pre_order
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.pre_order.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.pre_order.is_empty()
    }
}
