//! The node-comparison contract supplied by callers.

use core::fmt;
use core::hash::Hash;
use core::ops::Range;

/// Everything the engine needs to know about the two trees being diffed.
///
/// Nodes are opaque handles. One comparer serves both trees, so a handle
/// must identify a node unambiguously whether it comes from the old tree or
/// the new one (e.g. ids into a shared arena, or references).
///
/// # Preconditions
///
/// The engine does not verify these; an inconsistent comparer produces an
/// unspecified (but memory-safe) diff:
/// - `trees_equal`, `values_equal` and `distance` are symmetric and
///   deterministic;
/// - `trees_equal(a, b)` implies `values_equal(a, b)` and `label(a) == label(b)`;
/// - no method mutates either tree while a diff runs.
///
/// Comparers used with [`diff_batch`](crate::diff_batch) must also be `Sync`.
pub trait TreeComparer {
    /// Opaque node handle.
    type Node: Copy + Eq + Hash + fmt::Debug;

    /// Syntactic kind of a node. Only nodes with equal labels are ever
    /// paired, except for the two roots.
    type Label: Eq + Hash + Clone + fmt::Debug;

    /// Ordered children of a node.
    fn children(&self, node: Self::Node) -> impl Iterator<Item = Self::Node> + '_;

    /// The node's label.
    fn label(&self, node: Self::Node) -> Self::Label;

    /// Whether the two subtrees are identical, descendants included.
    fn trees_equal(&self, old: Self::Node, new: Self::Node) -> bool;

    /// Whether the nodes themselves carry the same value, ignoring children.
    ///
    /// A matched pair whose values differ is reported as an
    /// [`Edit::Update`](crate::Edit::Update).
    fn values_equal(&self, old: Self::Node, new: Self::Node) -> bool;

    /// How different two nodes are, from `0.0` (identical) to `1.0`
    /// (unrelated). Only called for nodes with equal labels.
    fn distance(&self, old: Self::Node, new: Self::Node) -> f64;

    /// Source range of a node, for diagnostics only.
    fn span(&self, _node: Self::Node) -> Option<Range<usize>> {
        None
    }

    /// Whether `old` and `new` are close enough to be the same entity.
    fn is_same_entity(&self, old: Self::Node, new: Self::Node, max_distance: f64) -> bool {
        self.label(old) == self.label(new) && self.distance(old, new) <= max_distance
    }
}
