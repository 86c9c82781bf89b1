//! # Canopy
//!
//! LCS-driven tree differencing with move and reorder detection.
//!
//! Given two ordered labelled trees and a [`TreeComparer`] that knows how to
//! look at them, canopy computes a one-to-one [`Match`] between their nodes
//! and an edit script ([`Edit`]s) turning the old tree into the new one.
//!
//! ## Algorithm Overview
//!
//! 1. **Level alignment**: starting from the roots, the children of every
//!    matched pair are aligned with a longest common subsequence, first on
//!    identical subtrees, then on nodes that are the same entity.
//! 2. **Move pass**: nodes left unmatched are paired across positions, so a
//!    relocated subtree is reported as a move rather than a delete + insert.
//! 3. **Edit script generation**: a depth-first walk over the matched pairs
//!    emits `Insert`, `Delete`, `Update`, `Move` and `Reorder` operations.
//!
//! Long-running diffs can be stopped from another thread with a
//! [`CancellationToken`].
//!
//! ## Usage
//!
//! ```
//! use canopy::{CancellationToken, Edit, Forest, MatchingConfig, NodeData, diff_trees};
//!
//! let mut forest: Forest<&str, &str> = Forest::new();
//! let old = forest.add_root(NodeData::new("block", ""));
//! let before = forest.add_child(old, NodeData::new("stmt", "x = 1"));
//! let new = forest.add_root(NodeData::new("block", ""));
//! let after = forest.add_child(new, NodeData::new("stmt", "x = 2"));
//!
//! let ops = diff_trees(
//!     &forest.comparer(),
//!     old,
//!     new,
//!     &MatchingConfig::default(),
//!     &CancellationToken::new(),
//! )
//! .unwrap();
//! assert_eq!(ops, vec![Edit::Update { old: before, new: after }]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
use tracing_macros::{debug, trace};

mod cancel;
mod chawathe;
mod comparer;
mod edit;
mod error;
/// Traversal indexes over one tree
pub mod index;
/// Longest common subsequence over index ranges
pub mod lcs;
/// Node matching
pub mod matching;
/// Arena forest with a ready-made comparer
pub mod tree;

pub use cancel::CancellationToken;
pub use chawathe::generate_edit_script;
pub use comparer::TreeComparer;
pub use edit::{Edit, EditDisplay, EditKind};
pub use error::DiffError;
pub use lcs::{Lcs, SequenceEdit};
pub use matching::{Match, MatchingConfig, compute_match, compute_match_with_known};
pub use tree::{Forest, ForestComparer, NodeData, NodeHash};

use rayon::prelude::*;

/// Compute the edit script between the trees under `old_root` and `new_root`.
///
/// This is the main entry point. It:
/// 1. Computes a match between nodes (see [`compute_match`])
/// 2. Generates the edit script from it (see [`generate_edit_script`])
///
/// Returns [`DiffError::Cancelled`] if `cancel` fires before the diff is
/// complete; no partial script is returned.
pub fn diff_trees<C: TreeComparer>(
    comparer: &C,
    old_root: C::Node,
    new_root: C::Node,
    config: &MatchingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Edit<C::Node>>, DiffError> {
    let (ops, _matching) = diff_trees_with_match(comparer, old_root, new_root, config, cancel)?;
    Ok(ops)
}

/// Like [`diff_trees`], but also returns the node match.
///
/// Useful to map nodes the script does not mention (unchanged ones) from one
/// tree to the other.
pub fn diff_trees_with_match<C: TreeComparer>(
    comparer: &C,
    old_root: C::Node,
    new_root: C::Node,
    config: &MatchingConfig,
    cancel: &CancellationToken,
) -> Result<(Vec<Edit<C::Node>>, Match<C::Node>), DiffError> {
    let matching = compute_match(comparer, old_root, new_root, config, cancel)?;
    let ops = generate_edit_script(comparer, &matching, cancel)?;
    debug!(
        matched = matching.len(),
        ops = ops.len(),
        "diff_trees_with_match done"
    );
    Ok((ops, matching))
}

/// Diff many independent tree pairs in parallel.
///
/// Results come back in the order of `pairs`. One token cancels the whole
/// batch; diffs that already finished keep their scripts.
pub fn diff_batch<C>(
    comparer: &C,
    pairs: &[(C::Node, C::Node)],
    config: &MatchingConfig,
    cancel: &CancellationToken,
) -> Vec<Result<Vec<Edit<C::Node>>, DiffError>>
where
    C: TreeComparer + Sync,
    C::Node: Send + Sync,
{
    trace!(pairs = pairs.len(), "diff_batch start");
    pairs
        .par_iter()
        .map(|&(old_root, new_root)| diff_trees(comparer, old_root, new_root, config, cancel))
        .collect()
}
