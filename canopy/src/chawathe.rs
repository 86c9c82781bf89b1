//! Edit script generation from a node match.
//!
//! Follows the shape of "Change Detection in Hierarchically Structured
//! Information" (Chawathe et al., 1996), with the phases folded into a single
//! depth-first walk over matched pairs so that edits come out grouped by
//! position:
//!
//! - for each matched pair, its children are aligned under the match;
//! - alignment steps are handled in order: deletes before inserts at the same
//!   position, siblings left to right;
//! - a matched child is fully handled (its own edits, then its subtree)
//!   before the next sibling.
//!
//! Every unmatched old node yields one `Delete`, every unmatched new node one
//! `Insert`. A matched pair yields at most one positional edit (`Move` when
//! the parent changed, `Reorder` when only the sibling order did) and at most
//! one `Update`.

use crate::{debug, trace};

use crate::cancel::CancellationToken;
use crate::comparer::TreeComparer;
use crate::edit::Edit;
use crate::error::DiffError;
use crate::index::TreeIndex;
use crate::lcs::SequenceEdit;
use crate::matching::Match;

/// Wrapper for collecting edits with automatic tracing.
struct Ops<N> {
    inner: Vec<Edit<N>>,
}

impl<N: Copy + core::fmt::Debug> Ops<N> {
    fn new() -> Self {
        Self { inner: Vec::new() }
    }

    fn push(&mut self, op: Edit<N>) {
        debug!(%op, "emit");
        self.inner.push(op);
    }

    fn into_inner(self) -> Vec<Edit<N>> {
        self.inner
    }
}

/// Pending work of the depth-first walk.
enum Step<N> {
    Emit(Edit<N>),
    /// Align the children of a matched pair.
    Align { old: N, new: N },
    /// Delete an unmatched old node and the unmatched nodes under it.
    DeleteSubtree(N),
    /// Insert an unmatched new node, then handle its children.
    InsertSubtree(N),
}

/// Generate the edit script that turns the old tree of `matching` into its
/// new tree.
///
/// # Panics
///
/// If the match is inconsistent with the trees the comparer describes: the
/// roots are not paired with each other, or a paired node is not reachable
/// from its root.
pub fn generate_edit_script<C: TreeComparer>(
    comparer: &C,
    matching: &Match<C::Node>,
    cancel: &CancellationToken,
) -> Result<Vec<Edit<C::Node>>, DiffError> {
    trace!(matched_pairs = matching.len(), "generate_edit_script start");

    let old_root = matching.old_root();
    let new_root = matching.new_root();
    let old_index = TreeIndex::build(comparer, old_root);
    let new_index = TreeIndex::build(comparer, new_root);
    check_match(matching, &old_index, &new_index);

    let mut ops = Ops::new();
    // The roots are always paired and have no parent: only their values can change.
    if !comparer.values_equal(old_root, new_root) {
        ops.push(Edit::Update {
            old: old_root,
            new: new_root,
        });
    }

    let mut steps = vec![Step::Align {
        old: old_root,
        new: new_root,
    }];
    let mut pending: Vec<Step<C::Node>> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Emit(op) => ops.push(op),

            Step::Align { old, new } => {
                cancel.check()?;
                let old_kids = old_index.children(old);
                let new_kids = new_index.children(new);
                // Linear memory in the width of the level: no LCS table.
                for edit in matching.sequence_edits(old_kids, new_kids) {
                    match edit {
                        SequenceEdit::Match {
                            old_index: i,
                            new_index: j,
                        } => {
                            push_matched(comparer, &mut pending, None, old_kids[i], new_kids[j]);
                        }
                        SequenceEdit::Delete { old_index: i } => {
                            let child = old_kids[i];
                            // A matched child is handled where its partner lives.
                            if !matching.contains_old(child) {
                                pending.push(Step::DeleteSubtree(child));
                            }
                        }
                        SequenceEdit::Insert { new_index: j } => {
                            let child = new_kids[j];
                            match matching.get_old(child) {
                                None => pending.push(Step::InsertSubtree(child)),
                                Some(partner) => {
                                    let same_parent = old_index.parent(partner) == Some(old);
                                    let positional = if same_parent {
                                        Edit::Reorder {
                                            old: partner,
                                            new: child,
                                        }
                                    } else {
                                        Edit::Move {
                                            old: partner,
                                            new: child,
                                        }
                                    };
                                    trace!(?partner, ?child, same_parent, "positional change");
                                    push_matched(
                                        comparer,
                                        &mut pending,
                                        Some(positional),
                                        partner,
                                        child,
                                    );
                                }
                            }
                        }
                    }
                }
                steps.extend(pending.drain(..).rev());
            }

            Step::DeleteSubtree(root) => {
                // Post-order, stopping at matched nodes: those are moved out
                // and their subtrees are handled at the destination.
                let mut stack = vec![(root, false)];
                while let Some((node, expanded)) = stack.pop() {
                    if expanded {
                        ops.push(Edit::Delete { old: node });
                        continue;
                    }
                    stack.push((node, true));
                    for &child in old_index.children(node).iter().rev() {
                        if !matching.contains_old(child) {
                            stack.push((child, false));
                        }
                    }
                }
            }

            Step::InsertSubtree(node) => {
                ops.push(Edit::Insert { new: node });
                for &child in new_index.children(node) {
                    match matching.get_old(child) {
                        None => pending.push(Step::InsertSubtree(child)),
                        Some(partner) => {
                            // The new parent is unmatched, so the parent changed.
                            let positional = Edit::Move {
                                old: partner,
                                new: child,
                            };
                            push_matched(comparer, &mut pending, Some(positional), partner, child);
                        }
                    }
                }
                steps.extend(pending.drain(..).rev());
            }
        }
    }

    debug!(total_ops = ops.inner.len(), "generate_edit_script done");
    Ok(ops.into_inner())
}

/// Queue the edits of a matched pair, then the alignment of its children.
fn push_matched<C: TreeComparer>(
    comparer: &C,
    pending: &mut Vec<Step<C::Node>>,
    positional: Option<Edit<C::Node>>,
    old: C::Node,
    new: C::Node,
) {
    if let Some(op) = positional {
        pending.push(Step::Emit(op));
    }
    if !comparer.values_equal(old, new) {
        pending.push(Step::Emit(Edit::Update { old, new }));
    }
    pending.push(Step::Align { old, new });
}

fn check_match<N: Copy + Eq + core::hash::Hash + core::fmt::Debug>(
    matching: &Match<N>,
    old_index: &TreeIndex<N>,
    new_index: &TreeIndex<N>,
) {
    assert!(
        matching.contains(old_index.root(), new_index.root()),
        "the match must pair the old root {:?} with the new root {:?}",
        old_index.root(),
        new_index.root()
    );
    for (old, new) in matching.pairs() {
        assert!(
            old_index.contains(old),
            "matched node {:?} is not reachable from the old root {:?}",
            old,
            old_index.root()
        );
        assert!(
            new_index.contains(new),
            "matched node {:?} is not reachable from the new root {:?}",
            new,
            new_index.root()
        );
    }
}
