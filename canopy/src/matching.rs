//! Node matching by per-level LCS alignment.
//!
//! Works top-down from the two roots, which are always paired:
//! 1. Identical subtrees (`trees_equal`) are paired wholesale.
//! 2. Otherwise the unmatched children of a matched pair are aligned with an
//!    LCS under `trees_equal`; those matches are anchors.
//! 3. Each gap between two anchors is aligned again, this time pairing nodes
//!    that are the same entity (same label, distance within
//!    [`MatchingConfig::max_distance`]).
//! 4. A move pass pairs whatever is still unmatched across tree positions.
//!
//! Order-preserving matches are always found before moves are considered, so
//! a node is only reported as moved when no match exists where it was.

use crate::{debug, trace};

use core::fmt;
use core::hash::Hash;
use rapidhash::RapidHashMap as HashMap;

use crate::cancel::CancellationToken;
use crate::comparer::TreeComparer;
use crate::error::DiffError;
use crate::index::TreeIndex;
use crate::lcs::{Lcs, SequenceEdit, unique_alignment};

/// A one-to-one correspondence between nodes of an old and a new tree.
///
/// Old nodes without a partner are deleted (or were moved from a position the
/// edit script reports as a delete of their parent); new nodes without a
/// partner are inserted.
#[derive(Clone)]
pub struct Match<N> {
    old_root: N,
    new_root: N,
    old_to_new: HashMap<N, N>,
    new_to_old: HashMap<N, N>,
    /// All pairs in the order they were found
    pairs: Vec<(N, N)>,
}

impl<N: fmt::Debug> fmt::Debug for Match<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("old_root", &self.old_root)
            .field("new_root", &self.new_root)
            .field("pairs", &self.pairs)
            .finish()
    }
}

impl<N: Copy + Eq + Hash + fmt::Debug> Match<N> {
    /// An empty match for the given roots. The roots are not paired yet.
    pub(crate) fn new(old_root: N, new_root: N) -> Self {
        Self {
            old_root,
            new_root,
            old_to_new: HashMap::default(),
            new_to_old: HashMap::default(),
            pairs: Vec::new(),
        }
    }

    /// Pair two nodes.
    ///
    /// # Panics
    ///
    /// If either node is already paired.
    pub(crate) fn add(&mut self, old: N, new: N) {
        assert!(
            !self.old_to_new.contains_key(&old),
            "old node {:?} is already matched to {:?}",
            old,
            self.old_to_new.get(&old)
        );
        assert!(
            !self.new_to_old.contains_key(&new),
            "new node {:?} is already matched to {:?}",
            new,
            self.new_to_old.get(&new)
        );
        self.old_to_new.insert(old, new);
        self.new_to_old.insert(new, old);
        self.pairs.push((old, new));
    }

    /// Root of the old tree.
    pub fn old_root(&self) -> N {
        self.old_root
    }

    /// Root of the new tree.
    pub fn new_root(&self) -> N {
        self.new_root
    }

    /// Partner of an old node.
    #[inline]
    pub fn get_new(&self, old: N) -> Option<N> {
        self.old_to_new.get(&old).copied()
    }

    /// Partner of a new node.
    #[inline]
    pub fn get_old(&self, new: N) -> Option<N> {
        self.new_to_old.get(&new).copied()
    }

    /// Whether an old node has a partner.
    #[inline]
    pub fn contains_old(&self, old: N) -> bool {
        self.old_to_new.contains_key(&old)
    }

    /// Whether a new node has a partner.
    #[inline]
    pub fn contains_new(&self, new: N) -> bool {
        self.new_to_old.contains_key(&new)
    }

    /// Whether `old` and `new` are paired with each other.
    #[inline]
    pub fn contains(&self, old: N, new: N) -> bool {
        self.get_new(old) == Some(new)
    }

    /// All pairs, in the order they were found.
    pub fn pairs(&self) -> impl Iterator<Item = (N, N)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is paired.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// LCS alignment of two node lists where two nodes are equal iff this
    /// match pairs them.
    ///
    /// Since a node has at most one partner, no table is built: see
    /// [`unique_alignment`]. The result is the one [`Lcs::edits`] would give.
    pub fn sequence_edits(&self, old: &[N], new: &[N]) -> Vec<SequenceEdit> {
        let new_positions: HashMap<N, usize> =
            new.iter().enumerate().map(|(j, &node)| (node, j)).collect();
        unique_alignment(old.len(), new.len(), |i| {
            self.get_new(old[i])
                .and_then(|partner| new_positions.get(&partner).copied())
        })
    }
}

/// Configuration for the matching algorithm.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Largest [`TreeComparer::distance`] at which two same-label nodes are
    /// still considered the same entity.
    pub max_distance: f64,

    /// Pair nodes left over after the positional passes across tree
    /// positions, producing moves instead of delete + insert.
    pub detect_moves: bool,

    /// Largest LCS table (in cells) built for one sibling list. Above it the
    /// children are paired by index instead, where they are the same entity.
    pub max_alignment_cells: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_distance: 0.5,
            detect_moves: true,
            max_alignment_cells: 1 << 22,
        }
    }
}

/// Compute the match between the trees under `old_root` and `new_root`.
pub fn compute_match<C: TreeComparer>(
    comparer: &C,
    old_root: C::Node,
    new_root: C::Node,
    config: &MatchingConfig,
    cancel: &CancellationToken,
) -> Result<Match<C::Node>, DiffError> {
    compute_match_with_known(
        comparer,
        old_root,
        new_root,
        core::iter::empty(),
        config,
        cancel,
    )
}

/// Like [`compute_match`], seeded with pairs the caller already knows.
///
/// Known pairs are kept as-is and their children are aligned like any other
/// matched pair.
///
/// # Panics
///
/// If a known pair is not reachable from the roots, or pairs a node twice.
pub fn compute_match_with_known<C, I>(
    comparer: &C,
    old_root: C::Node,
    new_root: C::Node,
    known: I,
    config: &MatchingConfig,
    cancel: &CancellationToken,
) -> Result<Match<C::Node>, DiffError>
where
    C: TreeComparer,
    I: IntoIterator<Item = (C::Node, C::Node)>,
{
    let mut matcher = Matcher {
        comparer,
        config,
        cancel,
        old_index: TreeIndex::build(comparer, old_root),
        new_index: TreeIndex::build(comparer, new_root),
        matching: Match::new(old_root, new_root),
        worklist: Vec::new(),
    };
    debug!(
        nodes_old = matcher.old_index.len(),
        nodes_new = matcher.new_index.len(),
        "compute_match start"
    );

    matcher.pair(old_root, new_root);
    for (old, new) in known {
        if old == old_root && new == new_root {
            continue;
        }
        assert!(
            matcher.old_index.contains(old) && matcher.new_index.contains(new),
            "known match {:?} -> {:?} is not reachable from the roots",
            old,
            new
        );
        matcher.pair(old, new);
    }

    matcher.drain()?;
    debug!(matched = matcher.matching.len(), "after level alignment");

    if config.detect_moves {
        matcher.move_pass()?;
        debug!(matched = matcher.matching.len(), "after move pass");
    }

    Ok(matcher.matching)
}

struct Matcher<'a, C: TreeComparer> {
    comparer: &'a C,
    config: &'a MatchingConfig,
    cancel: &'a CancellationToken,
    old_index: TreeIndex<C::Node>,
    new_index: TreeIndex<C::Node>,
    matching: Match<C::Node>,
    /// Matched pairs whose children still need aligning
    worklist: Vec<(C::Node, C::Node)>,
}

impl<C: TreeComparer> Matcher<'_, C> {
    fn pair(&mut self, old: C::Node, new: C::Node) {
        trace!(?old, ?new, "pair");
        self.matching.add(old, new);
        self.worklist.push((old, new));
    }

    fn drain(&mut self) -> Result<(), DiffError> {
        while let Some((old, new)) = self.worklist.pop() {
            self.cancel.check()?;
            if self.comparer.trees_equal(old, new) {
                self.pair_identical(old, new);
            } else {
                self.align_children(old, new)?;
            }
        }
        Ok(())
    }

    /// Pair two identical subtrees position by position.
    fn pair_identical(&mut self, old: C::Node, new: C::Node) {
        let mut stack = vec![(old, new)];
        while let Some((old, new)) = stack.pop() {
            let old_kids = self.old_index.children(old);
            let new_kids = self.new_index.children(new);
            for (&o, &n) in old_kids.iter().zip(new_kids) {
                if self.matching.contains_old(o) || self.matching.contains_new(n) {
                    continue;
                }
                self.matching.add(o, n);
                stack.push((o, n));
            }
        }
    }

    fn align_children(&mut self, old: C::Node, new: C::Node) -> Result<(), DiffError> {
        let old_kids: Vec<C::Node> = self
            .old_index
            .children(old)
            .iter()
            .copied()
            .filter(|&c| !self.matching.contains_old(c))
            .collect();
        let new_kids: Vec<C::Node> = self
            .new_index
            .children(new)
            .iter()
            .copied()
            .filter(|&c| !self.matching.contains_new(c))
            .collect();
        if old_kids.is_empty() || new_kids.is_empty() {
            return Ok(());
        }

        if self.too_large(&old_kids, &new_kids) {
            debug!(
                ?old,
                ?new,
                old_children = old_kids.len(),
                new_children = new_kids.len(),
                "sibling lists too large for LCS, pairing by index"
            );
            self.pair_by_index(&old_kids, &new_kids);
            return Ok(());
        }

        let comparer = self.comparer;
        let anchors = Lcs::new_cancellable(
            old_kids.len(),
            new_kids.len(),
            |i, j| comparer.trees_equal(old_kids[i], new_kids[j]),
            self.cancel,
        )?;

        let mut gap_old = Vec::new();
        let mut gap_new = Vec::new();
        for edit in anchors.edits() {
            match edit {
                SequenceEdit::Match {
                    old_index,
                    new_index,
                } => {
                    self.align_gap(&gap_old, &gap_new)?;
                    gap_old.clear();
                    gap_new.clear();
                    self.pair(old_kids[old_index], new_kids[new_index]);
                }
                SequenceEdit::Delete { old_index } => gap_old.push(old_kids[old_index]),
                SequenceEdit::Insert { new_index } => gap_new.push(new_kids[new_index]),
            }
        }
        self.align_gap(&gap_old, &gap_new)
    }

    /// Pair same-entity nodes between two anchors, keeping their order.
    fn align_gap(&mut self, old: &[C::Node], new: &[C::Node]) -> Result<(), DiffError> {
        // A gap is a subset of a level that already fit `max_alignment_cells`.
        if old.is_empty() || new.is_empty() {
            return Ok(());
        }

        let comparer = self.comparer;
        let max_distance = self.config.max_distance;
        let lcs = Lcs::new_cancellable(
            old.len(),
            new.len(),
            |i, j| comparer.is_same_entity(old[i], new[j], max_distance),
            self.cancel,
        )?;
        for (i, j) in lcs.matching_pairs() {
            self.pair(old[i], new[j]);
        }
        Ok(())
    }

    fn too_large(&self, old: &[C::Node], new: &[C::Node]) -> bool {
        (old.len() + 1).saturating_mul(new.len() + 1) > self.config.max_alignment_cells
    }

    fn pair_by_index(&mut self, old: &[C::Node], new: &[C::Node]) {
        for (&o, &n) in old.iter().zip(new) {
            if self
                .comparer
                .is_same_entity(o, n, self.config.max_distance)
            {
                self.pair(o, n);
            }
        }
    }

    /// Pair nodes the positional passes left over, wherever they are.
    ///
    /// Old nodes are visited in pre-order so a moved subtree is paired at its
    /// root, and its descendants are aligned before they could be considered
    /// on their own.
    fn move_pass(&mut self) -> Result<(), DiffError> {
        let mut by_label: HashMap<C::Label, Vec<C::Node>> = HashMap::default();
        for &new in self.new_index.pre_order() {
            if !self.matching.contains_new(new) {
                by_label
                    .entry(self.comparer.label(new))
                    .or_default()
                    .push(new);
            }
        }
        if by_label.is_empty() {
            return Ok(());
        }

        let old_nodes: Vec<C::Node> = self
            .old_index
            .pre_order()
            .iter()
            .copied()
            .filter(|&old| !self.matching.contains_old(old))
            .collect();

        for old in old_nodes {
            if self.matching.contains_old(old) {
                continue;
            }
            self.cancel.check()?;

            let Some(candidates) = by_label.get(&self.comparer.label(old)) else {
                continue;
            };

            // The comparer decides who qualifies; distance only ranks them.
            let mut best: Option<(C::Node, f64)> = None;
            for &new in candidates {
                if self.matching.contains_new(new) {
                    continue;
                }
                if self.comparer.trees_equal(old, new) {
                    best = Some((new, 0.0));
                    break;
                }
                if !self
                    .comparer
                    .is_same_entity(old, new, self.config.max_distance)
                {
                    continue;
                }
                let distance = self.comparer.distance(old, new);
                if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                    best = Some((new, distance));
                }
            }

            if let Some((new, _distance)) = best {
                debug!(?old, ?new, distance = _distance, "move pass: paired");
                self.pair(old, new);
                self.drain()?;
            }
        }
        Ok(())
    }
}
