//! Longest-common-subsequence alignment of two indexable sequences.
//!
//! The table is the classic O(n·m) dynamic program, filled from the ends of
//! both sequences so that `L[i][j]` is the LCS length of `old[i..]` and
//! `new[j..]`. Keeping suffix lengths lets the alignment be walked forward,
//! from `(0, 0)` to `(n, m)`, one edit at a time.
//!
//! Memory is `(n + 1) · (m + 1)` `u32` cells. There is no Hirschberg-style
//! divide and conquer: sibling lists are expected to be short, and the match
//! engine refuses to build tables above
//! [`MatchingConfig::max_alignment_cells`](crate::MatchingConfig::max_alignment_cells).
//!
//! Ties are broken deterministically:
//! 1. if the two items at the current cell are equal, they are matched;
//! 2. otherwise the walk steps in the old sequence (a delete) unless that
//!    loses length, in which case it steps in the new one (an insert).
//!
//! Deletes therefore come before inserts wherever both are possible.

use core::convert::Infallible;
use core::fmt;
use core::iter::FusedIterator;

use crate::cancel::CancellationToken;
use crate::error::DiffError;
use crate::trace;

/// Set on a cell when the predicate held for that `(old, new)` pair.
const MATCH_BIT: u32 = 1 << 31;
const LEN_MASK: u32 = !MATCH_BIT;

/// One step of an alignment between an old and a new sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceEdit {
    /// `old[old_index]` and `new[new_index]` are matched.
    Match {
        /// Index in the old sequence
        old_index: usize,
        /// Index in the new sequence
        new_index: usize,
    },
    /// `old[old_index]` has no counterpart.
    Delete {
        /// Index in the old sequence
        old_index: usize,
    },
    /// `new[new_index]` has no counterpart.
    Insert {
        /// Index in the new sequence
        new_index: usize,
    },
}

impl SequenceEdit {
    /// Index in the old sequence, if this step consumes one.
    pub fn old_index(&self) -> Option<usize> {
        match *self {
            SequenceEdit::Match { old_index, .. } | SequenceEdit::Delete { old_index } => {
                Some(old_index)
            }
            SequenceEdit::Insert { .. } => None,
        }
    }

    /// Index in the new sequence, if this step consumes one.
    pub fn new_index(&self) -> Option<usize> {
        match *self {
            SequenceEdit::Match { new_index, .. } | SequenceEdit::Insert { new_index } => {
                Some(new_index)
            }
            SequenceEdit::Delete { .. } => None,
        }
    }
}

impl fmt::Display for SequenceEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceEdit::Match {
                old_index,
                new_index,
            } => write!(f, "={}:{}", old_index, new_index),
            SequenceEdit::Delete { old_index } => write!(f, "-{}", old_index),
            SequenceEdit::Insert { new_index } => write!(f, "+{}", new_index),
        }
    }
}

/// A filled LCS table for two sequences.
///
/// The sequences themselves are never stored: the table only sees them
/// through the `items_equal(old_index, new_index)` predicate, which is called
/// exactly once per cell while the table is built. The predicate must be
/// pure and deterministic.
pub struct Lcs {
    old_len: usize,
    new_len: usize,
    /// Row-major, `(old_len + 1) × (new_len + 1)`.
    cells: Vec<u32>,
}

impl fmt::Debug for Lcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lcs")
            .field("old_len", &self.old_len)
            .field("new_len", &self.new_len)
            .field("len", &self.len())
            .finish()
    }
}

impl Lcs {
    /// Build the table for sequences of the given lengths.
    ///
    /// # Panics
    ///
    /// If the table size overflows `usize`, or if the shorter sequence is too
    /// long for the lengths to fit in 31 bits.
    pub fn new<F>(old_len: usize, new_len: usize, items_equal: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        match Self::build(old_len, new_len, items_equal, || Ok::<(), Infallible>(())) {
            Ok(lcs) => lcs,
            Err(never) => match never {},
        }
    }

    /// Like [`Lcs::new`], but polls `cancel` once per table row.
    pub fn new_cancellable<F>(
        old_len: usize,
        new_len: usize,
        items_equal: F,
        cancel: &CancellationToken,
    ) -> Result<Self, DiffError>
    where
        F: FnMut(usize, usize) -> bool,
    {
        Self::build(old_len, new_len, items_equal, || cancel.check())
    }

    /// Align two slices using `PartialEq`.
    pub fn from_slices<T: PartialEq>(old: &[T], new: &[T]) -> Self {
        Self::new(old.len(), new.len(), |i, j| old[i] == new[j])
    }

    fn build<F, P, E>(
        old_len: usize,
        new_len: usize,
        mut items_equal: F,
        mut poll: P,
    ) -> Result<Self, E>
    where
        F: FnMut(usize, usize) -> bool,
        P: FnMut() -> Result<(), E>,
    {
        assert!(
            old_len.min(new_len) < LEN_MASK as usize,
            "LCS lengths must fit in 31 bits (got {} × {})",
            old_len,
            new_len
        );
        let width = new_len.saturating_add(1);
        let size = old_len
            .checked_add(1)
            .and_then(|rows| rows.checked_mul(width))
            .filter(|_| new_len < usize::MAX)
            .unwrap_or_else(|| panic!("LCS table for {} × {} overflows usize", old_len, new_len));

        trace!(old_len, new_len, cells = size, "lcs table");

        let mut cells = vec![0u32; size];
        for i in (0..old_len).rev() {
            poll()?;
            let row = i * width;
            let below = row + width;
            for j in (0..new_len).rev() {
                cells[row + j] = if items_equal(i, j) {
                    ((cells[below + j + 1] & LEN_MASK) + 1) | MATCH_BIT
                } else {
                    (cells[below + j] & LEN_MASK).max(cells[row + j + 1] & LEN_MASK)
                };
            }
        }

        Ok(Self {
            old_len,
            new_len,
            cells,
        })
    }

    #[inline(always)]
    fn cell(&self, i: usize, j: usize) -> u32 {
        self.cells[i * (self.new_len + 1) + j]
    }

    #[inline(always)]
    fn len_at(&self, i: usize, j: usize) -> u32 {
        self.cell(i, j) & LEN_MASK
    }

    /// Length of the old sequence.
    pub fn old_len(&self) -> usize {
        self.old_len
    }

    /// Length of the new sequence.
    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// Length of the longest common subsequence.
    pub fn len(&self) -> usize {
        self.len_at(0, 0) as usize
    }

    /// Whether the two sequences have nothing in common.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalized distance between the sequences: `0.0` when they are equal,
    /// `1.0` when nothing matches.
    ///
    /// Two empty sequences are at distance `0.0`.
    pub fn distance(&self) -> f64 {
        let total = self.old_len + self.new_len;
        if total == 0 {
            return 0.0;
        }
        1.0 - 2.0 * self.len() as f64 / total as f64
    }

    /// Matched `(old_index, new_index)` pairs, strictly increasing in both.
    pub fn matching_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edits().filter_map(|edit| match edit {
            SequenceEdit::Match {
                old_index,
                new_index,
            } => Some((old_index, new_index)),
            _ => None,
        })
    }

    /// The full alignment, from the start of both sequences to their end.
    pub fn edits(&self) -> SequenceEdits<'_> {
        SequenceEdits {
            lcs: self,
            old_index: 0,
            new_index: 0,
        }
    }
}

/// Lazy walk over an [`Lcs`] alignment. See [`Lcs::edits`].
#[derive(Debug, Clone)]
pub struct SequenceEdits<'a> {
    lcs: &'a Lcs,
    old_index: usize,
    new_index: usize,
}

impl Iterator for SequenceEdits<'_> {
    type Item = SequenceEdit;

    fn next(&mut self) -> Option<SequenceEdit> {
        let (i, j) = (self.old_index, self.new_index);
        let (n, m) = (self.lcs.old_len, self.lcs.new_len);

        let edit = if i < n && j < m {
            if self.lcs.cell(i, j) & MATCH_BIT != 0 {
                SequenceEdit::Match {
                    old_index: i,
                    new_index: j,
                }
            } else if self.lcs.len_at(i + 1, j) >= self.lcs.len_at(i, j + 1) {
                SequenceEdit::Delete { old_index: i }
            } else {
                SequenceEdit::Insert { new_index: j }
            }
        } else if i < n {
            SequenceEdit::Delete { old_index: i }
        } else if j < m {
            SequenceEdit::Insert { new_index: j }
        } else {
            return None;
        };

        if edit.old_index().is_some() {
            self.old_index += 1;
        }
        if edit.new_index().is_some() {
            self.new_index += 1;
        }
        Some(edit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let old_left = self.lcs.old_len - self.old_index;
        let new_left = self.lcs.new_len - self.new_index;
        (old_left.max(new_left), Some(old_left + new_left))
    }
}

impl FusedIterator for SequenceEdits<'_> {}

/// Alignment of two sequences where each old item equals at most one new
/// item, given as `partner(old_index) -> Option<new_index>`.
///
/// The result is exactly what [`Lcs::edits`] produces for the predicate
/// `partner(i) == Some(j)`, ties included, but it is computed as a longest
/// increasing subsequence of partner positions: O(n log n) time and O(n + m)
/// memory instead of a table.
///
/// # Panics
///
/// If a partner is out of range or two old items share a partner.
pub fn unique_alignment<F>(old_len: usize, new_len: usize, mut partner: F) -> Vec<SequenceEdit>
where
    F: FnMut(usize) -> Option<usize>,
{
    let mut taken = vec![false; new_len];
    let partners: Vec<Option<usize>> = (0..old_len)
        .map(|i| {
            let j = partner(i)?;
            assert!(j < new_len, "partner {} of {} is out of range ({})", j, i, new_len);
            assert!(
                !core::mem::replace(&mut taken[j], true),
                "new item {} is the partner of more than one old item",
                j
            );
            Some(j)
        })
        .collect();

    // Length of the longest increasing chain starting at each old item,
    // from the right. `tails[l]` is the largest partner that starts a chain
    // of length `l + 1`; it decreases with `l`.
    let mut chain = vec![0usize; old_len];
    let mut tails: Vec<usize> = Vec::new();
    for i in (0..old_len).rev() {
        let Some(j) = partners[i] else { continue };
        let pos = tails.partition_point(|&t| t > j);
        if pos == tails.len() {
            tails.push(j);
        } else {
            tails[pos] = j;
        }
        chain[i] = pos + 1;
    }

    // Items with the same chain length have decreasing partners. The table
    // walk deletes an old item whenever that keeps the length, so at each
    // length it keeps the last item still reachable.
    let mut groups: Vec<Vec<(usize, usize)>> = vec![Vec::new(); tails.len()];
    for (i, j) in partners.iter().enumerate() {
        if let Some(j) = *j {
            groups[chain[i] - 1].push((i, j));
        }
    }
    let mut pairs = Vec::with_capacity(groups.len());
    let mut next_new = 0;
    for group in groups.iter().rev() {
        let reachable = group.partition_point(|&(_, j)| j >= next_new);
        let (i, j) = group[reachable - 1];
        pairs.push((i, j));
        next_new = j + 1;
    }

    trace!(old_len, new_len, matched = pairs.len(), "unique alignment");

    let mut edits = Vec::with_capacity(old_len + new_len - pairs.len());
    let (mut old_index, mut new_index) = (0, 0);
    for (i, j) in pairs {
        edits.extend((old_index..i).map(|old_index| SequenceEdit::Delete { old_index }));
        edits.extend((new_index..j).map(|new_index| SequenceEdit::Insert { new_index }));
        edits.push(SequenceEdit::Match {
            old_index: i,
            new_index: j,
        });
        old_index = i + 1;
        new_index = j + 1;
    }
    edits.extend((old_index..old_len).map(|old_index| SequenceEdit::Delete { old_index }));
    edits.extend((new_index..new_len).map(|new_index| SequenceEdit::Insert { new_index }));
    edits
}
