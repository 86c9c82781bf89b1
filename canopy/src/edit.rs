//! Edit operations produced by the edit script builder.

use core::fmt;

use crate::comparer::TreeComparer;

/// The kind of an [`Edit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EditKind {
    /// A node exists only in the new tree.
    Insert,
    /// A node exists only in the old tree.
    Delete,
    /// A matched node changed its own value.
    Update,
    /// A matched node changed parent.
    Move,
    /// A matched node kept its parent but changed order among its siblings.
    Reorder,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditKind::Insert => "Insert",
            EditKind::Delete => "Delete",
            EditKind::Update => "Update",
            EditKind::Move => "Move",
            EditKind::Reorder => "Reorder",
        })
    }
}

/// One operation of an edit script.
///
/// Which nodes are present is fixed by the variant: inserts only have a new
/// node, deletes only an old one, everything else both.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edit<N> {
    /// Insert a node of the new tree.
    Insert {
        /// The inserted node
        new: N,
    },
    /// Delete a node of the old tree.
    Delete {
        /// The deleted node
        old: N,
    },
    /// A matched node whose own value changed.
    Update {
        /// The node in the old tree
        old: N,
        /// Its partner in the new tree
        new: N,
    },
    /// A matched node that now lives under a different parent.
    Move {
        /// The node in the old tree
        old: N,
        /// Its partner in the new tree
        new: N,
    },
    /// A matched node that changed order among the same siblings.
    Reorder {
        /// The node in the old tree
        old: N,
        /// Its partner in the new tree
        new: N,
    },
}

impl<N: Copy> Edit<N> {
    /// The kind of this edit.
    pub fn kind(&self) -> EditKind {
        match self {
            Edit::Insert { .. } => EditKind::Insert,
            Edit::Delete { .. } => EditKind::Delete,
            Edit::Update { .. } => EditKind::Update,
            Edit::Move { .. } => EditKind::Move,
            Edit::Reorder { .. } => EditKind::Reorder,
        }
    }

    /// The old-tree node, absent for inserts.
    pub fn old_node(&self) -> Option<N> {
        match *self {
            Edit::Insert { .. } => None,
            Edit::Delete { old }
            | Edit::Update { old, .. }
            | Edit::Move { old, .. }
            | Edit::Reorder { old, .. } => Some(old),
        }
    }

    /// The new-tree node, absent for deletes.
    pub fn new_node(&self) -> Option<N> {
        match *self {
            Edit::Delete { .. } => None,
            Edit::Insert { new }
            | Edit::Update { new, .. }
            | Edit::Move { new, .. }
            | Edit::Reorder { new, .. } => Some(new),
        }
    }

    /// Render this edit with the source spans the comparer knows about.
    pub fn display<'a, C>(&self, comparer: &'a C) -> EditDisplay<'a, C>
    where
        C: TreeComparer<Node = N>,
    {
        EditDisplay {
            edit: *self,
            comparer,
        }
    }
}

impl<N: Copy + fmt::Debug> fmt::Display for Edit<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        match (self.old_node(), self.new_node()) {
            (Some(old), Some(new)) => write!(f, "{:?} → {:?}", old, new)?,
            (Some(old), None) => write!(f, "{:?}", old)?,
            (None, Some(new)) => write!(f, "{:?}", new)?,
            (None, None) => {}
        }
        write!(f, ")")
    }
}

impl<N: Copy + fmt::Debug> fmt::Debug for Edit<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// [`Edit`] rendered with labels and spans. See [`Edit::display`].
pub struct EditDisplay<'a, C: TreeComparer> {
    edit: Edit<C::Node>,
    comparer: &'a C,
}

impl<C: TreeComparer> EditDisplay<'_, C> {
    fn node(&self, f: &mut fmt::Formatter<'_>, node: C::Node) -> fmt::Result {
        write!(f, "{:?}", self.comparer.label(node))?;
        match self.comparer.span(node) {
            Some(span) => write!(f, "@{}..{}", span.start, span.end),
            None => write!(f, "@{:?}", node),
        }
    }
}

impl<C: TreeComparer> fmt::Display for EditDisplay<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.edit.kind())?;
        match (self.edit.old_node(), self.edit.new_node()) {
            (Some(old), Some(new)) => {
                self.node(f, old)?;
                write!(f, " → ")?;
                self.node(f, new)
            }
            (Some(node), None) | (None, Some(node)) => self.node(f, node),
            (None, None) => Ok(()),
        }
    }
}
