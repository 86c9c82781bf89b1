use thiserror::Error;

/// Errors that can end a diff early.
///
/// Contract violations (an inconsistent [`Match`](crate::Match), a table
/// that cannot be allocated) are not represented here: they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The token fired before the diff completed; nothing partial is returned.
    #[error("the diff was cancelled before it completed")]
    Cancelled,
}
