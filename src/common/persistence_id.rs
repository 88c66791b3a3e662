//! Persistence identifier type.

use std::fmt;

/// Sequential number assigned to a node by the numbering pass.
///
/// Ids are handed out in pre-order starting at 0 for the root, so the page
/// manager can lay node `n` out as its `n`-th page and child links can be
/// written as plain integers.
///
/// # Example
/// ```
/// use bptindex::PersistenceId;
///
/// let id = PersistenceId::new(3);
/// assert!(id.is_valid());
/// assert!(!PersistenceId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersistenceId(pub u32);

impl PersistenceId {
    /// Sentinel for "not numbered" or "no next leaf".
    pub const INVALID: PersistenceId = PersistenceId(u32::MAX);

    /// Create a new PersistenceId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PersistenceId(id)
    }

    /// Check if this id is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Convert to `Option`, mapping the sentinel to `None`.
    #[inline]
    pub fn valid(self) -> Option<PersistenceId> {
        self.is_valid().then_some(self)
    }
}

impl Default for PersistenceId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PersistenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Node(INVALID)")
        } else {
            write!(f, "Node({})", self.0)
        }
    }
}
