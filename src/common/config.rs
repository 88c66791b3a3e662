//! Configuration for the index.

use crate::common::{Error, Result};

/// Size of a node page in bytes (4KB).
///
/// Matches the page size of the storage engine's page manager, which maps
/// persistence id `n` to the `n`-th page of the index file.
pub const PAGE_SIZE: usize = 4096;

/// Default fanout: every node stores at most `DEFAULT_DEGREE - 1` keys.
pub const DEFAULT_DEGREE: usize = 4;

/// Smallest degree that keeps both halves of a split non-empty.
///
/// With degree 2 an internal split would leave one side without keys.
pub const MIN_DEGREE: usize = 3;

/// Identity and shape of one index.
///
/// # Example
/// ```
/// use bptindex::IndexConfig;
///
/// let config = IndexConfig::new("orders", "orders_pk").with_degree(8);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_keys(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Table the index belongs to. Opaque to the tree.
    pub table_name: String,
    /// Name of the index. Opaque to the tree.
    pub index_name: String,
    /// Maximum number of children of an internal node.
    pub degree: usize,
}

impl IndexConfig {
    /// Create a config with the default degree.
    pub fn new(table_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            index_name: index_name.into(),
            degree: DEFAULT_DEGREE,
        }
    }

    /// Set the degree.
    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Check that the degree can keep the tree balanced.
    ///
    /// # Errors
    /// Returns `Error::InvalidDegree` if `degree < MIN_DEGREE`.
    pub fn validate(&self) -> Result<()> {
        if self.degree < MIN_DEGREE {
            return Err(Error::InvalidDegree {
                degree: self.degree,
                min: MIN_DEGREE,
            });
        }
        Ok(())
    }

    /// Maximum keys per node.
    #[inline]
    pub fn max_keys(&self) -> usize {
        self.degree - 1
    }

    /// Minimum keys per non-root node: `ceil(degree / 2) - 1`.
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.degree.div_ceil(2) - 1
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}
