use std::fmt::Debug;

use thiserror::Error;

/// Error enumerates over all possible errors that this package
/// shall return. Missing keys are not errors, lookups and deletes
/// report them as `None`.
#[derive(Debug, PartialEq, Error)]
pub enum Error<K>
where
    K: Debug,
{
    /// Fatal case, a red node has a red child.
    #[error("consecutive red links")]
    ConsecutiveReds,
    /// Fatal case, a red link leans right.
    #[error("red link leaning right")]
    RedRightLink,
    /// Fatal case, root is colored red after a completed operation.
    #[error("root is red")]
    RedRoot,
    /// Fatal case, black height differs between left and right child.
    /// The String component can be used for debugging.
    #[error("unbalanced blacks, {0}")]
    UnbalancedBlacks(String),
    /// Fatal case, index entries are not in sort-order.
    #[error("sort error, {0:?} against parent {1:?}")]
    SortError(K, K),
    /// Fatal case, subtree counter does not match its children.
    #[error("size mismatch at {key:?}, expected {expected} found {found}")]
    SizeMismatch { key: K, expected: usize, found: usize },
    /// Returned by create() API when key is already present.
    #[error("key already present")]
    OverwriteKey,
}
