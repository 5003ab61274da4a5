use thiserror::Error;

/// Errors returned by [`RbTree`](crate::RbTree) and [`MedianTracker`](crate::MedianTracker).
///
/// Every error is local to the call that raised it: the structure is left
/// exactly as it was before the call and stays usable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Insert of a key that is already present under [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject)
    #[error("key is already present")]
    DuplicateKey,
    /// Remove of a key that is not present
    #[error("key not found")]
    KeyNotFound,
    /// Median or remove requested on an empty tracker
    #[error("collection is empty")]
    EmptyCollection,
    /// NaN offered to the median tracker
    #[error("NaN has no rank")]
    NotANumber,
    /// Node handle that names a deleted slot or belongs to another tree
    #[error("stale node handle")]
    StaleHandle,
    /// Operation line that is not `<opcode> <value>`
    #[error("malformed operation")]
    MalformedOp,
    /// Internal consistency check failed
    #[error("invariant violated: {0}")]
    InvariantViolation(Violation),
}

/// The structural property found broken by a validation pass.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Root node is red
    #[error("root is red")]
    RedRoot,
    /// Root node reports a parent
    #[error("root has a parent")]
    RootHasParent,
    /// A red node has a red child
    #[error("red node with red child")]
    RedRedEdge,
    /// A child does not point back at its parent
    #[error("child does not point back at its parent")]
    BrokenParentLink,
    /// Two root-to-sentinel paths carry different numbers of black nodes
    #[error("unequal black height")]
    BlackHeightMismatch,
    /// In-order traversal is not sorted
    #[error("keys out of order")]
    OutOfOrder,
    /// Reachable node count differs from the recorded length
    #[error("expected {expected} nodes, reached {found}")]
    LengthMismatch {
        /// Recorded length
        expected: usize,
        /// Nodes reached from the root
        found: usize,
    },
    /// Center does not sit at rank `ceil(size / 2)`
    #[error("center at rank {found}, expected {expected}")]
    CenterRank {
        /// Required 1-indexed rank
        expected: usize,
        /// Observed 1-indexed rank
        found: usize,
    },
    /// Cached median disagrees with the tree contents
    #[error("cached median is stale")]
    StaleMedian,
    /// Center has no in-order neighbour where one must exist
    #[error("center lost its neighbour")]
    MissingNeighbor,
}

impl From<Violation> for Error {
    fn from(violation: Violation) -> Self {
        Error::InvariantViolation(violation)
    }
}
