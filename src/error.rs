use thiserror::Error;

/// Result type alias for range set operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Every way a range set operation can decline.
///
/// This is a single flat set of statuses: callers match on the kind and
/// decide policy themselves (there is no retry machinery at this layer).
/// `DuplicateValue` and `ValueNotFound` are ordinary outcomes reported
/// distinctly so a custody tracker can tell "already acknowledged" from
/// "newly acknowledged".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A set must be able to hold at least one range.
    #[error("capacity of zero requested")]
    ZeroCapacity,

    /// The requested capacity exceeds [`MAX_CAPACITY`]. Half the ID domain
    /// plus one node is already enough for the worst-case population.
    ///
    /// [`MAX_CAPACITY`]: crate::RangeSet::MAX_CAPACITY
    #[error("capacity exceeds the maximum node count")]
    CapacityExceeded,

    /// The arena reservation could not be satisfied at creation.
    #[error("arena allocation failed")]
    AllocationFailed,

    /// Every node cell is live; the value could not be inserted, or a
    /// mid-range removal could not split. The set is unchanged.
    #[error("all node cells are in use")]
    TreeFull,

    /// The value is already covered by a stored range. The set is unchanged.
    #[error("value is already present")]
    DuplicateValue,

    /// No stored range covers the value. The set is unchanged.
    #[error("value is not present")]
    ValueNotFound,
}
