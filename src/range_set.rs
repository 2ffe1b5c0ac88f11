use core::fmt;
use core::iter::FusedIterator;

use smallvec::SmallVec;

use crate::error::Result;
use crate::range::Range;
use crate::raw::{Handle, RawRangeTree, MAX_CAPACITY};

/// Deepest root-to-leaf path the borrowing iterator can meet: a red-black
/// tree of at most [`RangeSet::MAX_CAPACITY`] nodes is at most 64 levels
/// tall, so the traversal stack never leaves its inline buffer.
const MAX_DEPTH: usize = 64;

/// An ordered set of `u32` custody IDs, stored as maximal runs of
/// consecutive IDs in a fixed-capacity red-black tree.
///
/// Inserting an ID adjacent to a stored run extends the run in place;
/// inserting the last missing ID between two runs fuses them into one node.
/// Removing an ID from the middle of a run splits it. All node storage is
/// reserved once at creation: no operation after [`with_capacity`] touches
/// the allocator, which is what makes the set usable for custody tracking
/// in flight software.
///
/// Capacity is counted in runs, not IDs. A set of capacity `n` can hold up
/// to `n` disjoint runs covering any number of IDs; [`insert`] reports
/// [`Error::TreeFull`](crate::Error::TreeFull) only when a new run is needed and every node cell is
/// live.
///
/// # Examples
///
/// ```
/// use custody_ranges::RangeSet;
///
/// let mut acked = RangeSet::with_capacity(16).unwrap();
/// acked.insert(7).unwrap();
/// acked.insert(9).unwrap();
/// acked.insert(8).unwrap();
///
/// // 7, 8, 9 coalesced into a single run.
/// assert_eq!(acked.len(), 1);
/// assert!(acked.contains(8));
/// assert_eq!(format!("{acked:?}"), "{7..=9}");
/// ```
///
/// [`with_capacity`]: RangeSet::with_capacity
/// [`insert`]: RangeSet::insert
#[derive(Clone)]
pub struct RangeSet {
    tree: RawRangeTree,
}

impl RangeSet {
    /// Most node cells a set can reserve: half the ID domain plus one.
    ///
    /// A fuller set is impossible to need — once every other ID is present,
    /// any further insertion is adjacent to an existing run and merges
    /// rather than claiming a cell.
    pub const MAX_CAPACITY: usize = MAX_CAPACITY;

    /// Creates a set with room for exactly `capacity` runs, reserving all
    /// node storage up front.
    ///
    /// # Errors
    ///
    /// - [`Error::ZeroCapacity`](crate::Error::ZeroCapacity) if `capacity` is zero.
    /// - [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if `capacity` exceeds
    ///   [`MAX_CAPACITY`](Self::MAX_CAPACITY).
    /// - [`Error::AllocationFailed`](crate::Error::AllocationFailed) if the reservation cannot be satisfied.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Error, RangeSet};
    ///
    /// assert!(RangeSet::with_capacity(64).is_ok());
    /// assert_eq!(RangeSet::with_capacity(0), Err(Error::ZeroCapacity));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(capacity) for the reservation; nothing later allocates.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self { tree: RawRangeTree::try_with_capacity(capacity)? })
    }

    /// Number of runs the set can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    /// Number of runs currently stored. Each run covers one or more IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether no IDs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Whether every node cell is live.
    ///
    /// A full set still accepts IDs adjacent to stored runs; only values
    /// that would start a new run are refused.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tree.is_full()
    }

    /// Whether some stored run covers `id`.
    ///
    /// # Complexity
    ///
    /// O(log n).
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.tree.contains(id)
    }

    /// The stored run covering `id`, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Range, RangeSet};
    ///
    /// let mut set = RangeSet::with_capacity(4).unwrap();
    /// for id in 10..=13 {
    ///     set.insert(id).unwrap();
    /// }
    /// assert_eq!(set.range_containing(12), Some(Range::new(10, 3)));
    /// assert_eq!(set.range_containing(14), None);
    /// ```
    #[must_use]
    pub fn range_containing(&self, id: u32) -> Option<Range> {
        self.tree.range_containing(id)
    }

    /// The lowest stored run.
    #[must_use]
    pub fn first(&self) -> Option<Range> {
        self.tree.first()
    }

    /// The highest stored run.
    #[must_use]
    pub fn last(&self) -> Option<Range> {
        self.tree.last()
    }

    /// Inserts `id`, extending or fusing adjacent runs where possible.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateValue`](crate::Error::DuplicateValue) if `id` is already covered. The set is
    ///   unchanged; callers distinguish "already acknowledged" this way.
    /// - [`Error::TreeFull`](crate::Error::TreeFull) if `id` needs a new run and every cell is
    ///   live. The set is unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Error, RangeSet};
    ///
    /// let mut set = RangeSet::with_capacity(8).unwrap();
    /// set.insert(3).unwrap();
    /// set.insert(5).unwrap();
    /// assert_eq!(set.len(), 2);
    ///
    /// // 4 bridges the gap; three runs become one node.
    /// set.insert(4).unwrap();
    /// assert_eq!(set.len(), 1);
    /// assert_eq!(set.insert(4), Err(Error::DuplicateValue));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n), allocation-free.
    pub fn insert(&mut self, id: u32) -> Result<()> {
        self.tree.insert(id)
    }

    /// Removes `id` from whichever run covers it.
    ///
    /// Removing an interior ID splits the run in two, which claims one node
    /// cell for the upper segment.
    ///
    /// # Errors
    ///
    /// - [`Error::ValueNotFound`](crate::Error::ValueNotFound) if no run covers `id`.
    /// - [`Error::TreeFull`](crate::Error::TreeFull) if a split is needed and every cell is live.
    ///   The run is left intact; the occupancy check happens before any
    ///   mutation.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Range, RangeSet};
    ///
    /// let mut set = RangeSet::with_capacity(4).unwrap();
    /// for id in 5..=9 {
    ///     set.insert(id).unwrap();
    /// }
    /// set.remove(7).unwrap();
    ///
    /// let runs: Vec<Range> = set.iter().collect();
    /// assert_eq!(runs, vec![Range::new(5, 1), Range::new(8, 1)]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n), allocation-free.
    pub fn remove(&mut self, id: u32) -> Result<()> {
        self.tree.remove(id)
    }

    /// Removes and returns the lowest run, rebalancing the tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Range, RangeSet};
    ///
    /// let mut set = RangeSet::with_capacity(4).unwrap();
    /// set.insert(2).unwrap();
    /// set.insert(3).unwrap();
    /// set.insert(9).unwrap();
    ///
    /// assert_eq!(set.pop_first(), Some(Range::new(2, 1)));
    /// assert_eq!(set.pop_first(), Some(Range::new(9, 0)));
    /// assert_eq!(set.pop_first(), None);
    /// ```
    pub fn pop_first(&mut self) -> Option<Range> {
        self.tree.pop_first()
    }

    /// Empties the set. The node reservation is kept.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Visits the stored runs in ascending order without removing them.
    ///
    /// # Complexity
    ///
    /// O(1) amortized per step; the traversal stack lives inline, so
    /// iteration performs no allocation.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter { tree: &self.tree, stack: SmallVec::new(), remaining: self.tree.len() };
        iter.push_left_spine(self.tree.root());
        iter
    }

    /// Removes and yields the runs in ascending order, rebalancing after
    /// each step.
    ///
    /// Runs not yet yielded stay in the set when the iterator is dropped, so
    /// a caller filling a fixed-size acknowledgment record can stop at the
    /// record boundary and pick up the remainder later.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::RangeSet;
    ///
    /// let mut set = RangeSet::with_capacity(10).unwrap();
    /// for id in [6, 2, 3, 8, 10, 12, 11] {
    ///     set.insert(id).unwrap();
    /// }
    ///
    /// let acked: Vec<(u32, u32)> = set.drain().map(|r| (r.first(), r.last())).collect();
    /// assert_eq!(acked, vec![(2, 3), (6, 6), (8, 8), (10, 12)]);
    /// assert!(set.is_empty());
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) per step.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { tree: &mut self.tree }
    }
}

impl fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for range in self.iter() {
            set.entry(&range.as_inclusive());
        }
        set.finish()
    }
}

impl PartialEq for RangeSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for RangeSet {}

/// Borrowing in-order iterator over a set's runs.
///
/// Created by [`RangeSet::iter`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a> {
    tree: &'a RawRangeTree,
    stack: SmallVec<[Handle; MAX_DEPTH]>,
    remaining: usize,
}

impl Iter<'_> {
    fn push_left_spine(&mut self, mut cursor: Option<Handle>) {
        while let Some(handle) = cursor {
            self.stack.push(handle);
            cursor = self.tree.left(handle);
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Range;

    fn next(&mut self) -> Option<Range> {
        let handle = self.stack.pop()?;
        let range = self.tree.range_of(handle);
        self.push_left_spine(self.tree.right(handle));
        self.remaining -= 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

/// Draining in-order iterator that rebalances after every step.
///
/// Created by [`RangeSet::drain`]; un-yielded runs remain in the set.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Drain<'a> {
    tree: &'a mut RawRangeTree,
}

impl Iterator for Drain<'_> {
    type Item = Range;

    fn next(&mut self) -> Option<Range> {
        self.tree.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tree.len(), Some(self.tree.len()))
    }
}

impl ExactSizeIterator for Drain<'_> {}
impl FusedIterator for Drain<'_> {}

/// Owning in-order iterator that splices nodes out without rebalancing.
///
/// Created by [`RangeSet::into_iter`]. Each step detaches the minimum node
/// in O(1) amortized time; the tree's balance degrades as it drains, which
/// is harmless because the set has been consumed and can never be searched
/// again.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoIter {
    tree: RawRangeTree,
    cursor: Option<Handle>,
}

impl Iterator for IntoIter {
    type Item = Range;

    fn next(&mut self) -> Option<Range> {
        let min = self.cursor?;
        let (range, next) = self.tree.splice_min(min);
        self.cursor = next;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tree.len(), Some(self.tree.len()))
    }
}

impl ExactSizeIterator for IntoIter {}
impl FusedIterator for IntoIter {}

impl IntoIterator for RangeSet {
    type Item = Range;
    type IntoIter = IntoIter;

    /// Consumes the set into the fast one-shot drain.
    ///
    /// # Examples
    ///
    /// ```
    /// use custody_ranges::{Range, RangeSet};
    ///
    /// let mut set = RangeSet::with_capacity(8).unwrap();
    /// for id in [4, 5, 6, 20] {
    ///     set.insert(id).unwrap();
    /// }
    ///
    /// let runs: Vec<Range> = set.into_iter().collect();
    /// assert_eq!(runs, vec![Range::new(4, 2), Range::new(20, 0)]);
    /// ```
    fn into_iter(self) -> IntoIter {
        let cursor = self.tree.first_handle();
        IntoIter { tree: self.tree, cursor }
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = Range;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::vec::Vec;

    use super::*;

    fn set_of(ids: &[u32]) -> RangeSet {
        let mut set = RangeSet::with_capacity(16).unwrap();
        for &id in ids {
            set.insert(id).unwrap();
        }
        set
    }

    #[test]
    fn debug_renders_inclusive_runs() {
        let set = set_of(&[0, 1, 2, 5, 9, 10]);
        assert_eq!(format!("{set:?}"), "{0..=2, 5..=5, 9..=10}");
        assert_eq!(format!("{:?}", set_of(&[])), "{}");
    }

    #[test]
    fn equality_compares_run_sequences() {
        let a = set_of(&[1, 2, 3, 8]);
        let b = set_of(&[3, 8, 2, 1]);
        assert_eq!(a, b);
        assert_ne!(a, set_of(&[1, 2, 3]));
        assert_ne!(set_of(&[]), set_of(&[0]));
    }

    #[test]
    fn clone_preserves_contents_and_capacity() {
        let mut set = RangeSet::with_capacity(3).unwrap();
        set.insert(1).unwrap();
        set.insert(5).unwrap();

        let mut cloned = set.clone();
        assert_eq!(cloned, set);
        assert_eq!(cloned.capacity(), 3);
        cloned.insert(9).unwrap();
        assert!(cloned.is_full());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn iter_is_sized_and_fused() {
        let set = set_of(&[1, 5, 9]);
        let mut iter = set.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(Range::new(1, 0)));
        assert_eq!(iter.len(), 2);
        assert!(iter.by_ref().count() == 2 && iter.next().is_none());
    }

    #[test]
    fn drain_can_stop_at_a_record_boundary() {
        let mut set = set_of(&[1, 5, 9, 13]);
        let first_two: Vec<Range> = set.drain().take(2).collect();
        assert_eq!(first_two, alloc::vec![Range::new(1, 0), Range::new(5, 0)]);

        // The rest stayed behind and the set is still fully usable.
        assert_eq!(set.len(), 2);
        set.insert(10).unwrap();
        assert_eq!(format!("{set:?}"), "{9..=10, 13..=13}");
    }

    #[test]
    fn into_iter_consumes_everything() {
        let set = set_of(&[2, 3, 6, 10, 11, 12]);
        let runs: Vec<Range> = set.into_iter().collect();
        assert_eq!(runs, alloc::vec![Range::new(2, 1), Range::new(6, 0), Range::new(10, 2)]);
    }

    #[test]
    fn reference_iteration_matches_iter() {
        let set = set_of(&[4, 8, 9]);
        let by_ref: Vec<Range> = (&set).into_iter().collect();
        let by_iter: Vec<Range> = set.iter().collect();
        assert_eq!(by_ref, by_iter);
    }
}
