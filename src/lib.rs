//! Range-coalescing custody ID tracking for Bundle Protocol agents.
//!
//! This crate provides [`RangeSet`], an ordered set of `u32` custody IDs
//! that stores maximal runs of consecutive IDs as single nodes in a
//! fixed-capacity red-black tree. Custody acknowledgment traffic is bursty
//! and dense — IDs arrive mostly in order with occasional gaps — so runs
//! keep the working set tiny, and the pre-allocated node arena keeps every
//! operation off the allocator.
//!
//! # Example
//!
//! ```
//! use custody_ranges::RangeSet;
//!
//! let mut acked = RangeSet::with_capacity(64).unwrap();
//!
//! // Bundles 0..=4 arrive, with 2 delayed.
//! for id in [0, 1, 3, 4] {
//!     acked.insert(id).unwrap();
//! }
//! assert_eq!(format!("{acked:?}"), "{0..=1, 3..=4}");
//!
//! // The straggler fuses both runs into one node.
//! acked.insert(2).unwrap();
//! assert_eq!(format!("{acked:?}"), "{0..=4}");
//!
//! // Drain the set into an acknowledgment record, lowest run first.
//! let report: Vec<_> = acked.drain().collect();
//! assert_eq!(report.len(), 1);
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - only requires `alloc`, and allocates nothing
//!   after [`RangeSet::with_capacity`]
//! - **Automatic coalescing** - adjacent IDs extend runs in place; bridging
//!   IDs fuse neighboring runs and return the spare node to the arena
//! - **Splitting removal** - deleting an interior ID splits its run, with a
//!   fail-fast occupancy check so a full arena never half-applies
//! - **Three drain modes** - shared in-order iteration, a rebalancing
//!   [`drain`](RangeSet::drain) that can stop at a record boundary, and a
//!   consuming [`into_iter`](IntoIterator::into_iter) that splices nodes
//!   out in amortized constant time
//!
//! # Implementation
//!
//! Nodes live in a slot arena indexed by niche-optimized handles; links are
//! 4-byte indices rather than pointers, and freed cells are recycled
//! through a free stack that is reserved alongside the slots. The tree is a
//! red-black tree ordered by run start, with the extra structural rule that
//! neighboring runs are separated by at least one absent ID — a violation
//! would mean a merge was missed.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

extern crate alloc;

mod error;
mod range;
mod range_set;
mod raw;

pub use error::{Error, Result};
pub use range::Range;
pub use range_set::{Drain, IntoIter, Iter, RangeSet};
