//! # B+Tree Index
//!
//! A B+tree over the pager: every node occupies exactly one page, all
//! key-value pairs live in leaves, interior nodes hold only routing keys, and
//! leaves are linked left-to-right in key order.
//!
//! ## Node Layout
//!
//! Unlike slotted-page designs, nodes store fixed-size keys and values in
//! flat arrays whose offsets are a pure function of the page size, the key
//! and value sizes and alignments, and an optional order hint:
//!
//! ```text
//! Leaf page:
//! +---------------------------+
//! | NodeHeader (4 bytes)      |
//! +---------------------------+
//! | keys[ORDER_LEAF]          |  aligned to K
//! +---------------------------+
//! | values[ORDER_LEAF]        |  aligned to V
//! +---------------------------+
//! | ...                       |
//! | next_leaf: PageId (4B)    |  last 4 bytes of the page
//! +---------------------------+
//!
//! Interior page:
//! +---------------------------+
//! | NodeHeader (4 bytes)      |
//! +---------------------------+
//! | keys[ORDER_INTERNAL]      |  aligned to K
//! +---------------------------+
//! | children[ORDER_INTERNAL+1]|  PageIds, 4-byte aligned
//! +---------------------------+
//! ```
//!
//! An interior node with `n` keys has `n + 1` children; subtree `i` holds
//! keys strictly below `keys[i]`, subtree `i + 1` holds keys at or above it.
//!
//! ## Insertion
//!
//! Splits are pre-emptive and top-down: descending from the root, any full
//! child is split *before* the descent continues, so the recursion never
//! visits a full node and a leaf insertion always has room. When the root
//! itself is full it is split first, growing the tree by one level.
//!
//! Leaf splits promote a *copy* of the new right sibling's first key (the
//! pair stays in the leaf); interior splits *move* the split-point key up.
//!
//! ## Keys and values
//!
//! Keys and values are fixed-size `Copy` types read and written through
//! `zerocopy`, so any `#[repr(C)]` plain-data struct works. Ordering is
//! supplied by the caller: every operation takes a comparator, and the tree
//! imposes no `Ord` bound of its own.

mod interior;
mod leaf;
mod node;
mod tree;

pub use node::{NodeHeader, NodeKind, NodeLayout, NODE_HEADER_SIZE};
pub use tree::BTree;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Marker for fixed-size plain-data types that can live directly in node
/// pages. Blanket-implemented; deriving the `zerocopy` traits on a
/// `#[repr(C)]` struct is enough.
pub trait Storable: FromBytes + IntoBytes + Immutable + KnownLayout + Copy {}

impl<T: FromBytes + IntoBytes + Immutable + KnownLayout + Copy> Storable for T {}
