//! # Storage Module
//!
//! The foundational layer of the engine: a single database file organized as
//! an array of fixed-size pages, accessed through a shared read-write memory
//! mapping.
//!
//! ## Architecture Overview
//!
//! Instead of copying page data between kernel and user space, the whole file
//! is mapped into the process address space. This gives:
//!
//! - **Zero-copy reads**: `page()` returns a `&[u8]` slice pointing directly
//!   into the mapping
//! - **Minimal syscall overhead**: page faults are handled transparently by
//!   the OS
//! - **A single source of truth**: the mapping *is* the current database
//!   state; there are no side buffers to reconcile
//!
//! ## File Layout
//!
//! ```text
//! Offset 0:        Page 0, the metadata page (MetaPage header + reserved)
//! Offset 4096:     Page 1
//! Offset 8192:     Page 2
//! ...
//! ```
//!
//! Pages are addressed by a 32-bit [`PageId`]; page 0 is reserved for the
//! metadata page and is never allocated or freed. The file size is always a
//! multiple of [`PAGE_SIZE`].
//!
//! ## Safety Model
//!
//! Memory-mapped regions become invalid when the file is grown and remapped.
//! Rather than runtime schemes (hazard pointers, epochs, reference counting)
//! the borrow checker enforces safety at compile time:
//!
//! ```text
//! MmapStorage::page(&self) -> &[u8]        // borrows &self immutably
//! MmapStorage::grow(&mut self)             // requires &mut self exclusively
//! ```
//!
//! No page reference can be held across a `grow()` call. Higher layers that
//! work with page *ids* instead of borrows (the pager, the tree) re-fetch
//! pages after any operation that can grow the file.
//!
//! ## Single-Writer Locking
//!
//! The database file carries an exclusive advisory lock (`fs2`) for its whole
//! open lifetime. A second opener, from this or any other process, fails
//! with `PagerError::LockBusy`. There is no in-process synchronization; the
//! engine is single-threaded by design.
//!
//! ## Module Organization
//!
//! - `mmap`: low-level memory-mapped storage ([`MmapStorage`])
//! - `meta`: the metadata page header ([`MetaPage`])

mod meta;
mod mmap;

pub use meta::{MetaPage, CURRENT_VERSION, MAGIC, META_HEADER_SIZE, META_PAGE_NO};
pub use mmap::MmapStorage;

/// 32-bit page index into the database file. Page 0 is the metadata page.
pub type PageId = u32;

/// Size of every page, equal to the smallest memory-mapping granularity on
/// the supported platforms.
pub const PAGE_SIZE: usize = 4096;

/// A fresh database file is extended to this many pages so the first handful
/// of allocations do not grow the file.
pub const INITIAL_PAGE_COUNT: u32 = 16;
