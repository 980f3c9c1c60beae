//! # Pager Error Kinds
//!
//! The pager distinguishes a small set of error conditions that callers react
//! to programmatically (retry after rollback, report a locked database, and so
//! on). These are modeled as a `thiserror` enum and travel inside the
//! `eyre::Report` used throughout the crate; call sites that need to
//! discriminate use `Report::downcast_ref::<PagerError>()`, everything else
//! just propagates.
//!
//! Plain I/O and mapping failures are not enumerated here. They are wrapped
//! with context (path, page number, operation) at the point of failure and
//! flow up unchanged.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::PageId;

/// Error conditions the storage engine distinguishes for its callers.
#[derive(Debug, Error)]
pub enum PagerError {
    /// The file exists but its magic, version, page size or page count do not
    /// describe a database this build can open.
    #[error("not a valid database: {path}")]
    InvalidDatabase { path: PathBuf },

    /// Another process holds the exclusive advisory lock.
    #[error("database is locked by another process: {path}")]
    LockBusy { path: PathBuf },

    /// `begin_tx` was called while a transaction is already open.
    #[error("a transaction is already active")]
    TransactionActive,

    /// A mutating operation was attempted outside a transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A page id at or beyond the allocation frontier was requested.
    #[error("page {page_no} out of bounds (page_count={page_count})")]
    PageOutOfBounds { page_no: PageId, page_count: u32 },

    /// Page 0 holds the database metadata and can never enter the free list.
    #[error("the metadata page cannot be freed")]
    CannotFreeMetaPage,
}
