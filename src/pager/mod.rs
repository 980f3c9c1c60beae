//! # Pager
//!
//! The pager owns the mapped database file and layers three concerns on top
//! of raw page access:
//!
//! 1. **Allocation**: pages come from the free list when one is available,
//!    otherwise from the allocation frontier at the end of the used region,
//!    doubling the file when the frontier reaches the capacity.
//! 2. **Transactions**: a single writer brackets its mutations between
//!    [`Pager::begin_tx`] and [`Pager::commit_tx`]/[`Pager::rollback_tx`].
//!    All mutating operations fail outside a transaction; reads never need
//!    one.
//! 3. **Copy-on-write isolation**: the first write to a page within a
//!    transaction snapshots its pre-image into a heap buffer. Writes then go
//!    straight into the mapping, so later reads in the same transaction see
//!    them immediately; rollback copies every snapshot back byte-for-byte.
//!
//! ## Transaction state
//!
//! During a transaction the pager keeps two structures: the set of dirty page
//! ids and a map from page id to its pre-transaction snapshot. They cover the
//! same pages by construction; commit drops both after the durability flush,
//! rollback replays the snapshots first.
//!
//! ## Commit ordering
//!
//! Commit bumps `tx_id` in the metadata page (itself an ordinary dirty-page
//! write) and then issues one blocking flush over the mapping. With a single
//! writer and no concurrent readers that one barrier is sufficient: after
//! `commit_tx` returns, everything the transaction wrote (data pages and
//! metadata alike) is durable. A commit that dirtied nothing is a no-op and
//! does not bump `tx_id`.
//!
//! There is no write-ahead log. A crash between the start of the flush and
//! its completion can leave a mix of old and new pages on disk; this engine
//! knowingly inherits that limitation instead of hiding it behind a
//! half-measure.
//!
//! ## Frontier vs capacity
//!
//! `meta.page_count` records the file capacity (file length in pages) and is
//! kept equal to it even across rollback of a growing transaction; growth is
//! never undone. The allocation frontier lives only in memory: it starts at 1
//! on a fresh database and at the capacity on reopen, and is what
//! [`Pager::page`] bounds-checks against.
//!
//! ## Pointer invalidation
//!
//! [`Pager::alloc_page`] can double the file and remap it. Any page slice
//! previously obtained from the pager is invalidated by that; the borrow
//! checker enforces it because `alloc_page` takes `&mut self`. Callers keep
//! page *ids* across allocations, never borrows.

use std::fs;
use std::path::Path;

use eyre::{Result, WrapErr};
use hashbrown::{HashMap, HashSet};
use log::{debug, trace};
use zerocopy::IntoBytes;

use crate::error::PagerError;
use crate::storage::{
    MetaPage, MmapStorage, PageId, CURRENT_VERSION, INITIAL_PAGE_COUNT, MAGIC, META_HEADER_SIZE,
    META_PAGE_NO, PAGE_SIZE,
};

#[derive(Debug)]
struct TxState {
    dirty: HashSet<PageId>,
    snapshots: HashMap<PageId, Box<[u8]>>,
    start_page_count: u32,
}

impl TxState {
    fn new(start_page_count: u32) -> Self {
        Self {
            dirty: HashSet::new(),
            snapshots: HashMap::new(),
            start_page_count,
        }
    }
}

#[derive(Debug)]
pub struct Pager {
    storage: MmapStorage,
    /// Allocation frontier: the number of pages handed out so far.
    page_count: u32,
    tx: Option<TxState>,
}

impl Pager {
    /// Opens the database at `path`, creating and initializing it if the file
    /// is missing or empty. Takes the exclusive advisory lock either way;
    /// fails with [`PagerError::LockBusy`] if another process holds it and
    /// with [`PagerError::InvalidDatabase`] if an existing file does not
    /// validate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let existing = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        if existing {
            Self::open_existing(path)
        } else {
            Self::create(path)
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut storage = MmapStorage::create(path, INITIAL_PAGE_COUNT)?;

        let meta = MetaPage::new(INITIAL_PAGE_COUNT);
        storage.page_mut(META_PAGE_NO)?[..META_HEADER_SIZE].copy_from_slice(meta.as_bytes());
        storage
            .sync()
            .wrap_err("failed to flush initial metadata page")?;

        Ok(Self {
            storage,
            page_count: 1,
            tx: None,
        })
    }

    fn open_existing(path: &Path) -> Result<Self> {
        let storage = MmapStorage::open(path)?;

        let page0 = storage.page(META_PAGE_NO)?;
        let meta = MetaPage::from_bytes(page0)?;

        if meta.magic() != MAGIC {
            return Err(PagerError::InvalidDatabase {
                path: path.to_path_buf(),
            })
            .wrap_err_with(|| format!("bad magic {:#010x}", meta.magic()));
        }
        if meta.version() != CURRENT_VERSION {
            return Err(PagerError::InvalidDatabase {
                path: path.to_path_buf(),
            })
            .wrap_err_with(|| {
                format!(
                    "unsupported version {} (expected {})",
                    meta.version(),
                    CURRENT_VERSION
                )
            });
        }
        if meta.page_size() != PAGE_SIZE as u32 {
            return Err(PagerError::InvalidDatabase {
                path: path.to_path_buf(),
            })
            .wrap_err_with(|| {
                format!(
                    "page size {} does not match this build's {}",
                    meta.page_size(),
                    PAGE_SIZE
                )
            });
        }
        if meta.page_count() != storage.page_count() {
            return Err(PagerError::InvalidDatabase {
                path: path.to_path_buf(),
            })
            .wrap_err_with(|| {
                format!(
                    "metadata page_count {} does not match file size of {} pages",
                    meta.page_count(),
                    storage.page_count()
                )
            });
        }

        // The frontier is not persisted; after reopen every page within the
        // file is treated as allocated.
        let page_count = meta.page_count();

        Ok(Self {
            storage,
            page_count,
            tx: None,
        })
    }

    /// Number of pages handed out so far (the bound for valid page ids).
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// File capacity in pages.
    pub fn file_page_count(&self) -> u32 {
        self.storage.page_count()
    }

    pub fn tx_active(&self) -> bool {
        self.tx.is_some()
    }

    pub fn begin_tx(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(PagerError::TransactionActive.into());
        }
        self.tx = Some(TxState::new(self.page_count));
        trace!("transaction started");
        Ok(())
    }

    /// Makes the transaction's writes durable. Bumps `tx_id` and flushes the
    /// mapping, unless nothing was dirtied, in which case this is a no-op.
    pub fn commit_tx(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Err(PagerError::NoActiveTransaction.into());
        }

        let has_writes = self
            .tx
            .as_ref()
            .is_some_and(|tx| !tx.dirty.is_empty());

        if has_writes {
            let meta = self.meta_mut()?;
            let tx_id = meta.tx_id() + 1;
            meta.set_tx_id(tx_id);

            self.storage.sync().wrap_err("commit flush failed")?;

            let dirty = self.tx.as_ref().map_or(0, |tx| tx.dirty.len());
            debug!("committed tx {} ({} dirty pages)", tx_id, dirty);
        }

        self.tx = None;
        Ok(())
    }

    /// Restores every page modified in this transaction from its snapshot and
    /// discards the transaction. File growth is not undone; the metadata
    /// capacity is re-derived from the real file size afterwards. No-op when
    /// no transaction is active.
    pub fn rollback_tx(&mut self) -> Result<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };

        for (&page_no, snapshot) in tx.snapshots.iter() {
            self.storage.page_mut(page_no)?.copy_from_slice(snapshot);
        }
        self.page_count = tx.start_page_count;

        let capacity = self.storage.page_count();
        let meta = MetaPage::from_bytes_mut(self.storage.page_mut(META_PAGE_NO)?)?;
        if meta.page_count() != capacity {
            meta.set_page_count(capacity);
        }

        debug!("rolled back {} pages", tx.snapshots.len());
        Ok(())
    }

    /// Immutable view of a page. Readable without an active transaction.
    pub fn page(&self, page_no: PageId) -> Result<&[u8]> {
        self.check_bounds(page_no)?;
        self.storage.page(page_no)
    }

    /// Mutable view of a page. The first write to a page within the current
    /// transaction snapshots its pre-image for rollback; the returned slice
    /// aliases the mapping, so the mutation is immediately visible to reads.
    pub fn page_for_write(&mut self, page_no: PageId) -> Result<&mut [u8]> {
        self.check_bounds(page_no)?;

        let tx = self
            .tx
            .as_mut()
            .ok_or(PagerError::NoActiveTransaction)?;

        if !tx.dirty.contains(&page_no) {
            let snapshot = self.storage.page(page_no)?.to_vec().into_boxed_slice();
            tx.snapshots.insert(page_no, snapshot);
            tx.dirty.insert(page_no);
        }

        self.storage.page_mut(page_no)
    }

    /// Allocates a page: pops the free list if it is non-empty, otherwise
    /// advances the frontier, doubling the file first when it is full. The
    /// returned page is not zeroed.
    pub fn alloc_page(&mut self) -> Result<PageId> {
        if self.tx.is_none() {
            return Err(PagerError::NoActiveTransaction.into());
        }

        let head = self.meta()?.free_list_head();
        if head != 0 {
            self.check_bounds(head)?;
            // The next-free pointer sits in the first 4 bytes of a free page;
            // read it through the mapping before any writer touches the page.
            let page = self.storage.page(head)?;
            let next = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
            self.meta_mut()?.set_free_list_head(next);
            trace!("reused free page {}", head);
            return Ok(head);
        }

        if self.page_count == self.storage.page_count() {
            let new_capacity = self.storage.page_count() * 2;
            self.storage.grow(new_capacity)?;
            self.meta_mut()?.set_page_count(new_capacity);
            debug!("grew file to {} pages", new_capacity);
        }

        let page_no = self.page_count;
        self.page_count += 1;
        Ok(page_no)
    }

    /// Pushes a page onto the free list. Refuses the metadata page.
    pub fn free_page(&mut self, page_no: PageId) -> Result<()> {
        if self.tx.is_none() {
            return Err(PagerError::NoActiveTransaction.into());
        }
        if page_no == META_PAGE_NO {
            return Err(PagerError::CannotFreeMetaPage.into());
        }
        self.check_bounds(page_no)?;

        let head = self.meta()?.free_list_head();
        let page = self.page_for_write(page_no)?;
        page[..4].copy_from_slice(&head.to_le_bytes());
        self.meta_mut()?.set_free_list_head(page_no);
        Ok(())
    }

    /// Extends the file to at least `new_page_count` pages. Does not move the
    /// allocation frontier.
    pub fn grow(&mut self, new_page_count: u32) -> Result<()> {
        if new_page_count <= self.storage.page_count() {
            return Ok(());
        }

        self.storage.grow(new_page_count)?;
        if self.tx.is_some() {
            self.meta_mut()?.set_page_count(new_page_count);
        } else {
            MetaPage::from_bytes_mut(self.storage.page_mut(META_PAGE_NO)?)?
                .set_page_count(new_page_count);
        }
        debug!("grew file to {} pages", new_page_count);
        Ok(())
    }

    /// PageId of the tree root recorded in the metadata page (0 = none).
    pub fn root_page(&self) -> Result<PageId> {
        Ok(self.meta()?.root_page())
    }

    /// Records a new tree root. Requires an active transaction.
    pub fn set_root_page(&mut self, page_no: PageId) -> Result<()> {
        self.meta_mut()?.set_root_page(page_no);
        Ok(())
    }

    pub fn tx_id(&self) -> Result<u64> {
        Ok(self.meta()?.tx_id())
    }

    pub fn free_list_head(&self) -> Result<PageId> {
        Ok(self.meta()?.free_list_head())
    }

    /// Explicit flush of the mapping outside the commit path.
    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    fn meta(&self) -> Result<&MetaPage> {
        MetaPage::from_bytes(self.storage.page(META_PAGE_NO)?)
    }

    /// Mutable metadata view routed through the snapshot discipline, so
    /// metadata changes roll back with everything else.
    fn meta_mut(&mut self) -> Result<&mut MetaPage> {
        let page = self.page_for_write(META_PAGE_NO)?;
        MetaPage::from_bytes_mut(page)
    }

    fn check_bounds(&self, page_no: PageId) -> Result<()> {
        if page_no >= self.page_count {
            return Err(PagerError::PageOutOfBounds {
                page_no,
                page_count: self.page_count,
            }
            .into());
        }
        Ok(())
    }
}
