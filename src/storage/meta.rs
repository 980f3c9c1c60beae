//! # Metadata Page Header
//!
//! Page 0 of every database file begins with a fixed 32-byte header holding
//! all database-wide state: the magic and format version, the page size the
//! file was built with, the file capacity in pages, the free-list head, the
//! tree root, and the committed-transaction counter.
//!
//! ## Layout (little-endian)
//!
//! ```text
//! Offset  Size  Field           Description
//! ------  ----  --------------  ----------------------------------------
//! 0       4     magic           0x5A444221 ("ZDB!")
//! 4       4     version         Format version, currently 1
//! 8       4     page_size       Page size the file was created with
//! 12      4     page_count      File capacity in pages (== file len / page)
//! 16      4     free_list_head  PageId of the first free page, 0 = empty
//! 20      4     root_page       PageId of the tree root, 0 = no tree yet
//! 24      8     tx_id           Committed transaction counter
//! ```
//!
//! The rest of the page is reserved and zeroed on initialization.
//!
//! The struct is a `zerocopy` view: `from_bytes`/`from_bytes_mut` reinterpret
//! the mapped page in place, so metadata mutations are ordinary page writes
//! and participate in the pager's snapshot/rollback discipline like any other
//! page.

use std::mem::size_of;

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{PageId, PAGE_SIZE};

/// "ZDB!": the first four bytes of every database file (little-endian).
pub const MAGIC: u32 = 0x5A44_4221;

pub const CURRENT_VERSION: u32 = 1;

/// The metadata page id. Never allocated, never freed.
pub const META_PAGE_NO: PageId = 0;

pub const META_HEADER_SIZE: usize = 32;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaPage {
    magic: U32,
    version: U32,
    page_size: U32,
    page_count: U32,
    free_list_head: U32,
    root_page: U32,
    tx_id: U64,
}

const _: () = assert!(size_of::<MetaPage>() == META_HEADER_SIZE);

impl MetaPage {
    /// Header for a freshly initialized database of `page_count` pages.
    pub fn new(page_count: u32) -> Self {
        Self {
            magic: U32::new(MAGIC),
            version: U32::new(CURRENT_VERSION),
            page_size: U32::new(PAGE_SIZE as u32),
            page_count: U32::new(page_count),
            free_list_head: U32::new(0),
            root_page: U32::new(0),
            tx_id: U64::new(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= META_HEADER_SIZE,
            "buffer too small for MetaPage: {} < {}",
            bytes.len(),
            META_HEADER_SIZE
        );

        Self::ref_from_bytes(&bytes[..META_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse MetaPage: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= META_HEADER_SIZE,
            "buffer too small for MetaPage: {} < {}",
            bytes.len(),
            META_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut bytes[..META_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse MetaPage: {:?}", e))
    }

    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count.get()
    }

    pub fn set_page_count(&mut self, count: u32) {
        self.page_count = U32::new(count);
    }

    pub fn free_list_head(&self) -> PageId {
        self.free_list_head.get()
    }

    pub fn set_free_list_head(&mut self, page_no: PageId) {
        self.free_list_head = U32::new(page_no);
    }

    pub fn root_page(&self) -> PageId {
        self.root_page.get()
    }

    pub fn set_root_page(&mut self, page_no: PageId) {
        self.root_page = U32::new(page_no);
    }

    pub fn tx_id(&self) -> u64 {
        self.tx_id.get()
    }

    pub fn set_tx_id(&mut self, tx_id: u64) {
        self.tx_id = U64::new(tx_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_header_size_is_32() {
        assert_eq!(size_of::<MetaPage>(), 32);
    }

    #[test]
    fn meta_new_initializes_all_fields() {
        let meta = MetaPage::new(16);

        assert_eq!(meta.magic(), MAGIC);
        assert_eq!(meta.version(), CURRENT_VERSION);
        assert_eq!(meta.page_size(), PAGE_SIZE as u32);
        assert_eq!(meta.page_count(), 16);
        assert_eq!(meta.free_list_head(), 0);
        assert_eq!(meta.root_page(), 0);
        assert_eq!(meta.tx_id(), 0);
    }

    #[test]
    fn meta_roundtrip_through_page_bytes() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[..META_HEADER_SIZE].copy_from_slice(MetaPage::new(16).as_bytes());

        {
            let meta = MetaPage::from_bytes_mut(&mut page).unwrap();
            meta.set_page_count(32);
            meta.set_free_list_head(7);
            meta.set_root_page(3);
            meta.set_tx_id(42);
        }

        let meta = MetaPage::from_bytes(&page).unwrap();
        assert_eq!(meta.page_count(), 32);
        assert_eq!(meta.free_list_head(), 7);
        assert_eq!(meta.root_page(), 3);
        assert_eq!(meta.tx_id(), 42);
    }

    #[test]
    fn meta_magic_is_zdb_bang() {
        let meta = MetaPage::new(16);
        let bytes = meta.as_bytes();
        // Stored little-endian: the u32 0x5A444221 reads "ZDB!" high to low.
        assert_eq!(&bytes[..4], &[0x21, 0x42, 0x44, 0x5A]);
    }

    #[test]
    fn meta_from_bytes_too_small() {
        let bytes = [0u8; 16];
        let result = MetaPage::from_bytes(&bytes);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("buffer too small"));
    }
}
