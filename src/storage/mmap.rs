//! # Memory-Mapped File Storage
//!
//! `MmapStorage` owns the database file, its exclusive advisory lock, and a
//! shared read-write memory mapping of the whole file. It is the only place
//! in the crate that touches the filesystem or `mmap`; everything above it
//! works with page ids and byte slices.
//!
//! ## Lifecycle
//!
//! [`MmapStorage::create`] builds a fresh file of `initial_page_count` zeroed
//! pages; [`MmapStorage::open`] maps an existing, non-empty file whose length
//! is a multiple of the page size. Both acquire the lock before touching file
//! contents, so two processes can never map the same database read-write.
//!
//! ## Growth
//!
//! `grow()` extends the file with `set_len` and replaces the mapping. Because
//! it takes `&mut self`, the compiler guarantees no page slice obtained from
//! this storage outlives the old mapping. Callers higher up must re-fetch
//! pages after any call that can grow the file.
//!
//! ## Durability
//!
//! `sync()` issues a blocking `msync` over the mapping and is the commit
//! durability barrier for the pager. Nothing here schedules background
//! flushes; until `sync()` returns, none of the mapped writes are guaranteed
//! to have reached the disk.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use fs2::FileExt;
use log::debug;
use memmap2::MmapMut;

use crate::error::PagerError;

use super::PAGE_SIZE;

#[derive(Debug)]
pub struct MmapStorage {
    file: File,
    mmap: MmapMut,
    page_count: u32,
}

impl MmapStorage {
    /// Maps an existing database file. The file must be non-empty and sized
    /// to a whole number of pages; its contents are not interpreted here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        lock_exclusive(&file, path)?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?;

        let file_size = metadata.len();

        ensure!(
            file_size > 0,
            "cannot open empty database file '{}'",
            path.display()
        );

        ensure!(
            file_size % PAGE_SIZE as u64 == 0,
            "database file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            PAGE_SIZE
        );

        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally, leading to undefined behavior. This is safe
        // because:
        // 1. The file carries an exclusive advisory lock for the lifetime of
        //    this value, so no cooperating process maps it concurrently
        // 2. The mmap lifetime is tied to MmapStorage, preventing
        //    use-after-unmap
        // 3. All access goes through page()/page_mut() which bounds-check the
        //    page id
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        debug!("opened '{}' ({} pages)", path.display(), page_count);

        Ok(Self {
            file,
            mmap,
            page_count,
        })
    }

    /// Creates (or truncates) the database file with `initial_page_count`
    /// zeroed pages and maps it.
    pub fn create<P: AsRef<Path>>(path: P, initial_page_count: u32) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            initial_page_count > 0,
            "initial page count must be at least 1"
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        lock_exclusive(&file, path)?;

        let file_size = initial_page_count as u64 * PAGE_SIZE as u64;

        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally. This is safe because:
        // 1. We just created this file and hold its exclusive advisory lock
        // 2. The file size is set to a valid multiple of PAGE_SIZE
        // 3. The mmap lifetime is tied to MmapStorage, preventing
        //    use-after-unmap
        // 4. All access goes through page()/page_mut() which bounds-check the
        //    page id
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        debug!(
            "created '{}' ({} pages)",
            path.display(),
            initial_page_count
        );

        Ok(Self {
            file,
            mmap,
            page_count: initial_page_count,
        })
    }

    pub fn page(&self, page_no: u32) -> Result<&[u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * PAGE_SIZE;
        Ok(&self.mmap[offset..offset + PAGE_SIZE])
    }

    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut [u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * PAGE_SIZE;
        Ok(&mut self.mmap[offset..offset + PAGE_SIZE])
    }

    pub fn grow(&mut self, new_page_count: u32) -> Result<()> {
        if new_page_count <= self.page_count {
            return Ok(());
        }

        self.mmap
            .flush_async()
            .wrap_err("failed to flush mmap before grow")?;

        let new_size = new_page_count as u64 * PAGE_SIZE as u64;

        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", new_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because the old mmap becomes
        // invalid. This is safe because:
        // 1. grow() requires &mut self, so no page references can exist
        //    (borrow checker)
        // 2. We flushed the old mmap above, ensuring data is written to disk
        // 3. The file was extended to new_size before remapping
        // 4. The old mmap is dropped when we assign the new one
        self.mmap =
            unsafe { MmapMut::map_mut(&self.file).wrap_err("failed to remap file after grow")? };

        self.page_count = new_page_count;

        Ok(())
    }

    /// Blocking flush of the whole mapping. Returns only after the OS has
    /// accepted the writes for durable storage.
    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync mmap to disk")
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn file_size(&self) -> u64 {
        self.page_count as u64 * PAGE_SIZE as u64
    }
}

impl Drop for MmapStorage {
    fn drop(&mut self) {
        // Unlock errors on drop are ignored deliberately; closing the file
        // releases the lock regardless.
        let _ = self.file.unlock();
    }
}

/// Takes the exclusive advisory lock, mapping contention to `LockBusy`.
fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(PagerError::LockBusy {
            path: path.to_path_buf(),
        }
        .into()),
        Err(e) => {
            Err(e).wrap_err_with(|| format!("failed to lock database file '{}'", path.display()))
        }
    }
}
