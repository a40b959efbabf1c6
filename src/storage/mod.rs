//! Storage backend abstraction: sector-granular erase/program/verify plus an
//! atomic whole-sector replace used by the settings store.

// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Errors surfaced by a [`StorageBackend`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("length {0} exceeds sector size {1}")]
    InvalidArg(u32, u32),
    #[error("post-write verification failed")]
    Corrupt,
    #[error("backing storage I/O error: {0}")]
    Io(String),
}

/// A sector-granular, byte-addressable storage region.
///
/// Implementations are expected to model real flash semantics: erased bytes
/// read as `0xFF`, `program` can only clear bits (never set them) within a
/// page, and `erase` resets a whole sector to `0xFF`.
pub trait StorageBackend: Send {
    /// Size of the region in bytes. Always a multiple of `sector_size`.
    fn len(&self) -> u32;

    /// True when [`StorageBackend::len`] is zero.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Erase granularity.
    fn sector_size(&self) -> u32;

    /// Program granularity.
    fn page_size(&self) -> u32;

    /// Reads the whole region into `out`. `out.len()` must equal
    /// [`StorageBackend::len`].
    fn read(&self, out: &mut [u8]);

    /// Erases the single sector backing this region.
    fn erase_sector(&mut self) -> Result<(), StorageError>;

    /// Programs `data` starting at byte offset `offset`, which must be page
    /// aligned. `data.len()` must be a multiple of the page size except for
    /// the final call, which may be shorter (the backend pads with `0xFF`).
    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError>;

    /// Replaces the entire sector with `data` (`data.len() <= len()`),
    /// erasing first, programming page by page, and verifying every byte —
    /// including the byte immediately after `data` when `data` doesn't fill
    /// the sector, which must read back as `0xFF`.
    fn atomic_replace(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let sector_size = self.sector_size();
        if data.len() as u32 > sector_size {
            return Err(StorageError::InvalidArg(data.len() as u32, sector_size));
        }

        self.erase_sector()?;

        let page_size = self.page_size() as usize;
        let mut offset = 0usize;
        while offset < data.len() {
            let end = (offset + page_size).min(data.len());
            self.program(offset as u32, &data[offset..end])?;
            offset = end;
        }

        let mut verify = vec![0u8; sector_size as usize];
        self.read(&mut verify);
        if verify[..data.len()] != *data {
            return Err(StorageError::Corrupt);
        }
        if data.len() < verify.len() && verify[data.len()] != 0xFF {
            return Err(StorageError::Corrupt);
        }

        Ok(())
    }
}

impl StorageBackend for Box<dyn StorageBackend> {
    fn len(&self) -> u32 {
        (**self).len()
    }

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    fn read(&self, out: &mut [u8]) {
        (**self).read(out)
    }

    fn erase_sector(&mut self) -> Result<(), StorageError> {
        (**self).erase_sector()
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        (**self).program(offset, data)
    }
}

/// An in-memory [`StorageBackend`] used by tests and by the demo binary when
/// no real flash device is available.
pub struct MemoryStorage {
    bytes: Vec<u8>,
    sector_size: u32,
    page_size: u32,
}

impl MemoryStorage {
    /// Creates a backend of `len` bytes, initialized as erased (`0xFF`).
    pub fn new(len: u32, sector_size: u32, page_size: u32) -> Self {
        Self {
            bytes: vec![0xFF; len as usize],
            sector_size,
            page_size,
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn read(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.bytes);
    }

    fn erase_sector(&mut self) -> Result<(), StorageError> {
        self.bytes.fill(0xFF);
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.bytes.len() {
            return Err(StorageError::InvalidArg(end as u32, self.bytes.len() as u32));
        }
        // A real flash device can only clear bits during program; model
        // that so a buggy caller that tries to set an already-cleared bit
        // back to 1 without an erase is caught by verification.
        for (dst, src) in self.bytes[start..end].iter_mut().zip(data) {
            *dst &= *src;
        }
        Ok(())
    }
}
