//! RAM-mirrored settings store, backed by a [`StorageBackend`].

// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};

use crate::{
    settings::codec::{self, SettingsError},
    storage::StorageBackend,
};

/// The settings store: a RAM mirror of the backing sector plus the codec
/// operations that mutate it.
pub struct SettingsStore<S: StorageBackend> {
    storage: S,
    image: Vec<u8>,
}

impl<S: StorageBackend> SettingsStore<S> {
    /// Loads the settings image from `storage`.
    pub fn load(mut storage: S) -> Self {
        let mut image = vec![0u8; storage.len() as usize];
        storage.read(&mut image);
        image.truncate(codec::logical_len(&image));
        Self { storage, image }
    }

    /// Reloads the RAM mirror from the backing storage, discarding any
    /// in-memory edits that have not been saved.
    pub fn reload(&mut self) {
        let mut image = vec![0u8; self.storage.len() as usize];
        self.storage.read(&mut image);
        image.truncate(codec::logical_len(&image));
        self.image = image;
    }

    fn capacity(&self) -> usize {
        self.storage.len() as usize
    }

    /// Looks up `key`, returning its value as a UTF-8 string. Non-UTF-8
    /// values are rejected with [`SettingsError::InvalidArg`] — the wire
    /// protocol and the settings format are byte-oriented, but every key
    /// this crate defines stores text.
    pub fn get(&self, key: &str) -> Result<&str, SettingsError> {
        let bytes = codec::get(&self.image, key)?;
        std::str::from_utf8(bytes).map_err(|_| SettingsError::InvalidArg)
    }

    /// Sets `key` to `value` in the RAM mirror. Call [`SettingsStore::save`]
    /// to persist the change.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        codec::set(&mut self.image, self.capacity(), key, value)
    }

    /// Removes every line matching `key` from the RAM mirror.
    pub fn discard(&mut self, key: &str) {
        codec::discard(&mut self.image, key)
    }

    /// Walks the RAM mirror one `key=value` pair at a time.
    pub fn enumerate(&self, cursor: usize) -> Option<(&str, &str, usize)> {
        let entry = codec::enumerate(&self.image, cursor)?;
        let key = std::str::from_utf8(entry.key).ok()?;
        let value = std::str::from_utf8(entry.value).ok()?;
        Some((key, value, entry.next_cursor))
    }

    /// Current logical image, for handlers that need the raw bytes (e.g.
    /// the `PicoInfo` handler's diagnostic dump, or a remote `Update`).
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Erase granularity of the backing sector, for diagnostics
    /// (`PicoInfo`'s `flash_sector_size`).
    pub fn sector_size(&self) -> u32 {
        self.storage.sector_size()
    }

    /// Byte size of the managed region, for diagnostics (`PicoInfo`'s
    /// flash range fields). This crate manages one settings file per
    /// sector, so the whole region and the settings file occupy the same
    /// range.
    pub fn file_size(&self) -> u32 {
        self.storage.len()
    }

    /// Overwrites the entire RAM mirror with `raw` (used by the `Update`
    /// and `UpdateReboot` handlers, which receive a full settings image
    /// over the wire rather than a single key/value edit).
    pub fn replace_raw(&mut self, raw: &[u8]) -> Result<(), SettingsError> {
        if raw.len() > self.capacity() {
            return Err(SettingsError::NoSpace);
        }
        self.image = raw[..codec::logical_len(raw)].to_vec();
        Ok(())
    }

    /// Persists the RAM mirror via the storage backend's atomic sector
    /// replace.
    pub fn save(&mut self) -> Result<()> {
        self.storage
            .atomic_replace(&self.image)
            .context("failed to persist settings image")
    }
}
