//! Derivation and caching of the shared authentication secret used by the
//! session handshake's HMAC.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::{crypto::DIGEST_LEN, settings::SettingsStore, storage::StorageBackend};

/// Settings key holding the raw shared secret text.
pub const UPDATE_SECRET_KEY: &str = "update_secret";

/// Caches the 32-byte digest derived from the `update_secret` settings
/// value, so the handshake doesn't re-hash it on every connection.
///
/// Derivation iterates SHA-256 `rounds` times:
/// `digest_0 = 0^32`, `digest_{n} = SHA256(digest_{n-1} || secret)`.
/// A larger round count makes brute-forcing the raw secret from a captured
/// digest more expensive without changing the wire protocol at all — the
/// digest, not the raw secret, is what ever gets used as an HMAC key.
pub struct SecretCache {
    digest: [u8; DIGEST_LEN],
    rounds: u32,
    valid: bool,
}

impl SecretCache {
    /// Builds an (initially invalid) cache with no secret loaded.
    pub fn empty(rounds: u32) -> Self {
        Self {
            digest: [0u8; DIGEST_LEN],
            rounds,
            valid: false,
        }
    }

    /// Re-derives the digest from the settings store's current
    /// `update_secret` value. Called at startup and whenever a handler
    /// rewrites the settings file.
    pub fn reload<S: StorageBackend>(&mut self, store: &SettingsStore<S>) {
        match store.get(UPDATE_SECRET_KEY) {
            Ok(secret) => {
                self.digest = derive(secret.as_bytes(), self.rounds);
                self.valid = true;
            },
            Err(_) => {
                self.digest = [0u8; DIGEST_LEN];
                self.valid = false;
            },
        }
    }

    /// Whether a secret is currently loaded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The current 32-byte digest. Only meaningful when
    /// [`SecretCache::is_valid`] is true.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

fn derive(secret: &[u8], rounds: u32) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    for _ in 0..rounds {
        let mut input = Vec::with_capacity(DIGEST_LEN + secret.len());
        input.extend_from_slice(&digest);
        input.extend_from_slice(secret);
        digest = crate::crypto::sha256(&input);
    }
    digest
}
