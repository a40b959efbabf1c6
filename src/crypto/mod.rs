//! Cryptographic primitives used by the session handshake and encrypted
//! phase: SHA-256, HMAC-SHA-256, single-block AES-256-CBC, and a CSPRNG.
//!
//! These are thin wrappers around RustCrypto crates. Keeping them behind a
//! small set of free functions (rather than re-exporting the crates
//! directly) gives the session state machine a narrow, fixed-size-array
//! surface to call against and keeps the key/IV bookkeeping in one place.

// SPDX-License-Identifier: AGPL-3.0-or-later

use aes::Aes256;
use cbc::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest and of every session key derived from it.
pub const DIGEST_LEN: usize = 32;
/// AES block size used by the single-block CBC helpers below.
pub const BLOCK_LEN: usize = 16;

/// `SHA256(data)`.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `HMAC-SHA256(key, data)`.
pub fn hmac_sha256(key: &[u8; DIGEST_LEN], data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// A source of cryptographically secure random bytes, abstracted so tests
/// can substitute a deterministic source for the challenge/IV material.
pub trait Csprng: Send {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Production CSPRNG backed by the operating system.
#[derive(Default)]
pub struct OsCsprng;

impl Csprng for OsCsprng {
    fn fill(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Single-block AES-256-CBC encryption with a caller-managed, chained IV.
///
/// The session protocol runs CBC across the lifetime of the whole
/// encrypted channel rather than resetting the IV per message: callers are
/// expected to feed the returned ciphertext/plaintext block back in as the
/// next call's `iv`. See [`crate::session`] for the chaining contract.
pub struct Aes256CbcBlock {
    cipher: Aes256,
}

impl Aes256CbcBlock {
    pub fn new(key: &[u8; DIGEST_LEN]) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypts one 16-byte block. `iv` is XORed into the plaintext before
    /// the block cipher runs, per CBC.
    pub fn encrypt_block(
        &self,
        iv: &[u8; BLOCK_LEN],
        plaintext: &[u8; BLOCK_LEN],
    ) -> [u8; BLOCK_LEN] {
        let mut block = [0u8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            block[i] = plaintext[i] ^ iv[i];
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        self.cipher.encrypt_block(&mut ga);
        ga.into()
    }

    /// Decrypts one 16-byte block.
    pub fn decrypt_block(
        &self,
        iv: &[u8; BLOCK_LEN],
        ciphertext: &[u8; BLOCK_LEN],
    ) -> [u8; BLOCK_LEN] {
        let mut ga = GenericArray::clone_from_slice(ciphertext);
        self.cipher.decrypt_block(&mut ga);
        let mut block: [u8; BLOCK_LEN] = ga.into();
        for i in 0..BLOCK_LEN {
            block[i] ^= iv[i];
        }
        block
    }
}
