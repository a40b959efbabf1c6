//! Wire-level constants and the 16-byte block layouts used by the
//! handshake and the encrypted phase.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::crypto::sha256;

/// Every block on the wire, plaintext or encrypted, is this many bytes.
pub const BLOCK_LEN: usize = 16;

/// Protocol version advertised in the greeting.
pub const PROTOCOL_VERSION: u8 = 1;

/// Number of bytes of truncated SHA-256 used to authenticate an encrypted
/// block header. Deliberately narrow (7 of 32 bytes) — this is a wire
/// format constant, not a tunable; widening it would break compatibility
/// with anything speaking this protocol version.
pub const DATA_HASH_LEN: usize = 7;

/// Length of a handshake challenge (client or server).
pub const CHALLENGE_LEN: usize = 15;

pub mod msg_type {
    pub const GREETING: u8 = 70;
    pub const REQUEST: u8 = 71;
    pub const CHALLENGE: u8 = 72;
    pub const AUTHENTICATION: u8 = 73;
    pub const RESPONSE: u8 = 74;
    pub const ACKNOWLEDGE: u8 = 75;
    pub const OK: u8 = 76;
    pub const AUTH_ERROR: u8 = 77;
    pub const VERSION_ERROR: u8 = 78;
    pub const BAD_MSG_ERROR: u8 = 79;
    pub const BAD_PARAM_ERROR: u8 = 80;
    pub const BAD_HANDLER_ERROR: u8 = 81;
    pub const NO_SECRET_ERROR: u8 = 82;
    pub const CORRUPT_ERROR: u8 = 83;
}

/// A decoded encrypted-phase request (or reply) header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncHeader {
    pub data_size: u32,
    pub parameter: i32,
    pub msg_type: u8,
    pub data_hash: [u8; DATA_HASH_LEN],
}

impl EncHeader {
    /// Decodes a 16-byte block: `data_size` (u32 LE), `parameter` (i32 LE),
    /// `msg_type` (u8), `data_hash` (7 bytes).
    pub fn decode(block: &[u8; BLOCK_LEN]) -> Self {
        let data_size = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let parameter = i32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let msg_type = block[8];
        let mut data_hash = [0u8; DATA_HASH_LEN];
        data_hash.copy_from_slice(&block[9..16]);
        Self {
            data_size,
            parameter,
            msg_type,
            data_hash,
        }
    }

    /// Encodes this header into a 16-byte block.
    pub fn encode(&self) -> [u8; BLOCK_LEN] {
        let mut block = [0u8; BLOCK_LEN];
        block[0..4].copy_from_slice(&self.data_size.to_le_bytes());
        block[4..8].copy_from_slice(&self.parameter.to_le_bytes());
        block[8] = self.msg_type;
        block[9..16].copy_from_slice(&self.data_hash);
        block
    }
}

/// Computes the 7-byte truncated data hash over the first 9 header bytes
/// (everything but the hash field itself) and the payload.
pub fn data_hash(header_prefix: &[u8; 9], payload: &[u8]) -> [u8; DATA_HASH_LEN] {
    let mut input = Vec::with_capacity(9 + payload.len());
    input.extend_from_slice(header_prefix);
    input.extend_from_slice(payload);
    let digest = sha256(&input);
    let mut out = [0u8; DATA_HASH_LEN];
    out.copy_from_slice(&digest[..DATA_HASH_LEN]);
    out
}

/// Builds the 9-byte prefix (`data_size`, `parameter`, `msg_type`) an
/// [`EncHeader`] hashes over, without needing a full header value.
pub fn header_prefix(data_size: u32, parameter: i32, msg_type: u8) -> [u8; 9] {
    let mut prefix = [0u8; 9];
    prefix[0..4].copy_from_slice(&data_size.to_le_bytes());
    prefix[4..8].copy_from_slice(&parameter.to_le_bytes());
    prefix[8] = msg_type;
    prefix
}

/// Builds the greeting block sequence: byte 0 = `ID_GREETING`, byte 1 =
/// protocol version, byte 2 = number of blocks, followed by
/// `"<board-id-hex>\rpico-wifi-settings version <ver>\r\n"`, `\0`-padded to
/// a whole number of blocks.
pub fn build_greeting(board_id_hex: &str, version: &str) -> Vec<u8> {
    let text = format!("{board_id_hex}\rpico-wifi-settings version {version}\r\n");
    let header_and_text_len = 3 + text.len();
    let num_blocks = header_and_text_len.div_ceil(BLOCK_LEN);
    let mut out = vec![0u8; num_blocks * BLOCK_LEN];
    out[0] = msg_type::GREETING;
    out[1] = PROTOCOL_VERSION;
    out[2] = num_blocks as u8;
    out[3..3 + text.len()].copy_from_slice(text.as_bytes());
    out
}
