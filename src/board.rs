//! Board identity helpers shared by the greeting and the UDP discovery
//! responder.

// SPDX-License-Identifier: AGPL-3.0-or-later

/// Number of bytes in a board id (before hex encoding).
pub const BOARD_ID_LEN: usize = 8;

/// Parses a lowercase hex board id string into raw bytes.
pub fn parse_board_id(hex_str: &str) -> Option<[u8; BOARD_ID_LEN]> {
    if hex_str.len() != BOARD_ID_LEN * 2 {
        return None;
    }
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// True when `prefix_hex` (a possibly-partial hex string) is a prefix of
/// `board_id_hex`. Used by the UDP discovery responder, which replies only
/// to queries whose prefix matches the local board id — letting a caller
/// scan a whole subnet for one device without knowing its full id.
pub fn hex_prefix_matches(board_id_hex: &str, prefix_hex: &str) -> bool {
    if prefix_hex.len() > board_id_hex.len() {
        return false;
    }
    board_id_hex
        .to_ascii_lowercase()
        .starts_with(&prefix_hex.to_ascii_lowercase())
}
