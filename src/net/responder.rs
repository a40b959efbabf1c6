//! UDP discovery responder: answers `"PWS?" + hex-prefix` broadcast probes
//! with `"PWS:" + full board id hex`, so a caller can find a device on the
//! local network without already knowing its id.

// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::board::{BOARD_ID_LEN, hex_prefix_matches};

const QUERY_MAGIC: &[u8; 4] = b"PWS?";
const REPLY_MAGIC: &[u8; 4] = b"PWS:";

/// Longest possible query packet: 4-byte magic plus a full (possibly
/// odd-length, NUL-padded) board id hex prefix.
const MAX_PACKET_LEN: usize = 4 + 2 * BOARD_ID_LEN + 1;

/// Binds `bind_address:port` and answers discovery probes until `cancel`
/// is triggered. Anything that isn't a well-formed, prefix-matching query
/// is dropped silently — this is a best-effort convenience responder, not
/// part of the authenticated control channel.
pub async fn run(
    bind_address: &str,
    port: u16,
    board_id_hex: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let socket = UdpSocket::bind((bind_address, port)).await?;
    info!(bind_address, port, "discovery responder bound");

    let mut buf = [0u8; MAX_PACKET_LEN];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("discovery responder shutting down");
                return Ok(());
            },
            received = socket.recv_from(&mut buf) => received?,
        };

        let Some(packet) = buf.get(..len) else { continue };
        let Some(prefix) = packet.strip_prefix(QUERY_MAGIC) else {
            continue;
        };
        let prefix_hex = match std::str::from_utf8(prefix) {
            Ok(s) => s.trim_end_matches('\0'),
            Err(_) => continue,
        };
        if !prefix_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue;
        }
        if !hex_prefix_matches(board_id_hex, prefix_hex) {
            continue;
        }

        let mut reply = Vec::with_capacity(4 + board_id_hex.len());
        reply.extend_from_slice(REPLY_MAGIC);
        reply.extend_from_slice(board_id_hex.as_bytes());
        debug!(%peer, prefix_hex, "answering discovery probe");
        let _ = socket.send_to(&reply, peer).await;
    }
}
