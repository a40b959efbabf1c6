//! Session-level error taxonomy. Every variant maps onto exactly one wire
//! error block, sent once, always followed by disconnecting the peer.

// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use crate::session::wire::msg_type;

/// A session-terminating condition. `Transport` carries no wire
/// representation — nothing is sent, the socket is simply dropped.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake authentication failed")]
    Auth,
    #[error("malformed handshake message")]
    BadMsg,
    #[error("no secret is currently loaded")]
    NoSecret,
    #[error("request parameter out of range")]
    BadParam,
    #[error("unknown or unregistered handler")]
    BadHandler,
    #[error("encrypted block failed integrity check")]
    Corrupt,
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl SessionError {
    /// The single wire error block byte this condition maps to, or `None`
    /// for a condition with no wire representation.
    pub fn wire_msg_type(&self) -> Option<u8> {
        match self {
            SessionError::Auth => Some(msg_type::AUTH_ERROR),
            SessionError::BadMsg => Some(msg_type::BAD_MSG_ERROR),
            SessionError::NoSecret => Some(msg_type::NO_SECRET_ERROR),
            SessionError::BadParam => Some(msg_type::BAD_PARAM_ERROR),
            SessionError::BadHandler => Some(msg_type::BAD_HANDLER_ERROR),
            SessionError::Corrupt => Some(msg_type::CORRUPT_ERROR),
            SessionError::Transport(_) => None,
        }
    }
}
