//! TCP session listener and the UDP discovery responder that sits next to
//! it on the same port.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod listener;
pub mod responder;
