//! Handler dispatch table and the core handlers pre-registered into it.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod builtin;
pub mod registry;

pub use registry::{HandlerContext, HandlerError, HandlerReply, HandlerSlot, Registry};
