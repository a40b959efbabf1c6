//! Fixed-size dispatch table mapping an encrypted-phase `msg_type` to a
//! handler.

// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use crate::{
    reboot::RebootTrigger, secret::SecretCache, settings::SettingsStore,
    storage::StorageBackend,
};

/// First message type a caller-registered (or core-registered) handler may
/// occupy.
pub const FIRST_HANDLER_ID: u8 = 120;
/// Last message type a handler may occupy.
pub const LAST_USER_HANDLER_ID: u8 = 143;
/// Number of addressable handler slots.
pub const NUM_HANDLERS: usize = (LAST_USER_HANDLER_ID - FIRST_HANDLER_ID + 1) as usize;

/// Reserved, core-registered message types.
pub mod reserved {
    pub const PICO_INFO: u8 = 120;
    pub const UPDATE: u8 = 121;
    pub const READ: u8 = 122;
    pub const UPDATE_REBOOT: u8 = 124;
    pub const WRITE_FLASH: u8 = 125;
    pub const OTA_FIRMWARE_UPDATE: u8 = 127;
}

/// Mutable context a handler call sees: the settings store, the secret
/// cache it may invalidate, and identity/limits used by diagnostics.
pub struct HandlerContext<'a> {
    pub store: &'a mut SettingsStore<Box<dyn StorageBackend>>,
    pub secret: &'a mut SecretCache,
    pub reboot: &'a mut dyn RebootTrigger,
    pub board_id_hex: &'a str,
    pub version: &'a str,
    pub max_data_size: u32,
}

/// The outcome of a successful phase-1 call.
pub struct HandlerReply {
    pub result: i32,
    pub data: Vec<u8>,
}

/// Errors a phase-1 handler can report; everything else is a success.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("invalid argument")]
    InvalidArg,
}

impl HandlerError {
    /// The negative `result` value a rejected request is reported to the
    /// peer as. A handler error is never a protocol-level failure: it still
    /// completes the request with an `ID_OK` reply whose `parameter` carries
    /// this code, same as any other handler result.
    pub fn result_code(&self) -> i32 {
        match self {
            HandlerError::InvalidArg => PICO_ERROR_INVALID_ARG,
        }
    }
}

/// Mirrors the Pico SDK's `PICO_ERROR_INVALID_ARG`, the negative result code
/// a rejected handler call reports back to the peer.
pub const PICO_ERROR_INVALID_ARG: i32 = -1;

/// `fn(ctx, msg_type, input_data, input_parameter) -> Result<reply, err>`.
pub type Phase1 = dyn FnMut(&mut HandlerContext, u8, &[u8], i32) -> Result<HandlerReply, HandlerError>
    + Send;

/// `fn(ctx, msg_type, input_data, input_parameter)`, invoked after the
/// connection has already been closed; its return value is never observed
/// by a peer.
pub type Phase2 = dyn FnMut(&mut HandlerContext, u8, &[u8], i32) + Send;

/// One occupied handler slot.
pub enum HandlerSlot {
    /// Replies over the wire; no further action once the reply is sent.
    OneShot(Box<Phase1>),
    /// `phase1` (if present) runs before the reply is sent; `phase2` runs
    /// only after the connection is closed. Absent `phase1` means the
    /// request's `data_size`/`parameter` pass straight through to
    /// `phase2` unchanged.
    TwoPhase(Option<Box<Phase1>>, Box<Phase2>),
}

/// Errors raised by [`Registry::register`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("msg_type {0} is outside the handler range [{FIRST_HANDLER_ID}, {LAST_USER_HANDLER_ID}]")]
    InvalidArg(u8),
}

/// The handler dispatch table: a fixed-size array of optional slots,
/// indexed by `msg_type - FIRST_HANDLER_ID`.
pub struct Registry {
    slots: Vec<Option<HandlerSlot>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NUM_HANDLERS);
        slots.resize_with(NUM_HANDLERS, || None);
        Self { slots }
    }

    fn index_of(msg_type: u8) -> Result<usize, RegistryError> {
        if (FIRST_HANDLER_ID..=LAST_USER_HANDLER_ID).contains(&msg_type) {
            Ok((msg_type - FIRST_HANDLER_ID) as usize)
        } else {
            Err(RegistryError::InvalidArg(msg_type))
        }
    }

    /// Registers a one-shot handler, replacing anything already in that
    /// slot.
    pub fn register_one_shot(
        &mut self,
        msg_type: u8,
        phase1: Box<Phase1>,
    ) -> Result<(), RegistryError> {
        let idx = Self::index_of(msg_type)?;
        self.slots[idx] = Some(HandlerSlot::OneShot(phase1));
        Ok(())
    }

    /// Registers a two-phase handler, replacing anything already in that
    /// slot.
    pub fn register_two_phase(
        &mut self,
        msg_type: u8,
        phase1: Option<Box<Phase1>>,
        phase2: Box<Phase2>,
    ) -> Result<(), RegistryError> {
        let idx = Self::index_of(msg_type)?;
        self.slots[idx] = Some(HandlerSlot::TwoPhase(phase1, phase2));
        Ok(())
    }

    /// Looks up the slot for `msg_type`, if any handler is registered
    /// there.
    pub fn get_mut(&mut self, msg_type: u8) -> Option<&mut HandlerSlot> {
        let idx = Self::index_of(msg_type).ok()?;
        self.slots[idx].as_mut()
    }
}
