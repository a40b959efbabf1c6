//! Core handlers pre-registered in the reserved `120..127` message-type
//! range: remote diagnostics, a one-shot settings replace, and a two-phase
//! settings-replace-then-reboot.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::{
    handlers::registry::{HandlerContext, HandlerError, HandlerReply, Registry, reserved},
    settings::SettingsError,
};

/// Registers [`pico_info`], [`update`], and the two-phase `update_reboot`
/// handler into `registry`.
pub fn register_builtin_handlers(registry: &mut Registry) {
    registry
        .register_one_shot(reserved::PICO_INFO, Box::new(pico_info))
        .expect("PICO_INFO is within the reserved range");
    registry
        .register_one_shot(reserved::UPDATE, Box::new(update))
        .expect("UPDATE is within the reserved range");
    registry
        .register_two_phase(reserved::UPDATE_REBOOT, None, Box::new(update_reboot_phase2))
        .expect("UPDATE_REBOOT is within the reserved range");
}

/// Returns a `key=value`-per-line text blob describing the running
/// instance. Takes no input.
fn pico_info(
    ctx: &mut HandlerContext,
    _msg_type: u8,
    input: &[u8],
    parameter: i32,
) -> Result<HandlerReply, HandlerError> {
    if !input.is_empty() || parameter != 0 {
        return Err(HandlerError::InvalidArg);
    }

    let mut text = String::new();
    let mut add = |key: &str, value: &str| {
        if value.is_empty() {
            return;
        }
        text.push_str(key);
        text.push('=');
        text.push_str(value);
        text.push('\n');
    };

    add("flash_sector_size", &format!("0x{:08x}", ctx.store.sector_size()));
    add("max_data_size", &ctx.max_data_size.to_string());
    // This crate manages one settings file per sector: the whole region
    // and the file occupy the same byte range, unlike the original's
    // separately-tracked "all flash" vs. "this file" ranges.
    let file_range = format!("0x{:08x}:0x{:08x}", 0, ctx.store.file_size());
    add("flash_all", &file_range);
    add("flash_wifi_settings_file", &file_range);
    add("board_id", ctx.board_id_hex);
    add("name", ctx.store.get("name").unwrap_or(""));
    add("wifi_settings_version", ctx.version);

    Ok(HandlerReply {
        result: 0,
        data: text.into_bytes(),
    })
}

/// Replaces the whole settings file and reloads the derived secret. No
/// reboot — the one-shot counterpart of [`update_reboot_phase2`].
fn update(
    ctx: &mut HandlerContext,
    _msg_type: u8,
    input: &[u8],
    parameter: i32,
) -> Result<HandlerReply, HandlerError> {
    if parameter != 0 {
        return Err(HandlerError::InvalidArg);
    }

    ctx.store.replace_raw(input)?;
    ctx.store.save().map_err(|_| HandlerError::InvalidArg)?;
    ctx.secret.reload(ctx.store);

    Ok(HandlerReply {
        result: input.len() as i32,
        data: Vec::new(),
    })
}

/// Phase-2 of `UpdateReboot`. No phase-1 is registered for this slot, so
/// `input`/`parameter` here are exactly the request's `data_size`/
/// `parameter`, passed through unchanged — the upstream contract this
/// mirrors: a two-phase handler with no first stage receives the raw
/// request as its phase-2 arguments.
///
/// If `input` is non-empty it is written as the new settings image via an
/// unchecked replace (the connection is already closed and the device is
/// about to restart, so there is no reply path left to report a save
/// failure on). `parameter == 1` requests a bootloader-mode restart
/// instead of a normal one.
fn update_reboot_phase2(ctx: &mut HandlerContext, _msg_type: u8, input: &[u8], parameter: i32) {
    if !input.is_empty() {
        if let Err(err) = ctx.store.replace_raw(input) {
            tracing::error!(?err, "update_reboot: failed to stage new settings image");
        } else if let Err(err) = ctx.store.save() {
            tracing::error!(?err, "update_reboot: failed to persist new settings image");
        } else {
            ctx.secret.reload(ctx.store);
        }
    }

    let to_bootloader = parameter == 1;
    ctx.reboot.reboot(to_bootloader);
}

impl From<SettingsError> for HandlerError {
    fn from(_: SettingsError) -> Self {
        HandlerError::InvalidArg
    }
}
