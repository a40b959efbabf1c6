//! The settings file codec and the RAM-mirrored store built on top of it.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod codec;
pub mod store;

pub use codec::SettingsError;
pub use store::SettingsStore;
