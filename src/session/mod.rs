//! Per-connection authenticated session: handshake, key derivation, and
//! the encrypted request/response loop.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod error;
pub mod machine;
pub mod wire;

pub use error::SessionError;
pub use machine::{SessionPhase, run};

use std::time::Duration;

use crate::{
    crypto::Csprng, handlers::Registry, reboot::RebootTrigger, secret::SecretCache,
    settings::SettingsStore, storage::StorageBackend,
};

/// Bundles everything a listener needs to drive one session, so it doesn't
/// have to thread nine arguments through itself.
pub struct SessionRuntime<'a, R: Csprng> {
    pub csprng: &'a mut R,
    pub registry: &'a mut Registry,
    pub store: &'a mut SettingsStore<Box<dyn StorageBackend>>,
    pub secret: &'a mut SecretCache,
    pub reboot: &'a mut dyn RebootTrigger,
    pub board_id_hex: &'a str,
    pub version: &'a str,
    pub max_data_size: u32,
    pub io_timeout: Duration,
}

impl<'a, R: Csprng> SessionRuntime<'a, R> {
    /// Runs one session against `io` to completion.
    pub async fn serve<IO>(&mut self, io: &mut IO) -> anyhow::Result<()>
    where IO: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin {
        run(
            io,
            &mut *self.csprng,
            &mut *self.registry,
            &mut *self.store,
            &mut *self.secret,
            &mut *self.reboot,
            self.board_id_hex,
            self.version,
            self.max_data_size,
            self.io_timeout,
        )
        .await
    }
}
