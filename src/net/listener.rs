//! TCP control-channel listener: accepts one session at a time and drives
//! it through [`crate::session::run`] to completion before accepting the
//! next.

// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    crypto::Csprng, handlers::Registry, reboot::RebootTrigger, secret::SecretCache,
    session::SessionRuntime, settings::SettingsStore, storage::StorageBackend,
};

/// Everything [`run`] needs across the lifetime of the listener, bundled
/// so the accept loop doesn't have to thread it argument by argument.
#[allow(clippy::too_many_arguments)]
pub struct ListenerState<'a, R: Csprng> {
    pub csprng: &'a mut R,
    pub registry: &'a mut Registry,
    pub store: &'a mut SettingsStore<Box<dyn StorageBackend>>,
    pub secret: &'a mut SecretCache,
    pub reboot: &'a mut dyn RebootTrigger,
    pub board_id_hex: &'a str,
    pub version: &'a str,
    pub max_data_size: u32,
    pub io_timeout: std::time::Duration,
}

/// Binds `bind_address:port` and serves sessions one at a time until
/// `cancel` is triggered. No connection pool: a peer connecting while a
/// session is already in progress simply waits in the kernel's accept
/// backlog, matching the single-session-at-a-time model.
pub async fn run<R: Csprng>(
    bind_address: &str,
    port: u16,
    state: &mut ListenerState<'_, R>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind((bind_address, port)).await?;
    info!(bind_address, port, "control listener bound");

    loop {
        let (mut stream, peer) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("control listener shutting down");
                return Ok(());
            },
            accepted = listener.accept() => accepted?,
        };
        debug!(%peer, "accepted control connection");

        let mut runtime = SessionRuntime {
            csprng: &mut *state.csprng,
            registry: &mut *state.registry,
            store: &mut *state.store,
            secret: &mut *state.secret,
            reboot: &mut *state.reboot,
            board_id_hex: state.board_id_hex,
            version: state.version,
            max_data_size: state.max_data_size,
            io_timeout: state.io_timeout,
        };

        if let Err(err) = runtime.serve(&mut stream).await {
            warn!(%peer, ?err, "session ended with an error");
        } else {
            debug!(%peer, "session ended cleanly");
        }
    }
}
