// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use wifi_settings_remote::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    crypto::OsCsprng,
    handlers::{Registry, builtin::register_builtin_handlers},
    net::{listener, responder},
    reboot::NoopRebootTrigger,
    secret::SecretCache,
    storage::{MemoryStorage, StorageBackend},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger("tests/config_logger.yaml")?;

    let cfg = resolve_config_path("docker/wifi-settings/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let storage: Box<dyn StorageBackend> = Box::new(MemoryStorage::new(
        cfg.storage.file_size,
        cfg.storage.sector_size,
        cfg.storage.page_size,
    ));
    let mut store = wifi_settings_remote::settings::SettingsStore::load(storage);
    store
        .set("name", &cfg.board.hostname)
        .context("failed to seed hostname into settings store")?;

    let mut secret = SecretCache::empty(cfg.runtime.secret_rounds);
    secret.reload(&store);

    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);

    let mut reboot = NoopRebootTrigger::default();
    let mut csprng = OsCsprng;

    let cancel = CancellationToken::new();
    let listener_cancel = cancel.clone();
    let responder_cancel = cancel.clone();

    let bind_address = cfg.listener.bind_address.clone();
    let port = cfg.listener.port;
    let board_id_hex = cfg.board.board_id.clone();
    let version = cfg.board.version.clone();
    let max_data_size = cfg.runtime.max_data_size;
    let io_timeout = cfg.runtime.io_timeout;

    info!(board_id = %board_id_hex, %bind_address, port, "starting wifi-settings-server");

    let mut listener_state = listener::ListenerState {
        csprng: &mut csprng,
        registry: &mut registry,
        store: &mut store,
        secret: &mut secret,
        reboot: &mut reboot,
        board_id_hex: &board_id_hex,
        version: &version,
        max_data_size,
        io_timeout,
    };

    let responder_board_id = board_id_hex.clone();
    let responder_bind = bind_address.clone();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            cancel.cancel();
        },
        res = listener::run(&bind_address, port, &mut listener_state, listener_cancel) => {
            res?;
        },
        res = responder::run(&responder_bind, port, &responder_board_id, responder_cancel) => {
            res?;
        },
    }

    Ok(())
}
