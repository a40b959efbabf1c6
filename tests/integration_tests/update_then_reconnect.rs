// SPDX-License-Identifier: AGPL-3.0-or-later

//! The one-shot `Update` handler rewrites the settings image and reloads
//! the secret cache without closing the connection; a second session
//! against the same store must then authenticate with the *new* secret.

use wifi_settings_remote::handlers::{Registry, builtin::register_builtin_handlers, registry::reserved};

use crate::integration_tests::common::{client_handshake, read_reply, send_request, spawn_session, store_with_secret};

#[tokio::test]
async fn update_handler_reloads_secret_for_the_next_connection() {
    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);
    let store = store_with_secret("old-secret");

    let (mut client, handle) = spawn_session(registry, store, 0x01);
    let mut cipher = client_handshake(&mut client, "old-secret", 0x06).await.unwrap();

    let new_image = b"update_secret=new-secret\nname=updated\n";
    send_request(&mut client, &mut cipher, reserved::UPDATE, 0, new_image)
        .await
        .unwrap();
    let reply = read_reply(&mut client, &mut cipher).await.unwrap();
    assert_eq!(reply.result, new_image.len() as i32);

    drop(client);
    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.store.get("name").unwrap(), "updated");
    assert_eq!(outcome.store.get("update_secret").unwrap(), "new-secret");

    // Reconnect a second session against the persisted store/secret.
    let (mut client2, handle2) = spawn_session_with_state(
        registry_with_builtins(),
        outcome.store,
        outcome.secret,
        0x02,
    );
    let result = client_handshake(&mut client2, "new-secret", 0x07).await;
    assert!(result.is_ok(), "the new secret must authenticate successfully");
    drop(client2);
    let _ = handle2.await.unwrap();
}

fn registry_with_builtins() -> Registry {
    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);
    registry
}

/// Like [`spawn_session`], but seeds the spawned task's secret cache from
/// an already-derived [`wifi_settings_remote::secret::SecretCache`] rather
/// than re-deriving it from the store, so a chained second session can
/// reuse exactly the state the first session left behind.
fn spawn_session_with_state(
    mut registry: Registry,
    store: wifi_settings_remote::settings::SettingsStore<Box<dyn wifi_settings_remote::storage::StorageBackend>>,
    secret: wifi_settings_remote::secret::SecretCache,
    server_challenge_byte: u8,
) -> (
    tokio::io::DuplexStream,
    tokio::task::JoinHandle<crate::integration_tests::common::SessionOutcome>,
) {
    use std::time::Duration;

    use tokio::io::duplex;
    use wifi_settings_remote::{reboot::NoopRebootTrigger, session};

    use crate::integration_tests::common::{FixedCsprng, SessionOutcome, BOARD_ID_HEX, MAX_DATA_SIZE, VERSION};

    let (client_io, mut server_io) = duplex(16 * 1024);
    let handle = tokio::spawn(async move {
        let mut store = store;
        let mut secret = secret;
        let mut reboot = NoopRebootTrigger::default();
        let mut csprng = FixedCsprng(server_challenge_byte);
        let result = session::run(
            &mut server_io,
            &mut csprng,
            &mut registry,
            &mut store,
            &mut secret,
            &mut reboot,
            BOARD_ID_HEX,
            VERSION,
            MAX_DATA_SIZE,
            Duration::from_secs(5),
        )
        .await;
        SessionOutcome {
            store,
            secret,
            reboot,
            result,
        }
    });
    (client_io, handle)
}
