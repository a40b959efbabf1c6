// SPDX-License-Identifier: AGPL-3.0-or-later

//! S3 (handshake happy path) plus a one-shot handler round trip through
//! the encrypted phase.

use wifi_settings_remote::handlers::{Registry, builtin::register_builtin_handlers};

use crate::integration_tests::common::{
    self, client_handshake, read_reply, send_request, spawn_session, store_with_secret,
};

#[tokio::test]
async fn handshake_then_pico_info_round_trip() {
    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);
    let store = store_with_secret(common::SECRET);

    let (mut client, handle) = spawn_session(registry, store, 0x42);

    let mut cipher = client_handshake(&mut client, common::SECRET, 0x11)
        .await
        .expect("handshake should succeed with the correct secret");

    send_request(
        &mut client,
        &mut cipher,
        wifi_settings_remote::handlers::registry::reserved::PICO_INFO,
        0,
        &[],
    )
    .await
    .unwrap();

    let reply = read_reply(&mut client, &mut cipher).await.unwrap();
    assert_eq!(reply.msg_type, wifi_settings_remote::session::wire::msg_type::OK);
    let text = String::from_utf8(reply.data).unwrap();
    assert!(text.contains(&format!("board_id={}", common::BOARD_ID_HEX)));
    assert!(text.contains(&format!("max_data_size={}", common::MAX_DATA_SIZE)));

    drop(client);
    let _ = handle.await.unwrap();
}
