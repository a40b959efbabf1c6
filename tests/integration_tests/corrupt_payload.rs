// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data hash soundness: tampering with the ciphertext of a payload block
//! after the header was computed must be caught by the recomputed data
//! hash and answered with `CORRUPT_ERROR`.

use wifi_settings_remote::{
    handlers::{HandlerReply, Registry, registry::reserved},
    session::wire::msg_type,
};

use crate::integration_tests::common::{
    client_handshake, read_reply, send_request_with_tampered_payload, spawn_session,
    store_with_secret,
};

#[tokio::test]
async fn tampered_payload_triggers_corrupt_error() {
    let mut registry = Registry::new();
    registry
        .register_one_shot(
            reserved::UPDATE,
            Box::new(|_ctx, _mt, _data, _param| {
                Ok(HandlerReply {
                    result: 0,
                    data: Vec::new(),
                })
            }),
        )
        .unwrap();
    let store = store_with_secret("hunter2");
    let (mut client, handle) = spawn_session(registry, store, 0x77);

    let mut cipher = client_handshake(&mut client, "hunter2", 0x03).await.unwrap();

    send_request_with_tampered_payload(&mut client, &mut cipher, reserved::UPDATE, 0, b"hello!!!")
        .await
        .unwrap();

    let reply = read_reply(&mut client, &mut cipher).await.unwrap();
    assert_eq!(reply.msg_type, msg_type::CORRUPT_ERROR);
    assert_eq!(msg_type::CORRUPT_ERROR, 83);

    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_err());
}
