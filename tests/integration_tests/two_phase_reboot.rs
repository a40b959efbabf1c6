// SPDX-License-Identifier: AGPL-3.0-or-later

//! S6: a two-phase handler's encrypted `ID_OK` reply is sent and the
//! connection closed before phase-2 (here: the no-op reboot trigger) runs.

use wifi_settings_remote::handlers::{Registry, builtin::register_builtin_handlers, registry::reserved};

use crate::integration_tests::common::{client_handshake, read_reply, send_request, spawn_session, store_with_secret};

#[tokio::test]
async fn update_reboot_acks_then_reboots_after_close() {
    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);
    let store = store_with_secret("hunter2");
    let (mut client, handle) = spawn_session(registry, store, 0x09);

    let mut cipher = client_handshake(&mut client, "hunter2", 0x04).await.unwrap();

    // parameter == 1 requests a bootloader-mode restart.
    send_request(&mut client, &mut cipher, reserved::UPDATE_REBOOT, 1, &[])
        .await
        .unwrap();

    let reply = read_reply(&mut client, &mut cipher).await.unwrap();
    assert_eq!(
        reply.msg_type,
        wifi_settings_remote::session::wire::msg_type::OK
    );
    assert_eq!(reply.result, 1, "parameter passes through unchanged to phase-2");
    assert!(reply.data.is_empty());

    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_ok(), "phase-2 handoff is a clean session end");
    assert_eq!(
        outcome.reboot.requested,
        Some(true),
        "phase-2 must run exactly once, with the passed-through bootloader flag"
    );
}

#[tokio::test]
async fn update_reboot_with_no_phase1_passes_request_through_unchanged() {
    let mut registry = Registry::new();
    register_builtin_handlers(&mut registry);
    let store = store_with_secret("hunter2");
    let (mut client, handle) = spawn_session(registry, store, 0x0a);

    let mut cipher = client_handshake(&mut client, "hunter2", 0x05).await.unwrap();

    let new_image = b"update_secret=new-secret-value\nname=rebooted\n";
    send_request(&mut client, &mut cipher, reserved::UPDATE_REBOOT, 0, new_image)
        .await
        .unwrap();

    let reply = read_reply(&mut client, &mut cipher).await.unwrap();
    assert_eq!(reply.result, 0);

    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.reboot.requested, Some(false));
    // No phase-1 is registered for UpdateReboot, so phase-2 receives the
    // raw request body and is responsible for writing it itself.
    assert_eq!(outcome.store.get("name").unwrap(), "rebooted");
    assert!(outcome.secret.is_valid());
}
