// SPDX-License-Identifier: AGPL-3.0-or-later

//! S4: a client that cannot produce the correct `MAC("CA")` is rejected
//! with a plaintext `AUTH_ERROR` block and disconnected.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wifi_settings_remote::{
    handlers::Registry,
    session::wire::{BLOCK_LEN, CHALLENGE_LEN, msg_type},
};

use crate::integration_tests::common::{read_greeting, spawn_session, store_with_secret};

#[tokio::test]
async fn wrong_authentication_mac_is_rejected() {
    let registry = Registry::new();
    let store = store_with_secret("hunter2");
    let (mut client, handle) = spawn_session(registry, store, 0x42);

    read_greeting(&mut client).await.unwrap();

    let mut request = [0u8; BLOCK_LEN];
    request[0] = msg_type::REQUEST;
    request[1..1 + CHALLENGE_LEN].copy_from_slice(&[0x11; CHALLENGE_LEN]);
    client.write_all(&request).await.unwrap();

    let mut challenge_block = [0u8; BLOCK_LEN];
    client.read_exact(&mut challenge_block).await.unwrap();
    assert_eq!(challenge_block[0], msg_type::CHALLENGE);

    // Wrong proof: an all-zero block instead of MAC("CA").
    let mut bad_auth = [0u8; BLOCK_LEN];
    bad_auth[0] = msg_type::AUTHENTICATION;
    client.write_all(&bad_auth).await.unwrap();

    let mut error_block = [0u8; BLOCK_LEN];
    client.read_exact(&mut error_block).await.unwrap();
    assert_eq!(error_block[0], msg_type::AUTH_ERROR);
    assert_eq!(msg_type::AUTH_ERROR, 77);

    // The server must have disconnected: no further bytes follow.
    let mut trailing = [0u8; 1];
    assert_eq!(client.read(&mut trailing).await.unwrap(), 0);

    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_err());
}

#[tokio::test]
async fn wrong_handshake_tag_yields_bad_msg() {
    let registry = Registry::new();
    let store = store_with_secret("hunter2");
    let (mut client, handle) = spawn_session(registry, store, 0x42);

    read_greeting(&mut client).await.unwrap();

    // Send an unexpected tag where ID_REQUEST was expected.
    let mut bogus = [0u8; BLOCK_LEN];
    bogus[0] = 0xEE;
    client.write_all(&bogus).await.unwrap();

    let mut error_block = [0u8; BLOCK_LEN];
    client.read_exact(&mut error_block).await.unwrap();
    assert_eq!(error_block[0], msg_type::BAD_MSG_ERROR);
    assert_eq!(msg_type::BAD_MSG_ERROR, 79);

    let outcome = handle.await.unwrap();
    assert!(outcome.result.is_err());
}
