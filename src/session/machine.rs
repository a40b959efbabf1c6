//! The per-connection session: handshake, key derivation, and the
//! encrypted request/response loop.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    crypto::{Aes256CbcBlock, Csprng, DIGEST_LEN as KEY_LEN, hmac_sha256},
    handlers::{HandlerContext, HandlerReply, HandlerSlot, Registry},
    secret::SecretCache,
    session::{
        error::SessionError,
        wire::{BLOCK_LEN, CHALLENGE_LEN, EncHeader, build_greeting, data_hash, header_prefix, msg_type},
    },
    settings::SettingsStore,
    storage::StorageBackend,
};

/// Coarse phase a session is in, exposed for logging and tests. The wire
/// protocol's exact per-message states (`SendGreeting`, `ExpectRequest`, …)
/// live inside [`run`]; this enum marks the two phases that matter outside
/// it: shared-key material only exists once [`SessionPhase::Encrypted`] is
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Handshake,
    Encrypted,
}

/// Everything the encrypted phase needs once the handshake completes.
struct EncryptedState {
    encrypt: Aes256CbcBlock,
    decrypt: Aes256CbcBlock,
    send_iv: [u8; BLOCK_LEN],
    recv_iv: [u8; BLOCK_LEN],
}

impl EncryptedState {
    fn encrypt_block(&mut self, plaintext: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
        let ct = self.encrypt.encrypt_block(&self.send_iv, plaintext);
        self.send_iv = ct;
        ct
    }

    fn decrypt_block(&mut self, ciphertext: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
        let pt = self.decrypt.decrypt_block(&self.recv_iv, ciphertext);
        self.recv_iv = *ciphertext;
        pt
    }
}

/// Computes `HMAC-SHA256(secret, client_challenge || server_challenge ||
/// tag)`. `tag` is the two-ASCII-byte wire tag (`"CA"`, `"SA"`, `"SK"`,
/// `"CK"`).
fn mac(
    secret: &[u8; KEY_LEN],
    client_challenge: &[u8; CHALLENGE_LEN],
    server_challenge: &[u8; CHALLENGE_LEN],
    tag: &[u8; 2],
) -> [u8; KEY_LEN] {
    let mut msg = Vec::with_capacity(CHALLENGE_LEN * 2 + 2);
    msg.extend_from_slice(client_challenge);
    msg.extend_from_slice(server_challenge);
    msg.extend_from_slice(tag);
    hmac_sha256(secret, &msg)
}

fn timed_out() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::TimedOut, "I/O timeout")
}

async fn read_block<IO: AsyncRead + Unpin>(
    io: &mut IO,
    io_timeout: Duration,
) -> Result<[u8; BLOCK_LEN], SessionError> {
    let mut buf = [0u8; BLOCK_LEN];
    match tokio::time::timeout(io_timeout, io.read_exact(&mut buf)).await {
        Ok(Ok(_)) => Ok(buf),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(timed_out().into()),
    }
}

async fn write_block<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    block: &[u8; BLOCK_LEN],
    io_timeout: Duration,
) -> Result<(), SessionError> {
    match tokio::time::timeout(io_timeout, io.write_all(block)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(timed_out().into()),
    }
}

async fn write_all_bytes<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    bytes: &[u8],
    io_timeout: Duration,
) -> Result<(), SessionError> {
    match tokio::time::timeout(io_timeout, io.write_all(bytes)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(timed_out().into()),
    }
}

/// Runs one session to completion against `io`. Returns once the peer
/// disconnects, a protocol error terminates the exchange, or a two-phase
/// handler's phase-2 has run.
///
/// Every exit path — plaintext error, encrypted error, clean disconnect,
/// or the phase-2 handoff — goes through this single function; none of
/// them leave cipher state behind for reuse on another connection.
#[allow(clippy::too_many_arguments)]
pub async fn run<IO, R>(
    io: &mut IO,
    csprng: &mut R,
    registry: &mut Registry,
    store: &mut SettingsStore<Box<dyn StorageBackend>>,
    secret: &mut SecretCache,
    reboot: &mut dyn crate::reboot::RebootTrigger,
    board_id_hex: &str,
    version: &str,
    max_data_size: u32,
    io_timeout: Duration,
) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    R: Csprng,
{
    handshake_and_serve(
        io,
        csprng,
        registry,
        store,
        secret,
        reboot,
        board_id_hex,
        version,
        max_data_size,
        io_timeout,
    )
    .await?;
    Ok(())
}

fn plaintext_error_block(wire_code: u8) -> [u8; BLOCK_LEN] {
    let mut block = [0u8; BLOCK_LEN];
    block[0] = wire_code;
    block
}

/// Sends a one-block error response during the handshake (no session keys
/// exist yet) and returns `err` so the caller can propagate it.
async fn fail_plaintext<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    err: SessionError,
    io_timeout: Duration,
) -> SessionError {
    if let Some(wire_code) = err.wire_msg_type() {
        let block = plaintext_error_block(wire_code);
        let _ = write_block(io, &block, io_timeout).await;
    }
    err
}

/// Sends a one-block error response during the encrypted phase (the error
/// header itself is encrypted, per the wire protocol) and returns `err`.
async fn fail_encrypted<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    enc: &mut EncryptedState,
    err: SessionError,
    io_timeout: Duration,
) -> SessionError {
    if let Some(wire_code) = err.wire_msg_type() {
        let prefix = header_prefix(0, 0, wire_code);
        let header = EncHeader {
            data_size: 0,
            parameter: 0,
            msg_type: wire_code,
            data_hash: data_hash(&prefix, &[]),
        };
        let block = enc.encrypt_block(&header.encode());
        let _ = write_block(io, &block, io_timeout).await;
    }
    err
}

#[allow(clippy::too_many_arguments)]
async fn handshake_and_serve<IO, R>(
    io: &mut IO,
    csprng: &mut R,
    registry: &mut Registry,
    store: &mut SettingsStore<Box<dyn StorageBackend>>,
    secret: &mut SecretCache,
    reboot: &mut dyn crate::reboot::RebootTrigger,
    board_id_hex: &str,
    version: &str,
    max_data_size: u32,
    io_timeout: Duration,
) -> Result<(), SessionError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    R: Csprng,
{
    // SendGreeting
    let greeting = build_greeting(board_id_hex, version);
    write_all_bytes(io, &greeting, io_timeout).await?;

    // ExpectRequest
    let request = read_block(io, io_timeout).await?;
    if request[0] != msg_type::REQUEST {
        return Err(fail_plaintext(io, SessionError::BadMsg, io_timeout).await);
    }
    let mut client_challenge = [0u8; CHALLENGE_LEN];
    client_challenge.copy_from_slice(&request[1..1 + CHALLENGE_LEN]);

    if !secret.is_valid() {
        return Err(fail_plaintext(io, SessionError::NoSecret, io_timeout).await);
    }
    let secret_digest = *secret.digest();

    // SendChallenge
    let mut server_challenge = [0u8; CHALLENGE_LEN];
    csprng.fill(&mut server_challenge);
    let mut challenge_block = [0u8; BLOCK_LEN];
    challenge_block[0] = msg_type::CHALLENGE;
    challenge_block[1..1 + CHALLENGE_LEN].copy_from_slice(&server_challenge);
    write_block(io, &challenge_block, io_timeout).await?;

    // ExpectAuthentication
    let auth = read_block(io, io_timeout).await?;
    if auth[0] != msg_type::AUTHENTICATION {
        return Err(fail_plaintext(io, SessionError::BadMsg, io_timeout).await);
    }
    let expected_ca = mac(&secret_digest, &client_challenge, &server_challenge, b"CA");
    if auth[1..1 + CHALLENGE_LEN] != expected_ca[..CHALLENGE_LEN] {
        return Err(fail_plaintext(io, SessionError::Auth, io_timeout).await);
    }

    // SendAuthentication (server's proof, "SA")
    let sa = mac(&secret_digest, &client_challenge, &server_challenge, b"SA");
    let mut response_block = [0u8; BLOCK_LEN];
    response_block[0] = msg_type::RESPONSE;
    response_block[1..1 + CHALLENGE_LEN].copy_from_slice(&sa[..CHALLENGE_LEN]);
    write_block(io, &response_block, io_timeout).await?;

    // ExpectAcknowledge
    let ack = read_block(io, io_timeout).await?;
    if ack[0] != msg_type::ACKNOWLEDGE {
        return Err(fail_plaintext(io, SessionError::BadMsg, io_timeout).await);
    }

    // Derive session keys. Server encrypts with "SK", decrypts with "CK".
    let sk = mac(&secret_digest, &client_challenge, &server_challenge, b"SK");
    let ck = mac(&secret_digest, &client_challenge, &server_challenge, b"CK");
    let mut enc = EncryptedState {
        encrypt: Aes256CbcBlock::new(&sk),
        decrypt: Aes256CbcBlock::new(&ck),
        send_iv: [0u8; BLOCK_LEN],
        recv_iv: [0u8; BLOCK_LEN],
    };

    // Encrypted phase: one request/response pair at a time until the peer
    // disconnects or a two-phase handler hands off to phase-2.
    loop {
        let request_block = match read_block(io, io_timeout).await {
            Ok(b) => b,
            Err(SessionError::Transport(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            },
            Err(e) => return Err(e),
        };
        let header = EncHeader::decode(&enc.decrypt_block(&request_block));

        // Unknown/unregistered msg_type is checked before data_size, and
        // data_size before reading any payload blocks — matching the
        // three-step rejection order a malformed or hostile request must
        // be refused in, before the server commits to draining a payload
        // it may never use.
        if registry.get_mut(header.msg_type).is_none() {
            return Err(fail_encrypted(io, &mut enc, SessionError::BadHandler, io_timeout).await);
        }
        if header.data_size > max_data_size {
            return Err(fail_encrypted(io, &mut enc, SessionError::BadParam, io_timeout).await);
        }

        let mut payload = vec![0u8; header.data_size as usize];
        let full_blocks = (header.data_size as usize).div_ceil(BLOCK_LEN);
        let mut written = 0usize;
        for _ in 0..full_blocks {
            let block = read_block(io, io_timeout).await?;
            let plain = enc.decrypt_block(&block);
            let take = (header.data_size as usize - written).min(BLOCK_LEN);
            payload[written..written + take].copy_from_slice(&plain[..take]);
            written += take;
        }

        let prefix = header_prefix(header.data_size, header.parameter, header.msg_type);
        let expected_hash = data_hash(&prefix, &payload);
        if expected_hash != header.data_hash {
            return Err(fail_encrypted(io, &mut enc, SessionError::Corrupt, io_timeout).await);
        }

        let slot = registry
            .get_mut(header.msg_type)
            .expect("checked above: slot exists for header.msg_type");

        let mut ctx = HandlerContext {
            store: &mut *store,
            secret: &mut *secret,
            reboot: &mut *reboot,
            board_id_hex,
            version,
            max_data_size,
        };

        match slot {
            HandlerSlot::OneShot(phase1) => {
                let reply = match phase1(&mut ctx, header.msg_type, &payload, header.parameter) {
                    Ok(reply) => reply,
                    Err(e) => HandlerReply { result: e.result_code(), data: Vec::new() },
                };
                let mut out_data = reply.data;
                out_data.truncate(max_data_size as usize);
                send_encrypted_reply(
                    io,
                    &mut enc,
                    out_data.len() as u32,
                    reply.result,
                    &out_data,
                    io_timeout,
                )
                .await?;
            },
            HandlerSlot::TwoPhase(phase1, phase2) => {
                let (phase2_size, phase2_param, phase2_data): (u32, i32, Vec<u8>) = match phase1 {
                    Some(phase1) => {
                        let reply = match phase1(&mut ctx, header.msg_type, &payload, header.parameter)
                        {
                            Ok(reply) => reply,
                            Err(e) => HandlerReply { result: e.result_code(), data: Vec::new() },
                        };
                        let mut data = reply.data;
                        data.truncate(max_data_size as usize);
                        (data.len() as u32, reply.result, data)
                    },
                    None => (header.data_size, header.parameter, payload),
                };

                send_encrypted_reply(io, &mut enc, 0, phase2_param, &[], io_timeout).await?;
                let _ = io.shutdown().await;

                let mut ctx = HandlerContext {
                    store: &mut *store,
                    secret: &mut *secret,
                    reboot: &mut *reboot,
                    board_id_hex,
                    version,
                    max_data_size,
                };
                phase2(
                    &mut ctx,
                    header.msg_type,
                    &phase2_data[..phase2_size as usize],
                    phase2_param,
                );
                return Ok(());
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn send_encrypted_reply<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    enc: &mut EncryptedState,
    data_size: u32,
    result: i32,
    data: &[u8],
    io_timeout: Duration,
) -> Result<(), SessionError> {
    let prefix = header_prefix(data_size, result, msg_type::OK);
    let header = EncHeader {
        data_size,
        parameter: result,
        msg_type: msg_type::OK,
        data_hash: data_hash(&prefix, data),
    };
    let header_block = enc.encrypt_block(&header.encode());
    write_block(io, &header_block, io_timeout).await?;

    let full_blocks = (data_size as usize).div_ceil(BLOCK_LEN);
    for i in 0..full_blocks {
        let start = i * BLOCK_LEN;
        let end = (start + BLOCK_LEN).min(data.len());
        let mut block = [0u8; BLOCK_LEN];
        block[..end - start].copy_from_slice(&data[start..end]);
        let cipher = enc.encrypt_block(&block);
        write_block(io, &cipher, io_timeout).await?;
    }
    Ok(())
}
