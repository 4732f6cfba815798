// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Handshake driver — token exchange until the channel is established.
//
// Both roles share the same loop shape: receive ciphertext into the
// decrypt buffer when the provider is starved, feed the filled region to
// the provider, send whatever token it produces, and carry unconsumed
// trailing bytes forward by shifting them to the buffer front. On
// completion the trailing bytes are record-phase ciphertext the peer
// bundled with its final flight; they stay seeded in the buffer so the
// first post-handshake decrypt sees them verbatim.

use std::io;

use drucksiegel_core::config::AcceptConfig;
use drucksiegel_core::error::{DrucksiegelError, Result};
use drucksiegel_core::types::{CertificatePolicy, StreamSizes};
use tracing::debug;

use crate::buffer::RecvBuffer;
use crate::provider::{HandshakeStep, SecurityProvider};
use crate::socket::Socket;

/// Drive a client handshake to completion.
///
/// Returns the established security context and the negotiated framing
/// sizes. `buffer` is left holding any record-phase bytes that arrived
/// bundled with the final handshake message.
pub(crate) fn drive_client<P, S>(
    provider: &mut P,
    credential: &P::Credential,
    socket: &mut S,
    server_name: &str,
    policy: &CertificatePolicy,
    buffer: &mut RecvBuffer,
) -> Result<(P::Context, StreamSizes)>
where
    P: SecurityProvider,
    S: Socket,
{
    buffer.clear();

    // Initiate: produce the first token with no peer input.
    let (mut context, first) = provider.client_start(credential, server_name)?;
    let HandshakeStep::Continue { output, .. } = first else {
        return Err(DrucksiegelError::Handshake(
            "provider did not continue after initiating".into(),
        ));
    };
    let Some(token) = output else {
        return Err(DrucksiegelError::Handshake(
            "provider produced no initial token".into(),
        ));
    };
    send_token(socket, &token)?;

    let mut starved = true;
    loop {
        if starved || buffer.is_empty() {
            let n = buffer.fill_from(socket)?;
            debug!(bytes = n, "handshake data received");
        }

        match provider.client_step(&mut context, buffer.filled())? {
            HandshakeStep::NeedMoreInput => {
                starved = true;
            }
            HandshakeStep::Continue { output, leftover } => {
                if let Some(token) = output {
                    send_token(socket, &token)?;
                }
                buffer.retain_tail(leftover);
                starved = false;
            }
            HandshakeStep::Complete { output, leftover } => {
                if let Some(token) = output {
                    send_token(socket, &token)?;
                }
                buffer.retain_tail(leftover);
                debug!(bundled = leftover, "handshake complete");
                break;
            }
        }
    }

    provider.verify_peer(&context, server_name, policy)?;
    let sizes = queried_sizes(provider, &context)?;

    Ok((context, sizes))
}

/// Drive a server handshake to completion.
///
/// Symmetric to [`drive_client`] except that the provider creates the
/// security context on the first accept step, would-block reads are
/// retried under `accept`, and no peer-certificate verification is
/// performed — the server trusts its own credential.
pub(crate) fn drive_server<P, S>(
    provider: &mut P,
    credential: &P::Credential,
    socket: &mut S,
    accept: &AcceptConfig,
    buffer: &mut RecvBuffer,
) -> Result<(P::Context, StreamSizes)>
where
    P: SecurityProvider,
    S: Socket,
{
    buffer.clear();

    let mut context: Option<P::Context> = None;
    let mut starved = true;
    loop {
        if starved || buffer.is_empty() {
            recv_with_backoff(socket, buffer, accept)?;
        }

        match provider.server_step(credential, &mut context, buffer.filled())? {
            HandshakeStep::NeedMoreInput => {
                starved = true;
            }
            HandshakeStep::Continue { output, leftover } => {
                if let Some(token) = output {
                    send_token(socket, &token)?;
                }
                buffer.retain_tail(leftover);
                starved = false;
            }
            HandshakeStep::Complete { output, leftover } => {
                if let Some(token) = output {
                    send_token(socket, &token)?;
                }
                buffer.retain_tail(leftover);
                debug!(bundled = leftover, "handshake complete");
                break;
            }
        }
    }

    let Some(context) = context else {
        return Err(DrucksiegelError::Handshake(
            "provider completed without a security context".into(),
        ));
    };
    let sizes = queried_sizes(provider, &context)?;

    Ok((context, sizes))
}

/// Send one handshake token. Tokens must not be split across sends, so a
/// short send is fatal.
fn send_token<S: Socket>(socket: &mut S, token: &[u8]) -> Result<()> {
    let sent = socket.send(token)?;
    if sent != token.len() {
        return Err(DrucksiegelError::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            "short handshake send",
        )));
    }
    debug!(bytes = sent, "handshake data sent");
    Ok(())
}

/// Receive into `buffer`, retrying would-block reads under the accept
/// policy. Exhausting the bound is an I/O timeout; a disconnect or any
/// other socket error is fatal.
fn recv_with_backoff<S: Socket>(
    socket: &mut S,
    buffer: &mut RecvBuffer,
    accept: &AcceptConfig,
) -> Result<()> {
    buffer.ensure_spare()?;

    let mut attempts = 0u32;
    loop {
        match socket.recv(buffer.spare_mut()) {
            Ok(0) => return Err(DrucksiegelError::ConnectionReset),
            Ok(n) => {
                buffer.advance(n);
                debug!(bytes = n, "handshake data received");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                attempts += 1;
                if attempts > accept.max_would_block_retries {
                    return Err(DrucksiegelError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "peer sent no handshake data within the accept retry bound",
                    )));
                }
                std::thread::sleep(accept.retry_delay);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn queried_sizes<P: SecurityProvider>(
    provider: &mut P,
    context: &P::Context,
) -> Result<StreamSizes> {
    let sizes = provider.stream_sizes(context)?;
    if sizes.max_message_len == 0 {
        return Err(DrucksiegelError::Handshake(
            "provider reported a zero maximum message size".into(),
        ));
    }
    Ok(sizes)
}
