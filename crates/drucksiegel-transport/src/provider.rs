// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security provider boundary.
//
// The provider owns everything cryptographic: cipher negotiation, the
// concrete record byte layout, and X.509 chain verification. The session
// only moves opaque tokens and framed records between the provider and
// the socket. One provider drives many sessions; per-session state lives
// in the provider's `Context` type, which the session owns and releases
// exactly once (dropping it releases the context, including on early
// failure paths).

use drucksiegel_core::error::Result;
use drucksiegel_core::types::{CertificatePolicy, Role, StreamSizes};

use crate::credentials::Credential;

/// Outcome of one handshake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// The input did not contain a complete handshake message; read more
    /// bytes from the peer and call again with the extended input.
    NeedMoreInput,
    /// Negotiation continues. `output` is a token to send to the peer;
    /// `leftover` counts unconsumed bytes at the tail of the input, which
    /// must be fed back on the next step.
    Continue {
        output: Option<Vec<u8>>,
        leftover: usize,
    },
    /// Negotiation finished. `output` is a final token to send, if any;
    /// `leftover` counts trailing input bytes that belong to the record
    /// phase (ciphertext the peer bundled with its last handshake flight).
    Complete {
        output: Option<Vec<u8>>,
        leftover: usize,
    },
}

/// Outcome of one record decrypt attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStep {
    /// The input does not yet hold a complete record.
    NeedMoreInput,
    /// The peer closed the channel; no further records will decrypt.
    ContextExpired,
    /// A record was decrypted in place. The plaintext sits at
    /// `input[data_offset..data_offset + data_len]`; the final `extra_len`
    /// bytes of the input are untouched ciphertext belonging to the next
    /// record.
    Ok {
        data_offset: usize,
        data_len: usize,
        extra_len: usize,
    },
}

/// Actual framing sizes used by one encrypt call. May be smaller than the
/// sizes reported by [`SecurityProvider::stream_sizes`], and may differ
/// from call to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordShape {
    pub header_len: usize,
    pub trailer_len: usize,
}

/// The capability boundary to the platform security package.
pub trait SecurityProvider {
    /// Role-scoped credential handle built from stored certificate material.
    type Credential;
    /// Opaque per-session negotiation state. Dropping it releases the
    /// context.
    type Context;

    /// Build a role-scoped credential handle from a stored certificate.
    fn acquire_credential(
        &mut self,
        certificate: &Credential,
        role: Role,
    ) -> Result<Self::Credential>;

    /// Start a client handshake: create a security context and produce the
    /// initial token. The step must be [`HandshakeStep::Continue`] with an
    /// output token, or the connect fails.
    fn client_start(
        &mut self,
        credential: &Self::Credential,
        server_name: &str,
    ) -> Result<(Self::Context, HandshakeStep)>;

    /// Advance a client handshake with bytes received from the server.
    fn client_step(&mut self, context: &mut Self::Context, input: &[u8]) -> Result<HandshakeStep>;

    /// Advance a server handshake with bytes received from the client.
    /// On the first call `context` is `None` and the provider creates it.
    fn server_step(
        &mut self,
        credential: &Self::Credential,
        context: &mut Option<Self::Context>,
        input: &[u8],
    ) -> Result<HandshakeStep>;

    /// Encrypt one record in place. On entry the plaintext chunk sits at
    /// `record[header_len..header_len + data_len]` with the queried header
    /// and trailer regions reserved around it; on return the framed record
    /// occupies `record[..shape.header_len + data_len + shape.trailer_len]`.
    fn encrypt(
        &mut self,
        context: &mut Self::Context,
        record: &mut [u8],
        data_len: usize,
    ) -> Result<RecordShape>;

    /// Decrypt the leading record of `input` in place.
    fn decrypt(&mut self, context: &mut Self::Context, input: &mut [u8]) -> Result<DecryptStep>;

    /// Framing sizes for the negotiated cipher. Valid once the handshake
    /// has completed.
    fn stream_sizes(&mut self, context: &Self::Context) -> Result<StreamSizes>;

    /// Verify the peer's certificate chain against `peer_name` under the
    /// given acceptance policy.
    fn verify_peer(
        &mut self,
        context: &Self::Context,
        peer_name: &str,
        policy: &CertificatePolicy,
    ) -> Result<()>;

    /// Apply a close-notify control token to the context and return the
    /// outbound shutdown message, if the protocol has one.
    fn shutdown_token(&mut self, context: &mut Self::Context) -> Result<Option<Vec<u8>>>;
}
