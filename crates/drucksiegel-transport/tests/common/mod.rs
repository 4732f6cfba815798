// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared test doubles: a scripted socket and a fake security provider.
//
// The fake provider speaks a toy protocol so tests can stage real byte
// exchanges: handshake tokens are exactly 8 bytes, and records are
// framed as [0xD5, 0x00, len_be16] + XOR-masked payload + [0xEE, 0xEE].

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use drucksiegel_core::error::{DrucksiegelError, Result};
use drucksiegel_core::types::{CertificatePolicy, Role, StreamSizes};
use drucksiegel_transport::credentials::Credential;
use drucksiegel_transport::provider::{DecryptStep, HandshakeStep, RecordShape, SecurityProvider};
use drucksiegel_transport::socket::Socket;

pub const TOKEN_LEN: usize = 8;
pub const HEADER_LEN: usize = 4;
pub const TRAILER_LEN: usize = 2;

const MAGIC: u8 = 0xD5;
const XOR_KEY: u8 = 0x5A;
const TRAILER_BYTE: u8 = 0xEE;

/// An 8-byte handshake flight as the fake peer would send it.
pub fn handshake_token() -> Vec<u8> {
    b"PEERTOKN".to_vec()
}

/// Frame `payload` the way the fake provider's encrypt does.
pub fn encrypt_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    frame.push(MAGIC);
    frame.push(0);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend(payload.iter().map(|b| b ^ XOR_KEY));
    frame.extend_from_slice(&[TRAILER_BYTE, TRAILER_BYTE]);
    frame
}

/// Parse a byte run of consecutive frames back into payloads.
pub fn decode_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    while !bytes.is_empty() {
        assert!(bytes.len() >= HEADER_LEN + TRAILER_LEN, "truncated frame");
        assert_eq!(bytes[0], MAGIC, "bad frame magic");
        let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        let total = HEADER_LEN + len + TRAILER_LEN;
        assert!(bytes.len() >= total, "frame shorter than declared");
        assert_eq!(bytes[total - 2], TRAILER_BYTE);
        assert_eq!(bytes[total - 1], TRAILER_BYTE);
        payloads.push(
            bytes[HEADER_LEN..HEADER_LEN + len]
                .iter()
                .map(|b| b ^ XOR_KEY)
                .collect(),
        );
        bytes = &bytes[total..];
    }
    payloads
}

// ---------------------------------------------------------------------------
// Scripted socket
// ---------------------------------------------------------------------------

/// One scripted `recv` outcome.
pub enum SocketEvent {
    Data(Vec<u8>),
    WouldBlock,
    Error(io::ErrorKind),
    Disconnect,
}

/// A socket whose reads replay a script and whose writes are recorded.
///
/// Oversized `Data` events are delivered across as many `recv` calls as
/// the destination requires, so byte-level delivery chunking is driven
/// entirely by the script. An exhausted script reads as a disconnect.
pub struct ScriptedSocket {
    events: VecDeque<SocketEvent>,
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
    send_calls: usize,
    short_send_after: Option<usize>,
}

impl ScriptedSocket {
    pub fn new(events: Vec<SocketEvent>) -> Self {
        Self {
            events: events.into(),
            sent: Rc::new(RefCell::new(Vec::new())),
            send_calls: 0,
            short_send_after: None,
        }
    }

    /// Sends after the first `calls` report only half the bytes accepted.
    pub fn short_send_after(mut self, calls: usize) -> Self {
        self.short_send_after = Some(calls);
        self
    }

    /// Handle onto the per-call send log, usable after the socket has
    /// been adopted by a session.
    pub fn sent_handle(&self) -> Rc<RefCell<Vec<Vec<u8>>>> {
        Rc::clone(&self.sent)
    }
}

impl Socket for ScriptedSocket {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.send_calls += 1;
        self.sent.borrow_mut().push(data.to_vec());
        match self.short_send_after {
            Some(calls) if self.send_calls > calls => Ok(data.len() / 2),
            _ => Ok(data.len()),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.events.pop_front() {
            None | Some(SocketEvent::Disconnect) => Ok(0),
            Some(SocketEvent::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(SocketEvent::Error(kind)) => Err(kind.into()),
            Some(SocketEvent::Data(data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.events
                        .push_front(SocketEvent::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fake security provider
// ---------------------------------------------------------------------------

/// Scripted provider: completes the handshake after a fixed number of
/// step calls and frames records with the toy layout above.
pub struct FakeProvider {
    /// Handshake step calls (token flights consumed) before `Complete`.
    pub rounds: u32,
    pub max_message_len: usize,
    /// Peer chain does not terminate in a trusted root.
    pub peer_self_signed: bool,
    /// Peer certificate is outside its validity window.
    pub peer_expired: bool,
    /// Report an expired context on the next decrypt.
    pub expire_on_decrypt: bool,
}

impl FakeProvider {
    pub fn new(rounds: u32, max_message_len: usize) -> Self {
        Self {
            rounds,
            max_message_len,
            peer_self_signed: false,
            peer_expired: false,
            expire_on_decrypt: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeContext {
    steps: u32,
}

#[derive(Debug)]
pub struct FakeCredentialHandle {
    pub role: Role,
}

impl FakeProvider {
    fn step(&self, context: &mut FakeContext, input: &[u8], output: &[u8]) -> HandshakeStep {
        if input.len() < TOKEN_LEN {
            return HandshakeStep::NeedMoreInput;
        }
        context.steps += 1;
        let leftover = input.len() - TOKEN_LEN;
        if context.steps < self.rounds {
            HandshakeStep::Continue {
                output: Some(output.to_vec()),
                leftover,
            }
        } else {
            HandshakeStep::Complete {
                output: Some(output.to_vec()),
                leftover,
            }
        }
    }
}

impl SecurityProvider for FakeProvider {
    type Credential = FakeCredentialHandle;
    type Context = FakeContext;

    fn acquire_credential(
        &mut self,
        _certificate: &Credential,
        role: Role,
    ) -> Result<Self::Credential> {
        Ok(FakeCredentialHandle { role })
    }

    fn client_start(
        &mut self,
        _credential: &Self::Credential,
        _server_name: &str,
    ) -> Result<(Self::Context, HandshakeStep)> {
        Ok((
            FakeContext::default(),
            HandshakeStep::Continue {
                output: Some(b"CLIHELLO".to_vec()),
                leftover: 0,
            },
        ))
    }

    fn client_step(&mut self, context: &mut Self::Context, input: &[u8]) -> Result<HandshakeStep> {
        Ok(self.step(context, input, b"CLITOKEN"))
    }

    fn server_step(
        &mut self,
        _credential: &Self::Credential,
        context: &mut Option<Self::Context>,
        input: &[u8],
    ) -> Result<HandshakeStep> {
        let context = context.get_or_insert_with(FakeContext::default);
        Ok(self.step(context, input, b"SRVTOKEN"))
    }

    fn encrypt(
        &mut self,
        _context: &mut Self::Context,
        record: &mut [u8],
        data_len: usize,
    ) -> Result<RecordShape> {
        record[0] = MAGIC;
        record[1] = 0;
        record[2..4].copy_from_slice(&(data_len as u16).to_be_bytes());
        for b in &mut record[HEADER_LEN..HEADER_LEN + data_len] {
            *b ^= XOR_KEY;
        }
        record[HEADER_LEN + data_len] = TRAILER_BYTE;
        record[HEADER_LEN + data_len + 1] = TRAILER_BYTE;
        Ok(RecordShape {
            header_len: HEADER_LEN,
            trailer_len: TRAILER_LEN,
        })
    }

    fn decrypt(&mut self, _context: &mut Self::Context, input: &mut [u8]) -> Result<DecryptStep> {
        if self.expire_on_decrypt {
            return Ok(DecryptStep::ContextExpired);
        }
        if input.len() < HEADER_LEN {
            return Ok(DecryptStep::NeedMoreInput);
        }
        if input[0] != MAGIC {
            return Err(DrucksiegelError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad record magic",
            )));
        }
        let data_len = u16::from_be_bytes([input[2], input[3]]) as usize;
        let total = HEADER_LEN + data_len + TRAILER_LEN;
        if input.len() < total {
            return Ok(DecryptStep::NeedMoreInput);
        }
        for b in &mut input[HEADER_LEN..HEADER_LEN + data_len] {
            *b ^= XOR_KEY;
        }
        Ok(DecryptStep::Ok {
            data_offset: HEADER_LEN,
            data_len,
            extra_len: input.len() - total,
        })
    }

    fn stream_sizes(&mut self, _context: &Self::Context) -> Result<StreamSizes> {
        Ok(StreamSizes {
            header_len: HEADER_LEN,
            trailer_len: TRAILER_LEN,
            max_message_len: self.max_message_len,
        })
    }

    fn verify_peer(
        &mut self,
        _context: &Self::Context,
        _peer_name: &str,
        policy: &CertificatePolicy,
    ) -> Result<()> {
        if self.peer_self_signed && !policy.allow_untrusted_root {
            return Err(DrucksiegelError::Certificate(
                "chain does not terminate in a trusted root".into(),
            ));
        }
        if self.peer_expired && !policy.allow_expired {
            return Err(DrucksiegelError::Certificate(
                "certificate is outside its validity window".into(),
            ));
        }
        Ok(())
    }

    fn shutdown_token(&mut self, _context: &mut Self::Context) -> Result<Option<Vec<u8>>> {
        Ok(Some(b"CLOSNOTI".to_vec()))
    }
}
