// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Drucksiegel secure transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a secure session, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of the handshake this session plays.
///
/// A server credential is scoped inbound, a client credential outbound;
/// the security provider enforces the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Client,
    Server,
}

/// Lifecycle states of a secure session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Allocated, no handshake attempted yet.
    Idle,
    /// Handshake completed; record traffic may flow.
    Established,
    /// Connect/Accept failed — only shutdown is valid from here.
    Failed,
    /// Shut down; all resources released.
    Closed,
}

/// Peer-certificate acceptance policy applied after the client handshake.
///
/// Both flags default to rejecting. They are independent: allowing an
/// untrusted root does not allow an expired certificate, and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePolicy {
    /// Accept a chain that does not terminate in a trusted root.
    pub allow_untrusted_root: bool,
    /// Accept a certificate outside its validity window.
    pub allow_expired: bool,
}

/// Record framing sizes reported by the security provider once the
/// handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSizes {
    /// Bytes reserved in front of each record for the frame header.
    pub header_len: usize,
    /// Bytes reserved after each record for the frame trailer (MAC, padding).
    pub trailer_len: usize,
    /// Largest plaintext chunk a single record may carry.
    pub max_message_len: usize,
}

impl StreamSizes {
    /// Size of the largest possible framed record.
    pub fn max_record_len(&self) -> usize {
        self.header_len + self.max_message_len + self.trailer_len
    }
}
