// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// drucksiegel-transport — Secure byte-stream channels for print traffic.
//
// This crate provides the secure session used to carry print protocol
// traffic over TLS-protected sockets on platforms without a built-in TLS
// stack: credential provisioning from a certificate store, the
// client/server handshake loop, and the steady-state record layer. All
// cryptography is delegated to a pluggable security provider.

pub mod buffer;
pub mod credentials;
pub mod provider;
pub mod session;
pub mod socket;

mod handshake;
mod record;

// PUBLIC API: Re-export the session and its collaborator boundaries
pub use buffer::RecvBuffer;
pub use credentials::{
    Credential, CredentialStore, MemoryCredentialStore, SqliteCredentialStore,
    provision_credential,
};
pub use provider::{DecryptStep, HandshakeStep, RecordShape, SecurityProvider};
pub use session::SecureSession;
pub use socket::Socket;
