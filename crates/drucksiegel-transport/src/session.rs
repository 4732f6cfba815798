// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure session lifecycle.
//
// One session protects one already-connected socket: acquire a
// credential, connect or accept, then read/write records until shutdown.
// A session is strictly single-threaded — every operation takes
// `&mut self` and mutates the staging buffers in place. Callers that
// need parallel channels run one session per socket.

use drucksiegel_core::config::AcceptConfig;
use drucksiegel_core::error::{DrucksiegelError, Result};
use drucksiegel_core::types::{CertificatePolicy, Role, SessionId, SessionState, StreamSizes};
use tracing::{debug, info, instrument, warn};

use crate::buffer::RecvBuffer;
use crate::credentials::{CredentialStore, provision_credential};
use crate::handshake;
use crate::provider::SecurityProvider;
use crate::record;
use crate::socket::Socket;

/// A protected byte-stream channel over an adopted socket.
///
/// The session owns its socket, its credential handle, and the
/// provider's security context; `shutdown` (or drop) releases all three
/// exactly once, from any state — including a session whose handshake
/// never ran or failed halfway.
pub struct SecureSession<P: SecurityProvider, S: Socket> {
    id: SessionId,
    provider: P,
    socket: Option<S>,
    credential: Option<P::Credential>,
    context: Option<P::Context>,
    state: SessionState,
    policy: CertificatePolicy,
    accept_config: AcceptConfig,
    sizes: Option<StreamSizes>,
    /// Ciphertext staging, shared by handshake and record phases.
    decrypt_buffer: RecvBuffer,
    /// Decrypted bytes not yet delivered to the caller, in order.
    read_buffer: Vec<u8>,
}

impl<P: SecurityProvider, S: Socket> SecureSession<P, S> {
    /// Allocate an empty session. No socket is adopted and no credential
    /// is held until `connect`/`accept`.
    pub fn new(provider: P) -> Self {
        Self {
            id: SessionId::new(),
            provider,
            socket: None,
            credential: None,
            context: None,
            state: SessionState::Idle,
            policy: CertificatePolicy::default(),
            accept_config: AcceptConfig::default(),
            sizes: None,
            decrypt_buffer: RecvBuffer::new(),
            read_buffer: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Accept a peer chain that does not terminate in a trusted root.
    /// Takes effect on the next `connect`.
    pub fn set_allow_untrusted_root(&mut self, allow: bool) {
        self.policy.allow_untrusted_root = allow;
    }

    /// Accept a peer certificate outside its validity window. Takes
    /// effect on the next `connect`.
    pub fn set_allow_expired_cert(&mut self, allow: bool) {
        self.policy.allow_expired = allow;
    }

    /// Replace the would-block retry policy used by `accept`.
    pub fn set_accept_config(&mut self, config: AcceptConfig) {
        self.accept_config = config;
    }

    /// Provision a certificate for `common_name` from `store` (creating
    /// a self-signed one if necessary) and build the role-scoped
    /// credential handle this session will handshake with.
    #[instrument(skip(self, store), fields(session = %self.id, %common_name, ?role))]
    pub fn acquire_credential<C: CredentialStore>(
        &mut self,
        store: &mut C,
        container: &str,
        common_name: &str,
        role: Role,
    ) -> Result<()> {
        let certificate = provision_credential(store, container, common_name)?;
        let handle = self.provider.acquire_credential(&certificate, role)?;
        debug!(fingerprint = %certificate.fingerprint(), "credential acquired");
        self.credential = Some(handle);
        Ok(())
    }

    /// Establish the channel as a client over `socket`, validating the
    /// server's certificate chain against `hostname` under the session's
    /// policy. On failure the session is left in `Failed` state; only
    /// `shutdown` is valid from there.
    #[instrument(skip_all, fields(session = %self.id, %hostname))]
    pub fn connect(&mut self, mut socket: S, hostname: &str) -> Result<()> {
        self.ensure_idle()?;
        let Some(credential) = self.credential.as_ref() else {
            return Err(DrucksiegelError::Credential(
                "no credential acquired for this session".into(),
            ));
        };

        let outcome = handshake::drive_client(
            &mut self.provider,
            credential,
            &mut socket,
            hostname,
            &self.policy,
            &mut self.decrypt_buffer,
        );
        // The session owns the socket from here on, even on failure, so
        // shutdown closes it.
        self.socket = Some(socket);

        self.finish_handshake(outcome)
    }

    /// Establish the channel as a server over `socket`. Would-block
    /// reads are retried under the accept policy; no peer-certificate
    /// verification is performed.
    #[instrument(skip_all, fields(session = %self.id))]
    pub fn accept(&mut self, mut socket: S) -> Result<()> {
        self.ensure_idle()?;
        let Some(credential) = self.credential.as_ref() else {
            return Err(DrucksiegelError::Credential(
                "no credential acquired for this session".into(),
            ));
        };

        let outcome = handshake::drive_server(
            &mut self.provider,
            credential,
            &mut socket,
            &self.accept_config,
            &mut self.decrypt_buffer,
        );
        self.socket = Some(socket);

        self.finish_handshake(outcome)
    }

    /// Read decrypted application bytes into `buf`, blocking on the
    /// socket only when nothing decrypted is already buffered.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_established()?;
        let (Some(context), Some(socket)) = (self.context.as_mut(), self.socket.as_mut()) else {
            return Err(DrucksiegelError::NotEstablished);
        };
        record::read_records(
            &mut self.provider,
            context,
            socket,
            &mut self.decrypt_buffer,
            &mut self.read_buffer,
            Some(buf),
        )
    }

    /// Encrypt and send `data`, split into records of at most the
    /// negotiated maximum message size. Returns `data.len()` on success;
    /// any send failure aborts the whole write.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_established()?;
        let Some(sizes) = self.sizes else {
            return Err(DrucksiegelError::NotEstablished);
        };
        let (Some(context), Some(socket)) = (self.context.as_mut(), self.socket.as_mut()) else {
            return Err(DrucksiegelError::NotEstablished);
        };
        record::write_records(&mut self.provider, context, socket, &sizes, data)
    }

    /// Number of decrypted bytes ready for `read`. Decrypts anything
    /// already staged but never touches the socket.
    pub fn pending(&mut self) -> Result<usize> {
        self.ensure_established()?;
        let (Some(context), Some(socket)) = (self.context.as_mut(), self.socket.as_mut()) else {
            return Err(DrucksiegelError::NotEstablished);
        };
        record::read_records(
            &mut self.provider,
            context,
            socket,
            &mut self.decrypt_buffer,
            &mut self.read_buffer,
            None,
        )
    }

    /// Tear the channel down and release every owned resource.
    ///
    /// Best-effort: if a security context exists, its close-notify
    /// message is sent when the provider produces one, but failures are
    /// logged and swallowed. Safe in any state and idempotent.
    #[instrument(skip_all, fields(session = %self.id))]
    pub fn shutdown(&mut self) {
        if let Some(mut context) = self.context.take() {
            match self.provider.shutdown_token(&mut context) {
                Ok(Some(token)) => {
                    if let Some(socket) = self.socket.as_mut() {
                        match socket.send(&token) {
                            Ok(n) if n == token.len() => {
                                debug!(bytes = n, "close notify sent");
                            }
                            Ok(_) => warn!("short close-notify send"),
                            Err(e) => warn!(error = %e, "close-notify send failed"),
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "close-notify construction failed"),
            }
            // Dropping the context releases it.
        }

        self.credential = None;
        self.sizes = None;
        self.decrypt_buffer = RecvBuffer::new();
        self.read_buffer = Vec::new();
        // Dropping the socket closes it.
        self.socket = None;

        if self.state != SessionState::Closed {
            info!("session closed");
            self.state = SessionState::Closed;
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(DrucksiegelError::Handshake(format!(
                "session cannot handshake in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn ensure_established(&self) -> Result<()> {
        if self.state != SessionState::Established {
            return Err(DrucksiegelError::NotEstablished);
        }
        Ok(())
    }

    fn finish_handshake(&mut self, outcome: Result<(P::Context, StreamSizes)>) -> Result<()> {
        match outcome {
            Ok((context, sizes)) => {
                self.context = Some(context);
                self.sizes = Some(sizes);
                self.state = SessionState::Established;
                info!(
                    header = sizes.header_len,
                    trailer = sizes.trailer_len,
                    max_message = sizes.max_message_len,
                    bundled = self.decrypt_buffer.used(),
                    "secure channel established"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }
}

impl<P: SecurityProvider, S: Socket> Drop for SecureSession<P, S> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            self.shutdown();
        }
    }
}
