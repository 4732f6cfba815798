// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential provisioning — lazily created self-signed certificates.
//
// A session needs a certificate+key pair before it can handshake. The
// store is asked for one by common name; if none exists (or the stored
// one has expired) a fresh ECDSA P-256 key pair is generated and a
// self-signed certificate with a ten-year validity window is persisted
// under the container name.
//
// # Design note
//
// `ring` provides key generation but no X.509 builder, so the stores
// keep the raw material: the PKCS#8 DER private key and, as the
// certificate blob, the uncompressed SEC1 public key. The active
// security provider owns the concrete certificate encoding; a provider
// that needs full X.509 supplies its own store.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use drucksiegel_core::error::{DrucksiegelError, Result};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// Validity window for freshly generated self-signed certificates.
pub const CREDENTIAL_VALIDITY_DAYS: i64 = 3650;

/// Convert a `rusqlite::Error` into a `DrucksiegelError::Credential`.
fn db_err(e: rusqlite::Error) -> DrucksiegelError {
    DrucksiegelError::Credential(format!("certificate store error: {e}"))
}

/// A certificate plus its private key, as held by a credential store.
///
/// The session references this material through a role-scoped provider
/// handle; the store keeps ownership of the persisted copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Key container the certificate was persisted under.
    pub container: String,
    /// Subject common name.
    pub common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Certificate bytes in whatever encoding the active security
    /// provider expects. The built-in stores place the uncompressed SEC1
    /// public key here.
    pub certificate_der: Vec<u8>,
    /// PKCS#8 v1 DER-encoded private key.
    pub pkcs8_der: Vec<u8>,
}

impl Credential {
    /// SHA-256 hex fingerprint of the certificate bytes, for logs and
    /// audit trails.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.certificate_der);
        hex::encode(hasher.finalize())
    }

    /// Whether `at` falls inside the certificate's validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at < self.not_after
    }
}

/// Looks up or creates named certificate+key pairs.
///
/// The lookup-or-create sequence is not atomic; callers provisioning the
/// same common name from multiple threads must serialize externally.
pub trait CredentialStore {
    /// Find a stored certificate by common name.
    fn find(&mut self, common_name: &str) -> Result<Option<Credential>>;

    /// Generate and persist a self-signed certificate valid from now
    /// until `now + valid_for`. Replaces any stored certificate with the
    /// same common name.
    fn create_self_signed(
        &mut self,
        container: &str,
        common_name: &str,
        valid_for: Duration,
    ) -> Result<Credential>;
}

/// Generate an ECDSA P-256 key pair (PKCS#8 DER private key, uncompressed
/// SEC1 public key) using the OS CSPRNG.
fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>)> {
    let rng = SystemRandom::new();

    let pkcs8_document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .map_err(|e| DrucksiegelError::Credential(format!("key generation failed: {e}")))?;

    let pkcs8_der = pkcs8_document.as_ref().to_vec();

    // Re-parse so we can extract the public key.
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8_der, &rng)
        .map_err(|e| DrucksiegelError::Credential(format!("key parsing failed: {e}")))?;

    let public_key = key_pair.public_key().as_ref().to_vec();

    debug!(
        pkcs8_len = pkcs8_der.len(),
        pubkey_len = public_key.len(),
        "ECDSA P-256 key pair generated"
    );

    Ok((pkcs8_der, public_key))
}

fn build_self_signed(
    container: &str,
    common_name: &str,
    valid_for: Duration,
) -> Result<Credential> {
    let (pkcs8_der, certificate_der) = generate_key_pair()?;
    let now = Utc::now();

    Ok(Credential {
        container: container.to_owned(),
        common_name: common_name.to_owned(),
        not_before: now,
        not_after: now + valid_for,
        certificate_der,
        pkcs8_der,
    })
}

/// Look up `common_name` in `store`, creating and persisting a ten-year
/// self-signed certificate if none is stored. An expired stored
/// certificate is treated as absent and replaced.
#[instrument(skip(store), fields(%container, %common_name))]
pub fn provision_credential<C: CredentialStore>(
    store: &mut C,
    container: &str,
    common_name: &str,
) -> Result<Credential> {
    if let Some(credential) = store.find(common_name)? {
        if credential.is_valid_at(Utc::now()) {
            debug!(
                fingerprint = %credential.fingerprint(),
                "reusing stored certificate"
            );
            return Ok(credential);
        }
        debug!("stored certificate expired — regenerating");
    }

    let credential = store.create_self_signed(
        container,
        common_name,
        Duration::days(CREDENTIAL_VALIDITY_DAYS),
    )?;

    info!(
        fingerprint = %credential.fingerprint(),
        not_after = %credential.not_after,
        "self-signed certificate created"
    );
    Ok(credential)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// `HashMap`-backed store for tests and embedded callers that need no
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: HashMap<String, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing credential, replacing any entry
    /// with the same common name.
    pub fn insert(&mut self, credential: Credential) {
        self.entries
            .insert(credential.common_name.clone(), credential);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find(&mut self, common_name: &str) -> Result<Option<Credential>> {
        Ok(self.entries.get(common_name).cloned())
    }

    fn create_self_signed(
        &mut self,
        container: &str,
        common_name: &str,
        valid_for: Duration,
    ) -> Result<Credential> {
        let credential = build_self_signed(container, common_name, valid_for)?;
        self.insert(credential.clone());
        Ok(credential)
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

/// Certificate store backed by a SQLite database.
///
/// Schema:
///   certificates(
///     id              INTEGER PRIMARY KEY AUTOINCREMENT,
///     container       TEXT NOT NULL,
///     common_name     TEXT NOT NULL UNIQUE,
///     not_before      TEXT NOT NULL,   -- RFC 3339
///     not_after       TEXT NOT NULL,   -- RFC 3339
///     certificate_der BLOB NOT NULL,
///     pkcs8_der       BLOB NOT NULL
///   )
pub struct SqliteCredentialStore {
    conn: Connection,
}

const CERTIFICATES_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS certificates (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        container       TEXT NOT NULL,
        common_name     TEXT NOT NULL UNIQUE,
        not_before      TEXT NOT NULL,
        not_after       TEXT NOT NULL,
        certificate_der BLOB NOT NULL,
        pkcs8_der       BLOB NOT NULL
    );";

impl SqliteCredentialStore {
    /// Open (or create) the certificate database at `path`.
    ///
    /// The `certificates` table is created automatically if it does not
    /// already exist. WAL mode is enabled for better concurrent-read
    /// performance.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL for concurrent readers.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;

        conn.execute_batch(CERTIFICATES_SCHEMA).map_err(db_err)?;

        debug!("certificate store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory certificate database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CERTIFICATES_SCHEMA).map_err(db_err)?;

        debug!("in-memory certificate store opened");
        Ok(Self { conn })
    }
}

fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DrucksiegelError::Credential(format!("stored {field} is malformed: {e}")))
}

impl CredentialStore for SqliteCredentialStore {
    fn find(&mut self, common_name: &str) -> Result<Option<Credential>> {
        let row = self
            .conn
            .query_row(
                "SELECT container, common_name, not_before, not_after,
                        certificate_der, pkcs8_der
                 FROM certificates
                 WHERE common_name = ?1",
                params![common_name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((container, common_name, not_before, not_after, certificate_der, pkcs8_der)) = row
        else {
            return Ok(None);
        };

        Ok(Some(Credential {
            container,
            common_name,
            not_before: parse_rfc3339("not_before", &not_before)?,
            not_after: parse_rfc3339("not_after", &not_after)?,
            certificate_der,
            pkcs8_der,
        }))
    }

    fn create_self_signed(
        &mut self,
        container: &str,
        common_name: &str,
        valid_for: Duration,
    ) -> Result<Credential> {
        let credential = build_self_signed(container, common_name, valid_for)?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO certificates
                     (container, common_name, not_before, not_after,
                      certificate_der, pkcs8_der)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    credential.container,
                    credential.common_name,
                    credential.not_before.to_rfc3339(),
                    credential.not_after.to_rfc3339(),
                    credential.certificate_der,
                    credential.pkcs8_der,
                ],
            )
            .map_err(db_err)?;

        Ok(credential)
    }
}
