// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Drucksiegel.

use thiserror::Error;

/// Top-level error type for all Drucksiegel operations.
#[derive(Debug, Error)]
pub enum DrucksiegelError {
    // -- Credential provisioning --
    #[error("credential provisioning failed: {0}")]
    Credential(String),

    // -- Handshake --
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("certificate verification failed: {0}")]
    Certificate(String),

    // -- Record layer --
    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("channel not established")]
    NotEstablished,

    // -- Resources --
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer allocation failed")]
    OutOfMemory,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DrucksiegelError>;
