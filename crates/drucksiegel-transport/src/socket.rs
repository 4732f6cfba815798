// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Byte-stream socket boundary.
//
// The session never opens or closes connections itself — it adopts an
// already-connected endpoint and drives it through this trait. Would-block
// surfaces as `io::ErrorKind::WouldBlock`; a zero-byte `recv` means the
// peer closed the stream.

use std::io::{self, Read, Write};
use std::net::TcpStream;

/// An already-connected byte-stream endpoint.
pub trait Socket {
    /// Send bytes, returning how many were accepted by the transport.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Receive up to `buf.len()` bytes. Returns 0 when the peer has
    /// closed the stream.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Socket for TcpStream {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        Write::write(self, data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}
