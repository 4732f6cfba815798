// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Growable receive buffer for ciphertext staging.
//
// Capacity grows in fixed 4096-byte increments and never shrinks for the
// life of the session, and `used ≤ capacity` holds at all times. Leftover
// bytes (handshake "extra" data, trailing ciphertext after a decrypt) are
// carried by shifting the tail of the filled region to the front.

use drucksiegel_core::error::{DrucksiegelError, Result};

use crate::socket::Socket;

/// Fixed capacity growth step.
pub const GROW_INCREMENT: usize = 4096;

/// Bytes read from the socket but not yet fully decrypted.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    data: Vec<u8>,
    used: usize,
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of filled bytes.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Allocated capacity. Only ever grows, in `GROW_INCREMENT` steps.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The filled region.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// The filled region, mutable — decrypt operates on it in place.
    pub fn filled_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.used]
    }

    /// Grow by one increment if no spare room is left.
    pub fn ensure_spare(&mut self) -> Result<()> {
        if self.data.len() <= self.used {
            self.data
                .try_reserve_exact(GROW_INCREMENT)
                .map_err(|_| DrucksiegelError::OutOfMemory)?;
            let new_len = self.data.len() + GROW_INCREMENT;
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    /// The unfilled region, for the socket to receive into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Mark `n` spare bytes as filled.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.used + n <= self.data.len());
        self.used += n;
    }

    /// Keep only the last `n` filled bytes, moved to the front.
    /// `retain_tail(0)` clears the buffer.
    pub fn retain_tail(&mut self, n: usize) {
        debug_assert!(n <= self.used);
        let start = self.used - n;
        self.data.copy_within(start..self.used, 0);
        self.used = n;
    }

    pub fn clear(&mut self) {
        self.used = 0;
    }

    /// Receive once from `socket` into the spare region, growing first if
    /// the buffer is full. A zero-byte read means the peer disconnected.
    pub fn fill_from<S: Socket>(&mut self, socket: &mut S) -> Result<usize> {
        self.ensure_spare()?;
        let n = socket.recv(self.spare_mut())?;
        if n == 0 {
            return Err(DrucksiegelError::ConnectionReset);
        }
        self.advance(n);
        Ok(n)
    }
}
