// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for the server accept loop.
///
/// Accept is the one place a would-block socket read is tolerated: the
/// read is retried after `retry_delay` until data arrives or the bound is
/// exhausted. All other socket operations treat would-block as a hard
/// I/O error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AcceptConfig {
    /// How many consecutive would-block reads to tolerate before giving up.
    pub max_would_block_retries: u32,
    /// Sleep between would-block retries.
    pub retry_delay: Duration,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            max_would_block_retries: 5000,
            retry_delay: Duration::from_millis(1),
        }
    }
}
