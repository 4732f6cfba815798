// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record layer — chunk-and-encrypt on the way out, decrypt-and-buffer on
// the way in.
//
// Reads drain the already-decrypted FIFO before touching the socket, so
// a record larger than the caller's buffer is delivered across several
// calls in order, exactly once. Writes never split a record across
// sends: a short send is fatal.

use std::io;

use drucksiegel_core::error::{DrucksiegelError, Result};
use drucksiegel_core::types::StreamSizes;
use tracing::debug;

use crate::buffer::RecvBuffer;
use crate::provider::{DecryptStep, SecurityProvider};
use crate::socket::Socket;

/// Encrypt and send `data`, one record per chunk of at most
/// `sizes.max_message_len` plaintext bytes. Returns `data.len()` on
/// success.
pub(crate) fn write_records<P, S>(
    provider: &mut P,
    context: &mut P::Context,
    socket: &mut S,
    sizes: &StreamSizes,
    data: &[u8],
) -> Result<usize>
where
    P: SecurityProvider,
    S: Socket,
{
    if data.is_empty() {
        return Ok(0);
    }

    // One scratch allocation serves every chunk of this write.
    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(sizes.max_record_len())
        .map_err(|_| DrucksiegelError::OutOfMemory)?;
    scratch.resize(sizes.max_record_len(), 0);

    for chunk in data.chunks(sizes.max_message_len) {
        scratch[sizes.header_len..sizes.header_len + chunk.len()].copy_from_slice(chunk);

        let shape = provider.encrypt(context, &mut scratch, chunk.len())?;
        let record_len = shape.header_len + chunk.len() + shape.trailer_len;

        let sent = socket.send(&scratch[..record_len])?;
        if sent != record_len {
            return Err(DrucksiegelError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "short record send",
            )));
        }
        debug!(plaintext = chunk.len(), record = record_len, "record sent");
    }

    Ok(data.len())
}

/// Decrypt towards the caller.
///
/// With a destination, drains `read_buffer` first (never touching the
/// socket), then decrypts — receiving more ciphertext as needed — and
/// returns the bytes copied out; decrypted bytes beyond the destination's
/// capacity are queued in `read_buffer`. Without a destination this is
/// the `pending` probe: it decrypts whatever is already staged but never
/// receives, and returns the total now queued in `read_buffer`.
pub(crate) fn read_records<P, S>(
    provider: &mut P,
    context: &mut P::Context,
    socket: &mut S,
    decrypt_buffer: &mut RecvBuffer,
    read_buffer: &mut Vec<u8>,
    mut dest: Option<&mut [u8]>,
) -> Result<usize>
where
    P: SecurityProvider,
    S: Socket,
{
    if let Some(buf) = dest.as_deref_mut() {
        if !read_buffer.is_empty() {
            let n = buf.len().min(read_buffer.len());
            buf[..n].copy_from_slice(&read_buffer[..n]);
            read_buffer.drain(..n);
            return Ok(n);
        }
    }

    loop {
        match provider.decrypt(context, decrypt_buffer.filled_mut())? {
            DecryptStep::NeedMoreInput => {
                if dest.is_none() {
                    // Pending probe: report what is buffered, don't block.
                    return Ok(read_buffer.len());
                }
                let n = decrypt_buffer.fill_from(socket)?;
                debug!(bytes = n, "record data received");
            }
            DecryptStep::ContextExpired => {
                debug!("security context expired");
                return Err(DrucksiegelError::ConnectionReset);
            }
            DecryptStep::Ok {
                data_offset,
                data_len,
                extra_len,
            } => {
                let copied = match dest.as_deref_mut() {
                    Some(buf) => {
                        let n = buf.len().min(data_len);
                        buf[..n]
                            .copy_from_slice(&decrypt_buffer.filled()[data_offset..data_offset + n]);
                        n
                    }
                    None => 0,
                };

                // Queue whatever the caller's buffer couldn't take.
                let spill = data_len - copied;
                if spill > 0 {
                    read_buffer
                        .try_reserve_exact(spill)
                        .map_err(|_| DrucksiegelError::OutOfMemory)?;
                    read_buffer.extend_from_slice(
                        &decrypt_buffer.filled()[data_offset + copied..data_offset + data_len],
                    );
                }

                // Trailing ciphertext becomes the start of the next record.
                decrypt_buffer.retain_tail(extra_len);

                debug!(decrypted = data_len, copied, spill, extra = extra_len, "record decrypted");
                return Ok(if dest.is_some() {
                    copied
                } else {
                    read_buffer.len()
                });
            }
        }
    }
}
