//! Length-prefixed message codec: a 4-byte big-endian length header followed
//! by exactly that many payload bytes. No magic, no escape, no checksum.

use crate::endpoint::Endpoint;
use crate::error::{fold_transfer, NetworkError, NetworkResult};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{Read, Write};

pub const HEADER_SIZE: usize = 4;

/// Sends one complete message: header, then every payload byte. Partial
/// writes are retried internally; the result is all-or-error, never a count.
pub fn send_length(endpoint: &Endpoint, payload: &[u8]) -> NetworkResult<()> {
    let mut stream = endpoint;

    write_message(&mut stream, payload)
}

/// Receives one complete message into `buf`, returning its length. A decoded
/// length larger than the buffer fails with `Protocol` before any payload
/// byte is consumed; the message is then unrecoverable and the caller must
/// close the endpoint.
pub fn recv_length(endpoint: &Endpoint, buf: &mut [u8]) -> NetworkResult<usize> {
    let mut stream = endpoint;

    read_message(&mut stream, buf)
}

pub(crate) fn write_message<W: Write>(stream: &mut W, payload: &[u8]) -> NetworkResult<()> {
    if payload.len() > u32::MAX as usize {
        return Err(NetworkError::InvalidInput);
    }

    stream
        .write_u32::<BigEndian>(payload.len() as u32)
        .map_err(fold_transfer)?;
    stream.write_all(payload).map_err(fold_transfer)?;

    Ok(())
}

pub(crate) fn read_message<R: Read>(stream: &mut R, buf: &mut [u8]) -> NetworkResult<usize> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).map_err(fold_transfer)?;

    let length = BigEndian::read_u32(&header) as usize;

    if length > buf.len() {
        return Err(NetworkError::Protocol);
    }

    stream.read_exact(&mut buf[..length]).map_err(fold_transfer)?;

    Ok(length)
}
