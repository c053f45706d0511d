//! WebSocket client codec: the HTTP upgrade handshake and the RFC 6455 frame
//! layer. Client-to-server frames are masked; incoming frames are required to
//! be unmasked, as server frames must be. Fragmentation is not reassembled;
//! each frame stands alone.

use crate::endpoint::Endpoint;
use crate::error::{fold_transfer, NetworkError, NetworkResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const KEY_LEN: usize = 16;
const RESPONSE_BUF: usize = 2048;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0F;
const LENGTH_MASK: u8 = 0x7F;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn from_wire(bits: u8) -> NetworkResult<Opcode> {
        let opcode = match bits {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            _ => return Err(NetworkError::Protocol),
        };

        Ok(opcode)
    }

    #[inline]
    fn to_wire(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

/// Performs the client upgrade handshake on a connected stream endpoint.
/// The key is 16 bytes from the platform CSPRNG, Base64-encoded to the
/// 24-character header value.
pub fn handshake(endpoint: &Endpoint, host: &str, path: &str) -> NetworkResult<()> {
    if host.is_empty() || path.is_empty() {
        return Err(NetworkError::InvalidInput);
    }

    let mut key_raw = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key_raw);
    let key = BASE64.encode(key_raw);

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    );

    let mut stream = endpoint;
    stream.write_all(request.as_bytes()).map_err(fold_transfer)?;

    let mut response = [0u8; RESPONSE_BUF];
    let count = endpoint.recv(&mut response)?;

    if count == 0 {
        return Err(NetworkError::ConnReset);
    }

    verify_upgrade(&String::from_utf8_lossy(&response[..count]), &key)
}

/// Derives the expected `Sec-WebSocket-Accept` value for a handshake key.
fn accept_token(key: &str) -> String {
    let mut digest = Sha1::new();
    digest.update(key.as_bytes());
    digest.update(WS_GUID.as_bytes());

    BASE64.encode(digest.finalize())
}

/// The response must carry the switching-protocols status and the accept
/// header. When the header parses as a proper `name: value` line, the value
/// must additionally match the token derived from our key.
fn verify_upgrade(response: &str, key: &str) -> NetworkResult<()> {
    if !response.contains("101") {
        return Err(NetworkError::Protocol);
    }

    let accept_value = response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("Sec-WebSocket-Accept") {
            Some(value.trim().to_owned())
        } else {
            None
        }
    });

    match accept_value {
        Some(value) if value == accept_token(key) => Ok(()),
        Some(_) => Err(NetworkError::Protocol),
        None if response.contains("Sec-WebSocket-Accept") => Ok(()),
        None => Err(NetworkError::Protocol),
    }
}

/// Sends one masked text frame with FIN set.
pub fn send_text(endpoint: &Endpoint, msg: &str) -> NetworkResult<()> {
    let mut mask = [0u8; 4];
    OsRng.fill_bytes(&mut mask);

    let mut stream = endpoint;

    write_frame(&mut stream, Opcode::Text, msg.as_bytes(), mask)
}

/// Sends one masked binary frame with FIN set.
pub fn send_binary(endpoint: &Endpoint, payload: &[u8]) -> NetworkResult<()> {
    let mut mask = [0u8; 4];
    OsRng.fill_bytes(&mut mask);

    let mut stream = endpoint;

    write_frame(&mut stream, Opcode::Binary, payload, mask)
}

/// Sends an empty close frame. The peer is expected to answer in kind before
/// the transport is torn down.
pub fn send_close(endpoint: &Endpoint) -> NetworkResult<()> {
    let mut mask = [0u8; 4];
    OsRng.fill_bytes(&mut mask);

    let mut stream = endpoint;

    write_frame(&mut stream, Opcode::Close, &[], mask)
}

/// Receives one frame of any kind, returning its opcode and payload length.
pub fn recv_frame(endpoint: &Endpoint, buf: &mut [u8]) -> NetworkResult<(Opcode, usize)> {
    let mut stream = endpoint;

    read_frame(&mut stream, buf)
}

/// Receives one frame and requires it to be text; returns the payload length.
pub fn recv_text(endpoint: &Endpoint, buf: &mut [u8]) -> NetworkResult<usize> {
    let mut stream = endpoint;
    let (opcode, count) = read_frame(&mut stream, buf)?;

    if opcode != Opcode::Text {
        return Err(NetworkError::Protocol);
    }

    Ok(count)
}

pub(crate) fn write_frame<W: Write>(
    stream: &mut W,
    opcode: Opcode,
    payload: &[u8],
    mask: [u8; 4],
) -> NetworkResult<()> {
    let mut header: Vec<u8> = Vec::with_capacity(14);

    header
        .write_u8(FIN_BIT | opcode.to_wire())
        .map_err(fold_transfer)?;

    match payload.len() {
        len if len <= 125 => header.write_u8(MASK_BIT | len as u8).map_err(fold_transfer)?,
        len if len <= 0xFFFF => {
            header.write_u8(MASK_BIT | 126).map_err(fold_transfer)?;
            header.write_u16::<BigEndian>(len as u16).map_err(fold_transfer)?;
        }
        len => {
            header.write_u8(MASK_BIT | 127).map_err(fold_transfer)?;
            header.write_u64::<BigEndian>(len as u64).map_err(fold_transfer)?;
        }
    }

    header.extend_from_slice(&mask);
    stream.write_all(&header).map_err(fold_transfer)?;

    let masked: Vec<u8> = payload
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ mask[i % 4])
        .collect();

    stream.write_all(&masked).map_err(fold_transfer)?;

    Ok(())
}

pub(crate) fn read_frame<R: Read>(stream: &mut R, buf: &mut [u8]) -> NetworkResult<(Opcode, usize)> {
    let first = stream.read_u8().map_err(fold_transfer)?;
    let second = stream.read_u8().map_err(fold_transfer)?;

    let opcode = Opcode::from_wire(first & OPCODE_MASK)?;

    // Server frames must not be masked (RFC 6455 §5.1).
    if second & MASK_BIT != 0 {
        return Err(NetworkError::Protocol);
    }

    let length = match second & LENGTH_MASK {
        126 => stream.read_u16::<BigEndian>().map_err(fold_transfer)? as u64,
        127 => stream.read_u64::<BigEndian>().map_err(fold_transfer)?,
        len => len as u64,
    };

    if length > buf.len() as u64 {
        return Err(NetworkError::Protocol);
    }

    stream
        .read_exact(&mut buf[..length as usize])
        .map_err(fold_transfer)?;

    Ok((opcode, length as usize))
}
