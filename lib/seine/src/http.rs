//! Trivial HTTP/1.1 client: a fixed GET request and a status-line parser.
//! No header or body handling; consumers that need real HTTP bring their
//! own parser.

use crate::endpoint::Endpoint;
use crate::error::{fold_transfer, NetworkError, NetworkResult};
use std::io::Write;

/// Upper bound on a formatted request; longer requests are rejected rather
/// than truncated.
pub const REQUEST_MAX: usize = 512;

const LINE_MAX: usize = 512;
const VERSION_MAX: usize = 15;
const REASON_MAX: usize = 63;

/// Parsed response status line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
}

/// Formats and sends `GET {path}` with the fixed host and close headers.
pub fn get(endpoint: &Endpoint, path: &str) -> NetworkResult<()> {
    if path.is_empty() {
        return Err(NetworkError::InvalidInput);
    }

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Connection: close\r\n\
         \r\n"
    );

    if request.len() > REQUEST_MAX {
        return Err(NetworkError::InvalidInput);
    }

    let mut stream = endpoint;

    stream.write_all(request.as_bytes()).map_err(fold_transfer)
}

/// Reads one CRLF-terminated line and parses it as a status line. Nothing
/// past the line terminator is consumed.
pub fn read_response(endpoint: &Endpoint) -> NetworkResult<Response> {
    let line = read_line(endpoint)?;

    parse_status_line(&line)
}

/// Byte-at-a-time line read: CR is skipped, LF terminates. Oversize lines
/// are truncated at the cap, matching the fixed-buffer contract.
fn read_line(endpoint: &Endpoint) -> NetworkResult<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if endpoint.recv(&mut byte)? == 0 {
            return Err(NetworkError::ConnReset);
        }

        match byte[0] {
            b'\r' => continue,
            b'\n' => break,
            other => {
                line.push(other);
                if line.len() == LINE_MAX {
                    break;
                }
            }
        }
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn parse_status_line(line: &str) -> NetworkResult<Response> {
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().unwrap_or("");
    if version.is_empty() || version.len() > VERSION_MAX {
        return Err(NetworkError::Protocol);
    }

    let status = parts
        .next()
        .and_then(|token| token.parse::<u16>().ok())
        .ok_or(NetworkError::Protocol)?;

    // The reason is optional and capped; anything past the cap is dropped.
    let reason: String = parts.next().unwrap_or("").chars().take(REASON_MAX).collect();

    Ok(Response {
        version: version.to_owned(),
        status,
        reason,
    })
}
