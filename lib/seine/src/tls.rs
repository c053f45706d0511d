//! TLS session wrapper. The session owns the endpoint after `wrap` and
//! preserves its byte-stream semantics; the record layer is rustls, so the
//! contract is backed by a real TLS 1.2+ implementation rather than a stub.

use crate::endpoint::Endpoint;
use crate::error::{fold_transfer, NetworkError, NetworkResult};
use ballast::logging;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, Connection, RootCertStore, ServerConfig, ServerConnection};
use std::io::{Read, Write};
use std::sync::Arc;

/// Role the session was configured for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Client,
    Server,
}

/// One TLS session over one endpoint. Constructed for a role, then bound to
/// an endpoint with [`Session::wrap`], which drives the handshake to
/// completion. After a successful wrap the endpoint must not be used
/// directly; all traffic goes through [`Session::send`] and
/// [`Session::recv`].
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    endpoint: Option<Endpoint>,
    log: logging::Logger,
}

impl Session {
    /// Client-role session validating the peer against the bundled web PKI
    /// roots.
    pub fn client<'a, L: Into<Option<&'a logging::Logger>>>(
        server_name: &str,
        log: L,
    ) -> NetworkResult<Session> {
        if server_name.is_empty() {
            return Err(NetworkError::InvalidInput);
        }

        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
        };

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let name = ServerName::try_from(server_name.to_owned())
            .map_err(|_| NetworkError::InvalidInput)?;

        let conn = ClientConnection::new(Arc::new(config), name)
            .map_err(|_| NetworkError::Protocol)?;

        Ok(Session {
            conn: Connection::Client(conn),
            endpoint: None,
            log: logging::child(log),
        })
    }

    /// Server-role session over a caller-supplied config (see
    /// [`server_config_from_pem`]).
    pub fn server<'a, L: Into<Option<&'a logging::Logger>>>(
        config: Arc<ServerConfig>,
        log: L,
    ) -> NetworkResult<Session> {
        let conn = ServerConnection::new(config).map_err(|_| NetworkError::Protocol)?;

        Ok(Session {
            conn: Connection::Server(conn),
            endpoint: None,
            log: logging::child(log),
        })
    }

    #[inline]
    pub fn role(&self) -> Role {
        match self.conn {
            Connection::Client(_) => Role::Client,
            Connection::Server(_) => Role::Server,
        }
    }

    /// Binds the session to a live endpoint and performs the handshake for
    /// the configured role. On success the session owns the endpoint.
    pub fn wrap(&mut self, endpoint: Endpoint) -> NetworkResult<()> {
        if self.endpoint.is_some() {
            return Err(NetworkError::InvalidInput);
        }
        if endpoint.is_closed() {
            return Err(NetworkError::Closed);
        }

        self.endpoint = Some(endpoint);

        let result = self.drive_handshake();

        logging::debug!(self.log, "tls handshake finished";
                        "role" => ?self.role(),
                        "ok" => result.is_ok());

        if result.is_err() {
            // Hand the descriptor back to the OS; a half-shaken session is
            // not recoverable.
            self.endpoint = None;
        }

        result
    }

    /// Encrypts and sends the whole payload.
    pub fn send(&mut self, payload: &[u8]) -> NetworkResult<usize> {
        if self.endpoint.is_none() {
            return Err(NetworkError::InvalidInput);
        }

        self.conn
            .writer()
            .write_all(payload)
            .map_err(fold_transfer)?;

        self.flush_tls()?;

        Ok(payload.len())
    }

    /// Receives decrypted bytes into `buf`. Zero means the peer closed the
    /// session cleanly.
    pub fn recv(&mut self, buf: &mut [u8]) -> NetworkResult<usize> {
        if self.endpoint.is_none() {
            return Err(NetworkError::InvalidInput);
        }

        loop {
            match self.conn.reader().read(buf) {
                Ok(count) => return Ok(count),
                // No plaintext buffered yet; pull more records.
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    self.read_tls_once()?;
                }
                Err(err) => return Err(fold_transfer(err)),
            }
        }
    }

    /// Notifies the peer and releases the session. The endpoint is closed
    /// with it.
    pub fn close(mut self) -> NetworkResult<()> {
        if self.endpoint.is_some() {
            self.conn.send_close_notify();
            self.flush_tls()?;
        }

        Ok(())
    }

    fn drive_handshake(&mut self) -> NetworkResult<()> {
        while self.conn.is_handshaking() {
            if self.conn.wants_write() {
                self.flush_tls()?;
                continue;
            }

            if self.conn.wants_read() {
                self.read_tls_once()?;
            }
        }

        // Flush anything the handshake left queued (session tickets etc.).
        self.flush_tls()
    }

    fn flush_tls(&mut self) -> NetworkResult<()> {
        let endpoint = self.endpoint.as_ref().ok_or(NetworkError::InvalidInput)?;
        let mut stream = endpoint;

        while self.conn.wants_write() {
            self.conn.write_tls(&mut stream).map_err(fold_transfer)?;
        }

        Ok(())
    }

    fn read_tls_once(&mut self) -> NetworkResult<()> {
        let endpoint = self.endpoint.as_ref().ok_or(NetworkError::InvalidInput)?;
        let mut stream = endpoint;

        let count = self.conn.read_tls(&mut stream).map_err(fold_transfer)?;

        if count == 0 {
            return Err(NetworkError::ConnReset);
        }

        self.conn
            .process_new_packets()
            .map_err(|_| NetworkError::Protocol)?;

        Ok(())
    }
}

/// Builds a server config from PEM-encoded certificate chain and private
/// key.
pub fn server_config_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> NetworkResult<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| NetworkError::InvalidInput)?;

    if certs.is_empty() {
        return Err(NetworkError::InvalidInput);
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|_| NetworkError::InvalidInput)?
        .ok_or(NetworkError::InvalidInput)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|_| NetworkError::InvalidInput)?;

    Ok(Arc::new(config))
}
