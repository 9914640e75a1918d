//! Plain socket connection

use super::{Connection, Stream};
use crate::error::{Error, Result};
use crate::init;
use crate::net::{self, socket, PollMode, ShutdownMode};
use socket2::Socket;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// TCP or Unix-domain socket connection.
///
/// Starts closed. [`Connection::connect`] opens it and [`Connection::close`]
/// returns it to the closed state; both are idempotent.
#[derive(Debug)]
pub struct PlainConnection {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
    socket: Option<Socket>,
}

impl PlainConnection {
    pub fn new(endpoint: Endpoint) -> Self {
        init::ensure();
        PlainConnection {
            endpoint,
            connect_timeout: None,
            socket: None,
        }
    }

    /// Bound the connect attempt; without it connect waits indefinitely
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub(crate) fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    fn timeout_usec(&self) -> u64 {
        self.connect_timeout
            .map(|t| u64::try_from(t.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn open_socket(&self) -> Result<&Socket> {
        self.socket.as_ref().ok_or(Error::NotConnected)
    }
}

impl Connection for PlainConnection {
    fn connect(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let timeout_usec = self.timeout_usec();
        let socket = match &self.endpoint {
            Endpoint::Tcp { host, port } => net::connect_tcp(host, *port, timeout_usec)?,
            Endpoint::Unix(path) => net::connect_unix(path, timeout_usec)?,
        };

        tracing::debug!(endpoint = %self.endpoint, "connected");
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };

        if let Err(e) = socket::shutdown(&socket, ShutdownMode::Both) {
            tracing::trace!(endpoint = %self.endpoint, error = %e, "shutdown before close failed");
        }

        tracing::debug!(endpoint = %self.endpoint, "closing");
        socket::close(Some(socket))
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn available(&self) -> usize {
        self.socket
            .as_ref()
            .and_then(|s| socket::bytes_available(s).ok())
            .unwrap_or(0)
    }

    fn has_space(&self) -> bool {
        self.socket
            .as_ref()
            .map(|s| socket::poll_one(s, PollMode::Write, false, 0).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl Stream for PlainConnection {
    fn recv_some(&mut self, buf: &mut [u8], wait: bool) -> Result<usize> {
        socket::recv_some(self.open_socket()?, buf, wait)
    }

    fn send_some(&mut self, buf: &[u8], wait: bool) -> Result<usize> {
        socket::send_some(self.open_socket()?, buf, wait)
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        socket::recv(self.open_socket()?, buf)
    }

    fn send_all(&mut self, buf: &[u8]) -> Result<()> {
        socket::send(self.open_socket()?, buf)
    }
}

impl Drop for PlainConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::trace!(error = %e, "close on drop failed");
        }
    }
}
