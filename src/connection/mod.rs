//! Connections and their I/O operations
//!
//! This module defines the interface that protocol codecs consume: lifecycle
//! operations ([`Connection`]) and the byte primitives ([`Stream`]) that the
//! async operation objects in [`op`] drive. Plain sockets and TLS sessions
//! both implement it, so codecs switch between them transparently.
//!
//! # Architecture
//!
//! - [`plain`]: TCP or Unix-domain socket connection
//! - [`op`]: read/write operation objects with `cont`/`wait`/`cancel`
//! - [`crate::tls::TlsConnection`]: TLS session over an owned plain connection

pub mod op;
pub mod plain;

pub use op::{IoOp, OpState, ReadOp, ReadSomeOp, WriteOp, WriteSomeOp};
pub use plain::{Endpoint, PlainConnection};

use crate::error::{Error, Result};

/// Connection lifecycle and readiness queries
pub trait Connection {
    /// Open the connection; a no-op when already open
    fn connect(&mut self) -> Result<()>;

    /// Close the connection; a no-op when already closed
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Fail fast with [`Error::NotConnected`] on a closed connection
    fn flush(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Bytes readable without blocking; 0 when unknown
    fn available(&self) -> usize;

    /// Whether a write would make progress without blocking
    fn has_space(&self) -> bool;
}

/// Byte transfer primitives
pub trait Stream: Connection {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// One receive attempt; 0 means "not ready, try again"
    fn recv_some(&mut self, buf: &mut [u8], wait: bool) -> Result<usize>;

    /// One send attempt; 0 means "not ready, try again"
    fn send_some(&mut self, buf: &[u8], wait: bool) -> Result<usize>;

    /// Fill `buf` completely, blocking as needed
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut received = 0;
        while received < buf.len() {
            received += self.recv_some(&mut buf[received..], true)?;
        }
        Ok(())
    }

    /// Send all of `buf`, blocking as needed
    fn send_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < buf.len() {
            sent += self.send_some(&buf[sent..], true)?;
        }
        Ok(())
    }
}
