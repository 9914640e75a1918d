//! xtransport - client transport layer for database drivers
//!
//! This crate provides the byte transport that protocol codecs sit on:
//! deadline-bounded TCP and Unix-domain connects, OpenSSL sessions with
//! version/cipher policy and certificate checking, and read/write operation
//! objects that can be driven step by step or to completion.
//!
//! ```no_run
//! use std::time::Duration;
//! use xtransport::connection::{Connection, Endpoint, IoOp, PlainConnection, ReadOp, WriteOp};
//! use xtransport::tls::{SslMode, TlsConnection, TlsOptions};
//!
//! let plain = PlainConnection::new(Endpoint::tcp("db.example.com", 33060))
//!     .with_connect_timeout(Duration::from_secs(10));
//! let options = TlsOptions::builder()
//!     .ssl_mode(SslMode::VerifyIdentity)
//!     .host_name("db.example.com")
//!     .build()?;
//!
//! let mut conn = TlsConnection::new(Box::new(plain), options);
//! conn.connect()?;
//!
//! WriteOp::new(&mut conn, [&b"ping"[..]])?.wait()?;
//! let mut reply = [0u8; 4];
//! ReadOp::new(&mut conn, [&mut reply[..]])?.wait()?;
//! # Ok::<(), xtransport::Error>(())
//! ```

pub mod connection;
pub mod error;
pub mod init;
pub mod net;
pub mod tls;

pub use connection::{Connection, Endpoint, IoOp, PlainConnection, Stream};
pub use error::{Category, Error, ErrorKind, Result};
pub use tls::{SslMode, TlsConnection, TlsOptions, TlsVersion};
