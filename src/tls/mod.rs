//! TLS transport
//!
//! [`TlsConnection`] wraps a [`PlainConnection`](crate::connection::PlainConnection)
//! and negotiates an OpenSSL session over its socket. Version bounds and
//! cipher lists come from [`policy`]; certificate checking follows the
//! configured [`SslMode`].
//!
//! # Architecture
//!
//! - [`options`]: caller-facing configuration and its builder
//! - [`policy`]: version and cipher tables, context setup
//! - [`hostname`]: SAN/CN matching for libraries without a built-in check
//! - [`info`]: negotiated session details

mod connection;
mod error;
pub mod hostname;
pub mod info;
pub mod options;
pub mod policy;

pub use connection::TlsConnection;
pub use info::SessionInfo;
pub use options::{SslMode, TlsOptions, TlsOptionsBuilder, TlsVersion};
pub use policy::{CipherSuite, CipherTier, TlsPolicy, CIPHER_SUITES, TLS_VERSIONS};
