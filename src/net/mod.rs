//! Network primitives
//!
//! # Architecture
//!
//! - [`socket`]: creation, readiness polling and byte transfer on a single socket
//! - [`resolver`]: `getaddrinfo` based host resolution
//! - [`connect`]: deadline-bounded connect over resolved candidates
//! - [`srv`]: DNS SRV lookup and RFC 2782 ordering

pub mod connect;
pub mod resolver;
pub mod socket;
pub mod srv;

pub use connect::{connect_tcp, connect_unix};
pub use resolver::{resolve, ResolvedAddr};
pub use socket::{local_hostname, PollMode, ShutdownMode};
pub use srv::{prioritize, prioritized_hosts, srv_list, SrvRecord};

/// Resolution attempts when the resolver reports a transient failure
pub const RESOLVE_ATTEMPTS: u32 = 2;
