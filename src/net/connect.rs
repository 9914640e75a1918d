//! Connection establishment
//!
//! `connect_tcp` resolves the host, then tries each candidate address in
//! order with a non-blocking connect bounded by a single overall deadline.
//! A candidate that fails for any reason other than the deadline is closed
//! and the next one is tried; the deadline aborts the whole attempt.
//!
//! Timeouts are given in microseconds; zero means no limit.

use super::resolver::{self, ResolvedAddr};
use super::socket::{self, PollMode};
use super::RESOLVE_ATTEMPTS;
use crate::error::{Error, ErrorKind, Result};
use socket2::{SockAddr, Socket};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

/// Overall connect deadline
#[derive(Debug, Clone, Copy)]
struct Deadline {
    timeout_usec: u64,
    at: Option<Instant>,
}

impl Deadline {
    /// A timeout too large to represent as an instant has no limit
    fn start(timeout_usec: u64) -> Self {
        let at = if timeout_usec > 0 {
            Instant::now().checked_add(Duration::from_micros(timeout_usec))
        } else {
            None
        };
        Deadline { timeout_usec, at }
    }

    fn expired(&self) -> bool {
        self.at.map_or(false, |at| Instant::now() >= at)
    }

    /// Remaining time for the next wait; 0 waits without limit
    fn remaining_usec(&self) -> u64 {
        match self.at {
            Some(at) => {
                let left = at.saturating_duration_since(Instant::now()).as_micros();
                (left as u64).max(1)
            }
            None => 0,
        }
    }

    fn error(&self) -> Error {
        Error::ConnectTimeout {
            millis: self.timeout_usec / 1000,
        }
    }
}

/// Connect to `host:port` over TCP.
///
/// The returned socket is non-blocking and connected. If every candidate
/// fails the error of the last attempt is returned.
pub fn connect_tcp(host: &str, port: u16, timeout_usec: u64) -> Result<Socket> {
    let deadline = Deadline::start(timeout_usec);
    let candidates = resolve_with_retry(host, port, &deadline, resolver::resolve)?;

    let mut last_error = None;

    for candidate in &candidates {
        tracing::debug!(host, port, addr = ?candidate.socket_addr(), "connecting");

        match connect_candidate(candidate, &deadline) {
            Ok(socket) => return Ok(socket),
            Err(e) if e.is_connect_timeout() => return Err(e),
            Err(e) => {
                tracing::debug!(host, port, addr = ?candidate.socket_addr(), error = %e, "candidate failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::InvalidHost(host.to_string())))
}

/// Connect to a Unix-domain socket at `path`
pub fn connect_unix(path: &Path, timeout_usec: u64) -> Result<Socket> {
    let deadline = Deadline::start(timeout_usec);
    let addr = SockAddr::unix(path)?;
    let socket = socket::create_unix(true)?;

    tracing::debug!(path = %path.display(), "connecting");
    finish(socket, &addr, &deadline)
}

fn resolve_with_retry<F>(
    host: &str,
    port: u16,
    deadline: &Deadline,
    mut resolve: F,
) -> Result<Vec<ResolvedAddr>>
where
    F: FnMut(&str, u16) -> Result<Vec<ResolvedAddr>>,
{
    let mut attempts_left = RESOLVE_ATTEMPTS;

    loop {
        attempts_left -= 1;

        match resolve(host, port) {
            Ok(candidates) => {
                if deadline.expired() {
                    return Err(deadline.error());
                }
                return Ok(candidates);
            }
            Err(e) if e.kind() == ErrorKind::ResolverTransient && attempts_left > 0 => {
                tracing::debug!(host, error = %e, "transient resolver failure, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

fn connect_candidate(candidate: &ResolvedAddr, deadline: &Deadline) -> Result<Socket> {
    let socket = socket::create(true, candidate.domain, candidate.protocol)?;
    finish(socket, &candidate.addr, deadline)
}

/// Drive a non-blocking connect to completion; the socket is closed on failure
fn finish(socket: Socket, addr: &SockAddr, deadline: &Deadline) -> Result<Socket> {
    match wait_connected(&socket, addr, deadline) {
        Ok(()) => Ok(socket),
        Err(e) => {
            if let Err(close_err) = socket::close(Some(socket)) {
                tracing::trace!(error = %close_err, "close after failed connect");
            }
            Err(e)
        }
    }
}

fn wait_connected(socket: &Socket, addr: &SockAddr, deadline: &Deadline) -> Result<()> {
    match socket.connect(addr) {
        Ok(()) => return Ok(()),
        Err(e) if in_progress(&e) => {}
        Err(e) => return Err(e.into()),
    }

    loop {
        if socket::poll_one(socket, PollMode::Connect, true, deadline.remaining_usec())? {
            break;
        }
        if deadline.expired() {
            return Err(deadline.error());
        }
        // poll can return early without readiness; wait again for the rest
        tracing::trace!("connect poll returned before the deadline");
    }

    socket::check_error(socket)
}

/// Only `EINPROGRESS` means a connect is pending. A Unix-domain connect to a
/// full backlog fails with `EAGAIN` and leaves the socket unconnected.
fn in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS)
}
