//! Socket primitives
//!
//! Thin wrappers over `socket2::Socket` and the few libc calls socket2 does
//! not cover (`poll`, `FIONREAD`, checked `close`). All functions report
//! failures through the portable [`Error`](crate::Error) taxonomy.

use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, IntoRawFd};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Direction(s) to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Read,
    Write,
    Both,
}

impl From<ShutdownMode> for Shutdown {
    fn from(mode: ShutdownMode) -> Self {
        match mode {
            ShutdownMode::Read => Shutdown::Read,
            ShutdownMode::Write => Shutdown::Write,
            ShutdownMode::Both => Shutdown::Both,
        }
    }
}

/// Readiness to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Completion of a non-blocking connect
    Connect,
    Read,
    Write,
}

/// Create a stream socket with `SO_REUSEADDR` and the requested blocking mode.
///
/// If any option fails the socket is closed before the error is returned.
pub fn create(nonblocking: bool, domain: Domain, protocol: Option<Protocol>) -> Result<Socket> {
    let socket = Socket::new(domain, Type::STREAM, protocol)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(nonblocking)?;
    Ok(socket)
}

/// Create a Unix-domain stream socket
pub fn create_unix(nonblocking: bool) -> Result<Socket> {
    create(nonblocking, Domain::UNIX, None)
}

/// Release a socket. `None` is the "not connected" handle and is a no-op.
pub fn close(socket: Option<Socket>) -> Result<()> {
    let Some(socket) = socket else {
        return Ok(());
    };

    let fd = socket.into_raw_fd();
    // SAFETY: `fd` came from `into_raw_fd`, so nothing else owns it.
    if unsafe { libc::close(fd) } != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

pub fn shutdown(socket: &Socket, mode: ShutdownMode) -> Result<()> {
    socket.shutdown(mode.into()).map_err(Error::from)
}

pub fn set_nonblocking(socket: &Socket, nonblocking: bool) -> Result<()> {
    socket.set_nonblocking(nonblocking).map_err(Error::from)
}

/// Raise the socket's pending error (`SO_ERROR`), if any
pub fn check_error(socket: &Socket) -> Result<()> {
    match socket.take_error()? {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Wait for readiness on a single socket.
///
/// Returns `Ok(true)` when ready and `Ok(false)` on timeout (or an
/// interrupted wait). With `wait == false` the call never blocks; with
/// `wait == true` a zero `timeout_usec` waits without limit. When the kernel
/// reports an error or hang-up condition the socket's pending error is
/// raised instead.
pub fn poll_one(socket: &Socket, mode: PollMode, wait: bool, timeout_usec: u64) -> Result<bool> {
    let events = match mode {
        PollMode::Connect => libc::POLLIN | libc::POLLOUT,
        PollMode::Read => libc::POLLIN,
        PollMode::Write => libc::POLLOUT,
    };

    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events,
        revents: 0,
    };

    // SAFETY: `pfd` is a valid pollfd for the duration of the call.
    let result = unsafe { libc::poll(&mut pfd, 1, poll_timeout_ms(wait, timeout_usec)) };

    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err.into());
    }

    if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        check_error(socket)?;
    }

    Ok(result > 0)
}

/// `poll` timeout for a wait of `timeout_usec`: 0 without `wait`, -1 for no
/// limit, otherwise rounded up to whole milliseconds and clamped to `c_int`.
fn poll_timeout_ms(wait: bool, timeout_usec: u64) -> libc::c_int {
    if !wait {
        return 0;
    }
    if timeout_usec == 0 {
        return -1;
    }

    let millis = timeout_usec.saturating_add(999) / 1000;
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

/// Number of bytes readable without blocking
pub fn bytes_available(socket: &Socket) -> Result<usize> {
    let mut available: libc::c_int = 0;

    // SAFETY: FIONREAD writes a single c_int through the pointer.
    if unsafe { libc::ioctl(socket.as_raw_fd(), libc::FIONREAD, &mut available) } == -1 {
        return Err(Error::last_os_error());
    }

    Ok(available.max(0) as usize)
}

/// One receive attempt.
///
/// Returns 0 when nothing is available (only possible without `wait`, or
/// after an interrupted wait). A clean close by the peer is
/// [`Error::EndOfStream`].
pub fn recv_some(socket: &Socket, buf: &mut [u8], wait: bool) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    if !poll_one(socket, PollMode::Read, wait, 0)? {
        return Ok(0);
    }

    let mut reader = socket;
    match reader.read(buf) {
        Ok(0) => Err(Error::EndOfStream),
        Ok(n) => Ok(n),
        Err(e) if is_retry(&e) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// One send attempt. Returns 0 when the socket cannot accept data now.
pub fn send_some(socket: &Socket, buf: &[u8], wait: bool) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    if !poll_one(socket, PollMode::Write, wait, 0)? {
        return Ok(0);
    }

    match socket.send_with_flags(buf, SEND_FLAGS) {
        Ok(n) => Ok(n),
        Err(e) if is_retry(&e) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Receive exactly `buf.len()` bytes, blocking as needed
pub fn recv(socket: &Socket, buf: &mut [u8]) -> Result<()> {
    let mut received = 0;
    while received < buf.len() {
        received += recv_some(socket, &mut buf[received..], true)?;
    }
    Ok(())
}

/// Send all of `buf`, blocking as needed
pub fn send(socket: &Socket, buf: &[u8]) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        sent += send_some(socket, &buf[sent..], true)?;
    }
    Ok(())
}

/// Host name of the local machine
pub fn local_hostname() -> Result<String> {
    let mut buf = [0u8; 1024];

    // SAFETY: the buffer is valid for `buf.len()` bytes.
    if unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) } != 0 {
        return Err(Error::last_os_error());
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

fn is_retry(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
