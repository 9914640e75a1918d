//! Address resolution
//!
//! Resolves a host and port with `getaddrinfo` so that resolver-specific
//! failures (`EAI_*`) keep their identity; in particular a transient
//! `EAI_AGAIN` is reported as [`ErrorKind::ResolverTransient`](crate::ErrorKind)
//! and can be retried by the caller.

use crate::error::{Category, Error, Result};
use socket2::{Domain, Protocol, SockAddr};
use std::ffi::CString;
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::ptr;

/// One candidate endpoint
#[derive(Debug, Clone)]
pub struct ResolvedAddr {
    pub domain: Domain,
    pub protocol: Option<Protocol>,
    pub addr: SockAddr,
}

impl ResolvedAddr {
    /// The endpoint as a std socket address
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.as_socket()
    }
}

/// Owned `addrinfo` list, freed on drop
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
    fn iter(&self) -> impl Iterator<Item = &libc::addrinfo> {
        let mut next = self.0;
        std::iter::from_fn(move || {
            // SAFETY: every node of the list stays valid until the list is freed.
            let node = unsafe { next.as_ref()? };
            next = node.ai_next;
            Some(node)
        })
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a successful getaddrinfo call.
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

/// Resolve `host` to an ordered, non-empty list of stream endpoints.
///
/// Numeric IPv4/IPv6 literals are recognised and never touch DNS.
pub fn resolve(host: &str, port: u16) -> Result<Vec<ResolvedAddr>> {
    let c_host = CString::new(host).map_err(|_| Error::InvalidHost(host.to_string()))?;
    let c_port = CString::new(port.to_string()).map_err(|_| Error::InvalidHost(host.to_string()))?;

    // SAFETY: addrinfo is plain data; all-zero is a valid "no hints" value.
    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_flags = libc::AI_NUMERICSERV;
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;

    if host.parse::<Ipv4Addr>().is_ok() {
        hints.ai_family = libc::AF_INET;
        hints.ai_flags |= libc::AI_NUMERICHOST;
    } else if host.parse::<Ipv6Addr>().is_ok() {
        hints.ai_family = libc::AF_INET6;
        hints.ai_flags |= libc::AI_NUMERICHOST;
    }

    let mut head: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: all pointers are valid; `head` receives an owned list on success.
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), c_port.as_ptr(), &hints, &mut head) };
    let list = AddrInfoList(head);

    if rc == libc::EAI_SYSTEM {
        let err = io::Error::last_os_error();
        if err.raw_os_error().unwrap_or(0) != 0 {
            return Err(err.into());
        }
    }

    if rc != 0 {
        return Err(Error::from_code(Category::Resolve, rc));
    }

    let candidates: Vec<ResolvedAddr> = list
        .iter()
        .filter_map(|info| {
            // SAFETY: node fields come straight from getaddrinfo.
            let addr = unsafe { sockaddr_from(info)? };
            Some(ResolvedAddr {
                domain: addr.domain(),
                protocol: match info.ai_protocol {
                    0 => None,
                    p => Some(Protocol::from(p)),
                },
                addr,
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(Error::InvalidHost(host.to_string()));
    }

    tracing::trace!(host, port, count = candidates.len(), "resolved host");
    Ok(candidates)
}

unsafe fn sockaddr_from(info: &libc::addrinfo) -> Option<SockAddr> {
    let len = info.ai_addrlen as usize;
    if info.ai_addr.is_null() || len > mem::size_of::<libc::sockaddr_storage>() {
        return None;
    }

    let mut storage: libc::sockaddr_storage = mem::zeroed();
    ptr::copy_nonoverlapping(
        info.ai_addr as *const u8,
        &mut storage as *mut libc::sockaddr_storage as *mut u8,
        len,
    );
    Some(SockAddr::new(storage, info.ai_addrlen))
}
