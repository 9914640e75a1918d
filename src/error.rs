//! Portable error taxonomy
//!
//! Every platform failure surface (POSIX errno, Winsock codes, `getaddrinfo`
//! `EAI_*` codes and OpenSSL `SSL_get_error` results) is folded into the small
//! closed set of conditions in [`ErrorKind`]. The raw platform code and the
//! platform's own description travel with the error so they can be shown to
//! users.
//!
//! Codes that none of the tables know about are not coerced to
//! [`ErrorKind::Unknown`]: they produce [`Error::Unmapped`] so that
//! unanticipated platform behaviour is visible.

use std::ffi::CStr;
use std::fmt;
use std::io;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Portable error conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    AddressInUse,
    AddressUnreachable,
    ConnectionRefused,
    ConnectionReset,
    ConnectionAborted,
    TimedOut,
    WouldBlock,
    NotConnected,
    EndOfStream,
    Tls,
    TlsVersionUnsupported,
    TlsCipherUnsupported,
    ResolverTransient,
    Unknown,
}

impl ErrorKind {
    /// Get the condition name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::AddressInUse => "address in use",
            ErrorKind::AddressUnreachable => "address unreachable",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::ConnectionReset => "connection reset",
            ErrorKind::ConnectionAborted => "connection aborted",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::WouldBlock => "operation would block",
            ErrorKind::NotConnected => "not connected",
            ErrorKind::EndOfStream => "end of stream",
            ErrorKind::Tls => "TLS error",
            ErrorKind::TlsVersionUnsupported => "TLS version unsupported",
            ErrorKind::TlsCipherUnsupported => "TLS cipher unsupported",
            ErrorKind::ResolverTransient => "temporary name resolution failure",
            ErrorKind::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a raw platform error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// `errno` values (also `SO_ERROR`)
    Posix,
    /// `WSAGetLastError()` values
    Winsock,
    /// `getaddrinfo()` return codes
    Resolve,
    /// `SSL_get_error()` results
    OpenSsl,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Posix => "posix",
            Category::Winsock => "winsock",
            Category::Resolve => "resolve",
            Category::OpenSsl => "openssl",
        }
    }

    /// Platform description of `code`
    pub fn message(&self, code: i32) -> String {
        match self {
            Category::Posix => strip_os_suffix(io::Error::from_raw_os_error(code)),
            Category::Resolve => {
                // SAFETY: gai_strerror returns a pointer to a static string.
                let msg = unsafe { CStr::from_ptr(libc::gai_strerror(code)) };
                msg.to_string_lossy().into_owned()
            }
            Category::Winsock => format!("Winsock error {}", code),
            Category::OpenSsl => format!("SSL_get_error() returned {}", code),
        }
    }

    /// Map a raw code of this category to a portable condition.
    ///
    /// Returns `None` for codes the table does not know.
    pub fn classify(&self, code: i32) -> Option<ErrorKind> {
        match self {
            Category::Posix => classify_posix(code),
            Category::Winsock => classify_winsock(code),
            Category::Resolve => classify_resolve(code),
            Category::OpenSsl => classify_openssl(code),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn strip_os_suffix(err: io::Error) -> String {
    let text = err.to_string();
    match text.find(" (os error") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}

fn classify_posix(code: i32) -> Option<ErrorKind> {
    let kind = match code {
        libc::EACCES | libc::EPERM => ErrorKind::PermissionDenied,
        libc::EADDRINUSE => ErrorKind::AddressInUse,
        libc::EADDRNOTAVAIL
        | libc::EHOSTUNREACH
        | libc::ENETUNREACH
        | libc::ENETDOWN
        | libc::ENOENT => ErrorKind::AddressUnreachable,
        libc::ECONNREFUSED => ErrorKind::ConnectionRefused,
        libc::ECONNRESET | libc::EPIPE | libc::ENETRESET => ErrorKind::ConnectionReset,
        libc::ECONNABORTED => ErrorKind::ConnectionAborted,
        libc::ETIMEDOUT => ErrorKind::TimedOut,
        libc::EAGAIN | libc::EINPROGRESS | libc::EALREADY => ErrorKind::WouldBlock,
        libc::ENOTCONN | libc::EBADF | libc::ENOTSOCK => ErrorKind::NotConnected,
        libc::EINTR
        | libc::EINVAL
        | libc::EFAULT
        | libc::EMFILE
        | libc::ENFILE
        | libc::ENOBUFS
        | libc::ENOMEM
        | libc::EAFNOSUPPORT
        | libc::EPROTONOSUPPORT
        | libc::EPROTOTYPE
        | libc::EISCONN
        | libc::EMSGSIZE
        | libc::ENOPROTOOPT
        | libc::EOPNOTSUPP
        | libc::EDESTADDRREQ
        | libc::ENAMETOOLONG
        | libc::ENOTDIR
        | libc::ELOOP => ErrorKind::Unknown,
        c if c == libc::EWOULDBLOCK => ErrorKind::WouldBlock,
        _ => return None,
    };
    Some(kind)
}

// Documented WSA* values; kept numeric so the table is usable everywhere.
mod wsa {
    pub const EINTR: i32 = 10004;
    pub const EBADF: i32 = 10009;
    pub const EACCES: i32 = 10013;
    pub const EFAULT: i32 = 10014;
    pub const EINVAL: i32 = 10022;
    pub const EMFILE: i32 = 10024;
    pub const EWOULDBLOCK: i32 = 10035;
    pub const EINPROGRESS: i32 = 10036;
    pub const EALREADY: i32 = 10037;
    pub const ENOTSOCK: i32 = 10038;
    pub const EDESTADDRREQ: i32 = 10039;
    pub const EMSGSIZE: i32 = 10040;
    pub const EPROTOTYPE: i32 = 10041;
    pub const ENOPROTOOPT: i32 = 10042;
    pub const EPROTONOSUPPORT: i32 = 10043;
    pub const EOPNOTSUPP: i32 = 10045;
    pub const EAFNOSUPPORT: i32 = 10047;
    pub const EADDRINUSE: i32 = 10048;
    pub const EADDRNOTAVAIL: i32 = 10049;
    pub const ENETDOWN: i32 = 10050;
    pub const ENETUNREACH: i32 = 10051;
    pub const ENETRESET: i32 = 10052;
    pub const ECONNABORTED: i32 = 10053;
    pub const ECONNRESET: i32 = 10054;
    pub const ENOBUFS: i32 = 10055;
    pub const EISCONN: i32 = 10056;
    pub const ENOTCONN: i32 = 10057;
    pub const ETIMEDOUT: i32 = 10060;
    pub const ECONNREFUSED: i32 = 10061;
    pub const ENAMETOOLONG: i32 = 10063;
    pub const EHOSTUNREACH: i32 = 10065;
}

fn classify_winsock(code: i32) -> Option<ErrorKind> {
    let kind = match code {
        wsa::EACCES => ErrorKind::PermissionDenied,
        wsa::EADDRINUSE => ErrorKind::AddressInUse,
        wsa::EADDRNOTAVAIL | wsa::EHOSTUNREACH | wsa::ENETUNREACH | wsa::ENETDOWN => {
            ErrorKind::AddressUnreachable
        }
        wsa::ECONNREFUSED => ErrorKind::ConnectionRefused,
        wsa::ECONNRESET | wsa::ENETRESET => ErrorKind::ConnectionReset,
        wsa::ECONNABORTED => ErrorKind::ConnectionAborted,
        wsa::ETIMEDOUT => ErrorKind::TimedOut,
        wsa::EWOULDBLOCK | wsa::EINPROGRESS | wsa::EALREADY => ErrorKind::WouldBlock,
        wsa::ENOTCONN | wsa::ENOTSOCK | wsa::EBADF => ErrorKind::NotConnected,
        wsa::EINTR
        | wsa::EFAULT
        | wsa::EINVAL
        | wsa::EMFILE
        | wsa::EDESTADDRREQ
        | wsa::EMSGSIZE
        | wsa::EPROTOTYPE
        | wsa::ENOPROTOOPT
        | wsa::EPROTONOSUPPORT
        | wsa::EOPNOTSUPP
        | wsa::EAFNOSUPPORT
        | wsa::ENOBUFS
        | wsa::EISCONN
        | wsa::ENAMETOOLONG => ErrorKind::Unknown,
        _ => return None,
    };
    Some(kind)
}

fn classify_resolve(code: i32) -> Option<ErrorKind> {
    let kind = match code {
        libc::EAI_AGAIN => ErrorKind::ResolverTransient,
        libc::EAI_FAIL | libc::EAI_NONAME => ErrorKind::AddressUnreachable,
        libc::EAI_BADFLAGS
        | libc::EAI_FAMILY
        | libc::EAI_MEMORY
        | libc::EAI_SERVICE
        | libc::EAI_SOCKTYPE
        | libc::EAI_OVERFLOW
        | libc::EAI_SYSTEM => ErrorKind::Unknown,
        _ => return None,
    };
    Some(kind)
}

/// `SSL_get_error()` result codes from `ssl.h`
pub(crate) mod ssl_code {
    pub const NONE: i32 = 0;
    pub const SSL: i32 = 1;
    pub const WANT_READ: i32 = 2;
    pub const WANT_WRITE: i32 = 3;
    pub const WANT_X509_LOOKUP: i32 = 4;
    pub const SYSCALL: i32 = 5;
    pub const ZERO_RETURN: i32 = 6;
    pub const WANT_CONNECT: i32 = 7;
    pub const WANT_ACCEPT: i32 = 8;
    pub const WANT_ASYNC: i32 = 9;
    pub const WANT_ASYNC_JOB: i32 = 10;
    pub const WANT_CLIENT_HELLO_CB: i32 = 11;
}

fn classify_openssl(code: i32) -> Option<ErrorKind> {
    use ssl_code::*;

    let kind = match code {
        WANT_READ | WANT_WRITE | WANT_CONNECT | WANT_ACCEPT | WANT_X509_LOOKUP | WANT_ASYNC
        | WANT_ASYNC_JOB | WANT_CLIENT_HELLO_CB => ErrorKind::WouldBlock,
        ZERO_RETURN => ErrorKind::EndOfStream,
        SSL => ErrorKind::Tls,
        SYSCALL | NONE => ErrorKind::Unknown,
        _ => return None,
    };
    Some(kind)
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A platform error code with a known portable condition
    #[error("{message} ({category} error {code})")]
    Platform {
        kind: ErrorKind,
        category: Category,
        code: i32,
        message: String,
    },

    /// A platform error code none of the tables recognise
    #[error("unexpected {category} error {code}: {message}")]
    Unmapped {
        category: Category,
        code: i32,
        message: String,
    },

    /// I/O error without a raw OS code
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// The peer closed its side of the stream
    #[error("end of stream")]
    EndOfStream,

    /// The connection was never opened or has been closed
    #[error("no connection")]
    NotConnected,

    /// Connect did not finish within the configured timeout
    #[error("Connection attempt to the server was aborted. Timeout of {millis} milliseconds was exceeded")]
    ConnectTimeout { millis: u64 },

    #[error("OpenSSL: {0}")]
    Tls(String),

    #[error("no usable TLS version in the configured list")]
    NoTlsVersion,

    #[error("no usable cipher suite in the configured list")]
    NoTlsCipher,

    #[error("invalid TLS version: {0}")]
    InvalidTlsVersion(String),

    #[error("invalid host name: {0}")]
    InvalidHost(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an error from a raw code of the given category
    pub fn from_code(category: Category, code: i32) -> Self {
        let message = category.message(code);
        match category.classify(code) {
            Some(kind) => Error::Platform {
                kind,
                category,
                code,
                message,
            },
            None => {
                tracing::warn!(%category, code, %message, "unmapped platform error code");
                Error::Unmapped {
                    category,
                    code,
                    message,
                }
            }
        }
    }

    /// Error for the calling thread's last OS error
    pub fn last_os_error() -> Self {
        Error::from(io::Error::last_os_error())
    }

    /// Portable condition of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Platform { kind, .. } => *kind,
            Error::Unmapped { .. } | Error::Config(_) => ErrorKind::Unknown,
            Error::Io(e) => io_kind(e.kind()),
            Error::EndOfStream => ErrorKind::EndOfStream,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::ConnectTimeout { .. } => ErrorKind::TimedOut,
            Error::Tls(_) => ErrorKind::Tls,
            Error::NoTlsVersion | Error::InvalidTlsVersion(_) => ErrorKind::TlsVersionUnsupported,
            Error::NoTlsCipher => ErrorKind::TlsCipherUnsupported,
            Error::InvalidHost(_) => ErrorKind::AddressUnreachable,
        }
    }

    /// Embedded raw platform code, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Platform { code, .. } | Error::Unmapped { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Category of the embedded raw code, if any
    pub fn category(&self) -> Option<Category> {
        match self {
            Error::Platform { category, .. } | Error::Unmapped { category, .. } => Some(*category),
            _ => None,
        }
    }

    pub fn is_connect_timeout(&self) -> bool {
        matches!(self, Error::ConnectTimeout { .. })
    }
}

fn io_kind(kind: io::ErrorKind) -> ErrorKind {
    match kind {
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::AddrInUse => ErrorKind::AddressInUse,
        io::ErrorKind::AddrNotAvailable => ErrorKind::AddressUnreachable,
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
        io::ErrorKind::TimedOut => ErrorKind::TimedOut,
        io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
        io::ErrorKind::NotConnected => ErrorKind::NotConnected,
        io::ErrorKind::UnexpectedEof => ErrorKind::EndOfStream,
        _ => ErrorKind::Unknown,
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Error::from_code(Category::Posix, code),
            None if err.kind() == io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            None => Error::Io(err),
        }
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Error::Tls(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_mapping() {
        let cases = [
            (libc::ECONNREFUSED, ErrorKind::ConnectionRefused),
            (libc::ECONNRESET, ErrorKind::ConnectionReset),
            (libc::EPIPE, ErrorKind::ConnectionReset),
            (libc::ETIMEDOUT, ErrorKind::TimedOut),
            (libc::EWOULDBLOCK, ErrorKind::WouldBlock),
            (libc::EINPROGRESS, ErrorKind::WouldBlock),
            (libc::EADDRINUSE, ErrorKind::AddressInUse),
            (libc::EACCES, ErrorKind::PermissionDenied),
            (libc::ENOTCONN, ErrorKind::NotConnected),
            (libc::EINVAL, ErrorKind::Unknown),
        ];

        for (code, kind) in cases {
            assert_eq!(Category::Posix.classify(code), Some(kind), "errno {}", code);
        }
    }

    #[test]
    fn test_unmapped_code_keeps_raw_value() {
        let err = Error::from_code(Category::Posix, 99_999);
        assert!(matches!(err, Error::Unmapped { code: 99_999, .. }));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.raw_os_error(), Some(99_999));
        assert_eq!(err.category(), Some(Category::Posix));
    }

    #[test]
    fn test_winsock_mapping() {
        assert_eq!(Category::Winsock.classify(10061), Some(ErrorKind::ConnectionRefused));
        assert_eq!(Category::Winsock.classify(10035), Some(ErrorKind::WouldBlock));
        assert_eq!(Category::Winsock.classify(10060), Some(ErrorKind::TimedOut));
        assert_eq!(Category::Winsock.classify(42), None);
    }

    #[test]
    fn test_resolve_mapping() {
        assert_eq!(
            Category::Resolve.classify(libc::EAI_AGAIN),
            Some(ErrorKind::ResolverTransient)
        );
        assert_eq!(
            Category::Resolve.classify(libc::EAI_NONAME),
            Some(ErrorKind::AddressUnreachable)
        );

        let err = Error::from_code(Category::Resolve, libc::EAI_NONAME);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_openssl_mapping() {
        assert_eq!(Category::OpenSsl.classify(ssl_code::WANT_READ), Some(ErrorKind::WouldBlock));
        assert_eq!(Category::OpenSsl.classify(ssl_code::WANT_ASYNC_JOB), Some(ErrorKind::WouldBlock));
        assert_eq!(Category::OpenSsl.classify(ssl_code::ZERO_RETURN), Some(ErrorKind::EndOfStream));
        assert_eq!(Category::OpenSsl.classify(ssl_code::SSL), Some(ErrorKind::Tls));
        assert_eq!(Category::OpenSsl.classify(77), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let err = Error::from(io::Error::from_raw_os_error(libc::ECONNREFUSED));
        assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
        assert_eq!(err.raw_os_error(), Some(libc::ECONNREFUSED));
        assert!(!err.to_string().contains("os error"));

        let err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, Error::EndOfStream));
    }

    #[test]
    fn test_connect_timeout_message() {
        let err = Error::ConnectTimeout { millis: 1500 };
        assert!(err.is_connect_timeout());
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(err.to_string().contains("1500 milliseconds"));
    }
}
