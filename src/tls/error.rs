//! Classification of OpenSSL I/O results

use crate::error::{ssl_code, Category, Error, ErrorKind, Result};
use openssl::ssl;

/// Turn a failed `SSL_read`/`SSL_write`/handshake step into either a retry
/// signal (`Ok(())`) or an error.
///
/// "Want read/write/..." results are not failures; the caller retries the
/// same step later.
pub(crate) fn check(err: ssl::Error) -> Result<()> {
    let code = err.code().as_raw();

    match Category::OpenSsl.classify(code) {
        Some(ErrorKind::WouldBlock) => Ok(()),
        Some(ErrorKind::EndOfStream) => Err(Error::EndOfStream),
        _ if code == ssl_code::SYSCALL => match err.into_io_error() {
            Ok(io) => Err(io.into()),
            // Unexpected EOF from the peer without close_notify
            Err(_) => Err(Error::EndOfStream),
        },
        _ if code == ssl_code::SSL => Err(Error::Tls(describe(&err))),
        _ => Err(Error::from_code(Category::OpenSsl, code)),
    }
}

/// Text of the OpenSSL error queue attached to `err`, or its own description
pub(crate) fn describe(err: &ssl::Error) -> String {
    match err.ssl_error() {
        Some(stack) if !stack.errors().is_empty() => stack.to_string(),
        _ => err.to_string(),
    }
}
