//! TLS connection over an owned plain connection

use super::error::{check, describe};
use super::hostname;
use super::info::SessionInfo;
use super::options::{SslMode, TlsOptions};
use super::policy::TlsPolicy;
use crate::connection::{Connection, PlainConnection, Stream};
use crate::error::{Error, Result};
use crate::init;
use crate::net::{socket, PollMode};
use openssl::ssl::{
    HandshakeError, Ssl, SslContext, SslContextBuilder, SslMethod, SslStream, SslVerifyMode,
};
use openssl::x509::verify::X509CheckFlags;
use openssl::x509::X509VerifyResult;
use socket2::Socket;
use std::fmt;
use std::net::IpAddr;

/// First library release with `X509_VERIFY_PARAM_set1_host`
const BUILTIN_HOST_CHECK: i64 = 0x1000_2000;

fn builtin_host_check() -> bool {
    openssl::version::number() >= BUILTIN_HOST_CHECK
}

/// TLS session layered on a [`PlainConnection`] it exclusively owns.
///
/// The handshake runs in blocking mode on the first [`Connection::connect`].
/// If it fails, everything allocated for it is released and the connection
/// returns to the uninitialised state.
pub struct TlsConnection {
    // Field order matters: the session is dropped before the context, and
    // both before the socket.
    stream: Option<SslStream<Socket>>,
    ctx: Option<SslContext>,
    plain: Box<PlainConnection>,
    options: TlsOptions,
}

impl TlsConnection {
    pub fn new(plain: Box<PlainConnection>, options: TlsOptions) -> Self {
        init::ensure();
        TlsConnection {
            stream: None,
            ctx: None,
            plain,
            options,
        }
    }

    pub fn options(&self) -> &TlsOptions {
        &self.options
    }

    pub fn plain(&self) -> &PlainConnection {
        &self.plain
    }

    /// Whether the handshake has completed
    pub fn is_established(&self) -> bool {
        self.stream.is_some()
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.stream.as_ref().map(|s| SessionInfo::from_ssl(s.ssl()))
    }

    fn do_connect(&mut self) -> Result<()> {
        if self.plain.is_closed() {
            self.plain.connect()?;
        }

        if self.stream.is_some() || self.ctx.is_some() {
            return Ok(());
        }

        let span = tracing::debug_span!(
            "tls_connect",
            endpoint = %self.plain.endpoint(),
            mode = %self.options.ssl_mode()
        );
        let _enter = span.enter();

        // Nothing is stored until the handshake succeeds, so any early
        // return drops the session and then the context.
        let ctx = self.build_context()?;
        let stream = self.handshake(&ctx)?;

        tracing::debug!(
            version = stream.ssl().version_str(),
            cipher = ?stream.ssl().current_cipher().map(|c| c.name()),
            "TLS handshake complete"
        );

        self.ctx = Some(ctx);
        self.stream = Some(stream);
        Ok(())
    }

    fn build_context(&self) -> Result<SslContext> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_client())?;

        TlsPolicy::for_options(&self.options)?.setup(&mut builder)?;

        match self.options.ssl_mode() {
            SslMode::Disabled => builder.set_verify(SslVerifyMode::NONE),
            SslMode::Required => {
                builder.set_verify_callback(SslVerifyMode::PEER, |preverified, store| {
                    if !preverified {
                        tracing::trace!(
                            error = %store.error(),
                            depth = store.error_depth(),
                            "server certificate not trusted, accepted in required mode"
                        );
                    }
                    true
                });
            }
            SslMode::VerifyCa | SslMode::VerifyIdentity => {
                builder.set_verify(SslVerifyMode::PEER);
                self.load_trust(&mut builder)?;
            }
        }

        Ok(builder.build())
    }

    fn load_trust(&self, builder: &mut SslContextBuilder) -> Result<()> {
        let ca_file = self.options.ca_file();
        let ca_path = self.options.ca_path();

        let loaded = if ca_file.is_none() && ca_path.is_none() {
            builder.set_default_verify_paths()
        } else {
            builder.load_verify_locations(ca_file, ca_path)
        };

        loaded.map_err(|e| Error::Config(format!("failed to load CA certificates: {}", e)))
    }

    fn handshake(&self, ctx: &SslContext) -> Result<SslStream<Socket>> {
        let socket = self.plain.socket().ok_or(Error::NotConnected)?;
        socket::set_nonblocking(socket, false)?;
        let io = socket.try_clone()?;

        let mut ssl = Ssl::new(ctx)?;
        let host = self.options.host_name();

        if let Some(host) = host {
            if host.parse::<IpAddr>().is_err() {
                ssl.set_hostname(host)?;
            }
        }

        let verify_identity = self.options.ssl_mode() == SslMode::VerifyIdentity;
        let manual_check = verify_identity && !builtin_host_check();

        if verify_identity && !manual_check {
            let host = host.ok_or_else(|| Error::Config("no host name to verify".to_string()))?;
            let param = ssl.param_mut();
            param.set_hostflags(X509CheckFlags::NO_WILDCARDS);
            match host.parse::<IpAddr>() {
                Ok(ip) => param.set_ip(ip)?,
                Err(_) => param.set_host(host)?,
            }
        }

        let mut stream = ssl.connect(io).map_err(handshake_error)?;

        if manual_check {
            if let Err(e) = verify_peer(&stream, host) {
                if let Err(shutdown_err) = stream.shutdown() {
                    tracing::trace!(error = %shutdown_err, "shutdown after failed verification");
                }
                return Err(e);
            }
        }

        Ok(stream)
    }
}

fn verify_peer(stream: &SslStream<Socket>, host: Option<&str>) -> Result<()> {
    let host = host.ok_or_else(|| Error::Config("no host name to verify".to_string()))?;
    let ssl = stream.ssl();

    let cert = ssl
        .peer_certificate()
        .ok_or_else(|| Error::Tls("server did not present a certificate".to_string()))?;

    let result = ssl.verify_result();
    if result != X509VerifyResult::OK {
        return Err(Error::Tls(format!(
            "server certificate verification failed: {}",
            result.error_string()
        )));
    }

    hostname::verify_hostname(host, &cert)
}

fn handshake_error(err: HandshakeError<Socket>) -> Error {
    match err {
        HandshakeError::SetupFailure(stack) => stack.into(),
        HandshakeError::Failure(mid) => {
            let verify = mid.ssl().verify_result();
            let err = mid.into_error();
            let text = describe(&err);

            if verify != X509VerifyResult::OK {
                return Error::Tls(format!("{} ({})", text, verify.error_string()));
            }

            match check(err) {
                Err(e) => e,
                Ok(()) => Error::Tls(text),
            }
        }
        HandshakeError::WouldBlock(mid) => {
            Error::Tls(format!("handshake interrupted: {}", describe(mid.error())))
        }
    }
}

impl Connection for TlsConnection {
    fn connect(&mut self) -> Result<()> {
        self.do_connect()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown() {
                tracing::trace!(error = %e, "TLS shutdown failed");
            }
        }
        self.ctx = None;
        self.plain.close()
    }

    fn is_closed(&self) -> bool {
        self.plain.is_closed()
    }

    /// Decrypted bytes buffered by OpenSSL. Encrypted bytes still queued on
    /// the socket are not counted: their plaintext size is unknown.
    fn available(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.ssl().pending())
    }

    fn has_space(&self) -> bool {
        self.plain.has_space()
    }
}

impl Stream for TlsConnection {
    /// Without `wait` this returns 0 unless a record is buffered or the
    /// socket is readable.
    fn recv_some(&mut self, buf: &mut [u8], wait: bool) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        if buf.is_empty() {
            return Ok(0);
        }

        if !wait
            && stream.ssl().pending() == 0
            && !socket::poll_one(stream.get_ref(), PollMode::Read, false, 0)?
        {
            return Ok(0);
        }

        match stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(e) => check(e).map(|()| 0),
        }
    }

    fn send_some(&mut self, buf: &[u8], wait: bool) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        if buf.is_empty() {
            return Ok(0);
        }

        if !wait && !socket::poll_one(stream.get_ref(), PollMode::Write, false, 0)? {
            return Ok(0);
        }

        match stream.ssl_write(buf) {
            Ok(n) => Ok(n),
            Err(e) => check(e).map(|()| 0),
        }
    }
}

impl fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnection")
            .field("endpoint", self.plain.endpoint())
            .field("established", &self.is_established())
            .field("options", &self.options)
            .finish()
    }
}

impl Drop for TlsConnection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.shutdown() {
                tracing::trace!(error = %e, "TLS shutdown on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Endpoint, ReadOp, WriteOp};
    use std::net::TcpListener;

    fn unconnected() -> TlsConnection {
        let plain = PlainConnection::new(Endpoint::tcp("127.0.0.1", 1));
        TlsConnection::new(Box::new(plain), TlsOptions::default())
    }

    #[test]
    fn test_new_connection_is_uninitialised() {
        let conn = unconnected();
        assert!(conn.is_closed());
        assert!(!conn.is_established());
        assert!(conn.session_info().is_none());
        assert_eq!(conn.available(), 0);
    }

    #[test]
    fn test_ops_on_unconnected_tls() {
        let mut conn = unconnected();
        let mut buf = [0u8; 4];

        let err = ReadOp::new(&mut conn, [&mut buf[..]]).err().unwrap();
        assert!(matches!(err, Error::EndOfStream));

        let err = WriteOp::new(&mut conn, [&b"ping"[..]]).err().unwrap();
        assert!(matches!(err, Error::NotConnected));
    }

    #[test]
    fn test_no_cipher_fails_before_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let plain = PlainConnection::new(Endpoint::tcp("127.0.0.1", port));
        let options = TlsOptions::builder()
            .ciphersuite("TLS_NOT_A_REAL_CIPHER")
            .build()
            .unwrap();
        let mut conn = TlsConnection::new(Box::new(plain), options);

        let err = conn.connect().unwrap_err();
        assert!(matches!(err, Error::NoTlsCipher));
        assert!(!conn.is_established());
        assert!(conn.plain().socket().is_some());
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let plain = PlainConnection::new(Endpoint::tcp("127.0.0.1", port));
        let options = TlsOptions::builder()
            .ssl_mode(SslMode::VerifyCa)
            .ca_file("/nonexistent/ca.pem")
            .build()
            .unwrap();
        let mut conn = TlsConnection::new(Box::new(plain), options);

        let err = conn.connect().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!conn.is_established());
    }
}
