//! Shared helpers for integration tests

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod, SslStream, SslVersion};
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use tempfile::NamedTempFile;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Accept one connection on a fresh loopback listener and hand it to `handler`
pub fn serve_once<F>(handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handler(stream);
    });

    (addr, handle)
}

/// Echo everything back until the peer closes
pub fn echo<S: Read + Write>(mut stream: S) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if stream.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        }
    }
}

/// Self-signed certificate usable as its own CA
pub struct TestCert {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestCert {
    pub fn new(common_name: Option<&str>, dns_names: &[&str]) -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        if let Some(cn) = common_name {
            name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
        }
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "xtransport tests")
            .unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(rand::random::<u32>() | 1)
            .unwrap()
            .to_asn1_integer()
            .unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();

        let ca = BasicConstraints::new().critical().ca().build().unwrap();
        builder.append_extension(ca).unwrap();

        if !dns_names.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for dns in dns_names {
                san.dns(dns);
            }
            let san = san.build(&builder.x509v3_context(None, None)).unwrap();
            builder.append_extension(san).unwrap();
        }

        builder.sign(&key, MessageDigest::sha256()).unwrap();

        TestCert {
            cert: builder.build(),
            key,
        }
    }

    /// Write the certificate as PEM to a temporary file
    pub fn pem_file(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.cert.to_pem().unwrap()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn acceptor(&self, max_version: Option<SslVersion>) -> SslAcceptor {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        builder.set_certificate(&self.cert).unwrap();
        builder.set_private_key(&self.key).unwrap();
        builder.check_private_key().unwrap();
        if max_version.is_some() {
            builder.set_max_proto_version(max_version).unwrap();
        }
        builder.build()
    }
}

/// Run a TLS server for one connection.
///
/// The handler receives `None` when the handshake fails (for example when
/// the client rejects the certificate).
pub fn tls_serve_once<F>(acceptor: SslAcceptor, handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(Option<SslStream<TcpStream>>) + Send + 'static,
{
    serve_once(move |tcp| {
        let stream = acceptor.accept(tcp).ok();
        handler(stream);
    })
}
