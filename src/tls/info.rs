//! Negotiated session details

use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509Ref, X509VerifyResult};

/// What the handshake settled on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Protocol name as OpenSSL reports it, e.g. "TLSv1.3"
    pub version: String,
    pub cipher: Option<String>,
    /// Server name sent with the client hello
    pub sni: Option<String>,
    pub peer_subject: Option<String>,
    /// DNS entries of the peer certificate's SAN extension
    pub peer_alt_names: Vec<String>,
    /// Whether OpenSSL's chain verification succeeded
    pub verified: bool,
}

impl SessionInfo {
    pub fn from_ssl(ssl: &SslRef) -> Self {
        let peer = ssl.peer_certificate();

        SessionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl.current_cipher().map(|c| c.name().to_string()),
            sni: ssl
                .servername(openssl::ssl::NameType::HOST_NAME)
                .map(str::to_string),
            peer_subject: peer.as_deref().and_then(common_name),
            peer_alt_names: peer.as_deref().map(dns_names).unwrap_or_default(),
            verified: ssl.verify_result() == X509VerifyResult::OK,
        }
    }
}

fn common_name(cert: &X509Ref) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

fn dns_names(cert: &X509Ref) -> Vec<String> {
    cert.subject_alt_names()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.dnsname())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
