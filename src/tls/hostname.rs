//! Manual server host name verification
//!
//! Used when the linked OpenSSL has no built-in host check. Matching is
//! exact and case-sensitive, with no wildcard expansion: the DNS entries of
//! the Subject Alternative Name extension are tried first and the subject
//! Common Name only when none of them matches.

use crate::error::{Error, Result};
use openssl::nid::Nid;
use openssl::x509::X509Ref;

/// Whether any SAN DNS entry equals `host`
pub fn matches_alt_name(host: &str, cert: &X509Ref) -> bool {
    let Some(names) = cert.subject_alt_names() else {
        return false;
    };

    names
        .iter()
        .filter_map(|name| name.dnsname())
        .any(|dns| !dns.contains('\0') && dns == host)
}

/// Whether the subject Common Name equals `host`.
///
/// A certificate without a Common Name is an error.
pub fn matches_common_name(host: &str, cert: &X509Ref) -> Result<bool> {
    let entry = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .ok_or_else(|| Error::Tls("SSL certificate validation failure".to_string()))?;

    let cn = entry.data().as_slice();

    // An embedded NUL would let "good.host\0.evil" pass a C string compare.
    if cn.contains(&0) {
        return Ok(false);
    }

    Ok(cn == host.as_bytes())
}

/// Check that `cert` was issued for `host`
pub fn verify_hostname(host: &str, cert: &X509Ref) -> Result<()> {
    if matches_alt_name(host, cert) {
        tracing::trace!(host, "host name matched subject alternative name");
        return Ok(());
    }

    if matches_common_name(host, cert)? {
        tracing::trace!(host, "host name matched common name");
        return Ok(());
    }

    Err(Error::Tls(format!(
        "server certificate does not match host name '{}'",
        host
    )))
}
