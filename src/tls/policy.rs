//! Protocol version and cipher suite policy
//!
//! Versions and cipher suites are chosen from two static, ordered tables.
//! [`TlsPolicy`] turns the caller's selection into the settings applied to
//! an OpenSSL context: version bounds, the "disable" option mask, the classic
//! cipher list (ordered by tier) and the separate TLS 1.3 suite list.

use super::options::{TlsOptions, TlsVersion};
use crate::error::{Error, Result};
use openssl::ssl::{SslContextBuilder, SslOptions, SslVersion};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// One known protocol version
pub struct VersionEntry {
    pub name: &'static str,
    pub version: TlsVersion,
    /// `None` when the version is recognised but cannot be used
    pub proto: Option<SslVersion>,
}

impl VersionEntry {
    /// Native constant, if the linked library can negotiate this version
    pub fn native(&self) -> Option<SslVersion> {
        if self.version >= TlsVersion::TLS1_3 && openssl::version::number() < 0x1010_1000 {
            return None;
        }
        self.proto
    }

    fn disable_option(&self) -> SslOptions {
        match self.version.minor {
            0 => SslOptions::NO_TLSV1,
            1 => SslOptions::NO_TLSV1_1,
            2 => SslOptions::NO_TLSV1_2,
            _ => SslOptions::NO_TLSV1_3,
        }
    }
}

pub const TLS_VERSIONS: &[VersionEntry] = &[
    VersionEntry {
        name: "TLSv1",
        version: TlsVersion::TLS1_0,
        proto: Some(SslVersion::TLS1),
    },
    VersionEntry {
        name: "TLSv1.1",
        version: TlsVersion::TLS1_1,
        proto: Some(SslVersion::TLS1_1),
    },
    VersionEntry {
        name: "TLSv1.2",
        version: TlsVersion::TLS1_2,
        proto: Some(SslVersion::TLS1_2),
    },
    VersionEntry {
        name: "TLSv1.3",
        version: TlsVersion::TLS1_3,
        proto: Some(SslVersion::TLS1_3),
    },
];

/// Cipher priority; lower tiers are listed first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CipherTier {
    Mandatory = 0,
    Approved = 1,
    Secondary = 2,
    /// Kept for legacy servers only
    Compat = 3,
}

/// IANA to OpenSSL cipher name mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub iana: &'static str,
    /// Empty for TLS 1.3 suites, which OpenSSL names by their IANA name
    pub native: &'static str,
    pub tier: CipherTier,
}

impl CipherSuite {
    pub fn is_tls13(&self) -> bool {
        self.native.is_empty()
    }
}

const fn suite(iana: &'static str, native: &'static str, tier: CipherTier) -> CipherSuite {
    CipherSuite { iana, native, tier }
}

use CipherTier::{Approved, Compat, Mandatory, Secondary};

/// Known cipher suites; also the default allow-list, in default order
pub const CIPHER_SUITES: &[CipherSuite] = &[
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", "ECDHE-ECDSA-AES128-GCM-SHA256", Mandatory),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", "ECDHE-ECDSA-AES256-GCM-SHA384", Mandatory),
    suite("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", "ECDHE-RSA-AES128-GCM-SHA256", Mandatory),
    suite("TLS_AES_128_GCM_SHA256", "", Approved),
    suite("TLS_AES_256_GCM_SHA384", "", Approved),
    suite("TLS_CHACHA20_POLY1305_SHA256", "", Approved),
    suite("TLS_AES_128_CCM_SHA256", "", Approved),
    suite("TLS_AES_128_CCM_8_SHA256", "", Approved),
    suite("TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", "ECDHE-RSA-AES256-GCM-SHA384", Approved),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384", "ECDHE-ECDSA-AES256-SHA384", Approved),
    suite("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384", "ECDHE-RSA-AES256-SHA384", Approved),
    suite("TLS_DHE_RSA_WITH_AES_128_GCM_SHA256", "DHE-RSA-AES128-GCM-SHA256", Approved),
    suite("TLS_DHE_DSS_WITH_AES_128_GCM_SHA256", "DHE-DSS-AES128-GCM-SHA256", Approved),
    suite("TLS_DHE_RSA_WITH_AES_128_CBC_SHA256", "DHE-RSA-AES128-SHA256", Approved),
    suite("TLS_DHE_DSS_WITH_AES_128_CBC_SHA256", "DHE-DSS-AES128-SHA256", Approved),
    suite("TLS_DHE_DSS_WITH_AES_256_GCM_SHA384", "DHE-DSS-AES256-GCM-SHA384", Approved),
    suite("TLS_DHE_RSA_WITH_AES_256_GCM_SHA384", "DHE-RSA-AES256-GCM-SHA384", Approved),
    suite("TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-ECDSA-CHACHA20-POLY1305", Approved),
    suite("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", "ECDHE-RSA-CHACHA20-POLY1305", Approved),
    suite("TLS_DH_DSS_WITH_AES_128_GCM_SHA256", "DH-DSS-AES128-GCM-SHA256", Secondary),
    suite("TLS_ECDH_ECDSA_WITH_AES_128_GCM_SHA256", "ECDH-ECDSA-AES128-GCM-SHA256", Secondary),
    suite("TLS_DH_DSS_WITH_AES_256_GCM_SHA384", "DH-DSS-AES256-GCM-SHA384", Secondary),
    suite("TLS_ECDH_ECDSA_WITH_AES_256_GCM_SHA384", "ECDH-ECDSA-AES256-GCM-SHA384", Secondary),
    suite("TLS_DH_RSA_WITH_AES_128_GCM_SHA256", "DH-RSA-AES128-GCM-SHA256", Secondary),
    suite("TLS_ECDH_RSA_WITH_AES_128_GCM_SHA256", "ECDH-RSA-AES128-GCM-SHA256", Secondary),
    suite("TLS_DH_RSA_WITH_AES_256_GCM_SHA384", "DH-RSA-AES256-GCM-SHA384", Secondary),
    suite("TLS_ECDH_RSA_WITH_AES_256_GCM_SHA384", "ECDH-RSA-AES256-GCM-SHA384", Secondary),
    suite("TLS_DHE_RSA_WITH_AES_256_CBC_SHA", "DHE-RSA-AES256-SHA", Compat),
    suite("TLS_DHE_RSA_WITH_AES_128_CBC_SHA", "DHE-RSA-AES128-SHA", Compat),
    suite("TLS_RSA_WITH_AES_256_CBC_SHA", "AES256-SHA", Compat),
];

/// Look up a cipher suite by IANA name
pub fn find_cipher(iana: &str) -> Option<&'static CipherSuite> {
    CIPHER_SUITES.iter().find(|c| c.iana == iana)
}

fn native_version(version: TlsVersion) -> Option<SslVersion> {
    TLS_VERSIONS
        .iter()
        .find(|entry| entry.version == version)
        .and_then(VersionEntry::native)
}

const ALWAYS_DISABLED: SslOptions = SslOptions::NO_SSLV2.union(SslOptions::NO_SSLV3);

static DEFAULT_POLICY: OnceLock<TlsPolicy> = OnceLock::new();

/// Negotiation settings for one TLS context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    min: Option<TlsVersion>,
    /// `None` means no upper limit
    max: Option<TlsVersion>,
    disabled: SslOptions,
    cipher_list: String,
    cipher_list_13: String,
}

impl Default for TlsPolicy {
    /// Library defaults: TLSv1 and up with the full cipher allow-list
    fn default() -> Self {
        DEFAULT_POLICY
            .get_or_init(|| {
                let mut policy = TlsPolicy {
                    min: Some(TlsVersion::TLS1_0),
                    max: None,
                    disabled: ALWAYS_DISABLED,
                    cipher_list: String::new(),
                    cipher_list_13: String::new(),
                };
                let all: Vec<&str> = CIPHER_SUITES.iter().map(|c| c.iana).collect();
                policy.set_ciphers(&all, CIPHER_SUITES);
                policy
            })
            .clone()
    }
}

impl TlsPolicy {
    /// Policy for the given options, validated
    pub fn for_options(options: &TlsOptions) -> Result<Self> {
        let mut policy = TlsPolicy::default();

        if !options.versions().is_empty() {
            policy.set_versions(options.versions(), TLS_VERSIONS)?;
        }

        if !options.ciphersuites().is_empty() {
            policy.set_ciphers(options.ciphersuites(), CIPHER_SUITES);
        }

        policy.check()?;
        Ok(policy)
    }

    pub fn min_version(&self) -> Option<TlsVersion> {
        self.min
    }

    pub fn max_version(&self) -> Option<TlsVersion> {
        self.max
    }

    /// `SSL_OP_NO_*` options that will be set
    pub fn disabled_options(&self) -> SslOptions {
        self.disabled
    }

    /// Colon-separated OpenSSL names of the allowed pre-1.3 ciphers
    pub fn cipher_list(&self) -> &str {
        &self.cipher_list
    }

    /// Colon-separated TLS 1.3 suite names
    pub fn cipher_list_13(&self) -> &str {
        &self.cipher_list_13
    }

    pub fn allows_tls13(&self) -> bool {
        self.max.map_or(true, |max| max >= TlsVersion::TLS1_3)
    }

    /// Restrict versions to the range spanned by `requested`.
    ///
    /// Entries the library cannot use are skipped; if nothing remains this
    /// is [`Error::NoTlsVersion`].
    pub fn set_versions(
        &mut self,
        requested: &BTreeSet<TlsVersion>,
        table: &[VersionEntry],
    ) -> Result<()> {
        for version in requested {
            if !table.iter().any(|entry| entry.version == *version) {
                tracing::warn!(%version, "unknown TLS version ignored");
            }
        }

        let mut selected = table
            .iter()
            .filter(|entry| requested.contains(&entry.version))
            .filter(|entry| {
                let usable = entry.native().is_some();
                if !usable {
                    tracing::debug!(version = entry.name, "TLS version not supported by the library, skipped");
                }
                usable
            });

        let first = selected.next().ok_or(Error::NoTlsVersion)?;
        let last = selected.last().unwrap_or(first);

        self.min = Some(first.version);
        self.max = Some(last.version);
        self.disabled = table
            .iter()
            .filter(|entry| entry.version < first.version || entry.version > last.version)
            .fold(ALWAYS_DISABLED, |mask, entry| mask | entry.disable_option());

        Ok(())
    }

    /// Allow the `requested` cipher suites (IANA names).
    ///
    /// Names missing from `table` are dropped. Pre-1.3 ciphers are ordered by
    /// tier, then by table position.
    pub fn set_ciphers<S: AsRef<str>>(&mut self, requested: &[S], table: &[CipherSuite]) {
        for name in requested {
            let name = name.as_ref();
            if !table.iter().any(|c| c.iana == name) {
                tracing::debug!(cipher = name, "unknown cipher suite ignored");
            }
        }

        let mut tiers: [Vec<&str>; 4] = Default::default();
        let mut tls13 = Vec::new();

        for cipher in table {
            if !requested.iter().any(|name| name.as_ref() == cipher.iana) {
                continue;
            }
            if cipher.is_tls13() {
                tls13.push(cipher.iana);
            } else {
                tiers[cipher.tier as usize].push(cipher.native);
            }
        }

        self.cipher_list = tiers.concat().join(":");
        self.cipher_list_13 = tls13.join(":");
    }

    /// Fail with [`Error::NoTlsCipher`] if no cipher can be negotiated
    pub fn check(&self) -> Result<()> {
        let tls13_usable = self.allows_tls13() && !self.cipher_list_13.is_empty();
        if self.cipher_list.is_empty() && !tls13_usable {
            return Err(Error::NoTlsCipher);
        }
        Ok(())
    }

    /// Apply the policy to a context
    pub fn setup(&self, ctx: &mut SslContextBuilder) -> Result<()> {
        self.check()?;

        ctx.clear_options(
            SslOptions::NO_TLSV1
                | SslOptions::NO_TLSV1_1
                | SslOptions::NO_TLSV1_2
                | SslOptions::NO_TLSV1_3,
        );

        // Only TLS 1.3 suites selected: older versions would have nothing to offer.
        let min = if self.cipher_list.is_empty() {
            Some(TlsVersion::TLS1_3)
        } else {
            self.min
        };

        ctx.set_min_proto_version(min.and_then(native_version))?;
        ctx.set_max_proto_version(self.max.and_then(native_version))?;
        ctx.set_options(self.disabled);

        if !self.cipher_list.is_empty() {
            ctx.set_cipher_list(&self.cipher_list)
                .map_err(|_| Error::NoTlsCipher)?;
        }

        // Setting 1.3 suites while 1.3 is excluded can raise the minimum
        // version on some library releases.
        if self.allows_tls13() {
            ctx.set_ciphersuites(&self.cipher_list_13)?;
        }

        tracing::trace!(
            min = ?self.min,
            max = ?self.max,
            ciphers = %self.cipher_list,
            ciphers_13 = %self.cipher_list_13,
            "TLS policy applied"
        );
        Ok(())
    }
}
