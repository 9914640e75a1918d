//! TLS connection options
//!
//! Options are assembled with [`TlsOptions::builder`] and are immutable once
//! built:
//!
//! ```
//! use xtransport::tls::{SslMode, TlsOptions};
//!
//! let options = TlsOptions::builder()
//!     .ssl_mode(SslMode::VerifyCa)
//!     .version("TLSv1.2")?
//!     .version("TLSv1.3")?
//!     .ca_file("/etc/ssl/certs/ca-certificates.crt")
//!     .build()?;
//! assert_eq!(options.versions().len(), 2);
//! # Ok::<(), xtransport::Error>(())
//! ```

use super::policy::TLS_VERSIONS;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Certificate checking strictness, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SslMode {
    /// No certificate checking at all
    Disabled,
    /// Encrypted, but neither chain nor host name is enforced
    #[default]
    Required,
    /// The chain must lead to a trusted CA
    VerifyCa,
    /// As `VerifyCa`, and the certificate must name the expected host
    VerifyIdentity,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disabled => "disabled",
            SslMode::Required => "required",
            SslMode::VerifyCa => "verify_ca",
            SslMode::VerifyIdentity => "verify_identity",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(SslMode::Disabled),
            "required" => Ok(SslMode::Required),
            "verify_ca" => Ok(SslMode::VerifyCa),
            "verify_identity" => Ok(SslMode::VerifyIdentity),
            _ => Err(Error::Config(format!("unknown SSL mode '{}'", s))),
        }
    }
}

/// Protocol version as a major/minor pair (`TLSv1.2` is 1.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TlsVersion {
    pub major: u8,
    pub minor: u8,
}

impl TlsVersion {
    pub const TLS1_0: TlsVersion = TlsVersion::new(1, 0);
    pub const TLS1_1: TlsVersion = TlsVersion::new(1, 1);
    pub const TLS1_2: TlsVersion = TlsVersion::new(1, 2);
    pub const TLS1_3: TlsVersion = TlsVersion::new(1, 3);

    pub const fn new(major: u8, minor: u8) -> Self {
        TlsVersion { major, minor }
    }

    /// Symbolic name, if the version is in the version table
    pub fn name(&self) -> Option<&'static str> {
        TLS_VERSIONS
            .iter()
            .find(|entry| entry.version == *self)
            .map(|entry| entry.name)
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for TlsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TLS_VERSIONS
            .iter()
            .find(|entry| entry.name == s)
            .map(|entry| entry.version)
            .ok_or_else(|| Error::InvalidTlsVersion(s.to_string()))
    }
}

/// Validated TLS settings for one connection
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    ssl_mode: SslMode,
    versions: BTreeSet<TlsVersion>,
    ciphersuites: Vec<String>,
    ca_file: Option<PathBuf>,
    ca_path: Option<PathBuf>,
    host_name: Option<String>,
}

impl TlsOptions {
    pub fn builder() -> TlsOptionsBuilder {
        TlsOptionsBuilder::default()
    }

    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    /// Requested versions; empty means library defaults
    pub fn versions(&self) -> &BTreeSet<TlsVersion> {
        &self.versions
    }

    /// Requested cipher suites by IANA name; empty means the default list
    pub fn ciphersuites(&self) -> &[String] {
        &self.ciphersuites
    }

    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    pub fn ca_path(&self) -> Option<&Path> {
        self.ca_path.as_deref()
    }

    /// Host name expected in the server certificate (also sent as SNI)
    pub fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }
}

/// Builder for [`TlsOptions`]
#[derive(Debug, Default)]
pub struct TlsOptionsBuilder {
    options: TlsOptions,
}

impl TlsOptionsBuilder {
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.options.ssl_mode = mode;
        self
    }

    /// Allow a version given by table name (`"TLSv1.2"`)
    pub fn version(self, name: &str) -> Result<Self> {
        let version = name.parse()?;
        Ok(self.tls_version(version))
    }

    pub fn tls_version(mut self, version: TlsVersion) -> Self {
        self.options.versions.insert(version);
        self
    }

    pub fn versions<I>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = TlsVersion>,
    {
        self.options.versions.extend(versions);
        self
    }

    /// Allow a cipher suite by IANA name. Unknown names are ignored when
    /// the connection is set up.
    pub fn ciphersuite(mut self, name: impl Into<String>) -> Self {
        self.options.ciphersuites.push(name.into());
        self
    }

    pub fn ciphersuites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .ciphersuites
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.ca_file = Some(path.into());
        self
    }

    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.ca_path = Some(path.into());
        self
    }

    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.options.host_name = Some(host.into());
        self
    }

    pub fn build(self) -> Result<TlsOptions> {
        let options = self.options;

        if options.ssl_mode == SslMode::VerifyIdentity && options.host_name.is_none() {
            return Err(Error::Config(
                "verify_identity requires the expected host name".to_string(),
            ));
        }

        if let Some(host) = &options.host_name {
            if host.is_empty() || host.contains('\0') {
                return Err(Error::InvalidHost(host.clone()));
            }
        }

        Ok(options)
    }
}
