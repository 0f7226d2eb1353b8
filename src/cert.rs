//! Certificate and private key model
//!
//! Thin wrappers around OpenSSL handles exposing what a context build needs:
//! DER bytes, expiry, algorithm tag and the native handle.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::dsa::Dsa;
use openssl::ec::EcKey;
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameRef};

/// X.509 certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    x509: X509,
    expiry: SystemTime,
}

impl Certificate {
    /// Wrap an existing X.509 handle
    pub fn from_x509(x509: X509) -> Result<Self, ErrorStack> {
        let expiry = asn1_to_system_time(x509.not_after())?;
        Ok(Certificate { x509, expiry })
    }

    /// Parse a single PEM certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, ErrorStack> {
        Self::from_x509(X509::from_pem(pem)?)
    }

    /// Parse every certificate in a PEM bundle, in order
    pub fn stack_from_pem(pem: &[u8]) -> Result<Vec<Self>, ErrorStack> {
        X509::stack_from_pem(pem)?
            .into_iter()
            .map(Self::from_x509)
            .collect()
    }

    /// Parse a DER certificate
    pub fn from_der(der: &[u8]) -> Result<Self, ErrorStack> {
        Self::from_x509(X509::from_der(der)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>, ErrorStack> {
        self.x509.to_der()
    }

    /// Expiry (notAfter) in UTC
    pub fn expiry(&self) -> SystemTime {
        self.expiry
    }

    /// Native engine handle
    pub fn handle(&self) -> &X509 {
        &self.x509
    }

    /// Subject Common Name
    pub fn subject_common_name(&self) -> String {
        common_name(self.x509.subject_name())
    }

    /// Issuer Common Name
    pub fn issuer_common_name(&self) -> String {
        common_name(self.x509.issuer_name())
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn asn1_to_system_time(time: &Asn1TimeRef) -> Result<SystemTime, ErrorStack> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);

    if secs >= 0 {
        Ok(UNIX_EPOCH + Duration::from_secs(secs as u64))
    } else {
        Ok(UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()))
    }
}

/// Private key algorithm tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ec,
    /// Externally owned key, used through its native handle as is
    Opaque,
}

/// Private key, tagged by algorithm
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Rsa<Private>),
    Dsa(Dsa<Private>),
    Ec(EcKey<Private>),
    Opaque(PKey<Private>),
}

impl PrivateKey {
    /// Parse a PEM private key as the given algorithm
    pub fn from_pem(pem: &[u8], algorithm: KeyAlgorithm) -> Result<Self, ErrorStack> {
        Ok(match algorithm {
            KeyAlgorithm::Rsa => PrivateKey::Rsa(Rsa::private_key_from_pem(pem)?),
            KeyAlgorithm::Dsa => PrivateKey::Dsa(PKey::private_key_from_pem(pem)?.dsa()?),
            KeyAlgorithm::Ec => PrivateKey::Ec(EcKey::private_key_from_pem(pem)?),
            KeyAlgorithm::Opaque => PrivateKey::Opaque(PKey::private_key_from_pem(pem)?),
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Rsa(_) => KeyAlgorithm::Rsa,
            PrivateKey::Dsa(_) => KeyAlgorithm::Dsa,
            PrivateKey::Ec(_) => KeyAlgorithm::Ec,
            PrivateKey::Opaque(_) => KeyAlgorithm::Opaque,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.algorithm() == KeyAlgorithm::Opaque
    }
}

impl From<PKey<Private>> for PrivateKey {
    fn from(pkey: PKey<Private>) -> Self {
        PrivateKey::Opaque(pkey)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
