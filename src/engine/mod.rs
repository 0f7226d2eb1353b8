//! Cryptographic engine abstraction
//!
//! The context builder never talks to a TLS library directly. It queries an
//! [`Engine`] once for its [`EngineCapabilities`], allocates an
//! [`EngineContext`] for the resolved [`EngineMethod`] and drives every
//! configuration step through that context.
//!
//! [`openssl::OpenSslEngine`] is the production engine.

pub mod openssl;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use std::sync::Arc;

use ::openssl::ssl::SslOptions as EngineOptions;
use ::openssl::x509::X509StoreContextRef;

use crate::cert::{Certificate, PrivateKey};
use crate::config::{Protocol, Role};
use crate::curve::EllipticCurve;
use crate::error::EngineError;

pub use self::openssl::{OpenSslContext, OpenSslContextBuilder, OpenSslEngine};

/// Peer chain validation hook supplied by the session layer
pub type VerifyCallback = Arc<dyn Fn(bool, &mut X509StoreContextRef) -> bool + Send + Sync>;

/// What the runtime engine can do, queried once per build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCapabilities {
    pub supports_ssl2: bool,
    pub supports_ssl3: bool,
    pub supports_tls11: bool,
    pub supports_tls12: bool,
    /// Engine picks the ECDH curve per handshake
    pub supports_auto_curve: bool,
    /// Engine accepts an ordered list of curve groups
    pub supports_multi_curve: bool,
    pub supports_psk: bool,
    /// Engine can bind a temporary RSA key for export cipher suites
    pub supports_ephemeral_rsa: bool,
}

impl EngineCapabilities {
    /// Everything supported
    pub fn all() -> Self {
        EngineCapabilities {
            supports_ssl2: true,
            supports_ssl3: true,
            supports_tls11: true,
            supports_tls12: true,
            supports_auto_curve: true,
            supports_multi_curve: true,
            supports_psk: true,
            supports_ephemeral_rsa: true,
        }
    }
}

/// Protocol version a context method is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodVersion {
    /// Broadest method, versions are narrowed by the option mask
    Negotiated,
    SslV2,
    SslV3,
    TlsV1_0,
    TlsV1_1,
    TlsV1_2,
}

/// Engine method token: role plus version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineMethod {
    pub role: Role,
    pub version: MethodVersion,
}

impl EngineMethod {
    /// Resolve a protocol selector against the engine's capabilities.
    ///
    /// Returns `None` when a deliberately chosen version is not available;
    /// no other version is substituted.
    pub fn resolve(protocol: Protocol, role: Role, caps: &EngineCapabilities) -> Option<Self> {
        let version = match protocol {
            Protocol::SslV2 if caps.supports_ssl2 => MethodVersion::SslV2,
            Protocol::SslV3 if caps.supports_ssl3 => MethodVersion::SslV3,
            Protocol::TlsV1_0 => MethodVersion::TlsV1_0,
            Protocol::TlsV1_1 if caps.supports_tls11 => MethodVersion::TlsV1_1,
            Protocol::TlsV1_2 if caps.supports_tls12 => MethodVersion::TlsV1_2,
            Protocol::TlsV1_1OrLater if caps.supports_tls11 => MethodVersion::Negotiated,
            Protocol::TlsV1_2OrLater if caps.supports_tls12 => MethodVersion::Negotiated,
            Protocol::AnyProtocol
            | Protocol::TlsV1SslV3
            | Protocol::SecureProtocols
            | Protocol::TlsV1_0OrLater
            | Protocol::UnknownProtocol => MethodVersion::Negotiated,
            _ => return None,
        };

        Some(EngineMethod { role, version })
    }
}

/// Peer verification setup
#[derive(Clone)]
pub enum VerifyPolicy {
    /// No validation, any peer is accepted
    AcceptAny,
    /// Validate the peer chain, optionally through a session-layer callback
    Strict(Option<VerifyCallback>),
}

impl std::fmt::Debug for VerifyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyPolicy::AcceptAny => f.write_str("AcceptAny"),
            VerifyPolicy::Strict(cb) => write!(f, "Strict(callback: {})", cb.is_some()),
        }
    }
}

/// Failure binding Diffie-Hellman parameters
#[derive(Debug, thiserror::Error)]
pub enum DhBindError {
    /// Parameters could not be decoded
    #[error("decode failed: {0}")]
    Decode(EngineError),

    /// Engine refused decoded parameters
    #[error("{0}")]
    Bind(EngineError),
}

/// Failure binding a private key
#[derive(Debug, thiserror::Error)]
pub enum KeyBindError {
    /// Engine could not load the key
    #[error("{0}")]
    Load(EngineError),

    /// Key does not belong to the bound certificate
    #[error("{0}")]
    Mismatch(EngineError),
}

/// A cryptographic engine able to allocate TLS contexts
pub trait Engine {
    type Context: EngineContext;

    fn capabilities(&self) -> EngineCapabilities;

    /// Allocate a context for `method`
    fn new_context(&self, method: EngineMethod) -> Result<Self::Context, EngineError>;

    /// Re-run library initialization, `false` if it failed
    fn reinitialize(&self) -> bool;
}

/// A context under construction
pub trait EngineContext: Sized {
    /// Native private key handle
    type Key;
    /// Finished, shareable context
    type Native;

    fn set_options(&mut self, options: EngineOptions);

    /// Let the engine free idle record buffers early
    fn release_buffers(&mut self);

    fn set_cipher_list(&mut self, ciphers: &str) -> Result<(), EngineError>;

    fn add_trust_anchor(&mut self, cert: &Certificate) -> Result<(), EngineError>;

    /// Register a directory for lazy trust-anchor lookup
    fn add_trust_directory(&mut self, dir: &Path) -> Result<(), EngineError>;

    fn use_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError>;

    /// Materialize a native handle for `key`.
    ///
    /// Opaque keys yield their existing handle; other algorithms get a fresh
    /// handle holding the algorithm-specific key.
    fn native_key(&self, key: &PrivateKey) -> Result<Self::Key, EngineError>;

    /// Bind `key`, reporting a key that does not match the bound certificate
    /// as [`KeyBindError::Mismatch`]
    fn use_private_key(&mut self, key: &Self::Key) -> Result<(), KeyBindError>;

    /// Check that the bound key matches the bound certificate
    fn check_private_key(&self) -> Result<(), EngineError>;

    /// Append a supplemental chain certificate after the leaf
    fn add_chain_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError>;

    fn set_verify(&mut self, policy: VerifyPolicy);

    fn set_verify_depth(&mut self, depth: u32);

    /// Seed resumption with a persisted session
    fn set_session_ticket(&mut self, ticket: &[u8]);

    fn set_tmp_dh(&mut self, der: &[u8]) -> Result<(), DhBindError>;

    /// Generate and bind an ephemeral RSA key of `bits`
    fn set_tmp_rsa(&mut self, bits: u32) -> Result<(), EngineError>;

    fn enable_auto_curve(&mut self);

    /// Bind a single ECDH curve
    fn set_tmp_ecdh(&mut self, curve: EllipticCurve) -> Result<(), EngineError>;

    /// Set the ordered curve group list
    fn set_curves(&mut self, curves: &[EllipticCurve]) -> Result<(), EngineError>;

    fn set_psk_identity_hint(&mut self, hint: &str) -> Result<(), EngineError>;

    fn finish(self) -> Self::Native;
}
