//! OpenSSL engine
//!
//! Implements the engine traits on top of the `openssl` crate. Capabilities
//! are derived from the runtime library version, not from build-time flags.

use std::ffi::CString;
use std::path::Path;

use openssl::dh::Dh;
use openssl::ec::EcKey;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{
    SslContext, SslContextBuilder, SslFiletype, SslMethod, SslMode, SslOptions, SslSession,
    SslSessionRef, SslVerifyMode, SslVersion,
};
use openssl::x509::store::X509Lookup;
use openssl::x509::X509;
use tracing::{debug, warn};

use super::{
    DhBindError, Engine, EngineCapabilities, EngineContext, EngineMethod, KeyBindError,
    MethodVersion, VerifyPolicy,
};
use crate::cert::{Certificate, PrivateKey};
use crate::config::Role;
use crate::curve::EllipticCurve;
use crate::error::EngineError;

// Not bound by `openssl-sys`; exported by libssl with this C prototype.
extern "C" {
    fn SSL_CTX_use_psk_identity_hint(
        ctx: *mut openssl_sys::SSL_CTX,
        hint: *const std::os::raw::c_char,
    ) -> std::os::raw::c_int;
}

const OPENSSL_1_0_1: i64 = 0x1000_1000;
const OPENSSL_1_0_2: i64 = 0x1000_2000;
const OPENSSL_1_1_0: i64 = 0x1010_0000;

/// OpenSSL-backed engine
#[derive(Debug, Clone)]
pub struct OpenSslEngine {
    capabilities: EngineCapabilities,
}

impl OpenSslEngine {
    /// Initialize the library and detect what the runtime version supports
    pub fn new() -> Self {
        openssl::init();
        OpenSslEngine {
            capabilities: Self::detect(openssl::version::number()),
        }
    }

    /// Engine restricted to `capabilities`, e.g. to emulate an older library
    pub fn with_capabilities(capabilities: EngineCapabilities) -> Self {
        openssl::init();
        OpenSslEngine { capabilities }
    }

    /// Capabilities of a library reporting `version` as its version number
    pub fn detect(version: i64) -> EngineCapabilities {
        EngineCapabilities {
            // Gone from every library this crate links against
            supports_ssl2: false,
            // Compiled out by default since 1.1.0
            supports_ssl3: version < OPENSSL_1_1_0,
            supports_tls11: version >= OPENSSL_1_0_1,
            supports_tls12: version >= OPENSSL_1_0_1,
            supports_auto_curve: version >= OPENSSL_1_0_2,
            supports_multi_curve: version >= OPENSSL_1_0_2,
            supports_psk: version >= OPENSSL_1_0_1,
            // Temporary RSA keys were removed together with export ciphers
            supports_ephemeral_rsa: false,
        }
    }
}

impl Default for OpenSslEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for OpenSslEngine {
    type Context = OpenSslContextBuilder;

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn new_context(&self, method: EngineMethod) -> Result<OpenSslContextBuilder, EngineError> {
        let ssl_method = match method.role {
            Role::Client => SslMethod::tls_client(),
            Role::Server => SslMethod::tls_server(),
        };

        let pinned = match method.version {
            MethodVersion::Negotiated => None,
            MethodVersion::SslV2 => {
                return Err(EngineError::new("SSLv2 is not available in this library"))
            }
            MethodVersion::SslV3 => Some(SslVersion::SSL3),
            MethodVersion::TlsV1_0 => Some(SslVersion::TLS1),
            MethodVersion::TlsV1_1 => Some(SslVersion::TLS1_1),
            MethodVersion::TlsV1_2 => Some(SslVersion::TLS1_2),
        };

        let mut builder = SslContextBuilder::new(ssl_method)?;
        if let Some(version) = pinned {
            builder.set_min_proto_version(Some(version))?;
            builder.set_max_proto_version(Some(version))?;
        }

        Ok(OpenSslContextBuilder {
            builder,
            leaf: None,
            session: None,
        })
    }

    /// Re-run library initialization.
    ///
    /// From OpenSSL 1.1.0 the library initializes itself once per process and
    /// cannot be unloaded, so this is a no-op there and the retry only helps
    /// against transient allocation failures.
    fn reinitialize(&self) -> bool {
        openssl_sys::init();
        true
    }
}

/// OpenSSL context under construction
pub struct OpenSslContextBuilder {
    builder: SslContextBuilder,
    leaf: Option<X509>,
    session: Option<SslSession>,
}

impl EngineContext for OpenSslContextBuilder {
    type Key = PKey<Private>;
    type Native = OpenSslContext;

    fn set_options(&mut self, options: SslOptions) {
        self.builder.set_options(options);
    }

    fn release_buffers(&mut self) {
        self.builder.set_mode(SslMode::RELEASE_BUFFERS);
    }

    fn set_cipher_list(&mut self, ciphers: &str) -> Result<(), EngineError> {
        self.builder.set_cipher_list(ciphers)?;
        Ok(())
    }

    fn add_trust_anchor(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        self.builder.cert_store_mut().add_cert(cert.handle().clone())?;
        Ok(())
    }

    fn add_trust_directory(&mut self, dir: &Path) -> Result<(), EngineError> {
        let dir = dir
            .to_str()
            .ok_or_else(|| EngineError::new(format!("non UTF-8 path {}", dir.display())))?;
        self.builder
            .cert_store_mut()
            .add_lookup(X509Lookup::hash_dir())?
            .add_dir(dir, SslFiletype::PEM)?;
        Ok(())
    }

    fn use_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        self.builder.set_certificate(cert.handle())?;
        self.leaf = Some(cert.handle().clone());
        Ok(())
    }

    fn native_key(&self, key: &PrivateKey) -> Result<PKey<Private>, EngineError> {
        let pkey = match key {
            PrivateKey::Rsa(rsa) => PKey::from_rsa(rsa.clone())?,
            PrivateKey::Dsa(dsa) => PKey::from_dsa(dsa.clone())?,
            PrivateKey::Ec(ec) => PKey::from_ec_key(ec.clone())?,
            PrivateKey::Opaque(pkey) => pkey.clone(),
        };
        Ok(pkey)
    }

    fn use_private_key(&mut self, key: &PKey<Private>) -> Result<(), KeyBindError> {
        // OpenSSL 3 refuses a mismatched key here, before the consistency check
        if let Some(leaf) = &self.leaf {
            let public = leaf
                .public_key()
                .map_err(|e| KeyBindError::Load(e.into()))?;
            if !public.public_eq(key) {
                return Err(KeyBindError::Mismatch(EngineError::new(
                    "key values mismatch",
                )));
            }
        }
        self.builder
            .set_private_key(key)
            .map_err(|e| KeyBindError::Load(e.into()))
    }

    fn check_private_key(&self) -> Result<(), EngineError> {
        self.builder.check_private_key()?;
        Ok(())
    }

    fn add_chain_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        // The context takes ownership of chain entries
        self.builder.add_extra_chain_cert(cert.handle().clone())?;
        Ok(())
    }

    fn set_verify(&mut self, policy: VerifyPolicy) {
        match policy {
            VerifyPolicy::AcceptAny => self.builder.set_verify(SslVerifyMode::NONE),
            VerifyPolicy::Strict(None) => self.builder.set_verify(SslVerifyMode::PEER),
            VerifyPolicy::Strict(Some(callback)) => self
                .builder
                .set_verify_callback(SslVerifyMode::PEER, move |ok, store| callback(ok, store)),
        }
    }

    fn set_verify_depth(&mut self, depth: u32) {
        self.builder.set_verify_depth(depth);
    }

    fn set_session_ticket(&mut self, ticket: &[u8]) {
        match SslSession::from_der(ticket) {
            Ok(session) => self.session = Some(session),
            Err(e) => warn!(error = %e, "ignoring undecodable session ticket"),
        }
    }

    fn set_tmp_dh(&mut self, der: &[u8]) -> Result<(), DhBindError> {
        let dh = Dh::params_from_der(der).map_err(|e| DhBindError::Decode(e.into()))?;
        self.builder
            .set_tmp_dh(&dh)
            .map_err(|e| DhBindError::Bind(e.into()))
    }

    fn set_tmp_rsa(&mut self, _bits: u32) -> Result<(), EngineError> {
        Err(EngineError::new(
            "temporary RSA keys are not supported by this library",
        ))
    }

    fn enable_auto_curve(&mut self) {
        // Automatic curve selection is always on from 1.1.0
        debug!("automatic ECDH curve selection enabled");
    }

    fn set_tmp_ecdh(&mut self, curve: EllipticCurve) -> Result<(), EngineError> {
        let key = EcKey::from_curve_name(curve.nid())?;
        self.builder.set_tmp_ecdh(&key)?;
        Ok(())
    }

    fn set_curves(&mut self, curves: &[EllipticCurve]) -> Result<(), EngineError> {
        let names = curves
            .iter()
            .map(|curve| {
                curve
                    .short_name()
                    .ok_or_else(|| EngineError::new(format!("unknown curve {}", curve)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.builder.set_groups_list(&names.join(":"))?;
        Ok(())
    }

    fn set_psk_identity_hint(&mut self, hint: &str) -> Result<(), EngineError> {
        let hint = CString::new(hint)
            .map_err(|_| EngineError::new("PSK identity hint contains a NUL byte"))?;

        // SAFETY: the context pointer is live for the duration of the call and
        // OpenSSL copies the hint
        let rc =
            unsafe { SSL_CTX_use_psk_identity_hint(self.builder.as_ptr(), hint.as_ptr()) };
        if rc != 1 {
            return Err(ErrorStack::get().into());
        }
        Ok(())
    }

    fn finish(self) -> OpenSslContext {
        OpenSslContext {
            ctx: self.builder.build(),
            session: self.session,
        }
    }
}

/// Finished OpenSSL context, shareable across sessions
#[derive(Clone)]
pub struct OpenSslContext {
    ctx: SslContext,
    session: Option<SslSession>,
}

impl OpenSslContext {
    /// Native context handle for starting handshakes
    pub fn ssl_context(&self) -> &SslContext {
        &self.ctx
    }

    /// Persisted session to resume, if one was configured
    pub fn session(&self) -> Option<&SslSessionRef> {
        self.session.as_deref()
    }
}
