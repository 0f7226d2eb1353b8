//! TLS context builder
//!
//! Turns a [`SecurityConfiguration`] into a ready-to-use [`TlsContext`] for
//! one role. The build is a linear pipeline:
//!
//! 1. protocol resolution against the engine capabilities
//! 2. context allocation (one re-initialization and retry on failure)
//! 3. option mask, cipher list
//! 4. trust store, local identity, peer verification
//! 5. session seed, ephemeral DH/RSA/ECDH material, PSK hint, curve groups
//!
//! Every stage is fail-fast. On failure the partially configured engine
//! context is handed back inside the [`BuildError`].

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use openssl::x509::X509StoreContextRef;
use tracing::{debug, trace, warn};

use crate::config::{PeerVerifyMode, Role, SecurityConfiguration};
use crate::curve::EllipticCurve;
use crate::defaults::SslDefaults;
use crate::engine::{
    DhBindError, Engine, EngineCapabilities, EngineContext, EngineMethod, KeyBindError,
    VerifyCallback, VerifyPolicy,
};
use crate::error::{BuildError, EngineError, ErrorOutcome};
use crate::options::option_mask;

/// Modulus size of the legacy ephemeral RSA key
pub const EPHEMERAL_RSA_BITS: u32 = 512;

/// Re-initializations attempted when context allocation fails
const ALLOCATION_RETRIES: u32 = 1;

/// Private key handle bound to a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyHandle<K> {
    /// Created for this context and released with it
    Owned(K),
    /// Shared with the configuration's opaque key, which keeps ownership
    Borrowed(K),
}

impl<K> KeyHandle<K> {
    pub fn get(&self) -> &K {
        match self {
            KeyHandle::Owned(key) | KeyHandle::Borrowed(key) => key,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, KeyHandle::Owned(_))
    }
}

/// A built TLS context, shared read-only by every session created from it
pub struct TlsContext<C: EngineContext> {
    native: C::Native,
    key: Option<KeyHandle<C::Key>>,
    error_code: ErrorOutcome,
    error_string: String,
}

impl<C: EngineContext> TlsContext<C> {
    /// Native engine context for starting handshakes
    pub fn native(&self) -> &C::Native {
        &self.native
    }

    /// Private key bound to the context, if a local identity was configured
    pub fn private_key(&self) -> Option<&KeyHandle<C::Key>> {
        self.key.as_ref()
    }

    pub fn error_code(&self) -> ErrorOutcome {
        self.error_code
    }

    pub fn error_string(&self) -> &str {
        &self.error_string
    }
}

impl<C: EngineContext> fmt::Debug for TlsContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("error_code", &self.error_code)
            .field("key_owned", &self.key.as_ref().map(KeyHandle::is_owned))
            .finish_non_exhaustive()
    }
}

/// Result of a context build
pub type BuildResult<C> = Result<Arc<TlsContext<C>>, BuildError<C>>;

type Failure = (ErrorOutcome, String);

/// Builds TLS contexts through an [`Engine`]
pub struct ContextBuilder<'a, E: Engine> {
    engine: E,
    defaults: &'a SslDefaults,
    verify_callback: Option<VerifyCallback>,
    now: Option<SystemTime>,
}

impl<E: Engine> ContextBuilder<'static, E> {
    /// Builder using the process-wide defaults
    pub fn new(engine: E) -> Self {
        ContextBuilder {
            engine,
            defaults: SslDefaults::global(),
            verify_callback: None,
            now: None,
        }
    }
}

impl<'a, E: Engine> ContextBuilder<'a, E> {
    /// Use an explicit set of defaults instead of the process-wide one
    pub fn with_defaults<'b>(self, defaults: &'b SslDefaults) -> ContextBuilder<'b, E> {
        ContextBuilder {
            engine: self.engine,
            defaults,
            verify_callback: self.verify_callback,
            now: self.now,
        }
    }

    /// Peer chain validation callback installed for strict verification
    pub fn verify_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(bool, &mut X509StoreContextRef) -> bool + Send + Sync + 'static,
    {
        self.verify_callback = Some(Arc::new(callback));
        self
    }

    /// Evaluate trust anchor expiry against `now` instead of the clock
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Build a context for `role` from `config`.
    ///
    /// `allow_root_certs_on_demand` lets the caller veto lazy trust directory
    /// lookup even when the process-wide defaults enable it.
    ///
    /// Key generation makes this CPU-bound; cache the result instead of
    /// building per connection.
    pub fn build(
        &self,
        config: &SecurityConfiguration,
        role: Role,
        allow_root_certs_on_demand: bool,
    ) -> BuildResult<E::Context> {
        let caps = self.engine.capabilities();
        debug!(
            protocol = config.protocol().as_str(),
            ?role,
            "building TLS context"
        );

        let method = EngineMethod::resolve(config.protocol(), role, &caps).ok_or_else(|| {
            warn!(protocol = config.protocol().as_str(), "protocol not supported by engine");
            BuildError::new(
                ErrorOutcome::UnsupportedProtocol,
                "Error creating SSL context (unsupported protocol)",
            )
        })?;

        let mut ctx = self.allocate(method)?;

        match self.configure(&mut ctx, config, role, allow_root_certs_on_demand, &caps) {
            Ok(key) => {
                debug!("TLS context ready");
                Ok(Arc::new(TlsContext {
                    native: ctx.finish(),
                    key,
                    error_code: ErrorOutcome::NoError,
                    error_string: String::new(),
                }))
            }
            Err((code, message)) => {
                warn!(%code, %message, "TLS context build failed");
                Err(BuildError::new(code, message).with_partial(ctx))
            }
        }
    }

    fn allocate(&self, method: EngineMethod) -> Result<E::Context, BuildError<E::Context>> {
        let mut last_error = None;

        for attempt in 0..=ALLOCATION_RETRIES {
            // A previous library unload may have dropped the registered ciphers
            if attempt > 0 && !self.engine.reinitialize() {
                break;
            }
            match self.engine.new_context(method) {
                Ok(ctx) => return Ok(ctx),
                Err(e) => {
                    warn!(attempt, error = %e, "engine context allocation failed");
                    last_error = Some(e);
                }
            }
        }

        let diag = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(BuildError::new(
            ErrorOutcome::EngineInitFailed,
            format!("Error creating SSL context ({})", diag),
        ))
    }

    fn configure(
        &self,
        ctx: &mut E::Context,
        config: &SecurityConfiguration,
        role: Role,
        allow_root_certs_on_demand: bool,
        caps: &EngineCapabilities,
    ) -> Result<Option<KeyHandle<<E::Context as EngineContext>::Key>>, Failure> {
        ctx.set_options(option_mask(config.protocol(), &config.options()));
        ctx.release_buffers();

        self.set_ciphers(ctx, config)?;
        self.populate_trust_store(ctx, config, allow_root_certs_on_demand);
        let key = bind_identity(ctx, config)?;
        self.set_verification(ctx, config);

        if !config.session_ticket().is_empty() {
            ctx.set_session_ticket(config.session_ticket());
        }

        set_dh_parameters(ctx, config)?;
        set_ephemeral_rsa(ctx, config, caps)?;
        set_ecdh_curve(ctx, caps);

        if role == Role::Server && caps.supports_psk {
            if let Err(e) = ctx.set_psk_identity_hint(config.psk_identity_hint()) {
                warn!(error = %e, "PSK identity hint not set");
            }
        }

        select_curve_list(ctx, config, caps)?;

        Ok(key)
    }

    fn set_ciphers(&self, ctx: &mut E::Context, config: &SecurityConfiguration) -> Result<(), Failure> {
        let ciphers = cipher_string(config.ciphers(), self.defaults.ciphers());
        if ciphers.is_empty() {
            return Err((
                ErrorOutcome::InvalidCipherList,
                "Invalid or empty cipher list (no ciphers configured)".to_string(),
            ));
        }

        debug!(%ciphers, "setting cipher list");
        ctx.set_cipher_list(&ciphers).map_err(|e| {
            (
                ErrorOutcome::InvalidCipherList,
                format!("Invalid or empty cipher list ({})", e),
            )
        })
    }

    fn populate_trust_store(
        &self,
        ctx: &mut E::Context,
        config: &SecurityConfiguration,
        allow_root_certs_on_demand: bool,
    ) {
        let now = self.now.unwrap_or_else(SystemTime::now);

        // Only the first matching CA is examined during verification, so an
        // expired copy would shadow a valid one
        for cert in config.ca_certificates() {
            if cert.expiry() < now {
                warn!(subject = %cert.subject_common_name(), "skipping expired trust anchor");
                continue;
            }
            trace!(subject = %cert.subject_common_name(), "adding trust anchor");
            if let Err(e) = ctx.add_trust_anchor(cert) {
                warn!(error = %e, "trust anchor not added");
            }
        }

        if self.defaults.loads_root_certs_on_demand() && allow_root_certs_on_demand {
            for dir in self.defaults.root_cert_dirs() {
                if let Err(e) = ctx.add_trust_directory(dir) {
                    warn!(dir = %dir.display(), error = %e, "trust directory not registered");
                }
            }
        }
    }

    fn set_verification(&self, ctx: &mut E::Context, config: &SecurityConfiguration) {
        let policy = match config.peer_verify_mode() {
            PeerVerifyMode::None => VerifyPolicy::AcceptAny,
            PeerVerifyMode::Peer => VerifyPolicy::Strict(self.verify_callback.clone()),
        };
        ctx.set_verify(policy);

        if config.peer_verify_depth() > 0 {
            ctx.set_verify_depth(config.peer_verify_depth());
        }
    }
}

/// Colon-joined cipher list; `configured` wins unless it is empty
pub fn cipher_string(configured: &[String], defaults: &[String]) -> String {
    if configured.is_empty() {
        defaults.join(":")
    } else {
        configured.join(":")
    }
}

fn bind_identity<C: EngineContext>(
    ctx: &mut C,
    config: &SecurityConfiguration,
) -> Result<Option<KeyHandle<C::Key>>, Failure> {
    let Some(leaf) = config.local_certificate() else {
        return Ok(None);
    };

    let key = config.private_key().ok_or_else(|| {
        (
            ErrorOutcome::MissingPrivateKey,
            "Cannot provide a certificate with no key".to_string(),
        )
    })?;

    debug!(
        subject = %leaf.subject_common_name(),
        algorithm = ?key.algorithm(),
        "binding local identity"
    );

    ctx.use_certificate(leaf).map_err(|e| {
        (
            ErrorOutcome::CertificateLoadFailed,
            format!("Error loading local certificate, {}", e),
        )
    })?;

    let key_load_failed = |e: EngineError| {
        (
            ErrorOutcome::KeyLoadFailed,
            format!("Error loading private key, {}", e),
        )
    };
    let key_mismatch = |e: EngineError| {
        (
            ErrorOutcome::KeyCertificateMismatch,
            format!("Private key does not certify public key, {}", e),
        )
    };

    let native = ctx.native_key(key).map_err(key_load_failed)?;
    ctx.use_private_key(&native).map_err(|e| match e {
        KeyBindError::Load(e) => key_load_failed(e),
        KeyBindError::Mismatch(e) => key_mismatch(e),
    })?;
    let handle = if key.is_opaque() {
        KeyHandle::Borrowed(native)
    } else {
        KeyHandle::Owned(native)
    };

    ctx.check_private_key().map_err(key_mismatch)?;

    for cert in config.local_certificate_chain().iter().skip(1) {
        trace!(subject = %cert.subject_common_name(), "adding chain certificate");
        ctx.add_chain_certificate(cert).map_err(|e| {
            (
                ErrorOutcome::CertificateLoadFailed,
                format!("Error adding intermediate certificate, {}", e),
            )
        })?;
    }

    Ok(Some(handle))
}

fn set_dh_parameters<C: EngineContext>(
    ctx: &mut C,
    config: &SecurityConfiguration,
) -> Result<(), Failure> {
    let params = config.dh_parameters();

    if !params.is_valid() {
        return Err((
            ErrorOutcome::InvalidDhParameters,
            "Diffie-Hellman parameters are not valid".to_string(),
        ));
    }
    if params.is_empty() {
        return Ok(());
    }

    match ctx.set_tmp_dh(params.der()) {
        Ok(()) => Ok(()),
        Err(DhBindError::Decode(e)) => {
            // Validation and decoding disagree
            panic!("validated Diffie-Hellman parameters failed to decode: {}", e)
        }
        Err(DhBindError::Bind(e)) => Err((
            ErrorOutcome::InvalidDhParameters,
            format!("Error setting Diffie-Hellman parameters ({})", e),
        )),
    }
}

fn set_ephemeral_rsa<C: EngineContext>(
    ctx: &mut C,
    config: &SecurityConfiguration,
    caps: &EngineCapabilities,
) -> Result<(), Failure> {
    if !config.legacy_ephemeral_rsa() {
        return Ok(());
    }
    if !caps.supports_ephemeral_rsa {
        return Err((
            ErrorOutcome::EphemeralKeyFailed,
            "Error generating ephemeral RSA key (not supported by the engine)".to_string(),
        ));
    }

    debug!(bits = EPHEMERAL_RSA_BITS, "generating ephemeral RSA key");
    ctx.set_tmp_rsa(EPHEMERAL_RSA_BITS).map_err(|e| {
        (
            ErrorOutcome::EphemeralKeyFailed,
            format!("Error generating ephemeral RSA key ({})", e),
        )
    })
}

fn curve_error(why: &str) -> Failure {
    (
        ErrorOutcome::CurveSelectionFailed,
        format!("Error when setting the elliptic curves ({})", why),
    )
}

fn set_ecdh_curve<C: EngineContext>(ctx: &mut C, caps: &EngineCapabilities) {
    if caps.supports_auto_curve {
        ctx.enable_auto_curve();
    } else if let Err(e) = ctx.set_tmp_ecdh(EllipticCurve::FALLBACK) {
        warn!(curve = %EllipticCurve::FALLBACK, error = %e, "fallback ECDH curve not set");
    }
}

fn select_curve_list<C: EngineContext>(
    ctx: &mut C,
    config: &SecurityConfiguration,
    caps: &EngineCapabilities,
) -> Result<(), Failure> {
    let curves = config.elliptic_curves();
    if curves.is_empty() {
        return Ok(());
    }

    // An explicit request must not degrade to the single fallback curve
    if !caps.supports_multi_curve {
        return Err(curve_error("OpenSSL version too old, need at least v1.0.2"));
    }

    debug!(?curves, "setting elliptic curves");
    ctx.set_curves(curves).map_err(|e| curve_error(&e.to_string()))
}
