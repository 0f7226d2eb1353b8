//! sslctx - TLS context construction
//!
//! This crate turns a declarative [`SecurityConfiguration`] into a ready-to-use
//! TLS context for either the client or the server role: protocol range,
//! cipher preferences, trust anchors, local identity, peer verification and
//! ephemeral key-exchange material.
//!
//! ```no_run
//! use sslctx::{Role, SecurityConfiguration};
//!
//! let config = SecurityConfiguration::builder()
//!     .ciphers(["ECDHE-RSA-AES128-GCM-SHA256", "AES128-SHA"])
//!     .build();
//! let ctx = sslctx::build(&config, Role::Client, true).unwrap();
//! let _ssl = openssl::ssl::Ssl::new(ctx.native().ssl_context()).unwrap();
//! ```

pub mod cert;
pub mod config;
pub mod context;
pub mod curve;
pub mod defaults;
pub mod dh;
pub mod engine;
pub mod error;
pub mod options;

use std::sync::Arc;

pub use cert::{Certificate, KeyAlgorithm, PrivateKey};
pub use config::{PeerVerifyMode, Protocol, Role, SecurityConfiguration, SslOptions};
pub use context::{ContextBuilder, KeyHandle, TlsContext};
pub use curve::EllipticCurve;
pub use defaults::SslDefaults;
pub use dh::{DhRejection, DhValidity, DiffieHellmanParameters};
pub use engine::{OpenSslContext, OpenSslContextBuilder, OpenSslEngine};
pub use error::{BuildError, EngineError, ErrorOutcome};

/// TLS context built by the OpenSSL engine
pub type OpenSslTlsContext = TlsContext<OpenSslContextBuilder>;

/// Build a context with the OpenSSL engine and the process-wide defaults
pub fn build(
    config: &SecurityConfiguration,
    role: Role,
    allow_root_certs_on_demand: bool,
) -> Result<Arc<OpenSslTlsContext>, BuildError<OpenSslContextBuilder>> {
    ContextBuilder::new(OpenSslEngine::new()).build(config, role, allow_root_certs_on_demand)
}
