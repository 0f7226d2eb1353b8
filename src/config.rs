//! Security configuration
//!
//! This module provides the declarative input to a context build: protocol
//! selection, ciphers, trust anchors, local identity, peer verification and
//! ephemeral key material. A configuration is immutable once built.

use std::str::FromStr;

use crate::cert::{Certificate, PrivateKey};
use crate::curve::EllipticCurve;
use crate::dh::DiffieHellmanParameters;

/// Protocol version selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// SSL 2.0
    SslV2,
    /// SSL 3.0
    SslV3,
    /// TLS 1.0
    TlsV1_0,
    /// TLS 1.1
    TlsV1_1,
    /// TLS 1.2
    TlsV1_2,
    /// Any version the engine can negotiate
    AnyProtocol,
    /// TLS 1.0 or SSL 3.0
    TlsV1SslV3,
    /// Any version except the broken SSL ones
    #[default]
    SecureProtocols,
    /// TLS 1.0 and later
    TlsV1_0OrLater,
    /// TLS 1.1 and later
    TlsV1_1OrLater,
    /// TLS 1.2 and later
    TlsV1_2OrLater,
    /// Unrecognized selector, negotiates like `AnyProtocol`
    UnknownProtocol,
}

impl Protocol {
    /// Get protocol selector as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::SslV2 => "SSLv2",
            Protocol::SslV3 => "SSLv3",
            Protocol::TlsV1_0 => "TLSv1.0",
            Protocol::TlsV1_1 => "TLSv1.1",
            Protocol::TlsV1_2 => "TLSv1.2",
            Protocol::AnyProtocol => "any",
            Protocol::TlsV1SslV3 => "TLSv1SSLv3",
            Protocol::SecureProtocols => "secure",
            Protocol::TlsV1_0OrLater => "TLSv1.0+",
            Protocol::TlsV1_1OrLater => "TLSv1.1+",
            Protocol::TlsV1_2OrLater => "TLSv1.2+",
            Protocol::UnknownProtocol => "unknown",
        }
    }

    /// Whether the selector names exactly one protocol version
    pub fn is_specific(&self) -> bool {
        matches!(
            self,
            Protocol::SslV2
                | Protocol::SslV3
                | Protocol::TlsV1_0
                | Protocol::TlsV1_1
                | Protocol::TlsV1_2
        )
    }
}

impl FromStr for Protocol {
    type Err = String;

    /// Parse protocol selector from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SSLV2" | "SSL2" => Ok(Protocol::SslV2),
            "SSLV3" | "SSL3" => Ok(Protocol::SslV3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(Protocol::TlsV1_0),
            "TLSV1.1" | "TLS1.1" => Ok(Protocol::TlsV1_1),
            "TLSV1.2" | "TLS1.2" => Ok(Protocol::TlsV1_2),
            "ANY" => Ok(Protocol::AnyProtocol),
            "TLSV1SSLV3" => Ok(Protocol::TlsV1SslV3),
            "SECURE" => Ok(Protocol::SecureProtocols),
            "TLSV1.0+" | "TLS1.0+" | "TLSV1+" => Ok(Protocol::TlsV1_0OrLater),
            "TLSV1.1+" | "TLS1.1+" => Ok(Protocol::TlsV1_1OrLater),
            "TLSV1.2+" | "TLS1.2+" => Ok(Protocol::TlsV1_2OrLater),
            _ => Err(format!("Invalid protocol: {}", s)),
        }
    }
}

/// Compatibility switches.
///
/// Most feed the engine option mask. `disable_server_name_indication`,
/// `disable_session_sharing` and `disable_session_persistence` are carried for
/// the session layer (SNI on connect, session cache sharing, exporting the
/// negotiated session) and never change the built context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslOptions {
    pub disable_empty_fragments: bool,
    pub disable_session_tickets: bool,
    pub disable_compression: bool,
    pub disable_server_name_indication: bool,
    pub disable_legacy_renegotiation: bool,
    pub disable_session_sharing: bool,
    pub disable_session_persistence: bool,
    pub disable_server_cipher_preference: bool,
}

impl Default for SslOptions {
    fn default() -> Self {
        SslOptions {
            disable_empty_fragments: true,
            disable_session_tickets: false,
            disable_compression: true,
            disable_server_name_indication: false,
            disable_legacy_renegotiation: true,
            disable_session_sharing: false,
            disable_session_persistence: true,
            disable_server_cipher_preference: false,
        }
    }
}

/// Peer certificate verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerVerifyMode {
    /// Accept any peer
    None,
    /// Validate the peer certificate chain
    Peer,
}

/// Side of the connection a context is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Declarative TLS security configuration (immutable after building)
#[derive(Debug, Clone)]
pub struct SecurityConfiguration {
    pub(crate) protocol: Protocol,
    pub(crate) options: SslOptions,
    pub(crate) ciphers: Vec<String>,
    pub(crate) ca_certificates: Vec<Certificate>,
    pub(crate) local_certificate_chain: Vec<Certificate>,
    pub(crate) private_key: Option<PrivateKey>,
    pub(crate) peer_verify_mode: PeerVerifyMode,
    pub(crate) peer_verify_depth: u32,
    pub(crate) session_ticket: Vec<u8>,
    pub(crate) dh_parameters: DiffieHellmanParameters,
    pub(crate) psk_identity_hint: String,
    pub(crate) elliptic_curves: Vec<EllipticCurve>,
    pub(crate) legacy_ephemeral_rsa: bool,
}

impl Default for SecurityConfiguration {
    fn default() -> Self {
        SecurityConfiguration {
            protocol: Protocol::default(),
            options: SslOptions::default(),
            ciphers: Vec::new(),
            ca_certificates: Vec::new(),
            local_certificate_chain: Vec::new(),
            private_key: None,
            peer_verify_mode: PeerVerifyMode::None,
            peer_verify_depth: 0,
            session_ticket: Vec::new(),
            dh_parameters: DiffieHellmanParameters::empty(),
            psk_identity_hint: String::new(),
            elliptic_curves: Vec::new(),
            legacy_ephemeral_rsa: false,
        }
    }
}

impl SecurityConfiguration {
    /// Create a new configuration builder
    pub fn builder() -> SecurityConfigurationBuilder {
        SecurityConfigurationBuilder {
            config: SecurityConfiguration::default(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn options(&self) -> SslOptions {
        self.options
    }

    /// Configured cipher names in priority order (empty means process default)
    pub fn ciphers(&self) -> &[String] {
        &self.ciphers
    }

    pub fn ca_certificates(&self) -> &[Certificate] {
        &self.ca_certificates
    }

    /// Local leaf certificate, the first entry of the local chain
    pub fn local_certificate(&self) -> Option<&Certificate> {
        self.local_certificate_chain.first()
    }

    /// Local chain: leaf first, then intermediates
    pub fn local_certificate_chain(&self) -> &[Certificate] {
        &self.local_certificate_chain
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    pub fn peer_verify_mode(&self) -> PeerVerifyMode {
        self.peer_verify_mode
    }

    /// Maximum peer chain depth, 0 means engine default
    pub fn peer_verify_depth(&self) -> u32 {
        self.peer_verify_depth
    }

    pub fn session_ticket(&self) -> &[u8] {
        &self.session_ticket
    }

    pub fn dh_parameters(&self) -> &DiffieHellmanParameters {
        &self.dh_parameters
    }

    pub fn psk_identity_hint(&self) -> &str {
        &self.psk_identity_hint
    }

    /// Requested curve groups in preference order
    pub fn elliptic_curves(&self) -> &[EllipticCurve] {
        &self.elliptic_curves
    }

    pub fn legacy_ephemeral_rsa(&self) -> bool {
        self.legacy_ephemeral_rsa
    }
}

/// Security configuration builder
pub struct SecurityConfigurationBuilder {
    config: SecurityConfiguration,
}

impl SecurityConfigurationBuilder {
    /// Set protocol version selector
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Set compatibility options
    pub fn options(mut self, options: SslOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Set cipher names (order is priority order)
    pub fn ciphers<I, S>(mut self, ciphers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ciphers = ciphers.into_iter().map(Into::into).collect();
        self
    }

    /// Set trust anchors
    pub fn ca_certificates(mut self, certs: Vec<Certificate>) -> Self {
        self.config.ca_certificates = certs;
        self
    }

    /// Add a single trust anchor
    pub fn add_ca_certificate(mut self, cert: Certificate) -> Self {
        self.config.ca_certificates.push(cert);
        self
    }

    /// Set the local leaf certificate, replacing any configured chain
    pub fn local_certificate(mut self, cert: Certificate) -> Self {
        self.config.local_certificate_chain = vec![cert];
        self
    }

    /// Set the local chain (leaf first, then intermediates)
    pub fn local_certificate_chain(mut self, chain: Vec<Certificate>) -> Self {
        self.config.local_certificate_chain = chain;
        self
    }

    /// Set the local private key
    pub fn private_key(mut self, key: PrivateKey) -> Self {
        self.config.private_key = Some(key);
        self
    }

    /// Set peer verification mode
    pub fn peer_verify_mode(mut self, mode: PeerVerifyMode) -> Self {
        self.config.peer_verify_mode = mode;
        self
    }

    /// Set maximum peer chain depth (0 = engine default)
    pub fn peer_verify_depth(mut self, depth: u32) -> Self {
        self.config.peer_verify_depth = depth;
        self
    }

    /// Set persisted session ticket for resumption
    pub fn session_ticket(mut self, ticket: impl Into<Vec<u8>>) -> Self {
        self.config.session_ticket = ticket.into();
        self
    }

    /// Set Diffie-Hellman parameters
    pub fn dh_parameters(mut self, params: DiffieHellmanParameters) -> Self {
        self.config.dh_parameters = params;
        self
    }

    /// Set PSK identity hint (server role only)
    pub fn psk_identity_hint(mut self, hint: impl Into<String>) -> Self {
        self.config.psk_identity_hint = hint.into();
        self
    }

    /// Set requested curve groups (order is preference order)
    pub fn elliptic_curves(mut self, curves: Vec<EllipticCurve>) -> Self {
        self.config.elliptic_curves = curves;
        self
    }

    /// Bind a short ephemeral RSA key for export-grade cipher suites
    pub fn legacy_ephemeral_rsa(mut self, enable: bool) -> Self {
        self.config.legacy_ephemeral_rsa = enable;
        self
    }

    /// Build the configuration
    pub fn build(self) -> SecurityConfiguration {
        self.config
    }
}
