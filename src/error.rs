//! Build outcomes and errors

use std::fmt;

/// Terminal outcome of a context build.
///
/// Exactly one outcome is recorded per build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOutcome {
    NoError,
    UnsupportedProtocol,
    EngineInitFailed,
    InvalidCipherList,
    MissingPrivateKey,
    CertificateLoadFailed,
    KeyLoadFailed,
    KeyCertificateMismatch,
    InvalidDhParameters,
    /// The legacy ephemeral RSA key was requested but could not be bound
    EphemeralKeyFailed,
    CurveSelectionFailed,
}

impl ErrorOutcome {
    /// Get outcome as string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorOutcome::NoError => "no error",
            ErrorOutcome::UnsupportedProtocol => "unsupported protocol",
            ErrorOutcome::EngineInitFailed => "engine initialization failed",
            ErrorOutcome::InvalidCipherList => "invalid cipher list",
            ErrorOutcome::MissingPrivateKey => "missing private key",
            ErrorOutcome::CertificateLoadFailed => "certificate load failed",
            ErrorOutcome::KeyLoadFailed => "private key load failed",
            ErrorOutcome::KeyCertificateMismatch => "private key does not match certificate",
            ErrorOutcome::InvalidDhParameters => "invalid Diffie-Hellman parameters",
            ErrorOutcome::EphemeralKeyFailed => "ephemeral key setup failed",
            ErrorOutcome::CurveSelectionFailed => "elliptic curve selection failed",
        }
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic text reported by the cryptographic engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        EngineError(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<openssl::error::ErrorStack> for EngineError {
    fn from(stack: openssl::error::ErrorStack) -> Self {
        EngineError(stack.to_string())
    }
}

/// A failed context build.
///
/// If the engine context had already been allocated when the build stopped,
/// the partially configured context is handed back in `partial` so the caller
/// owns its cleanup.
#[derive(thiserror::Error)]
#[error("{message}")]
pub struct BuildError<C> {
    pub code: ErrorOutcome,
    pub message: String,
    pub partial: Option<C>,
}

impl<C> BuildError<C> {
    pub(crate) fn new(code: ErrorOutcome, message: impl Into<String>) -> Self {
        BuildError {
            code,
            message: message.into(),
            partial: None,
        }
    }

    pub(crate) fn with_partial(mut self, partial: C) -> Self {
        self.partial = Some(partial);
        self
    }

    /// Drop the partial context, keeping only code and message
    pub fn into_parts(self) -> (ErrorOutcome, String) {
        (self.code, self.message)
    }
}

impl<C> fmt::Debug for BuildError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("partial", &self.partial.is_some())
            .finish()
    }
}
