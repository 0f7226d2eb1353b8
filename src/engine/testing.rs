//! In-memory engine recording every call, for builder tests

use std::cell::Cell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use openssl::ssl::SslOptions;

use super::{
    DhBindError, Engine, EngineCapabilities, EngineContext, EngineMethod, KeyBindError,
    VerifyPolicy,
};
use crate::cert::{Certificate, PrivateKey};
use crate::curve::EllipticCurve;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Options(SslOptions),
    ReleaseBuffers,
    CipherList(String),
    TrustAnchor(String),
    TrustDirectory(PathBuf),
    Certificate(String),
    PrivateKey(String),
    CheckPrivateKey,
    ChainCertificate(String),
    Verify { strict: bool, callback: bool },
    VerifyDepth(u32),
    SessionTicket(Vec<u8>),
    TmpDh(usize),
    TmpRsa(u32),
    AutoCurve,
    TmpEcdh(EllipticCurve),
    Curves(Vec<EllipticCurve>),
    PskHint(String),
}

/// Engine whose operations succeed unless named in `failing`
pub(crate) struct RecordingEngine {
    pub capabilities: EngineCapabilities,
    pub failing: HashSet<&'static str>,
    /// Allocations that fail before one succeeds
    pub allocation_failures: Cell<u32>,
    pub reinit_ok: bool,
    pub allocations: Cell<u32>,
    pub reinits: Cell<u32>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        RecordingEngine {
            capabilities: EngineCapabilities::all(),
            failing: HashSet::new(),
            allocation_failures: Cell::new(0),
            reinit_ok: true,
            allocations: Cell::new(0),
            reinits: Cell::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }
}

impl Engine for RecordingEngine {
    type Context = RecordingContext;

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn new_context(&self, method: EngineMethod) -> Result<RecordingContext, EngineError> {
        self.allocations.set(self.allocations.get() + 1);
        if self.allocation_failures.get() > 0 {
            self.allocation_failures.set(self.allocation_failures.get() - 1);
            return Err(EngineError::new("library has no ciphers"));
        }
        Ok(RecordingContext {
            method,
            failing: self.failing.clone(),
            calls: Vec::new(),
        })
    }

    fn reinitialize(&self) -> bool {
        self.reinits.set(self.reinits.get() + 1);
        self.reinit_ok
    }
}

#[derive(Debug)]
pub(crate) struct RecordingContext {
    pub method: EngineMethod,
    pub failing: HashSet<&'static str>,
    pub calls: Vec<Call>,
}

impl RecordingContext {
    fn step(&mut self, op: &'static str, call: Call) -> Result<(), EngineError> {
        self.calls.push(call);
        if self.failing.contains(op) {
            return Err(EngineError::new(format!("{} rejected", op)));
        }
        Ok(())
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl EngineContext for RecordingContext {
    type Key = String;
    type Native = RecordingContext;

    fn set_options(&mut self, options: SslOptions) {
        self.calls.push(Call::Options(options));
    }

    fn release_buffers(&mut self) {
        self.calls.push(Call::ReleaseBuffers);
    }

    fn set_cipher_list(&mut self, ciphers: &str) -> Result<(), EngineError> {
        self.step("cipher_list", Call::CipherList(ciphers.to_string()))
    }

    fn add_trust_anchor(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        self.step("trust_anchor", Call::TrustAnchor(cert.subject_common_name()))
    }

    fn add_trust_directory(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.step("trust_directory", Call::TrustDirectory(dir.to_path_buf()))
    }

    fn use_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        self.step("certificate", Call::Certificate(cert.subject_common_name()))
    }

    fn native_key(&self, key: &PrivateKey) -> Result<String, EngineError> {
        if self.failing.contains("native_key") {
            return Err(EngineError::new("native_key rejected"));
        }
        Ok(format!("{:?}", key.algorithm()))
    }

    fn use_private_key(&mut self, key: &String) -> Result<(), KeyBindError> {
        self.calls.push(Call::PrivateKey(key.clone()));
        if self.failing.contains("key_mismatch") {
            return Err(KeyBindError::Mismatch(EngineError::new("key values mismatch")));
        }
        if self.failing.contains("private_key") {
            return Err(KeyBindError::Load(EngineError::new("private_key rejected")));
        }
        Ok(())
    }

    fn check_private_key(&self) -> Result<(), EngineError> {
        if self.failing.contains("check_private_key") {
            return Err(EngineError::new("key values mismatch"));
        }
        Ok(())
    }

    fn add_chain_certificate(&mut self, cert: &Certificate) -> Result<(), EngineError> {
        self.step("chain", Call::ChainCertificate(cert.subject_common_name()))
    }

    fn set_verify(&mut self, policy: VerifyPolicy) {
        let call = match policy {
            VerifyPolicy::AcceptAny => Call::Verify {
                strict: false,
                callback: false,
            },
            VerifyPolicy::Strict(cb) => Call::Verify {
                strict: true,
                callback: cb.is_some(),
            },
        };
        self.calls.push(call);
    }

    fn set_verify_depth(&mut self, depth: u32) {
        self.calls.push(Call::VerifyDepth(depth));
    }

    fn set_session_ticket(&mut self, ticket: &[u8]) {
        self.calls.push(Call::SessionTicket(ticket.to_vec()));
    }

    fn set_tmp_dh(&mut self, der: &[u8]) -> Result<(), DhBindError> {
        self.calls.push(Call::TmpDh(der.len()));
        if self.failing.contains("dh_decode") {
            return Err(DhBindError::Decode(EngineError::new("bad DER")));
        }
        if self.failing.contains("dh_bind") {
            return Err(DhBindError::Bind(EngineError::new("dh key too small")));
        }
        Ok(())
    }

    fn set_tmp_rsa(&mut self, bits: u32) -> Result<(), EngineError> {
        self.step("tmp_rsa", Call::TmpRsa(bits))
    }

    fn enable_auto_curve(&mut self) {
        self.calls.push(Call::AutoCurve);
    }

    fn set_tmp_ecdh(&mut self, curve: EllipticCurve) -> Result<(), EngineError> {
        self.step("tmp_ecdh", Call::TmpEcdh(curve))
    }

    fn set_curves(&mut self, curves: &[EllipticCurve]) -> Result<(), EngineError> {
        self.step("curves", Call::Curves(curves.to_vec()))
    }

    fn set_psk_identity_hint(&mut self, hint: &str) -> Result<(), EngineError> {
        self.step("psk_hint", Call::PskHint(hint.to_string()))
    }

    fn finish(self) -> RecordingContext {
        self
    }
}
