//! Diffie-Hellman parameters
//!
//! Parameters are kept as DER bytes together with the result of their
//! validation. An empty parameter set means "no DH requested".

use openssl::dh::Dh;
use openssl::error::ErrorStack;

/// Validation result of a DH parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhValidity {
    Valid,
    /// Input could not be decoded as DH parameters
    InvalidInputData,
    /// Input decoded but was rejected as unsafe by the configuration layer
    UnsafeParameters,
}

/// Reason a DH parameter set was rejected by the configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhRejection {
    InvalidInputData,
    UnsafeParameters,
}

impl From<DhRejection> for DhValidity {
    fn from(reason: DhRejection) -> Self {
        match reason {
            DhRejection::InvalidInputData => DhValidity::InvalidInputData,
            DhRejection::UnsafeParameters => DhValidity::UnsafeParameters,
        }
    }
}

/// DER-encoded Diffie-Hellman parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffieHellmanParameters {
    der: Vec<u8>,
    validity: DhValidity,
}

impl DiffieHellmanParameters {
    /// No parameters; DH setup is skipped
    pub fn empty() -> Self {
        DiffieHellmanParameters {
            der: Vec::new(),
            validity: DhValidity::Valid,
        }
    }

    /// Parse DER-encoded PKCS#3 parameters
    pub fn from_der(der: &[u8]) -> Self {
        let validity = if is_der_sequence(der) && Dh::params_from_der(der).is_ok() {
            DhValidity::Valid
        } else {
            DhValidity::InvalidInputData
        };

        DiffieHellmanParameters {
            der: der.to_vec(),
            validity,
        }
    }

    /// Parse PEM-encoded PKCS#3 parameters
    pub fn from_pem(pem: &[u8]) -> Self {
        match Dh::params_from_pem(pem).and_then(|dh| dh.params_to_der()) {
            Ok(der) => Self::from_der(&der),
            Err(_) => DiffieHellmanParameters {
                der: pem.to_vec(),
                validity: DhValidity::InvalidInputData,
            },
        }
    }

    /// 2048-bit group with 256-bit subgroup from RFC 5114
    pub fn default_parameters() -> Result<Self, ErrorStack> {
        let der = Dh::get_2048_256()?.params_to_der()?;
        Ok(Self::from_der(&der))
    }

    /// Parameters flagged as rejected by the configuration layer.
    ///
    /// `Valid` is only ever produced by decoding, so a rejected set can never
    /// pass validation.
    pub fn rejected(der: impl Into<Vec<u8>>, reason: DhRejection) -> Self {
        DiffieHellmanParameters {
            der: der.into(),
            validity: reason.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.der.is_empty() && self.validity == DhValidity::Valid
    }

    pub fn is_valid(&self) -> bool {
        self.validity == DhValidity::Valid && (self.der.is_empty() || is_der_sequence(&self.der))
    }

    pub fn validity(&self) -> DhValidity {
        self.validity
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl Default for DiffieHellmanParameters {
    fn default() -> Self {
        Self::empty()
    }
}

/// Check that `der` is exactly one DER SEQUENCE with a consistent length
pub(crate) fn is_der_sequence(der: &[u8]) -> bool {
    if der.len() < 2 || der[0] != 0x30 {
        return false;
    }

    let first = der[1];
    let (len, header) = if first < 0x80 {
        (first as usize, 2)
    } else {
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 || der.len() < 2 + count {
            return false;
        }
        let len = der[2..2 + count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, 2 + count)
    };

    header + len == der.len()
}
