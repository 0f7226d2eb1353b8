//! Elliptic curve groups

use std::fmt;

use openssl::nid::Nid;

/// Named elliptic curve group, identified by its OpenSSL NID
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EllipticCurve(Nid);

impl EllipticCurve {
    /// Curve bound when the engine cannot pick one automatically
    pub const FALLBACK: EllipticCurve = EllipticCurve(Nid::X9_62_PRIME256V1);

    pub const PRIME256V1: EllipticCurve = EllipticCurve(Nid::X9_62_PRIME256V1);
    pub const SECP384R1: EllipticCurve = EllipticCurve(Nid::SECP384R1);
    pub const SECP521R1: EllipticCurve = EllipticCurve(Nid::SECP521R1);

    pub fn from_nid(nid: Nid) -> Self {
        EllipticCurve(nid)
    }

    /// Look up a curve by short name (e.g. "prime256v1", "secp384r1")
    pub fn from_short_name(name: &str) -> Option<Self> {
        let nid = Nid::from_raw(short_name_to_raw(name)?);
        Some(EllipticCurve(nid))
    }

    pub fn nid(&self) -> Nid {
        self.0
    }

    /// OpenSSL short name, `None` for an unknown NID
    pub fn short_name(&self) -> Option<&'static str> {
        self.0.short_name().ok()
    }
}

fn short_name_to_raw(name: &str) -> Option<i32> {
    let c_name = std::ffi::CString::new(name).ok()?;
    // SAFETY: OBJ_sn2nid only reads the NUL-terminated string
    let raw = unsafe { openssl_sys::OBJ_sn2nid(c_name.as_ptr()) };
    (raw != 0).then_some(raw)
}

impl fmt::Debug for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name() {
            Some(name) => write!(f, "EllipticCurve({})", name),
            None => write!(f, "EllipticCurve(nid {})", self.0.as_raw()),
        }
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "nid {}", self.0.as_raw()),
        }
    }
}
