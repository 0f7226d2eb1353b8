//! Process-wide TLS defaults
//!
//! The default cipher list, the on-demand trust loading switch and the
//! platform trust directories are installed once at startup and only read
//! afterwards. Builds that need other values pass an explicit [`SslDefaults`]
//! to the context builder instead of mutating the global set.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Cipher list used when neither the configuration nor the installed defaults
/// name any cipher
pub const FALLBACK_CIPHERS: &[&str] = &["DEFAULT"];

/// Directories searched for root certificates on Unix systems
pub const UNIX_ROOT_CERT_DIRECTORIES: &[&str] = &[
    "/etc/ssl/certs/",
    "/usr/lib/ssl/certs/",
    "/usr/share/ssl/",
    "/usr/local/ssl/",
    "/var/ssl/certs/",
    "/usr/local/ssl/certs/",
    "/etc/openssl/certs/",
    "/opt/openssl/certs/",
    "/etc/ssl/",
];

static GLOBAL: OnceLock<SslDefaults> = OnceLock::new();

/// Process-wide defaults consulted by every context build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslDefaults {
    pub(crate) default_ciphers: Vec<String>,
    pub(crate) load_root_certs_on_demand: bool,
    pub(crate) root_cert_directories: Vec<PathBuf>,
}

impl Default for SslDefaults {
    fn default() -> Self {
        SslDefaults {
            default_ciphers: FALLBACK_CIPHERS.iter().map(|c| c.to_string()).collect(),
            load_root_certs_on_demand: cfg!(unix),
            root_cert_directories: UNIX_ROOT_CERT_DIRECTORIES
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

impl SslDefaults {
    /// Set the default cipher list (order is priority order)
    pub fn default_ciphers<I, S>(mut self, ciphers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_ciphers = ciphers.into_iter().map(Into::into).collect();
        self
    }

    /// Enable/disable lazy lookup of root certificates in trust directories
    pub fn load_root_certs_on_demand(mut self, enable: bool) -> Self {
        self.load_root_certs_on_demand = enable;
        self
    }

    /// Set the trust directories registered for on-demand lookup
    pub fn root_cert_directories<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.root_cert_directories = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn ciphers(&self) -> &[String] {
        &self.default_ciphers
    }

    pub fn loads_root_certs_on_demand(&self) -> bool {
        self.load_root_certs_on_demand
    }

    pub fn root_cert_dirs(&self) -> &[PathBuf] {
        &self.root_cert_directories
    }

    /// Install the process-wide defaults.
    ///
    /// Only the first call wins; later calls hand their value back as `Err`.
    pub fn install(self) -> Result<(), SslDefaults> {
        GLOBAL.set(self)
    }

    /// Process-wide defaults, built-in values if nothing was installed
    pub fn global() -> &'static SslDefaults {
        GLOBAL.get_or_init(SslDefaults::default)
    }
}
