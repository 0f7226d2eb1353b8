//! Engine option mask
//!
//! Bug workarounds and protocol floors are expressed as one option mask,
//! derived only from the protocol selector and the configured switches.

use openssl::ssl::SslOptions as EngineOptions;

use crate::config::{Protocol, SslOptions};

/// Compute the option mask applied to a freshly allocated context
pub fn option_mask(protocol: Protocol, options: &SslOptions) -> EngineOptions {
    let mut mask = EngineOptions::ALL;

    // "Or later" selectors resolve to the broadest method; the floor is set here
    match protocol {
        Protocol::TlsV1SslV3 => {
            mask |= EngineOptions::NO_SSLV2;
        }
        Protocol::SecureProtocols | Protocol::TlsV1_0OrLater => {
            mask |= EngineOptions::NO_SSLV2 | EngineOptions::NO_SSLV3;
        }
        Protocol::TlsV1_1OrLater => {
            mask |= EngineOptions::NO_SSLV2 | EngineOptions::NO_SSLV3 | EngineOptions::NO_TLSV1;
        }
        Protocol::TlsV1_2OrLater => {
            mask |= EngineOptions::NO_SSLV2
                | EngineOptions::NO_SSLV3
                | EngineOptions::NO_TLSV1
                | EngineOptions::NO_TLSV1_1;
        }
        _ => {}
    }

    // Off by default in ALL on some engines, so set or clear explicitly
    mask.set(
        EngineOptions::DONT_INSERT_EMPTY_FRAGMENTS,
        options.disable_empty_fragments,
    );
    mask.set(
        EngineOptions::ALLOW_UNSAFE_LEGACY_RENEGOTIATION,
        !options.disable_legacy_renegotiation,
    );

    if options.disable_session_tickets {
        mask |= EngineOptions::NO_TICKET;
    }
    if options.disable_compression {
        mask |= EngineOptions::NO_COMPRESSION;
    }
    if !options.disable_server_cipher_preference {
        mask |= EngineOptions::CIPHER_SERVER_PREFERENCE;
    }

    mask
}
