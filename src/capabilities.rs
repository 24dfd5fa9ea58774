//! Typed capability view for downstream subsystems
//!
//! Codec, transport and protocol layers read the resolved configuration once
//! at initialization to pick implementation variants. Unknown flags fall back
//! to the documented library default; type mismatches are propagated.

use serde::Serialize;

use crate::builtin::CPU_ARCH_FLAGS;
use crate::detect::{self, Endianness};
use crate::resolved::{LookupError, ResolvedConfiguration};

/// TLS socket implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsBackend {
    /// TLS sockets disabled
    None,
    OpenSsl,
    GnuTls,
    Darwin,
    Apple,
    Schannel,
    MbedTls,
    /// Symbol this crate does not know about
    Other(String),
}

impl TlsBackend {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "PJ_SSL_SOCK_IMP_NONE" => TlsBackend::None,
            "PJ_SSL_SOCK_IMP_OPENSSL" => TlsBackend::OpenSsl,
            "PJ_SSL_SOCK_IMP_GNUTLS" => TlsBackend::GnuTls,
            "PJ_SSL_SOCK_IMP_DARWIN" => TlsBackend::Darwin,
            "PJ_SSL_SOCK_IMP_APPLE" => TlsBackend::Apple,
            "PJ_SSL_SOCK_IMP_SCHANNEL" => TlsBackend::Schannel,
            "PJ_SSL_SOCK_IMP_MBEDTLS" => TlsBackend::MbedTls,
            other => TlsBackend::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub little_endian: bool,

    /// Winning `PJ_M_*` flag, if any
    pub arch: Option<String>,

    pub tls: TlsBackend,
    pub video: bool,
    pub video_toolbox: bool,
    pub iphone: bool,
    pub check_stack: bool,
    pub dont_switch_to_tcp: bool,
}

/// Read a boolean, treating an unknown flag as `fallback`.
fn bool_or(config: &ResolvedConfiguration, name: &str, fallback: bool) -> Result<bool, LookupError> {
    match config.get_bool(name) {
        Err(LookupError::UnknownFlag(_)) => Ok(fallback),
        other => other,
    }
}

impl Capabilities {
    pub fn from_config(config: &ResolvedConfiguration) -> Result<Self, LookupError> {
        let host_little = detect::host_endianness() == Endianness::Little;
        let little_endian = match config.is_enabled(detect::LITTLE_ENDIAN) {
            Ok(little) => little,
            Err(LookupError::UnknownFlag(_)) => {
                // Only the big-endian flag may be known
                !bool_or(config, detect::BIG_ENDIAN, !host_little)?
            }
            Err(e) => return Err(e),
        };

        let mut arch = None;
        for flag in CPU_ARCH_FLAGS {
            if config.is_enabled(flag).unwrap_or(false) {
                arch = Some(flag.to_string());
                break;
            }
        }

        let tls = if bool_or(config, "PJ_HAS_SSL_SOCK", false)? {
            match config.get_symbol("PJ_SSL_SOCK_IMP") {
                Ok(symbol) => TlsBackend::from_symbol(symbol),
                Err(LookupError::UnknownFlag(_)) => TlsBackend::OpenSsl,
                Err(e) => return Err(e),
            }
        } else {
            TlsBackend::None
        };

        let video = bool_or(config, "PJMEDIA_HAS_VIDEO", false)?;

        Ok(Self {
            little_endian,
            arch,
            tls,
            video,
            video_toolbox: video && bool_or(config, "PJMEDIA_HAS_VID_TOOLBOX_CODEC", false)?,
            iphone: bool_or(config, "PJ_CONFIG_IPHONE", false)?,
            check_stack: bool_or(config, "PJ_OS_HAS_CHECK_STACK", false)?,
            dont_switch_to_tcp: bool_or(config, "PJSIP_DONT_SWITCH_TO_TCP", false)?,
        })
    }
}
