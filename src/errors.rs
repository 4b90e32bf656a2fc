use thiserror::Error;

use crate::config::BackendKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("not supported: digest algorithm {0}")]
    UnsupportedDigest(u8),

    #[error("not supported: public key algorithm {0}")]
    UnsupportedPubkey(u8),

    #[error("not supported: hash algorithm {hash} for {family} signatures")]
    UnsupportedHash { family: &'static str, hash: u8 },

    #[error("not supported: {backend} backend cannot {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("armor: {0}")]
    Armor(#[from] ArmorError),

    #[error("HMAC keyed after data was hashed")]
    HmacTooLate,

    #[error("verify called before a digest was bound")]
    Unbound,

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("backend {0:?} was not compiled into this build")]
    BackendUnavailable(BackendKind),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Failures from unwrapping ASCII armor.
///
/// Each kind carries the negative status code historically used for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum ArmorError {
    #[error("no BEGIN PGP line found")]
    NoBegin,
    #[error("unknown armor type")]
    UnknownType,
    #[error("missing or mismatched END PGP line")]
    NoEnd,
    #[error("armor checksum is not valid base64")]
    CrcDecode,
    #[error("armor body is not valid base64")]
    BodyDecode,
    #[error("armor checksum does not match body")]
    CrcMismatch,
}

impl ArmorError {
    pub fn code(self) -> i32 {
        match self {
            ArmorError::NoBegin => -1,
            ArmorError::UnknownType => -2,
            ArmorError::NoEnd => -4,
            ArmorError::CrcDecode => -5,
            ArmorError::BodyDecode => -6,
            ArmorError::CrcMismatch => -7,
        }
    }
}

/// Like `anyhow::bail!`, but for decoder failures.
macro_rules! malformed {
    ($($arg:tt)*) => {
        return Err($crate::errors::Error::Malformed(format!($($arg)*)))
    };
}

/// Like `anyhow::ensure!`, but for decoder failures.
macro_rules! ensure_well_formed {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            malformed!($($arg)*);
        }
    };
}
