use std::env;
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;
use crate::errors::Result;

/// Environment variable naming the verification backend to use.
pub const BACKEND_ENV: &str = "PGPDIG_BACKEND";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Pure bignum arithmetic, always available.
    #[default]
    Builtin,
    /// The RustCrypto `rsa` and `p256`/`p384` crates.
    RustCrypto,
    /// The system OpenSSL library.
    OpenSsl,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Builtin => "builtin",
            BackendKind::RustCrypto => "rustcrypto",
            BackendKind::OpenSsl => "openssl",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<BackendKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "builtin" => Ok(BackendKind::Builtin),
            "rustcrypto" => Ok(BackendKind::RustCrypto),
            "openssl" => Ok(BackendKind::OpenSsl),
            other => Err(Error::Backend(format!("unrecognised backend: {:?}", other))),
        }
    }
}

/// Process-wide settings, fixed before the first verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_var(env::var(BACKEND_ENV).ok().as_deref())
    }

    fn from_var(value: Option<&str>) -> Result<Config> {
        let backend = match value {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => BackendKind::default(),
        };
        Ok(Config { backend })
    }
}
