//! Signature verification providers.
//!
//! Exactly one provider is active per process. Callers only see the
//! [`Backend`] and [`BackendState`] traits, so the packet decoder and the
//! digest registry never depend on a particular crypto library.

use log::debug;
use log::warn;
use once_cell::sync::OnceCell;
use zeroize::Zeroizing;

use crate::config::BackendKind;
use crate::config::Config;
use crate::dig::DigParams;
use crate::digestable::DigestContext;
use crate::digestable::Encoding;
use crate::errors::Error;
use crate::errors::Result;
use crate::packets::PubkeyAlgorithm;

mod builtin;
#[cfg(feature = "openssl")]
mod ssl;
#[cfg(feature = "rustcrypto")]
mod rustcrypto;

/// Which multiprecision field of a packet is being handed over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MpiItem {
    RsaM = 10,
    DsaR = 20,
    DsaS = 21,
    RsaN = 30,
    RsaE = 31,
    DsaP = 40,
    DsaQ = 41,
    DsaG = 42,
    DsaY = 43,
    EcdsaR = 50,
    EcdsaS = 51,
    EcdsaCurve = 60,
    EcdsaQ = 61,
}

/// Signature algorithm families a provider may support.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    Rsa,
    Dsa,
    Ecdsa,
}

impl Family {
    pub fn of(algo: PubkeyAlgorithm) -> Option<Family> {
        match algo {
            PubkeyAlgorithm::Rsa | PubkeyAlgorithm::RsaSign => Some(Family::Rsa),
            PubkeyAlgorithm::Dsa => Some(Family::Dsa),
            PubkeyAlgorithm::Ecdsa => Some(Family::Ecdsa),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Rsa => "RSA",
            Family::Dsa => "DSA",
            Family::Ecdsa => "ECDSA",
        }
    }
}

/// A crypto provider.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Allocate the per-transaction state.
    fn init(&self) -> Box<dyn BackendState>;

    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Provider state for one verification.
///
/// `set_*` binds a finished digest, returning `false` if the digest's
/// leading 16 bits disagree with the signature's check value. `verify` is
/// only meaningful after a successful `set_*`.
pub trait BackendState: Send {
    fn name(&self) -> &'static str;

    fn set_rsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool>;
    fn set_dsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool>;
    fn set_ecdsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool>;

    fn verify(&mut self) -> Result<bool>;

    fn sign(&mut self) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "sign",
        })
    }

    fn generate(&mut self) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "generate keys",
        })
    }

    /// Absorb one MPI from a signature or key packet.
    fn mpi_item(&mut self, item: MpiItem, value: &[u8]) -> Result<()>;

    /// Drop everything absorbed so far.
    fn clean(&mut self);

    fn set(&mut self, family: Family, ctx: DigestContext, sigp: &DigParams) -> Result<bool> {
        match family {
            Family::Rsa => self.set_rsa(ctx, sigp),
            Family::Dsa => self.set_dsa(ctx, sigp),
            Family::Ecdsa => self.set_ecdsa(ctx, sigp),
        }
    }
}

/// A digest that has been finalized for a signature.
pub(crate) struct Bound {
    pub digest: Zeroizing<Vec<u8>>,
    /// `DigestInfo` prefix, if the algorithm has one.
    pub asn1: Option<Vec<u8>>,
    pub quick_check: bool,
}

impl Bound {
    /// Finalize `ctx` and compare against the signature's 16-bit check value.
    pub fn new(ctx: DigestContext, sigp: &DigParams) -> Bound {
        let asn1 = ctx.asn1().and_then(|prefix| hex::decode(prefix).ok());
        let name = ctx.name();
        let digest = Zeroizing::new(ctx.finalize(Encoding::Binary));
        let quick_check = digest.len() >= 2 && digest[..2] == sigp.signhash16;
        if !quick_check {
            warn!(
                "{} digest starts {}, signature expects {}",
                name,
                hex::encode(&digest[..digest.len().min(2)]),
                hex::encode(sigp.signhash16)
            );
        }
        Bound {
            digest,
            asn1,
            quick_check,
        }
    }

    /// `DigestInfo || digest`, as wrapped inside a PKCS#1 v1.5 signature.
    pub fn digest_info(&self, family: Family, sigp: &DigParams) -> Result<Zeroizing<Vec<u8>>> {
        let prefix = self.asn1.as_ref().ok_or(Error::UnsupportedHash {
            family: family.name(),
            hash: sigp.hash_algo,
        })?;
        let mut ret = Zeroizing::new(Vec::with_capacity(prefix.len() + self.digest.len()));
        ret.extend_from_slice(prefix);
        ret.extend_from_slice(&self.digest);
        Ok(ret)
    }
}

static BUILTIN: builtin::Builtin = builtin::Builtin;
#[cfg(feature = "rustcrypto")]
static RUSTCRYPTO: rustcrypto::RustCrypto = rustcrypto::RustCrypto;
#[cfg(feature = "openssl")]
static OPENSSL: ssl::OpenSsl = ssl::OpenSsl;

static ACTIVE: OnceCell<&'static dyn Backend> = OnceCell::new();

/// The provider for a kind, if it was compiled in.
pub fn backend_for(kind: BackendKind) -> Result<&'static dyn Backend> {
    match kind {
        BackendKind::Builtin => Ok(&BUILTIN),
        #[cfg(feature = "rustcrypto")]
        BackendKind::RustCrypto => Ok(&RUSTCRYPTO),
        #[cfg(feature = "openssl")]
        BackendKind::OpenSsl => Ok(&OPENSSL),
        #[allow(unreachable_patterns)]
        other => Err(Error::BackendUnavailable(other)),
    }
}

/// Select the process-wide provider. Selecting a different one later fails.
pub fn install(config: &Config) -> Result<&'static dyn Backend> {
    let wanted = backend_for(config.backend)?;
    let active = *ACTIVE.get_or_init(|| {
        debug!("verification backend: {}", wanted.name());
        wanted
    });
    if active.kind() != wanted.kind() {
        return Err(Error::Backend(format!(
            "{} already installed, cannot switch to {}",
            active.name(),
            wanted.name()
        )));
    }
    Ok(active)
}

/// The process-wide provider, chosen from the environment on first use.
pub fn active() -> Result<&'static dyn Backend> {
    if let Some(active) = ACTIVE.get() {
        return Ok(*active);
    }
    install(&Config::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::backend_for;
    use super::Family;
    use crate::config::BackendKind;
    use crate::packets::PubkeyAlgorithm;

    #[test]
    fn families() {
        assert_eq!(Some(Family::Rsa), Family::of(PubkeyAlgorithm::Rsa));
        assert_eq!(Some(Family::Dsa), Family::of(PubkeyAlgorithm::Dsa));
        assert_eq!(Some(Family::Ecdsa), Family::of(PubkeyAlgorithm::Ecdsa));
        assert_eq!(None, Family::of(PubkeyAlgorithm::Elgamal));
        assert_eq!(None, Family::of(PubkeyAlgorithm::EdDsa));
    }

    #[test]
    fn builtin_always_there() {
        let backend = backend_for(BackendKind::Builtin).unwrap();
        assert_eq!("builtin", backend.name());
        let mut state = backend.init();
        assert!(state.sign().is_err());
        assert!(state.generate().is_err());
        assert!(state.verify().is_err());
    }

    #[cfg(not(feature = "openssl"))]
    #[test]
    fn missing_provider() {
        assert!(backend_for(BackendKind::OpenSsl).is_err());
    }
}
