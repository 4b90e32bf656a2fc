use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::traits::PublicKeyParts;
use rsa::Pkcs1v15Sign;
use rsa::RsaPublicKey;
use zeroize::Zeroizing;

use super::Backend;
use super::BackendState;
use super::Bound;
use super::Family;
use super::MpiItem;
use crate::config::BackendKind;
use crate::dig::DigParams;
use crate::digestable::DigestContext;
use crate::errors::Error;
use crate::errors::Result;
use crate::mpi;

// https://tools.ietf.org/html/rfc6637#section-11
const NIST_P256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const NIST_P384: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x22];

/// RSA and ECDSA (P-256, P-384) through the RustCrypto crates.
pub struct RustCrypto;

impl Backend for RustCrypto {
    fn kind(&self) -> BackendKind {
        BackendKind::RustCrypto
    }

    fn init(&self) -> Box<dyn BackendState> {
        Box::new(RustCryptoState::default())
    }
}

enum Pending {
    Rsa(Zeroizing<Vec<u8>>),
    Ecdsa(Zeroizing<Vec<u8>>),
}

#[derive(Default)]
struct RustCryptoState {
    m: Option<Vec<u8>>,
    n: Option<Vec<u8>>,
    e: Option<Vec<u8>>,
    r: Option<Vec<u8>>,
    s: Option<Vec<u8>>,
    curve: Option<Vec<u8>>,
    point: Option<Vec<u8>>,
    pending: Option<Pending>,
}

fn need<'v>(val: &'v Option<Vec<u8>>, what: &str) -> Result<&'v [u8]> {
    val.as_deref()
        .ok_or_else(|| Error::Backend(format!("missing {}", what)))
}

impl BackendState for RustCryptoState {
    fn name(&self) -> &'static str {
        "rustcrypto"
    }

    fn set_rsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool> {
        self.pending = None;
        let bound = Bound::new(ctx, sigp);
        let info = bound.digest_info(Family::Rsa, sigp)?;
        if !bound.quick_check {
            return Ok(false);
        }
        self.pending = Some(Pending::Rsa(info));
        Ok(true)
    }

    fn set_dsa(&mut self, _ctx: DigestContext, _sigp: &DigParams) -> Result<bool> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "verify DSA signatures",
        })
    }

    fn set_ecdsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool> {
        self.pending = None;
        let bound = Bound::new(ctx, sigp);
        if !bound.quick_check {
            return Ok(false);
        }
        self.pending = Some(Pending::Ecdsa(bound.digest));
        Ok(true)
    }

    fn verify(&mut self) -> Result<bool> {
        match self.pending {
            Some(Pending::Rsa(ref info)) => self.verify_rsa(info),
            Some(Pending::Ecdsa(ref digest)) => self.verify_ecdsa(digest),
            None => Err(Error::Unbound),
        }
    }

    fn mpi_item(&mut self, item: MpiItem, value: &[u8]) -> Result<()> {
        let slot = match item {
            MpiItem::RsaM => &mut self.m,
            MpiItem::RsaN => &mut self.n,
            MpiItem::RsaE => &mut self.e,
            MpiItem::EcdsaR => &mut self.r,
            MpiItem::EcdsaS => &mut self.s,
            MpiItem::EcdsaCurve => &mut self.curve,
            MpiItem::EcdsaQ => &mut self.point,
            MpiItem::DsaR
            | MpiItem::DsaS
            | MpiItem::DsaP
            | MpiItem::DsaQ
            | MpiItem::DsaG
            | MpiItem::DsaY => return Ok(()),
        };
        *slot = Some(value.to_vec());
        Ok(())
    }

    fn clean(&mut self) {
        *self = RustCryptoState::default();
    }
}

impl RustCryptoState {
    fn verify_rsa(&self, digest_info: &[u8]) -> Result<bool> {
        let n = rsa::BigUint::from_bytes_be(need(&self.n, "RSA modulus")?);
        let e = rsa::BigUint::from_bytes_be(need(&self.e, "RSA exponent")?);
        let key = RsaPublicKey::new(n, e).map_err(|e| Error::Backend(e.to_string()))?;

        let sig = match mpi::pad_to(need(&self.m, "RSA signature")?, key.size()) {
            Some(sig) => sig,
            None => return Ok(false),
        };

        Ok(key
            .verify(Pkcs1v15Sign::new_unprefixed(), digest_info, &sig)
            .is_ok())
    }

    fn verify_ecdsa(&self, digest: &[u8]) -> Result<bool> {
        let curve = need(&self.curve, "ECDSA curve")?;
        let point = need(&self.point, "ECDSA public point")?;
        let r = need(&self.r, "ECDSA r")?;
        let s = need(&self.s, "ECDSA s")?;

        if curve == NIST_P256 {
            let key = match p256::ecdsa::VerifyingKey::from_sec1_bytes(point) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let (r, s) = match (mpi::pad_to(r, 32), mpi::pad_to(s, 32)) {
                (Some(r), Some(s)) => (r, s),
                _ => return Ok(false),
            };
            let sig = match p256::ecdsa::Signature::from_scalars(
                p256::FieldBytes::clone_from_slice(&r),
                p256::FieldBytes::clone_from_slice(&s),
            ) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            Ok(key.verify_prehash(digest, &sig).is_ok())
        } else if curve == NIST_P384 {
            let key = match p384::ecdsa::VerifyingKey::from_sec1_bytes(point) {
                Ok(key) => key,
                Err(_) => return Ok(false),
            };
            let (r, s) = match (mpi::pad_to(r, 48), mpi::pad_to(s, 48)) {
                (Some(r), Some(s)) => (r, s),
                _ => return Ok(false),
            };
            let sig = match p384::ecdsa::Signature::from_scalars(
                p384::FieldBytes::clone_from_slice(&r),
                p384::FieldBytes::clone_from_slice(&s),
            ) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            Ok(key.verify_prehash(digest, &sig).is_ok())
        } else {
            Err(Error::Unsupported {
                backend: "rustcrypto",
                operation: "verify on this curve",
            })
        }
    }
}
