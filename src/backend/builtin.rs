use num::BigUint;
use num::One;
use num::Zero;
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

/// RSA and DSA with plain bignum arithmetic.
pub struct Builtin;

impl Backend for Builtin {
    fn kind(&self) -> BackendKind {
        BackendKind::Builtin
    }

    fn init(&self) -> Box<dyn BackendState> {
        Box::new(BuiltinState::default())
    }
}

enum Pending {
    Rsa(Zeroizing<Vec<u8>>),
    Dsa(Zeroizing<Vec<u8>>),
}

#[derive(Default)]
struct BuiltinState {
    m: Option<BigUint>,
    n: Option<BigUint>,
    e: Option<BigUint>,
    r: Option<BigUint>,
    s: Option<BigUint>,
    p: Option<BigUint>,
    q: Option<BigUint>,
    g: Option<BigUint>,
    y: Option<BigUint>,
    pending: Option<Pending>,
}

fn need<'v>(val: &'v Option<BigUint>, what: &str) -> Result<&'v BigUint> {
    val.as_ref()
        .ok_or_else(|| Error::Backend(format!("missing {}", what)))
}

impl BackendState for BuiltinState {
    fn name(&self) -> &'static str {
        "builtin"
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

    fn set_dsa(&mut self, ctx: DigestContext, sigp: &DigParams) -> Result<bool> {
        self.pending = None;
        let bound = Bound::new(ctx, sigp);
        if !bound.quick_check {
            return Ok(false);
        }
        self.pending = Some(Pending::Dsa(bound.digest));
        Ok(true)
    }

    fn set_ecdsa(&mut self, _ctx: DigestContext, _sigp: &DigParams) -> Result<bool> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "verify ECDSA signatures",
        })
    }

    fn verify(&mut self) -> Result<bool> {
        match self.pending {
            Some(Pending::Rsa(ref info)) => self.verify_rsa(info),
            Some(Pending::Dsa(ref digest)) => self.verify_dsa(digest),
            None => Err(Error::Unbound),
        }
    }

    fn mpi_item(&mut self, item: MpiItem, value: &[u8]) -> Result<()> {
        let slot = match item {
            MpiItem::RsaM => &mut self.m,
            MpiItem::RsaN => &mut self.n,
            MpiItem::RsaE => &mut self.e,
            MpiItem::DsaR => &mut self.r,
            MpiItem::DsaS => &mut self.s,
            MpiItem::DsaP => &mut self.p,
            MpiItem::DsaQ => &mut self.q,
            MpiItem::DsaG => &mut self.g,
            MpiItem::DsaY => &mut self.y,
            MpiItem::EcdsaR | MpiItem::EcdsaS | MpiItem::EcdsaCurve | MpiItem::EcdsaQ => {
                return Ok(())
            }
        };
        *slot = Some(BigUint::from_bytes_be(value));
        Ok(())
    }

    fn clean(&mut self) {
        *self = BuiltinState::default();
    }
}

impl BuiltinState {
    // https://tools.ietf.org/html/rfc8017#section-8.2.2
    fn verify_rsa(&self, digest_info: &[u8]) -> Result<bool> {
        let m = need(&self.m, "RSA signature")?;
        let n = need(&self.n, "RSA modulus")?;
        let e = need(&self.e, "RSA exponent")?;

        if n.is_zero() || m >= n {
            return Ok(false);
        }

        let len = usize::try_from((n.bits() + 7) / 8)
            .map_err(|_| Error::Backend("RSA modulus too large".to_string()))?;
        let expected = emsa_pkcs1_v1_5(digest_info, len)?;

        let actual = match mpi::pad_to(&pow_mod(m, e, n).to_bytes_be(), len) {
            Some(actual) => Zeroizing::new(actual),
            None => return Ok(false),
        };

        Ok(actual.as_slice() == expected.as_slice())
    }

    // https://nvlpubs.nist.gov/nistpubs/FIPS/NIST.FIPS.186-4.pdf section 4.7
    fn verify_dsa(&self, digest: &[u8]) -> Result<bool> {
        let r = need(&self.r, "DSA r")?;
        let s = need(&self.s, "DSA s")?;
        let p = need(&self.p, "DSA p")?;
        let q = need(&self.q, "DSA q")?;
        let g = need(&self.g, "DSA g")?;
        let y = need(&self.y, "DSA y")?;

        if p <= &BigUint::one() || q <= &BigUint::one() {
            return Ok(false);
        }
        if r.is_zero() || r >= q || s.is_zero() || s >= q {
            return Ok(false);
        }

        // q is prime, so s^(q-2) is the inverse of s
        let w = pow_mod(s, &(q - BigUint::from(2u32)), q);
        let z = leftmost_bits(digest, q.bits());

        let u1 = (z * &w) % q;
        let u2 = (r * &w) % q;
        let v = ((pow_mod(g, &u1, p) * pow_mod(y, &u2, p)) % p) % q;

        Ok(&v == r)
    }
}

#[inline]
fn pow_mod(val: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    val.modpow(exp, modulus)
}

/// The hash as an integer, truncated to the bit length of the group order.
fn leftmost_bits(digest: &[u8], bits: u64) -> BigUint {
    let bytes = usize::try_from((bits + 7) / 8).unwrap_or(usize::MAX);
    let take = digest.len().min(bytes);
    let z = BigUint::from_bytes_be(&digest[..take]);
    let have = (take as u64) * 8;
    if have > bits {
        z >> (have - bits)
    } else {
        z
    }
}

/// `00 01 ff .. ff 00 || DigestInfo`, exactly `len` bytes long.
fn emsa_pkcs1_v1_5(digest_info: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>> {
    if len < digest_info.len() + 11 {
        return Err(Error::Backend(format!(
            "RSA modulus of {} bytes too short for a {} byte digest",
            len,
            digest_info.len()
        )));
    }

    let mut ret = Zeroizing::new(Vec::with_capacity(len));
    ret.push(0x00);
    ret.push(0x01);
    ret.resize(len - digest_info.len() - 1, 0xff);
    ret.push(0x00);
    ret.extend_from_slice(digest_info);
    Ok(ret)
}
