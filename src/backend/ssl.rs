use openssl::bn::BigNum;
use openssl::bn::BigNumContext;
use openssl::dsa::Dsa;
use openssl::dsa::DsaSig;
use openssl::ec::EcGroup;
use openssl::ec::EcKey;
use openssl::ec::EcPoint;
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use openssl::rsa::Rsa;
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

/// RSA, DSA and ECDSA through the system OpenSSL.
pub struct OpenSsl;

impl Backend for OpenSsl {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenSsl
    }

    fn init(&self) -> Box<dyn BackendState> {
        openssl::init();
        Box::new(OpenSslState::default())
    }
}

enum Pending {
    Rsa(Zeroizing<Vec<u8>>),
    Dsa(Zeroizing<Vec<u8>>),
    Ecdsa(Zeroizing<Vec<u8>>),
}

#[derive(Default)]
struct OpenSslState {
    items: Vec<(MpiItem, Vec<u8>)>,
    pending: Option<Pending>,
}

fn ssl_err(e: ErrorStack) -> Error {
    Error::Backend(e.to_string())
}

impl BackendState for OpenSslState {
    fn name(&self) -> &'static str {
        "openssl"
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
            Some(Pending::Dsa(ref digest)) => self.verify_dsa(digest),
            Some(Pending::Ecdsa(ref digest)) => self.verify_ecdsa(digest),
            None => Err(Error::Unbound),
        }
    }

    fn mpi_item(&mut self, item: MpiItem, value: &[u8]) -> Result<()> {
        self.items.retain(|(existing, _)| *existing != item);
        self.items.push((item, value.to_vec()));
        Ok(())
    }

    fn clean(&mut self) {
        *self = OpenSslState::default();
    }
}

impl OpenSslState {
    fn raw(&self, item: MpiItem) -> Result<&[u8]> {
        self.items
            .iter()
            .find(|(existing, _)| *existing == item)
            .map(|(_, value)| value.as_slice())
            .ok_or_else(|| Error::Backend(format!("missing {:?}", item)))
    }

    fn bn(&self, item: MpiItem) -> Result<BigNum> {
        BigNum::from_slice(self.raw(item)?).map_err(ssl_err)
    }

    fn verify_rsa(&self, digest_info: &[u8]) -> Result<bool> {
        let rsa = Rsa::from_public_components(self.bn(MpiItem::RsaN)?, self.bn(MpiItem::RsaE)?)
            .map_err(ssl_err)?;
        let len = usize::try_from(rsa.size()).map_err(|e| Error::Backend(e.to_string()))?;

        let sig = match mpi::pad_to(self.raw(MpiItem::RsaM)?, len) {
            Some(sig) => sig,
            None => return Ok(false),
        };

        let mut recovered = Zeroizing::new(vec![0u8; len]);
        let found = match rsa.public_decrypt(&sig, &mut recovered, Padding::PKCS1) {
            Ok(found) => found,
            Err(_) => return Ok(false),
        };

        Ok(&recovered[..found] == digest_info)
    }

    fn verify_dsa(&self, digest: &[u8]) -> Result<bool> {
        let dsa = Dsa::from_public_components(
            self.bn(MpiItem::DsaP)?,
            self.bn(MpiItem::DsaQ)?,
            self.bn(MpiItem::DsaG)?,
            self.bn(MpiItem::DsaY)?,
        )
        .map_err(ssl_err)?;
        let sig = DsaSig::from_private_components(self.bn(MpiItem::DsaR)?, self.bn(MpiItem::DsaS)?)
            .map_err(ssl_err)?;
        let der = sig.to_der().map_err(ssl_err)?;

        let key = PKey::from_dsa(dsa).map_err(ssl_err)?;
        let mut ctx = PkeyCtx::new(&key).map_err(ssl_err)?;
        ctx.verify_init().map_err(ssl_err)?;
        Ok(ctx.verify(digest, &der).unwrap_or(false))
    }

    fn verify_ecdsa(&self, digest: &[u8]) -> Result<bool> {
        let curve = self.raw(MpiItem::EcdsaCurve)?;
        let nid = if curve == NIST_P256 {
            Nid::X9_62_PRIME256V1
        } else if curve == NIST_P384 {
            Nid::SECP384R1
        } else {
            return Err(Error::Unsupported {
                backend: "openssl",
                operation: "verify on this curve",
            });
        };

        let group = EcGroup::from_curve_name(nid).map_err(ssl_err)?;
        let mut bn_ctx = BigNumContext::new().map_err(ssl_err)?;
        let point = match EcPoint::from_bytes(&group, self.raw(MpiItem::EcdsaQ)?, &mut bn_ctx) {
            Ok(point) => point,
            Err(_) => return Ok(false),
        };
        let key = EcKey::from_public_key(&group, &point).map_err(ssl_err)?;
        let sig = EcdsaSig::from_private_components(
            self.bn(MpiItem::EcdsaR)?,
            self.bn(MpiItem::EcdsaS)?,
        )
        .map_err(ssl_err)?;

        Ok(sig.verify(digest, &key).unwrap_or(false))
    }
}
