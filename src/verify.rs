use std::fmt;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use log::debug;
use log::info;
use log::warn;

use crate::backend::Family;
use crate::dig::Dig;
use crate::dig::DigParams;
use crate::digestable::DigestContext;
use crate::errors::Error;
use crate::errors::Result;

/// How a verification ended. Only hard failures are errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    /// No usable key, or the signature uses something we can't check.
    NoKey,
    /// The signature checks out, but against a key we don't trust.
    NotTrusted,
    Failed,
}

impl Outcome {
    pub fn name(self) -> &'static str {
        match self {
            Outcome::Ok => "OK",
            Outcome::NoKey => "NOKEY",
            Outcome::NotTrusted => "NOTTRUSTED",
            Outcome::Failed => "BAD",
        }
    }

    /// Which of two outcomes for the same signature to report.
    fn rank(self) -> u8 {
        match self {
            Outcome::NoKey => 0,
            Outcome::Failed => 1,
            Outcome::NotTrusted => 2,
            Outcome::Ok => 3,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A public key packet found for an issuer.
#[derive(Copy, Clone, Debug)]
pub struct FoundKey<'k> {
    /// One key packet, header included.
    pub packet: &'k [u8],
    pub trusted: bool,
}

/// Somewhere to find public keys by key id.
pub trait KeyLookup {
    /// Every key packet with this id. Ids can collide, so each is tried in turn.
    fn find(&self, keyid: &[u8; 8]) -> Vec<FoundKey<'_>>;
}

/// Check the signature held by `dig` over the payload hashed into `payload`.
///
/// `payload` is left untouched; a copy has the signature's own hashed
/// material appended. If `dig` holds no public key yet, one is fetched from
/// `keys` using the signature's issuer, and the best result over every
/// candidate is reported.
pub fn verify_signature(
    dig: &mut Dig,
    payload: &DigestContext,
    keys: &dyn KeyLookup,
) -> Result<Outcome> {
    let sigp = dig.signature().clone();
    if !sigp.is_populated() {
        debug!("no signature to verify");
        return Ok(Outcome::NoKey);
    }

    let family = match sigp.pubkey_algo.and_then(Family::of) {
        Some(family) => family,
        None => {
            debug!("can't verify {:?} signatures", sigp.pubkey_algo);
            return Ok(Outcome::NoKey);
        }
    };

    let algorithm = match sigp.hash_algorithm() {
        Some(algorithm) => algorithm,
        None => {
            debug!("can't verify signatures using hash {}", sigp.hash_algo);
            return Ok(Outcome::NoKey);
        }
    };

    if payload.algorithm() != algorithm {
        return Err(Error::UnsupportedHash {
            family: family.name(),
            hash: sigp.hash_algo,
        });
    }

    let mut ctx = payload.dup();
    ctx.update(&sigp.hash);
    if 4 == sigp.version {
        ctx.update(&make_tail(sigp.hash.len())?);
    }

    if !dig.backend_state().set(family, ctx, &sigp)? {
        return Ok(Outcome::Failed);
    }

    if dig.pubkey().is_populated() {
        let outcome = check_key(dig, &sigp, family, true)?;
        info!("{} {} signature: {}", family.name(), algorithm, outcome);
        return Ok(outcome);
    }

    let candidates = sigp.signid.as_ref().map_or_else(Vec::new, |id| keys.find(id));
    if candidates.is_empty() {
        debug!(
            "no key for issuer {}",
            sigp.signid.map_or_else(|| "(none)".to_string(), hex::encode)
        );
        return Ok(Outcome::NoKey);
    }

    let mut outcome = Outcome::NoKey;
    for found in candidates {
        dig.forget_pubkey();
        if let Err(e) = dig.process(found.packet) {
            warn!("skipping unreadable key: {}", e);
            continue;
        }
        let this = check_key(dig, &sigp, family, found.trusted)?;
        if this.rank() > outcome.rank() {
            outcome = this;
        }
        if Outcome::Ok == outcome {
            break;
        }
    }

    info!("{} {} signature: {}", family.name(), algorithm, outcome);

    Ok(outcome)
}

/// Check the signature bound into `dig` against the key it holds.
fn check_key(dig: &mut Dig, sigp: &DigParams, family: Family, trusted: bool) -> Result<Outcome> {
    let pubkey = dig.pubkey();
    if let (Some(signed_by), Some(keyid)) = (sigp.signid, pubkey.signid) {
        if signed_by != keyid {
            debug!(
                "signature by {} but key is {}",
                hex::encode(signed_by),
                hex::encode(keyid)
            );
            return Ok(Outcome::NoKey);
        }
    }

    if pubkey.pubkey_algo.and_then(Family::of) != Some(family) {
        debug!("{:?} key for a {} signature", pubkey.pubkey_algo, family.name());
        return Ok(Outcome::Failed);
    }

    Ok(match (dig.backend_state().verify()?, trusted) {
        (true, true) => Outcome::Ok,
        (true, false) => Outcome::NotTrusted,
        (false, _) => Outcome::Failed,
    })
}

fn make_tail(len: usize) -> Result<[u8; 6]> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Malformed(format!("{} bytes of hashed material", len)))?;
    let mut tail = [0u8; 6];
    tail[0] = 0x04;
    tail[1] = 0xff;
    BigEndian::write_u32(&mut tail[2..], len);
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::make_tail;
    use super::verify_signature;
    use super::FoundKey;
    use super::KeyLookup;
    use super::Outcome;
    use crate::backend::backend_for;
    use crate::config::BackendKind;
    use crate::dig::Dig;
    use crate::digestable::DigestContext;
    use crate::digestable::DigestFlags;
    use crate::registry::HashAlgorithm;

    struct Nothing;

    impl KeyLookup for Nothing {
        fn find(&self, _keyid: &[u8; 8]) -> Vec<FoundKey<'_>> {
            Vec::new()
        }
    }

    #[test]
    fn tail() {
        assert_eq!([4, 0xff, 0, 0, 1, 2], make_tail(0x0102).unwrap());
    }

    #[test]
    fn empty_dig_has_no_key() {
        let mut dig = Dig::with_backend(backend_for(BackendKind::Builtin).unwrap());
        let payload = DigestContext::init(HashAlgorithm::Sha256, DigestFlags::NONE).unwrap();
        assert_eq!(
            Outcome::NoKey,
            verify_signature(&mut dig, &payload, &Nothing).unwrap()
        );
    }

    #[test]
    fn best_outcome_wins() {
        assert!(Outcome::Ok.rank() > Outcome::NotTrusted.rank());
        assert!(Outcome::NotTrusted.rank() > Outcome::Failed.rank());
        assert!(Outcome::Failed.rank() > Outcome::NoKey.rank());
    }

    #[test]
    fn names() {
        assert_eq!("BAD", Outcome::Failed.to_string());
        assert_eq!("NOTTRUSTED", Outcome::NotTrusted.name());
    }
}
