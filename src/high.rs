use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use log::debug;

use crate::armour;
use crate::dig::Dig;
use crate::digestable::DigestContext;
use crate::digestable::DigestFlags;
use crate::keyring::Keyring;
use crate::verify;
use crate::verify::Outcome;

/// Read an armored or binary file, returning the raw packets.
pub fn read_packets<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {:?}", path))?;
    let unarmored =
        armour::unarmor(&data).with_context(|| format!("unarmoring {:?}", path))?;
    debug!("{:?}: {:?} packets", path, unarmored.kind);
    Ok(unarmored.data)
}

/// Verify a detached signature over `payload`.
///
/// The signature may be armored or binary. The payload is hashed as-is,
/// so text signatures only verify if the caller already canonicalised it.
///
/// # Example
///
/// ```rust,no_run
/// use std::fs::File;
///
/// let mut keyring = pgpdig::Keyring::new();
/// keyring
///     .append_keys_from(File::open("keys.asc").unwrap(), true)
///     .unwrap();
/// let sig = std::fs::read("file.sig").unwrap();
/// let outcome = pgpdig::verify_detached(&keyring, &sig, File::open("file").unwrap());
/// println!("{}", outcome.unwrap());
/// ```
pub fn verify_detached<R: Read>(keyring: &Keyring, signature: &[u8], payload: R) -> Result<Outcome> {
    let unarmored = armour::unarmor(signature).context("reading signature")?;

    let mut dig = Dig::new()?;
    dig.process(&unarmored.data)
        .context("decoding signature packets")?;

    if !dig.signature().is_populated() {
        bail!("no signature in signature stream");
    }

    let algorithm = match dig.signature().hash_algorithm() {
        Some(algorithm) if algorithm.descriptor().is_some() => algorithm,
        _ => return Ok(Outcome::NoKey),
    };

    let mut ctx = DigestContext::init(algorithm, DigestFlags::NONE)?;
    io::copy(&mut io::BufReader::new(payload), &mut ctx).context("hashing payload")?;

    Ok(verify::verify_signature(&mut dig, &ctx, keyring)?)
}
