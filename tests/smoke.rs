use std::io;

use anyhow::Result;
use pgpdig::backend::backend_for;
use pgpdig::verify::FoundKey;
use pgpdig::BackendKind;
use pgpdig::Dig;
use pgpdig::DigestContext;
use pgpdig::DigestFlags;
use pgpdig::HashAlgorithm;
use pgpdig::KeyLookup;
use pgpdig::Keyring;
use pgpdig::Outcome;

const MSG: &[u8] = include_bytes!("data/msg.txt");
const RSA_KEY: &[u8] = include_bytes!("data/rsa.pub");
const RSA_KEY_ASC: &[u8] = include_bytes!("data/rsa.pub.asc");
const RSA_SIG: &[u8] = include_bytes!("data/rsa.sig");
const RSA_SIG_ASC: &[u8] = include_bytes!("data/rsa.sig.asc");
const RSA_SHA1_SIG: &[u8] = include_bytes!("data/rsa-sha1.sig");
const RSA_V3_KEY: &[u8] = include_bytes!("data/rsa-v3.pub");
const RSA_V3_SIG: &[u8] = include_bytes!("data/rsa-v3.sig");
const DSA_KEY: &[u8] = include_bytes!("data/dsa.pub.asc");
const DSA_SIG: &[u8] = include_bytes!("data/dsa.sig");
const EC_KEY: &[u8] = include_bytes!("data/ec.pub");
const EC_SIG: &[u8] = include_bytes!("data/ec.sig");

fn keyring(key: &[u8], trusted: bool) -> Keyring {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut keyring = Keyring::new();
    assert_eq!(1, keyring.append_keys(key, trusted).unwrap());
    keyring
}

fn check(kind: BackendKind, key: &[u8], sig: &[u8]) -> pgpdig::Result<Outcome> {
    let keyring = keyring(key, true);
    let mut dig = Dig::with_backend(backend_for(kind)?);
    dig.process(sig)?;
    let algorithm = dig.signature().hash_algorithm().unwrap();
    let mut payload = DigestContext::init(algorithm, DigestFlags::NONE)?;
    payload.update(MSG);
    pgpdig::verify_signature(&mut dig, &payload, &keyring)
}

#[test]
fn rsa() -> Result<()> {
    assert_eq!(Outcome::Ok, check(BackendKind::Builtin, RSA_KEY, RSA_SIG)?);
    assert_eq!(
        Outcome::Ok,
        check(BackendKind::Builtin, RSA_KEY, RSA_SHA1_SIG)?
    );
    Ok(())
}

#[test]
fn rsa_v3() -> Result<()> {
    assert_eq!(
        Outcome::Ok,
        check(BackendKind::Builtin, RSA_V3_KEY, RSA_V3_SIG)?
    );
    Ok(())
}

#[test]
fn dsa() -> Result<()> {
    assert_eq!(Outcome::Ok, check(BackendKind::Builtin, DSA_KEY, DSA_SIG)?);
    Ok(())
}

#[test]
fn tampered_signature() -> Result<()> {
    let mut sig = RSA_SIG.to_vec();
    *sig.last_mut().unwrap() ^= 1;
    assert_eq!(Outcome::Failed, check(BackendKind::Builtin, RSA_KEY, &sig)?);
    Ok(())
}

#[test]
fn tampered_message() -> Result<()> {
    let keyring = keyring(RSA_KEY, true);
    let outcome = pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(b"hello world!\n"))?;
    assert_eq!(Outcome::Failed, outcome);
    Ok(())
}

#[test]
fn wrong_hash_for_payload() {
    let keyring = keyring(RSA_KEY, true);
    let mut dig = Dig::with_backend(backend_for(BackendKind::Builtin).unwrap());
    dig.process(RSA_SIG).unwrap();
    let payload = DigestContext::init(HashAlgorithm::Sha512, DigestFlags::NONE).unwrap();
    assert!(pgpdig::verify_signature(&mut dig, &payload, &keyring).is_err());
}

#[test]
fn detached() -> Result<()> {
    let keyring = keyring(RSA_KEY_ASC, true);
    assert_eq!(
        Outcome::Ok,
        pgpdig::verify_detached(&keyring, RSA_SIG_ASC, io::Cursor::new(MSG))?
    );
    assert_eq!(
        Outcome::Ok,
        pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(MSG))?
    );
    Ok(())
}

#[test]
fn untrusted() -> Result<()> {
    let keyring = keyring(RSA_KEY, false);
    assert_eq!(
        Outcome::NotTrusted,
        pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(MSG))?
    );
    Ok(())
}

#[test]
fn no_key() -> Result<()> {
    let keyring = keyring(DSA_KEY, true);
    assert_eq!(
        Outcome::NoKey,
        pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(MSG))?
    );
    assert_eq!(
        Outcome::NoKey,
        pgpdig::verify_detached(&Keyring::new(), RSA_SIG, io::Cursor::new(MSG))?
    );
    Ok(())
}

#[test]
fn colliding_key_id() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    // a v3 RSA key whose modulus ends in the real key's id
    let mut body = vec![3, 0x5f, 0, 0, 0, 0, 0, 1, 0, 128];
    body.extend_from_slice(&[0xc0; 8]);
    body.extend_from_slice(&hex::decode("cc6cbc273ea3d589")?);
    body.extend_from_slice(&[0, 17, 1, 0, 1]);
    let mut impostor = vec![0x98, body.len() as u8];
    impostor.extend_from_slice(&body);

    let mut keyring = Keyring::new();
    assert_eq!(1, keyring.append_keys(&impostor, true)?);
    assert_eq!(
        Outcome::Failed,
        pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(MSG))?
    );

    assert_eq!(1, keyring.append_keys(RSA_KEY, true)?);
    let mut id = [0u8; 8];
    id.copy_from_slice(&hex::decode("cc6cbc273ea3d589")?);
    assert_eq!(2, keyring.keys_with_id(&id).count());
    assert_eq!(
        Outcome::Ok,
        pgpdig::verify_detached(&keyring, RSA_SIG, io::Cursor::new(MSG))?
    );
    Ok(())
}

struct NoKeys;

impl KeyLookup for NoKeys {
    fn find(&self, _keyid: &[u8; 8]) -> Vec<FoundKey<'_>> {
        Vec::new()
    }
}

#[test]
fn key_supplied_up_front() -> Result<()> {
    let mut dig = Dig::with_backend(backend_for(BackendKind::Builtin)?);
    dig.process(RSA_SIG)?;
    dig.process(RSA_KEY)?;
    assert_eq!(
        Some("RSA Test <rsa@example.org>"),
        dig.pubkey().userid.as_deref()
    );

    let mut payload = DigestContext::init(HashAlgorithm::Sha256, DigestFlags::NONE)?;
    payload.update(MSG);
    assert_eq!(
        Outcome::Ok,
        pgpdig::verify_signature(&mut dig, &payload, &NoKeys)?
    );
    Ok(())
}

#[test]
fn key_for_another_signer() -> Result<()> {
    let mut dig = Dig::with_backend(backend_for(BackendKind::Builtin)?);
    dig.process(RSA_SIG)?;
    dig.process(RSA_V3_KEY)?;

    let mut payload = DigestContext::init(HashAlgorithm::Sha256, DigestFlags::NONE)?;
    payload.update(MSG);
    assert_eq!(
        Outcome::NoKey,
        pgpdig::verify_signature(&mut dig, &payload, &NoKeys)?
    );
    Ok(())
}

#[test]
fn ecdsa_needs_a_provider() {
    assert!(check(BackendKind::Builtin, EC_KEY, EC_SIG).is_err());
}

#[cfg(feature = "rustcrypto")]
#[test]
fn ecdsa_rustcrypto() -> Result<()> {
    assert_eq!(Outcome::Ok, check(BackendKind::RustCrypto, EC_KEY, EC_SIG)?);
    assert_eq!(
        Outcome::Ok,
        check(BackendKind::RustCrypto, RSA_KEY, RSA_SIG)?
    );
    Ok(())
}

#[cfg(feature = "openssl")]
#[test]
fn openssl() -> Result<()> {
    assert_eq!(Outcome::Ok, check(BackendKind::OpenSsl, EC_KEY, EC_SIG)?);
    assert_eq!(Outcome::Ok, check(BackendKind::OpenSsl, RSA_KEY, RSA_SIG)?);
    assert_eq!(Outcome::Ok, check(BackendKind::OpenSsl, DSA_KEY, DSA_SIG)?);
    Ok(())
}
