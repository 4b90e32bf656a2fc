use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pgpdig::armour;
use pgpdig::key;
use pgpdig::packets;
use pgpdig::packets::Tag;
use pgpdig::ArmorError;
use pgpdig::ArmorKind;
use pgpdig::Dig;

const RSA_KEY: &[u8] = include_bytes!("data/rsa.pub");
const RSA_KEY_ASC: &[u8] = include_bytes!("data/rsa.pub.asc");
const RSA_SIG: &[u8] = include_bytes!("data/rsa.sig");
const RSA_SIG_ASC: &str = include_str!("data/rsa.sig.asc");
const RSA_V3_KEY: &[u8] = include_bytes!("data/rsa-v3.pub");
const DSA_KEY: &[u8] = include_bytes!("data/dsa.pub");
const EC_KEY: &[u8] = include_bytes!("data/ec.pub");
const EC_KEY_ASC: &[u8] = include_bytes!("data/ec.pub.asc");

fn first_key(data: &[u8]) -> Result<(String, String)> {
    let packet = packets::read_packet(data)?;
    let key = key::parse_key(packet.tag, packet.body())?;
    Ok((hex::encode(key.keyid()?), hex::encode(key.fingerprint()?)))
}

#[test]
fn fingerprints() -> Result<()> {
    assert_eq!(
        (
            "cc6cbc273ea3d589".to_string(),
            "5ee69c9cef1103b4beac295fcc6cbc273ea3d589".to_string()
        ),
        first_key(RSA_KEY)?
    );
    assert_eq!(
        (
            "409145c0827f3ff1".to_string(),
            "68983f3239dbf0388e68337e409145c0827f3ff1".to_string()
        ),
        first_key(DSA_KEY)?
    );
    assert_eq!(
        (
            "9d3be2b0e71dd67e".to_string(),
            "f9f9d5a3ceade66c389c5a4c9d3be2b0e71dd67e".to_string()
        ),
        first_key(EC_KEY)?
    );
    assert_eq!(
        (
            "d815e1a3f1e6b821".to_string(),
            "1dda5567aa912f44a541457d6909c00e".to_string()
        ),
        first_key(RSA_V3_KEY)?
    );
    Ok(())
}

#[test]
fn fingerprint_from_base64() -> Result<()> {
    let packet = packets::read_packet(RSA_KEY)?;
    let encoded = STANDARD.encode(packet.raw());
    let wrapped: Vec<&str> = encoded
        .as_bytes()
        .chunks(64)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect();
    assert_eq!(
        "cc6cbc273ea3d589",
        hex::encode(pgpdig::extract_pubkey_fingerprint(&wrapped.join("\n"))?)
    );
    assert!(pgpdig::extract_pubkey_fingerprint("!!!").is_err());
    assert!(pgpdig::pubkey_fingerprint(RSA_SIG).is_err());
    Ok(())
}

#[test]
fn armored_matches_binary() -> Result<()> {
    let sig = armour::unarmor(RSA_SIG_ASC.as_bytes())?;
    assert_eq!(Some(ArmorKind::Signature), sig.kind);
    assert_eq!(RSA_SIG, sig.data.as_slice());

    let key = armour::unarmor(RSA_KEY_ASC)?;
    assert_eq!(Some(ArmorKind::PublicKey), key.kind);
    assert_eq!(RSA_KEY, key.data.as_slice());

    let key = armour::unarmor(EC_KEY_ASC)?;
    assert_eq!(EC_KEY, key.data.as_slice());
    Ok(())
}

#[test]
fn rewrapped() -> Result<()> {
    let text = armour::wrap(ArmorKind::Signature, RSA_SIG);
    let back = armour::unarmor(text.as_bytes())?;
    assert_eq!(RSA_SIG, back.data.as_slice());
    assert_eq!("Version", back.headers[0].0);
    Ok(())
}

#[test]
fn corrupt_armor() {
    let bad_crc = RSA_SIG_ASC.replace("=+WkF", "=AAAA");
    assert_eq!(
        Err(ArmorError::CrcMismatch),
        armour::unarmor(bad_crc.as_bytes()).map(|_| ())
    );

    let bad_body = RSA_SIG_ASC.replacen("iQFE", "iQFF", 1);
    assert_eq!(
        Err(ArmorError::CrcMismatch),
        armour::unarmor(bad_body.as_bytes()).map(|_| ())
    );

    let no_end = RSA_SIG_ASC.replace("-----END PGP SIGNATURE-----", "");
    assert_eq!(
        Err(ArmorError::NoEnd),
        armour::unarmor(no_end.as_bytes()).map(|_| ())
    );

    let unknown = RSA_SIG_ASC.replace("PGP SIGNATURE", "PGP POSTCARD");
    assert_eq!(
        Err(ArmorError::UnknownType),
        armour::unarmor(unknown.as_bytes()).map(|_| ())
    );
}

#[test]
fn corrupt_key_crc() {
    let text = std::str::from_utf8(RSA_KEY_ASC).unwrap();
    assert!(text.contains("\n=YeXF\n"));
    let bad = text.replace("\n=YeXF\n", "\n=YeXG\n");
    let err = armour::unarmor(bad.as_bytes()).unwrap_err();
    assert_eq!(ArmorError::CrcMismatch, err);
    assert_eq!(-7, err.code());
}

#[test]
fn read_packets() -> Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/rsa.sig.asc");
    assert_eq!(RSA_SIG, pgpdig::read_packets(path)?.as_slice());
    assert!(pgpdig::read_packets("/nonexistent/pgpdig").is_err());
    Ok(())
}

#[test]
fn key_block() -> Result<()> {
    let tags: Vec<Tag> = packets::split_packets(RSA_KEY)?
        .iter()
        .map(|p| p.tag)
        .collect();
    assert_eq!(vec![Tag::PublicKey, Tag::UserId, Tag::Signature], tags);

    let mut dig = Dig::with_backend(pgpdig::backend::backend_for(pgpdig::BackendKind::Builtin)?);
    assert_eq!(3, dig.process(RSA_KEY)?);
    let pubkey = dig.pubkey();
    assert!(pubkey.is_populated());
    assert_eq!(Some(Tag::PublicKey), pubkey.tag);
    assert_eq!(4, pubkey.version);
    assert_eq!("cc6cbc273ea3d589", hex::encode(pubkey.signid.unwrap()));
    assert!(!dig.signature().is_populated());
    Ok(())
}

#[test]
fn signature_params() -> Result<()> {
    let mut dig = Dig::with_backend(pgpdig::backend::backend_for(pgpdig::BackendKind::Builtin)?);
    dig.process(RSA_SIG)?;
    let sig = dig.signature();
    assert_eq!(Some(Tag::Signature), sig.tag);
    assert_eq!(4, sig.version);
    assert_eq!(8, sig.hash_algo);
    assert_eq!([0x6e, 0xef], sig.signhash16);
    assert_eq!("cc6cbc273ea3d589", hex::encode(sig.signid.unwrap()));
    assert!(sig.time.is_some());
    Ok(())
}
