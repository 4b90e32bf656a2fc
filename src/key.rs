use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use digest::Digest;
use log::debug;

use crate::cursor::Cursor;
use crate::errors::Error;
use crate::errors::Result;
use crate::mpi;
use crate::packets;
use crate::packets::PubkeyAlgorithm;
use crate::packets::SymmetricAlgorithm;
use crate::packets::Tag;
use crate::registry::HashAlgorithm;

/// Algorithm specific public values, borrowed from the packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMaterial<'a> {
    Rsa {
        n: &'a [u8],
        e: &'a [u8],
    },
    Dsa {
        p: &'a [u8],
        q: &'a [u8],
        g: &'a [u8],
        y: &'a [u8],
    },
    Elgamal {
        p: &'a [u8],
        g: &'a [u8],
        y: &'a [u8],
    },
    Ecdsa {
        oid: &'a [u8],
        point: &'a [u8],
    },
    EdDsa {
        oid: &'a [u8],
        point: &'a [u8],
    },
}

/// https://tools.ietf.org/html/rfc4880#section-3.7
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum S2k {
    Simple {
        hash: u8,
    },
    Salted {
        hash: u8,
        salt: [u8; 8],
    },
    Iterated {
        hash: u8,
        salt: [u8; 8],
        count: u32,
    },
}

/// How the secret half of a secret key packet is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretParams<'a> {
    pub usage: u8,
    pub cipher: SymmetricAlgorithm,
    pub s2k: Option<S2k>,
    pub iv: &'a [u8],
    /// Opaque (possibly encrypted) secret values.
    pub secret: &'a [u8],
    pub checksum: Option<[u8; 2]>,
}

#[derive(Clone, Debug)]
pub struct KeyPacket<'a> {
    pub version: u8,
    pub time: u32,
    /// V3 only; zero means no expiry.
    pub valid_days: Option<u16>,
    pub pubkey_algo: PubkeyAlgorithm,
    pub material: KeyMaterial<'a>,
    /// The packet body up to the end of the public values.
    pub public: &'a [u8],
    pub secret: Option<SecretParams<'a>>,
}

impl<'a> KeyMaterial<'a> {
    pub fn mpis(&self) -> Vec<&'a [u8]> {
        match *self {
            KeyMaterial::Rsa { n, e } => vec![n, e],
            KeyMaterial::Dsa { p, q, g, y } => vec![p, q, g, y],
            KeyMaterial::Elgamal { p, g, y } => vec![p, g, y],
            KeyMaterial::Ecdsa { point, .. } | KeyMaterial::EdDsa { point, .. } => vec![point],
        }
    }
}

/// https://tools.ietf.org/html/rfc4880#section-5.5.2
pub fn parse_key(tag: Tag, body: &[u8]) -> Result<KeyPacket> {
    let mut from = Cursor::new(body);

    let version = from.read_u8()?;
    let time;
    let valid_days;
    match version {
        2 | 3 => {
            time = from.read_u32()?;
            valid_days = Some(from.read_u16()?);
        }
        4 => {
            time = from.read_u32()?;
            valid_days = None;
        }
        other => malformed!("not supported: key packet version: {}", other),
    }

    let pubkey_algo = PubkeyAlgorithm::from_u8(from.read_u8()?);
    let material = read_material(&mut from, pubkey_algo)?;
    let public = from.consumed();

    debug!(
        "V{} {} {} 0x{:08x}{}",
        version,
        tag,
        pubkey_algo,
        time,
        valid_days.map_or(String::new(), |days| format!(" valid {} days", days))
    );
    for value in material.mpis() {
        debug!("    key mpi: {} bits", mpi::bit_len(value));
    }

    let secret = match tag {
        Tag::SecretKey | Tag::SecretSubkey => Some(read_secret(&mut from)?),
        _ => {
            ensure_well_formed!(
                from.is_empty(),
                "{} trailing bytes after public key",
                from.remaining()
            );
            None
        }
    };

    Ok(KeyPacket {
        version: if 4 == version { 4 } else { 3 },
        time,
        valid_days,
        pubkey_algo,
        material,
        public,
        secret,
    })
}

fn read_material<'a>(from: &mut Cursor<'a>, algo: PubkeyAlgorithm) -> Result<KeyMaterial<'a>> {
    Ok(match algo {
        PubkeyAlgorithm::Rsa | PubkeyAlgorithm::RsaEncrypt | PubkeyAlgorithm::RsaSign => {
            KeyMaterial::Rsa {
                n: mpi::read_mpi(from)?,
                e: mpi::read_mpi(from)?,
            }
        }
        PubkeyAlgorithm::Dsa => KeyMaterial::Dsa {
            p: mpi::read_mpi(from)?,
            q: mpi::read_mpi(from)?,
            g: mpi::read_mpi(from)?,
            y: mpi::read_mpi(from)?,
        },
        PubkeyAlgorithm::Elgamal | PubkeyAlgorithm::ElgamalEncrypt => KeyMaterial::Elgamal {
            p: mpi::read_mpi(from)?,
            g: mpi::read_mpi(from)?,
            y: mpi::read_mpi(from)?,
        },
        // https://tools.ietf.org/html/rfc6637#section-9
        PubkeyAlgorithm::Ecdsa => KeyMaterial::Ecdsa {
            oid: read_oid(from)?,
            point: mpi::read_mpi(from)?,
        },
        PubkeyAlgorithm::EdDsa => KeyMaterial::EdDsa {
            oid: read_oid(from)?,
            point: mpi::read_mpi(from)?,
        },
        other => return Err(Error::UnsupportedPubkey(other.value())),
    })
}

// https://tools.ietf.org/html/rfc6637#section-9
fn read_oid<'a>(from: &mut Cursor<'a>) -> Result<&'a [u8]> {
    let oid_len = from.read_u8()?;
    ensure_well_formed!(
        0 != oid_len && 0xff != oid_len,
        "reserved curve oid length: {}",
        oid_len
    );
    from.take(usize::from(oid_len))
}

// https://tools.ietf.org/html/rfc4880#section-5.5.3
fn read_secret<'a>(from: &mut Cursor<'a>) -> Result<SecretParams<'a>> {
    let usage = from.read_u8()?;

    let cipher;
    let mut s2k = None;
    match usage {
        0 => cipher = SymmetricAlgorithm::Plaintext,
        254 | 255 => {
            cipher = SymmetricAlgorithm::from_u8(from.read_u8()?);
            s2k = Some(read_s2k(from)?);
        }
        other => cipher = SymmetricAlgorithm::from_u8(other),
    }

    let iv_len = match cipher.block_size() {
        Some(len) => len,
        None => malformed!("not supported: secret key cipher: {}", cipher.name()),
    };
    let iv = from.take(iv_len)?;

    let rest = from.rest();
    let (secret, checksum) = if 254 == usage {
        (rest, None)
    } else {
        ensure_well_formed!(rest.len() >= 2, "secret key missing checksum");
        let (secret, sum) = rest.split_at(rest.len() - 2);
        (secret, Some([sum[0], sum[1]]))
    };

    debug!(
        "    secret: {} s2k {} {} bytes",
        cipher.name(),
        s2k.as_ref().map_or("none", s2k_hash_name),
        secret.len()
    );

    Ok(SecretParams {
        usage,
        cipher,
        s2k,
        iv,
        secret,
        checksum,
    })
}

fn read_s2k(from: &mut Cursor) -> Result<S2k> {
    Ok(match from.read_u8()? {
        0x00 => S2k::Simple {
            hash: from.read_u8()?,
        },
        0x01 => S2k::Salted {
            hash: from.read_u8()?,
            salt: from.read_array()?,
        },
        0x03 => {
            let hash = from.read_u8()?;
            let salt = from.read_array()?;
            let c = u32::from(from.read_u8()?);
            S2k::Iterated {
                hash,
                salt,
                count: (16 + (c & 0xf)) << ((c >> 4) + 6),
            }
        }
        other => malformed!("not supported: s2k specifier: {}", other),
    })
}

impl<'a> KeyPacket<'a> {
    /// The 8-byte key id.
    ///
    /// https://tools.ietf.org/html/rfc4880#section-12.2
    pub fn keyid(&self) -> Result<[u8; 8]> {
        let mut keyid = [0u8; 8];
        if 4 == self.version {
            keyid.copy_from_slice(&self.fingerprint()?[12..]);
            return Ok(keyid);
        }

        match self.material {
            KeyMaterial::Rsa { n, .. } => {
                ensure_well_formed!(n.len() >= 8, "v3 rsa modulus too short for a key id");
                keyid.copy_from_slice(&n[n.len() - 8..]);
                Ok(keyid)
            }
            _ => Err(Error::UnsupportedPubkey(self.pubkey_algo.value())),
        }
    }

    /// V4: SHA-1 over the public key packet. V3: MD5 over the RSA values.
    pub fn fingerprint(&self) -> Result<Vec<u8>> {
        if 4 == self.version {
            ensure_well_formed!(
                self.public.len() <= usize::from(u16::MAX),
                "public key too long to fingerprint"
            );
            let mut digest = sha1::Sha1::new();
            digest.update([0x99]);
            digest.update((self.public.len() as u16).to_be_bytes());
            digest.update(self.public);
            return Ok(digest.finalize().to_vec());
        }

        match self.material {
            KeyMaterial::Rsa { n, e } => {
                let mut digest = md5::Md5::new();
                digest.update(n);
                digest.update(e);
                Ok(digest.finalize().to_vec())
            }
            _ => Err(Error::UnsupportedPubkey(self.pubkey_algo.value())),
        }
    }
}

/// The key id of a public key (or subkey) packet.
pub fn pubkey_fingerprint(packet: &[u8]) -> Result<[u8; 8]> {
    let packet = packets::read_packet(packet)?;
    match packet.tag {
        Tag::PublicKey | Tag::PublicSubkey => (),
        other => malformed!("not a public key packet: {}", other),
    }
    parse_key(packet.tag, packet.body())?.keyid()
}

/// The key id of a base64 encoded public key packet.
pub fn extract_pubkey_fingerprint(b64: &str) -> Result<[u8; 8]> {
    let compact: String = b64.split_whitespace().collect();
    let data = STANDARD
        .decode(compact)
        .map_err(|e| Error::Malformed(format!("base64 public key: {}", e)))?;
    pubkey_fingerprint(&data)
}

/// Name the hash an S2K specifier uses, for logging.
pub fn s2k_hash_name(s2k: &S2k) -> &'static str {
    let hash = match *s2k {
        S2k::Simple { hash } | S2k::Salted { hash, .. } | S2k::Iterated { hash, .. } => hash,
    };
    HashAlgorithm::from_id(hash).map_or("MD_UNKNOWN", |alg| alg.name())
}
