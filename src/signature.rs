use byteorder::BigEndian;
use byteorder::ByteOrder;
use log::debug;
use log::warn;

use crate::cursor::Cursor;
use crate::errors::Result;
use crate::mpi;
use crate::packets::compression_name;
use crate::packets::PubkeyAlgorithm;
use crate::packets::SignatureType;
use crate::packets::SymmetricAlgorithm;
use crate::registry::HashAlgorithm;
use crate::usize_from_u32;

const SIG_CREATE_TIME: u8 = 2;
const SIG_EXPIRE_TIME: u8 = 3;
const KEY_EXPIRE_TIME: u8 = 9;
const PREFER_SYMKEY: u8 = 11;
const ISSUER_KEYID: u8 = 16;
const PREFER_HASH: u8 = 21;
const PREFER_COMPRESS: u8 = 22;
const KEYSERVER_PREFERS: u8 = 23;

const UNKNOWN_SUBPACKET: &str = "Unknown signature subkey type";

/// https://tools.ietf.org/html/rfc4880#section-5.2.3.1
pub fn subpacket_name(kind: u8) -> &'static str {
    match kind {
        2 => "created",
        3 => "expires",
        4 => "exportable",
        5 => "trust signature",
        6 => "regular expression",
        7 => "revocable",
        9 => "key expiration time",
        10 => "additional recipient request",
        11 => "preferred symmetric algorithms",
        12 => "revocation key",
        16 => "issuer",
        20 => "notation data",
        21 => "preferred hash algorithms",
        22 => "preferred compression algorithms",
        23 => "key server preferences",
        24 => "preferred key server",
        25 => "primary user id",
        26 => "policy URL",
        27 => "key flags",
        28 => "signer's user id",
        29 => "reason for revocation",
        30 => "features",
        31 => "signature target",
        32 => "embedded signature",
        100..=110 => "internal subpkt type",
        _ => UNKNOWN_SUBPACKET,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Subpacket<'a> {
    pub kind: u8,
    pub critical: bool,
    pub data: &'a [u8],
}

impl<'a> Subpacket<'a> {
    fn be_u32(&self) -> Option<u32> {
        if 4 == self.data.len() {
            Some(BigEndian::read_u32(self.data))
        } else {
            None
        }
    }

    /// A one-line human rendering, for logs.
    pub fn describe(&self) -> String {
        let mut ret = subpacket_name(self.kind).to_string();
        if self.critical {
            ret.push_str(" *CRITICAL*");
        }

        let values: Vec<String> = match self.kind {
            PREFER_SYMKEY => self
                .data
                .iter()
                .map(|&v| SymmetricAlgorithm::from_u8(v).name().to_string())
                .collect(),
            PREFER_HASH => self
                .data
                .iter()
                .map(|&v| match HashAlgorithm::from_id(v) {
                    Some(alg) => alg.name().to_string(),
                    None => "MD_UNKNOWN".to_string(),
                })
                .collect(),
            PREFER_COMPRESS => self
                .data
                .iter()
                .map(|&v| compression_name(v).to_string())
                .collect(),
            KEYSERVER_PREFERS => self
                .data
                .iter()
                .map(|&v| match v {
                    0x80 => "No-modify".to_string(),
                    _ => "Unknown key server preference".to_string(),
                })
                .collect(),
            SIG_CREATE_TIME | SIG_EXPIRE_TIME | KEY_EXPIRE_TIME => match self.be_u32() {
                Some(t) => vec![format!("0x{:08x}", t)],
                None => vec![hex::encode(self.data)],
            },
            _ => vec![hex::encode(self.data)],
        };

        for value in values {
            ret.push(' ');
            ret.push_str(&value);
        }
        ret
    }
}

fn read_subpacket_len(from: &mut Cursor) -> Result<usize> {
    let first = from.read_u8()?;
    Ok(match first {
        0..=191 => usize::from(first),
        192..=254 => {
            let second = from.read_u8()?;
            (usize::from(first - 192) << 8) + usize::from(second) + 192
        }
        255 => usize_from_u32(from.read_u32()?),
    })
}

// https://tools.ietf.org/html/rfc4880#section-5.2.3.1
pub fn parse_subpackets(data: &[u8]) -> Result<Vec<Subpacket>> {
    let mut from = Cursor::new(data);
    let mut ret = Vec::with_capacity(data.len() / 4);

    while !from.is_empty() {
        // `len` includes the id byte, but not the stored length
        let len = read_subpacket_len(&mut from)?;
        ensure_well_formed!(len != 0, "illegal empty subpacket");
        let body = from.take(len)?;

        let id = body[0];
        ret.push(Subpacket {
            kind: id & 0b0111_1111,
            critical: mpi::is_bit_set(id, 7),
            data: &body[1..],
        });
    }

    Ok(ret)
}

/// The parts of a signature packet that matter for verification.
#[derive(Clone, Debug)]
pub struct SignaturePacket<'a> {
    pub version: u8,
    pub sigtype: SignatureType,
    pub pubkey_algo: PubkeyAlgorithm,
    pub hash_algo: u8,
    pub time: Option<u32>,
    pub signid: Option<[u8; 8]>,
    pub expire: Option<u32>,
    pub key_expire: Option<u32>,
    /// The bytes covered by the signature, after the signed data itself.
    pub hashed: &'a [u8],
    pub signhash16: [u8; 2],
    pub mpis: Vec<&'a [u8]>,
}

/// https://tools.ietf.org/html/rfc4880#section-5.2
pub fn parse_signature(body: &[u8]) -> Result<SignaturePacket> {
    let mut from = Cursor::new(body);
    let version = from.read_u8()?;
    match version {
        3 => parse_v3(from),
        4 => parse_v4(from),
        other => malformed!("not supported: signature version: {}", other),
    }
}

// https://tools.ietf.org/html/rfc4880#section-5.2.2
fn parse_v3(mut from: Cursor) -> Result<SignaturePacket> {
    let hashlen = from.read_u8()?;
    ensure_well_formed!(5 == hashlen, "v3 signature hash length must be 5, not {}", hashlen);

    let start = from.position();
    let sigtype = SignatureType::from_u8(from.read_u8()?);
    let time = from.read_u32()?;
    let hashed_end = from.position();
    let hashed = &from.consumed()[start..hashed_end];

    let signid = from.read_array::<8>()?;
    let pubkey_algo = PubkeyAlgorithm::from_u8(from.read_u8()?);
    let hash_algo = from.read_u8()?;
    let signhash16 = from.read_array::<2>()?;

    debug!(
        "V3 {} signature({}) {} {} 0x{:08x} signer {}",
        sigtype,
        sigtype.value(),
        pubkey_algo,
        hash_name(hash_algo),
        time,
        hex::encode(signid)
    );

    let mpis = read_sig_mpis(&mut from, pubkey_algo)?;

    Ok(SignaturePacket {
        version: 3,
        sigtype,
        pubkey_algo,
        hash_algo,
        time: Some(time),
        signid: Some(signid),
        expire: None,
        key_expire: None,
        hashed,
        signhash16,
        mpis,
    })
}

// https://tools.ietf.org/html/rfc4880#section-5.2.3
fn parse_v4(mut from: Cursor) -> Result<SignaturePacket> {
    let sigtype = SignatureType::from_u8(from.read_u8()?);
    let pubkey_algo = PubkeyAlgorithm::from_u8(from.read_u8()?);
    let hash_algo = from.read_u8()?;

    let hashed_subpackets = from.read_u16_prefixed()?;
    let hashed = from.consumed();
    let unhashed_subpackets = from.read_u16_prefixed()?;
    let signhash16 = from.read_array::<2>()?;

    debug!(
        "V4 {} signature({}) {} {}",
        sigtype,
        sigtype.value(),
        pubkey_algo,
        hash_name(hash_algo)
    );

    let mut sig = SignaturePacket {
        version: 4,
        sigtype,
        pubkey_algo,
        hash_algo,
        time: None,
        signid: None,
        expire: None,
        key_expire: None,
        hashed,
        signhash16,
        mpis: Vec::new(),
    };

    for subpacket in parse_subpackets(hashed_subpackets)?
        .into_iter()
        .chain(parse_subpackets(unhashed_subpackets)?)
    {
        debug!("    {}", subpacket.describe());
        sig.absorb(&subpacket)?;
    }

    sig.mpis = read_sig_mpis(&mut from, pubkey_algo)?;

    Ok(sig)
}

impl<'a> SignaturePacket<'a> {
    /// Capture identity and lifetime hints: the first subpacket of each kind wins.
    fn absorb(&mut self, subpacket: &Subpacket) -> Result<()> {
        if subpacket.critical && UNKNOWN_SUBPACKET == subpacket_name(subpacket.kind) {
            warn!("unknown critical subpacket: {}", subpacket.kind);
        }

        if !self.sigtype.is_primary() {
            return Ok(());
        }

        match subpacket.kind {
            SIG_CREATE_TIME => {
                if let Some(t) = subpacket.be_u32() {
                    self.time.get_or_insert(t);
                }
            }
            SIG_EXPIRE_TIME => {
                if let Some(t) = subpacket.be_u32() {
                    self.expire.get_or_insert(t);
                }
            }
            KEY_EXPIRE_TIME => {
                if let Some(t) = subpacket.be_u32() {
                    self.key_expire.get_or_insert(t);
                }
            }
            ISSUER_KEYID => {
                ensure_well_formed!(
                    8 == subpacket.data.len(),
                    "invalid issuer subpacket length: {}",
                    subpacket.data.len()
                );
                let mut issuer = [0u8; 8];
                issuer.copy_from_slice(subpacket.data);
                self.signid.get_or_insert(issuer);
            }
            _ => (),
        }

        Ok(())
    }
}

fn read_sig_mpis<'a>(from: &mut Cursor<'a>, algo: PubkeyAlgorithm) -> Result<Vec<&'a [u8]>> {
    let count = match algo {
        PubkeyAlgorithm::Rsa | PubkeyAlgorithm::RsaSign | PubkeyAlgorithm::RsaEncrypt => 1,
        PubkeyAlgorithm::Dsa | PubkeyAlgorithm::Ecdsa | PubkeyAlgorithm::EdDsa => 2,
        _ => {
            let mut mpis = Vec::new();
            while !from.is_empty() {
                mpis.push(mpi::read_mpi(from)?);
            }
            return Ok(mpis);
        }
    };

    let mut mpis = Vec::with_capacity(count);
    for _ in 0..count {
        let value = mpi::read_mpi(from)?;
        debug!("    sig mpi: {} bits", mpi::bit_len(value));
        mpis.push(value);
    }

    ensure_well_formed!(
        from.is_empty(),
        "{} trailing bytes after signature",
        from.remaining()
    );

    Ok(mpis)
}

fn hash_name(id: u8) -> &'static str {
    HashAlgorithm::from_id(id).map_or("MD_UNKNOWN", |alg| alg.name())
}

#[cfg(test)]
mod tests {
    use super::parse_signature;
    use super::parse_subpackets;
    use crate::packets::PubkeyAlgorithm;
    use crate::packets::SignatureType;

    fn v4(sigtype: u8, hashed: &[u8], unhashed: &[u8]) -> Vec<u8> {
        let mut body = vec![4, sigtype, 1, 8];
        body.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
        body.extend_from_slice(hashed);
        body.extend_from_slice(&(unhashed.len() as u16).to_be_bytes());
        body.extend_from_slice(unhashed);
        body.extend_from_slice(&[0xab, 0xcd]);
        body.extend_from_slice(&[0, 9, 0x01, 0x23]);
        body
    }

    #[test]
    fn subpacket_lengths() {
        let mut data = vec![2, 27, 0x03];
        data.extend_from_slice(&[0xc0, 0x00, 20]);
        data.extend_from_slice(&[0u8; 191]);
        data.extend_from_slice(&[0xff, 0, 0, 0, 2, 0x80 | 101, 7]);
        let subs = parse_subpackets(&data).unwrap();
        assert_eq!(3, subs.len());
        assert_eq!(27, subs[0].kind);
        assert_eq!(&[3], subs[0].data);
        assert_eq!(191, subs[1].data.len());
        assert!(subs[2].critical);
        assert_eq!(101, subs[2].kind);
    }

    #[test]
    fn subpacket_truncated() {
        assert!(parse_subpackets(&[5, 2, 0, 0]).is_err());
        assert!(parse_subpackets(&[0]).is_err());
        assert!(parse_subpackets(&[0xc0]).is_err());
    }

    #[test]
    fn first_writer_wins() {
        let hashed = [
            5, 2, 0, 0, 0, 1, //
            5, 2, 0, 0, 0, 2, //
            9, 16, 1, 2, 3, 4, 5, 6, 7, 8,
        ];
        let unhashed = [9, 16, 9, 9, 9, 9, 9, 9, 9, 9];
        let body = v4(0x00, &hashed, &unhashed);
        let sig = parse_signature(&body).unwrap();
        assert_eq!(Some(1), sig.time);
        assert_eq!(Some([1, 2, 3, 4, 5, 6, 7, 8]), sig.signid);
        assert_eq!(&body[..6 + hashed.len()], sig.hashed);
        assert_eq!([0xab, 0xcd], sig.signhash16);
        assert_eq!(vec![&[0x01u8, 0x23][..]], sig.mpis);
        assert_eq!(PubkeyAlgorithm::Rsa, sig.pubkey_algo);
    }

    #[test]
    fn issuer_ignored_for_certifications() {
        let body = v4(0x18, &[5, 2, 0, 0, 0, 1], &[9, 16, 1, 2, 3, 4, 5, 6, 7, 8]);
        let sig = parse_signature(&body).unwrap();
        assert_eq!(SignatureType::SubkeyBinding, sig.sigtype);
        assert_eq!(None, sig.time);
        assert_eq!(None, sig.signid);
    }

    #[test]
    fn v3_layout() {
        let mut body = vec![3, 5, 0x00, 0x60, 0, 0, 0];
        body.extend_from_slice(&[0xd8, 0x15, 0xe1, 0xa3, 0xf1, 0xe6, 0xb8, 0x21]);
        body.extend_from_slice(&[1, 8, 0x12, 0x34, 0, 1, 1]);
        let sig = parse_signature(&body).unwrap();
        assert_eq!(3, sig.version);
        assert_eq!(&[0x00, 0x60, 0, 0, 0], sig.hashed);
        assert_eq!(Some(0x6000_0000), sig.time);
        assert_eq!([0x12, 0x34], sig.signhash16);

        body[1] = 6;
        assert!(parse_signature(&body).is_err());
    }

    #[test]
    fn truncated_signature() {
        let body = v4(0x00, &[5, 2, 0, 0, 0, 1], &[]);
        for len in 0..body.len() {
            assert!(parse_signature(&body[..len]).is_err(), "{}", len);
        }
    }
}
