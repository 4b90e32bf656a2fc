use std::fmt;

use crate::cursor::Cursor;
use crate::errors::Result;
use crate::mpi::is_bit_set;
use crate::usize_from_u32;

/// https://tools.ietf.org/html/rfc4880#section-4.3
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    PublicSessionKey,
    Signature,
    SymmetricSessionKey,
    OnePassSignature,
    SecretKey,
    PublicKey,
    SecretSubkey,
    CompressedData,
    SymmetricData,
    Marker,
    LiteralData,
    Trust,
    UserId,
    PublicSubkey,
    CommentOld,
    PhotoId,
    EncryptedMdc,
    Mdc,
    Comment,
    Control,
    Other(u8),
}

impl Tag {
    pub fn from_u8(val: u8) -> Tag {
        use self::Tag::*;
        match val {
            1 => PublicSessionKey,
            2 => Signature,
            3 => SymmetricSessionKey,
            4 => OnePassSignature,
            5 => SecretKey,
            6 => PublicKey,
            7 => SecretSubkey,
            8 => CompressedData,
            9 => SymmetricData,
            10 => Marker,
            11 => LiteralData,
            12 => Trust,
            13 => UserId,
            14 => PublicSubkey,
            16 => CommentOld,
            17 => PhotoId,
            18 => EncryptedMdc,
            19 => Mdc,
            61 => Comment,
            63 => Control,
            other => Other(other),
        }
    }

    pub fn value(self) -> u8 {
        use self::Tag::*;
        match self {
            PublicSessionKey => 1,
            Signature => 2,
            SymmetricSessionKey => 3,
            OnePassSignature => 4,
            SecretKey => 5,
            PublicKey => 6,
            SecretSubkey => 7,
            CompressedData => 8,
            SymmetricData => 9,
            Marker => 10,
            LiteralData => 11,
            Trust => 12,
            UserId => 13,
            PublicSubkey => 14,
            CommentOld => 16,
            PhotoId => 17,
            EncryptedMdc => 18,
            Mdc => 19,
            Comment => 61,
            Control => 63,
            Other(other) => other,
        }
    }

    pub fn name(self) -> &'static str {
        use self::Tag::*;
        match self {
            PublicSessionKey => "Public-Key Encrypted Session Key",
            Signature => "Signature",
            SymmetricSessionKey => "Symmetric-Key Encrypted Session Key",
            OnePassSignature => "One-Pass Signature",
            SecretKey => "Secret Key",
            PublicKey => "Public Key",
            SecretSubkey => "Secret Subkey",
            CompressedData => "Compressed Data",
            SymmetricData => "Symmetrically Encrypted Data",
            Marker => "Marker",
            LiteralData => "Literal Data",
            Trust => "Trust",
            UserId => "User ID",
            PublicSubkey => "Public Subkey",
            CommentOld => "Comment (from OpenPGP draft)",
            PhotoId => "Photo ID",
            EncryptedMdc => "Integrity protected encrypted data",
            Mdc => "Manipulation detection code",
            Comment => "Comment",
            Control => "Control (GPG)",
            Other(60) => "Private #60",
            Other(62) => "Private #62",
            Other(_) => "TAG_UNKNOWN",
        }
    }

    pub fn is_key(self) -> bool {
        match self {
            Tag::PublicKey | Tag::PublicSubkey | Tag::SecretKey | Tag::SecretSubkey => true,
            _ => false,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// https://tools.ietf.org/html/rfc4880#section-9.1
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PubkeyAlgorithm {
    Rsa,
    RsaEncrypt,
    RsaSign,
    ElgamalEncrypt,
    Dsa,
    Ec,
    Ecdsa,
    Elgamal,
    Dh,
    EdDsa,
    Unknown(u8),
}

impl PubkeyAlgorithm {
    pub fn from_u8(val: u8) -> PubkeyAlgorithm {
        use self::PubkeyAlgorithm::*;
        match val {
            1 => Rsa,
            2 => RsaEncrypt,
            3 => RsaSign,
            16 => ElgamalEncrypt,
            17 => Dsa,
            18 => Ec,
            19 => Ecdsa,
            20 => Elgamal,
            21 => Dh,
            22 => EdDsa,
            other => Unknown(other),
        }
    }

    pub fn value(self) -> u8 {
        use self::PubkeyAlgorithm::*;
        match self {
            Rsa => 1,
            RsaEncrypt => 2,
            RsaSign => 3,
            ElgamalEncrypt => 16,
            Dsa => 17,
            Ec => 18,
            Ecdsa => 19,
            Elgamal => 20,
            Dh => 21,
            EdDsa => 22,
            Unknown(other) => other,
        }
    }

    pub fn name(self) -> &'static str {
        use self::PubkeyAlgorithm::*;
        match self {
            Rsa => "RSA",
            RsaEncrypt => "RSA(Encrypt-Only)",
            RsaSign => "RSA(Sign-Only)",
            ElgamalEncrypt => "ELG(Encrypt-Only)",
            Dsa => "DSA",
            Ec => "ECC",
            Ecdsa => "ECDSA",
            Elgamal => "ELG",
            Dh => "DH",
            EdDsa => "EDDSA",
            Unknown(_) => "KEY_UNKNOWN",
        }
    }
}

impl fmt::Display for PubkeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// https://tools.ietf.org/html/rfc4880#section-5.2.1
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignatureType {
    Binary,
    Text,
    Standalone,
    GenericCert,
    PersonaCert,
    CasualCert,
    PositiveCert,
    SubkeyBinding,
    KeyBinding,
    DirectKey,
    KeyRevoke,
    SubkeyRevoke,
    CertRevoke,
    Timestamp,
    Confirm,
    Unknown(u8),
}

impl SignatureType {
    pub fn from_u8(val: u8) -> SignatureType {
        use self::SignatureType::*;
        match val {
            0x00 => Binary,
            0x01 => Text,
            0x02 => Standalone,
            0x10 => GenericCert,
            0x11 => PersonaCert,
            0x12 => CasualCert,
            0x13 => PositiveCert,
            0x18 => SubkeyBinding,
            0x19 => KeyBinding,
            0x1f => DirectKey,
            0x20 => KeyRevoke,
            0x28 => SubkeyRevoke,
            0x30 => CertRevoke,
            0x40 => Timestamp,
            0x50 => Confirm,
            other => Unknown(other),
        }
    }

    pub fn value(self) -> u8 {
        use self::SignatureType::*;
        match self {
            Binary => 0x00,
            Text => 0x01,
            Standalone => 0x02,
            GenericCert => 0x10,
            PersonaCert => 0x11,
            CasualCert => 0x12,
            PositiveCert => 0x13,
            SubkeyBinding => 0x18,
            KeyBinding => 0x19,
            DirectKey => 0x1f,
            KeyRevoke => 0x20,
            SubkeyRevoke => 0x28,
            CertRevoke => 0x30,
            Timestamp => 0x40,
            Confirm => 0x50,
            Unknown(other) => other,
        }
    }

    pub fn name(self) -> &'static str {
        use self::SignatureType::*;
        match self {
            Binary => "BINARY",
            Text => "TEXT",
            Standalone => "STANDALONE",
            GenericCert => "GENERIC",
            PersonaCert => "PERSONA",
            CasualCert => "CASUAL",
            PositiveCert => "POSITIVE",
            SubkeyBinding => "SUBKEY_BIND",
            KeyBinding => "KEY_BIND",
            DirectKey => "KEY",
            KeyRevoke => "KEY_REVOKE",
            SubkeyRevoke => "SUBKEY_REVOKE",
            CertRevoke => "CERT_REVOKE",
            Timestamp => "TIMESTAMP",
            Confirm => "CONFIRM",
            Unknown(_) => "SIG_UNKNOWN",
        }
    }

    /// Signatures over documents, or a user id self-certification: the
    /// kinds whose creation time and issuer describe the signer.
    pub fn is_primary(self) -> bool {
        use self::SignatureType::*;
        match self {
            Binary | Text | Standalone | PositiveCert => true,
            _ => false,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// https://tools.ietf.org/html/rfc4880#section-9.2
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymmetricAlgorithm {
    Plaintext,
    Idea,
    TripleDes,
    Cast5,
    Blowfish,
    Safer,
    DesSk,
    Aes128,
    Aes192,
    Aes256,
    Twofish,
    Camellia128,
    Camellia192,
    Camellia256,
    NoEncrypt,
    Unknown(u8),
}

impl SymmetricAlgorithm {
    pub fn from_u8(val: u8) -> SymmetricAlgorithm {
        use self::SymmetricAlgorithm::*;
        match val {
            0 => Plaintext,
            1 => Idea,
            2 => TripleDes,
            3 => Cast5,
            4 => Blowfish,
            5 => Safer,
            6 => DesSk,
            7 => Aes128,
            8 => Aes192,
            9 => Aes256,
            10 => Twofish,
            11 => Camellia128,
            12 => Camellia192,
            13 => Camellia256,
            110 => NoEncrypt,
            other => Unknown(other),
        }
    }

    pub fn name(self) -> &'static str {
        use self::SymmetricAlgorithm::*;
        match self {
            Plaintext => "Plaintext",
            Idea => "IDEA",
            TripleDes => "3DES",
            Cast5 => "CAST5",
            Blowfish => "BLOWFISH",
            Safer => "SAFER",
            DesSk => "DES/SK",
            Aes128 => "AES(128-bit key)",
            Aes192 => "AES(192-bit key)",
            Aes256 => "AES(256-bit key)",
            Twofish => "TWOFISH(256-bit key)",
            Camellia128 => "CAMELLIA(128-bit key)",
            Camellia192 => "CAMELLIA(192-bit key)",
            Camellia256 => "CAMELLIA(256-bit key)",
            NoEncrypt => "no encryption",
            Unknown(_) => "SYM_UNKNOWN",
        }
    }

    /// Cipher block size in bytes, which is also the length of the IV
    /// protecting encrypted secret key material.
    pub fn block_size(self) -> Option<usize> {
        use self::SymmetricAlgorithm::*;
        match self {
            Plaintext | NoEncrypt => Some(0),
            Idea | TripleDes | Cast5 | Blowfish | Safer | DesSk => Some(8),
            Aes128 | Aes192 | Aes256 | Twofish | Camellia128 | Camellia192 | Camellia256 => {
                Some(16)
            }
            Unknown(_) => None,
        }
    }
}

/// https://tools.ietf.org/html/rfc4880#section-9.3
pub fn compression_name(val: u8) -> &'static str {
    match val {
        0 => "Uncompressed",
        1 => "ZIP",
        2 => "ZLIB",
        3 => "BZIP2",
        _ => "Unknown compression algorithm",
    }
}

/// A view of one packet inside a caller-owned buffer.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub tag: Tag,
    header_len: usize,
    raw: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Tag and length fields.
    pub fn header(&self) -> &'a [u8] {
        &self.raw[..self.header_len]
    }

    pub fn body(&self) -> &'a [u8] {
        &self.raw[self.header_len..]
    }

    /// The whole packet, header included.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn total_len(&self) -> usize {
        self.raw.len()
    }
}

impl<'a> fmt::Debug for Packet<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("tag", &self.tag)
            .field("header_len", &self.header_len)
            .field("body_len", &self.body().len())
            .finish()
    }
}

/// Does this look like the start of a binary packet, rather than armor text?
pub fn is_packet(data: &[u8]) -> bool {
    data.first().map_or(false, |&val| is_bit_set(val, 7))
}

/// Decode a packet header: `(tag, header length, body length)`.
///
/// https://tools.ietf.org/html/rfc4880#section-4.2
pub fn packet_len(data: &[u8]) -> Result<(Tag, usize, usize)> {
    let mut from = Cursor::new(data);
    let val = from.read_u8()?;

    ensure_well_formed!(is_bit_set(val, 7), "invalid packet tag: 0x{:02x}", val);

    let tag;
    let len;

    if is_bit_set(val, 6) {
        // new format
        tag = val & 0b0011_1111;
        let first = from.read_u8()?;
        len = match first {
            0..=191 => usize::from(first),
            192..=223 => {
                let second = from.read_u8()?;
                (usize::from(first - 192) << 8) + usize::from(second) + 192
            }
            255 => usize_from_u32(from.read_u32()?),
            _ => malformed!("not supported: partial body length: 0x{:02x}", first),
        };
    } else {
        // old format
        tag = (val & 0b0011_1100) >> 2;
        len = match val & 0b0000_0011 {
            0 => usize::from(from.read_u8()?),
            1 => usize::from(from.read_u16()?),
            2 => usize_from_u32(from.read_u32()?),
            _ => malformed!("not supported: indeterminate length packets"),
        };
    }

    Ok((Tag::from_u8(tag), from.position(), len))
}

/// Frame the first packet in `data`; the packet must fit entirely.
pub fn read_packet(data: &[u8]) -> Result<Packet> {
    let (tag, header_len, body_len) = packet_len(data)?;
    let total = header_len
        .checked_add(body_len)
        .filter(|&total| total <= data.len());
    let total = match total {
        Some(total) => total,
        None => malformed!(
            "{} packet declares {} bytes, only {} available",
            tag,
            body_len,
            data.len() - header_len
        ),
    };

    Ok(Packet {
        tag,
        header_len,
        raw: &data[..total],
    })
}

/// Validate the framing of every packet in a buffer.
pub fn split_packets(mut data: &[u8]) -> Result<Vec<Packet>> {
    ensure_well_formed!(!data.is_empty(), "no packets");

    let mut ret = Vec::new();
    while !data.is_empty() {
        let packet = read_packet(data)?;
        data = &data[packet.total_len()..];
        ret.push(packet);
    }

    Ok(ret)
}

/// Render a comment packet: printable runs as text, anything else as hex.
pub fn render_comment(mut body: &[u8]) -> String {
    let mut ret = String::new();
    while let Some(&first) = body.first() {
        if b' ' <= first && first <= b'z' {
            let text_end = memchr::memchr(0, body).unwrap_or(body.len());
            ret.push_str(&String::from_utf8_lossy(&body[..text_end]));
            let mut end = text_end;
            while end < body.len() && 0 == body[end] {
                end += 1;
            }
            body = &body[end..];
        } else {
            ret.push_str(&hex::encode(body));
            break;
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::packet_len;
    use super::read_packet;
    use super::split_packets;
    use super::Tag;

    fn new_format(len_bytes: &[u8], body_len: usize) -> Vec<u8> {
        let mut data = vec![0xc0 | 2];
        data.extend_from_slice(len_bytes);
        data.resize(data.len() + body_len, 0x42);
        data
    }

    #[test]
    fn new_format_boundaries() {
        for &(bytes, len) in &[
            (&[191u8][..], 191usize),
            (&[0xc0, 0x00][..], 192),
            (&[0xdf, 0xff][..], 8383),
            (&[0xff, 0, 0, 0x20, 0xc0][..], 8384),
        ] {
            let data = new_format(bytes, len);
            let (tag, header, body) = packet_len(&data).unwrap();
            assert_eq!(Tag::Signature, tag);
            assert_eq!(1 + bytes.len(), header);
            assert_eq!(len, body);
            assert_eq!(data.len(), read_packet(&data).unwrap().total_len());
        }
    }

    #[test]
    fn old_format_lengths() {
        // tag 6, each of the three length types
        let (tag, header, body) = packet_len(&[0x98, 0x52]).unwrap();
        assert_eq!((Tag::PublicKey, 2, 0x52), (tag, header, body));
        let (tag, header, body) = packet_len(&[0x99, 0x01, 0x0d]).unwrap();
        assert_eq!((Tag::PublicKey, 3, 0x10d), (tag, header, body));
        let (tag, header, body) = packet_len(&[0x8a, 0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!((Tag::Signature, 5, 0x10000), (tag, header, body));
        assert!(packet_len(&[0x8b]).is_err());
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(packet_len(&[]).is_err());
        assert!(packet_len(&[0x08, 0x01]).is_err());
        assert!(packet_len(&[0xc2, 0xe0]).is_err());
        assert!(packet_len(&[0xc2, 0xc0]).is_err());
        assert!(packet_len(&[0xc2, 0xff, 0, 0]).is_err());
    }

    #[test]
    fn truncated() {
        assert!(read_packet(&[0x88, 0x05, 1, 2, 3, 4]).is_err());
        assert!(read_packet(&[0xc2, 0xff, 0xff, 0xff, 0xff, 0xff, 1]).is_err());
        assert!(split_packets(&[0xb4, 0x01, b'a', 0xb4, 0x02, b'b']).is_err());
        assert!(split_packets(&[]).is_err());
    }

    #[test]
    fn splits() {
        let packets = split_packets(&[0xb4, 0x01, b'a', 0xcd, 0x02, b'b', b'c']).unwrap();
        assert_eq!(2, packets.len());
        assert_eq!(Tag::UserId, packets[0].tag);
        assert_eq!(b"a", packets[0].body());
        assert_eq!(Tag::UserId, packets[1].tag);
        assert_eq!(b"bc", packets[1].body());
        assert_eq!(&[0xcd, 0x02], packets[1].header());
    }

    #[test]
    fn comments() {
        assert_eq!("hello", super::render_comment(b"hello"));
        assert_eq!("hi there", super::render_comment(b"hi\0\0 there"));
        assert_eq!("ok0102", super::render_comment(b"ok\0\x01\x02"));
    }
}
