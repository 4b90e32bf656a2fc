use std::fmt;
use std::mem::size_of;

use digest::consts::U128;
use digest::consts::U32;
use digest::consts::U64;
use digest::Digest;

/// Digest identifiers, numbered as in the OpenPGP hash algorithm registry,
/// extended with private-use values for non-OpenPGP checksums and hashes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HashAlgorithm {
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,
    Md2 = 5,
    Tiger192 = 6,
    Haval5_160 = 7,
    Sha256 = 8,
    Sha384 = 9,
    Sha512 = 10,
    Sha224 = 11,
    Md4 = 104,
    Ripemd128 = 105,
    Crc32 = 106,
    Adler32 = 107,
    Crc64 = 108,
    Jlu32 = 109,
    Ripemd256 = 111,
    Ripemd320 = 112,
    Keccak224 = 144,
    Keccak256 = 145,
    Keccak384 = 146,
    Keccak512 = 147,
    Skein256 = 161,
    Skein512 = 163,
    Skein1024 = 164,
}

const ALL: [HashAlgorithm; 25] = [
    HashAlgorithm::Md5,
    HashAlgorithm::Sha1,
    HashAlgorithm::Ripemd160,
    HashAlgorithm::Md2,
    HashAlgorithm::Tiger192,
    HashAlgorithm::Haval5_160,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha512,
    HashAlgorithm::Sha224,
    HashAlgorithm::Md4,
    HashAlgorithm::Ripemd128,
    HashAlgorithm::Crc32,
    HashAlgorithm::Adler32,
    HashAlgorithm::Crc64,
    HashAlgorithm::Jlu32,
    HashAlgorithm::Ripemd256,
    HashAlgorithm::Ripemd320,
    HashAlgorithm::Keccak224,
    HashAlgorithm::Keccak256,
    HashAlgorithm::Keccak384,
    HashAlgorithm::Keccak512,
    HashAlgorithm::Skein256,
    HashAlgorithm::Skein512,
    HashAlgorithm::Skein1024,
];

impl HashAlgorithm {
    pub fn from_id(id: u8) -> Option<HashAlgorithm> {
        ALL.iter().copied().find(|alg| alg.id() == id)
    }

    /// Case-insensitive lookup by display name, e.g. `sha256`.
    pub fn from_name(name: &str) -> Option<HashAlgorithm> {
        ALL.iter()
            .copied()
            .find(|alg| alg.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        use self::HashAlgorithm::*;
        match self {
            Md5 => "MD5",
            Sha1 => "SHA1",
            Ripemd160 => "RIPEMD160",
            Md2 => "MD2",
            Tiger192 => "TIGER192",
            Haval5_160 => "HAVAL-5-160",
            Sha256 => "SHA256",
            Sha384 => "SHA384",
            Sha512 => "SHA512",
            Sha224 => "SHA224",
            Md4 => "MD4",
            Ripemd128 => "RIPEMD128",
            Crc32 => "CRC32",
            Adler32 => "ADLER32",
            Crc64 => "CRC64",
            Jlu32 => "JLU32",
            Ripemd256 => "RIPEMD256",
            Ripemd320 => "RIPEMD320",
            Keccak224 => "KECCAK224",
            Keccak256 => "KECCAK256",
            Keccak384 => "KECCAK384",
            Keccak512 => "KECCAK512",
            Skein256 => "SKEIN256",
            Skein512 => "SKEIN512",
            Skein1024 => "SKEIN1024",
        }
    }

    /// The registered implementation, if this build has one.
    pub fn descriptor(self) -> Option<&'static DigestDescriptor> {
        DESCRIPTORS.iter().find(|d| d.algorithm == self)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running state of one digest computation.
pub trait HashState: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn box_clone(&self) -> Box<dyn HashState>;
}

struct Hasher<D>(D);

impl<D: Digest + Clone + Send + 'static> HashState for Hasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data)
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn box_clone(&self) -> Box<dyn HashState> {
        Box::new(Hasher(self.0.clone()))
    }
}

fn new_hasher<D: Digest + Clone + Send + 'static>() -> Box<dyn HashState> {
    Box::new(Hasher(D::new()))
}

#[derive(Clone)]
struct Crc32(crc32fast::Hasher);

impl HashState for Crc32 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_be_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn HashState> {
        Box::new(self.clone())
    }
}

fn new_crc32() -> Box<dyn HashState> {
    Box::new(Crc32(crc32fast::Hasher::new()))
}

#[derive(Clone)]
struct Adler32(adler::Adler32);

impl HashState for Adler32 {
    fn update(&mut self, data: &[u8]) {
        self.0.write_slice(data)
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.checksum().to_be_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn HashState> {
        Box::new(self.clone())
    }
}

fn new_adler32() -> Box<dyn HashState> {
    Box::new(Adler32(adler::Adler32::new()))
}

static CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_XZ);

#[derive(Clone)]
struct Crc64(crc::Digest<'static, u64>);

impl HashState for Crc64 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_be_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn HashState> {
        Box::new(self.clone())
    }
}

fn new_crc64() -> Box<dyn HashState> {
    Box::new(Crc64(CRC64.digest()))
}

/// Everything known about one registered digest algorithm.
pub struct DigestDescriptor {
    pub algorithm: HashAlgorithm,
    pub name: &'static str,
    /// Size of the in-memory state record.
    pub context_size: usize,
    pub block_size: usize,
    pub digest_size: usize,
    /// DER-encoded `DigestInfo` prefix, as hex, for PKCS#1 signatures.
    pub asn1: Option<&'static str>,
    pub hmac: bool,
    pub new: fn() -> Box<dyn HashState>,
}

impl DigestDescriptor {
    pub fn asn1_bytes(&self) -> Option<Vec<u8>> {
        self.asn1.and_then(|prefix| hex::decode(prefix).ok())
    }
}

impl fmt::Debug for DigestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DigestDescriptor")
            .field("name", &self.name)
            .field("block_size", &self.block_size)
            .field("digest_size", &self.digest_size)
            .finish()
    }
}

macro_rules! hash_descriptor {
    ($alg:ident, $ty:ty, $block:expr, $size:expr, $asn1:expr) => {
        DigestDescriptor {
            algorithm: HashAlgorithm::$alg,
            name: HashAlgorithm::$alg.name(),
            context_size: size_of::<$ty>(),
            block_size: $block,
            digest_size: $size,
            asn1: $asn1,
            hmac: true,
            new: new_hasher::<$ty>,
        }
    };
}

macro_rules! checksum_descriptor {
    ($alg:ident, $ty:ty, $size:expr, $new:expr) => {
        DigestDescriptor {
            algorithm: HashAlgorithm::$alg,
            name: HashAlgorithm::$alg.name(),
            context_size: size_of::<$ty>(),
            block_size: 8,
            digest_size: $size,
            asn1: None,
            hmac: false,
            new: $new,
        }
    };
}

static DESCRIPTORS: [DigestDescriptor; 23] = [
    hash_descriptor!(
        Md5,
        md5::Md5,
        64,
        16,
        Some("3020300c06082a864886f70d020505000410")
    ),
    hash_descriptor!(
        Sha1,
        sha1::Sha1,
        64,
        20,
        Some("3021300906052b0e03021a05000414")
    ),
    hash_descriptor!(
        Ripemd160,
        ripemd::Ripemd160,
        64,
        20,
        Some("3021300906052b2403020105000414")
    ),
    hash_descriptor!(
        Md2,
        md2::Md2,
        16,
        16,
        Some("3020300c06082a864886f70d020205000410")
    ),
    hash_descriptor!(
        Tiger192,
        tiger::Tiger,
        64,
        24,
        Some("3029300d06092b06010401da470c0205000418")
    ),
    hash_descriptor!(
        Sha256,
        sha2::Sha256,
        64,
        32,
        Some("3031300d060960864801650304020105000420")
    ),
    hash_descriptor!(
        Sha384,
        sha2::Sha384,
        128,
        48,
        Some("3041300d060960864801650304020205000430")
    ),
    hash_descriptor!(
        Sha512,
        sha2::Sha512,
        128,
        64,
        Some("3051300d060960864801650304020305000440")
    ),
    hash_descriptor!(
        Sha224,
        sha2::Sha224,
        64,
        28,
        Some("302d300d06096086480165030402040500041c")
    ),
    hash_descriptor!(Md4, md4::Md4, 64, 16, None),
    hash_descriptor!(Ripemd128, ripemd::Ripemd128, 64, 16, None),
    hash_descriptor!(Ripemd256, ripemd::Ripemd256, 64, 32, None),
    hash_descriptor!(Ripemd320, ripemd::Ripemd320, 64, 40, None),
    hash_descriptor!(Keccak224, sha3::Keccak224, 144, 28, None),
    hash_descriptor!(Keccak256, sha3::Keccak256, 136, 32, None),
    hash_descriptor!(Keccak384, sha3::Keccak384, 104, 48, None),
    hash_descriptor!(Keccak512, sha3::Keccak512, 72, 64, None),
    hash_descriptor!(Skein256, skein::Skein256<U32>, 32, 32, None),
    hash_descriptor!(Skein512, skein::Skein512<U64>, 64, 64, None),
    hash_descriptor!(Skein1024, skein::Skein1024<U128>, 128, 128, None),
    checksum_descriptor!(Crc32, crc32fast::Hasher, 4, new_crc32),
    checksum_descriptor!(Adler32, adler::Adler32, 4, new_adler32),
    checksum_descriptor!(Crc64, crc::Digest<'static, u64>, 8, new_crc64),
];
