use std::fmt;
use std::io;

use log::trace;
use zeroize::Zeroizing;

use crate::errors::Error;
use crate::errors::Result;
use crate::registry::DigestDescriptor;
use crate::registry::HashAlgorithm;
use crate::registry::HashState;

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Behaviour selected when a context is created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestFlags(u32);

impl DigestFlags {
    pub const NONE: DigestFlags = DigestFlags(0);
    /// `finish` renders lowercase hex instead of raw bytes.
    pub const HEX: DigestFlags = DigestFlags(1);

    pub fn contains(self, other: DigestFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    Hex,
}

/// One in-progress digest computation.
///
/// Finalizing consumes the context; `dup` first to keep going from the same prefix.
pub struct DigestContext {
    desc: &'static DigestDescriptor,
    flags: DigestFlags,
    state: Box<dyn HashState>,
    // always exactly `block_size` long
    salt: Option<Zeroizing<Vec<u8>>>,
    updated: bool,
}

impl DigestContext {
    pub fn init(algorithm: HashAlgorithm, flags: DigestFlags) -> Result<DigestContext> {
        let desc = algorithm
            .descriptor()
            .ok_or_else(|| Error::UnsupportedDigest(algorithm.id()))?;
        trace!("digest init: {} flags: {:#x}", desc.name, flags.bits());
        Ok(DigestContext {
            desc,
            flags,
            state: (desc.new)(),
            salt: None,
            updated: false,
        })
    }

    pub fn init_id(id: u8, flags: DigestFlags) -> Result<DigestContext> {
        let algorithm = HashAlgorithm::from_id(id).ok_or(Error::UnsupportedDigest(id))?;
        Self::init(algorithm, flags)
    }

    pub fn update(&mut self, data: &[u8]) {
        trace!("digest update: {} {} bytes", self.desc.name, data.len());
        self.state.update(data);
        self.updated = true;
    }

    pub fn dup(&self) -> DigestContext {
        trace!("digest dup: {}", self.desc.name);
        DigestContext {
            desc: self.desc,
            flags: self.flags,
            state: self.state.box_clone(),
            salt: self.salt.clone(),
            updated: self.updated,
        }
    }

    /// Turn this context into the inner half of an HMAC.
    ///
    /// Must be called once, before any data is fed in.
    pub fn hmac_init(&mut self, key: &[u8]) -> Result<()> {
        if !self.desc.hmac {
            return Err(Error::UnsupportedDigest(self.desc.algorithm.id()));
        }
        if self.updated || self.salt.is_some() {
            return Err(Error::HmacTooLate);
        }

        let block_size = self.desc.block_size;
        let mut salt = Zeroizing::new(vec![0u8; block_size]);

        if key.len() > block_size {
            let mut short = (self.desc.new)();
            short.update(key);
            let short = Zeroizing::new(short.finalize());
            salt[..short.len()].copy_from_slice(&short);
        } else {
            salt[..key.len()].copy_from_slice(key);
        }

        let inner: Zeroizing<Vec<u8>> = Zeroizing::new(salt.iter().map(|b| b ^ IPAD).collect());
        self.state.update(&inner);
        self.salt = Some(salt);
        trace!("digest hmac init: {}", self.desc.name);
        Ok(())
    }

    pub fn finalize(self, encoding: Encoding) -> Vec<u8> {
        trace!("digest final: {} {:?}", self.desc.name, encoding);
        let DigestContext {
            desc, state, salt, ..
        } = self;

        let mut out = state.finalize();

        if let Some(salt) = salt {
            let inner = Zeroizing::new(out);
            let outer_pad: Zeroizing<Vec<u8>> =
                Zeroizing::new(salt.iter().map(|b| b ^ OPAD).collect());
            let mut outer = (desc.new)();
            outer.update(&outer_pad);
            outer.update(&inner);
            out = outer.finalize();
        }

        match encoding {
            Encoding::Binary => out,
            Encoding::Hex => {
                let out = Zeroizing::new(out);
                hex::encode(&*out).into_bytes()
            }
        }
    }

    /// Finalize with the encoding chosen by the creation flags.
    pub fn finish(self) -> Vec<u8> {
        let encoding = if self.flags.contains(DigestFlags::HEX) {
            Encoding::Hex
        } else {
            Encoding::Binary
        };
        self.finalize(encoding)
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize(Encoding::Binary))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.desc.algorithm
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn flags(&self) -> DigestFlags {
        self.flags
    }

    pub fn block_size(&self) -> usize {
        self.desc.block_size
    }

    pub fn digest_size(&self) -> usize {
        self.desc.digest_size
    }

    pub fn asn1(&self) -> Option<&'static str> {
        self.desc.asn1
    }

    pub fn is_hmac(&self) -> bool {
        self.salt.is_some()
    }
}

impl fmt::Debug for DigestContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DigestContext")
            .field("algorithm", &self.desc.algorithm)
            .field("flags", &self.flags)
            .field("hmac", &self.salt.is_some())
            .finish()
    }
}

impl io::Write for DigestContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
