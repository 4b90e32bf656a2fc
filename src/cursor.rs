use byteorder::BigEndian;
use byteorder::ByteOrder;

use crate::errors::Result;

/// A read-only view over a byte slice that only moves forwards.
///
/// Every read checks the remaining length first, so a short buffer is a
/// `Malformed` error instead of a panic.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        0 == self.remaining()
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        ensure_well_formed!(
            len <= self.remaining(),
            "wanted {} bytes at offset {}, only {} left",
            len,
            self.pos,
            self.remaining()
        );
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.take(N)?);
        Ok(ret)
    }

    /// A length-prefixed region, with a two byte length.
    pub fn read_u16_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()?;
        self.take(usize::from(len))
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.pos;
        self.pos = self.data.len();
        &self.data[start..]
    }

    /// Everything consumed so far.
    pub fn consumed(&self) -> &'a [u8] {
        &self.data[..self.pos]
    }
}
