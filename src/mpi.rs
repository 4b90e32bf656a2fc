use crate::cursor::Cursor;
use crate::errors::Result;

/// https://tools.ietf.org/html/rfc4880#section-3.2
///
/// Returns the magnitude bytes, borrowed from the packet.
pub fn read_mpi<'a>(from: &mut Cursor<'a>) -> Result<&'a [u8]> {
    let bits = from.read_u16()?;
    if 0 == bits {
        return Ok(&[]);
    }

    let bytes = (usize::from(bits) + 7) / 8;
    ensure_well_formed!(
        bytes <= from.remaining(),
        "mpi of {} bits overruns packet, only {} bytes left",
        bits,
        from.remaining()
    );
    let data = from.take(bytes)?;

    let first_byte = data[0];
    let leading_bits = bits % 8;

    let first_bit_position = if 0 == leading_bits {
        0
    } else {
        (8 - leading_bits) as u8
    };

    for i in 0..first_bit_position {
        ensure_well_formed!(
            !is_bit_set(first_byte, 7 - i),
            "invalid MPI encoding: leading bits must be zero"
        );
    }

    ensure_well_formed!(
        is_bit_set(first_byte, 7 - first_bit_position),
        "invalid MPI encoding: first bit must be set"
    );

    Ok(data)
}

/// The bit length an MPI header would declare for these magnitude bytes.
pub fn bit_len(mpi: &[u8]) -> usize {
    let mpi = strip_leading_zeros(mpi);
    match mpi.first() {
        None => 0,
        Some(&first) => (mpi.len() - 1) * 8 + 1 + usize::from(top_bit(first)),
    }
}

pub fn strip_leading_zeros(mut mpi: &[u8]) -> &[u8] {
    while let Some((&0, rest)) = mpi.split_first() {
        mpi = rest;
    }
    mpi
}

/// Left-pad (or fail) a big-endian magnitude to exactly `len` bytes.
pub fn pad_to(mpi: &[u8], len: usize) -> Option<Vec<u8>> {
    let mpi = strip_leading_zeros(mpi);
    if mpi.len() > len {
        return None;
    }
    let mut ret = vec![0u8; len - mpi.len()];
    ret.extend_from_slice(mpi);
    Some(ret)
}

fn top_bit(val: u8) -> u8 {
    debug_assert_ne!(0, val);
    7 - val.leading_zeros() as u8
}

/// Check if a 0-indexed bit, counted in the traditional way, is set.
/// | 7 6 5 4 3 2 1 0 |
#[inline]
pub fn is_bit_set(value: u8, bit_no: u8) -> bool {
    assert!(bit_no < 8);
    (value & (1 << bit_no)) == (1 << bit_no)
}
