//! OpenPGP signature checking: packet decoding, digests, armor, and
//! pluggable public key verification.

#[macro_use]
mod errors;

pub mod armour;
pub mod backend;
pub mod config;
mod cursor;
pub mod dig;
pub mod digestable;
mod high;
pub mod key;
mod keyring;
mod mpi;
pub mod packets;
pub mod registry;
pub mod signature;
pub mod verify;

pub use crate::armour::unarmor;
pub use crate::armour::ArmorKind;
pub use crate::config::BackendKind;
pub use crate::config::Config;
pub use crate::dig::Dig;
pub use crate::dig::DigParams;
pub use crate::digestable::DigestContext;
pub use crate::digestable::DigestFlags;
pub use crate::digestable::Encoding;
pub use crate::errors::ArmorError;
pub use crate::errors::Error;
pub use crate::errors::Result;
pub use crate::high::read_packets;
pub use crate::high::verify_detached;
pub use crate::key::extract_pubkey_fingerprint;
pub use crate::key::pubkey_fingerprint;
pub use crate::keyring::Keyring;
pub use crate::registry::HashAlgorithm;
pub use crate::verify::verify_signature;
pub use crate::verify::KeyLookup;
pub use crate::verify::Outcome;

fn usize_from_u32(val: u32) -> usize {
    assert!(u64::from(val) <= usize::MAX as u64);
    val as usize
}
