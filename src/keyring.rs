use std::collections::HashMap;
use std::io::Read;

use log::debug;
use log::warn;

use crate::armour;
use crate::errors::Error;
use crate::errors::Result;
use crate::key;
use crate::packets;
use crate::packets::Tag;
use crate::verify::FoundKey;
use crate::verify::KeyLookup;

struct Entry {
    packet: Vec<u8>,
    trusted: bool,
}

/// Public keys and subkeys, indexed by key id.
#[derive(Default)]
pub struct Keyring {
    keys: HashMap<[u8; 8], Vec<Entry>>,
}

impl Keyring {
    pub fn new() -> Self {
        Keyring::default()
    }

    pub fn append_keys_from<R: Read>(&mut self, mut reader: R, trusted: bool) -> Result<usize> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.append_keys(&data, trusted)
    }

    /// Add every public key and subkey in an armored or binary key block.
    pub fn append_keys(&mut self, data: &[u8], trusted: bool) -> Result<usize> {
        let unarmored = armour::unarmor(data)?;
        let mut read = 0;

        for packet in packets::split_packets(&unarmored.data)? {
            match packet.tag {
                Tag::PublicKey | Tag::PublicSubkey => (),
                Tag::Signature | Tag::UserId | Tag::Trust | Tag::PhotoId => continue,
                other => {
                    debug!("skipping {} packet in keyring", other);
                    continue;
                }
            }

            let keyid = match key::parse_key(packet.tag, packet.body()).and_then(|k| k.keyid()) {
                Ok(keyid) => keyid,
                Err(Error::UnsupportedPubkey(algo)) => {
                    warn!("skipping key with unsupported algorithm {}", algo);
                    continue;
                }
                Err(e) => return Err(e),
            };

            debug!("keyring: {} {}", packet.tag, hex::encode(keyid));
            self.keys.entry(keyid).or_default().push(Entry {
                packet: packet.raw().to_vec(),
                trusted,
            });
            read += 1;
        }

        Ok(read)
    }

    /// Every key packet with this id; usually zero or one.
    pub fn keys_with_id(&self, keyid: &[u8; 8]) -> impl Iterator<Item = FoundKey<'_>> {
        self.keys
            .get(keyid)
            .into_iter()
            .flatten()
            .map(|entry| FoundKey {
                packet: &entry.packet,
                trusted: entry.trusted,
            })
    }

    pub fn len(&self) -> usize {
        self.keys.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyLookup for Keyring {
    fn find(&self, keyid: &[u8; 8]) -> Vec<FoundKey<'_>> {
        self.keys_with_id(keyid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Keyring;
    use crate::verify::KeyLookup;

    #[test]
    fn empty() {
        let keyring = Keyring::new();
        assert!(keyring.is_empty());
        assert!(keyring.find(&[0; 8]).is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let mut keyring = Keyring::new();
        assert!(keyring.append_keys(b"not a key", true).is_err());
        assert_eq!(0, keyring.len());
    }
}
