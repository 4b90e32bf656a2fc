use std::collections::HashMap;
use std::io;

use log::debug;
use log::warn;
use zeroize::Zeroize;
use zeroize::Zeroizing;

use crate::backend;
use crate::backend::Backend;
use crate::backend::BackendState;
use crate::backend::MpiItem;
use crate::digestable::DigestContext;
use crate::digestable::DigestFlags;
use crate::digestable::Encoding;
use crate::errors::Result;
use crate::key;
use crate::key::KeyMaterial;
use crate::key::KeyPacket;
use crate::packets;
use crate::packets::Packet;
use crate::packets::PubkeyAlgorithm;
use crate::packets::SignatureType;
use crate::packets::Tag;
use crate::registry::HashAlgorithm;
use crate::signature;
use crate::signature::SignaturePacket;

/// Parameters extracted from one signature or public key packet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigParams {
    /// The packet these came from; `None` until populated.
    pub tag: Option<Tag>,
    pub version: u8,
    pub time: Option<u32>,
    pub pubkey_algo: Option<PubkeyAlgorithm>,
    pub hash_algo: u8,
    pub sigtype: Option<SignatureType>,
    /// Signed material that follows the payload in the hash.
    pub hash: Vec<u8>,
    pub signhash16: [u8; 2],
    /// Issuer for signatures, key id for keys.
    pub signid: Option<[u8; 8]>,
    pub userid: Option<String>,
    pub expire: Option<u32>,
    pub key_expire: Option<u32>,
}

impl DigParams {
    pub fn is_populated(&self) -> bool {
        self.tag.is_some()
    }

    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_id(self.hash_algo)
    }

    fn from_signature(tag: Tag, sig: &SignaturePacket) -> DigParams {
        DigParams {
            tag: Some(tag),
            version: sig.version,
            time: sig.time,
            pubkey_algo: Some(sig.pubkey_algo),
            hash_algo: sig.hash_algo,
            sigtype: Some(sig.sigtype),
            hash: sig.hashed.to_vec(),
            signhash16: sig.signhash16,
            signid: sig.signid,
            userid: None,
            expire: sig.expire,
            key_expire: sig.key_expire,
        }
    }

    fn from_key(tag: Tag, key: &KeyPacket) -> DigParams {
        DigParams {
            tag: Some(tag),
            version: key.version,
            time: Some(key.time),
            pubkey_algo: Some(key.pubkey_algo),
            signid: key.keyid().ok(),
            ..DigParams::default()
        }
    }

    fn clean(&mut self) {
        self.hash.zeroize();
        if let Some(ref mut userid) = self.userid {
            userid.zeroize();
        }
        *self = DigParams::default();
    }
}

/// Everything needed to verify one signature: parsed parameters, running
/// payload digests and provider state.
pub struct Dig {
    signature: DigParams,
    pubkey: DigParams,
    packets: Vec<(Tag, usize)>,
    digests: HashMap<HashAlgorithm, DigestContext>,
    finalized: HashMap<HashAlgorithm, Zeroizing<Vec<u8>>>,
    state: Box<dyn BackendState>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Target {
    Signature,
    Pubkey,
}

impl Dig {
    /// A container using the process-wide backend.
    pub fn new() -> Result<Dig> {
        Ok(Self::with_backend(backend::active()?))
    }

    pub fn with_backend(backend: &dyn Backend) -> Dig {
        Dig {
            signature: DigParams::default(),
            pubkey: DigParams::default(),
            packets: Vec::new(),
            digests: HashMap::new(),
            finalized: HashMap::new(),
            state: backend.init(),
        }
    }

    pub fn signature(&self) -> &DigParams {
        &self.signature
    }

    pub fn pubkey(&self) -> &DigParams {
        &self.pubkey
    }

    /// Tag and total length of each packet seen by the last `process`.
    pub fn packets(&self) -> &[(Tag, usize)] {
        &self.packets
    }

    pub fn backend_state(&mut self) -> &mut dyn BackendState {
        self.state.as_mut()
    }

    /// Decode every packet in `data`.
    ///
    /// A leading signature packet fills the signature parameters, anything
    /// else the public key parameters; only the first packet with that tag
    /// is captured, and only if nothing was captured before. Other packets
    /// that fail to decode are skipped.
    pub fn process(&mut self, data: &[u8]) -> Result<usize> {
        let packets = packets::split_packets(data)?;
        let first = packets[0].tag;
        let target = if Tag::Signature == first {
            Target::Signature
        } else {
            Target::Pubkey
        };

        self.packets = packets.iter().map(|p| (p.tag, p.total_len())).collect();

        for packet in &packets {
            let capture = packet.tag == first && !self.params_mut(target).is_populated();
            match self.apply(packet, capture, target) {
                Err(e) if !capture => warn!("skipping {} packet: {}", packet.tag, e),
                other => other?,
            }
        }

        Ok(packets.len())
    }

    fn params_mut(&mut self, target: Target) -> &mut DigParams {
        match target {
            Target::Signature => &mut self.signature,
            Target::Pubkey => &mut self.pubkey,
        }
    }

    fn apply(&mut self, packet: &Packet, capture: bool, target: Target) -> Result<()> {
        match packet.tag {
            Tag::Signature => {
                let sig = signature::parse_signature(packet.body())?;
                if capture {
                    let params = DigParams::from_signature(packet.tag, &sig);
                    if let SignatureType::Binary | SignatureType::Text = sig.sigtype {
                        self.absorb_signature(&sig)?;
                    }
                    *self.params_mut(target) = params;
                }
            }
            Tag::PublicKey | Tag::PublicSubkey | Tag::SecretKey | Tag::SecretSubkey => {
                let key = key::parse_key(packet.tag, packet.body())?;
                if capture {
                    let params = DigParams::from_key(packet.tag, &key);
                    self.absorb_key(&key)?;
                    *self.params_mut(target) = params;
                }
            }
            Tag::UserId => {
                let userid = String::from_utf8_lossy(packet.body()).into_owned();
                debug!("User ID: {:?}", userid);
                self.params_mut(target).userid = Some(userid);
            }
            Tag::Comment | Tag::CommentOld => {
                debug!("{}: {}", packet.tag, packets::render_comment(packet.body()));
            }
            other => {
                debug!("{}({}): {} bytes", other, other.value(), packet.body().len());
            }
        }

        Ok(())
    }

    fn absorb_signature(&mut self, sig: &SignaturePacket) -> Result<()> {
        let items: &[MpiItem] = match sig.pubkey_algo {
            PubkeyAlgorithm::Rsa | PubkeyAlgorithm::RsaSign => &[MpiItem::RsaM],
            PubkeyAlgorithm::Dsa => &[MpiItem::DsaR, MpiItem::DsaS],
            PubkeyAlgorithm::Ecdsa => &[MpiItem::EcdsaR, MpiItem::EcdsaS],
            _ => &[],
        };

        for (&item, value) in items.iter().zip(sig.mpis.iter()) {
            self.state.mpi_item(item, value)?;
        }
        Ok(())
    }

    fn absorb_key(&mut self, key: &KeyPacket) -> Result<()> {
        match key.material {
            KeyMaterial::Rsa { n, e } => {
                self.state.mpi_item(MpiItem::RsaN, n)?;
                self.state.mpi_item(MpiItem::RsaE, e)?;
            }
            KeyMaterial::Dsa { p, q, g, y } => {
                self.state.mpi_item(MpiItem::DsaP, p)?;
                self.state.mpi_item(MpiItem::DsaQ, q)?;
                self.state.mpi_item(MpiItem::DsaG, g)?;
                self.state.mpi_item(MpiItem::DsaY, y)?;
            }
            KeyMaterial::Ecdsa { oid, point } => {
                self.state.mpi_item(MpiItem::EcdsaCurve, oid)?;
                self.state.mpi_item(MpiItem::EcdsaQ, point)?;
            }
            KeyMaterial::Elgamal { .. } | KeyMaterial::EdDsa { .. } => (),
        }
        Ok(())
    }

    /// Start hashing the payload with `algorithm`, if not already doing so.
    pub fn begin_digest(&mut self, algorithm: HashAlgorithm) -> Result<()> {
        if !self.digests.contains_key(&algorithm) {
            let ctx = DigestContext::init(algorithm, DigestFlags::NONE)?;
            self.digests.insert(algorithm, ctx);
        }
        Ok(())
    }

    /// Feed payload bytes to every running digest.
    pub fn update(&mut self, data: &[u8]) {
        for ctx in self.digests.values_mut() {
            ctx.update(data);
        }
    }

    pub fn digest(&self, algorithm: HashAlgorithm) -> Option<&DigestContext> {
        self.digests.get(&algorithm)
    }

    pub fn digest_mut(&mut self, algorithm: HashAlgorithm) -> Option<&mut DigestContext> {
        self.digests.get_mut(&algorithm)
    }

    /// Stop tracking a running digest, handing it to the caller.
    pub fn take_digest(&mut self, algorithm: HashAlgorithm) -> Option<DigestContext> {
        self.digests.remove(&algorithm)
    }

    /// Finish every running digest, keeping the raw results.
    pub fn finalize_digests(&mut self) {
        for (algorithm, ctx) in self.digests.drain() {
            self.finalized
                .insert(algorithm, Zeroizing::new(ctx.finalize(Encoding::Binary)));
        }
    }

    pub fn finalized(&self, algorithm: HashAlgorithm) -> Option<&[u8]> {
        self.finalized.get(&algorithm).map(|d| d.as_slice())
    }

    /// Drop the captured public key so another one can be processed.
    /// Provider values are overwritten by the next key.
    pub fn forget_pubkey(&mut self) {
        self.pubkey.clean();
    }

    /// Forget everything, wiping digests and parameters.
    pub fn clean(&mut self) {
        self.signature.clean();
        self.pubkey.clean();
        self.packets.clear();
        self.digests.clear();
        self.finalized.clear();
        self.state.clean();
    }
}

impl io::Write for Dig {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Dig {
    fn drop(&mut self) {
        self.clean();
    }
}

#[cfg(test)]
mod tests {
    use super::Dig;
    use crate::backend::backend_for;
    use crate::config::BackendKind;
    use crate::packets::Tag;
    use crate::registry::HashAlgorithm;

    fn dig() -> Dig {
        Dig::with_backend(backend_for(BackendKind::Builtin).unwrap())
    }

    fn sig_packet(time: u8, issuer: u8) -> Vec<u8> {
        let hashed = [5, 2, 0, 0, 0, time];
        let unhashed = [9, 16, issuer, 0, 0, 0, 0, 0, 0, 0];
        let mut body = vec![4, 0x00, 1, 8, 0, hashed.len() as u8];
        body.extend_from_slice(&hashed);
        body.extend_from_slice(&[0, unhashed.len() as u8]);
        body.extend_from_slice(&unhashed);
        body.extend_from_slice(&[0xab, 0xcd, 0, 1, 1]);
        let mut packet = vec![0xc2, body.len() as u8];
        packet.extend_from_slice(&body);
        packet
    }

    #[test]
    fn first_signature_wins() {
        let mut data = sig_packet(1, 0xaa);
        data.extend_from_slice(&sig_packet(2, 0xbb));

        let mut dig = dig();
        assert_eq!(2, dig.process(&data).unwrap());
        assert_eq!(Some(1), dig.signature().time);
        assert_eq!(0xaa, dig.signature().signid.unwrap()[0]);
        assert_eq!(Some(HashAlgorithm::Sha256), dig.signature().hash_algorithm());
        assert!(!dig.pubkey().is_populated());
        assert_eq!(&[(Tag::Signature, 31), (Tag::Signature, 31)], dig.packets());

        // a later call does not replace what was captured
        dig.process(&sig_packet(3, 0xcc)).unwrap();
        assert_eq!(Some(1), dig.signature().time);
    }

    #[test]
    fn failure_leaves_params_alone() {
        let mut data = sig_packet(1, 0xaa);
        data.truncate(data.len() - 1);
        let mut dig = dig();
        assert!(dig.process(&data).is_err());
        assert!(!dig.signature().is_populated());
    }

    #[test]
    fn user_id_goes_to_target() {
        let mut dig = dig();
        dig.process(&[0xb4, 3, b'b', b'o', b'b', 0xb4, 1, b'x'])
            .unwrap();
        assert_eq!(Some("x"), dig.pubkey().userid.as_deref());
        assert!(!dig.pubkey().is_populated());
    }

    #[test]
    fn digests() {
        let mut dig = dig();
        dig.begin_digest(HashAlgorithm::Sha1).unwrap();
        dig.begin_digest(HashAlgorithm::Md5).unwrap();
        dig.update(b"ab");
        std::io::Write::write_all(&mut dig, b"c").unwrap();
        assert_eq!(
            "a9993e364706816aba3e25717850c26c9cd0d89d",
            dig.digest(HashAlgorithm::Sha1).unwrap().dup().finalize_hex()
        );
        dig.finalize_digests();
        assert!(dig.digest(HashAlgorithm::Md5).is_none());
        assert_eq!(
            "900150983cd24fb0d6963f7d28e17f72",
            hex::encode(dig.finalized(HashAlgorithm::Md5).unwrap())
        );

        dig.clean();
        assert!(dig.finalized(HashAlgorithm::Md5).is_none());
    }

    #[test]
    fn undecodable_subkey_is_skipped() {
        let mut data = include_bytes!("../tests/data/rsa.pub").to_vec();
        let expected = {
            let mut dig = dig();
            dig.process(&data).unwrap();
            dig.pubkey().clone()
        };

        // V4 public subkey, algorithm 18 (ECDH)
        let body = [4, 0x5f, 0, 0, 0, 18, 3, 0x2b, 0x65, 0x6e, 0, 7, 0x40];
        data.push(0xce);
        data.push(body.len() as u8);
        data.extend_from_slice(&body);

        let mut dig = dig();
        assert_eq!(4, dig.process(&data).unwrap());
        assert_eq!(&expected, dig.pubkey());
        assert_eq!(Some(&(Tag::PublicSubkey, 15)), dig.packets().last());
    }

    #[test]
    fn undecodable_captured_packet_fails() {
        let mut dig = dig();
        assert!(dig.process(&[0xc6, 6, 4, 0x5f, 0, 0, 0, 18]).is_err());
        assert!(!dig.pubkey().is_populated());
    }
}
