use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;

use crate::errors::ArmorError;
use crate::packets;
use crate::packets::Tag;

const BEGIN: &[u8] = b"-----BEGIN PGP ";
const END: &[u8] = b"-----END PGP ";
const DASHES: &[u8] = b"-----";

static CRC24: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_24_OPENPGP);

const LINE_LEN: usize = 64;

/// https://tools.ietf.org/html/rfc4880#section-6.2
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArmorKind {
    Message = 1,
    PublicKey = 2,
    Signature = 3,
    SignedMessage = 4,
    File = 5,
    PrivateKey = 6,
    SecretKey = 7,
}

const KINDS: [ArmorKind; 7] = [
    ArmorKind::Message,
    ArmorKind::PublicKey,
    ArmorKind::Signature,
    ArmorKind::SignedMessage,
    ArmorKind::File,
    ArmorKind::PrivateKey,
    ArmorKind::SecretKey,
];

impl ArmorKind {
    pub fn name(self) -> &'static str {
        match self {
            ArmorKind::Message => "MESSAGE",
            ArmorKind::PublicKey => "PUBLIC KEY BLOCK",
            ArmorKind::Signature => "SIGNATURE",
            ArmorKind::SignedMessage => "SIGNED MESSAGE",
            ArmorKind::File => "ARMORED FILE",
            ArmorKind::PrivateKey => "PRIVATE KEY BLOCK",
            ArmorKind::SecretKey => "SECRET KEY BLOCK",
        }
    }

    /// The kind whose name `line` starts with.
    fn prefix_of(line: &[u8]) -> Option<ArmorKind> {
        KINDS
            .iter()
            .copied()
            .find(|kind| line.starts_with(kind.name().as_bytes()))
    }
}

impl fmt::Display for ArmorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// https://tools.ietf.org/html/rfc4880#section-6.1
pub fn crc24(data: &[u8]) -> u32 {
    CRC24.checksum(data)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unarmored {
    /// `None` for binary input whose first packet is neither a key nor a signature.
    pub kind: Option<ArmorKind>,
    pub headers: Vec<(String, String)>,
    pub data: Vec<u8>,
}

enum State<'a> {
    FindBegin,
    Headers(ArmorKind),
    Body(ArmorKind, Vec<&'a [u8]>),
    End(ArmorKind, Vec<&'a [u8]>, &'a [u8]),
}

/// Strip ASCII armor, checking the CRC; binary packets pass through untouched.
pub fn unarmor(input: &[u8]) -> Result<Unarmored, ArmorError> {
    if packets::is_packet(input) {
        let kind = match packets::packet_len(input).map(|(tag, _, _)| tag) {
            Ok(Tag::PublicKey) => Some(ArmorKind::PublicKey),
            Ok(Tag::Signature) => Some(ArmorKind::Signature),
            _ => None,
        };
        return Ok(Unarmored {
            kind,
            headers: Vec::new(),
            data: input.to_vec(),
        });
    }

    let mut state = State::FindBegin;
    let mut headers = Vec::new();

    for line in input.split(|&b| b'\n' == b) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        state = match state {
            State::FindBegin => match begin_line(line)? {
                Some(kind) => {
                    headers.clear();
                    State::Headers(kind)
                }
                None => State::FindBegin,
            },
            State::Headers(kind) => {
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    State::Body(kind, Vec::new())
                } else if let Some(header) = parse_header(line) {
                    headers.push(header);
                    State::Headers(kind)
                } else {
                    State::FindBegin
                }
            }
            State::Body(kind, mut body) => {
                if line.starts_with(b"=") {
                    State::End(kind, body, &line[1..])
                } else if line.starts_with(END) {
                    return Err(ArmorError::CrcDecode);
                } else {
                    body.push(line);
                    State::Body(kind, body)
                }
            }
            State::End(kind, body, crc) => {
                let mut expected = END.to_vec();
                expected.extend_from_slice(kind.name().as_bytes());
                expected.extend_from_slice(DASHES);
                if trim_end(line) != expected.as_slice() {
                    return Err(ArmorError::NoEnd);
                }

                let data = decode_body(&body)?;
                check_crc(&data, crc)?;
                debug!("unarmored {}: {} bytes", kind, data.len());

                return Ok(Unarmored {
                    kind: Some(kind),
                    headers,
                    data,
                });
            }
        };
    }

    match state {
        State::FindBegin => Err(ArmorError::NoBegin),
        _ => Err(ArmorError::NoEnd),
    }
}

fn begin_line(line: &[u8]) -> Result<Option<ArmorKind>, ArmorError> {
    let rest = match line.strip_prefix(BEGIN) {
        Some(rest) => rest,
        None => return Ok(None),
    };

    let kind = ArmorKind::prefix_of(rest).ok_or(ArmorError::UnknownType)?;

    // the signature block of a clearsigned message follows
    if ArmorKind::SignedMessage == kind || &rest[kind.name().len()..] != DASHES {
        return Ok(None);
    }

    Ok(Some(kind))
}

fn parse_header(line: &[u8]) -> Option<(String, String)> {
    let line = std::str::from_utf8(line).ok()?;
    let colon = line.find(": ")?;
    let (key, value) = line.split_at(colon);
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), value[2..].trim_end().to_string()))
}

fn decode_body(lines: &[&[u8]]) -> Result<Vec<u8>, ArmorError> {
    let mut encoded = Vec::with_capacity(lines.len() * LINE_LEN);
    for line in lines {
        encoded.extend(line.iter().filter(|b| !b.is_ascii_whitespace()));
    }
    STANDARD
        .decode(&encoded)
        .map_err(|_| ArmorError::BodyDecode)
}

fn check_crc(data: &[u8], encoded: &[u8]) -> Result<(), ArmorError> {
    let crc = STANDARD
        .decode(trim_end(encoded))
        .map_err(|_| ArmorError::CrcDecode)?;
    if 3 != crc.len() {
        return Err(ArmorError::CrcDecode);
    }

    let stated = (u32::from(crc[0]) << 16) | (u32::from(crc[1]) << 8) | u32::from(crc[2]);
    if stated != crc24(data) {
        return Err(ArmorError::CrcMismatch);
    }
    Ok(())
}

fn trim_end(buf: &[u8]) -> &[u8] {
    for i in (0..buf.len()).rev() {
        if !buf[i].is_ascii_whitespace() {
            return &buf[..=i];
        }
    }

    &[]
}

/// ASCII armor `data` as a block of the given kind.
pub fn wrap(kind: ArmorKind, data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut ret = String::with_capacity(encoded.len() * 65 / 64 + 128);

    ret.push_str("-----BEGIN PGP ");
    ret.push_str(kind.name());
    ret.push_str("-----\n");
    ret.push_str("Version: pgpdig ");
    ret.push_str(env!("CARGO_PKG_VERSION"));
    ret.push_str("\n\n");

    // base64 output is ascii, so splitting on bytes is safe
    for line in encoded.as_bytes().chunks(LINE_LEN) {
        ret.push_str(&String::from_utf8_lossy(line));
        ret.push('\n');
    }

    let crc = crc24(data);
    ret.push('=');
    ret.push_str(&STANDARD.encode([(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]));
    ret.push('\n');

    ret.push_str("-----END PGP ");
    ret.push_str(kind.name());
    ret.push_str("-----\n");
    ret
}
