//! Packet framing and payload encryption for the local protocol.
//!
//! Every datagram starts with a 32-byte header:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 2 | magic `0x2131` |
//! | 2 | 2 | total packet length |
//! | 4 | 4 | unknown (`0` for requests, `0xFFFFFFFF` in hello) |
//! | 8 | 4 | device id |
//! | 12 | 4 | stamp (seconds, device clock) |
//! | 16 | 16 | MD5 checksum |
//!
//! The payload is AES-128-CBC (PKCS#7) with `key = MD5(token)` and
//! `iv = MD5(key ‖ token)`. The checksum is the MD5 of the whole packet
//! with the token written into the checksum field.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

use crate::error::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const HEADER_LEN: usize = 32;
pub const MAGIC: u16 = 0x2131;

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: u16,
    pub unknown: u32,
    pub device_id: u32,
    pub stamp: u32,
    pub checksum: [u8; 16],
}

/// The discovery/handshake datagram: magic, length 32, everything else `0xFF`.
pub fn hello_packet() -> [u8; HEADER_LEN] {
    let mut packet = [0xFF; HEADER_LEN];
    packet[..2].copy_from_slice(&MAGIC.to_be_bytes());
    packet[2..4].copy_from_slice(&32u16.to_be_bytes());
    packet
}

/// Parse the fixed header without touching the payload.
pub fn parse_header(buf: &[u8]) -> Result<Header, Error> {
    let raw: [u8; HEADER_LEN] = buf
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| Error::Packet(format!("short packet ({} bytes)", buf.len())))?;

    let magic = u16::from_be_bytes([raw[0], raw[1]]);
    if magic != MAGIC {
        return Err(Error::Packet(format!("bad magic {magic:#06x}")));
    }

    let mut checksum = [0u8; 16];
    checksum.copy_from_slice(&raw[16..32]);

    Ok(Header {
        length: u16::from_be_bytes([raw[2], raw[3]]),
        unknown: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        device_id: u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]),
        stamp: u32::from_be_bytes([raw[12], raw[13], raw[14], raw[15]]),
        checksum,
    })
}

fn md5_digest(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A pre-shared device token with its derived cipher material.
#[derive(Clone)]
pub struct DeviceToken {
    token: [u8; 16],
    key: [u8; 16],
    iv: [u8; 16],
}

impl std::fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeviceToken(<redacted>)")
    }
}

impl DeviceToken {
    pub fn from_bytes(token: [u8; 16]) -> Self {
        let key = md5_digest(&[&token[..]]);
        let iv = md5_digest(&[&key[..], &token[..]]);
        Self { token, key, iv }
    }

    /// Parse the usual 32-hex-digit form.
    pub fn from_hex(hex_token: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex_token.trim())
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        let token: [u8; 16] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| Error::InvalidToken(format!("expected 16 bytes, got {}", b.len())))?;
        Ok(Self::from_bytes(token))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Packet("payload does not decrypt with this token".into()))
    }

    /// Frame and encrypt `plaintext` for `device_id`.
    pub fn encode(&self, device_id: u32, stamp: u32, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let payload = self.encrypt(plaintext);
        let length = u16::try_from(HEADER_LEN + payload.len())
            .map_err(|_| Error::Packet(format!("payload too large ({} bytes)", payload.len())))?;

        let mut buf = Vec::with_capacity(usize::from(length));
        buf.extend_from_slice(&MAGIC.to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&device_id.to_be_bytes());
        buf.extend_from_slice(&stamp.to_be_bytes());
        buf.extend_from_slice(&self.token);
        buf.extend_from_slice(&payload);

        let checksum = md5_digest(&[&buf[..]]);
        buf[16..HEADER_LEN].copy_from_slice(&checksum);
        Ok(buf)
    }

    /// Verify and decrypt a packet. Header-only packets yield an empty payload.
    pub fn decode(&self, packet: &[u8]) -> Result<(Header, Vec<u8>), Error> {
        let header = parse_header(packet)?;
        if usize::from(header.length) != packet.len() {
            return Err(Error::Packet(format!(
                "length field {} does not match datagram size {}",
                header.length,
                packet.len()
            )));
        }
        if packet.len() == HEADER_LEN {
            return Ok((header, Vec::new()));
        }

        let payload = &packet[HEADER_LEN..];
        let expected = md5_digest(&[&packet[..16], &self.token[..], payload]);
        if expected != header.checksum {
            return Err(Error::Packet("checksum mismatch".into()));
        }

        Ok((header, self.decrypt(payload)?))
    }
}
