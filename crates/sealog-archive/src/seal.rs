//! Sealed container format (XChaCha20-Poly1305, multi-recipient).
//!
//! A random file key encrypts the container payload once; the file key is
//! wrapped separately under each recipient's key-encryption key, so any one
//! configured recipient can open the archive. The header (magic, version,
//! recipient table) is authenticated as associated data of the payload.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::ArchiveError;

const MAGIC: [u8; 4] = *b"SARC";
const VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
// 32-byte file key plus the 16-byte Poly1305 tag.
const WRAPPED_KEY_LEN: usize = 48;

/// Seal `plain` for every `(key_id, key)` recipient.
pub(crate) fn seal(
    plain: &[u8],
    recipients: &[(String, [u8; 32])],
) -> Result<Vec<u8>, ArchiveError> {
    if recipients.is_empty() {
        return Err(ArchiveError::encryption("no recipient keys resolved"));
    }

    let mut file_key = [0u8; 32];
    OsRng.fill_bytes(&mut file_key);

    let mut header = Vec::new();
    header.extend_from_slice(&MAGIC);
    header.push(VERSION);
    header.extend_from_slice(&(recipients.len() as u16).to_le_bytes());
    for (key_id, kek) in recipients {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let wrapped = XChaCha20Poly1305::new(kek.into())
            .encrypt(XNonce::from_slice(&nonce), &file_key[..])
            .map_err(|e| ArchiveError::encryption(format!("key wrap failed: {e}")))?;

        header.extend_from_slice(&(key_id.len() as u16).to_le_bytes());
        header.extend_from_slice(key_id.as_bytes());
        header.extend_from_slice(&nonce);
        header.extend_from_slice(&wrapped);
    }

    let mut payload_nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut payload_nonce);
    let ciphertext = XChaCha20Poly1305::new(&file_key.into())
        .encrypt(
            XNonce::from_slice(&payload_nonce),
            Payload {
                msg: plain,
                aad: &header,
            },
        )
        .map_err(|e| ArchiveError::encryption(format!("payload encryption failed: {e}")))?;

    let mut out = header;
    out.extend_from_slice(&payload_nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed container with one recipient's key-encryption key.
pub fn open_sealed(data: &[u8], key_id: &str, kek: &[u8; 32]) -> Result<Vec<u8>, ArchiveError> {
    let mut r = Reader { data, pos: 0 };
    if r.take(4)? != MAGIC.as_slice() {
        return Err(ArchiveError::sealed("bad magic"));
    }
    if r.take(1)?[0] != VERSION {
        return Err(ArchiveError::sealed("unsupported version"));
    }
    let count = u16::from_le_bytes(r.take(2)?.try_into().unwrap()) as usize;

    let mut wrapped_key = None;
    for _ in 0..count {
        let id_len = u16::from_le_bytes(r.take(2)?.try_into().unwrap()) as usize;
        let id = r.take(id_len)?.to_vec();
        let nonce = r.take(NONCE_LEN)?.to_vec();
        let wrapped = r.take(WRAPPED_KEY_LEN)?.to_vec();
        if id == key_id.as_bytes() {
            wrapped_key = Some((nonce, wrapped));
        }
    }
    let header = &data[..r.pos];

    let (nonce, wrapped) = wrapped_key
        .ok_or_else(|| ArchiveError::sealed(format!("no recipient entry for key {key_id}")))?;
    let file_key = XChaCha20Poly1305::new(kek.into())
        .decrypt(XNonce::from_slice(&nonce), wrapped.as_slice())
        .map_err(|_| ArchiveError::sealed("key unwrap failed"))?;
    let file_key: [u8; 32] = file_key
        .try_into()
        .map_err(|_| ArchiveError::sealed("unwrapped key has wrong length"))?;

    let payload_nonce = r.take(NONCE_LEN)?.to_vec();
    let ciphertext = &data[r.pos..];
    XChaCha20Poly1305::new(&file_key.into())
        .decrypt(
            XNonce::from_slice(&payload_nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| ArchiveError::sealed("payload authentication failed"))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ArchiveError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ArchiveError::sealed("truncated container"))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}
