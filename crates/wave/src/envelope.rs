//! Envelope codec: the per-message encryption unit of the wave protocol.
//!
//! Every encrypted request or response travels as an [`Envelope`]: a fresh
//! 12-byte nonce, the ChaCha20 ciphertext, and an MD5 digest of the
//! ciphertext rendered as uppercase hex.
//!
//! The wire protocol has **no authentication tag**. The digest is the only
//! tampering signal it offers, and it is unauthenticated by design; a
//! reimplementation that "fixed" this would no longer interoperate with
//! the real server. Receivers recompute the digest over the ciphertext
//! they got and treat a mismatch as a hard integrity failure.
//!
//! # Binary encoding
//!
//! Over duplex transports the envelope is encoded as:
//! - 12 bytes: nonce
//! - 16 bytes: raw MD5 digest of the ciphertext
//! - N bytes: ciphertext
//!
//! Over HTTP the nonce travels base64 in a header and the digest as
//! uppercase hex (see the client crate).

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, WaveError};

/// Length of the session encryption key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the per-message nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the raw content digest (MD5) in bytes.
pub const DIGEST_LEN: usize = 16;

/// Size of the fixed envelope header in the binary encoding.
pub const ENVELOPE_HEADER_SIZE: usize = NONCE_LEN + DIGEST_LEN;

/// One encrypted message unit.
///
/// An envelope is ephemeral: it exists only for the lifetime of a single
/// request or response. The nonce is generated fresh by the sender and
/// never reused under the same session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Fresh 12-byte nonce chosen by the sender.
    pub nonce: [u8; NONCE_LEN],
    /// ChaCha20 ciphertext.
    pub ciphertext: Vec<u8>,
    /// Uppercase hex MD5 digest of the ciphertext.
    pub digest: String,
}

impl Envelope {
    /// Encodes the envelope into its binary transport form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&digest_raw(&self.ciphertext));
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decodes an envelope from its binary transport form.
    ///
    /// The digest embedded in the header is recomputed over the received
    /// ciphertext; a mismatch fails with [`WaveError::DigestMismatch`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ENVELOPE_HEADER_SIZE {
            return Err(WaveError::MalformedEnvelope(format!(
                "insufficient data for envelope header: need {} bytes, have {}",
                ENVELOPE_HEADER_SIZE,
                data.len()
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[..NONCE_LEN]);

        let carried = hex::encode_upper(&data[NONCE_LEN..ENVELOPE_HEADER_SIZE]);
        let ciphertext = data[ENVELOPE_HEADER_SIZE..].to_vec();

        let computed = content_digest(&ciphertext);
        if computed != carried {
            return Err(WaveError::DigestMismatch {
                expected: carried,
                got: computed,
            });
        }

        Ok(Self {
            nonce,
            ciphertext,
            digest: computed,
        })
    }
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
///
/// Fails with a crypto error if the key is not exactly 32 bytes.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Envelope> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    seal_with_nonce(key, &nonce, plaintext)
}

/// Encrypts `plaintext` under `key` with a caller-supplied nonce.
///
/// Nonce reuse under one session key breaks the stream cipher entirely;
/// callers outside of tests should prefer [`seal`].
pub fn seal_with_nonce(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Envelope> {
    let nonce = check_nonce(nonce)?;
    let ciphertext = crypt(key, &nonce, plaintext)?;
    let digest = content_digest(&ciphertext);
    Ok(Envelope {
        nonce,
        ciphertext,
        digest,
    })
}

/// Decrypts `ciphertext` sealed under `key` with `nonce`.
///
/// The cipher is a pure keystream XOR, so decryption is the identical
/// transform as encryption.
pub fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let nonce = check_nonce(nonce)?;
    crypt(key, &nonce, ciphertext)
}

/// Computes the uppercase hex MD5 digest of a ciphertext.
///
/// This is the value carried in the `x-ss-stub` header on the HTTP path
/// and embedded raw in the binary envelope encoding.
pub fn content_digest(ciphertext: &[u8]) -> String {
    hex::encode_upper(digest_raw(ciphertext))
}

/// Verifies a carried digest against the received ciphertext.
pub fn verify_digest(ciphertext: &[u8], carried: &str) -> Result<()> {
    let computed = content_digest(ciphertext);
    if computed != carried {
        return Err(WaveError::DigestMismatch {
            expected: carried.to_string(),
            got: computed,
        });
    }
    Ok(())
}

fn digest_raw(ciphertext: &[u8]) -> [u8; DIGEST_LEN] {
    Md5::digest(ciphertext).into()
}

fn check_nonce(nonce: &[u8]) -> Result<[u8; NONCE_LEN]> {
    nonce
        .try_into()
        .map_err(|_| WaveError::InvalidNonceLength {
            expected: NONCE_LEN,
            got: nonce.len(),
        })
}

/// Runs the ChaCha20 keystream over `data`.
///
/// The wire protocol describes the cipher nonce as 16 bytes: four zero
/// counter bytes followed by the 12-byte message nonce. ChaCha20 with a
/// 12-byte IV and an initial block counter of zero is that exact
/// construction.
fn crypt(key: &[u8], nonce: &[u8; NONCE_LEN], data: &[u8]) -> Result<Vec<u8>> {
    let key: &[u8; KEY_LEN] = key.try_into().map_err(|_| WaveError::InvalidKeyLength {
        expected: KEY_LEN,
        got: key.len(),
    })?;

    let mut cipher = ChaCha20::new(key.into(), nonce.into());
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}
