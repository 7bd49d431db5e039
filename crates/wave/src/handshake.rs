//! Wave key exchange: ephemeral ECDH handshake and session key derivation.
//!
//! One handshake attempt owns one ephemeral P-256 keypair. The same
//! ephemeral private key signs the canonical request JSON (ECDSA over
//! SHA-256) and computes the ECDH shared secret with the server's key
//! share; it is discarded once the session key is derived and is never
//! persisted.
//!
//! The session key is derived with HKDF-SHA256:
//! - ikm:  the raw ECDH shared secret
//! - salt: client_random ‖ server_random (order significant, 64 bytes)
//! - info: a fixed 16-byte context constant shared by all clients of
//!   this protocol version

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Result, WaveError};
use crate::session::Session;

/// Wave protocol version spoken by this client.
pub const HANDSHAKE_VERSION: u32 = 2;

/// The sole cipher suite this client offers: ChaCha20 keystream.
pub const CIPHER_SUITE_CHACHA20: u16 = 4097;

/// Curve identifier used in key shares.
pub const CURVE_SECP256R1: &str = "secp256r1";

/// Length of the client and server random values in bytes.
pub const RANDOM_LEN: usize = 32;

/// Fixed HKDF context string, identical across all clients of this
/// protocol version.
pub const HKDF_INFO: &[u8; 16] = b"TTWaveEncryption";

/// Sessions are refreshed this many seconds before the server-reported
/// ticket expiry to absorb clock skew and in-flight requests.
pub const EXPIRY_MARGIN_SECS: u64 = 60;

/// One offered or chosen curve/public-key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Curve name, e.g. `secp256r1`.
    pub curve: String,
    /// Base64 SEC1 uncompressed public key point.
    pub pubkey: String,
}

/// Handshake request body.
///
/// Field order matters: the request is serialized once into canonical
/// JSON (struct-declaration key order, no extraneous whitespace) and that
/// exact byte string is what gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol version.
    pub version: u32,
    /// Base64 32-byte client random.
    pub random: String,
    /// Application identifier.
    pub app_id: String,
    /// Device identifier.
    pub did: String,
    /// Offered key shares.
    pub key_shares: Vec<KeyShare>,
    /// Offered cipher suite ids.
    pub cipher_suites: Vec<u16>,
}

/// Handshake response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Protocol version.
    pub version: u32,
    /// Base64 32-byte server random.
    pub random: String,
    /// Chosen key share.
    pub key_share: KeyShare,
    /// Chosen cipher suite id.
    pub cipher_suite: u16,
    /// Server certificate blob. Opaque to this client.
    #[serde(default)]
    pub cert: String,
    /// Short-lived session ticket (opaque, base64 in transport).
    pub ticket: String,
    /// Seconds until the short-lived ticket expires.
    pub ticket_exp: u64,
    /// Long-lived session ticket (opaque, base64 in transport).
    #[serde(default)]
    pub ticket_long: String,
    /// Seconds until the long-lived ticket expires.
    #[serde(default)]
    pub ticket_long_exp: u64,
}

/// One in-flight handshake attempt.
///
/// Owns the ephemeral keypair and client random. Consumed by
/// [`HandshakeAttempt::complete`]; a failed attempt is simply dropped and
/// the caller starts over with a fresh keypair.
pub struct HandshakeAttempt {
    secret: SecretKey,
    client_random: [u8; RANDOM_LEN],
    body: String,
    signature: Vec<u8>,
}

impl HandshakeAttempt {
    /// Builds a new handshake attempt for the given device and app.
    ///
    /// Generates the ephemeral keypair and client random, serializes the
    /// request canonically, and signs the exact serialized bytes.
    pub fn new(device_id: &str, app_id: &str) -> Result<Self> {
        let secret = SecretKey::random(&mut OsRng);

        let mut client_random = [0u8; RANDOM_LEN];
        OsRng.fill_bytes(&mut client_random);

        let pubkey_point = secret.public_key().to_encoded_point(false);

        let request = HandshakeRequest {
            version: HANDSHAKE_VERSION,
            random: BASE64.encode(client_random),
            app_id: app_id.to_string(),
            did: device_id.to_string(),
            key_shares: vec![KeyShare {
                curve: CURVE_SECP256R1.to_string(),
                pubkey: BASE64.encode(pubkey_point.as_bytes()),
            }],
            cipher_suites: vec![CIPHER_SUITE_CHACHA20],
        };

        let body = serde_json::to_string(&request)?;

        let signing_key = SigningKey::from(&secret);
        let signature: Signature = signing_key.sign(body.as_bytes());

        Ok(Self {
            secret,
            client_random,
            body,
            signature: signature.to_der().as_bytes().to_vec(),
        })
    }

    /// The canonical JSON request body. These exact bytes are signed.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The base64 DER ECDSA signature over the canonical body.
    pub fn signature_b64(&self) -> String {
        BASE64.encode(&self.signature)
    }

    /// The client random generated for this attempt.
    pub fn client_random(&self) -> &[u8; RANDOM_LEN] {
        &self.client_random
    }

    /// Completes the handshake from a parsed server response.
    ///
    /// Validates the chosen cipher suite against what was offered,
    /// computes the ECDH shared secret, derives the session key, and
    /// assembles the [`Session`]. `now` is the current unix timestamp in
    /// seconds; the session expiry is set [`EXPIRY_MARGIN_SECS`] before
    /// the server-reported ticket lifetime runs out.
    pub fn complete(self, response: &HandshakeResponse, now: u64) -> Result<Session> {
        if response.cipher_suite != CIPHER_SUITE_CHACHA20 {
            return Err(WaveError::UnsupportedCipherSuite {
                offered: CIPHER_SUITE_CHACHA20,
                chosen: response.cipher_suite,
            });
        }

        let server_random: [u8; RANDOM_LEN] = BASE64
            .decode(&response.random)?
            .try_into()
            .map_err(|v: Vec<u8>| {
                WaveError::Deserialization(format!(
                    "server random must be {} bytes, got {}",
                    RANDOM_LEN,
                    v.len()
                ))
            })?;

        let server_pubkey_bytes = BASE64.decode(&response.key_share.pubkey)?;
        let server_pubkey = PublicKey::from_sec1_bytes(&server_pubkey_bytes)
            .map_err(|e| WaveError::InvalidServerKey(e.to_string()))?;

        let shared = p256::ecdh::diffie_hellman(
            self.secret.to_nonzero_scalar(),
            server_pubkey.as_affine(),
        );

        let key = derive_session_key(
            shared.raw_secret_bytes().as_slice(),
            &self.client_random,
            &server_random,
        )?;

        let expires_at = now + response.ticket_exp.saturating_sub(EXPIRY_MARGIN_SECS);

        Ok(Session {
            key,
            ticket: response.ticket.clone(),
            ticket_long: response.ticket_long.clone(),
            ticket_exp: response.ticket_exp,
            ticket_long_exp: response.ticket_long_exp,
            cipher_suite: response.cipher_suite,
            expires_at,
        })
    }
}

impl std::fmt::Debug for HandshakeAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeAttempt")
            .field("client_random", &BASE64.encode(self.client_random))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Derives the 32-byte session key from the ECDH shared secret.
///
/// Deterministic: identical inputs always produce the identical key.
pub fn derive_session_key(
    shared_secret: &[u8],
    client_random: &[u8; RANDOM_LEN],
    server_random: &[u8; RANDOM_LEN],
) -> Result<[u8; 32]> {
    let mut salt = [0u8; RANDOM_LEN * 2];
    salt[..RANDOM_LEN].copy_from_slice(client_random);
    salt[RANDOM_LEN..].copy_from_slice(server_random);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|e| WaveError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
