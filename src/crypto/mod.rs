//! Session cookie encryption.
//!
//! The session token handed to the browser is encrypted with AES-256-GCM so
//! the cookie value is neither readable nor forgeable client-side.
//!
//! The encoded format is: base64url(nonce || ciphertext || tag), unpadded,
//! where nonce is 12 bytes and tag is 16 bytes (AES-GCM authentication tag).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use thiserror::Error;

/// The length of the AES-256 key in bytes
pub const KEY_LENGTH: usize = 32;

/// The length of the AES-GCM nonce in bytes
const NONCE_LENGTH: usize = 12;

/// The length of the AES-GCM authentication tag in bytes
const TAG_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("no encryption secret is configured")]
    MissingKey,
    #[error("failed to encrypt session token")]
    EncryptFailure,
    #[error("failed to decrypt session token")]
    DecryptFailure,
}

/// Build a 256-bit key from the configured secret.
///
/// The secret's bytes are used directly, zero-padded when shorter than
/// [`KEY_LENGTH`] and truncated when longer, so the same secret always yields
/// the same key.
pub fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(KEY_LENGTH);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Authenticated symmetric codec for session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec from the configured secret.
    ///
    /// # Errors
    /// Returns [`CodecError::MissingKey`] when the secret is absent or empty.
    pub fn from_secret(secret: Option<&str>) -> Result<Self, CodecError> {
        match secret {
            Some(s) if !s.is_empty() => Ok(Self::from_key(&derive_key(s))),
            _ => Err(CodecError::MissingKey),
        }
    }

    pub fn from_key(key: &[u8; KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Encrypt a plaintext token into an opaque, cookie-safe string.
    ///
    /// Each call uses a fresh random nonce, so encrypting the same token twice
    /// produces different output.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        use rand::RngCore;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::EncryptFailure)?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    /// Decrypt a value produced by [`TokenCodec::encrypt`].
    ///
    /// # Errors
    /// Returns [`CodecError::DecryptFailure`] if the input is not valid
    /// base64url, is too short, fails authentication (tampered or encrypted
    /// under another key), or does not decrypt to UTF-8.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CodecError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|_| CodecError::DecryptFailure)?;

        if combined.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CodecError::DecryptFailure);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CodecError::DecryptFailure)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::DecryptFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::from_secret(Some(secret)).unwrap()
    }

    #[test]
    fn test_derive_key_pads_short_secret() {
        let key = derive_key("abc");
        assert_eq!(&key[..3], b"abc");
        assert!(key[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_derive_key_truncates_long_secret() {
        let long = "k".repeat(64);
        let key = derive_key(&long);
        assert_eq!(key, [b'k'; KEY_LENGTH]);
        assert_eq!(derive_key(&long), derive_key(&"k".repeat(KEY_LENGTH)));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(TokenCodec::from_secret(None).unwrap_err(), CodecError::MissingKey);
        assert_eq!(TokenCodec::from_secret(Some("")).unwrap_err(), CodecError::MissingKey);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let codec = codec("test-encryption-key");
        let token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig";

        let encrypted = codec.encrypt(token).unwrap();
        assert_ne!(encrypted, token);
        assert!(!encrypted.contains('='), "cookie value should be unpadded");

        assert_eq!(codec.decrypt(&encrypted).unwrap(), token);
    }

    #[test]
    fn test_encrypt_produces_different_ciphertext() {
        let codec = codec("test-key");

        let a = codec.encrypt("same-token").unwrap();
        let b = codec.encrypt("same-token").unwrap();
        assert_ne!(a, b, "Random nonce should produce different ciphertext");

        assert_eq!(codec.decrypt(&a).unwrap(), "same-token");
        assert_eq!(codec.decrypt(&b).unwrap(), "same-token");
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let encrypted = codec("correct-key").encrypt("secret").unwrap();
        assert_eq!(
            codec("wrong-key").decrypt(&encrypted).unwrap_err(),
            CodecError::DecryptFailure
        );
    }

    #[test]
    fn test_tampered_ciphertext_never_decrypts() {
        let codec = codec("test-key");
        let encrypted = codec.encrypt("role=technician").unwrap();
        let mut raw = BASE64.decode(&encrypted).unwrap();

        for i in 0..raw.len() {
            raw[i] ^= 0x01;
            let tampered = BASE64.encode(&raw);
            assert_eq!(
                codec.decrypt(&tampered).unwrap_err(),
                CodecError::DecryptFailure,
                "flipping byte {} must be detected",
                i
            );
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn test_garbled_input_fails() {
        let codec = codec("test-key");
        let short = "A".repeat(20);
        for input in ["", "not base64 !!", "AAAA", short.as_str()] {
            assert_eq!(codec.decrypt(input).unwrap_err(), CodecError::DecryptFailure);
        }
    }

    #[test]
    fn test_empty_and_unicode_tokens() {
        let codec = codec("test-key");
        for token in ["", "Ünïcødé token ✓"] {
            let encrypted = codec.encrypt(token).unwrap();
            assert_eq!(codec.decrypt(&encrypted).unwrap(), token);
        }
    }
}
