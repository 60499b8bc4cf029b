//! Obfuscation of secrets held in the settings store.
//!
//! Values are sealed with AES-256-GCM under a key derived from a configured
//! passphrase and encoded as base64(nonce ‖ ciphertext).

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use wpeople_core::error::{Result, WPeopleError};

const NONCE_LEN: usize = 12;

pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").field("key", &"[REDACTED]").finish()
    }
}

impl Encryptor {
    pub fn new(passphrase: &str) -> Self {
        let key = Sha256::digest(passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| WPeopleError::Storage(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    pub fn decrypt(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| WPeopleError::Decode(format!("sealed value is not base64: {e}")))?;
        if bytes.len() <= NONCE_LEN {
            return Err(WPeopleError::Decode("sealed value too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WPeopleError::Decode("decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| WPeopleError::Decode(format!("decrypted value is not utf-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_reverses_encrypt() {
        let enc = Encryptor::new("BWpeople");
        let sealed = enc.encrypt("1234.apps.googleusercontent.com").unwrap();
        assert_ne!(sealed, "1234.apps.googleusercontent.com");
        assert_eq!(enc.decrypt(&sealed).unwrap(), "1234.apps.googleusercontent.com");
    }

    #[test]
    fn test_same_plaintext_seals_differently() {
        let enc = Encryptor::new("BWpeople");
        assert_ne!(enc.encrypt("secret").unwrap(), enc.encrypt("secret").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = Encryptor::new("one").encrypt("secret").unwrap();
        let err = Encryptor::new("two").decrypt(&sealed).unwrap_err();
        assert!(matches!(err, WPeopleError::Decode(_)));
    }

    #[test]
    fn test_garbage_fails() {
        let enc = Encryptor::new("BWpeople");
        assert!(enc.decrypt("not base64 !!").is_err());
        assert!(enc.decrypt("c2hvcnQ=").is_err());
    }
}
