//! AEAD wrapping for bootstrap secrets persisted in `app_state`.
//!
//! Wire format: `enc:v1:<iv_b64>:<ct_b64>:<tag_b64>`. The key is derived
//! from `PETAL_KEY_SECRET`: used directly if it is exactly 32 bytes,
//! otherwise SHA-256-hashed down to 32 bytes.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

const PREFIX: &str = "enc:v1:";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is missing the enc:v1: prefix")]
    MissingPrefix,
    #[error("malformed ciphertext envelope")]
    Malformed,
    #[error("decryption failed")]
    Decryption,
}

pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    pub fn new(secret: &str) -> Self {
        let key_bytes = derive_key(secret);
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ct_and_tag = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .expect("AES-256-GCM encryption does not fail with a valid 32-byte key");
        let (ct, tag) = ct_and_tag.split_at(ct_and_tag.len() - 16);
        format!(
            "{PREFIX}{}:{}:{}",
            B64.encode(nonce),
            B64.encode(ct),
            B64.encode(tag),
        )
    }

    pub fn decrypt(&self, wrapped: &str) -> Result<String, CryptoError> {
        let rest = wrapped.strip_prefix(PREFIX).ok_or(CryptoError::MissingPrefix)?;
        let mut parts = rest.splitn(3, ':');
        let iv_b64 = parts.next().ok_or(CryptoError::Malformed)?;
        let ct_b64 = parts.next().ok_or(CryptoError::Malformed)?;
        let tag_b64 = parts.next().ok_or(CryptoError::Malformed)?;

        let iv = B64.decode(iv_b64).map_err(|_| CryptoError::Malformed)?;
        let mut ct = B64.decode(ct_b64).map_err(|_| CryptoError::Malformed)?;
        let tag = B64.decode(tag_b64).map_err(|_| CryptoError::Malformed)?;
        ct.extend_from_slice(&tag);

        let nonce = Nonce::from_slice(&iv);
        let plaintext = self
            .cipher
            .decrypt(nonce, ct.as_ref())
            .map_err(|_| CryptoError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed)
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    if secret.len() == 32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(secret.as_bytes());
        out
    } else {
        let digest = Sha256::digest(secret.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wrap_and_unwrap() {
        let cipher = SecretCipher::new("not-exactly-32-bytes-long");
        let wrapped = cipher.encrypt("super-secret-value");
        assert!(wrapped.starts_with(PREFIX));
        assert_eq!(cipher.decrypt(&wrapped).unwrap(), "super-secret-value");
    }

    #[test]
    fn exact_32_byte_secret_is_used_directly() {
        let secret = "01234567890123456789012345678901";
        assert_eq!(secret.len(), 32);
        let cipher = SecretCipher::new(secret);
        let wrapped = cipher.encrypt("value");
        assert_eq!(cipher.decrypt(&wrapped).unwrap(), "value");
    }

    #[test]
    fn rejects_ciphertext_without_prefix() {
        let cipher = SecretCipher::new("secret");
        assert!(matches!(cipher.decrypt("garbage"), Err(CryptoError::MissingPrefix)));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let a = SecretCipher::new("secret-a");
        let b = SecretCipher::new("secret-b");
        let wrapped = a.encrypt("value");
        assert!(matches!(b.decrypt(&wrapped), Err(CryptoError::Decryption)));
    }
}
