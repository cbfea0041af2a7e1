use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid base64 in {0}")]
    Encoding(&'static str),

    #[error("IV must be 12 bytes, got {0}")]
    IvLength(usize),

    #[error("decryption failed (wrong key or corrupted data)")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("decrypted value is not UTF-8")]
    Utf8,
}

/// Opaque transport form of an encrypted payload as stored in the session
/// cookie. Both halves are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPair {
    pub iv: String,
    pub cr: String,
}

/// AES-256-GCM cipher keyed once per process.
///
/// The key is never persisted, so every pair produced by a previous process
/// fails to decrypt after a restart.
#[derive(Clone)]
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Creates a cipher with fresh random key material.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn from_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPair, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        Ok(EncryptedPair {
            iv: B64.encode(nonce.as_slice()),
            cr: B64.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, pair: &EncryptedPair) -> Result<String, CipherError> {
        let iv = B64
            .decode(&pair.iv)
            .map_err(|_| CipherError::Encoding("iv"))?;
        if iv.len() != NONCE_LEN {
            return Err(CipherError::IvLength(iv.len()));
        }
        let ciphertext = B64
            .decode(&pair.cr)
            .map_err(|_| CipherError::Encoding("cr"))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCipher(..)")
    }
}
