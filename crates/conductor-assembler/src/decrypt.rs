use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};

use crate::error::{AssemblerError, Result};

/// Decrypts an integration's stored token ciphertext. Abstracted so the
/// assembler doesn't hard-code a key-management scheme — the daemon
/// supplies whichever implementation fits its deployment.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<String>;
}

/// AES-256-GCM decryption with a process-wide key, following the
/// reference system's use of `ring` for its cryptographic primitives.
/// Ciphertext layout: a 12-byte nonce followed by the GCM-sealed bytes.
pub struct AeadDecryptor {
    key: LessSafeKey,
}

impl AeadDecryptor {
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes).expect("32-byte key is valid");
        Self {
            key: LessSafeKey::new(unbound),
        }
    }
}

impl Decryptor for AeadDecryptor {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<String> {
        if ciphertext.len() < NONCE_LEN {
            return Err(AssemblerError::Decryption("ciphertext too short".into()));
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AssemblerError::Decryption("bad nonce".into()))?;
        let mut buf = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| AssemblerError::Decryption("aead open failed".into()))?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| AssemblerError::Decryption("decrypted token is not utf-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::aead::{LessSafeKey as SealKey, UnboundKey as SealUnbound};
    use ring::rand::{SecureRandom, SystemRandom};

    fn seal(key_bytes: &[u8; 32], plaintext: &str) -> Vec<u8> {
        let unbound = SealUnbound::new(&AES_256_GCM, key_bytes).unwrap();
        let key = SealKey::new(unbound);
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes).unwrap();
        let nonce_for_seal = Nonce::try_assume_unique_for_key(&nonce_bytes).unwrap();
        let mut buf = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce_for_seal, Aad::empty(), &mut buf)
            .unwrap();
        let mut out = nonce_bytes.to_vec();
        out.extend_from_slice(&buf);
        out
    }

    #[test]
    fn round_trips_through_seal_and_open() {
        let key_bytes = [7u8; 32];
        let ciphertext = seal(&key_bytes, "oauth-access-token-123");
        let decryptor = AeadDecryptor::new(&key_bytes);
        let plaintext = decryptor.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, "oauth-access-token-123");
    }

    #[test]
    fn rejects_short_ciphertext() {
        let decryptor = AeadDecryptor::new(&[1u8; 32]);
        let err = decryptor.decrypt(&[1, 2, 3]);
        assert!(err.is_err());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let ciphertext = seal(&[7u8; 32], "secret");
        let decryptor = AeadDecryptor::new(&[9u8; 32]);
        assert!(decryptor.decrypt(&ciphertext).is_err());
    }
}
