//! The symmetric half of the hybrid scheme: AES-256-CBC with PKCS7
//! padding, keyed by a hash of the pairing-derived blinding value.
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::{AbeError, AbeResult};

pub const KEY_BYTES: usize = 32;
pub const IV_BYTES: usize = 16;

type Enc = cbc::Encryptor<Aes256>;
type Dec = cbc::Decryptor<Aes256>;

pub fn random_iv() -> [u8; IV_BYTES] {
    let mut iv = [0u8; IV_BYTES];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

pub fn encrypt(key: &[u8; KEY_BYTES], iv: &[u8; IV_BYTES], plaintext: &[u8]) -> Vec<u8> {
    Enc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub fn decrypt(key: &[u8; KEY_BYTES], iv: &[u8; IV_BYTES], ciphertext: &[u8]) -> AbeResult<Vec<u8>> {
    Dec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| AbeError::CryptoFault(format!("aes-256-cbc decrypt: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [7u8; KEY_BYTES];
        let iv = random_iv();
        let pt = b"the quick brown fox jumps over the lazy dog";
        let ct = encrypt(&key, &iv, pt);
        assert_eq!(decrypt(&key, &iv, &ct).unwrap(), pt);
    }

    #[test]
    fn block_aligned_plaintext_still_pads() {
        let key = [1u8; KEY_BYTES];
        let iv = random_iv();
        let pt = [9u8; 32]; // exactly two AES blocks
        let ct = encrypt(&key, &iv, &pt);
        // PKCS7 always adds a full padding block, even on an exact multiple.
        assert_eq!(ct.len(), pt.len() + 16);
        assert_eq!(decrypt(&key, &iv, &ct).unwrap(), pt);
    }
}
