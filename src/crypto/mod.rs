//! Hybrid encryption/decryption: a pairing-based KEM and an AES-256-CBC DEM.
pub mod aes;
pub mod decrypt;
pub mod encrypt;

pub use decrypt::{DecryptOutcome, Decryptor};
pub use encrypt::Encryptor;
