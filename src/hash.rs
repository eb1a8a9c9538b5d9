//! Deterministic mappings from bytes onto curve points.
//!
//! `rabe_bn` has no `SetFromHash`-equivalent the way PBC does, so both
//! "hash a GID onto the group" and "derive G2's generator from G1's" go
//! through the same two-step construction: hash to a scalar in `Fr`, then
//! multiply a fixed generator by it. This is weaker than an indifferentiable
//! hash-to-curve (the discrete log of the result relative to the generator
//! is not hidden by a random oracle argument the way a true hash-to-curve
//! construction would be), but the scheme here never relies on that
//! property — it only needs the mapping to be deterministic and
//! effectively unpredictable, which scalar-then-multiply gives.
//!
//! Each call builds its own `Sha256` hasher. The system this reimplements
//! kept one hasher alive across calls and reset it in place before each
//! use — a latent bug if that state is ever shared across threads. This
//! crate reproduces the *output*, not that hazard.
use rabe_bn::{Fr, Group, G1, G2};
use sha2::{Digest, Sha256};

fn hash_to_fr(domain: &[u8], data: &[u8]) -> Fr {
    let mut first = Sha256::new();
    first.update(domain);
    first.update([0x01]);
    first.update(data);
    let h1 = first.finalize();

    let mut second = Sha256::new();
    second.update(domain);
    second.update([0x02]);
    second.update(data);
    let h2 = second.finalize();

    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&h1);
    buf[32..].copy_from_slice(&h2);
    Fr::interpret(&buf)
}

/// Maps a GID onto `G1`. Called once per key issuance and once per
/// decryption attempt; both call sites must agree on the same element for
/// the same GID string, which a fresh deterministic hash guarantees.
pub fn hash_to_g1(gid: &str) -> G1 {
    G1::one() * hash_to_fr(b"abe-secrets-core/hash-to-g1", gid.as_bytes())
}

/// Derives `G2`'s generator from an already-chosen `G1` generator so the
/// published generator stays the only thing that needs to round-trip
/// through storage.
pub fn derive_g2(g1: &G1) -> G2 {
    let bytes = serde_json::to_vec(g1).expect("G1 is always serializable");
    G2::one() * hash_to_fr(b"abe-secrets-core/derive-g2", &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_to_g1_is_deterministic() {
        assert_eq!(hash_to_g1("alice"), hash_to_g1("alice"));
    }

    #[test]
    fn hash_to_g1_differs_per_gid() {
        assert_ne!(hash_to_g1("alice"), hash_to_g1("bob"));
    }
}
