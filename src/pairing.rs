//! The pairing group the rest of the crate builds on.
//!
//! The system this core reimplements uses a symmetric Type-A pairing
//! (PBC's convention): one source group and one target group, `e: G x G ->
//! GT`. `rabe_bn` only implements the asymmetric BN-curve family (`G1`,
//! `G2`, `Gt`), so there is no literal symmetric pairing to reach for.
//! Instead this module follows the `aw11` (Lewko-Waters decentralized ABE)
//! scheme's approach to the same mismatch: every quantity the original
//! system keeps in its single group is kept here in `G1` (the published
//! generator, hashed GIDs, per-GID attribute keys, ciphertext `C2`/`C3`
//! material all live there in the original; here `C2`/`C3` live in `G2`
//! instead, since pairing one `G1` against another isn't expressible with
//! this crate). `G2`'s generator is never chosen independently or
//! persisted — it is derived deterministically from `G1`'s generator (see
//! [`crate::hash::derive_g2`]) so that two nodes constructing
//! `PairingContext` from the same stored `G1` element always agree on `G2`
//! too, and the storage layout (spec: one compressed generator, `EncodedG`)
//! doesn't grow a second field to carry it.
use rabe_bn::{pairing as bn_pairing, Fr, Gt, G1, G2};

use crate::hash::derive_g2;

pub type Scalar = Fr;

/// The two generators and the pairing operation. Cheap to clone: `G1`/`G2`
/// are small curve points, and cloning just copies them.
#[derive(Clone)]
pub struct PairingContext {
    pub g1: G1,
    pub g2: G2,
}

impl PairingContext {
    /// Builds a context around an already-chosen `G1` generator, deriving
    /// `G2` from it. Used both at first-time setup (with a freshly random
    /// `g1`) and when reloading `GlobalParams` from storage (with the
    /// persisted `g1`).
    pub fn from_g1(g1: G1) -> Self {
        let g2 = derive_g2(&g1);
        PairingContext { g1, g2 }
    }

    pub fn pair(&self, a: G1, b: G2) -> Gt {
        bn_pairing(a, b)
    }

    /// `e(g, g)` in the spec's notation — the base pairing value attribute
    /// public keys and ciphertexts are built from.
    pub fn egg(&self) -> Gt {
        bn_pairing(self.g1, self.g2)
    }
}
