//! Data types shared across the engine. These mirror the storage records
//! the original plugin kept under its various paths, typed instead of
//! loosely-shaped JSON blobs.
use std::collections::HashMap;

use rabe_bn::{Fr, Gt, G1, G2};
use serde::{Deserialize, Serialize};

/// The one-time pairing setup record, persisted at `config/ecelement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalParams {
    pub g1: G1,
    /// The Type-A parameter string this system was initialized with.
    /// `rabe_bn`'s curve choice is fixed regardless of this value; it is
    /// carried so the storage record matches the original shape and so a
    /// caller overriding `EngineConfig::pairing_params` can tell which
    /// string a given deployment was stamped with.
    pub params: String,
}

/// Which namespace an attribute belongs to. Determines how the attribute
/// name is qualified when it appears in a policy string and in a GID's
/// key bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeScope {
    /// Attributes any authority may issue and any GID may hold, not tied
    /// to a specific authority.
    Common,
    /// An authority-qualified attribute, e.g. `ENG` under authority `ACME`.
    Authority(String),
    /// The reserved system-attribute namespace, keyed by majority vote
    /// across authorities rather than issued by one.
    System,
}

/// An authority's private half of one attribute keypair: `(alpha_i, y_i)`.
/// Stored under the sane PRIVATE_DATA accessor (see `storage` module doc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSecret {
    pub scope: AttributeScope,
    pub attribute: String,
    pub alpha: Fr,
    pub y: Fr,
}

/// An authority's published half of one attribute keypair:
/// `E_i = e(g, g)^alpha_i`, `Y_i = g^y_i`. Stored under PUBLISHED_DATA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributePublic {
    pub scope: AttributeScope,
    pub attribute: String,
    pub e_i: Gt,
    pub y_i: G2,
}

/// One GID's key material for a single attribute:
/// `K_{i,GID} = g^alpha_i . H(GID)^y_i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityKey {
    pub attribute: String,
    pub k: G1,
}

/// Everything issued to one GID so far, matching the `subject/GIDS/{GID}`
/// record shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GidRecord {
    pub gid: String,
    pub common_attributes: HashMap<String, EntityKey>,
    /// authority name -> attribute name -> key
    pub authority_attributes: HashMap<String, HashMap<String, EntityKey>>,
    /// Keys for system (majority-vote-backed) attributes, one entry per
    /// attribute name — each system attribute has a single `(alpha, y)`
    /// keypair, so there is exactly one key per attribute, not one per
    /// backing authority.
    pub system_attribute_keys: HashMap<String, EntityKey>,
}

/// The in-progress vote ledger for system-attribute issuance: attribute ->
/// candidate authority -> voters who backed that candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MajorityConcerns {
    pub votes: HashMap<String, HashMap<String, Vec<String>>>,
}

/// A hybrid-encrypted payload: a pairing-wrapped symmetric key plus an
/// AES-256-CBC ciphertext, one `(C1, C2, C3)` triple per policy-tree leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cryptogram {
    pub policy: String,
    /// leaf label -> `e(g,g)^{s_x} . E_i^{r_x}`
    pub c1: HashMap<String, Gt>,
    /// leaf label -> `g^{r_x}`
    pub c2: HashMap<String, G2>,
    /// leaf label -> `Y_i^{r_x} . g^{w_x}`
    pub c3: HashMap<String, G2>,
    pub encrypted_message: Vec<u8>,
    pub cipher_iv: Vec<u8>,
    /// The accumulated partial reconstruction of `e(g,g)^s` carried by a
    /// chained system-attribute decryption: each relay hop that can only
    /// satisfy part of the policy multiplies its own contribution into
    /// this value and hands the cryptogram on to the next hop, rather than
    /// recovering the plaintext itself. Absent on freshly-encrypted
    /// records and on a cryptogram no relay hop has touched yet.
    pub sys_decrypted: Option<Gt>,
    /// Full-policy-tree leaf labels whose contribution has already been
    /// folded into `sys_decrypted` by an earlier relay hop. Empty on a
    /// freshly-encrypted cryptogram.
    #[serde(default)]
    pub relayed_labels: Vec<String>,
}
