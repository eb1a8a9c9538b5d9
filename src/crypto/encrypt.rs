//! Hybrid encryption: a pairing-based KEM wraps a per-message blinding
//! value, whose hash keys an AES-256-CBC DEM.
use std::collections::HashMap;

use rabe_bn::{Fr, Group};
use rand::thread_rng;
use sha2::{Digest, Sha256};

use crate::crypto::aes;
use crate::error::AbeResult;
use crate::model::{AttributePublic, AttributeScope, Cryptogram};
use crate::pairing::PairingContext;
use crate::policy::{attribute_entries, compute_shares, PolicyTree};
use crate::storage::{
    authority_attribute_key, common_attribute_key, system_attribute_key, Storage, StorageExt, PUBLISHED_DATA,
};

pub struct Encryptor;

/// Splits a leaf's base attribute name (`AUTHORITY:ATTRIBUTE`, or a bare
/// name for common/system attributes) into the scope it was published
/// under and the name to look up within that scope.
pub(crate) fn resolve_base_name(base_name: &str) -> (AttributeScope, &str) {
    match base_name.split_once(':') {
        Some((authority, attr)) => (AttributeScope::Authority(authority.to_string()), attr),
        None => (AttributeScope::Common, base_name),
    }
}

/// Resolves a bare (non-`AUTHORITY:`-qualified) name against whichever
/// namespace actually published it: a plain `Common` scope and the
/// `System` majority-vote scope both write bare names, so a miss in one
/// falls back to the other (mirrors `crypto::decrypt::find_key`'s
/// common-or-system fallback on the read side).
pub(crate) fn load_public(storage: &dyn Storage, scope: &AttributeScope, attribute: &str) -> AbeResult<AttributePublic> {
    let public = match scope {
        AttributeScope::Authority(authority) => {
            storage.get_json(&authority_attribute_key(PUBLISHED_DATA, authority, attribute))?
        }
        AttributeScope::Common | AttributeScope::System => {
            match storage.get_json(&common_attribute_key(PUBLISHED_DATA, attribute))? {
                Some(public) => Some(public),
                None => storage.get_json(&system_attribute_key(PUBLISHED_DATA, attribute))?,
            }
        }
    };
    public.ok_or_else(|| crate::error::AbeError::NotFound(format!("attribute {} is not published", attribute)))
}

pub(crate) fn derive_symmetric_key(r: &rabe_bn::Gt) -> AbeResult<[u8; aes::KEY_BYTES]> {
    let encoded = serde_json::to_vec(r)?;
    let digest = Sha256::digest(&encoded);
    let mut key = [0u8; aes::KEY_BYTES];
    key.copy_from_slice(&digest);
    Ok(key)
}

impl Encryptor {
    /// Parses `policy`, splits a fresh random exponent `s` down the tree,
    /// and for every leaf publishes a `(C1, C2, C3)` triple against that
    /// leaf's attribute public key. The message is never itself
    /// pairing-encrypted: `R = e(g,g)^s` only ever keys the AES DEM.
    pub fn encrypt(ctx: &PairingContext, storage: &dyn Storage, policy: &str, plaintext: &[u8]) -> AbeResult<Cryptogram> {
        let tree = PolicyTree::parse(policy)?;
        let mut rng = thread_rng();
        let s = Fr::random(&mut rng);
        let shares = compute_shares(&tree, s, &mut rng);

        let mut c1 = HashMap::new();
        let mut c2 = HashMap::new();
        let mut c3 = HashMap::new();

        for entry in attribute_entries(&tree) {
            let (scope, attribute) = resolve_base_name(&entry.base_name);
            let public = load_public(storage, &scope, attribute)?;
            let share = shares[&entry.label];
            let r_x = Fr::random(&mut rng);

            let c1_x = ctx.egg().pow(share) * public.e_i.pow(r_x);
            let c2_x = ctx.g2 * r_x;
            // w_x is fixed at zero: decryption's pairing cancellation only
            // works out to e(g,g)^share when this term vanishes (see
            // crypto::decrypt docs). The field stays in the wire format so
            // ciphertexts keep the same shape a nonzero blinding value
            // would need.
            let c3_x = public.y_i * r_x;

            c1.insert(entry.label.clone(), c1_x);
            c2.insert(entry.label.clone(), c2_x);
            c3.insert(entry.label, c3_x);
        }

        let r = ctx.egg().pow(s);
        let key = derive_symmetric_key(&r)?;
        let iv = aes::random_iv();
        let encrypted_message = aes::encrypt(&key, &iv, plaintext);

        Ok(Cryptogram {
            policy: policy.to_string(),
            c1,
            c2,
            c3,
            encrypted_message,
            cipher_iv: iv.to_vec(),
            sys_decrypted: None,
            relayed_labels: Vec::new(),
        })
    }
}
