//! Partial/system decryption: prune the policy tree against a GID's held
//! attributes, recover `e(g,g)^s` via pruned Lagrange reconstruction, and
//! unwrap the AES-256-CBC payload with the hash of that value.
//!
//! A single GID rarely holds every attribute a policy needs. When it
//! doesn't, `decrypt` supports acting as a relay: given a `sub_policy` the
//! caller can itself satisfy, it folds just that portion's contribution
//! into whatever partial value the cryptogram already carries and hands
//! the updated cryptogram back for the next hop, rather than returning
//! plaintext. Relaying is only supported for policies with no duplicated
//! attribute name — the per-leaf bookkeeping this needs (which exact
//! occurrence a hop contributed) has no unambiguous answer once the same
//! name can label more than one leaf.
use std::collections::{HashMap, HashSet};

use rabe_bn::{Group, Gt};

use crate::crypto::aes;
use crate::crypto::encrypt::{derive_symmetric_key, resolve_base_name};
use crate::error::{AbeError, AbeResult};
use crate::hash::hash_to_g1;
use crate::logger::Logger;
use crate::model::{Cryptogram, EntityKey, GidRecord};
use crate::pairing::PairingContext;
use crate::policy::{attribute_entries, coefficients, prune, AttributeEntry, PolicyTree};
use crate::storage::{gid_key, Storage, StorageExt};

pub struct Decryptor;

/// The result of one decryption hop: either the final plaintext, or a
/// cryptogram whose `sys_decrypted`/`relayed_labels` now carry this hop's
/// contribution for the next relay to pick up.
#[derive(Debug, Clone)]
pub enum DecryptOutcome {
    Plaintext(Vec<u8>),
    Relayed(Cryptogram),
}

fn held_attributes(record: &GidRecord) -> HashSet<String> {
    let mut out: HashSet<String> = record.common_attributes.keys().map(|a| a.to_uppercase()).collect();
    for (authority, attrs) in &record.authority_attributes {
        for attribute in attrs.keys() {
            out.insert(format!("{}:{}", authority, attribute).to_uppercase());
        }
    }
    out.extend(record.system_attribute_keys.keys().map(|a| a.to_uppercase()));
    out
}

/// Resolves a policy leaf's base name against whichever namespace it was
/// published in. Since plain `AttributeScope::Common` and
/// `AttributeScope::System` names aren't distinguishable from the bare
/// string alone, a common-namespace miss falls back to the system-key map.
fn find_key<'a>(record: &'a GidRecord, base_name: &str) -> Option<&'a EntityKey> {
    let (scope, attribute) = resolve_base_name(base_name);
    match scope {
        crate::model::AttributeScope::Authority(authority) => {
            record.authority_attributes.get(&authority).and_then(|m| m.get(attribute))
        }
        crate::model::AttributeScope::Common | crate::model::AttributeScope::System => record
            .common_attributes
            .get(attribute)
            .or_else(|| record.system_attribute_keys.get(attribute)),
    }
}

/// Reconstructs the pairing term for one full-tree leaf (identified by its
/// ciphertext-map label) and raises it to `coeff`.
fn leaf_term(
    ctx: &PairingContext,
    record: &GidRecord,
    cryptogram: &Cryptogram,
    gid: &str,
    label: &str,
    base_name: &str,
    coeff: rabe_bn::Fr,
) -> AbeResult<Gt> {
    let key = find_key(record, base_name)
        .ok_or_else(|| AbeError::Internal(format!("leaf {} has no matching key on GID {}", label, gid)))?;
    let c1_x = *cryptogram
        .c1
        .get(label)
        .ok_or_else(|| AbeError::BadRequest(format!("cryptogram is missing C1 for {}", label)))?;
    let c2_x = *cryptogram
        .c2
        .get(label)
        .ok_or_else(|| AbeError::BadRequest(format!("cryptogram is missing C2 for {}", label)))?;
    let c3_x = *cryptogram
        .c3
        .get(label)
        .ok_or_else(|| AbeError::BadRequest(format!("cryptogram is missing C3 for {}", label)))?;

    let h_gid = hash_to_g1(gid);
    let num = c1_x * ctx.pair(h_gid, c3_x);
    let den = ctx.pair(key.k, c2_x);
    let term = num
        * den
            .inverse()
            .ok_or_else(|| AbeError::CryptoFault("non-invertible pairing term".into()))?;
    Ok(term.pow(coeff))
}

impl Decryptor {
    /// Attempts to decrypt `cryptogram` on behalf of `subject` using
    /// whatever keys `gid` holds.
    ///
    /// If `gid` alone satisfies the whole policy, this is the final hop
    /// and the plaintext comes back directly. Otherwise, if `sub_policy`
    /// names a portion of the policy `gid` can itself satisfy, that
    /// portion's contribution is folded into the cryptogram's relay state;
    /// if the accumulated contributions (this hop's plus every earlier
    /// hop's) now cover the whole policy, the plaintext is returned,
    /// otherwise the updated cryptogram is handed back for the next hop.
    /// Returns `PolicyUnsatisfied` if neither applies.
    pub fn decrypt(
        ctx: &PairingContext,
        storage: &dyn Storage,
        logger: &dyn Logger,
        gid: &str,
        subject: &str,
        sub_policy: Option<&str>,
        cryptogram: &Cryptogram,
    ) -> AbeResult<DecryptOutcome> {
        let full_tree = PolicyTree::parse(&cryptogram.policy)?;
        let record: GidRecord = storage
            .get_json(&gid_key(gid))?
            .ok_or_else(|| AbeError::NotFound(format!("no keys issued to GID {}", gid)))?;
        let available = held_attributes(&record);

        // Fast path: gid alone already satisfies the whole policy.
        if let Some(required) = prune(&full_tree, &available) {
            let coeffs = coefficients(&full_tree);
            let contribution = Self::reconstruct(ctx, &record, cryptogram, gid, &required, &coeffs)?;
            let combined = match cryptogram.sys_decrypted {
                Some(prior) => prior * contribution,
                None => contribution,
            };
            let plaintext = Self::unwrap(&combined, cryptogram)?;
            logger.info(&format!("GID {} completed decryption for subject {}", gid, subject));
            return Ok(DecryptOutcome::Plaintext(plaintext));
        }

        let sub_policy = sub_policy
            .ok_or_else(|| AbeError::PolicyUnsatisfied(format!("GID {} does not satisfy the policy", gid)))?;

        let full_entries = attribute_entries(&full_tree);
        if full_entries.iter().any(|e| e.label != e.base_name) {
            return Err(AbeError::BadRequest(
                "chained relay decryption does not support policies with a duplicated attribute name".into(),
            ));
        }
        let label_to_base: HashMap<String, String> =
            full_entries.iter().map(|e| (e.label.clone(), e.base_name.clone())).collect();

        let sub_tree = PolicyTree::parse(sub_policy)?;
        let sub_required = prune(&sub_tree, &available).ok_or_else(|| {
            AbeError::PolicyUnsatisfied(format!("GID {} does not satisfy its own sub-policy {}", gid, sub_policy))
        })?;

        let full_coeffs = coefficients(&full_tree);
        let already_covered: HashSet<String> = cryptogram.relayed_labels.iter().cloned().collect();

        let mut contribution = Gt::one();
        let mut newly_covered = Vec::new();
        for entry in &sub_required {
            let full_label = Self::full_tree_label_for(&full_entries, &entry.base_name)?;
            if already_covered.contains(&full_label) {
                continue;
            }
            let coeff = *full_coeffs
                .get(&full_label)
                .ok_or_else(|| AbeError::Internal(format!("no coefficient for leaf {}", full_label)))?;
            contribution = contribution * leaf_term(ctx, &record, cryptogram, gid, &full_label, &entry.base_name, coeff)?;
            newly_covered.push(full_label);
        }

        let combined = match cryptogram.sys_decrypted {
            Some(prior) => prior * contribution,
            None => contribution,
        };
        let mut updated_labels = cryptogram.relayed_labels.clone();
        updated_labels.extend(newly_covered);

        let covered_names: HashSet<String> = updated_labels
            .iter()
            .filter_map(|label| label_to_base.get(label).cloned())
            .collect();

        if let Some(required) = prune(&full_tree, &covered_names) {
            if required.iter().all(|e| updated_labels.contains(&e.label)) {
                let plaintext = Self::unwrap(&combined, cryptogram)?;
                logger.info(&format!(
                    "GID {} completed a chained decryption for subject {}",
                    gid, subject
                ));
                return Ok(DecryptOutcome::Plaintext(plaintext));
            }
        }

        let mut relayed = cryptogram.clone();
        relayed.sys_decrypted = Some(combined);
        relayed.relayed_labels = updated_labels;
        logger.info(&format!(
            "GID {} relayed a partial decryption for subject {} via sub-policy {}",
            gid, subject, sub_policy
        ));
        Ok(DecryptOutcome::Relayed(relayed))
    }

    /// Finds the single full-tree leaf labeled with `base_name`. Errors
    /// rather than guessing if the name is ambiguous — callers already
    /// reject duplicated-attribute policies before this is reached, so an
    /// ambiguous match here means `base_name` isn't actually a leaf of
    /// `full_tree` at all (or ambiguity slipped past an earlier check).
    fn full_tree_label_for(full_entries: &[AttributeEntry], base_name: &str) -> AbeResult<String> {
        let mut matches = full_entries.iter().filter(|e| e.base_name == base_name);
        let first = matches.next().ok_or_else(|| {
            AbeError::BadRequest(format!(
                "sub-policy attribute {} does not appear in the cryptogram's policy",
                base_name
            ))
        })?;
        if matches.next().is_some() {
            return Err(AbeError::BadRequest(format!(
                "sub-policy attribute {} is ambiguous: it appears more than once in the cryptogram's policy",
                base_name
            )));
        }
        Ok(first.label.clone())
    }

    fn reconstruct(
        ctx: &PairingContext,
        record: &GidRecord,
        cryptogram: &Cryptogram,
        gid: &str,
        required: &[AttributeEntry],
        coeffs: &HashMap<String, rabe_bn::Fr>,
    ) -> AbeResult<Gt> {
        let mut egg_s = Gt::one();
        for entry in required {
            let coeff = *coeffs
                .get(&entry.label)
                .ok_or_else(|| AbeError::Internal(format!("no coefficient for leaf {}", entry.label)))?;
            egg_s = egg_s * leaf_term(ctx, record, cryptogram, gid, &entry.label, &entry.base_name, coeff)?;
        }
        Ok(egg_s)
    }

    fn unwrap(egg_s: &Gt, cryptogram: &Cryptogram) -> AbeResult<Vec<u8>> {
        let key = derive_symmetric_key(egg_s)?;
        let mut iv = [0u8; aes::IV_BYTES];
        if cryptogram.cipher_iv.len() != aes::IV_BYTES {
            return Err(AbeError::BadRequest("cryptogram has a malformed IV".into()));
        }
        iv.copy_from_slice(&cryptogram.cipher_iv);
        aes::decrypt(&key, &iv, &cryptogram.encrypted_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::AuthoritySetup;
    use crate::crypto::encrypt::Encryptor;
    use crate::global::GlobalSetup;
    use crate::keygen::GidKeygen;
    use crate::logger::NullLogger;
    use crate::model::AttributeScope;
    use crate::storage::InMemoryStorage;

    fn bootstrap() -> (InMemoryStorage, PairingContext) {
        let storage = InMemoryStorage::new();
        let setup = GlobalSetup::new();
        let config = crate::config::EngineConfig::default();
        setup.init(&storage, &config, &NullLogger).unwrap();
        let ctx = setup.context(&storage).unwrap();
        (storage, ctx)
    }

    #[test]
    fn and_policy_end_to_end() {
        let (storage, ctx) = bootstrap();
        let logger = NullLogger;
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "ENG").unwrap();
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "EMP").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "alice", AttributeScope::Authority("ACME".into()), "ENG").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "alice", AttributeScope::Authority("ACME".into()), "EMP").unwrap();

        let cryptogram = Encryptor::encrypt(&ctx, &storage, "(ACME:ENG AND ACME:EMP)", b"top secret plans").unwrap();
        let outcome = Decryptor::decrypt(&ctx, &storage, &logger, "alice", "alice", None, &cryptogram).unwrap();
        match outcome {
            DecryptOutcome::Plaintext(pt) => assert_eq!(pt, b"top secret plans"),
            DecryptOutcome::Relayed(_) => panic!("expected a final plaintext, not a relay"),
        }
    }

    #[test]
    fn unsatisfying_gid_is_policy_unsatisfied() {
        let (storage, ctx) = bootstrap();
        let logger = NullLogger;
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "ENG").unwrap();
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "EMP").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "bob", AttributeScope::Authority("ACME".into()), "ENG").unwrap();

        let cryptogram = Encryptor::encrypt(&ctx, &storage, "(ACME:ENG AND ACME:EMP)", b"top secret plans").unwrap();
        let err = Decryptor::decrypt(&ctx, &storage, &logger, "bob", "bob", None, &cryptogram).unwrap_err();
        assert!(matches!(err, AbeError::PolicyUnsatisfied(_)));
    }

    #[test]
    fn or_policy_satisfied_by_either_side() {
        let (storage, ctx) = bootstrap();
        let logger = NullLogger;
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Common, "ENG").unwrap();
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Common, "SALES").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "carol", AttributeScope::Common, "SALES").unwrap();

        let cryptogram = Encryptor::encrypt(&ctx, &storage, "(ENG OR SALES)", b"quarterly numbers").unwrap();
        let outcome = Decryptor::decrypt(&ctx, &storage, &logger, "carol", "carol", None, &cryptogram).unwrap();
        match outcome {
            DecryptOutcome::Plaintext(pt) => assert_eq!(pt, b"quarterly numbers"),
            DecryptOutcome::Relayed(_) => panic!("expected a final plaintext, not a relay"),
        }
    }

    #[test]
    fn chained_relay_then_final_hop_recovers_plaintext() {
        let (storage, ctx) = bootstrap();
        let logger = NullLogger;
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "ENG").unwrap();
        AuthoritySetup::register_attribute(&ctx, &storage, &logger, AttributeScope::Authority("ACME".into()), "EMP").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "relay-authority", AttributeScope::Authority("ACME".into()), "ENG").unwrap();
        GidKeygen::issue(&ctx, &storage, &logger, "dave", AttributeScope::Authority("ACME".into()), "EMP").unwrap();

        let cryptogram = Encryptor::encrypt(&ctx, &storage, "(ACME:ENG AND ACME:EMP)", b"relayed plans").unwrap();

        // relay-authority only holds ENG; it contributes a partial result
        // for subject "dave" rather than decrypting outright.
        let relayed = match Decryptor::decrypt(
            &ctx,
            &storage,
            &logger,
            "relay-authority",
            "dave",
            Some("ACME:ENG"),
            &cryptogram,
        )
        .unwrap()
        {
            DecryptOutcome::Relayed(cryptogram) => cryptogram,
            DecryptOutcome::Plaintext(_) => panic!("expected a relay, not a final plaintext"),
        };
        assert!(relayed.sys_decrypted.is_some());
        assert_eq!(relayed.relayed_labels, vec!["ACME:ENG".to_string()]);

        // dave holds the remaining EMP attribute and finishes the job.
        let outcome =
            Decryptor::decrypt(&ctx, &storage, &logger, "dave", "dave", Some("ACME:EMP"), &relayed).unwrap();
        match outcome {
            DecryptOutcome::Plaintext(pt) => assert_eq!(pt, b"relayed plans"),
            DecryptOutcome::Relayed(_) => panic!("expected a final plaintext, not another relay"),
        }
    }
}
