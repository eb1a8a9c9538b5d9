//! Per-GID key issuance, and the majority-vote path for system attributes.
use crate::authority::AuthoritySetup;
use crate::error::{AbeError, AbeResult};
use crate::global::RESERVED_SYSTEM_ATTRIBUTE;
use crate::hash::hash_to_g1;
use crate::logger::Logger;
use crate::model::{AttributeScope, AttributeSecret, EntityKey, GidRecord, MajorityConcerns};
use crate::pairing::PairingContext;
use crate::storage::{
    authority_attribute_key, common_attribute_key, gid_key, system_attribute_key, Storage, StorageExt,
    MAJORITY_CONCERNS_KEY, PRIVATE_DATA, SYSTEM_ATTRIBUTES_KEY,
};

pub struct GidKeygen;

impl GidKeygen {
    /// Issues `K_{i,GID} = g^alpha_i . H(GID)^y_i` for one already-registered
    /// attribute and records it in the GID's key bundle.
    pub fn issue(
        ctx: &PairingContext,
        storage: &dyn Storage,
        logger: &dyn Logger,
        gid: &str,
        scope: AttributeScope,
        attribute: &str,
    ) -> AbeResult<EntityKey> {
        if gid.is_empty() {
            return Err(AbeError::BadRequest("GID must not be empty".into()));
        }
        let private_key = match &scope {
            AttributeScope::Authority(authority) => authority_attribute_key(PRIVATE_DATA, authority, attribute),
            AttributeScope::Common => common_attribute_key(PRIVATE_DATA, attribute),
            AttributeScope::System => {
                return Err(AbeError::BadRequest(
                    "system attributes are issued through system_attribute_keygen".into(),
                ))
            }
        };
        let secret: AttributeSecret = storage
            .get_json(&private_key)?
            .ok_or_else(|| AbeError::NotFound(format!("attribute {} is not registered", attribute)))?;

        let h_gid = hash_to_g1(gid);
        let k = ctx.g1 * secret.alpha + h_gid * secret.y;
        let entity_key = EntityKey {
            attribute: attribute.to_string(),
            k,
        };

        let storage_key = gid_key(gid);
        let mut record: GidRecord = storage.get_json(&storage_key)?.unwrap_or_else(|| GidRecord {
            gid: gid.to_string(),
            ..Default::default()
        });
        match &scope {
            AttributeScope::Authority(authority) => {
                record
                    .authority_attributes
                    .entry(authority.clone())
                    .or_default()
                    .insert(attribute.to_string(), entity_key.clone());
            }
            AttributeScope::Common => {
                record.common_attributes.insert(attribute.to_string(), entity_key.clone());
            }
            AttributeScope::System => unreachable!(),
        }
        storage.put_json(&storage_key, &record)?;
        logger.info(&format!("issued key for {} to GID {}", attribute, gid));
        Ok(entity_key)
    }
}

pub struct SystemAttributeKeygen;

impl SystemAttributeKeygen {
    /// Records one authority's vote for the set of authorities that should
    /// jointly back a system attribute. A voter cannot back its own vote
    /// (self-vote exclusion) and a repeated authority in the candidate
    /// list is de-duplicated before recording. Quorum is left undefined —
    /// the ledger simply accumulates votes; a caller decides when a
    /// candidate set has enough backing to proceed.
    pub fn vote(
        storage: &dyn Storage,
        logger: &dyn Logger,
        attribute: &str,
        candidate_authorities: &[String],
        voting_authority: &str,
    ) -> AbeResult<MajorityConcerns> {
        if attribute == RESERVED_SYSTEM_ATTRIBUTE {
            return Err(AbeError::Conflict(format!(
                "{} is reserved and cannot be voted on",
                RESERVED_SYSTEM_ATTRIBUTE
            )));
        }
        let mut candidates: Vec<String> = candidate_authorities
            .iter()
            .filter(|a| a.as_str() != voting_authority)
            .cloned()
            .collect();
        candidates.sort();
        candidates.dedup();
        if candidates.is_empty() {
            return Err(AbeError::BadRequest(
                "no authorities left to vote for after self-vote exclusion".into(),
            ));
        }

        let mut concerns: MajorityConcerns = storage.get_json(MAJORITY_CONCERNS_KEY)?.unwrap_or_default();
        let candidate_key = candidates.join(",");
        let voters = concerns
            .votes
            .entry(attribute.to_string())
            .or_default()
            .entry(candidate_key)
            .or_default();
        if !voters.iter().any(|v| v == voting_authority) {
            voters.push(voting_authority.to_string());
        }
        storage.put_json(MAJORITY_CONCERNS_KEY, &concerns)?;

        let mut sys_attrs: Vec<String> = storage.get_json(SYSTEM_ATTRIBUTES_KEY)?.unwrap_or_default();
        if !sys_attrs.iter().any(|a| a == attribute) {
            sys_attrs.push(attribute.to_string());
            storage.put_json(SYSTEM_ATTRIBUTES_KEY, &sys_attrs)?;
        }

        logger.info(&format!(
            "{} voted for {} to back system attribute {}",
            voting_authority,
            candidates.join(","),
            attribute
        ));
        Ok(concerns)
    }

    /// Issues a GID's key for a system attribute. A system attribute has a
    /// single `(alpha, y)` keypair — not one per backing authority — that
    /// is materialized unilaterally the first time any voting authority
    /// actually issues against it (or, for the reserved `SA` attribute, at
    /// `GlobalSetup::init` time). The key itself reuses the standard
    /// per-GID KEM construction, `K = g^alpha + H(GID)^y`; requiring at
    /// least one recorded vote before materializing is what stops an
    /// unvoted attribute name from silently acquiring key material.
    pub fn issue(
        ctx: &PairingContext,
        storage: &dyn Storage,
        logger: &dyn Logger,
        gid: &str,
        attribute: &str,
    ) -> AbeResult<EntityKey> {
        let private_key = system_attribute_key(PRIVATE_DATA, attribute);
        let secret: AttributeSecret = match storage.get_json(&private_key)? {
            Some(secret) => secret,
            None => {
                if attribute != RESERVED_SYSTEM_ATTRIBUTE && Self::concerns_for(storage, attribute)?.is_empty() {
                    return Err(AbeError::NotFound(format!(
                        "no votes recorded for system attribute {}",
                        attribute
                    )));
                }
                let (secret, _) = AuthoritySetup::materialize_system_secret(ctx, storage, logger, attribute)?;
                secret
            }
        };

        let h_gid = hash_to_g1(gid);
        let k = ctx.g1 * secret.alpha + h_gid * secret.y;
        let entity_key = EntityKey {
            attribute: attribute.to_string(),
            k,
        };
        let storage_key = gid_key(gid);
        let mut record: GidRecord = storage.get_json(&storage_key)?.unwrap_or_else(|| GidRecord {
            gid: gid.to_string(),
            ..Default::default()
        });
        record
            .system_attribute_keys
            .insert(attribute.to_string(), entity_key.clone());
        storage.put_json(&storage_key, &record)?;
        logger.info(&format!("issued system attribute {} key to GID {}", attribute, gid));
        Ok(entity_key)
    }

    /// The recorded candidate authority sets and their backers for one
    /// system attribute, most-backed first.
    pub fn concerns_for(storage: &dyn Storage, attribute: &str) -> AbeResult<Vec<(Vec<String>, Vec<String>)>> {
        let concerns: MajorityConcerns = storage.get_json(MAJORITY_CONCERNS_KEY)?.unwrap_or_default();
        let mut out: Vec<(Vec<String>, Vec<String>)> = concerns
            .votes
            .get(attribute)
            .map(|candidates| {
                candidates
                    .iter()
                    .map(|(key, voters)| (key.split(',').map(str::to_string).collect(), voters.clone()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::logger::NullLogger;

    #[test]
    fn self_vote_is_excluded() {
        let storage = InMemoryStorage::new();
        let logger = NullLogger;
        let err = SystemAttributeKeygen::vote(&storage, &logger, "CLEARANCE", &["ACME".into()], "ACME")
            .unwrap_err();
        assert!(matches!(err, AbeError::BadRequest(_)));
    }

    #[test]
    fn duplicate_candidates_are_deduped_and_votes_accumulate() {
        let storage = InMemoryStorage::new();
        let logger = NullLogger;
        SystemAttributeKeygen::vote(
            &storage,
            &logger,
            "CLEARANCE",
            &["ACME".into(), "ACME".into(), "GLOBEX".into()],
            "ACME",
        )
        .unwrap();
        SystemAttributeKeygen::vote(&storage, &logger, "CLEARANCE", &["GLOBEX".into()], "INITECH").unwrap();

        let concerns = SystemAttributeKeygen::concerns_for(&storage, "CLEARANCE").unwrap();
        assert_eq!(concerns[0].0, vec!["GLOBEX".to_string()]);
        assert_eq!(concerns[0].1.len(), 2);
    }

    #[test]
    fn reserved_name_cannot_be_voted() {
        let storage = InMemoryStorage::new();
        let logger = NullLogger;
        let err =
            SystemAttributeKeygen::vote(&storage, &logger, "SA", &["ACME".into()], "GLOBEX").unwrap_err();
        assert!(matches!(err, AbeError::Conflict(_)));
    }
}
