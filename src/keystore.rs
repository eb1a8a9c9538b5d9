//! Typed read access over the raw `Storage` capability. Everything here is
//! a query — writes go through `AuthoritySetup`/`GidKeygen`/
//! `SystemAttributeKeygen` instead, which know the invariants each record
//! needs to keep.
use crate::error::AbeResult;
use crate::keygen::SystemAttributeKeygen;
use crate::model::{AttributePublic, GidRecord, MajorityConcerns};
use crate::storage::{
    authority_attribute_key, common_attribute_key, gid_key, Storage, StorageExt, AUTHORITIES_PATH,
    COMMON_ATTRIBUTES_KEY, MAJORITY_CONCERNS_KEY, PUBLISHED_DATA,
};

pub struct KeyStore<'s> {
    storage: &'s dyn Storage,
}

impl<'s> KeyStore<'s> {
    pub fn new(storage: &'s dyn Storage) -> Self {
        KeyStore { storage }
    }

    pub fn get_gid(&self, gid: &str) -> AbeResult<Option<GidRecord>> {
        self.storage.get_json(&gid_key(gid))
    }

    pub fn get_majority_concerns(&self) -> AbeResult<MajorityConcerns> {
        Ok(self.storage.get_json(MAJORITY_CONCERNS_KEY)?.unwrap_or_default())
    }

    /// One authority's published attribute, if it has registered one by
    /// this exact name.
    pub fn get_distinct_authority_attribute(
        &self,
        authority: &str,
        attribute: &str,
    ) -> AbeResult<Option<AttributePublic>> {
        self.storage
            .get_json(&authority_attribute_key(PUBLISHED_DATA, authority, attribute))
    }

    /// Every attribute name one authority has published.
    pub fn get_authority_attributes(&self, authority: &str) -> AbeResult<Vec<String>> {
        let prefix = format!("{}/{}/", AUTHORITIES_PATH, authority);
        Ok(self
            .storage
            .list(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix)?.strip_suffix(&format!("/{}", PUBLISHED_DATA)).map(str::to_string))
            .collect())
    }

    /// Every attribute name published by any authority, deduplicated.
    pub fn get_distinct_attribute(&self, attribute: &str) -> AbeResult<Vec<(String, AttributePublic)>> {
        let mut out = Vec::new();
        for key in self.storage.list(AUTHORITIES_PATH)? {
            if let Some(rest) = key.strip_prefix(&format!("{}/", AUTHORITIES_PATH)) {
                let mut parts = rest.splitn(3, '/');
                let (Some(authority), Some(attr), Some(accessor)) = (parts.next(), parts.next(), parts.next()) else {
                    continue;
                };
                if attr == attribute && accessor == PUBLISHED_DATA {
                    if let Some(public) = self.get_distinct_authority_attribute(authority, attribute)? {
                        out.push((authority.to_string(), public));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Every common (non-authority-scoped) attribute name published.
    pub fn get_common_attributes(&self) -> AbeResult<Vec<String>> {
        let prefix = format!("{}/", COMMON_ATTRIBUTES_KEY);
        Ok(self
            .storage
            .list(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix)?.strip_suffix(&format!("/{}", PUBLISHED_DATA)).map(str::to_string))
            .collect())
    }

    pub fn get_system_attribute_votes(&self, attribute: &str) -> AbeResult<Vec<(Vec<String>, Vec<String>)>> {
        SystemAttributeKeygen::concerns_for(self.storage, attribute)
    }

    pub fn common_attribute_public(&self, attribute: &str) -> AbeResult<Option<AttributePublic>> {
        self.storage.get_json(&common_attribute_key(PUBLISHED_DATA, attribute))
    }
}
