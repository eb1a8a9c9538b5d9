//! The facade a host wires its router/plugin runtime up to. Owns nothing
//! but the capabilities it was handed at construction (`Storage`,
//! `Logger`) plus the in-process pairing-context cache; everything else is
//! resolved per call from storage, so multiple `AbeEngine`s over the same
//! backing store stay consistent.
use std::sync::Arc;

use crate::authority::AuthoritySetup;
use crate::config::EngineConfig;
use crate::crypto::{DecryptOutcome, Decryptor, Encryptor};
use crate::error::AbeResult;
use crate::global::GlobalSetup;
use crate::keygen::{GidKeygen, SystemAttributeKeygen};
use crate::keystore::KeyStore;
use crate::logger::{Logger, TracingLogger};
use crate::model::{AttributePublic, AttributeScope, AttributeSecret, Cryptogram, EntityKey, GlobalParams, MajorityConcerns};
use crate::storage::Storage;

pub struct AbeEngine {
    storage: Arc<dyn Storage>,
    logger: Arc<dyn Logger>,
    config: EngineConfig,
    global: GlobalSetup,
}

impl AbeEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        AbeEngine {
            storage,
            logger: Arc::new(TracingLogger),
            config: EngineConfig::default(),
            global: GlobalSetup::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn init(&self) -> AbeResult<GlobalParams> {
        self.global.init(self.storage.as_ref(), &self.config, self.logger.as_ref())
    }

    pub fn auth_setup(&self, scope: AttributeScope, attribute: &str) -> AbeResult<(AttributeSecret, AttributePublic)> {
        let ctx = self.global.context(self.storage.as_ref())?;
        AuthoritySetup::register_attribute(&ctx, self.storage.as_ref(), self.logger.as_ref(), scope, attribute)
    }

    pub fn keygen(&self, gid: &str, scope: AttributeScope, attribute: &str) -> AbeResult<EntityKey> {
        let ctx = self.global.context(self.storage.as_ref())?;
        GidKeygen::issue(&ctx, self.storage.as_ref(), self.logger.as_ref(), gid, scope, attribute)
    }

    pub fn system_attribute_vote(
        &self,
        attribute: &str,
        candidate_authorities: &[String],
        voting_authority: &str,
    ) -> AbeResult<MajorityConcerns> {
        SystemAttributeKeygen::vote(
            self.storage.as_ref(),
            self.logger.as_ref(),
            attribute,
            candidate_authorities,
            voting_authority,
        )
    }

    pub fn system_attribute_keygen(&self, gid: &str, attribute: &str) -> AbeResult<EntityKey> {
        let ctx = self.global.context(self.storage.as_ref())?;
        SystemAttributeKeygen::issue(&ctx, self.storage.as_ref(), self.logger.as_ref(), gid, attribute)
    }

    pub fn encrypt(&self, policy: &str, plaintext: &[u8]) -> AbeResult<Cryptogram> {
        let ctx = self.global.context(self.storage.as_ref())?;
        Encryptor::encrypt(&ctx, self.storage.as_ref(), policy, plaintext)
    }

    /// `subject` names who the decryption is ultimately for — usually
    /// `gid` itself, but distinct from it when `gid` is acting as a relay
    /// contributing a partial decryption on someone else's behalf.
    /// `sub_policy` is the portion of the cryptogram's policy `gid` can
    /// itself satisfy; required whenever `gid` cannot satisfy the whole
    /// policy alone.
    pub fn sys_decrypt(
        &self,
        gid: &str,
        subject: &str,
        sub_policy: Option<&str>,
        cryptogram: &Cryptogram,
    ) -> AbeResult<DecryptOutcome> {
        let ctx = self.global.context(self.storage.as_ref())?;
        Decryptor::decrypt(
            &ctx,
            self.storage.as_ref(),
            self.logger.as_ref(),
            gid,
            subject,
            sub_policy,
            cryptogram,
        )
    }

    pub fn keystore(&self) -> KeyStore<'_> {
        KeyStore::new(self.storage.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[test]
    fn full_lifecycle() {
        let engine = AbeEngine::new(Arc::new(InMemoryStorage::new()));
        engine.init().unwrap();
        engine
            .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
            .unwrap();
        engine
            .keygen("alice", AttributeScope::Authority("ACME".into()), "ENG")
            .unwrap();

        let cryptogram = engine.encrypt("ACME:ENG", b"payload").unwrap();
        match engine.sys_decrypt("alice", "alice", None, &cryptogram).unwrap() {
            DecryptOutcome::Plaintext(pt) => assert_eq!(pt, b"payload"),
            DecryptOutcome::Relayed(_) => panic!("expected a final plaintext, not a relay"),
        }
    }
}
