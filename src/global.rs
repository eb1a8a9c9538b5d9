//! One-time pairing-parameter bootstrap.
use std::sync::{Mutex, OnceLock};

use rabe_bn::{Group, G1};
use rand::thread_rng;

use crate::authority::AuthoritySetup;
use crate::config::EngineConfig;
use crate::error::{AbeError, AbeResult};
use crate::logger::Logger;
use crate::model::{GlobalParams, MajorityConcerns};
use crate::pairing::PairingContext;
use crate::storage::{Storage, StorageExt, GLOBAL_PARAMS_KEY, MAJORITY_CONCERNS_KEY, SYSTEM_ATTRIBUTES_KEY};

/// Reserved system-attribute name created at init time; no authority may
/// register a regular attribute under this name, and it can never be
/// voted away.
pub const RESERVED_SYSTEM_ATTRIBUTE: &str = "SA";

/// Owns the in-process cache of the loaded pairing context and serializes
/// concurrent `init` attempts. Multiple `AbeEngine`s (and so multiple
/// `GlobalSetup`s) may point at the same underlying `Storage`; the
/// double-checked read inside `init` is what keeps a second racing
/// initializer from clobbering the first.
pub struct GlobalSetup {
    init_lock: Mutex<()>,
    cache: OnceLock<PairingContext>,
}

impl Default for GlobalSetup {
    fn default() -> Self {
        GlobalSetup {
            init_lock: Mutex::new(()),
            cache: OnceLock::new(),
        }
    }
}

impl GlobalSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the pairing generator and the reserved bookkeeping records
    /// (`SYSTEM_ATTRIBUTES` seeded with `SA`, an empty vote ledger, and
    /// `SA`'s own materialized `(alpha, y)` secret and published halves —
    /// without this the reserved system attribute would be a name with no
    /// key material anyone could ever issue or encrypt against). Fails
    /// with `Conflict` if this storage was already initialized.
    pub fn init(
        &self,
        storage: &dyn Storage,
        config: &EngineConfig,
        logger: &dyn Logger,
    ) -> AbeResult<GlobalParams> {
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| AbeError::Internal("global init lock poisoned".into()))?;
        if storage.get(GLOBAL_PARAMS_KEY)?.is_some() {
            return Err(AbeError::Conflict(
                "global parameters are already initialized".into(),
            ));
        }
        let g1 = G1::random(&mut thread_rng());
        let params = GlobalParams {
            g1,
            params: config.pairing_params().to_string(),
        };
        storage.put_json(GLOBAL_PARAMS_KEY, &params)?;
        storage.put_json(SYSTEM_ATTRIBUTES_KEY, &vec![RESERVED_SYSTEM_ATTRIBUTE.to_string()])?;
        storage.put_json(MAJORITY_CONCERNS_KEY, &MajorityConcerns::default())?;

        let ctx = PairingContext::from_g1(g1);
        AuthoritySetup::materialize_system_secret(&ctx, storage, logger, RESERVED_SYSTEM_ATTRIBUTE)?;

        logger.info("global pairing parameters initialized");
        Ok(params)
    }

    /// Loads the pairing context, caching it for the lifetime of this
    /// `GlobalSetup`. Fails with `NotFound` if `init` never ran.
    pub fn context(&self, storage: &dyn Storage) -> AbeResult<PairingContext> {
        if let Some(ctx) = self.cache.get() {
            return Ok(ctx.clone());
        }
        let params: GlobalParams = storage
            .get_json(GLOBAL_PARAMS_KEY)?
            .ok_or_else(|| AbeError::NotFound("global parameters not initialized".into()))?;
        let ctx = PairingContext::from_g1(params.g1);
        // Lost races just mean a throwaway context was built; the cached
        // one still wins and all subsequent callers observe it.
        let _ = self.cache.set(ctx.clone());
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NullLogger;
    use crate::storage::InMemoryStorage;

    #[test]
    fn init_twice_conflicts() {
        let storage = InMemoryStorage::new();
        let setup = GlobalSetup::new();
        let config = EngineConfig::default();
        let logger = NullLogger;
        setup.init(&storage, &config, &logger).unwrap();
        let err = setup.init(&storage, &config, &logger).unwrap_err();
        assert!(matches!(err, AbeError::Conflict(_)));
    }

    #[test]
    fn context_before_init_is_not_found() {
        let storage = InMemoryStorage::new();
        let setup = GlobalSetup::new();
        assert!(matches!(setup.context(&storage), Err(AbeError::NotFound(_))));
    }
}
