//! Per-attribute authority key generation.
use rabe_bn::Fr;
use rand::thread_rng;

use crate::error::{AbeError, AbeResult};
use crate::global::RESERVED_SYSTEM_ATTRIBUTE;
use crate::logger::Logger;
use crate::model::{AttributePublic, AttributeScope, AttributeSecret};
use crate::pairing::PairingContext;
use crate::storage::{
    authority_attribute_key, common_attribute_key, system_attribute_key, Storage, StorageExt, PRIVATE_DATA,
    PUBLISHED_DATA,
};

pub struct AuthoritySetup;

impl AuthoritySetup {
    /// Samples `(alpha_i, y_i)`, publishes `E_i = e(g,g)^alpha_i` and
    /// `Y_i = g^y_i`, and writes both halves under the sane accessor
    /// convention (see `storage` module docs for the swap this fixes).
    /// Only `Common` and `Authority` scopes go through this path — system
    /// attributes are issued via majority vote in `keygen`.
    pub fn register_attribute(
        ctx: &PairingContext,
        storage: &dyn Storage,
        logger: &dyn Logger,
        scope: AttributeScope,
        attribute: &str,
    ) -> AbeResult<(AttributeSecret, AttributePublic)> {
        if attribute.is_empty() {
            return Err(AbeError::BadRequest("attribute name must not be empty".into()));
        }
        if attribute == RESERVED_SYSTEM_ATTRIBUTE {
            return Err(AbeError::Conflict(format!(
                "{} is a reserved system attribute name",
                RESERVED_SYSTEM_ATTRIBUTE
            )));
        }
        let (published_key, private_key) = match &scope {
            AttributeScope::Authority(authority) => (
                authority_attribute_key(PUBLISHED_DATA, authority, attribute),
                authority_attribute_key(PRIVATE_DATA, authority, attribute),
            ),
            AttributeScope::Common => (
                common_attribute_key(PUBLISHED_DATA, attribute),
                common_attribute_key(PRIVATE_DATA, attribute),
            ),
            AttributeScope::System => {
                return Err(AbeError::BadRequest(
                    "system attributes are issued through the majority-vote path, not auth setup".into(),
                ))
            }
        };

        if storage.get(&published_key)?.is_some() {
            return Err(AbeError::Conflict(format!(
                "attribute {} is already registered in this scope",
                attribute
            )));
        }

        put_attribute_pair(ctx, storage, logger, scope, attribute, &private_key, &published_key)
    }

    /// Materializes a single `(alpha, y)` keypair for a system attribute —
    /// the `AttributeScope::System` counterpart of `register_attribute`,
    /// reached only from `global::GlobalSetup::init` (for the reserved `SA`
    /// attribute) and `keygen::SystemAttributeKeygen::issue` (for any other
    /// system attribute, materialized unilaterally the first time a voting
    /// authority actually issues a key against it). Not exposed as a public
    /// scope of `register_attribute` since system attributes are never
    /// registered by one authority acting alone.
    pub(crate) fn materialize_system_secret(
        ctx: &PairingContext,
        storage: &dyn Storage,
        logger: &dyn Logger,
        attribute: &str,
    ) -> AbeResult<(AttributeSecret, AttributePublic)> {
        let private_key = system_attribute_key(PRIVATE_DATA, attribute);
        let published_key = system_attribute_key(PUBLISHED_DATA, attribute);
        put_attribute_pair(
            ctx,
            storage,
            logger,
            AttributeScope::System,
            attribute,
            &private_key,
            &published_key,
        )
    }
}

/// Samples `(alpha_i, y_i)`, writes the private half, then the published
/// half. If the second write fails, the first is rolled back so a storage
/// fault never leaves an orphaned secret with no corresponding public key.
fn put_attribute_pair(
    ctx: &PairingContext,
    storage: &dyn Storage,
    logger: &dyn Logger,
    scope: AttributeScope,
    attribute: &str,
    private_key: &str,
    published_key: &str,
) -> AbeResult<(AttributeSecret, AttributePublic)> {
    let mut rng = thread_rng();
    let alpha: Fr = Fr::random(&mut rng);
    let y: Fr = Fr::random(&mut rng);

    let secret = AttributeSecret {
        scope: scope.clone(),
        attribute: attribute.to_string(),
        alpha,
        y,
    };
    let public = AttributePublic {
        scope,
        attribute: attribute.to_string(),
        e_i: ctx.egg().pow(alpha),
        y_i: ctx.g2 * y,
    };

    storage.put_json(private_key, &secret)?;
    if let Err(e) = storage.put_json(published_key, &public) {
        storage.delete(private_key)?;
        return Err(e);
    }
    logger.info(&format!("registered attribute {}", attribute));
    Ok((secret, public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::GlobalSetup;
    use crate::logger::NullLogger;
    use crate::storage::InMemoryStorage;

    #[test]
    fn register_and_reject_duplicate() {
        let storage = InMemoryStorage::new();
        let setup = GlobalSetup::new();
        let config = crate::config::EngineConfig::default();
        let logger = NullLogger;
        setup.init(&storage, &config, &logger).unwrap();
        let ctx = setup.context(&storage).unwrap();

        AuthoritySetup::register_attribute(
            &ctx,
            &storage,
            &logger,
            AttributeScope::Authority("ACME".into()),
            "ENG",
        )
        .unwrap();

        let err = AuthoritySetup::register_attribute(
            &ctx,
            &storage,
            &logger,
            AttributeScope::Authority("ACME".into()),
            "ENG",
        )
        .unwrap_err();
        assert!(matches!(err, AbeError::Conflict(_)));
    }

    #[test]
    fn reserved_system_name_is_rejected() {
        let storage = InMemoryStorage::new();
        let setup = GlobalSetup::new();
        let config = crate::config::EngineConfig::default();
        let logger = NullLogger;
        setup.init(&storage, &config, &logger).unwrap();
        let ctx = setup.context(&storage).unwrap();

        let err = AuthoritySetup::register_attribute(
            &ctx,
            &storage,
            &logger,
            AttributeScope::Authority("ACME".into()),
            "SA",
        )
        .unwrap_err();
        assert!(matches!(err, AbeError::Conflict(_)));
    }
}
