use std::sync::Arc;

use abe_secrets_core::crypto::DecryptOutcome;
use abe_secrets_core::engine::AbeEngine;
use abe_secrets_core::error::AbeError;
use abe_secrets_core::model::AttributeScope;
use abe_secrets_core::storage::InMemoryStorage;

fn decrypt_plaintext(engine: &AbeEngine, gid: &str, cryptogram: &abe_secrets_core::model::Cryptogram) -> Vec<u8> {
    match engine.sys_decrypt(gid, gid, None, cryptogram).unwrap() {
        DecryptOutcome::Plaintext(pt) => pt,
        DecryptOutcome::Relayed(_) => panic!("expected a final plaintext, not a relay"),
    }
}

fn engine() -> AbeEngine {
    let engine = AbeEngine::new(Arc::new(InMemoryStorage::new()));
    engine.init().unwrap();
    engine
}

#[test]
fn acme_engineering_policy_end_to_end() {
    let engine = engine();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "EMP")
        .unwrap();
    engine
        .keygen("alice", AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    engine
        .keygen("alice", AttributeScope::Authority("ACME".into()), "EMP")
        .unwrap();

    let cryptogram = engine
        .encrypt("(ACME:ENG AND ACME:EMP)", b"project roadmap")
        .unwrap();
    let plaintext = decrypt_plaintext(&engine, "alice", &cryptogram);
    assert_eq!(plaintext, b"project roadmap");
}

#[test]
fn encrypting_against_an_unregistered_attribute_is_not_found() {
    let engine = engine();
    let err = engine.encrypt("ACME:CEO", b"payload").unwrap_err();
    assert!(matches!(err, AbeError::NotFound(_)));
}

#[test]
fn gid_missing_one_of_two_required_attributes_is_policy_unsatisfied() {
    let engine = engine();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "EMP")
        .unwrap();
    engine
        .keygen("bob", AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();

    let cryptogram = engine.encrypt("(ACME:ENG AND ACME:EMP)", b"payload").unwrap();
    let err = engine.sys_decrypt("bob", "bob", None, &cryptogram).unwrap_err();
    assert!(matches!(err, AbeError::PolicyUnsatisfied(_)));
}

#[test]
fn duplicate_attribute_policy_is_satisfiable_via_either_branch() {
    let engine = engine();
    engine.auth_setup(AttributeScope::Common, "A").unwrap();
    engine.auth_setup(AttributeScope::Common, "B").unwrap();
    engine.auth_setup(AttributeScope::Common, "C").unwrap();

    engine.keygen("holder-ab", AttributeScope::Common, "A").unwrap();
    engine.keygen("holder-ab", AttributeScope::Common, "B").unwrap();

    engine.keygen("holder-ac", AttributeScope::Common, "A").unwrap();
    engine.keygen("holder-ac", AttributeScope::Common, "C").unwrap();

    let cryptogram = engine
        .encrypt("((A AND B) OR (A AND C))", b"shared secret")
        .unwrap();

    assert_eq!(decrypt_plaintext(&engine, "holder-ab", &cryptogram), b"shared secret");
    assert_eq!(decrypt_plaintext(&engine, "holder-ac", &cryptogram), b"shared secret");
}

#[test]
fn reserved_system_attribute_name_conflicts() {
    let engine = engine();
    let err = engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "SA")
        .unwrap_err();
    assert!(matches!(err, AbeError::Conflict(_)));

    let err = engine
        .system_attribute_vote("SA", &["ACME".to_string()], "GLOBEX")
        .unwrap_err();
    assert!(matches!(err, AbeError::Conflict(_)));
}

#[test]
fn repeated_auth_setup_for_the_same_attribute_conflicts() {
    let engine = engine();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    let err = engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap_err();
    assert!(matches!(err, AbeError::Conflict(_)));
}

#[test]
fn system_attribute_is_backed_by_majority_vote() {
    let engine = engine();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "CLEARANCE")
        .unwrap();

    // GLOBEX and INITECH independently agree that ACME alone backs CLEARANCE;
    // that candidate set accumulates two voters and becomes the most-backed one.
    engine
        .system_attribute_vote("CLEARANCE", &["ACME".to_string()], "GLOBEX")
        .unwrap();
    engine
        .system_attribute_vote("CLEARANCE", &["ACME".to_string()], "INITECH")
        .unwrap();

    engine.system_attribute_keygen("dave", "CLEARANCE").unwrap();

    let cryptogram = engine.encrypt("CLEARANCE", b"classified").unwrap();
    let plaintext = decrypt_plaintext(&engine, "dave", &cryptogram);
    assert_eq!(plaintext, b"classified");
}

#[test]
fn chained_system_decryption_relays_across_two_authorities() {
    let engine = engine();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    engine
        .auth_setup(AttributeScope::Authority("ACME".into()), "EMP")
        .unwrap();
    engine
        .keygen("relay-authority", AttributeScope::Authority("ACME".into()), "ENG")
        .unwrap();
    engine
        .keygen("carol", AttributeScope::Authority("ACME".into()), "EMP")
        .unwrap();

    let cryptogram = engine
        .encrypt("(ACME:ENG AND ACME:EMP)", b"relayed plans")
        .unwrap();

    let relayed = match engine
        .sys_decrypt("relay-authority", "carol", Some("ACME:ENG"), &cryptogram)
        .unwrap()
    {
        DecryptOutcome::Relayed(cryptogram) => cryptogram,
        DecryptOutcome::Plaintext(_) => panic!("relay-authority alone cannot satisfy the whole policy"),
    };

    let plaintext = match engine
        .sys_decrypt("carol", "carol", Some("ACME:EMP"), &relayed)
        .unwrap()
    {
        DecryptOutcome::Plaintext(pt) => pt,
        DecryptOutcome::Relayed(_) => panic!("carol's contribution should complete the policy"),
    };
    assert_eq!(plaintext, b"relayed plans");
}
