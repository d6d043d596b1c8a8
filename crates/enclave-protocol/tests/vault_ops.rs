//! Protocol-level tests: full request/response flows over in-memory stores

use std::sync::Arc;

use enclave_core::{ExecutionMode, Hash256, VaultConfig};
use enclave_crypto::keys::{recover, RecoverableSig};
use enclave_crypto::{public_key_hex, secret_key_from_hex, Effects};
use enclave_identity::{MemoryObjectStore, MemoryShareStore, MemoryStore, ShareStore};
use enclave_protocol::{Request, Vault};
use secp256k1::SECP256K1;
use serde_json::{json, Value};

const APP_ORIGIN: &str = "https://pay.example.test";

fn vault_with(
    mode: ExecutionMode,
    shares: Arc<MemoryShareStore>,
    objects: Arc<MemoryObjectStore>,
    seed: u64,
) -> Vault {
    Vault::new(
        VaultConfig::single_endpoint("https://fms.example.test"),
        mode,
        Arc::new(MemoryStore::new()),
        shares,
        objects,
        Effects::deterministic(seed, 1_735_689_600_000),
    )
}

fn root_vault() -> (Vault, Arc<MemoryShareStore>, Arc<MemoryObjectStore>) {
    let shares = Arc::new(MemoryShareStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let vault = vault_with(
        ExecutionMode::Root,
        Arc::clone(&shares),
        Arc::clone(&objects),
        42,
    );
    (vault, shares, objects)
}

async fn dispatch_ok(vault: &Vault, origin: &str, body: Value) -> Value {
    let response = vault
        .dispatch(Request::new(origin, body))
        .await
        .expect("request should be claimed");
    match response.result {
        Some(result) => result,
        None => panic!("request failed: {:?}", response.error),
    }
}

async fn dispatch_err(vault: &Vault, origin: &str, body: Value) -> String {
    let response = vault
        .dispatch(Request::new(origin, body))
        .await
        .expect("request should be claimed");
    response.error.expect("request should have failed")
}

#[tokio::test]
async fn version_and_config_answer_in_restricted_mode() {
    let shares = Arc::new(MemoryShareStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let vault = vault_with(ExecutionMode::Restricted, shares, objects, 1);

    let version = dispatch_ok(&vault, APP_ORIGIN, json!({"version": {}})).await;
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let config = dispatch_ok(&vault, APP_ORIGIN, json!({"config": {}})).await;
    assert_eq!(config["shareStoreUrl"], "https://fms.example.test");
}

#[tokio::test]
async fn privileged_shapes_are_invisible_in_restricted_mode() {
    let shares = Arc::new(MemoryShareStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let vault = vault_with(ExecutionMode::Restricted, shares, objects, 2);

    for body in [
        json!({"newidentity": {}}),
        json!({"revoke": {"deviceKey": "04aa"}}),
        json!({"enrolldevice": {"devicepubkey": "04", "authpubkey": "04"}}),
        json!({"recovery": {"create": {"id": "x", "key": "00"}}}),
    ] {
        assert!(vault.dispatch(Request::new(APP_ORIGIN, body)).await.is_none());
    }
}

#[tokio::test]
async fn unrecognized_requests_are_reported_not_raised() {
    let (vault, _, _) = root_vault();
    assert!(vault
        .dispatch(Request::new(APP_ORIGIN, json!({"frobnicate": {}})))
        .await
        .is_none());
}

#[tokio::test]
async fn responses_echo_the_correlation_token() {
    let (vault, _, _) = root_vault();
    let response = vault
        .dispatch(Request::new(APP_ORIGIN, json!({"version": {}})).with_callback("req-77"))
        .await
        .unwrap();
    assert_eq!(response.callback.unwrap().as_str(), "req-77");
}

#[tokio::test]
async fn newidentity_creates_and_annotates_the_local_device() {
    let (vault, _, _) = root_vault();

    let created = dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;
    assert_eq!(created, true);

    let enrollments = dispatch_ok(&vault, APP_ORIGIN, json!({"enrollments": {}})).await;
    let records = enrollments.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["type"], "device");
    assert_eq!(records[0]["name"], "local");
}

#[tokio::test]
async fn sign_verifies_against_the_advertised_pubkey() {
    let (vault, _, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;

    let info = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"secp256k1KeyInfo": {"key": {"derive": "m/0"}}}),
    )
    .await;
    let pubkey_hex = info["pubkey"].as_str().unwrap();

    let digest_hex = "42".repeat(32);
    let signed = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"secp256k1Sign": {"hash": digest_hex, "key": {"derive": "m/0"}}}),
    )
    .await;
    assert_eq!(signed["hash"].as_str().unwrap(), digest_hex);

    let mut signature = [0u8; 64];
    hex::decode_to_slice(signed["signature"].as_str().unwrap(), &mut signature).unwrap();
    let sig = RecoverableSig {
        signature,
        recovery: signed["recovery"].as_u64().unwrap() as u8,
    };
    let digest = Hash256::from_hex(&digest_hex).unwrap();
    assert_eq!(
        public_key_hex(&recover(&digest, &sig).unwrap()),
        pubkey_hex
    );
}

#[tokio::test]
async fn encrypt_decrypt_round_trips_through_the_protocol() {
    let (vault, _, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;

    let info = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"secp256k1KeyInfo": {"key": {"derive": "m/0"}}}),
    )
    .await;
    let pubkey = info["pubkey"].as_str().unwrap();

    let plaintext_hex = hex::encode(b"attested payload");
    let mut envelope = dispatch_ok(
        &vault,
        "https://other.example.test",
        json!({"secp256k1Encrypt": {"pubkey": pubkey, "plaintext": plaintext_hex}}),
    )
    .await;

    // The key owner decrypts with the same derivation
    envelope["key"] = json!({"derive": "m/0"});
    let decrypted = dispatch_ok(&vault, APP_ORIGIN, json!({"secp256k1Decrypt": envelope})).await;
    assert_eq!(decrypted.as_str().unwrap(), plaintext_hex);
}

#[tokio::test]
async fn decrypt_under_the_wrong_origin_fails_authentication() {
    let (vault, _, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;

    let info = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"secp256k1KeyInfo": {"key": {"derive": "m/0"}}}),
    )
    .await;

    let mut envelope = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"secp256k1Encrypt": {
            "pubkey": info["pubkey"],
            "plaintext": hex::encode(b"scoped to one origin"),
        }}),
    )
    .await;
    envelope["key"] = json!({"derive": "m/0"});

    let error = dispatch_err(
        &vault,
        "https://evil.example.test",
        json!({"secp256k1Decrypt": envelope}),
    )
    .await;
    assert!(error.starts_with("Decryption failed"));
}

#[tokio::test]
async fn device_enrollment_handshake_over_the_protocol() {
    let (alpha, shares, objects) = root_vault();
    dispatch_ok(&alpha, APP_ORIGIN, json!({"newidentity": {}})).await;

    let beta = vault_with(
        ExecutionMode::Root,
        Arc::clone(&shares),
        Arc::clone(&objects),
        99,
    );

    // Joining device announces its keys
    let keys = dispatch_ok(&beta, APP_ORIGIN, json!({"enroleeinfo": {}})).await;

    // Enrolled device splits the live seed for it
    let local_half = dispatch_ok(
        &alpha,
        APP_ORIGIN,
        json!({"enrolldevice": {
            "devicepubkey": keys["localpubkey"],
            "authpubkey": keys["authpubkey"],
        }}),
    )
    .await;

    // Joining device adopts its sealed half
    let done = dispatch_ok(&beta, APP_ORIGIN, json!({"finishenrollment": local_half})).await;
    assert_eq!(done, true);

    let enrollments = dispatch_ok(&beta, APP_ORIGIN, json!({"enrollments": {}})).await;
    assert_eq!(enrollments.as_array().unwrap().len(), 2);

    // Both devices hold the same identity
    let seed_a = alpha
        .identity()
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    let seed_b = beta
        .identity()
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    assert_eq!(seed_a, seed_b);
}

#[tokio::test]
async fn card_enrollment_and_cardinfo() {
    let (vault, shares, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;

    let card_effects = Effects::deterministic(7, 0);
    let recovery_key = card_effects.secret_key();
    let signing_key = card_effects.secret_key();
    let recovery_hex = public_key_hex(&recovery_key.public_key(SECP256K1));
    let signing_hex = public_key_hex(&signing_key.public_key(SECP256K1));

    let enrolled = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"enrollcard": {
            "recoveryKey": recovery_hex,
            "signingKey": signing_hex,
            "passcode": "314159",
        }}),
    )
    .await;
    assert_eq!(enrolled, true);

    // Recovery data is parked under the card's signing key
    assert!(shares.contains(&signing_key.public_key(SECP256K1)));

    let info = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"cardinfo": {"deviceKey": recovery_hex}}),
    )
    .await;
    assert_eq!(info["type"], "card");
    assert_eq!(info["signingKey"], signing_hex);

    // Unknown cards answer null, not an error
    let missing = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"cardinfo": {"deviceKey": "04dead"}}),
    )
    .await;
    assert!(missing.is_null());
}

#[tokio::test]
async fn recovery_create_then_revoke_by_name() {
    let (vault, shares, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;

    let enc_key = hex::encode([0x5a; 32]);
    let created = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"recovery": {"create": {"id": "paper-backup", "key": enc_key}}}),
    )
    .await;
    let auth_key = secret_key_from_hex(created["authkey"].as_str().unwrap()).unwrap();
    assert!(shares.contains(&auth_key.public_key(SECP256K1)));

    let enrollments = dispatch_ok(&vault, APP_ORIGIN, json!({"enrollments": {}})).await;
    assert!(enrollments
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["type"] == "uri" && r["name"] == "paper-backup"));

    let revoked = dispatch_ok(
        &vault,
        APP_ORIGIN,
        json!({"recovery": {"revoke": {"name": "paper-backup"}}}),
    )
    .await;
    assert_eq!(revoked, true);

    // The record and its parked recovery data are both gone
    let enrollments = dispatch_ok(&vault, APP_ORIGIN, json!({"enrollments": {}})).await;
    assert!(!enrollments
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["name"] == "paper-backup"));
    assert!(!shares.contains(&auth_key.public_key(SECP256K1)));

    // Revoking an unknown name reports RecordNotFound
    let error = dispatch_err(
        &vault,
        APP_ORIGIN,
        json!({"recovery": {"revoke": {"name": "paper-backup"}}}),
    )
    .await;
    assert!(error.starts_with("Record not found"));
}

#[tokio::test]
async fn recovery_restore_rebuilds_the_identity_elsewhere() {
    let (alpha, shares, objects) = root_vault();
    dispatch_ok(&alpha, APP_ORIGIN, json!({"newidentity": {}})).await;

    let enc_secret_hex = hex::encode([0x77; 32]);
    let created = dispatch_ok(
        &alpha,
        APP_ORIGIN,
        json!({"recovery": {"create": {"id": "exported", "key": enc_secret_hex}}}),
    )
    .await;

    // Pull the parked recovery envelope the way an importer would
    let auth_key = secret_key_from_hex(created["authkey"].as_str().unwrap()).unwrap();
    let envelope = shares.fetch(&auth_key).await.unwrap().unwrap();

    let gamma = vault_with(
        ExecutionMode::Root,
        Arc::clone(&shares),
        Arc::clone(&objects),
        123,
    );
    let restored = dispatch_ok(
        &gamma,
        APP_ORIGIN,
        json!({"recovery": {"restore": {
            "key": enc_secret_hex,
            "recovery": serde_json::to_value(&envelope).unwrap(),
        }}}),
    )
    .await;
    assert_eq!(restored, true);
    assert!(gamma.identity().is_provisioned().unwrap());

    let seed_a = alpha
        .identity()
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    let seed_g = gamma
        .identity()
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    assert_eq!(seed_a, seed_g);
}

#[tokio::test]
async fn recovery_wipe_clears_local_state() {
    let (vault, _, _) = root_vault();
    dispatch_ok(&vault, APP_ORIGIN, json!({"newidentity": {}})).await;
    assert!(vault.identity().is_provisioned().unwrap());

    let wiped = dispatch_ok(&vault, APP_ORIGIN, json!({"recovery": {"wipe": {}}})).await;
    assert_eq!(wiped, true);
    assert!(!vault.identity().is_provisioned().unwrap());
}
