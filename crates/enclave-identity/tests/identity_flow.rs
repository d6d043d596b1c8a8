//! End-to-end identity lifecycle tests over in-memory stores

use std::sync::Arc;

use enclave_core::{Hash256, VaultError};
use enclave_crypto::{public_key_from_hex, Effects};
use enclave_identity::{
    EnrollmentRecord, IdentityService, MemoryObjectStore, MemoryShareStore, MemoryStore,
    ShareStore,
};
use secp256k1::SECP256K1;

fn service_with_stores(
    shares: Arc<MemoryShareStore>,
    objects: Arc<MemoryObjectStore>,
    seed: u64,
) -> IdentityService {
    IdentityService::new(
        Arc::new(MemoryStore::new()),
        shares,
        objects,
        Effects::deterministic(seed, 1_735_689_600_000),
    )
}

fn service() -> (IdentityService, Arc<MemoryShareStore>, Arc<MemoryObjectStore>) {
    let shares = Arc::new(MemoryShareStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let svc = service_with_stores(Arc::clone(&shares), Arc::clone(&objects), 42);
    (svc, shares, objects)
}

#[tokio::test]
async fn create_identity_provisions_and_enrolls_this_device() {
    let (svc, shares, _) = service();
    assert!(!svc.is_provisioned().unwrap());

    svc.create_identity().await.unwrap();

    assert!(svc.is_provisioned().unwrap());
    assert_eq!(shares.store_count(), 1);

    let records = svc.registry().enrollments().await.unwrap();
    assert_eq!(records.len(), 1);
    let device_key = svc.local_pubkey_hex().unwrap();
    assert_eq!(records[0].device_key, device_key);
    assert_eq!(records[0].name, device_key[device_key.len() - 8..]);
}

#[tokio::test]
async fn create_identity_twice_is_refused() {
    let (svc, _, _) = service();
    svc.create_identity().await.unwrap();
    assert!(matches!(
        svc.create_identity().await,
        Err(VaultError::Invalid { .. })
    ));
}

#[tokio::test]
async fn master_seed_reconstructs_to_32_bytes() {
    let (svc, _, _) = service();
    svc.create_identity().await.unwrap();

    let len = svc
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().len()) })
        .await
        .unwrap();
    assert_eq!(len, 32);
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    let baseline = shares.fetch_count();
    shares.set_fetch_yields(2);

    let lifecycle = svc.lifecycle();
    let (a, b) = tokio::join!(
        lifecycle.with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) }),
        lifecycle.with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) }),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(shares.fetch_count() - baseline, 1);
}

#[tokio::test]
async fn cache_clears_at_refcount_zero_and_refetches() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    let baseline = shares.fetch_count();
    let lifecycle = svc.lifecycle();

    lifecycle
        .with_master_seed(|_| async move { Ok(()) })
        .await
        .unwrap();
    assert_eq!(shares.fetch_count() - baseline, 1);
    assert_eq!(lifecycle.refs(), 0);

    // The seed must not linger between unrelated operations
    lifecycle
        .with_master_seed(|_| async move { Ok(()) })
        .await
        .unwrap();
    assert_eq!(shares.fetch_count() - baseline, 2);
}

#[tokio::test]
async fn nested_calls_reuse_the_cached_seed() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    let baseline = shares.fetch_count();
    let lifecycle = Arc::clone(svc.lifecycle());
    let inner = Arc::clone(&lifecycle);

    lifecycle
        .with_master_seed(|outer| async move {
            inner
                .with_master_seed(|nested| async move {
                    assert_eq!(outer.as_bytes(), nested.as_bytes());
                    Ok(())
                })
                .await
        })
        .await
        .unwrap();

    assert_eq!(shares.fetch_count() - baseline, 1);
}

#[tokio::test]
async fn derivation_is_stable_across_reconstructions() {
    let (svc, _, _) = service();
    svc.create_identity().await.unwrap();

    let hash = Hash256::label("https://app.example.test");
    let first = svc.lifecycle().derive(hash).await.unwrap();
    let second = svc.lifecycle().derive(hash).await.unwrap();
    assert_eq!(first.public_key(), second.public_key());
}

#[tokio::test]
async fn enroll_twice_keeps_the_latest_record() {
    let (svc, _, _) = service();
    svc.create_identity().await.unwrap();

    let now = svc.effects().unix_millis().unwrap();
    svc.registry()
        .enroll(EnrollmentRecord::device("first", "04aabb", now))
        .await
        .unwrap();
    svc.registry()
        .enroll(EnrollmentRecord::device("second", "04aabb", now + 1))
        .await
        .unwrap();

    let records = svc.registry().enrollments().await.unwrap();
    let matching: Vec<_> = records.iter().filter(|r| r.device_key == "04aabb").collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, "second");
}

#[tokio::test]
async fn revoke_unknown_key_is_record_not_found() {
    let (svc, _, _) = service();
    svc.create_identity().await.unwrap();

    assert!(matches!(
        svc.registry().revoke("04ffff").await,
        Err(VaultError::RecordNotFound { .. })
    ));
}

#[tokio::test]
async fn revoke_removes_the_record_and_the_remote_share() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    // Enroll a second device the way the enrollment flow does
    let device_effects = Effects::deterministic(7, 0);
    let device_local = device_effects.secret_key();
    let device_auth = device_effects.secret_key();
    let device_pub = device_local.public_key(SECP256K1);
    let device_auth_pub = device_auth.public_key(SECP256K1);

    svc.split_for_device(device_pub, device_auth_pub)
        .await
        .unwrap();
    assert!(shares.contains(&device_auth_pub));

    let device_key = enclave_crypto::public_key_hex(&device_pub);
    let now = svc.effects().unix_millis().unwrap();
    svc.registry()
        .enroll(EnrollmentRecord::device("second", device_key.clone(), now))
        .await
        .unwrap();
    assert_eq!(svc.registry().enrollments().await.unwrap().len(), 2);

    svc.registry().revoke(&device_key).await.unwrap();

    // Exactly that record is gone, and its remote share is dead
    let records = svc.registry().enrollments().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_ne!(records[0].device_key, device_key);
    assert!(!shares.contains(&device_auth_pub));
    assert!(shares
        .fetch(&device_auth)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn missing_remote_share_wipes_local_state() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    let (auth_key, _) = svc.local().load_keys().unwrap();
    shares.drop_share(&auth_key.public_key(SECP256K1));

    let result = svc
        .lifecycle()
        .with_master_seed(|_| async move { Ok(()) })
        .await;
    assert!(matches!(result, Err(VaultError::RemoteIdentity { .. })));
    assert!(!svc.is_provisioned().unwrap());
}

#[tokio::test]
async fn transient_failure_keeps_local_state_and_is_retryable() {
    let (svc, shares, _) = service();
    svc.create_identity().await.unwrap();

    shares.fail_next_fetch(VaultError::remote_unavailable("503"));
    let result = svc
        .lifecycle()
        .with_master_seed(|_| async move { Ok(()) })
        .await;
    match result {
        Err(e) => assert!(e.is_retryable()),
        Ok(()) => panic!("fetch should have failed"),
    }
    assert!(svc.is_provisioned().unwrap());

    // The failure was not cached; the next attempt succeeds
    svc.lifecycle()
        .with_master_seed(|_| async move { Ok(()) })
        .await
        .unwrap();
}

#[tokio::test]
async fn unreadable_registry_document_reads_as_empty() {
    let (svc, _, objects) = service();
    svc.create_identity().await.unwrap();
    assert_eq!(svc.registry().enrollments().await.unwrap().len(), 1);

    let registry_node = svc.lifecycle().derive(Hash256::label("devices")).await.unwrap();
    let owner = enclave_crypto::public_key_hex(&registry_node.public_key());
    objects.inject(&owner, b"not an envelope".to_vec());

    assert!(svc.registry().enrollments().await.unwrap().is_empty());
}

#[tokio::test]
async fn second_device_joins_and_reconstructs_the_same_seed() {
    let (alpha, shares, objects) = service();
    alpha.create_identity().await.unwrap();

    // The joining device generates its keys and hands over the public halves
    let beta = service_with_stores(Arc::clone(&shares), Arc::clone(&objects), 99);
    let keys = beta.enrollee_keys().unwrap();

    // The enrolling device splits the live seed for it
    let local_envelope = alpha
        .split_for_device(
            public_key_from_hex(&keys.local_pubkey).unwrap(),
            public_key_from_hex(&keys.auth_pubkey).unwrap(),
        )
        .await
        .unwrap();

    // The joining device adopts its sealed local half
    beta.adopt_local_share(local_envelope).await.unwrap();
    assert!(beta.is_provisioned().unwrap());

    let seed_a = alpha
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    let seed_b = beta
        .lifecycle()
        .with_master_seed(|seed| async move { Ok(seed.as_bytes().to_vec()) })
        .await
        .unwrap();
    assert_eq!(seed_a, seed_b);

    // Both devices are enrolled
    assert_eq!(beta.registry().enrollments().await.unwrap().len(), 2);
}
