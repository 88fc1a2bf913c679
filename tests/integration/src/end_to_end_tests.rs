//! End-to-end trust store scenarios
//!
//! 1. Manual verification of a contact, then reset of that verification
//! 2. Concurrent initialisation from many tasks
//! 3. Concurrent mutations of one ring
//! 4. Identity mismatch mid-session

use std::sync::atomic::Ordering;

use authring::{AttributeScope, AuthringError, TrustRecord, VerificationState};
use authring_core::{AuthMethod, Handle, KeyConfidence, KeyType};
use authring_crypto::compute_fingerprint;

use crate::test_utils::{init_tracing, TestAccount, TestContact};

#[tokio::test]
async fn test_verify_then_reset_contact() -> anyhow::Result<()> {
    init_tracing();

    let account = TestAccount::new("AAAAAAAAAAE");
    let contact = TestContact::new("AAAAAAAAAAA", account.clock.clone());
    contact.publish(&account.store);
    let authring = &account.authring;

    // Step 1: the Ed25519 ring starts out empty
    assert!(authring.get_contacts(KeyType::Ed25519).await?.is_empty());

    // Step 2: the user compares fingerprints and confirms
    let fingerprint = compute_fingerprint(&contact.identity_key(), KeyType::Ed25519)?;
    let changed = authring
        .set_contact_authenticated(
            &contact.handle,
            fingerprint,
            KeyType::Ed25519,
            AuthMethod::FingerprintComparison,
            KeyConfidence::Unsure,
        )
        .await?;
    assert!(changed);

    assert_eq!(
        authring.contact_authenticated(&contact.handle, KeyType::Ed25519),
        Some(TrustRecord::new(
            fingerprint,
            AuthMethod::FingerprintComparison,
            KeyConfidence::Unsure
        ))
    );
    assert!(authring.is_user_verified(&contact.handle).await?);
    assert_eq!(
        authring.verification_state(&contact.handle).await?,
        VerificationState::Verified
    );

    // Step 3: the verification is reset
    assert!(authring.reset_fingerprints_for_user(&contact.handle).await?);
    let record = authring
        .contact_authenticated(&contact.handle, KeyType::Ed25519)
        .expect("record survives a reset");
    assert_eq!(record.method, AuthMethod::Seen);
    assert_eq!(record.fingerprint, fingerprint);
    assert!(!authring.is_user_verified(&contact.handle).await?);

    // Step 4: the persisted ring carries the same state
    let reopened = account.reopen();
    reopened.initialise().await?;
    assert_eq!(
        reopened.contact_authenticated(&contact.handle, KeyType::Ed25519),
        Some(record)
    );
    assert_eq!(
        reopened
            .metrics()
            .keypairs_generated
            .load(Ordering::Relaxed),
        0
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_initialise_from_many_tasks() -> anyhow::Result<()> {
    init_tracing();
    let account = TestAccount::new("AAAAAAAAAAE");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let authring = account.authring.clone();
        tasks.push(tokio::spawn(async move { authring.initialise().await }));
    }
    for task in tasks {
        task.await??;
    }

    assert!(account.authring.had_initialised());
    assert_eq!(
        account
            .authring
            .metrics()
            .keypairs_generated
            .load(Ordering::Relaxed),
        1
    );
    assert_eq!(account.store.get_count("keyring"), 1);
    assert_eq!(account.store.set_count("keyring"), 1);
    assert_eq!(account.store.get_count("authring"), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_all_reach_storage() -> anyhow::Result<()> {
    init_tracing();
    let account = TestAccount::new("AAAAAAAAAAE");
    account.authring.initialise().await?;

    let mut tasks = Vec::new();
    for n in 0..20u8 {
        let authring = account.authring.clone();
        tasks.push(tokio::spawn(async move {
            let handle = Handle::from_bytes([0x10, n, 0, 0, 0, 0, 0, 0]);
            authring
                .set_contact_authenticated(
                    &handle,
                    [n; 20],
                    KeyType::Cu25519,
                    AuthMethod::Seen,
                    KeyConfidence::Unsure,
                )
                .await
        }));
    }
    for task in tasks {
        assert!(task.await??);
    }

    let stored = account
        .store
        .peek(account.handle, "authCu255", AttributeScope::Private)
        .expect("ring persisted");
    assert_eq!(authring::decode_ring(&stored).len(), 20);
    assert_eq!(account.authring.get_contacts(KeyType::Cu25519).await?.len(), 20);
    Ok(())
}

#[tokio::test]
async fn test_identity_mismatch_poisons_session() -> anyhow::Result<()> {
    init_tracing();
    let account = TestAccount::new("AAAAAAAAAAE");
    let contact = TestContact::new("AAAAAAAAAAA", account.clock.clone());
    let authring = &account.authring;
    let mut fatal = authring.fatal_signal();

    authring.initialise().await?;
    let writes = account.store.total_sets();

    // the host switched accounts without tearing down this context
    authring.set_session_account("AAAAAAAAAAI".parse()?);
    let err = authring
        .set_contact_authenticated(
            &contact.handle,
            [1u8; 20],
            KeyType::Ed25519,
            AuthMethod::FingerprintComparison,
            KeyConfidence::Unsure,
        )
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(account.store.total_sets(), writes);
    assert_eq!(authring.contact_authenticated(&contact.handle, KeyType::Ed25519), None);

    fatal.changed().await?;
    assert!(matches!(
        *fatal.borrow(),
        Some(AuthringError::IdentityMismatch { .. })
    ));

    assert_eq!(
        authring.is_user_verified(&contact.handle).await,
        Err(AuthringError::Poisoned)
    );
    assert_eq!(authring.scrub_auth_ring().await, Err(AuthringError::Poisoned));
    Ok(())
}
