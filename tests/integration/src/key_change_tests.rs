//! Key-change detection between two accounts sharing one attribute store

use std::sync::Arc;

use authring::{Authring, KeyCheck, MemoryKeyManager};
use authring_core::{AuthMethod, KeyType};
use authring_crypto::{EncryptionKeyPair, IdentityKeyPair, KeySigner};

use crate::test_utils::{init_tracing, TestAccount, TestContact};

#[tokio::test]
async fn test_contact_keys_are_learned_and_verified() -> anyhow::Result<()> {
    init_tracing();
    let account = TestAccount::new("AAAAAAAAAAE");
    let bob = TestContact::new("AAAAAAAAAAI", account.clock.clone());
    bob.publish(&account.store);
    let authring = &account.authring;

    let signature = bob.signer.sign_key(&bob.encryption_key(), KeyType::Cu25519)?;
    let check = authring
        .observe_signed_key(&bob.handle, &bob.encryption_key(), KeyType::Cu25519, &signature)
        .await?;
    assert!(matches!(check, KeyCheck::SignatureVerified(_)));

    // identity key trusted on first use, encryption key authenticated by it
    assert!(authring
        .is_verified_at_least(&bob.handle, KeyType::Cu25519, AuthMethod::SignatureVerified)
        .await?);
    assert!(authring
        .is_verified_at_least(&bob.handle, KeyType::Ed25519, AuthMethod::Seen)
        .await?);
    assert!(!authring.is_user_verified(&bob.handle).await?);

    // repeating the observation changes nothing
    let writes = account.store.total_sets();
    let check = authring
        .observe_signed_key(&bob.handle, &bob.encryption_key(), KeyType::Cu25519, &signature)
        .await?;
    assert!(matches!(check, KeyCheck::SignatureVerified(_)));
    assert_eq!(account.store.total_sets(), writes);
    Ok(())
}

#[tokio::test]
async fn test_rotated_identity_key_blocks_signed_keys() -> anyhow::Result<()> {
    init_tracing();
    let account = TestAccount::new("AAAAAAAAAAE");
    let bob = TestContact::new("AAAAAAAAAAI", account.clock.clone());
    bob.publish(&account.store);
    let authring = &account.authring;

    let first = authring
        .observe_ed25519_key(&bob.handle, &bob.identity_key())
        .await?;
    assert!(matches!(first, KeyCheck::FirstSeen(_)));

    // bob re-registers with new keys
    let rotated = TestContact {
        handle: bob.handle,
        signer: KeySigner::with_clock(IdentityKeyPair::generate(), account.clock.clone()),
        encryption: EncryptionKeyPair::generate(),
    };
    rotated.publish(&account.store);

    let reopened = account.reopen();
    let signature = rotated
        .signer
        .sign_key(&rotated.encryption_key(), KeyType::Cu25519)?;
    let check = reopened
        .observe_signed_key(
            &bob.handle,
            &rotated.encryption_key(),
            KeyType::Cu25519,
            &signature,
        )
        .await?;
    assert!(matches!(check, KeyCheck::Changed { .. }));
    assert_eq!(
        reopened.contact_authenticated(&bob.handle, KeyType::Cu25519),
        None
    );

    // the user accepts the new identity key, after which the signed key
    // goes through
    assert!(reopened
        .accept_changed_key(&bob.handle, &rotated.identity_key())
        .await?);
    let check = reopened
        .observe_signed_key(
            &bob.handle,
            &rotated.encryption_key(),
            KeyType::Cu25519,
            &signature,
        )
        .await?;
    assert!(matches!(check, KeyCheck::SignatureVerified(_)));
    Ok(())
}

#[tokio::test]
async fn test_secure_key_manager_holds_rings() -> anyhow::Result<()> {
    init_tracing();
    let legacy = TestAccount::new("AAAAAAAAAAE");
    let keymgr = Arc::new(MemoryKeyManager::new_secure());
    let authring = Authring::builder(legacy.handle, legacy.store.clone(), keymgr.clone())
        .clock(legacy.clock.clone())
        .build();
    let bob = TestContact::new("AAAAAAAAAAI", legacy.clock.clone());
    bob.publish(&legacy.store);

    authring
        .observe_ed25519_key(&bob.handle, &bob.identity_key())
        .await?;

    assert_eq!(legacy.store.set_count("authring"), 0);
    assert!(keymgr.committed_authring(KeyType::Ed25519).is_some());
    assert_eq!(keymgr.out_shares_count(), 1);
    assert_eq!(keymgr.in_shares_count(), 1);
    Ok(())
}
