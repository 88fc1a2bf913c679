//! Persistence through the SQLite attribute store, configured from TOML

use std::sync::atomic::Ordering;
use std::sync::Arc;

use authring::{AttributeScope, AttributeStore, Authring, MemoryKeyManager, SqliteAttributeStore};
use authring_core::{AuthMethod, AuthringConfig, Handle, KeyConfidence, KeyType, StorageBackend};

use crate::test_utils::init_tracing;

fn config_for(path: &std::path::Path) -> anyhow::Result<AuthringConfig> {
    let toml = format!(
        r#"
        [commit]
        delay_ms = 5

        [logging]
        level = "debug"

        [storage]
        backend = "sqlite"
        path = "{}"
        "#,
        path.display()
    );
    Ok(AuthringConfig::from_toml_str(&toml)?)
}

fn open(config: &AuthringConfig, owner: Handle) -> anyhow::Result<Authring> {
    let path = config
        .storage
        .path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("storage.path missing"))?;
    let store = SqliteAttributeStore::open(path, owner)?;
    Ok(Authring::builder(owner, Arc::new(store), Arc::new(MemoryKeyManager::new_legacy()))
        .config(config.clone())
        .build())
}

#[tokio::test]
async fn test_state_survives_restart() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join(format!("authring-it-{}", std::process::id()));
    let config = config_for(&dir.join("attributes.db"))?;
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);

    let me: Handle = "AAAAAAAAAAE".parse()?;
    let bob: Handle = "AAAAAAAAAAI".parse()?;
    let carol: Handle = "AAAAAAAAAAM".parse()?;

    let ed_key = {
        let authring = open(&config, me)?;
        authring
            .set_contact_authenticated(
                &bob,
                [0xb0u8; 20],
                KeyType::Ed25519,
                AuthMethod::FingerprintComparison,
                KeyConfidence::Unsure,
            )
            .await?;
        authring
            .set_contact_authenticated(
                &carol,
                [0xc0u8; 20],
                KeyType::Cu25519,
                AuthMethod::SignatureVerified,
                KeyConfidence::Unsure,
            )
            .await?;
        assert_eq!(
            authring.metrics().keypairs_generated.load(Ordering::Relaxed),
            1
        );
        authring.own_public_key(KeyType::Ed25519)
    };

    let authring = open(&config, me)?;
    authring.initialise().await?;
    assert_eq!(authring.own_public_key(KeyType::Ed25519), ed_key);
    assert_eq!(
        authring.metrics().keypairs_generated.load(Ordering::Relaxed),
        0
    );
    assert!(authring.is_user_verified(&bob).await?);
    assert_eq!(
        authring
            .contact_authenticated(&carol, KeyType::Cu25519)
            .map(|r| r.method),
        Some(AuthMethod::SignatureVerified)
    );

    authring.scrub_auth_ring().await?;
    drop(authring);

    let store = SqliteAttributeStore::open(dir.join("attributes.db"), me)?;
    for key_type in KeyType::ALL {
        let ring = store
            .get(me, key_type.info().ring_attribute, AttributeScope::Private)
            .await?;
        assert!(ring.is_empty());
    }

    let _ = std::fs::remove_dir_all(dir);
    Ok(())
}
