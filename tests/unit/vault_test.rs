// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use sea_orm::EntityTrait;

use crate::integration::helpers::memory_db;
use visitrs::domain::services::credential_vault::{CredentialVault, VaultError};
use visitrs::infrastructure::database::entities::credential as credential_entity;
use visitrs::infrastructure::vault::database_vault::DatabaseVault;
use visitrs::infrastructure::vault::secret_opener::{AesGcmSecretOpener, SecretOpener};

fn opener(key: &str) -> Arc<dyn SecretOpener> {
    Arc::new(AesGcmSecretOpener::new(key).unwrap())
}

/// 测试封装与解封
#[test]
fn test_seal_and_open_roundtrip() {
    let opener = opener("vault-key");
    let sealed = opener.seal("p@ss word!").unwrap();
    assert_ne!(sealed, "p@ss word!");
    assert_eq!(opener.open(&sealed).unwrap(), "p@ss word!");

    // fresh nonce per seal
    assert_ne!(opener.seal("p@ss word!").unwrap(), sealed);
}

/// 测试信封由 96 位随机数、密文和 16 字节认证标签组成
#[test]
fn test_envelope_layout() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    let sealed = opener("vault-key").seal("hunter2").unwrap();
    let envelope = BASE64.decode(&sealed).unwrap();
    assert_eq!(envelope.len(), 12 + "hunter2".len() + 16);

    let mut tampered = envelope.clone();
    tampered[12] ^= 0x80;
    assert!(matches!(
        opener("vault-key").open(&BASE64.encode(tampered)),
        Err(VaultError::Sealed(_))
    ));
}

/// 测试不同密钥无法解封
#[test]
fn test_other_key_cannot_open() {
    let sealed = opener("key-a").seal("secret").unwrap();
    assert!(matches!(opener("key-b").open(&sealed), Err(VaultError::Sealed(_))));
    assert!(opener("key-a").open("not-an-envelope").is_err());
}

/// 测试保存后可取出，数据库中只保存密文
#[tokio::test]
async fn test_store_and_retrieve() {
    let db = memory_db().await;
    let vault = DatabaseVault::new(db.clone(), opener("vault-key"));

    vault.store("owner-1", "tech@example.com", "hunter2").await.unwrap();

    let credential = vault.retrieve("owner-1").await.unwrap();
    assert_eq!(credential.username, "tech@example.com");
    assert_eq!(credential.secret(), "hunter2");
    assert!(credential.last_used_at.is_none());
    assert!(!format!("{:?}", credential).contains("hunter2"));

    let row = credential_entity::Entity::find_by_id("owner-1".to_string())
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(!row.sealed_secret.contains("hunter2"));
}

/// 测试再次保存会替换旧凭证
#[tokio::test]
async fn test_store_replaces_existing_credential() {
    let vault = DatabaseVault::new(memory_db().await, opener("vault-key"));

    vault.store("owner-1", "old@example.com", "first").await.unwrap();
    vault.store("owner-1", "new@example.com", "second").await.unwrap();

    let credential = vault.retrieve("owner-1").await.unwrap();
    assert_eq!(credential.username, "new@example.com");
    assert_eq!(credential.secret(), "second");
}

/// 测试记录使用时间
#[tokio::test]
async fn test_touch_records_last_use() {
    let vault = DatabaseVault::new(memory_db().await, opener("vault-key"));
    vault.store("owner-1", "tech@example.com", "hunter2").await.unwrap();

    vault.touch("owner-1").await.unwrap();
    let credential = vault.retrieve("owner-1").await.unwrap();
    assert!(credential.last_used_at.is_some());
}

/// 测试未保存凭证的用户
#[tokio::test]
async fn test_unknown_owner_is_not_found() {
    let vault = DatabaseVault::new(memory_db().await, opener("vault-key"));

    assert!(matches!(vault.retrieve("nobody").await, Err(VaultError::NotFound(_))));
    assert!(matches!(vault.touch("nobody").await, Err(VaultError::NotFound(_))));
}

/// 测试更换封装密钥后旧密文无法解封
#[tokio::test]
async fn test_rotated_key_cannot_open_stored_secret() {
    let db = memory_db().await;
    DatabaseVault::new(db.clone(), opener("old-key"))
        .store("owner-1", "tech@example.com", "hunter2")
        .await
        .unwrap();

    let rotated = DatabaseVault::new(db, opener("new-key"));
    assert!(matches!(rotated.retrieve("owner-1").await, Err(VaultError::Sealed(_))));
}
