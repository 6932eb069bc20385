// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::models::credential::Credential;
use crate::domain::services::credential_vault::{CredentialVault, VaultError};
use crate::infrastructure::database::entities::credential as credential_entity;
use crate::infrastructure::vault::secret_opener::SecretOpener;

/// 基于数据库的凭证保管库
///
/// 只保存封装后的密文，取出时通过 `SecretOpener` 解封
#[derive(Clone)]
pub struct DatabaseVault {
    db: Arc<DatabaseConnection>,
    opener: Arc<dyn SecretOpener>,
}

impl DatabaseVault {
    pub fn new(db: Arc<DatabaseConnection>, opener: Arc<dyn SecretOpener>) -> Self {
        Self { db, opener }
    }

    /// 保存或替换用户凭证
    ///
    /// # 参数
    ///
    /// * `owner_id` - 用户ID
    /// * `username` - 门户登录名
    /// * `secret` - 明文密码，写入前封装
    pub async fn store(&self, owner_id: &str, username: &str, secret: &str) -> Result<(), VaultError> {
        let sealed = self.opener.seal(secret)?;
        let now: DateTime<FixedOffset> = Utc::now().into();

        let existing = credential_entity::Entity::find_by_id(owner_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?;

        match existing {
            Some(model) => {
                let mut active: credential_entity::ActiveModel = model.into();
                active.username = Set(username.to_string());
                active.sealed_secret = Set(sealed);
                active.updated_at = Set(now);
                active
                    .update(self.db.as_ref())
                    .await
                    .map_err(|e| VaultError::Storage(e.to_string()))?;
            }
            None => {
                credential_entity::ActiveModel {
                    owner_id: Set(owner_id.to_string()),
                    username: Set(username.to_string()),
                    sealed_secret: Set(sealed),
                    last_used_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(self.db.as_ref())
                .await
                .map_err(|e| VaultError::Storage(e.to_string()))?;
            }
        }

        info!(owner_id, "Stored credential");
        Ok(())
    }

    async fn find(&self, owner_id: &str) -> Result<credential_entity::Model, VaultError> {
        credential_entity::Entity::find_by_id(owner_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?
            .ok_or_else(|| VaultError::NotFound(owner_id.to_string()))
    }
}

#[async_trait]
impl CredentialVault for DatabaseVault {
    async fn retrieve(&self, owner_id: &str) -> Result<Credential, VaultError> {
        let model = self.find(owner_id).await?;
        let secret = self.opener.open(&model.sealed_secret)?;
        debug!(owner_id, "Retrieved credential");
        Ok(Credential::new(
            model.owner_id,
            model.username,
            secret,
            model.last_used_at,
        ))
    }

    async fn touch(&self, owner_id: &str) -> Result<(), VaultError> {
        let model = self.find(owner_id).await?;
        let now: DateTime<FixedOffset> = Utc::now().into();
        let mut active: credential_entity::ActiveModel = model.into();
        active.last_used_at = Set(Some(now));
        active.updated_at = Set(now);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(())
    }
}
