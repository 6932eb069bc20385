// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::credential::Credential;

/// 凭证保管库错误
#[derive(Error, Debug)]
pub enum VaultError {
    /// 该用户没有保存凭证
    #[error("No credential stored for owner {0}")]
    NotFound(String),
    /// 密文校验或解封失败
    #[error("Credential could not be opened: {0}")]
    Sealed(String),
    /// 底层存储错误
    #[error("Vault storage error: {0}")]
    Storage(String),
}

/// 凭证保管库特质
///
/// 保管库是唯一能看到解封后密码的组件，支持并发读取
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// 取出用户凭证
    async fn retrieve(&self, owner_id: &str) -> Result<Credential, VaultError>;
    /// 记录凭证最近一次使用时间
    async fn touch(&self, owner_id: &str) -> Result<(), VaultError>;
}
