// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::work_unit::DomainError;
use crate::domain::repositories::work_unit_repository::RepositoryError;
use crate::domain::services::credential_vault::VaultError;
use crate::engines::traits::DriverError;

/// 自动化运行错误类型
#[derive(Error, Debug)]
pub enum AutomationError {
    /// 页面瞬时问题（就绪超时、失效引用），不致命
    #[error("Transient UI error: {0}")]
    TransientUi(String),

    /// 登录失败，终止当前运行
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 无法导航到工单页面，仅当前单元失败
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// 该用户已有进行中的运行
    #[error("Owner {0} already has a run in flight")]
    OwnerBusy(String),

    #[error("Batch {0} is not resumable")]
    NotResumable(String),

    /// 请求的状态转换在当前状态下不允许
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 超过运行绝对时限
    #[error("Run exceeded wall-clock limit of {0}s")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// 是否终止整个运行（而不仅是当前单元）
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            AutomationError::Authentication(_)
                | AutomationError::Repository(_)
                | AutomationError::Timeout(_)
                | AutomationError::Internal(_)
        )
    }
}

impl From<DriverError> for AutomationError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Authentication(msg) => AutomationError::Authentication(msg),
            DriverError::Navigation(msg) => AutomationError::Navigation(msg),
            DriverError::Session(msg) => AutomationError::Internal(format!("browser session: {}", msg)),
            other => AutomationError::TransientUi(other.to_string()),
        }
    }
}

impl From<VaultError> for AutomationError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NotFound(owner) => {
                AutomationError::Authentication(format!("no credential stored for {}", owner))
            }
            VaultError::Sealed(msg) => AutomationError::Authentication(format!("credential unreadable: {}", msg)),
            VaultError::Storage(msg) => AutomationError::Internal(format!("vault storage: {}", msg)),
        }
    }
}

impl From<DomainError> for AutomationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => AutomationError::Validation(msg),
            other => AutomationError::InvalidState(other.to_string()),
        }
    }
}
