// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::work_unit::DomainError;

/// 批处理作业实体
///
/// 一组按顺序处理的工作单元，带有持久化检查点（已完成单元ID集合），
/// 支持暂停、恢复和取消。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// 批次唯一标识符
    pub id: Uuid,
    /// 所属用户ID
    pub owner_id: String,
    /// 有序的工作单元ID列表
    pub unit_ids: Vec<Uuid>,
    /// 检查点：已完成的单元ID（按完成顺序，无重复）
    pub completed_unit_ids: Vec<Uuid>,
    /// 聚合状态
    pub status: BatchStatus,
    /// 执行选项
    pub options: BatchOptions,
    /// 失败或取消原因
    pub error_message: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
    /// 最近一次开始（或恢复）时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// 批次执行选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatchOptions {
    /// 首个单元失败时终止整个批次
    pub stop_on_first_failure: bool,
    /// 是否提交表单；为false时只填写不提交（半自动模式）
    pub submit: bool,
}

/// 批次状态
///
/// Pending(Idle) → Running → Completed/Failed/Cancelled
/// Running ⇄ Paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// 尚未开始
    #[default]
    Pending,
    /// 运行中
    Running,
    /// 已暂停
    Paused,
    /// 全部单元完成
    Completed,
    /// 存在失败单元或运行被中止
    Failed,
    /// 已取消
    Cancelled,
}

impl BatchStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Paused => write!(f, "paused"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Failed => write!(f, "failed"),
            BatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "running" => Ok(BatchStatus::Running),
            "paused" => Ok(BatchStatus::Paused),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl BatchJob {
    /// 创建新的批处理作业
    pub fn new(owner_id: impl Into<String>, unit_ids: Vec<Uuid>, options: BatchOptions) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            unit_ids,
            completed_unit_ids: Vec::new(),
            status: BatchStatus::Pending,
            options,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn total_count(&self) -> usize {
        self.unit_ids.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed_unit_ids.len()
    }

    /// 聚合进度（0-100），即 completed_count / total_count
    pub fn progress(&self) -> f32 {
        if self.unit_ids.is_empty() {
            return if self.status == BatchStatus::Completed { 100.0 } else { 0.0 };
        }
        self.completed_count() as f32 * 100.0 / self.total_count() as f32
    }

    pub fn is_unit_completed(&self, unit_id: &Uuid) -> bool {
        self.completed_unit_ids.contains(unit_id)
    }

    /// 判断批次是否可恢复
    ///
    /// 仅当 `0 < completed < total` 且批次既未取消也不在运行中时可恢复
    pub fn is_resumable(&self) -> bool {
        let completed = self.completed_count();
        completed > 0
            && completed < self.total_count()
            && matches!(self.status, BatchStatus::Failed | BatchStatus::Paused)
    }

    /// 尚未完成的单元，保持原始顺序
    ///
    /// 恢复时从第一个未完成单元开始
    pub fn remaining_unit_ids(&self) -> Vec<Uuid> {
        self.unit_ids
            .iter()
            .filter(|id| !self.is_unit_completed(id))
            .copied()
            .collect()
    }

    /// 记录单元完成（写入检查点）
    pub fn mark_unit_completed(&mut self, unit_id: Uuid) {
        if self.unit_ids.contains(&unit_id) && !self.is_unit_completed(&unit_id) {
            self.completed_unit_ids.push(unit_id);
        }
        self.updated_at = Utc::now().into();
    }

    /// 启动批次
    ///
    /// Pending → Running
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            BatchStatus::Pending => {
                let now = Utc::now().into();
                self.status = BatchStatus::Running;
                self.started_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "start")),
        }
    }

    /// 恢复批次
    ///
    /// Failed/Paused → Running，要求批次满足可恢复条件
    pub fn resume(mut self) -> Result<Self, DomainError> {
        if !self.is_resumable() {
            return Err(DomainError::transition(self.status, "resume"));
        }
        let now = Utc::now().into();
        self.status = BatchStatus::Running;
        self.error_message = None;
        self.started_at = Some(now);
        self.completed_at = None;
        self.updated_at = now;
        Ok(self)
    }

    /// 暂停批次
    ///
    /// Running → Paused
    pub fn pause(mut self) -> Result<Self, DomainError> {
        match self.status {
            BatchStatus::Running => {
                self.status = BatchStatus::Paused;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            other => Err(DomainError::transition(other, "pause")),
        }
    }

    /// 标记批次失败
    pub fn fail(mut self, error: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            BatchStatus::Running | BatchStatus::Paused => {
                let now = Utc::now().into();
                self.status = BatchStatus::Failed;
                self.error_message = Some(error.into());
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "fail")),
        }
    }

    /// 取消批次
    pub fn cancel(mut self, reason: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            BatchStatus::Pending | BatchStatus::Running | BatchStatus::Paused => {
                let now = Utc::now().into();
                self.status = BatchStatus::Cancelled;
                self.error_message = Some(reason.into());
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, "cancel")),
        }
    }

    /// 结束一次完整遍历
    ///
    /// 全部单元完成则为Completed，否则为Failed
    pub fn finish(mut self, failed_units: usize) -> Result<Self, DomainError> {
        if self.status != BatchStatus::Running {
            return Err(DomainError::transition(self.status, "finish"));
        }
        let now = Utc::now().into();
        if self.completed_count() == self.total_count() {
            self.status = BatchStatus::Completed;
            self.error_message = None;
        } else {
            self.status = BatchStatus::Failed;
            self.error_message = Some(format!(
                "{} of {} units failed",
                failed_units.max(self.total_count() - self.completed_count()),
                self.total_count()
            ));
        }
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(self)
    }
}
