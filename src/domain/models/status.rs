// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::domain::models::batch_job::BatchStatus;
use crate::domain::models::extraction::Warning;
use crate::domain::models::work_unit::UnitStatus;

/// 快照状态
///
/// `completed`、`failed`、`cancelled`、`not_found` 为终止状态，轮询方见到即可停止
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    NotFound,
}

impl SnapshotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SnapshotStatus::Completed
                | SnapshotStatus::Failed
                | SnapshotStatus::Cancelled
                | SnapshotStatus::NotFound
        )
    }
}

impl From<UnitStatus> for SnapshotStatus {
    fn from(status: UnitStatus) -> Self {
        match status {
            UnitStatus::Pending => SnapshotStatus::Pending,
            UnitStatus::Running => SnapshotStatus::Running,
            UnitStatus::Completed => SnapshotStatus::Completed,
            UnitStatus::Failed => SnapshotStatus::Failed,
            UnitStatus::Cancelled => SnapshotStatus::Cancelled,
        }
    }
}

impl From<BatchStatus> for SnapshotStatus {
    fn from(status: BatchStatus) -> Self {
        match status {
            BatchStatus::Pending => SnapshotStatus::Pending,
            BatchStatus::Running => SnapshotStatus::Running,
            BatchStatus::Paused => SnapshotStatus::Paused,
            BatchStatus::Completed => SnapshotStatus::Completed,
            BatchStatus::Failed => SnapshotStatus::Failed,
            BatchStatus::Cancelled => SnapshotStatus::Cancelled,
        }
    }
}

/// 可轮询的状态快照（运行级或单元级）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: SnapshotStatus,
    pub progress: f32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<Warning>>,
}

impl StatusSnapshot {
    pub fn not_found() -> Self {
        Self {
            status: SnapshotStatus::NotFound,
            progress: 0.0,
            message: "not found".to_string(),
            error: None,
            warnings: None,
        }
    }
}
