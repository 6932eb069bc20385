// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::batch_job::BatchJob;
use crate::domain::models::status::SnapshotStatus;
use crate::infrastructure::state::run_registry::RunId;

/// 运行已受理的响应
#[derive(Debug, Deserialize, Serialize)]
pub struct RunAcceptedDto {
    pub success: bool,
    pub run_id: RunId,
    pub owner_id: String,
}

/// 批次概要
#[derive(Debug, Deserialize, Serialize)]
pub struct BatchSummaryDto {
    pub id: Uuid,
    pub owner_id: String,
    pub status: SnapshotStatus,
    pub progress: f32,
    pub total_units: usize,
    pub completed_units: usize,
    pub resumable: bool,
    pub error: Option<String>,
}

impl From<&BatchJob> for BatchSummaryDto {
    fn from(batch: &BatchJob) -> Self {
        Self {
            id: batch.id,
            owner_id: batch.owner_id.clone(),
            status: batch.status.into(),
            progress: batch.progress(),
            total_units: batch.total_count(),
            completed_units: batch.completed_count(),
            resumable: batch.is_resumable(),
            error: batch.error_message.clone(),
        }
    }
}
