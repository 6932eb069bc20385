// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 运行触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunTrigger::Scheduled => write!(f, "scheduled"),
            RunTrigger::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for RunTrigger {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(RunTrigger::Scheduled),
            "manual" => Ok(RunTrigger::Manual),
            _ => Err(()),
        }
    }
}

/// 运行历史记录
///
/// 每次运行尝试写入且只写入一条，写入后不可修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeHistoryEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub schedule_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub trigger: RunTrigger,
    pub started_at: DateTime<FixedOffset>,
    pub finished_at: DateTime<FixedOffset>,
    pub success: bool,
    /// 本次运行完成的工作单元数
    pub item_count: u32,
    pub error_message: Option<String>,
}

/// 一次进行中的运行尝试
///
/// 以值语义消费自身生成历史记录，保证每次尝试只产生一条记录
#[derive(Debug, Clone)]
pub struct RunAttempt {
    owner_id: String,
    schedule_id: Option<Uuid>,
    trigger: RunTrigger,
    started_at: DateTime<FixedOffset>,
    batch_id: Option<Uuid>,
}

impl RunAttempt {
    pub fn begin(owner_id: impl Into<String>, trigger: RunTrigger, schedule_id: Option<Uuid>) -> Self {
        Self {
            owner_id: owner_id.into(),
            schedule_id,
            trigger,
            started_at: Utc::now().into(),
            batch_id: None,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn set_batch(&mut self, batch_id: Uuid) {
        self.batch_id = Some(batch_id);
    }

    pub fn finish_success(self, item_count: u32) -> ScrapeHistoryEntry {
        self.finish(true, item_count, None)
    }

    pub fn finish_failure(self, item_count: u32, error: impl Into<String>) -> ScrapeHistoryEntry {
        self.finish(false, item_count, Some(error.into()))
    }

    fn finish(self, success: bool, item_count: u32, error_message: Option<String>) -> ScrapeHistoryEntry {
        ScrapeHistoryEntry {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            schedule_id: self.schedule_id,
            batch_id: self.batch_id,
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: Utc::now().into(),
            success,
            item_count,
            error_message,
        }
    }
}
