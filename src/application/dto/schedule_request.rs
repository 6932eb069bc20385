// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::models::schedule::ActiveHours;

/// 创建调度请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateScheduleRequestDto {
    /// 所属用户ID（必填）
    #[validate(length(min = 1, max = 128))]
    pub owner_id: String,

    /// 运行间隔（分钟，最长一周）
    #[validate(range(min = 1, max = 10080))]
    pub interval_minutes: u32,

    /// 活跃窗口开始时间，格式 `HH:MM`
    pub active_start: Option<String>,

    /// 活跃窗口结束时间，格式 `HH:MM`
    pub active_end: Option<String>,

    /// 活跃窗口所用的UTC偏移（分钟）
    #[validate(range(min = -840, max = 840))]
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl CreateScheduleRequestDto {
    /// 解析活跃窗口
    ///
    /// # 返回值
    ///
    /// * `Ok(None)` - 未配置窗口
    /// * `Err(String)` - 只给了一端、时间格式错误或首尾相同
    pub fn active_hours(&self) -> Result<Option<ActiveHours>, String> {
        match (&self.active_start, &self.active_end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = parse_time(start)?;
                let end = parse_time(end)?;
                let window = ActiveHours::new(start, end);
                if window.is_empty() {
                    return Err("active_start and active_end must differ".to_string());
                }
                Ok(Some(window))
            }
            _ => Err("active_start and active_end must be given together".to_string()),
        }
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| format!("invalid time '{}', expected HH:MM", value))
}
