// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 手动触发运行请求DTO
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct TriggerRunRequestDto {
    /// 是否在填写后自动提交，缺省时使用 `automation.manual_submit` 配置
    pub submit: Option<bool>,
}

/// 历史查询参数
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct HistoryQueryDto {
    /// 返回条数（默认 20，最大 500）
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
}

impl HistoryQueryDto {
    pub const DEFAULT_LIMIT: u64 = 20;

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}
