// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::work_unit::DomainError;

/// 连续失败多少次后自动禁用调度
pub const FAILURE_THRESHOLD: u32 = 5;

/// 活跃时间窗口
///
/// 半开区间 `[start, end)`，当 `start > end` 时跨越午夜。
/// `start == end` 的窗口为空，创建调度时会被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ActiveHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// 判断本地时间是否落在窗口内
    pub fn contains(&self, local: NaiveTime) -> bool {
        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            // wraps past midnight
            local >= self.start || local < self.end
        }
    }

    /// 窗口是否不包含任何时刻
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 午夜以来的分钟数，用于持久化
    pub fn to_minutes(&self) -> (i32, i32) {
        (minutes_of(self.start), minutes_of(self.end))
    }

    /// 从午夜以来的分钟数恢复窗口，超出 0..1440 的值视为无效
    pub fn from_minutes(start: i32, end: i32) -> Option<Self> {
        Some(Self {
            start: time_from_minutes(start)?,
            end: time_from_minutes(end)?,
        })
    }
}

fn minutes_of(t: NaiveTime) -> i32 {
    (t.hour() * 60 + t.minute()) as i32
}

fn time_from_minutes(minutes: i32) -> Option<NaiveTime> {
    if !(0..24 * 60).contains(&minutes) {
        return None;
    }
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

/// 调度资格判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Disabled,
    NotDue,
    OutsideActiveHours,
    OwnerBusy,
}

/// 调度实体
///
/// 描述一个用户的周期性无人值守运行，带活跃时间窗口和失败退避。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub owner_id: String,
    /// 运行间隔（分钟）
    pub interval_minutes: u32,
    /// 可选的活跃时间窗口，按 `utc_offset_minutes` 所在时区的本地时间判定
    pub active_hours: Option<ActiveHours>,
    /// 固定UTC偏移（分钟）
    pub utc_offset_minutes: i32,
    pub enabled: bool,
    pub consecutive_failures: u32,
    pub last_run: Option<DateTime<FixedOffset>>,
    pub next_run: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Schedule {
    /// 创建新调度
    ///
    /// # 参数
    ///
    /// * `owner_id` - 所属用户
    /// * `interval_minutes` - 运行间隔，必须大于0
    /// * `active_hours` - 活跃窗口
    /// * `utc_offset_minutes` - 判定活跃窗口时使用的UTC偏移
    ///
    /// # 返回值
    ///
    /// 新调度立即到期（`next_run = now`）
    pub fn new(
        owner_id: impl Into<String>,
        interval_minutes: u32,
        active_hours: Option<ActiveHours>,
        utc_offset_minutes: i32,
    ) -> Result<Self, DomainError> {
        if interval_minutes == 0 {
            return Err(DomainError::ValidationError(
                "interval_minutes must be positive".to_string(),
            ));
        }
        if active_hours.is_some_and(|window| window.is_empty()) {
            return Err(DomainError::ValidationError(
                "active window start and end must differ".to_string(),
            ));
        }
        if FixedOffset::east_opt(utc_offset_minutes * 60).is_none() {
            return Err(DomainError::ValidationError(format!(
                "utc offset {} minutes is out of range",
                utc_offset_minutes
            )));
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            interval_minutes,
            active_hours,
            utc_offset_minutes,
            enabled: true,
            consecutive_failures: 0,
            last_run: None,
            next_run: now,
            created_at: now,
            updated_at: now,
        })
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// 按调度的时区判断是否处于活跃窗口；未配置窗口时始终为真
    pub fn within_active_hours(&self, now: DateTime<Utc>) -> bool {
        match self.active_hours {
            Some(window) => window.contains(now.with_timezone(&self.offset()).time()),
            None => true,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_run.with_timezone(&Utc)
    }

    /// 计算调度资格
    ///
    /// 资格条件：已启用、`now >= next_run`、处于活跃窗口，且该用户没有进行中的运行
    pub fn eligibility(&self, now: DateTime<Utc>, owner_busy: bool) -> Eligibility {
        if !self.enabled {
            Eligibility::Disabled
        } else if !self.is_due(now) {
            Eligibility::NotDue
        } else if !self.within_active_hours(now) {
            Eligibility::OutsideActiveHours
        } else if owner_busy {
            Eligibility::OwnerBusy
        } else {
            Eligibility::Eligible
        }
    }

    /// 标记已派发
    ///
    /// `next_run` 从当前时间重新计算，错过的周期不会补跑
    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) {
        let now_fixed: DateTime<FixedOffset> = now.into();
        self.last_run = Some(now_fixed);
        self.next_run = now_fixed + Duration::minutes(i64::from(self.interval_minutes));
        self.updated_at = now_fixed;
    }

    /// 记录一次成功运行，清零连续失败计数
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.updated_at = Utc::now().into();
    }

    /// 记录一次失败运行
    ///
    /// # 返回值
    ///
    /// 本次失败导致调度被自动禁用时返回 `true`
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.updated_at = Utc::now().into();
        if self.enabled && self.consecutive_failures >= FAILURE_THRESHOLD {
            self.enabled = false;
            return true;
        }
        false
    }

    /// 重新启用：清零失败计数并立即到期
    pub fn enable(&mut self, now: DateTime<Utc>) {
        let now_fixed: DateTime<FixedOffset> = now.into();
        self.enabled = true;
        self.consecutive_failures = 0;
        self.next_run = now_fixed;
        self.updated_at = now_fixed;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.updated_at = Utc::now().into();
    }
}
