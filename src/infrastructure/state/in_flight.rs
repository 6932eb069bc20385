// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// 按用户的运行互斥表
///
/// 同一用户同一时间最多只有一个运行（手动或调度）在进行。
/// 获取操作是原子的检查并设置，标记由 [`InFlightGuard`] 持有，
/// guard 被释放（包括任务 panic 时）即清除标记。
#[derive(Clone, Debug, Default)]
pub struct InFlightRegistry {
    owners: Arc<DashMap<String, DateTime<Utc>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试为用户占用运行标记
    ///
    /// # 参数
    ///
    /// * `owner_id` - 用户ID
    ///
    /// # 返回值
    ///
    /// 该用户已有进行中的运行时返回 `None`
    pub fn try_acquire(&self, owner_id: &str) -> Option<InFlightGuard> {
        match self.owners.entry(owner_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Some(InFlightGuard {
                    owners: Arc::clone(&self.owners),
                    owner_id: owner_id.to_string(),
                })
            }
        }
    }

    pub fn is_in_flight(&self, owner_id: &str) -> bool {
        self.owners.contains_key(owner_id)
    }

    /// 当前占用标记的用户数
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// 运行标记的 RAII 持有者
#[derive(Debug)]
pub struct InFlightGuard {
    owners: Arc<DashMap<String, DateTime<Utc>>>,
    owner_id: String,
}

impl InFlightGuard {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owners.remove(&self.owner_id);
    }
}
