// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::models::extraction::Warning;
use crate::domain::models::history::RunTrigger;
use crate::domain::models::status::{SnapshotStatus, StatusSnapshot};
use crate::domain::models::work_unit::{UnitStatus, WorkUnit};

/// 运行标识
///
/// 高32位为代数，低32位为槽位下标；槽位复用后旧ID不再命中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    fn new(index: u32, generation: u32) -> Self {
        RunId((u64::from(generation) << 32) | u64::from(index))
    }

    fn index(&self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(RunId).map_err(|_| ())
    }
}

/// 单元在运行中的实时进度
#[derive(Debug, Clone)]
struct UnitProgress {
    status: UnitStatus,
    progress: u8,
    message: String,
    error: Option<String>,
    warnings: Vec<Warning>,
}

impl UnitProgress {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.into(),
            progress: f32::from(self.progress),
            message: self.message.clone(),
            error: self.error.clone(),
            warnings: (!self.warnings.is_empty()).then(|| self.warnings.clone()),
        }
    }
}

#[derive(Debug)]
struct RunState {
    status: SnapshotStatus,
    message: String,
    error: Option<String>,
    batch_id: Option<Uuid>,
    total_units: usize,
    completed_units: usize,
    failed_units: usize,
    units: HashMap<Uuid, UnitProgress>,
    /// 单元首次出现的顺序，即批次处理顺序
    unit_order: Vec<Uuid>,
    finished_at: Option<Instant>,
}

/// 单次运行的上下文
///
/// 保存运行的实时状态以及协作式的暂停、取消标记，
/// 由运行任务写入，由状态查询读取
#[derive(Debug)]
pub struct RunContext {
    id: RunId,
    owner_id: String,
    trigger: RunTrigger,
    cancel_requested: AtomicBool,
    pause_requested: AtomicBool,
    state: RwLock<RunState>,
}

impl RunContext {
    fn new(id: RunId, owner_id: String, trigger: RunTrigger) -> Self {
        Self {
            id,
            owner_id,
            trigger,
            cancel_requested: AtomicBool::new(false),
            pause_requested: AtomicBool::new(false),
            state: RwLock::new(RunState {
                status: SnapshotStatus::Pending,
                message: "queued".to_string(),
                error: None,
                batch_id: None,
                total_units: 0,
                completed_units: 0,
                failed_units: 0,
                units: HashMap::new(),
                unit_order: Vec::new(),
                finished_at: None,
            }),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn trigger(&self) -> RunTrigger {
        self.trigger
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    pub fn batch_id(&self) -> Option<Uuid> {
        self.state.read().batch_id
    }

    /// 运行是否已进入终止或暂停状态
    pub fn is_finished(&self) -> bool {
        self.state.read().finished_at.is_some()
    }

    /// 更新运行级状态和描述
    pub fn set_phase(&self, status: SnapshotStatus, message: impl Into<String>) {
        let mut state = self.state.write();
        state.status = status;
        state.message = message.into();
    }

    /// 绑定批次并初始化进度计数
    pub fn attach_batch(&self, batch_id: Uuid, total_units: usize, completed_units: usize) {
        let mut state = self.state.write();
        state.batch_id = Some(batch_id);
        state.total_units = total_units;
        state.completed_units = completed_units;
        state.failed_units = 0;
    }

    /// 记录单元步骤进度
    pub fn record_unit_step(&self, unit_id: Uuid, progress: u8, message: &str) {
        let mut state = self.state.write();
        state.message = message.to_string();
        if !state.units.contains_key(&unit_id) {
            state.unit_order.push(unit_id);
        }
        let entry = state.units.entry(unit_id).or_insert_with(|| UnitProgress {
            status: UnitStatus::Running,
            progress: 0,
            message: String::new(),
            error: None,
            warnings: Vec::new(),
        });
        entry.status = UnitStatus::Running;
        entry.progress = progress;
        entry.message = message.to_string();
    }

    /// 记录单元进入终止状态
    pub fn record_unit_finished(&self, unit: &WorkUnit) {
        let mut state = self.state.write();
        match unit.status {
            UnitStatus::Completed => state.completed_units += 1,
            UnitStatus::Failed => state.failed_units += 1,
            _ => {}
        }
        let previous = state.units.insert(
            unit.id,
            UnitProgress {
                status: unit.status,
                progress: unit.progress,
                message: unit.message.clone().unwrap_or_default(),
                error: unit.error_message.clone(),
                warnings: unit.warnings.clone(),
            },
        );
        if previous.is_none() {
            state.unit_order.push(unit.id);
        }
    }

    /// 运行结束（终止或暂停）
    pub fn finish(&self, status: SnapshotStatus, message: impl Into<String>, error: Option<String>) {
        let mut state = self.state.write();
        state.status = status;
        state.message = message.into();
        state.error = error;
        state.finished_at = Some(Instant::now());
    }

    pub fn completed_units(&self) -> usize {
        self.state.read().completed_units
    }

    /// 运行级快照，进度为已完成单元数占总数的百分比
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.read();
        let progress = if state.total_units == 0 {
            if state.status == SnapshotStatus::Completed { 100.0 } else { 0.0 }
        } else {
            state.completed_units as f32 * 100.0 / state.total_units as f32
        };
        let warnings: Vec<Warning> = state
            .unit_order
            .iter()
            .filter_map(|id| state.units.get(id))
            .flat_map(|u| u.warnings.iter().cloned())
            .collect();

        StatusSnapshot {
            status: state.status,
            progress,
            message: state.message.clone(),
            error: state.error.clone(),
            warnings: (!warnings.is_empty()).then_some(warnings),
        }
    }

    /// 单元级快照；单元不属于本次运行时返回 `None`
    pub fn unit_snapshot(&self, unit_id: Uuid) -> Option<StatusSnapshot> {
        self.state.read().units.get(&unit_id).map(UnitProgress::snapshot)
    }

    fn finished_longer_than(&self, retention: Duration, now: Instant) -> bool {
        self.state
            .read()
            .finished_at
            .is_some_and(|at| now.duration_since(at) >= retention)
    }
}

struct Slot {
    generation: u32,
    context: Option<Arc<RunContext>>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// 运行注册表
///
/// 以代数竞技场保存所有运行上下文，查询接口只读
#[derive(Default)]
pub struct RunRegistry {
    arena: RwLock<Arena>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新运行
    ///
    /// # 参数
    ///
    /// * `owner_id` - 用户ID
    /// * `trigger` - 触发方式
    ///
    /// # 返回值
    ///
    /// 新运行的上下文
    pub fn register(&self, owner_id: &str, trigger: RunTrigger) -> Arc<RunContext> {
        let mut arena = self.arena.write();
        let (index, generation) = match arena.free.pop() {
            Some(index) => (index, arena.slots[index as usize].generation),
            None => {
                arena.slots.push(Slot {
                    generation: 0,
                    context: None,
                });
                ((arena.slots.len() - 1) as u32, 0)
            }
        };

        let id = RunId::new(index, generation);
        let context = Arc::new(RunContext::new(id, owner_id.to_string(), trigger));
        arena.slots[index as usize].context = Some(Arc::clone(&context));
        context
    }

    pub fn get(&self, id: RunId) -> Option<Arc<RunContext>> {
        let arena = self.arena.read();
        arena
            .slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.context.clone())
    }

    /// 运行快照，未知或已移除的运行返回 `not_found`
    pub fn snapshot(&self, id: RunId) -> StatusSnapshot {
        self.get(id)
            .map(|ctx| ctx.snapshot())
            .unwrap_or_else(StatusSnapshot::not_found)
    }

    /// 在仍注册的运行中查找单元快照
    pub fn unit_snapshot(&self, unit_id: Uuid) -> Option<StatusSnapshot> {
        let arena = self.arena.read();
        arena
            .slots
            .iter()
            .filter_map(|slot| slot.context.as_ref())
            .find_map(|ctx| ctx.unit_snapshot(unit_id))
    }

    /// 移除运行，槽位代数加一后回收
    fn remove(&self, id: RunId) -> bool {
        let mut arena = self.arena.write();
        let Some(slot) = arena.slots.get_mut(id.index()) else {
            return false;
        };
        if slot.generation != id.generation() || slot.context.is_none() {
            return false;
        }
        slot.context = None;
        slot.generation = slot.generation.wrapping_add(1);
        arena.free.push(id.index() as u32);
        true
    }

    /// 清理结束超过保留期的运行
    ///
    /// # 返回值
    ///
    /// 被清理的运行数
    pub fn prune_finished(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<RunId> = {
            let arena = self.arena.read();
            arena
                .slots
                .iter()
                .filter_map(|slot| slot.context.as_ref())
                .filter(|ctx| ctx.finished_longer_than(retention, now))
                .map(|ctx| ctx.id)
                .collect()
        };
        expired.into_iter().filter(|id| self.remove(*id)).count()
    }

    /// 当前注册的运行数
    pub fn len(&self) -> usize {
        self.arena
            .read()
            .slots
            .iter()
            .filter(|slot| slot.context.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
