// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 工作单元（work_unit）：一张工单对应的一次自动化目标
/// - 批处理作业（batch_job）：按顺序处理的一组工作单元及其检查点
/// - 调度（schedule）：周期性无人值守运行及失败退避
/// - 运行历史（history）：每次运行尝试的不可变记录
/// - 抽取结果（extraction）：油品分类、过滤器数量与警告
///
/// 这些模型构成了系统的数据基础，定义了业务概念的
/// 结构和行为，是领域驱动设计的核心组成部分。
pub mod batch_job;
pub mod credential;
pub mod extraction;
pub mod history;
pub mod schedule;
pub mod status;
pub mod work_unit;
