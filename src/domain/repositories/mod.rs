// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 工作单元仓库（work_unit_repository）：工作单元的状态与抽取结果
/// - 批次仓库（batch_repository）：批处理作业及其检查点
/// - 调度仓库（schedule_repository）：周期调度与失败计数
/// - 历史仓库（history_repository）：只追加的运行历史
pub mod batch_repository;
pub mod history_repository;
pub mod schedule_repository;
pub mod work_unit_repository;
