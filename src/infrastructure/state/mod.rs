// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 运行状态模块
///
/// - 运行注册表（run_registry）：按 `RunId` 保存运行上下文，提供状态快照
/// - 运行互斥（in_flight）：保证每个用户同一时间只有一个运行
pub mod in_flight;
pub mod run_registry;
