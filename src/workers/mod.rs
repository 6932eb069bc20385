// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供单元自动化、批次编排和工单发现
pub mod batch_orchestrator;
pub mod discovery;
pub mod unit_engine;
