// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 运行、单元、调度与历史的状态接口
pub mod history_handler;
pub mod run_handler;
pub mod schedule_handler;
pub mod unit_handler;
