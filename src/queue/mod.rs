// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供调度守护进程，周期性派发到期的调度运行
pub mod scheduler;
