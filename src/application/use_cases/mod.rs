// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 运行派发：凭证、会话、发现与批次编排的串联
pub mod dispatch_run;
