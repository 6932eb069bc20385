// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口基于SeaORM的具体实现
pub mod batch_repo_impl;
pub mod history_repo_impl;
pub mod schedule_repo_impl;
pub mod work_unit_repo_impl;
