// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 凭证保管库模块
///
/// 提供密文封装与基于数据库的保管库实现
pub mod database_vault;
pub mod secret_opener;
