// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务，这些服务封装了复杂的
/// 业务规则和领域逻辑。
///
/// 包含的服务：
/// - 凭证保管库接口（credential_vault）：按用户取出登录凭证
/// - 提取服务（extraction_service）：从设备面板提取并规范化油品数据
/// - 油品规则（grade_rules）：有序的油品分类规则表
/// - 警告评分（warning_severity）：按关键字为警告打分
pub mod credential_vault;
pub mod extraction_service;
pub mod grade_rules;
pub mod warning_severity;
