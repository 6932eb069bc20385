// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，提供对具体技术的抽象和封装。
///
/// 包含的子模块：
/// - 数据库（database）：提供数据库连接和实体映射
/// - 可观测性（observability）：指标收集与导出
/// - 仓库实现（repositories）：提供领域仓库接口的具体实现
/// - 运行状态（state）：运行注册表与按用户的互斥标记
/// - 凭证保管库（vault）：密文封装与凭证存取
///
/// 基础设施层遵循依赖倒置原则，依赖于领域层的抽象接口，
/// 确保领域层保持纯粹的业务逻辑，不受技术实现的影响。
pub mod database;
pub mod observability;
pub mod repositories;
pub mod state;
pub mod vault;
