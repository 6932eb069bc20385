// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 浏览器引擎模块
///
/// - 驱动接口（traits）：自动化引擎使用的窄驱动接口
/// - 就绪检测（readiness）：轮询页面直到条件满足
/// - Chromium 驱动（chromium_driver）：基于 chromiumoxide 的生产实现
/// - 会话（session）：登录并交付独占的驱动会话
pub mod chromium_driver;
pub mod readiness;
pub mod session;
pub mod traits;
