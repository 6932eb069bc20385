// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::extraction::Warning;

/// 未命中任何关键字时的默认严重程度
pub const DEFAULT_SEVERITY: u8 = 5;

/// 有序关键字表，首个命中的级别生效
const SEVERITY_TABLE: &[(u8, &[&str])] = &[
    // critical
    (9, &["missing", "failed", "contamination"]),
    // conflict
    (8, &["unknown grade", "complex configuration", "ambiguous", "conflict"]),
    // review
    (6, &["inconsistent", "verify", "unusual"]),
    // informational
    (3, &["note", "reminder"]),
];

/// 根据警告文本计算严重程度（1-10）
pub fn score(message: &str) -> u8 {
    let lowered = message.to_lowercase();
    SEVERITY_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(severity, _)| *severity)
        .unwrap_or(DEFAULT_SEVERITY)
}

/// 构造一条带评分的警告
pub fn warning(message: impl Into<String>, tokens: Vec<String>) -> Warning {
    let message = message.into();
    Warning {
        severity: score(&message),
        message,
        tokens,
    }
}
