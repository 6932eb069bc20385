// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::extraction::{GradeCategory, GradeClassification, Warning};
use crate::domain::services::warning_severity;

/// 规则求值上下文
///
/// `token` 与 `others` 均已转为小写
pub struct RuleContext<'a> {
    pub token: &'a str,
    /// 同一设备记录上的其他油品标记
    pub others: &'a [String],
}

/// 单条分类规则：命名的 (谓词, 结果) 对
pub struct GradeRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub resolve: fn(&RuleContext<'_>) -> (GradeCategory, bool),
}

fn is_regular(t: &str) -> bool {
    t.contains("regular")
}

fn is_diesel(t: &str) -> bool {
    t.contains("diesel")
}

fn is_ethanol_free(t: &str) -> bool {
    t.contains("ethanol-free") || t.contains("e-0") || t.contains("non-ethanol")
}

fn is_premium(t: &str) -> bool {
    t.contains("premium") && !t.contains("super premium")
}

fn is_super(t: &str) -> bool {
    t.contains("super")
}

fn is_ultra(t: &str) -> bool {
    t.contains("ultra") && !t.contains("ultra low")
}

fn is_blend(t: &str) -> bool {
    t.contains("plus") || t.contains("midgrade")
}

fn is_e85(t: &str) -> bool {
    t.contains("e-85") || t.contains("e85")
}

fn is_kerosene(t: &str) -> bool {
    t.contains("kerosene")
}

fn gas_filtered(_: &RuleContext<'_>) -> (GradeCategory, bool) {
    (GradeCategory::Gas, true)
}

fn diesel_filtered(_: &RuleContext<'_>) -> (GradeCategory, bool) {
    (GradeCategory::Diesel, true)
}

fn gas_blend(_: &RuleContext<'_>) -> (GradeCategory, bool) {
    (GradeCategory::Gas, false)
}

/// Premium shares its filter with a Super or Ultra grade on the same record.
fn premium(ctx: &RuleContext<'_>) -> (GradeCategory, bool) {
    let shares_filter = ctx.others.iter().any(|o| is_super(o) || is_ultra(o));
    (GradeCategory::Gas, !shares_filter)
}

/// 有序规则表，首个命中的规则生效
pub const GRADE_RULES: &[GradeRule] = &[
    GradeRule { name: "regular", matches: is_regular, resolve: gas_filtered },
    GradeRule { name: "diesel", matches: is_diesel, resolve: diesel_filtered },
    GradeRule { name: "ethanol_free", matches: is_ethanol_free, resolve: gas_filtered },
    GradeRule { name: "premium", matches: is_premium, resolve: premium },
    GradeRule { name: "super", matches: is_super, resolve: gas_filtered },
    GradeRule { name: "ultra", matches: is_ultra, resolve: gas_filtered },
    GradeRule { name: "blend", matches: is_blend, resolve: gas_blend },
    GradeRule { name: "e85", matches: is_e85, resolve: gas_filtered },
    GradeRule { name: "kerosene", matches: is_kerosene, resolve: diesel_filtered },
];

/// 对单个标记应用规则表
///
/// # 参数
///
/// * `token` - 原始油品标记
/// * `others` - 同一记录上的其他标记（小写）
///
/// # 返回值
///
/// 分类结果；未命中任何规则时为 `UNKNOWN` 并附带人工核对警告
pub fn classify_token(token: &str, others: &[String]) -> (GradeClassification, Option<Warning>) {
    let trimmed = token.trim();
    let lowered = trimmed.to_lowercase();
    let ctx = RuleContext { token: &lowered, others };

    for rule in GRADE_RULES {
        if (rule.matches)(ctx.token) {
            let (category, filter_needed) = (rule.resolve)(&ctx);
            return (
                GradeClassification {
                    token: trimmed.to_string(),
                    category,
                    filter_needed,
                    reason: rule.name.to_string(),
                },
                None,
            );
        }
    }

    let warning = warning_severity::warning(
        format!("Unknown grade '{}' requires manual verification", trimmed),
        vec![trimmed.to_string()],
    );
    (
        GradeClassification {
            token: trimmed.to_string(),
            category: GradeCategory::Unknown,
            filter_needed: false,
            reason: "unrecognized".to_string(),
        },
        Some(warning),
    )
}

/// 对一条设备记录上的全部油品标记分类
///
/// 空白标记被忽略。Premium、Super、Ultra 同时出现时额外产生复杂配置警告。
pub fn classify_grades<S: AsRef<str>>(tokens: &[S]) -> (Vec<GradeClassification>, Vec<Warning>) {
    let cleaned: Vec<&str> = tokens
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect();
    let lowered: Vec<String> = cleaned.iter().map(|t| t.to_lowercase()).collect();

    let mut classifications = Vec::with_capacity(cleaned.len());
    let mut warnings = Vec::new();

    for (idx, token) in cleaned.iter().enumerate() {
        let others: Vec<String> = lowered
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, o)| o.clone())
            .collect();
        let (classification, warning) = classify_token(token, &others);
        classifications.push(classification);
        if let Some(w) = warning {
            warnings.push(w);
        }
    }

    let has_premium = lowered.iter().any(|t| is_premium(t));
    let has_super = lowered.iter().any(|t| is_super(t));
    let has_ultra = lowered.iter().any(|t| is_ultra(t));
    if has_premium && has_super && has_ultra {
        let involved: Vec<String> = cleaned
            .iter()
            .zip(lowered.iter())
            .filter(|(_, l)| is_premium(l) || is_super(l) || is_ultra(l))
            .map(|(t, _)| t.to_string())
            .collect();
        warnings.push(warning_severity::warning(
            "Complex configuration: Premium, Super and Ultra on one record; review filter assignment",
            involved,
        ));
    }

    (classifications, warnings)
}
