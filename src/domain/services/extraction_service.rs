// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::models::extraction::{
    ExtractedEntity, ExtractionSource, UnitExtraction,
};
use crate::domain::models::work_unit::DomainError;
use crate::domain::services::{grade_rules, warning_severity};

static GRADE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bgrades?\s*:\s*([^\n<]+)").expect("grade block pattern")
});

static GRADE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;/|]").expect("grade separator pattern"));

static CALIBRATION_QTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)calibration[^\n<]*?(?:qty|quantity)\s*[:#]?\s*(\d+)|(\d+)\s*x\s*[^\n<]*?calibration",
    )
    .expect("calibration pattern")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// 校准服务估算时每个单位对应的汽油过滤器数量
pub const FILTERS_PER_CALIBRATION: u32 = 2;

/// 校准数量上限，超出的数值按上限估算
pub const MAX_CALIBRATION_QUANTITY: u32 = 50;

/// 提取服务
///
/// 负责从设备面板的 HTML 中提取油品信息并规范化为领域实体。
/// 提取过程不会失败：找不到数据时返回空结果和严重警告。
/// 对同一输入的输出完全确定。
#[derive(Debug, Clone)]
pub struct ExtractionService {
    record_selector: Selector,
    grade_selector: Selector,
}

impl ExtractionService {
    /// 创建提取服务
    ///
    /// # 参数
    ///
    /// * `record_selector` - 设备记录的CSS选择器
    /// * `grade_selector` - 记录内结构化油品元素的CSS选择器
    ///
    /// # 返回值
    ///
    /// 选择器无法解析时返回 `ValidationError`
    pub fn new(record_selector: &str, grade_selector: &str) -> Result<Self, DomainError> {
        Ok(Self {
            record_selector: parse_selector(record_selector)?,
            grade_selector: parse_selector(grade_selector)?,
        })
    }

    /// 提取整个工作单元页面
    ///
    /// 页面中每个匹配记录选择器的元素是一条设备记录；
    /// 没有匹配时整个片段视为一条记录。
    pub fn extract_unit(&self, markup: &str) -> UnitExtraction {
        let fragment = Html::parse_fragment(markup);
        let records: Vec<ElementRef<'_>> = fragment.select(&self.record_selector).collect();

        let entities = if records.is_empty() {
            vec![self.extract_element(fragment.root_element(), markup)]
        } else {
            records
                .into_iter()
                .map(|record| self.extract_element(record, &record.html()))
                .collect()
        };

        UnitExtraction::from_entities(entities)
    }

    fn extract_element(&self, element: ElementRef<'_>, markup: &str) -> ExtractedEntity {
        let raw = normalize_text(&element.text().collect::<Vec<_>>().join(" "));

        // structured grade elements
        let structured: Vec<String> = element
            .select(&self.grade_selector)
            .map(|g| normalize_text(&g.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty())
            .collect();
        if !structured.is_empty() {
            let (grades, warnings) = grade_rules::classify_grades(structured.as_slice());
            return ExtractedEntity::from_classifications(
                raw,
                grades,
                warnings,
                ExtractionSource::StructuredGrades,
            );
        }

        // "Grade(s): ..." blocks
        let block_tokens = grade_block_tokens(markup);
        if !block_tokens.is_empty() {
            let (grades, warnings) = grade_rules::classify_grades(block_tokens.as_slice());
            return ExtractedEntity::from_classifications(
                raw,
                grades,
                warnings,
                ExtractionSource::GradeBlock,
            );
        }

        // calibration service line
        if let Some(qty) = calibration_quantity(markup) {
            let gas_filters = qty.saturating_mul(FILTERS_PER_CALIBRATION);
            let warning = warning_severity::warning(
                format!(
                    "Grades estimated from calibration quantity {}; verify filter counts",
                    qty
                ),
                Vec::new(),
            );
            return ExtractedEntity {
                raw,
                grades: Vec::new(),
                gas_filters,
                diesel_filters: 0,
                warnings: vec![warning],
                source: ExtractionSource::ServiceEstimate,
            };
        }

        ExtractedEntity {
            raw,
            grades: Vec::new(),
            gas_filters: 0,
            diesel_filters: 0,
            warnings: vec![warning_severity::warning(
                "Grade data missing; manual entry required",
                Vec::new(),
            )],
            source: ExtractionSource::Missing,
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DomainError> {
    Selector::parse(selector).map_err(|e| {
        DomainError::ValidationError(format!("invalid selector '{}': {}", selector, e))
    })
}

fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn grade_block_tokens(markup: &str) -> Vec<String> {
    GRADE_BLOCK
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| {
            GRADE_SEPARATOR
                .split(m.as_str())
                .map(normalize_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn calibration_quantity(markup: &str) -> Option<u32> {
    CALIBRATION_QTY
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .find(|qty| *qty > 0)
        .map(|qty| qty.min(u64::from(MAX_CALIBRATION_QUANTITY)) as u32)
}
