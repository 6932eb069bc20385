// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 油品大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GradeCategory {
    Gas,
    Diesel,
    Unknown,
}

/// 单个油品标记的分类结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeClassification {
    /// 原始标记（已去除首尾空白）
    pub token: String,
    pub category: GradeCategory,
    /// 是否需要更换过滤器
    pub filter_needed: bool,
    /// 命中的规则名称
    pub reason: String,
}

/// 需要人工关注的警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// 严重程度 1-10
    pub severity: u8,
    pub message: String,
    /// 触发警告的原始标记
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
}

/// 抽取结果的来源（回退阶梯中的哪一级）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// 页面中的结构化油品元素
    StructuredGrades,
    /// "Grade(s): ..." 文本块
    GradeBlock,
    /// 由校准服务数量估算
    ServiceEstimate,
    /// 未找到任何油品数据
    Missing,
}

/// 单条设备记录的抽取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// 原始片段（去标签后的文本）
    pub raw: String,
    pub grades: Vec<GradeClassification>,
    pub gas_filters: u32,
    pub diesel_filters: u32,
    pub warnings: Vec<Warning>,
    pub source: ExtractionSource,
}

impl ExtractedEntity {
    /// 按分类结果汇总过滤器数量
    pub fn from_classifications(
        raw: String,
        grades: Vec<GradeClassification>,
        warnings: Vec<Warning>,
        source: ExtractionSource,
    ) -> Self {
        let (gas_filters, diesel_filters) = count_filters(&grades);
        Self {
            raw,
            grades,
            gas_filters,
            diesel_filters,
            warnings,
            source,
        }
    }
}

/// 统计需要过滤器的油品数量，返回 (gas, diesel)
pub fn count_filters(grades: &[GradeClassification]) -> (u32, u32) {
    grades
        .iter()
        .filter(|g| g.filter_needed)
        .fold((0, 0), |(gas, diesel), g| match g.category {
            GradeCategory::Gas => (gas.saturating_add(1), diesel),
            GradeCategory::Diesel => (gas, diesel.saturating_add(1)),
            GradeCategory::Unknown => (gas, diesel),
        })
}

/// 工作单元页面的完整抽取结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitExtraction {
    pub entities: Vec<ExtractedEntity>,
    pub gas_filters: u32,
    pub diesel_filters: u32,
}

impl UnitExtraction {
    pub fn from_entities(entities: Vec<ExtractedEntity>) -> Self {
        let gas_filters = entities
            .iter()
            .map(|e| e.gas_filters)
            .fold(0u32, u32::saturating_add);
        let diesel_filters = entities
            .iter()
            .map(|e| e.diesel_filters)
            .fold(0u32, u32::saturating_add);
        Self {
            entities,
            gas_filters,
            diesel_filters,
        }
    }

    /// 所有记录的警告，保持记录顺序
    pub fn warnings(&self) -> Vec<Warning> {
        self.entities
            .iter()
            .flat_map(|e| e.warnings.iter().cloned())
            .collect()
    }
}
