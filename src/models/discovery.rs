//! 发现请求与结果模型

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;
use crate::models::requirement::{merge_requirements, Requirement};
use crate::models::source::{dedup_sources, SourceInfo};

/// 级联中的一层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Cache,
    Knowledge,
    Search,
    Scrape,
    Ml,
}

impl LayerKind {
    /// 默认级联顺序
    pub const DEFAULT_ORDER: [LayerKind; 5] = [
        LayerKind::Cache,
        LayerKind::Knowledge,
        LayerKind::Search,
        LayerKind::Scrape,
        LayerKind::Ml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Cache => "cache",
            LayerKind::Knowledge => "knowledge",
            LayerKind::Search => "search",
            LayerKind::Scrape => "scrape",
            LayerKind::Ml => "ml",
        }
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cache" => Ok(LayerKind::Cache),
            "knowledge" | "knowledge-base" | "kb" => Ok(LayerKind::Knowledge),
            "search" => Ok(LayerKind::Search),
            "scrape" | "scraping" => Ok(LayerKind::Scrape),
            "ml" | "inference" => Ok(LayerKind::Ml),
            other => Err(DiscoveryError::InvalidRequest {
                reason: format!("未知的层级: {}", other),
            }),
        }
    }
}

/// 请求上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// 一次发现请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    pub exam_name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<DiscoveryContext>,
    #[serde(default = "default_fallback_levels")]
    pub fallback_levels: Vec<LayerKind>,
}

fn default_fallback_levels() -> Vec<LayerKind> {
    LayerKind::DEFAULT_ORDER.to_vec()
}

impl DiscoveryRequest {
    pub fn new(exam_name: impl Into<String>) -> Self {
        let exam_name = exam_name.into();
        Self {
            query: exam_name.clone(),
            exam_name,
            context: None,
            fallback_levels: default_fallback_levels(),
        }
    }

    pub fn with_levels(mut self, levels: impl Into<Vec<LayerKind>>) -> Self {
        self.fallback_levels = levels.into();
        self
    }

    pub fn with_context(mut self, context: DiscoveryContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// 考试名不能为空
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.exam_name.trim().is_empty() {
            return Err(DiscoveryError::InvalidRequest {
                reason: "考试名称不能为空".to_string(),
            });
        }
        Ok(())
    }

    /// 缓存键 / examId
    pub fn exam_key(&self) -> String {
        normalize_key(&self.exam_name)
    }
}

/// 结果元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryMetadata {
    pub discovered_at: DateTime<Utc>,
    /// 产出最终结果的层
    pub method: LayerKind,
    pub reliability: f64,
    pub needs_verification: bool,
}

/// 发现结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub exam_id: String,
    pub exam_name: String,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub sources: Vec<SourceInfo>,
    pub confidence: f64,
    #[serde(default)]
    pub validation_score: f64,
    #[serde(default)]
    pub discovery_path: Vec<LayerKind>,
    pub metadata: DiscoveryMetadata,
}

impl DiscoveryResult {
    pub fn new(exam_name: impl Into<String>, method: LayerKind) -> Self {
        let exam_name = exam_name.into();
        Self {
            exam_id: normalize_key(&exam_name),
            exam_name,
            requirements: Vec::new(),
            sources: Vec::new(),
            confidence: 0.0,
            validation_score: 0.0,
            discovery_path: Vec::new(),
            metadata: DiscoveryMetadata {
                discovered_at: Utc::now(),
                method,
                reliability: 0.0,
                needs_verification: true,
            },
        }
    }

    /// 设置要求列表（按 id 合并）
    pub fn with_requirements<I>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = Requirement>,
    {
        self.requirements = merge_requirements(requirements);
        self
    }

    pub fn with_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = SourceInfo>,
    {
        self.sources = dedup_sources(sources);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// 重新按 id 合并要求，保证 id 唯一
    pub fn dedup_requirements(&mut self) {
        let requirements = std::mem::take(&mut self.requirements);
        self.requirements = merge_requirements(requirements);
    }

    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }
}

/// 键规范化：小写，非字母数字替换为 '-'，合并连续 '-'，去掉首尾 '-'
pub fn normalize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_hyphen = true;
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            key.push(c);
            last_hyphen = false;
        } else if !last_hyphen {
            key.push('-');
            last_hyphen = true;
        }
    }
    while key.ends_with('-') {
        key.pop();
    }
    key
}
