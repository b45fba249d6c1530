//! 知识库 - 服务层
//!
//! 职责：
//! - 按考试名查找人工整理的文档要求
//! - TOML 条目（`knowledge/*.toml`）优先
//! - 其次按考试族（银行 / SSC / 入学考试 / 公务员）给出典型要求模板
//!
//! 通用考试不返回结果，交给后续的搜索和抓取层。

use anyhow::Result;
use async_trait::async_trait;
use phf::phf_map;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{
    load_knowledge_entries, normalize_key, DiscoveryRequest, DiscoveryResult, KnowledgeEntry, LayerKind,
    Requirement, RequirementKind, SourceInfo,
};

/// 模板结果的置信度，低于默认阈值，后续层仍会继续验证
const FAMILY_TEMPLATE_CONFIDENCE: f64 = 0.7;

/// 知识库接口
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// 查找考试；没有可用知识时返回 `None`
    async fn find_exam(&self, request: &DiscoveryRequest) -> Result<Option<DiscoveryResult>>;
}

/// 考试族，顺序即匹配优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExamFamily {
    Banking,
    Ssc,
    Entrance,
    CivilServices,
}

/// 考试名中的单词 → 考试族
static FAMILY_KEYWORDS: phf::Map<&'static str, ExamFamily> = phf_map! {
    "ibps" => ExamFamily::Banking,
    "bank" => ExamFamily::Banking,
    "banking" => ExamFamily::Banking,
    "sbi" => ExamFamily::Banking,
    "rbi" => ExamFamily::Banking,
    "ssc" => ExamFamily::Ssc,
    "neet" => ExamFamily::Entrance,
    "jee" => ExamFamily::Entrance,
    "gate" => ExamFamily::Entrance,
    "upsc" => ExamFamily::CivilServices,
    "civil" => ExamFamily::CivilServices,
    "ias" => ExamFamily::CivilServices,
    "ips" => ExamFamily::CivilServices,
};

impl ExamFamily {
    /// 识别考试族；按单词匹配，多个族同时命中时取优先级最高的
    pub fn detect(exam_name: &str) -> Option<Self> {
        normalize_key(exam_name)
            .split('-')
            .filter_map(|word| FAMILY_KEYWORDS.get(word).copied())
            .min()
    }

    /// 该考试族的典型文档要求
    pub fn requirements(self) -> Vec<Requirement> {
        match self {
            ExamFamily::Banking => vec![
                photo(&["jpg", "jpeg"], "20KB", "50KB")
                    .with_dimensions(200, 230)
                    .with_description("Recent colour passport size photograph, light background, face clearly visible"),
                signature(&["jpg", "jpeg"], "10KB", "20KB")
                    .with_dimensions(140, 60)
                    .with_description("Signature in black ink on white paper"),
                Requirement::new("thumb_impression", "Thumb Impression", RequirementKind::Media)
                    .with_formats(["jpg", "jpeg"])
                    .with_size(Some("10KB"), Some("20KB"))
                    .with_dimensions(240, 240)
                    .with_description("Left thumb impression on white paper"),
            ],
            ExamFamily::Ssc => vec![
                photo(&["jpeg"], "4KB", "40KB")
                    .with_description("Recent colour passport size photograph (3.5 cm x 4.5 cm), light background"),
                signature(&["jpeg"], "1KB", "12KB")
                    .with_description("Signature in black ink (4 cm x 2 cm)"),
            ],
            ExamFamily::Entrance => vec![
                photo(&["jpg", "jpeg"], "10KB", "200KB")
                    .with_description("Recent passport size photograph, white background, no sunglasses or cap"),
                signature(&["jpg", "jpeg"], "4KB", "30KB")
                    .with_description("Signature in blue or black ink on white paper"),
            ],
            ExamFamily::CivilServices => vec![
                photo(&["jpg", "jpeg"], "3KB", "50KB")
                    .with_description("Recent photograph (5 cm x 7 cm), white background"),
                signature(&["jpg", "jpeg"], "1KB", "10KB")
                    .with_description("Signature in black ink on white paper (4 cm x 2 cm)"),
            ],
        }
        .into_iter()
        .map(|r| r.with_confidence(FAMILY_TEMPLATE_CONFIDENCE))
        .collect()
    }
}

fn photo(formats: &[&str], min: &str, max: &str) -> Requirement {
    Requirement::new("photo", "Photograph", RequirementKind::Media)
        .with_formats(formats.iter().copied())
        .with_size(Some(min), Some(max))
}

fn signature(formats: &[&str], min: &str, max: &str) -> Requirement {
    Requirement::new("signature", "Signature", RequirementKind::Media)
        .with_formats(formats.iter().copied())
        .with_size(Some(min), Some(max))
}

/// 默认知识库：TOML 条目 + 考试族模板
#[derive(Debug, Clone, Default)]
pub struct CuratedKnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl CuratedKnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// 从文件夹加载 TOML 条目；文件夹不存在时只使用考试族模板
    pub async fn load(folder: &str) -> Result<Self> {
        if !Path::new(folder).exists() {
            info!("知识库文件夹 {} 不存在，仅使用内置模板", folder);
            return Ok(Self::default());
        }

        let entries = load_knowledge_entries(folder).await?;
        info!("📚 已加载 {} 条知识库条目", entries.len());
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 匹配的条目中取名称最具体（规范化后最长）的一条
    fn find_entry(&self, exam_key: &str) -> Option<&KnowledgeEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(exam_key))
            .max_by_key(|entry| normalize_key(&entry.exam).len())
    }
}

#[async_trait]
impl KnowledgeBase for CuratedKnowledgeBase {
    async fn find_exam(&self, request: &DiscoveryRequest) -> Result<Option<DiscoveryResult>> {
        let exam_key = request.exam_key();

        if let Some(entry) = self.find_entry(&exam_key) {
            debug!("知识库命中条目: {}", entry.exam);
            let sources = entry
                .source_url
                .iter()
                .map(|url| SourceInfo::new(url.clone(), format!("{} (curated)", entry.exam), ""));
            return Ok(Some(
                DiscoveryResult::new(request.exam_name.clone(), LayerKind::Knowledge)
                    .with_requirements(entry.requirements())
                    .with_sources(sources)
                    .with_confidence(entry.confidence),
            ));
        }

        let Some(family) = ExamFamily::detect(&request.exam_name) else {
            debug!("知识库中没有 {} 的信息", request.exam_name);
            return Ok(None);
        };

        debug!("{} 使用考试族模板: {:?}", request.exam_name, family);
        Ok(Some(
            DiscoveryResult::new(request.exam_name.clone(), LayerKind::Knowledge)
                .with_requirements(family.requirements())
                .with_confidence(FAMILY_TEMPLATE_CONFIDENCE),
        ))
    }
}
