use crate::models::requirement::{Requirement, RequirementKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 知识库 TOML 文件中的一场考试
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeEntry {
    /// 考试名称
    pub exam: String,
    /// 别名（匹配时与考试名称同等对待）
    #[serde(default)]
    pub aliases: Vec<String>,
    /// 官方网址
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default = "default_entry_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub documents: Vec<KnowledgeDocument>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

fn default_entry_confidence() -> f64 {
    0.9
}

/// 知识库中的单个文档要求
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_document_kind")]
    pub kind: RequirementKind,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub min_size: Option<String>,
    #[serde(default)]
    pub max_size: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ratio: Option<String>,
    #[serde(default)]
    pub description: String,
}

fn default_document_kind() -> RequirementKind {
    RequirementKind::Document
}

fn default_true() -> bool {
    true
}

impl KnowledgeEntry {
    /// 名称或别名是否与给定考试匹配（规范化后比较）
    pub fn matches(&self, exam_key: &str) -> bool {
        std::iter::once(&self.exam)
            .chain(self.aliases.iter())
            .map(|name| crate::models::normalize_key(name))
            .any(|key| !key.is_empty() && (exam_key == key || exam_key.starts_with(&format!("{}-", key))))
    }

    /// 转换为要求列表
    pub fn requirements(&self) -> Vec<Requirement> {
        self.documents
            .iter()
            .map(|doc| {
                let mut requirement = Requirement::new(
                    doc.id.clone(),
                    doc.name.clone().unwrap_or_else(|| doc.id.replace('_', " ")),
                    doc.kind,
                )
                .with_formats(&doc.formats)
                .with_size(doc.min_size.as_deref(), doc.max_size.as_deref())
                .with_description(doc.description.clone())
                .with_confidence(self.confidence);
                requirement.required = doc.required;
                requirement.dimensions.width = doc.width;
                requirement.dimensions.height = doc.height;
                requirement.dimensions.ratio = doc.ratio.clone();
                requirement
            })
            .collect()
    }
}

/// 从 TOML 文件加载一场考试的知识库条目
pub async fn load_knowledge_entry(toml_file_path: &Path) -> Result<KnowledgeEntry> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut entry: KnowledgeEntry = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    entry.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(entry)
}

/// 从文件夹中加载所有知识库条目，解析失败的文件跳过
pub async fn load_knowledge_entries(folder_path: &str) -> Result<Vec<KnowledgeEntry>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut entries_out = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::debug!(
                "正在加载知识库: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_knowledge_entry(&path).await {
                Ok(knowledge) => {
                    tracing::info!(
                        "成功加载考试 {} ({} 项文档要求)",
                        knowledge.exam,
                        knowledge.documents.len()
                    );
                    entries_out.push(knowledge);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(entries_out)
}
