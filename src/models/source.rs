//! 信息来源模型
//!
//! 搜索结果和抓取页面都以 `SourceInfo` 的形式记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// 来源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceClassification {
    Official,
    News,
    Forum,
    Guide,
}

impl SourceClassification {
    pub fn is_official(self) -> bool {
        self == SourceClassification::Official
    }
}

/// 政府/官方域名后缀
const OFFICIAL_DOMAIN_SUFFIXES: &[&str] = &[
    ".gov.in", ".nic.in", ".ac.in", ".edu.in", ".res.in", ".gov", ".edu",
];

const NEWS_KEYWORDS: &[&str] = &[
    "news", "times", "express", "today", "ndtv", "hindustan", "jagran", "livemint",
];

const FORUM_KEYWORDS: &[&str] = &["forum", "quora", "reddit", "community", "discuss"];

/// 单个信息来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub classification: SourceClassification,
    pub reliability: f64,
    pub last_accessed: DateTime<Utc>,
    /// 内容指纹（SHA-256），用于变更检测和去重
    pub fingerprint: String,
}

impl SourceInfo {
    /// 创建来源，自动分类并计算可信度和指纹
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        let url = url.into();
        let title = title.into();
        let snippet = snippet.into();
        let (classification, reliability) = classify_source(&url, &title, &snippet);
        let fingerprint = fingerprint(&url, &title, &snippet);
        Self {
            url,
            title,
            snippet,
            classification,
            reliability,
            last_accessed: Utc::now(),
            fingerprint,
        }
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability.clamp(0.0, 1.0);
        self
    }

    pub fn with_classification(mut self, classification: SourceClassification) -> Self {
        self.classification = classification;
        self
    }

    /// 官方网站：政府/官方域名，或标题包含 "official"；摘要里的提及不算
    pub fn is_official_site(&self) -> bool {
        is_official_domain(&self.url) || self.title.to_lowercase().contains("official")
    }

    /// 去重键：小写主机名（去掉 www.）+ 路径（去掉末尾 /），忽略查询串和锚点
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.url)
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}

/// 计算 URL 的去重键
pub fn dedup_key(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let host = url
                .host_str()
                .unwrap_or_default()
                .trim_start_matches("www.")
                .to_lowercase();
            let path = url.path().trim_end_matches('/').to_lowercase();
            format!("{}{}", host, path)
        }
        Err(_) => {
            let lower = raw.trim().to_lowercase();
            let without_scheme = lower
                .split_once("://")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(lower);
            let without_query = without_scheme
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string();
            without_query
                .trim_start_matches("www.")
                .trim_end_matches('/')
                .to_string()
        }
    }
}

/// URL 是否属于政府/官方域名
pub fn is_official_domain(raw: &str) -> bool {
    let host = Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_else(|| raw.to_lowercase());
    OFFICIAL_DOMAIN_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

/// 对来源进行分类并计算可信度
///
/// 官方来源：基础 0.5，政府域名 +0.4，URL 含 official +0.3，标题含 official +0.2，上限 1.0。
/// 其余按 URL 关键字分为 news / forum / guide。
pub fn classify_source(url: &str, title: &str, content: &str) -> (SourceClassification, f64) {
    let url_lower = url.to_lowercase();
    let title_lower = title.to_lowercase();
    let gov = is_official_domain(url);
    let official_mentioned = url_lower.contains("official")
        || title_lower.contains("official")
        || content.to_lowercase().contains("official");

    if gov || official_mentioned {
        let mut reliability: f64 = 0.5;
        if gov {
            reliability += 0.4;
        }
        if url_lower.contains("official") {
            reliability += 0.3;
        }
        if title_lower.contains("official") {
            reliability += 0.2;
        }
        return (SourceClassification::Official, reliability.min(1.0));
    }

    if NEWS_KEYWORDS.iter().any(|k| url_lower.contains(k)) {
        (SourceClassification::News, 0.5)
    } else if FORUM_KEYWORDS.iter().any(|k| url_lower.contains(k)) {
        (SourceClassification::Forum, 0.3)
    } else {
        (SourceClassification::Guide, 0.4)
    }
}

/// 内容指纹
pub fn fingerprint(url: &str, title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 按去重键合并来源，冲突时保留可信度更高的一条，保持首次出现的顺序
pub fn dedup_sources<I>(sources: I) -> Vec<SourceInfo>
where
    I: IntoIterator<Item = SourceInfo>,
{
    let mut unique: Vec<SourceInfo> = Vec::new();
    for source in sources {
        let key = source.dedup_key();
        match unique.iter_mut().find(|s| s.dedup_key() == key) {
            Some(existing) => {
                if source.reliability > existing.reliability {
                    *existing = source;
                }
            }
            None => unique.push(source),
        }
    }
    unique
}
