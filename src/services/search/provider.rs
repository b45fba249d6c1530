//! 搜索提供方
//!
//! 每个提供方是一个外部搜索后端，带有声明的可信度权重。
//! 聚合器只依赖 `SearchProvider` trait，具体后端可随意替换。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, ProviderError};
use crate::models::SourceInfo;

/// 搜索后端
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// 提供方名称（用于日志）
    fn name(&self) -> &str;

    /// 提供方可信度权重 [0, 1]
    fn reliability(&self) -> f64;

    /// 执行一次搜索
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceInfo>>;
}

/// SearxNG 兼容的 JSON 搜索端点
///
/// `GET {base}/search?q=...&format=json`，返回 `results[{url, title, content}]`
pub struct HttpSearchProvider {
    name: String,
    base_url: String,
    reliability: f64,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl HttpSearchProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        reliability: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; exam-schema-discovery/0.1)")
            .build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reliability: reliability.clamp(0.0, 1.0),
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn reliability(&self) -> f64 {
        self.reliability
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceInfo>> {
        let endpoint = format!("{}/search", self.base_url);
        debug!("[{}] 搜索: {}", self.name, query);

        let response = self
            .client
            .get(&endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| AppError::provider_request_failed(self.name.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider(ProviderError::BadResponse {
                provider: self.name.clone(),
                status: status.as_u16(),
            })
            .into());
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider_request_failed(self.name.clone(), e))?;

        let results = body
            .results
            .into_iter()
            .filter(|hit| hit.url.starts_with("http"))
            .take(limit)
            .map(|hit| SourceInfo::new(hit.url, hit.title, hit.content))
            .collect::<Vec<_>>();
        debug!("[{}] 返回 {} 条结果", self.name, results.len());
        Ok(results)
    }
}

/// 固定结果的提供方
///
/// 按查询中包含的关键字返回预置结果，用于离线运行和测试
pub struct StaticSearchProvider {
    name: String,
    reliability: f64,
    entries: Vec<(String, Vec<SourceInfo>)>,
}

impl StaticSearchProvider {
    pub fn new(name: impl Into<String>, reliability: f64) -> Self {
        Self {
            name: name.into(),
            reliability: reliability.clamp(0.0, 1.0),
            entries: Vec::new(),
        }
    }

    /// 查询包含 `keyword`（不区分大小写）时返回 `results`
    pub fn with_results(mut self, keyword: impl Into<String>, results: Vec<SourceInfo>) -> Self {
        self.entries.push((keyword.into().to_lowercase(), results));
        self
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn reliability(&self) -> f64 {
        self.reliability
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceInfo>> {
        let query = query.to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|(keyword, _)| query.contains(keyword.as_str()))
            .flat_map(|(_, results)| results.iter().cloned())
            .take(limit)
            .collect())
    }
}
